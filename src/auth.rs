use base64::Engine;

/// Jira Cloud API-token credentials.
pub struct JiraCredentials {
    user: String,
    api_token: String,
}

impl JiraCredentials {
    pub fn new(user: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            api_token: api_token.into(),
        }
    }

    pub fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.user, self.api_token);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }
}
