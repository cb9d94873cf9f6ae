use crate::auth::JiraCredentials;
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::models::*;
use itertools::Itertools;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

pub struct JiraClient {
    client: reqwest::Client,
    base_url: String,
}

impl JiraClient {
    pub fn new(config: &Config) -> Result<Self> {
        let credentials = JiraCredentials::new(&config.jira_user, &config.jira_api_token);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, credentials.basic_auth_header().parse::<HeaderValue>()?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: reqwest::Client::builder()
                .default_headers(headers)
                .timeout(config.http_timeout)
                .build()?,
            base_url: config.jira_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!(path, "GET");
        let response = self.execute(self.client.get(self.url(path))).await?;
        Self::decode(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        debug!(path, "POST");
        let response = self
            .execute(self.client.post(self.url(path)).json(body))
            .await?;
        Self::decode(response).await
    }

    /// PUT endpoints answer 204 or an echo nobody reads, so the body is dropped.
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        debug!(path, "PUT");
        self.execute(self.client.put(self.url(path)).json(body))
            .await?;
        Ok(())
    }

    pub async fn get_paged<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut values: Vec<T> = Vec::new();
        let mut start_at = 0;

        loop {
            let page = self
                .get::<Page<T>>(&format!("{}{}startAt={}", path, separator, start_at))
                .await?;

            let page_size = page.values.len() as u64;
            values.extend(page.values);
            start_at += page_size;

            let finished = match (page.is_last, page.total) {
                (Some(is_last), _) => is_last,
                (None, Some(total)) => start_at >= total,
                (None, None) => true,
            };
            if finished || page_size == 0 {
                break;
            }
        }

        Ok(values)
    }

    // Issues

    pub async fn create_issue(&self, fields: Value) -> Result<CreatedIssue> {
        self.post("/rest/api/3/issue", &json!({ "fields": fields }))
            .await
    }

    pub async fn update_issue_fields(&self, issue_key: &str, fields: Value) -> Result<()> {
        self.put(
            &format!("/rest/api/3/issue/{}", issue_key),
            &json!({ "fields": fields }),
        )
        .await
    }

    pub async fn add_comment(&self, issue_key: &str, body: Value) -> Result<Value> {
        self.post(
            &format!("/rest/api/3/issue/{}/comment", issue_key),
            &json!({ "body": body }),
        )
        .await
    }

    // Projects and fields

    pub async fn get_project(&self, project_key: &str) -> Result<Project> {
        self.get(&format!("/rest/api/3/project/{}", project_key))
            .await
            .map_err(|e| match e {
                RelayError::UpstreamRejected { status: 404, .. } => {
                    RelayError::NotFound(format!("project {}", project_key))
                }
                other => other,
            })
    }

    pub async fn get_fields(&self) -> Result<Vec<CustomField>> {
        self.get("/rest/api/3/field").await
    }

    /// Linear search over every field for an exact name match.
    pub async fn find_field_by_name(&self, name: &str) -> Result<Option<CustomField>> {
        Ok(self
            .get_fields()
            .await?
            .into_iter()
            .find(|field| field.name == name))
    }

    pub async fn get_context_options(
        &self,
        field_id: &str,
        context_id: &str,
    ) -> Result<Vec<FieldOption>> {
        self.get_paged(&format!(
            "/rest/api/3/field/{}/context/{}/option",
            field_id, context_id
        ))
        .await
    }

    pub async fn create_context_options(
        &self,
        field_id: &str,
        context_id: &str,
        values: &[String],
    ) -> Result<Vec<FieldOption>> {
        let options = values
            .iter()
            .map(|value| json!({ "value": value, "disabled": false }))
            .collect::<Vec<_>>();
        let created: FieldOptions = self
            .post(
                &format!(
                    "/rest/api/3/field/{}/context/{}/option",
                    field_id, context_id
                ),
                &json!({ "options": options }),
            )
            .await?;
        Ok(created.options)
    }

    // Issue type schemes

    pub async fn get_project_issue_type_scheme(
        &self,
        project_id: &str,
    ) -> Result<Option<SchemeRef>> {
        let schemes: Vec<IssueTypeSchemeProject> = self
            .get_paged(&format!(
                "/rest/api/3/issuetypescheme/project?projectId={}",
                project_id
            ))
            .await?;
        Ok(schemes.into_iter().next().map(|s| s.issue_type_scheme))
    }

    pub async fn get_issue_type_scheme_mappings(
        &self,
        scheme_id: &JiraId,
    ) -> Result<Vec<IssueTypeSchemeMapping>> {
        self.get_paged(&format!(
            "/rest/api/3/issuetypescheme/mapping?issueTypeSchemeId={}",
            scheme_id
        ))
        .await
    }

    pub async fn add_issue_types_to_scheme(
        &self,
        scheme_id: &JiraId,
        issue_type_ids: &[&str],
    ) -> Result<()> {
        self.put(
            &format!("/rest/api/3/issuetypescheme/{}/issuetype", scheme_id),
            &json!({ "issueTypeIds": issue_type_ids }),
        )
        .await
    }

    pub async fn create_issue_type_scheme(
        &self,
        name: &str,
        issue_type_ids: &[&str],
    ) -> Result<String> {
        let created: CreatedIssueTypeScheme = self
            .post(
                "/rest/api/3/issuetypescheme",
                &json!({ "name": name, "issueTypeIds": issue_type_ids }),
            )
            .await?;
        Ok(created.issue_type_scheme_id)
    }

    pub async fn assign_issue_type_scheme(&self, scheme_id: &str, project_id: &str) -> Result<()> {
        self.put(
            "/rest/api/3/issuetypescheme/project",
            &json!({ "issueTypeSchemeId": scheme_id, "projectId": project_id }),
        )
        .await
    }

    // Screens

    pub async fn get_screen_tabs(&self, screen_id: &JiraId) -> Result<Vec<ScreenTab>> {
        self.get(&format!("/rest/api/3/screens/{}/tabs", screen_id))
            .await
    }

    pub async fn create_screen_tab(&self, screen_id: &JiraId, name: &str) -> Result<ScreenTab> {
        self.post(
            &format!("/rest/api/3/screens/{}/tabs", screen_id),
            &json!({ "name": name }),
        )
        .await
    }

    pub async fn get_tab_fields(&self, screen_id: &JiraId, tab_id: &JiraId) -> Result<Vec<TabField>> {
        self.get(&format!(
            "/rest/api/3/screens/{}/tabs/{}/fields",
            screen_id, tab_id
        ))
        .await
    }

    pub async fn add_field_to_tab(
        &self,
        screen_id: &JiraId,
        tab_id: &JiraId,
        field_id: &str,
    ) -> Result<TabField> {
        self.post(
            &format!("/rest/api/3/screens/{}/tabs/{}/fields", screen_id, tab_id),
            &json!({ "fieldId": field_id }),
        )
        .await
    }

    pub async fn get_screen_schemes_by_id(&self, ids: &[String]) -> Result<Vec<ScreenScheme>> {
        let query = ids.iter().map(|id| format!("id={}", id)).join("&");
        self.get_paged(&format!("/rest/api/3/screenscheme?{}", query))
            .await
    }

    // Issue type screen schemes

    pub async fn get_project_issue_type_screen_scheme(
        &self,
        project_id: &str,
    ) -> Result<Option<SchemeRef>> {
        let schemes: Vec<IssueTypeScreenSchemeProject> = self
            .get_paged(&format!(
                "/rest/api/3/issuetypescreenscheme/project?projectId={}",
                project_id
            ))
            .await?;
        Ok(schemes.into_iter().next().map(|s| s.issue_type_screen_scheme))
    }

    pub async fn get_issue_type_screen_scheme_mappings(
        &self,
        scheme_id: &JiraId,
    ) -> Result<Vec<IssueTypeScreenSchemeMapping>> {
        self.get_paged(&format!(
            "/rest/api/3/issuetypescreenscheme/mapping?issueTypeScreenSchemeId={}",
            scheme_id
        ))
        .await
    }

    pub async fn add_issue_type_screen_scheme_mapping(
        &self,
        scheme_id: &JiraId,
        issue_type_id: &str,
        screen_scheme_id: &JiraId,
    ) -> Result<()> {
        self.put(
            &format!("/rest/api/3/issuetypescreenscheme/{}/mapping", scheme_id),
            &json!({
                "issueTypeMappings": [{
                    "issueTypeId": issue_type_id,
                    "screenSchemeId": screen_scheme_id.to_string()
                }]
            }),
        )
        .await
    }

    pub async fn create_issue_type_screen_scheme(
        &self,
        name: &str,
        issue_type_id: &str,
        screen_scheme_id: &JiraId,
    ) -> Result<JiraId> {
        let screen_scheme_id = screen_scheme_id.to_string();
        let created: CreatedId = self
            .post(
                "/rest/api/3/issuetypescreenscheme",
                &json!({
                    "name": name,
                    "issueTypeMappings": [
                        { "issueTypeId": "default", "screenSchemeId": screen_scheme_id },
                        { "issueTypeId": issue_type_id, "screenSchemeId": screen_scheme_id }
                    ]
                }),
            )
            .await?;
        Ok(created.id)
    }

    pub async fn assign_issue_type_screen_scheme(
        &self,
        scheme_id: &JiraId,
        project_id: &str,
    ) -> Result<()> {
        self.put(
            "/rest/api/3/issuetypescreenscheme/project",
            &json!({
                "issueTypeScreenSchemeId": scheme_id.to_string(),
                "projectId": project_id
            }),
        )
        .await
    }

    // Field configurations

    pub async fn get_project_field_configuration_scheme(
        &self,
        project_id: &str,
    ) -> Result<Option<SchemeRef>> {
        let schemes: Vec<FieldConfigurationSchemeProject> = self
            .get_paged(&format!(
                "/rest/api/3/fieldconfigurationscheme/project?projectId={}",
                project_id
            ))
            .await?;
        Ok(schemes
            .into_iter()
            .find_map(|s| s.field_configuration_scheme))
    }

    pub async fn get_field_configuration_mappings(
        &self,
        scheme_id: &JiraId,
    ) -> Result<Vec<FieldConfigurationMapping>> {
        self.get_paged(&format!(
            "/rest/api/3/fieldconfigurationscheme/mapping?fieldConfigurationSchemeId={}",
            scheme_id
        ))
        .await
    }

    pub async fn hide_field(&self, field_configuration_id: &str, field_id: &str) -> Result<()> {
        self.put(
            &format!("/rest/api/3/fieldconfiguration/{}/fields", field_configuration_id),
            &json!({ "fieldConfigurationItems": [{ "id": field_id, "isHidden": true }] }),
        )
        .await
    }

    // Webhooks

    pub async fn get_webhooks(&self) -> Result<Vec<WebhookRegistration>> {
        self.get("/rest/webhooks/1.0/webhook").await
    }

    pub async fn create_webhook(&self, registration: &WebhookRegistration) -> Result<WebhookRegistration> {
        self.post("/rest/webhooks/1.0/webhook", registration).await
    }
}
