use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Settings read once at start-up and shared read-only by every handler.
#[derive(Debug, Clone)]
pub struct Config {
    pub jira_url: String,
    pub jira_user: String,
    pub jira_api_token: String,
    pub project_key: String,
    pub issue_type: String,
    pub external_service_url: Option<String>,
    pub approval_field_name: Option<String>,
    pub auto_create_webhook: bool,
    pub public_url: Option<String>,
    pub bind_addr: String,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jira_url = get("JIRA_URL").ok_or(ConfigError::Missing("JIRA_URL"))?;
        let jira_user = get("JIRA_USER").ok_or(ConfigError::Missing("JIRA_USER"))?;
        let jira_api_token = get("JIRA_API_TOKEN")
            .or_else(|| get("ATLASSIAN_API_TOKEN"))
            .ok_or(ConfigError::Missing("JIRA_API_TOKEN"))?;

        let auto_create_webhook = match get("AUTO_CREATE_WEBHOOK") {
            None => false,
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                name: "AUTO_CREATE_WEBHOOK",
                value,
            })?,
        };

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            None => Duration::from_secs(10),
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid {
                    name: "HTTP_TIMEOUT_SECS",
                    value,
                })?,
        };

        Ok(Self {
            jira_url: jira_url.trim_end_matches('/').to_string(),
            jira_user,
            jira_api_token,
            project_key: get("JIRA_PROJECT_KEY").unwrap_or_else(|| "POC".to_string()),
            issue_type: get("JIRA_ISSUE_TYPE").unwrap_or_else(|| "Task".to_string()),
            external_service_url: get("EXTERNAL_SERVICE_URL").or_else(|| get("KEEPER_URL")),
            approval_field_name: get("APPROVAL_FIELD_NAME"),
            auto_create_webhook,
            public_url: get("PUBLIC_URL").map(|url| url.trim_end_matches('/').to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            http_timeout,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("JIRA_URL", "https://example.atlassian.net/"),
        ("JIRA_USER", "bot@example.com"),
        ("JIRA_API_TOKEN", "secret"),
    ];

    #[test]
    fn applies_defaults() {
        let config = config_from(&REQUIRED).unwrap();
        assert_eq!(config.jira_url, "https://example.atlassian.net");
        assert_eq!(config.project_key, "POC");
        assert_eq!(config.issue_type, "Task");
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert!(!config.auto_create_webhook);
        assert!(config.external_service_url.is_none());
        assert!(config.approval_field_name.is_none());
    }

    #[test]
    fn falls_back_to_atlassian_token_and_keeper_url() {
        let config = config_from(&[
            ("JIRA_URL", "https://example.atlassian.net"),
            ("JIRA_USER", "bot@example.com"),
            ("ATLASSIAN_API_TOKEN", "other-secret"),
            ("KEEPER_URL", "https://keeper.example/receive-event"),
        ])
        .unwrap();
        assert_eq!(config.jira_api_token, "other-secret");
        assert_eq!(
            config.external_service_url.as_deref(),
            Some("https://keeper.example/receive-event")
        );
    }

    #[test]
    fn missing_token_is_reported() {
        let err = config_from(&REQUIRED[..2]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JIRA_API_TOKEN")));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = config_from(&[
            ("JIRA_URL", "  "),
            ("JIRA_USER", "bot@example.com"),
            ("JIRA_API_TOKEN", "secret"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JIRA_URL")));
    }

    #[test]
    fn parses_flags_and_timeout() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("AUTO_CREATE_WEBHOOK", "Yes"));
        pairs.push(("HTTP_TIMEOUT_SECS", "3"));
        let config = config_from(&pairs).unwrap();
        assert!(config.auto_create_webhook);
        assert_eq!(config.http_timeout, Duration::from_secs(3));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("AUTO_CREATE_WEBHOOK", "sometimes"));
        assert!(matches!(
            config_from(&pairs).unwrap_err(),
            ConfigError::Invalid { name: "AUTO_CREATE_WEBHOOK", .. }
        ));
    }
}
