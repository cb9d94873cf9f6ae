use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::jira_client::JiraClient;
use crate::models::WebhookRegistration;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

pub const WEBHOOK_NAME: &str = "jira-keeper-relay";
pub const WEBHOOK_EVENTS: [&str; 2] = ["jira:issue_created", "jira:issue_updated"];

#[derive(Serialize, Debug)]
pub struct EnsuredWebhook {
    pub webhook: WebhookRegistration,
    pub created: bool,
}

/// Registers the relay's `/webhooks` callback in Jira unless a registration
/// with the same URL already exists.
pub async fn ensure_webhook(jira: &JiraClient, config: &Config) -> Result<EnsuredWebhook> {
    let public_url = config.public_url.as_deref().ok_or_else(|| {
        RelayError::MalformedPayload("PUBLIC_URL must be set to register the webhook".to_string())
    })?;
    let callback_url = format!("{}/webhooks", public_url);

    let existing = jira.get_webhooks().await?;
    if let Some(webhook) = existing.into_iter().find(|w| w.url == callback_url) {
        info!(url = %callback_url, id = ?webhook.id(), "Webhook already registered");
        return Ok(EnsuredWebhook {
            webhook,
            created: false,
        });
    }

    let registration = WebhookRegistration {
        name: WEBHOOK_NAME.to_string(),
        url: callback_url,
        events: WEBHOOK_EVENTS.iter().map(|e| e.to_string()).collect(),
        filters: Some(json!({
            "issue-related-events-section": format!("project = {}", config.project_key)
        })),
        self_url: None,
    };
    let webhook = jira.create_webhook(&registration).await?;
    info!(url = %webhook.url, id = ?webhook.id(), "Registered Jira webhook");

    Ok(EnsuredWebhook {
        webhook,
        created: true,
    })
}

/// Start-up variant: problems are logged and the relay keeps running.
pub async fn register_on_startup(jira: &JiraClient, config: &Config) {
    if !config.auto_create_webhook {
        return;
    }
    if let Err(e) = ensure_webhook(jira, config).await {
        warn!(error = %e, "Could not register Jira webhook");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_config;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> Config {
        let mut config = test_config(&server.uri());
        config.public_url = Some("https://relay.example".to_string());
        config.auto_create_webhook = true;
        config
    }

    #[tokio::test]
    async fn existing_registration_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/webhooks/1.0/webhook"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "name": "old name",
                "url": "https://relay.example/webhooks",
                "events": ["jira:issue_updated"],
                "self": "https://x.atlassian.net/rest/webhooks/1.0/webhook/7"
            }])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let config = config(&server);
        let jira = JiraClient::new(&config).unwrap();
        let ensured = ensure_webhook(&jira, &config).await.unwrap();
        assert!(!ensured.created);
        assert_eq!(ensured.webhook.id(), Some("7"));
    }

    #[tokio::test]
    async fn registers_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/webhooks/1.0/webhook"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "name": "someone else",
                "url": "https://other.example/hook"
            }])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/webhooks/1.0/webhook"))
            .and(body_partial_json(json!({
                "name": "jira-keeper-relay",
                "url": "https://relay.example/webhooks",
                "events": ["jira:issue_created", "jira:issue_updated"],
                "filters": {"issue-related-events-section": "project = POC"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "name": "jira-keeper-relay",
                "url": "https://relay.example/webhooks",
                "events": ["jira:issue_created", "jira:issue_updated"],
                "self": "https://x.atlassian.net/rest/webhooks/1.0/webhook/8"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = config(&server);
        let jira = JiraClient::new(&config).unwrap();
        let ensured = ensure_webhook(&jira, &config).await.unwrap();
        assert!(ensured.created);
        assert_eq!(ensured.webhook.id(), Some("8"));
    }

    #[tokio::test]
    async fn public_url_is_required() {
        let config = test_config("http://jira.invalid");
        let jira = JiraClient::new(&config).unwrap();
        assert!(matches!(
            ensure_webhook(&jira, &config).await,
            Err(RelayError::MalformedPayload(_))
        ));
    }

    #[tokio::test]
    async fn startup_registration_is_off_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let jira = JiraClient::new(&config).unwrap();
        register_on_startup(&jira, &config).await;
    }
}
