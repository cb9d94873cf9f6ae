use crate::config::Config;
use crate::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn test_config(jira_url: &str) -> Config {
    Config {
        jira_url: jira_url.to_string(),
        jira_user: "bot@example.com".to_string(),
        jira_api_token: "token".to_string(),
        project_key: "POC".to_string(),
        issue_type: "Task".to_string(),
        external_service_url: None,
        approval_field_name: None,
        auto_create_webhook: false,
        public_url: None,
        bind_addr: "127.0.0.1:0".to_string(),
        http_timeout: Duration::from_secs(5),
    }
}

pub async fn mock_project(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/api/3/project/POC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "10000", "key": "POC", "name": "Proof of concept"
        })))
        .mount(server)
        .await;
}

/// Sends one request through the full router and decodes the JSON answer.
pub async fn call(config: Config, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
    let state = AppState::new(config).unwrap();
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = crate::app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}
