use crate::error::Result;
use crate::models::{adf_document, ExternalEvent};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    fn parse(event_type: &str) -> Option<Self> {
        let normalized = event_type.trim().to_ascii_lowercase();
        match normalized.strip_prefix("user_").unwrap_or(&normalized) {
            "created" => Some(EventKind::Created),
            "updated" => Some(EventKind::Updated),
            "deleted" => Some(EventKind::Deleted),
            _ => None,
        }
    }
}

/// User lifecycle events from the external service. Jira failures are logged
/// only: the caller always gets `ok` once the event was understood.
pub async fn external_event(State(state): State<AppState>, body: Bytes) -> Response {
    let event: ExternalEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Ignoring undecodable external event");
            return Json(json!({ "status": "ignored", "reason": "invalid payload" }))
                .into_response();
        }
    };

    let email = event.email().unwrap_or("unknown");
    let Some(kind) = event.event_type().and_then(EventKind::parse) else {
        info!(event_type = ?event.event_type(), "Ignoring unknown external event");
        return Json(json!({ "status": "ignored", "event_type": event.event_type() }))
            .into_response();
    };

    info!(?kind, email, "External event");

    let outcome = match kind {
        EventKind::Created => {
            create_issue(
                &state,
                &format!("New Keeper user: {}", email),
                "User created in Keeper",
            )
            .await
        }
        EventKind::Deleted => {
            create_issue(
                &state,
                &format!("Keeper user deleted: {}", email),
                "User deleted in Keeper",
            )
            .await
        }
        EventKind::Updated => {
            let Some(issue_key) = event.issue_key.as_deref() else {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "issue_key is required for updated events" })),
                )
                    .into_response();
            };
            update_issue(&state, issue_key, email, &event)
                .await
                .map(|_| issue_key.to_string())
        }
    };

    match outcome {
        Ok(issue_key) => info!(issue_key = %issue_key, ?kind, "Jira updated from external event"),
        Err(e) => error!(error = %e, ?kind, email, "Jira call for external event failed"),
    }

    Json(json!({ "status": "ok" })).into_response()
}

async fn create_issue(state: &AppState, summary: &str, description: &str) -> Result<String> {
    let fields = json!({
        "project": { "key": state.config.project_key },
        "summary": summary,
        "description": adf_document(&[description]),
        "issuetype": { "name": state.config.issue_type }
    });
    let issue = state.jira.create_issue(fields).await?;
    Ok(issue.key)
}

async fn update_issue(
    state: &AppState,
    issue_key: &str,
    email: &str,
    event: &ExternalEvent,
) -> Result<()> {
    let headline = format!("Keeper user updated: {}", email);
    let result_line = event.result.as_deref().map(|result| format!("Result: {}", result));
    let mut lines = vec![headline.as_str()];
    if let Some(line) = result_line.as_deref() {
        lines.push(line);
    }
    state
        .jira
        .add_comment(issue_key, adf_document(&lines))
        .await?;

    let (Some(approval), Some(field_name)) = (
        event.approval.as_deref(),
        state.config.approval_field_name.as_deref(),
    ) else {
        return Ok(());
    };

    match state.jira.find_field_by_name(field_name).await? {
        Some(field) => {
            let mut fields = serde_json::Map::new();
            fields.insert(field.id.clone(), json!({ "value": approval }));
            state
                .jira
                .update_issue_fields(issue_key, Value::Object(fields))
                .await?;
            info!(issue_key, field = %field.id, approval, "Approval written to Jira");
        }
        None => warn!(field = field_name, "Approval field does not exist in Jira"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{call, test_config};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn accepts_both_event_spellings() {
        assert_eq!(EventKind::parse("user_created"), Some(EventKind::Created));
        assert_eq!(EventKind::parse("Updated"), Some(EventKind::Updated));
        assert_eq!(EventKind::parse("user_deleted"), Some(EventKind::Deleted));
        assert_eq!(EventKind::parse("user_suspended"), None);
    }

    #[tokio::test]
    async fn created_user_opens_one_issue() {
        let jira = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/3/issue"))
            .and(body_partial_json(json!({"fields": {
                "project": {"key": "POC"},
                "summary": "New Keeper user: a@b.com",
                "issuetype": {"name": "Task"}
            }})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "10100", "key": "POC-7"
            })))
            .expect(1)
            .mount(&jira)
            .await;

        let (status, body) = call(
            test_config(&jira.uri()),
            "POST",
            "/external-events",
            r#"{"event_type":"user_created","email":"a@b.com"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));

        let requests = jira.received_requests().await.unwrap();
        let sent: Value = requests[0].body_json().unwrap();
        assert_eq!(sent["fields"]["description"]["type"], "doc");
    }

    #[tokio::test]
    async fn both_user_spellings_are_accepted() {
        let jira = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/3/issue"))
            .and(body_partial_json(json!({"fields": {"summary": "New Keeper user: a@b.com"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "10101", "key": "POC-8"
            })))
            .expect(1)
            .mount(&jira)
            .await;

        let (status, body) = call(
            test_config(&jira.uri()),
            "POST",
            "/keeper-events",
            r#"{"event_type":"created","user":"alice","email":"a@b.com"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn unknown_event_makes_no_calls() {
        let jira = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&jira)
            .await;

        let (status, body) = call(
            test_config(&jira.uri()),
            "POST",
            "/keeper-events",
            r#"{"event_type":"user_suspended","email":"a@b.com"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ignored");
    }

    #[tokio::test]
    async fn update_without_issue_key_is_rejected() {
        let jira = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&jira)
            .await;

        let (status, body) = call(
            test_config(&jira.uri()),
            "POST",
            "/keeper-events",
            r#"{"event_type":"updated","email":"a@b.com"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("issue_key"));
    }

    #[tokio::test]
    async fn update_comments_and_writes_approval() {
        let jira = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/3/issue/POC-7/comment"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "1"})))
            .expect(1)
            .mount(&jira)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/3/field"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "customfield_10050", "name": "Approval", "custom": true}
            ])))
            .mount(&jira)
            .await;
        Mock::given(method("PUT"))
            .and(path("/rest/api/3/issue/POC-7"))
            .and(body_partial_json(json!({"fields": {"customfield_10050": {"value": "Approved"}}})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&jira)
            .await;

        let mut config = test_config(&jira.uri());
        config.approval_field_name = Some("Approval".to_string());

        let (status, body) = call(
            config,
            "POST",
            "/keeper-events",
            r#"{"event_type":"user_updated","user":"a@b.com","issue_key":"POC-7","approval":"Approved","result":"granted"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn jira_failure_is_not_surfaced() {
        let jira = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/3/issue"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&jira)
            .await;

        let (status, body) = call(
            test_config(&jira.uri()),
            "POST",
            "/keeper-webhook",
            r#"{"action":"deleted","email":"a@b.com"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }
}
