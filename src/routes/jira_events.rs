use crate::models::{ForwardedEvent, JiraWebhookEvent, WebhookIssueFields};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

fn ignored(reason: &str) -> Json<Value> {
    Json(json!({ "status": "ignored", "reason": reason }))
}

/// Jira callback. Always answers 200 so Jira never retries or disables the hook.
pub async fn jira_webhook(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    let event: JiraWebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Ignoring undecodable Jira event");
            return ignored("invalid payload");
        }
    };

    let Some(issue) = event.issue else {
        return ignored("no issue in payload");
    };
    let Some(issue_key) = issue.key else {
        return ignored("no issue in payload");
    };
    let triggered_by = event.user.and_then(|user| user.email);

    info!(
        issue_key = %issue_key,
        event = ?event.webhook_event,
        triggered_by = ?triggered_by,
        "Jira event"
    );

    // Updates made by the relay's own account would bounce back forever.
    if triggered_by
        .as_deref()
        .is_some_and(|email| email.eq_ignore_ascii_case(&state.config.jira_user))
    {
        info!(issue_key = %issue_key, "Skipping self-triggered Jira event");
        return Json(json!({ "status": "skipped" }));
    }

    if state.external.is_enabled() {
        let approval = approval_value(&state, &issue.fields).await;
        let forwarded = ForwardedEvent {
            source: "jira",
            event: event.webhook_event,
            issue_key,
            summary: issue.fields.summary,
            status: issue.fields.status.map(|status| status.name),
            triggered_by,
            approval,
        };
        state.external.forward(&forwarded).await;
    }

    Json(json!({ "status": "ok" }))
}

async fn approval_value(state: &AppState, fields: &WebhookIssueFields) -> Option<String> {
    let name = state.config.approval_field_name.as_deref()?;
    match state.jira.find_field_by_name(name).await {
        Ok(Some(field)) => fields.other.get(&field.id).and_then(option_value),
        Ok(None) => {
            warn!(field = name, "Approval field does not exist in Jira");
            None
        }
        Err(e) => {
            warn!(field = name, error = %e, "Could not resolve approval field");
            None
        }
    }
}

/// Select fields arrive as `{"value": ...}`, text fields as plain strings.
fn option_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("value").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
