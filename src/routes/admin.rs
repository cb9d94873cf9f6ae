use crate::error::{RelayError, Result};
use crate::provisioning::*;
use crate::webhook_registration::{ensure_webhook, EnsuredWebhook};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize, Default)]
pub struct IssueTypeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CustomFieldRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub field_type: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ApprovalFieldRequest {
    pub field_name: Option<String>,
}

/// An empty body stands for "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| RelayError::MalformedPayload(e.to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_name(name: Option<String>) -> Result<String> {
    non_blank(name).ok_or_else(|| RelayError::MalformedPayload("name is required".to_string()))
}

fn approval_field_name(state: &AppState, requested: Option<String>) -> String {
    non_blank(requested)
        .or_else(|| state.config.approval_field_name.clone())
        .unwrap_or_else(|| DEFAULT_APPROVAL_FIELD.to_string())
}

pub async fn create_issue_type(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IssueTypeProvisioned>> {
    let request: IssueTypeRequest = parse_body(&body)?;
    let name = required_name(request.name)?;
    let description = request.description.unwrap_or_default();

    let provisioned = Provisioner::new(&state.jira, &state.config.project_key)
        .ensure_issue_type(&name, &description)
        .await?;
    Ok(Json(provisioned))
}

pub async fn create_custom_field(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>> {
    let request: CustomFieldRequest = parse_body(&body)?;
    let name = required_name(request.name)?;
    let field_type = match non_blank(request.field_type) {
        Some(field_type) => field_type.parse::<FieldType>()?,
        None => FieldType::Select,
    };

    let field = Provisioner::new(&state.jira, &state.config.project_key)
        .ensure_custom_field(&name, &request.description.unwrap_or_default(), field_type)
        .await?;
    Ok(Json(json!({ "field": field })))
}

pub async fn create_access_request(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AccessRequestProvisioned>> {
    let request: IssueTypeRequest = parse_body(&body)?;
    let name = non_blank(request.name).unwrap_or_else(|| DEFAULT_ACCESS_REQUEST_TYPE.to_string());
    let description = request
        .description
        .unwrap_or_else(|| "Request access to a system, approved through Keeper".to_string());
    let field_name = approval_field_name(&state, None);

    let provisioned = Provisioner::new(&state.jira, &state.config.project_key)
        .provision_access_request(&name, &description, &field_name)
        .await?;
    Ok(Json(provisioned))
}

pub async fn add_approval_field(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApprovalFieldProvisioned>> {
    let request: ApprovalFieldRequest = parse_body(&body)?;
    let field_name = approval_field_name(&state, request.field_name);

    let provisioned = Provisioner::new(&state.jira, &state.config.project_key)
        .add_approval_field(&field_name)
        .await?;
    Ok(Json(provisioned))
}

pub async fn register_webhook(State(state): State<AppState>) -> Result<Json<EnsuredWebhook>> {
    Ok(Json(ensure_webhook(&state.jira, &state.config).await?))
}
