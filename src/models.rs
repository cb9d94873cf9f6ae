use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Jira mixes string ids (issue types, fields) and numeric ids (screens, schemes).
/// The original representation is kept so it round-trips into creation payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JiraId {
    Number(i64),
    Text(String),
}

impl fmt::Display for JiraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JiraId::Number(n) => write!(f, "{}", n),
            JiraId::Text(s) => f.write_str(s),
        }
    }
}

// Inbound Jira webhook

#[derive(Deserialize, Debug, Default)]
pub struct JiraWebhookEvent {
    #[serde(rename = "webhookEvent")]
    pub webhook_event: Option<String>,
    pub issue: Option<WebhookIssue>,
    pub user: Option<WebhookUser>,
}

#[derive(Deserialize, Debug)]
pub struct WebhookIssue {
    pub key: Option<String>,
    #[serde(default)]
    pub fields: WebhookIssueFields,
}

#[derive(Deserialize, Debug, Default)]
pub struct WebhookIssueFields {
    pub summary: Option<String>,
    pub status: Option<IssueStatus>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Deserialize, Debug)]
pub struct IssueStatus {
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct WebhookUser {
    #[serde(rename = "emailAddress")]
    pub email: Option<String>,
}

/// Reduced event sent to the external service.
#[derive(Serialize, Debug, PartialEq)]
pub struct ForwardedEvent {
    pub source: &'static str,
    pub event: Option<String>,
    pub issue_key: String,
    pub summary: Option<String>,
    pub status: Option<String>,
    pub triggered_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval: Option<String>,
}

// Inbound external-service event

#[derive(Deserialize, Debug, Default)]
pub struct ExternalEvent {
    event_type: Option<String>,
    action: Option<String>,
    email: Option<String>,
    user: Option<String>,
    pub issue_key: Option<String>,
    pub approval: Option<String>,
    pub result: Option<String>,
}

impl ExternalEvent {
    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref().or(self.action.as_deref())
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().or(self.user.as_deref())
    }
}

// Jira resources

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct IssueType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subtask: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CustomField {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FieldContext {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FieldOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: String,
}

#[derive(Deserialize, Debug)]
pub struct FieldOptions {
    pub options: Vec<FieldOption>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Screen {
    pub id: JiraId,
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ScreenTab {
    pub id: JiraId,
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TabField {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ScreenScheme {
    pub id: JiraId,
    pub name: String,
    #[serde(default)]
    pub screens: BTreeMap<String, JiraId>,
}

impl ScreenScheme {
    /// The screen used for operations without their own entry; the first mapped
    /// screen stands in when the scheme has no `default` key.
    pub fn default_screen(&self) -> Option<&JiraId> {
        self.screens
            .get("default")
            .or_else(|| self.screens.values().next())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SchemeRef {
    pub id: JiraId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct IssueTypeSchemeProject {
    #[serde(rename = "issueTypeScheme")]
    pub issue_type_scheme: SchemeRef,
}

#[derive(Deserialize, Debug)]
pub struct IssueTypeSchemeMapping {
    #[serde(rename = "issueTypeId")]
    pub issue_type_id: String,
}

#[derive(Deserialize, Debug)]
pub struct CreatedIssueTypeScheme {
    #[serde(rename = "issueTypeSchemeId")]
    pub issue_type_scheme_id: String,
}

#[derive(Deserialize, Debug)]
pub struct IssueTypeScreenSchemeProject {
    #[serde(rename = "issueTypeScreenScheme")]
    pub issue_type_screen_scheme: SchemeRef,
}

#[derive(Deserialize, Debug)]
pub struct IssueTypeScreenSchemeMapping {
    #[serde(rename = "issueTypeId")]
    pub issue_type_id: String,
    #[serde(rename = "screenSchemeId")]
    pub screen_scheme_id: String,
}

#[derive(Deserialize, Debug)]
pub struct CreatedId {
    pub id: JiraId,
}

#[derive(Deserialize, Debug)]
pub struct FieldConfigurationSchemeProject {
    #[serde(rename = "fieldConfigurationScheme")]
    pub field_configuration_scheme: Option<SchemeRef>,
}

#[derive(Deserialize, Debug)]
pub struct FieldConfigurationMapping {
    #[serde(rename = "issueTypeId")]
    pub issue_type_id: String,
    #[serde(rename = "fieldConfigurationId")]
    pub field_configuration_id: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WebhookRegistration {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_url: Option<String>,
}

impl WebhookRegistration {
    /// Jira only exposes the id as the last segment of the `self` link.
    pub fn id(&self) -> Option<&str> {
        self.self_url
            .as_deref()
            .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
    }
}

/// One page of a Jira paginated listing.
#[derive(Deserialize, Debug)]
pub struct Page<T> {
    pub total: Option<u64>,
    #[serde(rename = "isLast")]
    pub is_last: Option<bool>,
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

/// Atlassian Document Format body with one paragraph per line.
pub fn adf_document(paragraphs: &[&str]) -> Value {
    let content = paragraphs
        .iter()
        .map(|text| {
            json!({
                "type": "paragraph",
                "content": [{ "type": "text", "text": text }]
            })
        })
        .collect::<Vec<_>>();
    json!({ "type": "doc", "version": 1, "content": content })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jira_ids_keep_their_shape() {
        let screen: Screen = serde_json::from_value(json!({"id": 10001, "name": "s"})).unwrap();
        assert_eq!(screen.id, JiraId::Number(10001));
        assert_eq!(screen.id.to_string(), "10001");
        assert_eq!(serde_json::to_value(&screen.id).unwrap(), json!(10001));

        let scheme: SchemeRef = serde_json::from_value(json!({"id": "10200"})).unwrap();
        assert_eq!(scheme.id, JiraId::Text("10200".to_string()));
    }

    #[test]
    fn default_screen_falls_back_to_first_entry() {
        let with_default: ScreenScheme = serde_json::from_value(json!({
            "id": 1, "name": "a", "screens": {"default": 5, "edit": 6}
        }))
        .unwrap();
        assert_eq!(with_default.default_screen(), Some(&JiraId::Number(5)));

        let without_default: ScreenScheme = serde_json::from_value(json!({
            "id": 2, "name": "b", "screens": {"view": 8, "edit": 7}
        }))
        .unwrap();
        assert_eq!(without_default.default_screen(), Some(&JiraId::Number(7)));

        let empty: ScreenScheme =
            serde_json::from_value(json!({"id": 3, "name": "c"})).unwrap();
        assert_eq!(empty.default_screen(), None);
    }

    #[test]
    fn webhook_id_comes_from_self_link() {
        let hook: WebhookRegistration = serde_json::from_value(json!({
            "name": "relay",
            "url": "https://relay.example/webhooks",
            "self": "https://x.atlassian.net/rest/webhooks/1.0/webhook/42"
        }))
        .unwrap();
        assert_eq!(hook.id(), Some("42"));
    }

    #[test]
    fn webhook_fields_collect_custom_fields() {
        let event: JiraWebhookEvent = serde_json::from_value(json!({
            "webhookEvent": "jira:issue_updated",
            "issue": {"key": "AV-1", "fields": {
                "summary": "s",
                "status": {"name": "Open"},
                "customfield_10050": {"value": "Approved"}
            }},
            "user": {"emailAddress": "x@y.com"}
        }))
        .unwrap();
        let issue = event.issue.unwrap();
        assert_eq!(issue.fields.status.unwrap().name, "Open");
        assert_eq!(
            issue.fields.other["customfield_10050"]["value"],
            "Approved"
        );
    }

    #[test]
    fn external_event_accepts_legacy_names() {
        let event: ExternalEvent =
            serde_json::from_value(json!({"action": "created", "user": "a@b.com"})).unwrap();
        assert_eq!(event.event_type(), Some("created"));
        assert_eq!(event.email(), Some("a@b.com"));
    }

    #[test]
    fn external_event_prefers_current_names_when_both_are_sent() {
        let event: ExternalEvent = serde_json::from_value(json!({
            "event_type": "updated", "action": "created",
            "email": "a@b.com", "user": "alice"
        }))
        .unwrap();
        assert_eq!(event.event_type(), Some("updated"));
        assert_eq!(event.email(), Some("a@b.com"));
    }

    #[test]
    fn adf_document_has_one_paragraph_per_line() {
        let doc = adf_document(&["one", "two"]);
        assert_eq!(doc["type"], "doc");
        assert_eq!(doc["content"].as_array().unwrap().len(), 2);
        assert_eq!(doc["content"][1]["content"][0]["text"], "two");
    }
}
