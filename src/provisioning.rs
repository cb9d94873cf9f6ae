use crate::error::{RelayError, Result};
use crate::jira_client::JiraClient;
use crate::models::*;
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::info;

pub const APPROVAL_OPTIONS: [&str; 3] = ["Pending", "Approved", "Rejected"];
pub const DEFAULT_APPROVAL_FIELD: &str = "Approval";
pub const DEFAULT_ACCESS_REQUEST_TYPE: &str = "Access Request";

pub trait JiraResource: DeserializeOwned {
    const KIND: &'static str;
    fn name(&self) -> &str;

    fn matches(&self, name: &str) -> bool {
        self.name() == name
    }
}

impl JiraResource for IssueType {
    const KIND: &'static str = "issue type";
    fn name(&self) -> &str {
        &self.name
    }
}

impl JiraResource for CustomField {
    const KIND: &'static str = "custom field";
    fn name(&self) -> &str {
        &self.name
    }

    // System fields share the listing but cannot carry contexts or options.
    fn matches(&self, name: &str) -> bool {
        self.custom && self.name == name
    }
}

impl JiraResource for FieldContext {
    const KIND: &'static str = "field context";
    fn name(&self) -> &str {
        &self.name
    }
}

impl JiraResource for Screen {
    const KIND: &'static str = "screen";
    fn name(&self) -> &str {
        &self.name
    }
}

impl JiraResource for ScreenScheme {
    const KIND: &'static str = "screen scheme";
    fn name(&self) -> &str {
        &self.name
    }
}

pub enum Listing {
    Plain(String),
    Paged(String),
}

pub struct Collection {
    pub listing: Listing,
    pub create_path: String,
}

impl Collection {
    fn plain(path: &str) -> Self {
        Self {
            listing: Listing::Plain(path.to_string()),
            create_path: path.to_string(),
        }
    }

    fn paged(path: String) -> Self {
        Self {
            listing: Listing::Paged(path.clone()),
            create_path: path,
        }
    }

    pub fn issue_types() -> Self {
        Self::plain("/rest/api/3/issuetype")
    }

    pub fn fields() -> Self {
        Self::plain("/rest/api/3/field")
    }

    pub fn field_contexts(field_id: &str) -> Self {
        Self::paged(format!("/rest/api/3/field/{}/context", field_id))
    }

    pub fn screens() -> Self {
        Self::paged("/rest/api/3/screens".to_string())
    }

    pub fn screen_schemes() -> Self {
        Self::paged("/rest/api/3/screenscheme".to_string())
    }
}

#[derive(Serialize, Debug)]
pub struct Ensured<R> {
    #[serde(flatten)]
    pub resource: R,
    pub created: bool,
}

pub async fn ensure_named<R: JiraResource>(
    jira: &JiraClient,
    collection: &Collection,
    name: &str,
    create_body: &Value,
) -> Result<Ensured<R>> {
    let existing: Vec<R> = match &collection.listing {
        Listing::Plain(path) => jira.get(path).await?,
        Listing::Paged(path) => jira.get_paged(path).await?,
    };

    if let Some(resource) = existing.into_iter().find(|r| r.matches(name)) {
        info!(kind = R::KIND, name, "Reusing existing Jira resource");
        return Ok(Ensured {
            resource,
            created: false,
        });
    }

    // Some create endpoints answer with the new id only.
    let mut created: Value = jira.post(&collection.create_path, create_body).await?;
    if let (Some(created), Some(requested)) = (created.as_object_mut(), create_body.as_object()) {
        for (key, value) in requested {
            created.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    let resource: R = serde_json::from_value(created)?;

    info!(kind = R::KIND, name, "Created Jira resource");
    Ok(Ensured {
        resource,
        created: true,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Select,
    Text,
    Textarea,
    Number,
    Date,
    Checkbox,
}

impl FieldType {
    pub fn jira_keys(&self) -> (&'static str, &'static str) {
        match self {
            FieldType::Select => (
                "com.atlassian.jira.plugin.system.customfieldtypes:select",
                "com.atlassian.jira.plugin.system.customfieldtypes:multiselectsearcher",
            ),
            FieldType::Text => (
                "com.atlassian.jira.plugin.system.customfieldtypes:textfield",
                "com.atlassian.jira.plugin.system.customfieldtypes:textsearcher",
            ),
            FieldType::Textarea => (
                "com.atlassian.jira.plugin.system.customfieldtypes:textarea",
                "com.atlassian.jira.plugin.system.customfieldtypes:textsearcher",
            ),
            FieldType::Number => (
                "com.atlassian.jira.plugin.system.customfieldtypes:float",
                "com.atlassian.jira.plugin.system.customfieldtypes:exactnumber",
            ),
            FieldType::Date => (
                "com.atlassian.jira.plugin.system.customfieldtypes:datepicker",
                "com.atlassian.jira.plugin.system.customfieldtypes:daterange",
            ),
            FieldType::Checkbox => (
                "com.atlassian.jira.plugin.system.customfieldtypes:multicheckboxes",
                "com.atlassian.jira.plugin.system.customfieldtypes:multiselectsearcher",
            ),
        }
    }
}

impl FromStr for FieldType {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "select" | "dropdown" => Ok(FieldType::Select),
            "text" | "textfield" => Ok(FieldType::Text),
            "textarea" | "paragraph" => Ok(FieldType::Textarea),
            "number" | "float" => Ok(FieldType::Number),
            "date" | "datepicker" => Ok(FieldType::Date),
            "checkbox" | "checkboxes" => Ok(FieldType::Checkbox),
            other => Err(RelayError::MalformedPayload(format!(
                "unsupported field_type: {}",
                other
            ))),
        }
    }
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SchemeLink {
    AlreadyMapped { scheme_id: String },
    Added { scheme_id: String },
    Created { scheme_id: String },
}

#[derive(Serialize, Debug)]
pub struct ProjectSummary {
    pub id: String,
    pub key: String,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            key: project.key.clone(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct IssueTypeProvisioned {
    pub project: ProjectSummary,
    pub issue_type: Ensured<IssueType>,
    pub scheme: SchemeLink,
}

#[derive(Serialize, Debug)]
pub struct ScreenAttachment {
    pub screen_id: String,
    pub added: bool,
}

#[derive(Serialize, Debug)]
pub struct ApprovalFieldProvisioned {
    pub project: ProjectSummary,
    pub field: Ensured<CustomField>,
    pub context: Ensured<FieldContext>,
    pub options: Vec<FieldOption>,
    pub screens: Vec<ScreenAttachment>,
}

#[derive(Serialize, Debug)]
pub struct AccessRequestProvisioned {
    pub project: ProjectSummary,
    pub issue_type: Ensured<IssueType>,
    pub issue_type_scheme: SchemeLink,
    pub field: Ensured<CustomField>,
    pub context: Ensured<FieldContext>,
    pub options: Vec<FieldOption>,
    pub screen: Ensured<Screen>,
    pub field_added_to_screen: bool,
    pub screen_scheme: Ensured<ScreenScheme>,
    pub issue_type_screen_scheme: SchemeLink,
    pub field_hidden_elsewhere: bool,
}

pub struct Provisioner<'a> {
    jira: &'a JiraClient,
    project_key: &'a str,
}

impl<'a> Provisioner<'a> {
    pub fn new(jira: &'a JiraClient, project_key: &'a str) -> Self {
        Self { jira, project_key }
    }

    pub async fn ensure_issue_type(
        &self,
        name: &str,
        description: &str,
    ) -> Result<IssueTypeProvisioned> {
        let project = self.jira.get_project(self.project_key).await?;
        let issue_type = self.issue_type(name, description).await?;
        let scheme = self
            .attach_to_issue_type_scheme(&project, &issue_type.resource)
            .await?;

        Ok(IssueTypeProvisioned {
            project: ProjectSummary::from(&project),
            issue_type,
            scheme,
        })
    }

    pub async fn ensure_custom_field(
        &self,
        name: &str,
        description: &str,
        field_type: FieldType,
    ) -> Result<Ensured<CustomField>> {
        let (kind, searcher_key) = field_type.jira_keys();
        ensure_named(
            self.jira,
            &Collection::fields(),
            name,
            &json!({
                "name": name,
                "description": description,
                "type": kind,
                "searcherKey": searcher_key
            }),
        )
        .await
    }

    pub async fn add_approval_field(&self, field_name: &str) -> Result<ApprovalFieldProvisioned> {
        let project = self.jira.get_project(self.project_key).await?;
        let field = self
            .ensure_custom_field(field_name, "Approval decision", FieldType::Select)
            .await?;
        let context = self
            .field_context(
                &field.resource,
                &format!("{} context", field_name),
                &project,
                &[],
            )
            .await?;
        let options = self
            .ensure_options(&field.resource.id, &context.resource.id, &APPROVAL_OPTIONS)
            .await?;

        let mut screens = Vec::new();
        for screen_id in self.project_default_screens(&project).await? {
            let added = self
                .attach_field_to_screen(&screen_id, &field.resource.id)
                .await?;
            screens.push(ScreenAttachment {
                screen_id: screen_id.to_string(),
                added,
            });
        }

        Ok(ApprovalFieldProvisioned {
            project: ProjectSummary::from(&project),
            field,
            context,
            options,
            screens,
        })
    }

    pub async fn provision_access_request(
        &self,
        name: &str,
        description: &str,
        field_name: &str,
    ) -> Result<AccessRequestProvisioned> {
        let project = self.jira.get_project(self.project_key).await?;

        let issue_type = self.issue_type(name, description).await?;
        let issue_type_scheme = self
            .attach_to_issue_type_scheme(&project, &issue_type.resource)
            .await?;

        let field = self
            .ensure_custom_field(field_name, "Approval decision", FieldType::Select)
            .await?;
        let context = self
            .field_context(
                &field.resource,
                &format!("{} context", field_name),
                &project,
                &[issue_type.resource.id.as_str()],
            )
            .await?;
        let options = self
            .ensure_options(&field.resource.id, &context.resource.id, &APPROVAL_OPTIONS)
            .await?;

        let screen_name = format!("{}: {} Screen", project.key, name);
        let screen: Ensured<Screen> = ensure_named(
            self.jira,
            &Collection::screens(),
            &screen_name,
            &json!({ "name": screen_name, "description": description }),
        )
        .await?;
        let field_added_to_screen = self
            .attach_field_to_screen(&screen.resource.id, &field.resource.id)
            .await?;

        let scheme_name = format!("{}: {} Screen Scheme", project.key, name);
        let screen_id = &screen.resource.id;
        let screen_scheme: Ensured<ScreenScheme> = ensure_named(
            self.jira,
            &Collection::screen_schemes(),
            &scheme_name,
            &json!({
                "name": scheme_name,
                "description": description,
                "screens": {
                    "default": screen_id,
                    "create": screen_id,
                    "edit": screen_id,
                    "view": screen_id
                }
            }),
        )
        .await?;

        let issue_type_screen_scheme = self
            .map_issue_type_screen_scheme(
                &project,
                &issue_type.resource.id,
                &screen_scheme.resource.id,
            )
            .await?;

        let field_hidden_elsewhere = self
            .hide_field_elsewhere(&project, &issue_type.resource.id, &field.resource.id)
            .await?;

        info!(
            project = %project.key,
            issue_type = %issue_type.resource.id,
            field = %field.resource.id,
            "Access request provisioning finished"
        );

        Ok(AccessRequestProvisioned {
            project: ProjectSummary::from(&project),
            issue_type,
            issue_type_scheme,
            field,
            context,
            options,
            screen,
            field_added_to_screen,
            screen_scheme,
            issue_type_screen_scheme,
            field_hidden_elsewhere,
        })
    }

    async fn issue_type(&self, name: &str, description: &str) -> Result<Ensured<IssueType>> {
        ensure_named(
            self.jira,
            &Collection::issue_types(),
            name,
            &json!({ "name": name, "description": description, "type": "standard" }),
        )
        .await
    }

    async fn attach_to_issue_type_scheme(
        &self,
        project: &Project,
        issue_type: &IssueType,
    ) -> Result<SchemeLink> {
        let Some(scheme) = self.jira.get_project_issue_type_scheme(&project.id).await? else {
            let scheme_name = format!("{} Issue Type Scheme", project.key);
            let scheme_id = self
                .jira
                .create_issue_type_scheme(&scheme_name, &[issue_type.id.as_str()])
                .await?;
            self.jira
                .assign_issue_type_scheme(&scheme_id, &project.id)
                .await?;
            info!(project = %project.key, scheme_id = %scheme_id, "Created issue type scheme");
            return Ok(SchemeLink::Created { scheme_id });
        };

        let scheme_id = scheme.id.to_string();
        let mappings = self.jira.get_issue_type_scheme_mappings(&scheme.id).await?;
        if mappings.iter().any(|m| m.issue_type_id == issue_type.id) {
            return Ok(SchemeLink::AlreadyMapped { scheme_id });
        }

        self.jira
            .add_issue_types_to_scheme(&scheme.id, &[issue_type.id.as_str()])
            .await?;
        Ok(SchemeLink::Added { scheme_id })
    }

    async fn field_context(
        &self,
        field: &CustomField,
        name: &str,
        project: &Project,
        issue_type_ids: &[&str],
    ) -> Result<Ensured<FieldContext>> {
        ensure_named(
            self.jira,
            &Collection::field_contexts(&field.id),
            name,
            &json!({
                "name": name,
                "description": format!("{} in {}", field.name, project.key),
                "projectIds": [project.id],
                "issueTypeIds": issue_type_ids
            }),
        )
        .await
    }

    async fn ensure_options(
        &self,
        field_id: &str,
        context_id: &str,
        values: &[&str],
    ) -> Result<Vec<FieldOption>> {
        let mut options = self.jira.get_context_options(field_id, context_id).await?;
        let missing = values
            .iter()
            .unique()
            .filter(|value| !options.iter().any(|o| o.value == **value))
            .map(|value| value.to_string())
            .collect::<Vec<_>>();

        if !missing.is_empty() {
            info!(field_id, options = %missing.iter().join(", "), "Creating field options");
            let created = self
                .jira
                .create_context_options(field_id, context_id, &missing)
                .await?;
            options.extend(created);
        }

        Ok(options)
    }

    // false when the field was already on the first tab
    async fn attach_field_to_screen(&self, screen_id: &JiraId, field_id: &str) -> Result<bool> {
        let tabs = self.jira.get_screen_tabs(screen_id).await?;
        let tab = match tabs.into_iter().next() {
            Some(tab) => tab,
            None => self.jira.create_screen_tab(screen_id, "Field Tab").await?,
        };

        let fields = self.jira.get_tab_fields(screen_id, &tab.id).await?;
        if fields.iter().any(|f| f.id == field_id) {
            return Ok(false);
        }

        self.jira.add_field_to_tab(screen_id, &tab.id, field_id).await?;
        info!(%screen_id, field_id, "Added field to screen");
        Ok(true)
    }

    async fn map_issue_type_screen_scheme(
        &self,
        project: &Project,
        issue_type_id: &str,
        screen_scheme_id: &JiraId,
    ) -> Result<SchemeLink> {
        let existing = self
            .jira
            .get_project_issue_type_screen_scheme(&project.id)
            .await?;

        let Some(scheme) = existing else {
            let name = format!("{}: Issue Type Screen Scheme", project.key);
            let scheme_id = self
                .jira
                .create_issue_type_screen_scheme(&name, issue_type_id, screen_scheme_id)
                .await?;
            self.jira
                .assign_issue_type_screen_scheme(&scheme_id, &project.id)
                .await?;
            return Ok(SchemeLink::Created {
                scheme_id: scheme_id.to_string(),
            });
        };

        let scheme_id = scheme.id.to_string();
        let mappings = self
            .jira
            .get_issue_type_screen_scheme_mappings(&scheme.id)
            .await?;
        if mappings.iter().any(|m| m.issue_type_id == issue_type_id) {
            return Ok(SchemeLink::AlreadyMapped { scheme_id });
        }

        self.jira
            .add_issue_type_screen_scheme_mapping(&scheme.id, issue_type_id, screen_scheme_id)
            .await?;
        Ok(SchemeLink::Added { scheme_id })
    }

    async fn project_default_screens(&self, project: &Project) -> Result<Vec<JiraId>> {
        let Some(scheme) = self
            .jira
            .get_project_issue_type_screen_scheme(&project.id)
            .await?
        else {
            return Ok(Vec::new());
        };

        let screen_scheme_ids = self
            .jira
            .get_issue_type_screen_scheme_mappings(&scheme.id)
            .await?
            .into_iter()
            .map(|m| m.screen_scheme_id)
            .unique()
            .collect::<Vec<_>>();
        if screen_scheme_ids.is_empty() {
            return Ok(Vec::new());
        }

        let screen_schemes = self
            .jira
            .get_screen_schemes_by_id(&screen_scheme_ids)
            .await?;
        Ok(screen_schemes
            .iter()
            .filter_map(|s| s.default_screen().cloned())
            .unique_by(|id| id.to_string())
            .collect())
    }

    // Only possible when the issue type has its own field configuration.
    async fn hide_field_elsewhere(
        &self,
        project: &Project,
        issue_type_id: &str,
        field_id: &str,
    ) -> Result<bool> {
        let Some(scheme) = self
            .jira
            .get_project_field_configuration_scheme(&project.id)
            .await?
        else {
            return Ok(false);
        };

        let mappings = self.jira.get_field_configuration_mappings(&scheme.id).await?;
        let Some(own) = mappings.iter().find(|m| m.issue_type_id == issue_type_id) else {
            return Ok(false);
        };

        let others = mappings
            .iter()
            .map(|m| m.field_configuration_id.as_str())
            .filter(|id| *id != own.field_configuration_id)
            .unique()
            .collect::<Vec<_>>();
        for configuration_id in others {
            self.jira.hide_field(configuration_id, field_id).await?;
        }
        Ok(true)
    }
}
