pub mod admin;
pub mod external_events;
pub mod jira_events;
pub mod root;
