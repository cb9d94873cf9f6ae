mod auth;
mod config;
mod error;
mod external_service;
mod jira_client;
mod models;
mod provisioning;
mod routes;
mod webhook_registration;

#[cfg(test)]
mod test_support;

use axum::routing::{get, post};
use config::Config;
use error::RelayError;
use external_service::ExternalService;
use jira_client::JiraClient;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jira: Arc<JiraClient>,
    pub external: Arc<ExternalService>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, RelayError> {
        Ok(Self {
            jira: Arc::new(JiraClient::new(&config)?),
            external: Arc::new(ExternalService::new(&config)?),
            config: Arc::new(config),
        })
    }
}

pub fn app(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/", get(routes::root::root))
        .route("/webhooks", post(routes::jira_events::jira_webhook))
        .route("/jira-events", post(routes::jira_events::jira_webhook))
        .route("/keeper-events", post(routes::external_events::external_event))
        .route("/external-events", post(routes::external_events::external_event))
        .route("/keeper-webhook", post(routes::external_events::external_event))
        .route("/admin/create-issue-type", post(routes::admin::create_issue_type))
        .route("/admin/create-custom-field", post(routes::admin::create_custom_field))
        .route("/admin/create-access-request", post(routes::admin::create_access_request))
        .route("/admin/add-approval-field", post(routes::admin::add_approval_field))
        .route("/admin/register-webhook", post(routes::admin::register_webhook))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let state = AppState::new(config).expect("Could not create HTTP clients");

    webhook_registration::register_on_startup(&state.jira, &state.config).await;

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Could not bind to {}: {}", state.config.bind_addr, e));
    info!(
        addr = %state.config.bind_addr,
        project = %state.config.project_key,
        forwarding = state.external.is_enabled(),
        "Jira relay listening"
    );

    axum::serve(listener, app(state))
        .await
        .expect("Could not start server");
}
