use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::store::EventGateway;
use crate::utils::response::success;
use crate::validation::ValidationLimits;

pub mod events;

/// State shared by every handler.
pub struct AppState {
    pub gateway: EventGateway,
    pub limits: ValidationLimits,
    pub api_title: String,
}

pub type SharedState = Arc<AppState>;

#[derive(Serialize)]
struct ServiceInfo {
    message: String,
    version: &'static str,
    docs: &'static str,
    health: &'static str,
    events: &'static str,
}

pub async fn root(State(state): State<SharedState>) -> Response {
    let payload = ServiceInfo {
        message: state.api_title.clone(),
        version: env!("CARGO_PKG_VERSION"),
        docs: "/",
        health: "/health",
        events: "/events",
    };

    success(payload).into_response()
}

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Probes the store with a one-item scan. Always answers 200.
pub async fn health_check(State(state): State<SharedState>) -> Response {
    let payload = match state.gateway.list(Some(1)).await {
        Ok(_) => HealthPayload {
            status: "healthy",
            database: "connected",
            version: Some(env!("CARGO_PKG_VERSION")),
            error: None,
        },
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            HealthPayload {
                status: "unhealthy",
                database: "disconnected",
                version: None,
                error: Some(e.to_string()),
            }
        }
    };

    success(payload).into_response()
}
