use std::any::Any;

use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::config::{create_api_headers_layer, create_cors_layer};
use crate::handlers::events::{create_event, delete_event, get_event, list_events, update_event};
use crate::handlers::{health_check, root, SharedState};
use crate::utils::error::AppError;

pub fn create_routes(state: SharedState, cors_allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:event_id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(create_api_headers_layer())
        .layer(create_cors_layer(cors_allowed_origins))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());

    AppError::InternalServerError(detail).into_response()
}
