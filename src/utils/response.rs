use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    pub field: Option<String>,
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiErrorBody,
}

pub fn success<T>(data: T) -> impl IntoResponse
where
    T: Serialize,
{
    (StatusCode::OK, Json(data))
}

pub fn created<T>(data: T) -> impl IntoResponse
where
    T: Serialize,
{
    (StatusCode::CREATED, Json(data))
}

pub fn no_content() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub fn error(
    code: &str,
    message: impl Into<String>,
    field: Option<String>,
    details: Option<Value>,
    status: StatusCode,
) -> Response {
    let body = ApiErrorResponse {
        success: false,
        error: ApiErrorBody {
            code: code.to_string(),
            message: message.into(),
            field,
            details,
        },
    };

    (status, Json(body)).into_response()
}
