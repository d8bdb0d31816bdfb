use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Registry error: {0}")]
    Registry(#[from] crate::state::RegistryError),

    #[error("Delivery setup error: {0}")]
    Delivery(#[from] crate::alerts::DeliveryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Rejections returned by the inbound webhook endpoint. All of them are 4xx so
/// the provider does not retry a payload that will never parse.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing or invalid authorization")]
    Unauthorized,

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Empty payload")]
    Empty,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            WebhookError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebhookError::Malformed(_) | WebhookError::Empty => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
