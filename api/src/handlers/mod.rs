pub mod deploy;
pub mod health;
pub mod hooks;
pub mod schedule;
pub mod settings;

// Common response types
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::errors::{DispatchError, ScheduleError, StoreError};
use serde::Serialize;

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub trace_id: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "validation_error" => StatusCode::BAD_REQUEST,
            "dispatch_failed" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<StoreError> for ErrorResponse {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Option store failure");
        ErrorResponse::new("internal_error", "Failed to access settings")
    }
}

impl From<ScheduleError> for ErrorResponse {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::InvalidTime { .. } | ScheduleError::InvalidTimezone(_) => {
                ErrorResponse::new("validation_error", err.to_string())
            }
            other => {
                tracing::error!(error = %other, "Schedule reconciliation failure");
                ErrorResponse::new("internal_error", "Failed to update the build schedule")
            }
        }
    }
}

impl From<DispatchError> for ErrorResponse {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Store(e) => e.into(),
            DispatchError::ClientBuild(_) => {
                ErrorResponse::new("internal_error", err.to_string())
            }
            DispatchError::Status { status, ref body } => {
                let details = serde_json::json!({ "status": status, "body": body });
                ErrorResponse::new("dispatch_failed", err.to_string()).with_details(details)
            }
            DispatchError::Transport(_) => ErrorResponse::new("dispatch_failed", err.to_string()),
        }
    }
}

/// Standard API success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for SuccessResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<SuccessResponse<T>, ErrorResponse>;
