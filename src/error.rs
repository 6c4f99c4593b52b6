use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::GatewayError;
use crate::image::ImageError;
use crate::pdf::GuideError;
use crate::workflow::Step;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("action requires step {expected:?}, session is at {actual:?}")]
    WrongStep { expected: Step, actual: Step },

    /// Another model request is still outstanding for this session.
    #[error("session is busy")]
    Busy,

    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid image: {0}")]
    Image(#[from] ImageError),

    #[error("{0}")]
    Export(#[from] GuideError),

    /// A blocking model call failed. `alert` is the localized sentence shown to the user.
    #[error("{alert}")]
    Blocked {
        alert: String,
        #[source]
        source: GatewayError,
    },
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            WorkflowError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            WorkflowError::WrongStep { .. } => (StatusCode::CONFLICT, "WRONG_STEP"),
            WorkflowError::Busy => (StatusCode::CONFLICT, "BUSY"),
            WorkflowError::MissingPrerequisite(_) => (StatusCode::CONFLICT, "MISSING_PREREQUISITE"),
            WorkflowError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            WorkflowError::Image(_) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE"),
            WorkflowError::Export(GuideError::FontRequired) => (StatusCode::UNPROCESSABLE_ENTITY, "EXPORT_UNAVAILABLE"),
            WorkflowError::Export(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_FAILED"),
            WorkflowError::Blocked { source, .. } if source.is_configuration() => {
                (StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED")
            }
            WorkflowError::Blocked { .. } => (StatusCode::BAD_GATEWAY, "INFERENCE_FAILED"),
        };

        // Only the localized sentence leaves the server for model failures.
        let message = self.to_string();
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blocked_errors_hide_remote_details() {
        let err = WorkflowError::Blocked {
            alert: "Failed to generate hairstyle.".into(),
            source: GatewayError::Transport("status=500 body=secret stack trace".into()),
        };
        assert_eq!(err.to_string(), "Failed to generate hairstyle.");
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn refused_guide_is_unprocessable() {
        let err = WorkflowError::from(GuideError::FontRequired);
        assert!(err.to_string().contains("GUIDE_FONT_PATH"));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn missing_key_maps_to_unavailable() {
        let err = WorkflowError::Blocked { alert: "x".into(), source: GatewayError::MissingApiKey };
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
