//! Error to HTTP mapping.

use api_shared::{ApiResponse, ListResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use ulr_core::{workflow::WorkflowError, AttentionError};

/// A failed request: status code plus the message placed in the envelope's `error` field.
///
/// Storage failures are logged in full and reported as a generic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal error".into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Renders the error in the list envelope shape.
    pub fn into_list_response<T: Serialize>(self) -> Response {
        (self.status, Json(ListResponse::<T>::failure(self.message))).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        let status = match &e {
            WorkflowError::ActorNotIdentified => StatusCode::UNAUTHORIZED,
            WorkflowError::RoleNotPermitted { .. } => StatusCode::FORBIDDEN,
            WorkflowError::AlreadyDecided | WorkflowError::EpisodeClosed => StatusCode::CONFLICT,
            WorkflowError::InsufficientObservation { .. }
            | WorkflowError::MissingClosingReason
            | WorkflowError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<AttentionError> for ApiError {
    fn from(e: AttentionError) -> Self {
        match e {
            AttentionError::Workflow(w) => w.into(),
            AttentionError::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                message: e.to_string(),
            },
            AttentionError::InvalidInput(_) => Self::bad_request(e.to_string()),
            other => {
                tracing::error!("Storage error: {:?}", other);
                Self::internal()
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        tracing::error!("Store task failed: {e}");
        Self::internal()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::failure(self.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulr_core::workflow::Role;

    #[test]
    fn workflow_rejections_map_to_client_errors() {
        let cases = [
            (WorkflowError::ActorNotIdentified, StatusCode::UNAUTHORIZED),
            (
                WorkflowError::RoleNotPermitted {
                    role: Role::Insurer,
                    action: "close clinical attention",
                },
                StatusCode::FORBIDDEN,
            ),
            (WorkflowError::AlreadyDecided, StatusCode::CONFLICT),
            (WorkflowError::EpisodeClosed, StatusCode::CONFLICT),
            (
                WorkflowError::InsufficientObservation { min: 5 },
                StatusCode::BAD_REQUEST,
            ),
            (WorkflowError::MissingClosingReason, StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(AttentionError::from(err)).status(), status);
        }
    }

    #[test]
    fn storage_errors_do_not_leak_details() {
        let err = AttentionError::FileWrite(std::io::Error::other("disk full at /secret/path"));
        let api = ApiError::from(err);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message(), "Internal error");
    }

    #[tokio::test]
    async fn panicked_store_task_is_a_generic_500() {
        let join_error = tokio::task::spawn_blocking(|| panic!("index lock held"))
            .await
            .unwrap_err();
        let api = ApiError::from(join_error);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message(), "Internal error");
    }
}
