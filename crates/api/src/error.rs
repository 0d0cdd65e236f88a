//! HTTP rendering of application errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use quoteflow_core::approval::ApprovalError;
use quoteflow_shared::AppError;

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// An [`AppError`] rendered as `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// Shorthand for a 400 with `VALIDATION_ERROR`.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self(AppError::Validation(message.into()))
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<ApprovalError> for ApiError {
    fn from(err: ApprovalError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(code = self.0.error_code(), error = %self.0, "request failed");
        }
        (status, Json(self.0.to_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use quoteflow_core::approval::{ApprovalStage, ApprovalStatus, UserRole};
    use quoteflow_shared::types::PricingRunId;
    use rstest::rstest;

    #[tokio::test]
    async fn test_approval_error_renders_envelope() {
        let err: ApiError = ApprovalError::PricingRunNotFound(PricingRunId::new()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert!(json["error"]["message"].as_str().unwrap().contains("not found"));
    }

    #[test]
    fn test_validation_shorthand() {
        let response = ApiError::validation("bad id").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[rstest]
    #[case(ApprovalError::RejectionReasonRequired, StatusCode::BAD_REQUEST)]
    #[case(ApprovalError::UnknownActor, StatusCode::FORBIDDEN)]
    #[case(
        ApprovalError::NotAuthorized { role: UserRole::Sales, stage: ApprovalStage::Management },
        StatusCode::FORBIDDEN
    )]
    #[case(
        ApprovalError::InvalidTransition {
            from: ApprovalStatus::Rejected,
            to: ApprovalStatus::PendingApproval,
        },
        StatusCode::CONFLICT
    )]
    #[case(ApprovalError::StaleState(PricingRunId::new()), StatusCode::CONFLICT)]
    #[case(ApprovalError::Database("connection reset".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_approval_error_status(#[case] err: ApprovalError, #[case] expected: StatusCode) {
        assert_eq!(ApiError::from(err).into_response().status(), expected);
    }
}
