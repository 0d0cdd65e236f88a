//! Approval workflow error types.
//!
//! One taxonomy covers the state machine, the rules engine and the SLA
//! sweep. Precondition failures are raised before any write.

use quoteflow_shared::AppError;
use quoteflow_shared::types::{PricingRunId, TenantId};
use thiserror::Error;

use crate::approval::types::{ApprovalStage, ApprovalStatus, UserRole};

/// Errors that can occur during approval operations.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// Malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Rejection reason is required but not provided.
    #[error("Rejection reason is required")]
    RejectionReasonRequired,

    /// Pricing run does not exist in the caller's tenant.
    #[error("Pricing run {0} not found")]
    PricingRunNotFound(PricingRunId),

    /// Tenant does not exist.
    #[error("Tenant {0} not found")]
    TenantNotFound(TenantId),

    /// The current status does not permit the requested transition.
    #[error("Cannot move pricing run from status '{from}' to '{to}'")]
    InvalidTransition {
        /// The current status.
        from: ApprovalStatus,
        /// The attempted target status.
        to: ApprovalStatus,
    },

    /// The run changed between read and conditional write.
    #[error("Pricing run {0} was modified concurrently; re-fetch and retry")]
    StaleState(PricingRunId),

    /// The actor is unknown to the tenant or inactive.
    #[error("User is not an active member of this tenant")]
    UnknownActor,

    /// The actor's role may not act on the current approval level.
    #[error("Role '{role}' may not approve the {stage} level")]
    NotAuthorized {
        /// The actor's role.
        role: UserRole,
        /// The stage of the current level.
        stage: ApprovalStage,
    },

    /// The actor's role may not perform the action at all.
    #[error("Role '{role}' may not {action}")]
    ActionNotPermitted {
        /// The actor's role.
        role: UserRole,
        /// Verb describing the action.
        action: &'static str,
    },

    /// The stored approval path does not describe the current level.
    #[error("Approval path for pricing run {0} is missing or inconsistent")]
    CorruptPath(PricingRunId),

    /// A collaborator (notification outbox) failed.
    #[error("Dependency failure: {0}")]
    Dependency(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl ApprovalError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::RejectionReasonRequired => 400,

            Self::UnknownActor | Self::NotAuthorized { .. } | Self::ActionNotPermitted { .. } => {
                403
            }

            Self::PricingRunNotFound(_) | Self::TenantNotFound(_) => 404,

            Self::InvalidTransition { .. } | Self::StaleState(_) => 409,

            Self::Dependency(_) => 502,

            Self::CorruptPath(_) | Self::Database(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::RejectionReasonRequired => "REJECTION_REASON_REQUIRED",
            Self::PricingRunNotFound(_) => "PRICING_RUN_NOT_FOUND",
            Self::TenantNotFound(_) => "TENANT_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::StaleState(_) => "STALE_STATE",
            Self::UnknownActor => "UNKNOWN_ACTOR",
            Self::NotAuthorized { .. } => "NOT_AUTHORIZED_TO_APPROVE",
            Self::ActionNotPermitted { .. } => "ACTION_NOT_PERMITTED",
            Self::CorruptPath(_) => "CORRUPT_APPROVAL_PATH",
            Self::Dependency(_) => "DEPENDENCY_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns true when the caller should re-fetch and may retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleState(_))
    }
}

impl From<ApprovalError> for AppError {
    fn from(err: ApprovalError) -> Self {
        let message = err.to_string();
        match err {
            ApprovalError::Validation(_) | ApprovalError::RejectionReasonRequired => {
                Self::Validation(message)
            }
            ApprovalError::PricingRunNotFound(_) | ApprovalError::TenantNotFound(_) => {
                Self::NotFound(message)
            }
            ApprovalError::InvalidTransition { .. } => Self::Conflict(message),
            ApprovalError::StaleState(_) => Self::StaleState(message),
            ApprovalError::UnknownActor
            | ApprovalError::NotAuthorized { .. }
            | ApprovalError::ActionNotPermitted { .. } => Self::Forbidden(message),
            ApprovalError::Dependency(_) => Self::ExternalService(message),
            ApprovalError::CorruptPath(_) => Self::Internal(message),
            ApprovalError::Database(_) => Self::Database(message),
        }
    }
}
