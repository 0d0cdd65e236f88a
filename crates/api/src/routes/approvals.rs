//! Approval workflow routes.
//!
//! The tenant and acting user always come from the bearer token.

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    extractors::IdPath,
    middleware::AuthUser,
};
use quoteflow_core::approval::{ApprovalHistoryEntry, PricingRun, SlaReport, TransitionOutcome};
use quoteflow_shared::AppError;
use quoteflow_shared::types::{PageRequest, PageResponse, PricingRunId, SortOrder};

/// Creates the approval routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pricing-runs/{run_id}/submit", post(submit))
        .route("/pricing-runs/{run_id}/approve", post(approve))
        .route("/pricing-runs/{run_id}/reject", post(reject))
        .route("/pricing-runs/{run_id}/mark-sent", post(mark_sent))
        .route("/pricing-runs/{run_id}/approval-history", get(history))
        .route("/approvals/pending", get(pending))
        .route("/approvals/my-queue", get(my_queue))
        .route("/approvals/enforce-sla", post(enforce_sla))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Optional notes attached to approve and mark-sent.
#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    /// Free-text notes recorded in the history.
    pub notes: Option<String>,
}

/// Request body for rejecting a run.
#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    /// Mandatory, non-blank reason.
    #[serde(default)]
    pub reason: String,
    /// Optional notes appended to the reason.
    pub notes: Option<String>,
}

/// Pagination and sort for pending listings.
#[derive(Debug, Default, Deserialize)]
pub struct PendingParams {
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Page size (default 20, max 100).
    pub per_page: Option<u32>,
    /// `newest` (default) or `oldest`.
    pub sort: Option<SortOrder>,
}

impl PendingParams {
    fn page_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(defaults.page),
            self.per_page.unwrap_or(defaults.per_page),
        )
    }
}

/// Approval history of one run.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// The run.
    pub pricing_run_id: PricingRunId,
    /// Rows, oldest first.
    pub history: Vec<ApprovalHistoryEntry>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/pricing-runs/{run_id}/submit`
async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(run_id): IdPath<PricingRunId>,
) -> ApiResult<Json<TransitionOutcome>> {
    let outcome = state
        .approvals
        .submit_for_approval(auth.tenant_id(), run_id, auth.user_id())
        .await?;
    Ok(Json(outcome))
}

/// POST `/pricing-runs/{run_id}/approve`
async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(run_id): IdPath<PricingRunId>,
    body: Option<Json<NotesRequest>>,
) -> ApiResult<Json<TransitionOutcome>> {
    let notes = body.and_then(|Json(b)| b.notes);
    let outcome = state
        .approvals
        .approve_pricing_run(auth.tenant_id(), run_id, auth.user_id(), notes)
        .await?;
    Ok(Json(outcome))
}

/// POST `/pricing-runs/{run_id}/reject`
async fn reject(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(run_id): IdPath<PricingRunId>,
    body: Result<Json<RejectRequest>, JsonRejection>,
) -> ApiResult<Json<TransitionOutcome>> {
    let Json(body) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    let outcome = state
        .approvals
        .reject_pricing_run(
            auth.tenant_id(),
            run_id,
            auth.user_id(),
            &body.reason,
            body.notes.as_deref(),
        )
        .await?;
    Ok(Json(outcome))
}

/// POST `/pricing-runs/{run_id}/mark-sent`
async fn mark_sent(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(run_id): IdPath<PricingRunId>,
    body: Option<Json<NotesRequest>>,
) -> ApiResult<Json<TransitionOutcome>> {
    let notes = body.and_then(|Json(b)| b.notes);
    let outcome = state
        .approvals
        .mark_quote_as_sent(auth.tenant_id(), run_id, auth.user_id(), notes)
        .await?;
    Ok(Json(outcome))
}

/// GET `/pricing-runs/{run_id}/approval-history`
async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(run_id): IdPath<PricingRunId>,
) -> ApiResult<Json<HistoryResponse>> {
    let history = state
        .approvals
        .get_approval_history(auth.tenant_id(), run_id)
        .await?;
    Ok(Json(HistoryResponse {
        pricing_run_id: run_id,
        history,
    }))
}

/// GET `/approvals/pending`
async fn pending(
    State(state): State<AppState>,
    auth: AuthUser,
    params: Result<Query<PendingParams>, QueryRejection>,
) -> ApiResult<Json<PageResponse<PricingRun>>> {
    let Query(params) = params.map_err(|e| ApiError::validation(e.body_text()))?;
    let page = state
        .approvals
        .get_pending_approvals(
            auth.tenant_id(),
            params.page_request(),
            params.sort.unwrap_or_default(),
        )
        .await?;
    Ok(Json(page))
}

/// GET `/approvals/my-queue`
async fn my_queue(
    State(state): State<AppState>,
    auth: AuthUser,
    params: Result<Query<PendingParams>, QueryRejection>,
) -> ApiResult<Json<PageResponse<PricingRun>>> {
    let Query(params) = params.map_err(|e| ApiError::validation(e.body_text()))?;
    let page = state
        .approvals
        .get_my_approval_queue(
            auth.tenant_id(),
            auth.user_id(),
            params.page_request(),
            params.sort.unwrap_or_default(),
        )
        .await?;
    Ok(Json(page))
}

/// POST `/approvals/enforce-sla` - sweeps the caller's tenant now.
async fn enforce_sla(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<SlaReport>> {
    let allowed = auth
        .role()
        .is_some_and(|role| state.approvals.policy().can_enforce_sla(role));
    if !allowed {
        return Err(AppError::Forbidden("Enforcing SLAs requires the admin role".to_string()).into());
    }

    let tenant_id = auth.tenant_id();
    let report = state.sla.enforce_tenant_sla(tenant_id, Utc::now()).await?;
    info!(
        %tenant_id,
        requested_by = %auth.user_id(),
        escalated = report.totals.escalated,
        backup_assigned = report.totals.backup_assigned,
        "manual SLA sweep"
    );
    Ok(Json(report))
}
