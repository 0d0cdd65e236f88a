//! Persistence contract for the approval workflow.
//!
//! Every method is tenant-scoped. A row that exists under another tenant is
//! indistinguishable from a missing one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quoteflow_shared::types::{PageRequest, PricingRunId, SortOrder, TenantId, UserId};

use crate::approval::error::ApprovalError;
use crate::approval::transition::TransitionPlan;
use crate::approval::types::{
    ApprovalHistoryEntry, ApprovalStage, Approver, PricingRun, Tenant, UserRole,
};

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionWrite {
    /// The guard matched; state and history row were committed.
    Applied(PricingRun),
    /// The guard did not match; nothing was written.
    Stale,
}

/// Which pending runs a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueScope {
    /// Every pending run of the tenant.
    All,
    /// Runs a specific user can act on.
    Actionable {
        /// The user whose queue is listed.
        user_id: UserId,
        /// Stages the user's role may approve.
        stages: Vec<ApprovalStage>,
        /// The user's role, matched against escalation roles.
        role: UserRole,
    },
}

/// Listing parameters for pending runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    /// Page to return.
    pub page: PageRequest,
    /// Order by submission time.
    pub sort: SortOrder,
    /// Runs to include.
    pub scope: QueueScope,
}

/// One page of pending runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPage {
    /// Runs on this page.
    pub items: Vec<PricingRun>,
    /// Total matching runs.
    pub total: u64,
}

/// Storage operations needed by the approval service and the SLA sweep.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Looks up a tenant.
    async fn find_tenant(&self, tenant_id: TenantId) -> Result<Option<Tenant>, ApprovalError>;

    /// Lists tenants the SLA sweep should visit.
    async fn list_active_tenants(&self) -> Result<Vec<Tenant>, ApprovalError>;

    /// Looks up a user of the tenant.
    async fn find_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Option<Approver>, ApprovalError>;

    /// Active, approving users holding any of `roles`, ordered by name then id.
    async fn find_approvers(
        &self,
        tenant_id: TenantId,
        roles: &[UserRole],
    ) -> Result<Vec<Approver>, ApprovalError>;

    /// Looks up a pricing run of the tenant.
    async fn find_pricing_run(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
    ) -> Result<Option<PricingRun>, ApprovalError>;

    /// Writes `plan.next` if the run still matches `plan.guard`, appending
    /// `plan.entry` in the same transaction.
    async fn apply_transition(&self, plan: &TransitionPlan)
    -> Result<TransitionWrite, ApprovalError>;

    /// Lists pending runs.
    async fn list_pending(
        &self,
        tenant_id: TenantId,
        query: &PendingQuery,
    ) -> Result<PendingPage, ApprovalError>;

    /// History of a run, oldest first.
    async fn list_history(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
    ) -> Result<Vec<ApprovalHistoryEntry>, ApprovalError>;

    /// Pending runs whose deadline is at or before `now` and whose current
    /// level has not been escalated.
    async fn list_sla_expired(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PricingRun>, ApprovalError>;
}
