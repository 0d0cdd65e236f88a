//! In-memory [`ApprovalStore`] for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quoteflow_shared::types::{PricingRunId, SortOrder, TenantId, UserId};
use tokio::sync::RwLock;

use crate::approval::error::ApprovalError;
use crate::approval::store::{
    ApprovalStore, PendingPage, PendingQuery, QueueScope, TransitionWrite,
};
use crate::approval::transition::TransitionPlan;
use crate::approval::types::{
    ApprovalHistoryEntry, ApprovalStatus, Approver, PricingRun, Tenant, UserRole,
};

#[derive(Default)]
struct State {
    tenants: HashMap<TenantId, Tenant>,
    users: HashMap<UserId, Approver>,
    runs: HashMap<PricingRunId, PricingRun>,
    history: Vec<ApprovalHistoryEntry>,
}

/// Store backed by a single lock, so each transition is atomic.
#[derive(Default)]
pub struct InMemoryApprovalStore {
    state: RwLock<State>,
}

impl InMemoryApprovalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a tenant.
    pub async fn insert_tenant(&self, tenant: Tenant) {
        self.state.write().await.tenants.insert(tenant.id, tenant);
    }

    /// Inserts or replaces a user.
    pub async fn insert_user(&self, user: Approver) {
        self.state.write().await.users.insert(user.id, user);
    }

    /// Inserts or replaces a pricing run.
    pub async fn insert_pricing_run(&self, run: PricingRun) {
        self.state.write().await.runs.insert(run.id, run);
    }

    /// Number of history rows across all tenants.
    pub async fn history_len(&self) -> usize {
        self.state.read().await.history.len()
    }
}

fn in_scope(run: &PricingRun, scope: &QueueScope) -> bool {
    match scope {
        QueueScope::All => true,
        QueueScope::Actionable {
            user_id,
            stages,
            role,
        } => {
            let workflow = &run.workflow;
            let by_stage = workflow
                .current_stage
                .is_some_and(|stage| stages.contains(&stage));
            let reassigned = workflow.assigned_approver_id == Some(*user_id);
            by_stage || reassigned || escalated_to(run, *role)
        }
    }
}

fn escalated_to(run: &PricingRun, role: UserRole) -> bool {
    let workflow = &run.workflow;
    workflow.is_escalated_at_current_level()
        && workflow
            .path
            .as_ref()
            .and_then(|path| path.level(workflow.level))
            .is_some_and(|level| level.escalation_roles.contains(&role))
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn find_tenant(&self, tenant_id: TenantId) -> Result<Option<Tenant>, ApprovalError> {
        Ok(self.state.read().await.tenants.get(&tenant_id).cloned())
    }

    async fn list_active_tenants(&self) -> Result<Vec<Tenant>, ApprovalError> {
        let state = self.state.read().await;
        let mut tenants: Vec<Tenant> = state
            .tenants
            .values()
            .filter(|t| t.is_active)
            .cloned()
            .collect();
        tenants.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.0.cmp(&b.id.0)));
        Ok(tenants)
    }

    async fn find_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Option<Approver>, ApprovalError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .get(&user_id)
            .filter(|u| u.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_approvers(
        &self,
        tenant_id: TenantId,
        roles: &[UserRole],
    ) -> Result<Vec<Approver>, ApprovalError> {
        let state = self.state.read().await;
        let mut approvers: Vec<Approver> = state
            .users
            .values()
            .filter(|u| u.tenant_id == tenant_id && roles.contains(&u.role))
            .filter(|u| u.is_eligible_approver())
            .cloned()
            .collect();
        approvers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.0.cmp(&b.id.0)));
        Ok(approvers)
    }

    async fn find_pricing_run(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
    ) -> Result<Option<PricingRun>, ApprovalError> {
        let state = self.state.read().await;
        Ok(state
            .runs
            .get(&run_id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned())
    }

    async fn apply_transition(
        &self,
        plan: &TransitionPlan,
    ) -> Result<TransitionWrite, ApprovalError> {
        let mut state = self.state.write().await;
        let Some(run) = state.runs.get_mut(&plan.guard.run_id) else {
            return Ok(TransitionWrite::Stale);
        };
        if !plan.guard.matches(run.tenant_id, &run.workflow) {
            return Ok(TransitionWrite::Stale);
        }

        run.workflow = plan.next.clone();
        run.updated_at = plan.entry.created_at;
        let updated = run.clone();
        state.history.push(plan.entry.clone());
        Ok(TransitionWrite::Applied(updated))
    }

    async fn list_pending(
        &self,
        tenant_id: TenantId,
        query: &PendingQuery,
    ) -> Result<PendingPage, ApprovalError> {
        let state = self.state.read().await;
        let mut matching: Vec<&PricingRun> = state
            .runs
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| r.workflow.status == ApprovalStatus::PendingApproval)
            .filter(|r| in_scope(r, &query.scope))
            .collect();

        matching.sort_by(|a, b| {
            let key_a = (a.workflow.submitted_at, a.id.0);
            let key_b = (b.workflow.submitted_at, b.id.0);
            match query.sort {
                SortOrder::Newest => key_b.cmp(&key_a),
                SortOrder::Oldest => key_a.cmp(&key_b),
            }
        });

        let page = query.page.normalized();
        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok(PendingPage { items, total })
    }

    async fn list_history(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
    ) -> Result<Vec<ApprovalHistoryEntry>, ApprovalError> {
        let state = self.state.read().await;
        let mut entries: Vec<ApprovalHistoryEntry> = state
            .history
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.pricing_run_id == run_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| (a.created_at, a.id.0).cmp(&(b.created_at, b.id.0)));
        Ok(entries)
    }

    async fn list_sla_expired(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PricingRun>, ApprovalError> {
        let state = self.state.read().await;
        let mut expired: Vec<PricingRun> = state
            .runs
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| r.workflow.status == ApprovalStatus::PendingApproval)
            .filter(|r| r.workflow.sla_deadline.is_some_and(|d| d <= now))
            .filter(|r| !r.workflow.is_escalated_at_current_level())
            .cloned()
            .collect();
        expired.sort_by(|a, b| {
            (a.workflow.sla_deadline, a.id.0).cmp(&(b.workflow.sla_deadline, b.id.0))
        });
        Ok(expired)
    }
}
