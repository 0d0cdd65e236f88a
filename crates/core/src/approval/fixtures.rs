//! Test fixtures shared by the service and SLA tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quoteflow_shared::types::{PricingRunId, RfqId, TenantId, UserId};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::approval::error::ApprovalError;
use crate::approval::memory::InMemoryApprovalStore;
use crate::approval::notify::RecordingOutbox;
use crate::approval::rules::ApprovalRulesEngine;
use crate::approval::service::ApprovalService;
use crate::approval::store::{ApprovalStore, PendingPage, PendingQuery, TransitionWrite};
use crate::approval::transition::{ApprovalTransitions, TransitionPlan};
use crate::approval::types::{
    ApprovalHistoryEntry, Approver, PricingItem, PricingRun, PricingSnapshot, Tenant, UserRole,
    WorkflowState,
};

pub(crate) fn user(tenant_id: TenantId, name: &str, role: UserRole) -> Approver {
    Approver {
        id: UserId::new(),
        tenant_id,
        name: name.to_string(),
        email: format!("{}@acme.test", name.to_lowercase()),
        role,
        can_approve: !matches!(role, UserRole::Viewer | UserRole::Estimator),
        is_active: true,
        backup_user_id: None,
    }
}

pub(crate) fn bare_run(tenant_id: TenantId) -> PricingRun {
    let now = Utc::now();
    PricingRun {
        id: PricingRunId::new(),
        tenant_id,
        rfq_id: RfqId::new(),
        snapshot: PricingSnapshot {
            total_price: Decimal::ONE_THOUSAND,
            currency: "USD".to_string(),
            project_type: "standard".to_string(),
            items: vec![],
        },
        workflow: WorkflowState::draft(),
        created_at: now,
        updated_at: now,
    }
}

pub(crate) struct Fixture {
    pub store: Arc<InMemoryApprovalStore>,
    pub outbox: Arc<RecordingOutbox>,
    pub service: ApprovalService,
    pub tenant: Tenant,
    pub estimator: Approver,
    pub sales: Approver,
    pub procurement: Approver,
    pub manager: Approver,
    pub admin: Approver,
    pub viewer: Approver,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryApprovalStore::new());
        let outbox = Arc::new(RecordingOutbox::new());
        let service = ApprovalService::new(
            store.clone(),
            outbox.clone(),
            ApprovalRulesEngine::default(),
        );

        let tenant = Tenant {
            id: TenantId::new(),
            name: "Acme Industrial".to_string(),
            is_active: true,
        };
        store.insert_tenant(tenant.clone()).await;

        let estimator = user(tenant.id, "Erin", UserRole::Estimator);
        let sales = user(tenant.id, "Sam", UserRole::Sales);
        let procurement = user(tenant.id, "Pat", UserRole::Procurement);
        let manager = user(tenant.id, "Morgan", UserRole::Manager);
        let admin = user(tenant.id, "Alex", UserRole::Admin);
        let viewer = user(tenant.id, "Vic", UserRole::Viewer);
        for u in [&estimator, &sales, &procurement, &manager, &admin, &viewer] {
            store.insert_user(u.clone()).await;
        }

        Self {
            store,
            outbox,
            service,
            tenant,
            estimator,
            sales,
            procurement,
            manager,
            admin,
            viewer,
        }
    }

    pub async fn draft_run(&self, total: Decimal, project_type: &str) -> PricingRun {
        let mut run = bare_run(self.tenant.id);
        run.snapshot.total_price = total;
        run.snapshot.project_type = project_type.to_string();
        run.snapshot.items = vec![PricingItem {
            sku: "FLANGE-WN-8IN".to_string(),
            quantity: Decimal::ONE,
            unit_price: total,
            base_cost: None,
        }];
        self.store.insert_pricing_run(run.clone()).await;
        run
    }

    pub async fn other_tenant_user(&self) -> Approver {
        let tenant = Tenant {
            id: TenantId::new(),
            name: "Globex".to_string(),
            is_active: true,
        };
        self.store.insert_tenant(tenant.clone()).await;
        let user = user(tenant.id, "Olga", UserRole::Admin);
        self.store.insert_user(user.clone()).await;
        user
    }
}

/// Store that lets a competing rejection commit just before the next write.
pub(crate) struct RacingStore {
    inner: Arc<InMemoryApprovalStore>,
    rejector: Mutex<Option<Approver>>,
}

impl RacingStore {
    pub fn new(inner: Arc<InMemoryApprovalStore>) -> Self {
        Self {
            inner,
            rejector: Mutex::new(None),
        }
    }

    pub async fn arm_reject(&self, rejector: Approver) {
        *self.rejector.lock().await = Some(rejector);
    }
}

#[async_trait]
impl ApprovalStore for RacingStore {
    async fn find_tenant(&self, tenant_id: TenantId) -> Result<Option<Tenant>, ApprovalError> {
        self.inner.find_tenant(tenant_id).await
    }

    async fn list_active_tenants(&self) -> Result<Vec<Tenant>, ApprovalError> {
        self.inner.list_active_tenants().await
    }

    async fn find_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Option<Approver>, ApprovalError> {
        self.inner.find_user(tenant_id, user_id).await
    }

    async fn find_approvers(
        &self,
        tenant_id: TenantId,
        roles: &[UserRole],
    ) -> Result<Vec<Approver>, ApprovalError> {
        self.inner.find_approvers(tenant_id, roles).await
    }

    async fn find_pricing_run(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
    ) -> Result<Option<PricingRun>, ApprovalError> {
        self.inner.find_pricing_run(tenant_id, run_id).await
    }

    async fn apply_transition(
        &self,
        plan: &TransitionPlan,
    ) -> Result<TransitionWrite, ApprovalError> {
        if let Some(rejector) = self.rejector.lock().await.take() {
            let current = self
                .inner
                .find_pricing_run(plan.guard.tenant_id, plan.guard.run_id)
                .await?
                .ok_or(ApprovalError::PricingRunNotFound(plan.guard.run_id))?;
            let competing = ApprovalTransitions::reject(
                &current,
                &rejector,
                "Superseded by revised pricing",
                None,
                Utc::now(),
            )?;
            self.inner.apply_transition(&competing).await?;
        }
        self.inner.apply_transition(plan).await
    }

    async fn list_pending(
        &self,
        tenant_id: TenantId,
        query: &PendingQuery,
    ) -> Result<PendingPage, ApprovalError> {
        self.inner.list_pending(tenant_id, query).await
    }

    async fn list_history(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
    ) -> Result<Vec<ApprovalHistoryEntry>, ApprovalError> {
        self.inner.list_history(tenant_id, run_id).await
    }

    async fn list_sla_expired(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PricingRun>, ApprovalError> {
        self.inner.list_sla_expired(tenant_id, now).await
    }
}
