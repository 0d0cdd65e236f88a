//! PostgreSQL implementation of the approval store.
//!
//! Every tenant-scoped query runs in a transaction carrying the RLS tenant
//! context and also filters on `tenant_id` explicitly. Workflow writes are a
//! single conditional `UPDATE` guarded on status, level and revision; the
//! history row is inserted in the same transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::debug;
use uuid::Uuid;

use quoteflow_core::approval::{
    ApprovalError, ApprovalHistoryEntry, ApprovalPath, ApprovalStage, ApprovalStore, Approver,
    PendingPage, PendingQuery, PricingItem, PricingRun, PricingSnapshot, QueueScope, Tenant,
    TransitionPlan, TransitionWrite, UserRole, WorkflowState,
};
use quoteflow_shared::types::{ApprovalHistoryId, PricingRunId, RfqId, SortOrder, TenantId, UserId};

use crate::entities::{
    approval_history, pricing_run_items, pricing_runs,
    sea_orm_active_enums::{self as db_enums, ApprovalStatus as DbStatus},
    tenants, users,
};
use crate::rls::RlsExt;

/// Approval store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct SeaOrmApprovalStore {
    db: DatabaseConnection,
}

impl SeaOrmApprovalStore {
    /// Creates a new approval store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_tenant(&self, tenant: &Tenant) -> Result<(), ApprovalError> {
        let now = Utc::now().fixed_offset();
        tenants::ActiveModel {
            id: Set(tenant.id.0),
            name: Set(tenant.name.clone()),
            is_active: Set(tenant.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Inserts a user into its tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_user(&self, user: &Approver) -> Result<(), ApprovalError> {
        let rls = self.db.with_rls(user.tenant_id).await.map_err(db_err)?;
        let now = Utc::now().fixed_offset();
        users::ActiveModel {
            id: Set(user.id.0),
            tenant_id: Set(user.tenant_id.0),
            name: Set(user.name.clone()),
            email: Set(user.email.clone()),
            role: Set(user.role.into()),
            can_approve: Set(user.can_approve),
            is_active: Set(user.is_active),
            backup_user_id: Set(user.backup_user_id.map(UserId::into_inner)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(rls.transaction())
        .await
        .map_err(db_err)?;
        rls.commit().await.map_err(db_err)
    }

    /// Inserts a priced run with its items.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_pricing_run(&self, run: &PricingRun) -> Result<(), ApprovalError> {
        let rls = self.db.with_rls(run.tenant_id).await.map_err(db_err)?;
        let txn = rls.transaction();

        let mut model = workflow_update(&run.workflow, run.updated_at)?;
        model.id = Set(run.id.0);
        model.tenant_id = Set(run.tenant_id.0);
        model.rfq_id = Set(run.rfq_id.0);
        model.total_price = Set(run.snapshot.total_price);
        model.currency = Set(run.snapshot.currency.clone());
        model.project_type = Set(run.snapshot.project_type.clone());
        model.created_at = Set(run.created_at.fixed_offset());
        model.insert(txn).await.map_err(db_err)?;

        if !run.snapshot.items.is_empty() {
            let items = run
                .snapshot
                .items
                .iter()
                .zip(1..)
                .map(|(item, line_no)| pricing_run_items::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    tenant_id: Set(run.tenant_id.0),
                    pricing_run_id: Set(run.id.0),
                    line_no: Set(line_no),
                    sku: Set(item.sku.clone()),
                    quantity: Set(item.quantity),
                    unit_price: Set(item.unit_price),
                    base_cost: Set(item.base_cost),
                });
            pricing_run_items::Entity::insert_many(items)
                .exec(txn)
                .await
                .map_err(db_err)?;
        }

        rls.commit().await.map_err(db_err)
    }
}

#[async_trait]
impl ApprovalStore for SeaOrmApprovalStore {
    async fn find_tenant(&self, tenant_id: TenantId) -> Result<Option<Tenant>, ApprovalError> {
        let model = tenants::Entity::find_by_id(tenant_id.0)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(tenant_from_model))
    }

    async fn list_active_tenants(&self) -> Result<Vec<Tenant>, ApprovalError> {
        let models = tenants::Entity::find()
            .filter(tenants::Column::IsActive.eq(true))
            .order_by_asc(tenants::Column::Name)
            .order_by_asc(tenants::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(tenant_from_model).collect())
    }

    async fn find_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Option<Approver>, ApprovalError> {
        let rls = self.db.with_rls(tenant_id).await.map_err(db_err)?;
        let model = users::Entity::find_by_id(user_id.0)
            .filter(users::Column::TenantId.eq(tenant_id.0))
            .one(rls.transaction())
            .await
            .map_err(db_err)?;
        rls.commit().await.map_err(db_err)?;
        Ok(model.map(approver_from_model))
    }

    async fn find_approvers(
        &self,
        tenant_id: TenantId,
        roles: &[UserRole],
    ) -> Result<Vec<Approver>, ApprovalError> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }
        let roles: Vec<db_enums::UserRole> = roles.iter().copied().map(Into::into).collect();

        let rls = self.db.with_rls(tenant_id).await.map_err(db_err)?;
        let models = users::Entity::find()
            .filter(users::Column::TenantId.eq(tenant_id.0))
            .filter(users::Column::IsActive.eq(true))
            .filter(users::Column::CanApprove.eq(true))
            .filter(users::Column::Role.is_in(roles))
            .order_by_asc(users::Column::Name)
            .order_by_asc(users::Column::Id)
            .all(rls.transaction())
            .await
            .map_err(db_err)?;
        rls.commit().await.map_err(db_err)?;
        Ok(models.into_iter().map(approver_from_model).collect())
    }

    async fn find_pricing_run(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
    ) -> Result<Option<PricingRun>, ApprovalError> {
        let rls = self.db.with_rls(tenant_id).await.map_err(db_err)?;
        let run = load_run(rls.transaction(), tenant_id, run_id).await?;
        rls.commit().await.map_err(db_err)?;
        Ok(run)
    }

    async fn apply_transition(
        &self,
        plan: &TransitionPlan,
    ) -> Result<TransitionWrite, ApprovalError> {
        let guard = &plan.guard;
        let rls = self.db.with_rls(guard.tenant_id).await.map_err(db_err)?;
        let txn = rls.transaction();

        let update = workflow_update(&plan.next, plan.entry.created_at)?;
        let result = pricing_runs::Entity::update_many()
            .set(update)
            .filter(pricing_runs::Column::Id.eq(guard.run_id.0))
            .filter(pricing_runs::Column::TenantId.eq(guard.tenant_id.0))
            .filter(pricing_runs::Column::ApprovalStatus.eq(DbStatus::from(guard.status)))
            .filter(pricing_runs::Column::ApprovalLevel.eq(guard.level))
            .filter(pricing_runs::Column::Revision.eq(guard.revision))
            .exec(txn)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            rls.rollback().await.map_err(db_err)?;
            debug!(
                pricing_run_id = %guard.run_id,
                expected_status = %guard.status,
                expected_revision = guard.revision,
                "Conditional write matched no rows"
            );
            return Ok(TransitionWrite::Stale);
        }

        history_insert(&plan.entry)
            .insert(txn)
            .await
            .map_err(db_err)?;

        let updated = load_run(txn, guard.tenant_id, guard.run_id)
            .await?
            .ok_or(ApprovalError::PricingRunNotFound(guard.run_id))?;
        rls.commit().await.map_err(db_err)?;
        Ok(TransitionWrite::Applied(updated))
    }

    async fn list_pending(
        &self,
        tenant_id: TenantId,
        query: &PendingQuery,
    ) -> Result<PendingPage, ApprovalError> {
        let mut select = pricing_runs::Entity::find()
            .filter(pricing_runs::Column::TenantId.eq(tenant_id.0))
            .filter(pricing_runs::Column::ApprovalStatus.eq(DbStatus::PendingApproval));

        if let QueueScope::Actionable {
            user_id,
            stages,
            role,
        } = &query.scope
        {
            select = select.filter(actionable_condition(*user_id, stages, *role));
        }

        select = match query.sort {
            SortOrder::Newest => select
                .order_by_desc(pricing_runs::Column::SubmittedAt)
                .order_by_desc(pricing_runs::Column::Id),
            SortOrder::Oldest => select
                .order_by_asc(pricing_runs::Column::SubmittedAt)
                .order_by_asc(pricing_runs::Column::Id),
        };

        let page = query.page.normalized();
        let rls = self.db.with_rls(tenant_id).await.map_err(db_err)?;
        let txn = rls.transaction();
        let total = select.clone().count(txn).await.map_err(db_err)?;
        let models = select
            .offset(page.offset())
            .limit(page.limit())
            .all(txn)
            .await
            .map_err(db_err)?;
        let items = hydrate_runs(txn, tenant_id, models).await?;
        rls.commit().await.map_err(db_err)?;

        Ok(PendingPage { items, total })
    }

    async fn list_history(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
    ) -> Result<Vec<ApprovalHistoryEntry>, ApprovalError> {
        let rls = self.db.with_rls(tenant_id).await.map_err(db_err)?;
        let models = approval_history::Entity::find()
            .filter(approval_history::Column::TenantId.eq(tenant_id.0))
            .filter(approval_history::Column::PricingRunId.eq(run_id.0))
            .order_by_asc(approval_history::Column::CreatedAt)
            .order_by_asc(approval_history::Column::Id)
            .all(rls.transaction())
            .await
            .map_err(db_err)?;
        rls.commit().await.map_err(db_err)?;
        Ok(models.into_iter().map(history_from_model).collect())
    }

    async fn list_sla_expired(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PricingRun>, ApprovalError> {
        let not_escalated = Condition::any()
            .add(pricing_runs::Column::EscalatedLevel.is_null())
            .add(
                Expr::col((pricing_runs::Entity, pricing_runs::Column::EscalatedLevel))
                    .not_equals((pricing_runs::Entity, pricing_runs::Column::ApprovalLevel)),
            );

        let rls = self.db.with_rls(tenant_id).await.map_err(db_err)?;
        let txn = rls.transaction();
        let models = pricing_runs::Entity::find()
            .filter(pricing_runs::Column::TenantId.eq(tenant_id.0))
            .filter(pricing_runs::Column::ApprovalStatus.eq(DbStatus::PendingApproval))
            .filter(pricing_runs::Column::SlaDeadline.lte(now.fixed_offset()))
            .filter(not_escalated)
            .order_by_asc(pricing_runs::Column::SlaDeadline)
            .order_by_asc(pricing_runs::Column::Id)
            .all(txn)
            .await
            .map_err(db_err)?;
        let runs = hydrate_runs(txn, tenant_id, models).await?;
        rls.commit().await.map_err(db_err)?;
        Ok(runs)
    }
}

/// Queue filter: the user's stages, reassignment to the user, or escalation
/// of the current level to the user's role.
fn actionable_condition(user_id: UserId, stages: &[ApprovalStage], role: UserRole) -> Condition {
    let escalated_to_role = Condition::all()
        .add(
            Expr::col((pricing_runs::Entity, pricing_runs::Column::EscalatedLevel))
                .equals((pricing_runs::Entity, pricing_runs::Column::ApprovalLevel)),
        )
        .add(Expr::cust_with_values(
            "jsonb_exists(approval_path -> 'levels' -> (approval_level - 1) -> 'escalation_roles', $1)",
            [role.as_str()],
        ));

    let mut condition = Condition::any()
        .add(pricing_runs::Column::AssignedApproverId.eq(user_id.0))
        .add(escalated_to_role);
    if !stages.is_empty() {
        let stages: Vec<db_enums::ApprovalStage> =
            stages.iter().copied().map(Into::into).collect();
        condition = condition.add(pricing_runs::Column::CurrentStage.is_in(stages));
    }
    condition
}

async fn load_run<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    run_id: PricingRunId,
) -> Result<Option<PricingRun>, ApprovalError> {
    let Some(model) = pricing_runs::Entity::find_by_id(run_id.0)
        .filter(pricing_runs::Column::TenantId.eq(tenant_id.0))
        .one(conn)
        .await
        .map_err(db_err)?
    else {
        return Ok(None);
    };

    let items = pricing_run_items::Entity::find()
        .filter(pricing_run_items::Column::TenantId.eq(tenant_id.0))
        .filter(pricing_run_items::Column::PricingRunId.eq(run_id.0))
        .order_by_asc(pricing_run_items::Column::LineNo)
        .all(conn)
        .await
        .map_err(db_err)?;

    run_from_model(model, items).map(Some)
}

/// Loads items for a batch of runs and converts them, preserving order.
async fn hydrate_runs<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    models: Vec<pricing_runs::Model>,
) -> Result<Vec<PricingRun>, ApprovalError> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let items = pricing_run_items::Entity::find()
        .filter(pricing_run_items::Column::TenantId.eq(tenant_id.0))
        .filter(pricing_run_items::Column::PricingRunId.is_in(ids))
        .order_by_asc(pricing_run_items::Column::PricingRunId)
        .order_by_asc(pricing_run_items::Column::LineNo)
        .all(conn)
        .await
        .map_err(db_err)?;

    let mut by_run: HashMap<Uuid, Vec<pricing_run_items::Model>> = HashMap::new();
    for item in items {
        by_run.entry(item.pricing_run_id).or_default().push(item);
    }

    models
        .into_iter()
        .map(|model| {
            let items = by_run.remove(&model.id).unwrap_or_default();
            run_from_model(model, items)
        })
        .collect()
}

fn db_err(err: DbErr) -> ApprovalError {
    ApprovalError::Database(err.to_string())
}

fn utc(dt: sea_orm::prelude::DateTimeWithTimeZone) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

fn tenant_from_model(model: tenants::Model) -> Tenant {
    Tenant {
        id: TenantId::from_uuid(model.id),
        name: model.name,
        is_active: model.is_active,
    }
}

fn approver_from_model(model: users::Model) -> Approver {
    Approver {
        id: UserId::from_uuid(model.id),
        tenant_id: TenantId::from_uuid(model.tenant_id),
        name: model.name,
        email: model.email,
        role: model.role.into(),
        can_approve: model.can_approve,
        is_active: model.is_active,
        backup_user_id: model.backup_user_id.map(UserId::from_uuid),
    }
}

fn history_from_model(model: approval_history::Model) -> ApprovalHistoryEntry {
    ApprovalHistoryEntry {
        id: ApprovalHistoryId::from_uuid(model.id),
        tenant_id: TenantId::from_uuid(model.tenant_id),
        pricing_run_id: PricingRunId::from_uuid(model.pricing_run_id),
        action: model.action.into(),
        actor_id: model.actor_id.map(UserId::from_uuid),
        actor_name: model.actor_name,
        actor_email: model.actor_email,
        notes: model.notes,
        previous_status: model.previous_status.into(),
        new_status: model.new_status.into(),
        approval_level: model.approval_level,
        created_at: utc(model.created_at),
    }
}

fn run_from_model(
    model: pricing_runs::Model,
    items: Vec<pricing_run_items::Model>,
) -> Result<PricingRun, ApprovalError> {
    let id = PricingRunId::from_uuid(model.id);
    let path = model
        .approval_path
        .map(serde_json::from_value::<ApprovalPath>)
        .transpose()
        .map_err(|_| ApprovalError::CorruptPath(id))?;

    let items = items
        .into_iter()
        .map(|item| PricingItem {
            sku: item.sku,
            quantity: item.quantity,
            unit_price: item.unit_price,
            base_cost: item.base_cost,
        })
        .collect();

    Ok(PricingRun {
        id,
        tenant_id: TenantId::from_uuid(model.tenant_id),
        rfq_id: RfqId::from_uuid(model.rfq_id),
        snapshot: PricingSnapshot {
            total_price: model.total_price,
            currency: model.currency,
            project_type: model.project_type,
            items,
        },
        workflow: WorkflowState {
            status: model.approval_status.into(),
            level: model.approval_level,
            path,
            current_stage: model.current_stage.map(Into::into),
            submitted_at: model.submitted_at.map(utc),
            submitted_by: model.submitted_by.map(UserId::from_uuid),
            level_submitted_at: model.level_submitted_at.map(utc),
            sla_deadline: model.sla_deadline.map(utc),
            approved_at: model.approved_at.map(utc),
            approved_by: model.approved_by.map(UserId::from_uuid),
            rejection_reason: model.rejection_reason,
            sent_at: model.sent_at.map(utc),
            sent_by: model.sent_by.map(UserId::from_uuid),
            assigned_approver_id: model.assigned_approver_id.map(UserId::from_uuid),
            backup_assigned_level: model.backup_assigned_level,
            escalated_level: model.escalated_level,
            escalated_at: model.escalated_at.map(utc),
            revision: model.revision,
        },
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
    })
}

/// Active model carrying every workflow column of `state`.
fn workflow_update(
    state: &WorkflowState,
    updated_at: DateTime<Utc>,
) -> Result<pricing_runs::ActiveModel, ApprovalError> {
    let path = state
        .path
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| ApprovalError::Database(format!("approval path encoding: {e}")))?;

    Ok(pricing_runs::ActiveModel {
        approval_status: Set(state.status.into()),
        approval_level: Set(state.level),
        approval_path: Set(path),
        current_stage: Set(state.current_stage.map(Into::into)),
        submitted_at: Set(state.submitted_at.map(|t| t.fixed_offset())),
        submitted_by: Set(state.submitted_by.map(UserId::into_inner)),
        level_submitted_at: Set(state.level_submitted_at.map(|t| t.fixed_offset())),
        sla_deadline: Set(state.sla_deadline.map(|t| t.fixed_offset())),
        approved_at: Set(state.approved_at.map(|t| t.fixed_offset())),
        approved_by: Set(state.approved_by.map(UserId::into_inner)),
        rejection_reason: Set(state.rejection_reason.clone()),
        sent_at: Set(state.sent_at.map(|t| t.fixed_offset())),
        sent_by: Set(state.sent_by.map(UserId::into_inner)),
        assigned_approver_id: Set(state.assigned_approver_id.map(UserId::into_inner)),
        backup_assigned_level: Set(state.backup_assigned_level),
        escalated_level: Set(state.escalated_level),
        escalated_at: Set(state.escalated_at.map(|t| t.fixed_offset())),
        revision: Set(state.revision),
        updated_at: Set(updated_at.fixed_offset()),
        ..Default::default()
    })
}

fn history_insert(entry: &ApprovalHistoryEntry) -> approval_history::ActiveModel {
    approval_history::ActiveModel {
        id: Set(entry.id.0),
        tenant_id: Set(entry.tenant_id.0),
        pricing_run_id: Set(entry.pricing_run_id.0),
        action: Set(entry.action.into()),
        actor_id: Set(entry.actor_id.map(UserId::into_inner)),
        actor_name: Set(entry.actor_name.clone()),
        actor_email: Set(entry.actor_email.clone()),
        notes: Set(entry.notes.clone()),
        previous_status: Set(entry.previous_status.into()),
        new_status: Set(entry.new_status.into()),
        approval_level: Set(entry.approval_level),
        created_at: Set(entry.created_at.fixed_offset()),
    }
}
