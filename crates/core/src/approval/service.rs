//! Approval state machine.
//!
//! Each write follows the same shape: read the run, resolve the actor,
//! plan the transition, check authorization, then commit through a single
//! conditional write. Notifications are enqueued only after the commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use quoteflow_shared::types::{PageRequest, PageResponse, PricingRunId, SortOrder, TenantId, UserId};
use serde::Serialize;
use tracing::{info, warn};

use crate::approval::error::ApprovalError;
use crate::approval::notify::{
    LevelSummary, Notification, NotificationSink, Recipient, RunSummary,
};
use crate::approval::path::ApprovalLevel;
use crate::approval::policy::ApprovalPolicy;
use crate::approval::rules::ApprovalRulesEngine;
use crate::approval::store::{ApprovalStore, PendingQuery, QueueScope, TransitionWrite};
use crate::approval::transition::{ApprovalTransitions, TransitionPlan};
use crate::approval::types::{
    ApprovalHistoryEntry, ApprovalStatus, Approver, PricingRun, UserRole,
};

/// Outcome of enqueueing the notifications of one transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    /// Notifications accepted by the outbox.
    pub enqueued: usize,
    /// Notifications that could not be prepared or enqueued.
    pub failed: usize,
    /// Failure messages.
    pub errors: Vec<String>,
}

impl NotificationReport {
    fn record_failure(&mut self, error: impl Into<String>) {
        self.failed += 1;
        self.errors.push(error.into());
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    /// The run after the write.
    pub pricing_run: PricingRun,
    /// The history row written with it.
    pub history: ApprovalHistoryEntry,
    /// Enqueue outcome; never affects the committed transition.
    pub notifications: NotificationReport,
}

/// Approval workflow operations over a tenant-scoped store.
#[derive(Clone)]
pub struct ApprovalService {
    store: Arc<dyn ApprovalStore>,
    notifier: Arc<dyn NotificationSink>,
    rules: Arc<ApprovalRulesEngine>,
}

impl ApprovalService {
    /// Creates a service.
    #[must_use]
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        notifier: Arc<dyn NotificationSink>,
        rules: ApprovalRulesEngine,
    ) -> Self {
        Self {
            store,
            notifier,
            rules: Arc::new(rules),
        }
    }

    /// The rules engine in use.
    #[must_use]
    pub fn rules(&self) -> &ApprovalRulesEngine {
        &self.rules
    }

    /// The policy table in use.
    #[must_use]
    pub fn policy(&self) -> &ApprovalPolicy {
        self.rules.policy()
    }

    /// Submits a draft run into its approval path.
    ///
    /// # Errors
    ///
    /// `PricingRunNotFound`, `UnknownActor`, `InvalidTransition` unless the
    /// run is a draft, `ActionNotPermitted` for roles that may not submit,
    /// `StaleState` if the run changed concurrently.
    pub async fn submit_for_approval(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
        submitter_id: UserId,
    ) -> Result<TransitionOutcome, ApprovalError> {
        let now = Utc::now();
        let run = self.load_run(tenant_id, run_id).await?;
        let submitter = self.resolve_actor(tenant_id, submitter_id).await?;

        let plan = ApprovalTransitions::submit(&run, &submitter, &self.rules, now)?;
        if !self.policy().can_submit(submitter.role) {
            return Err(ApprovalError::ActionNotPermitted {
                role: submitter.role,
                action: "submit pricing runs",
            });
        }

        let (updated, history) = self.commit(plan).await?;
        info!(
            %tenant_id,
            %run_id,
            levels = updated.workflow.path.as_ref().map_or(0, |p| p.levels.len()),
            "pricing run submitted for approval"
        );

        let mut report = NotificationReport::default();
        if let Some(level) = current_level(&updated) {
            let recipients = self
                .recipients_for_roles(tenant_id, &level.approver_roles, Some(submitter.id), &mut report)
                .await;
            self.enqueue(
                Notification::ApprovalRequested {
                    recipients,
                    run: RunSummary::from(&updated),
                    level: level_summary(&updated, level),
                },
                &mut report,
            );
        }

        Ok(TransitionOutcome {
            pricing_run: updated,
            history,
            notifications: report,
        })
    }

    /// Approves the current level of a pending run.
    ///
    /// # Errors
    ///
    /// `PricingRunNotFound`, `UnknownActor`, `InvalidTransition` unless
    /// pending, `NotAuthorized` if the approver may not act on the current
    /// stage, `StaleState` if the run changed concurrently.
    pub async fn approve_pricing_run(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
        approver_id: UserId,
        notes: Option<String>,
    ) -> Result<TransitionOutcome, ApprovalError> {
        let now = Utc::now();
        let run = self.load_run(tenant_id, run_id).await?;
        let approver = self.resolve_actor(tenant_id, approver_id).await?;

        let level = ApprovalTransitions::pending_level(&run, ApprovalStatus::Approved)?;
        self.authorize_stage_action(&run, level, &approver)?;
        let approved_level = level.level;

        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let plan = ApprovalTransitions::approve(&run, &approver, notes, &self.rules, now)?;
        let (updated, history) = self.commit(plan).await?;

        let mut report = NotificationReport::default();
        if updated.workflow.status == ApprovalStatus::Approved {
            info!(%tenant_id, %run_id, approver = %approver.id, "pricing run fully approved");
            let recipients = self.submitter_recipient(&updated, &mut report).await;
            self.enqueue(
                Notification::Approved {
                    recipients,
                    run: RunSummary::from(&updated),
                    approved_by: approver.name.clone(),
                },
                &mut report,
            );
        } else {
            info!(
                %tenant_id,
                %run_id,
                approved_level,
                next_level = updated.workflow.level,
                "approval level completed"
            );
            if let Some(next) = current_level(&updated) {
                let recipients = self
                    .recipients_for_roles(tenant_id, &next.approver_roles, None, &mut report)
                    .await;
                self.enqueue(
                    Notification::LevelApproved {
                        recipients,
                        run: RunSummary::from(&updated),
                        approved_by: approver.name.clone(),
                        next: level_summary(&updated, next),
                    },
                    &mut report,
                );
            }
        }

        Ok(TransitionOutcome {
            pricing_run: updated,
            history,
            notifications: report,
        })
    }

    /// Rejects a pending run.
    ///
    /// The reason is validated before anything is read.
    ///
    /// # Errors
    ///
    /// `RejectionReasonRequired` on a blank reason, `PricingRunNotFound`,
    /// `UnknownActor`, `InvalidTransition` unless pending, `NotAuthorized`,
    /// `StaleState`.
    pub async fn reject_pricing_run(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
        rejector_id: UserId,
        reason: &str,
        notes: Option<&str>,
    ) -> Result<TransitionOutcome, ApprovalError> {
        if reason.trim().is_empty() {
            return Err(ApprovalError::RejectionReasonRequired);
        }

        let now = Utc::now();
        let run = self.load_run(tenant_id, run_id).await?;
        let rejector = self.resolve_actor(tenant_id, rejector_id).await?;

        let level = ApprovalTransitions::pending_level(&run, ApprovalStatus::Rejected)?;
        self.authorize_stage_action(&run, level, &rejector)?;

        let plan = ApprovalTransitions::reject(&run, &rejector, reason, notes, now)?;
        let (updated, history) = self.commit(plan).await?;
        info!(%tenant_id, %run_id, rejector = %rejector.id, "pricing run rejected");

        let mut report = NotificationReport::default();
        let recipients = self.submitter_recipient(&updated, &mut report).await;
        self.enqueue(
            Notification::Rejected {
                recipients,
                run: RunSummary::from(&updated),
                rejected_by: rejector.name.clone(),
                reason: updated.workflow.rejection_reason.clone().unwrap_or_default(),
            },
            &mut report,
        );

        Ok(TransitionOutcome {
            pricing_run: updated,
            history,
            notifications: report,
        })
    }

    /// Marks an approved quote as delivered to the client.
    ///
    /// # Errors
    ///
    /// `PricingRunNotFound`, `UnknownActor`, `InvalidTransition` unless
    /// approved, `ActionNotPermitted`, `StaleState`.
    pub async fn mark_quote_as_sent(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
        sender_id: UserId,
        notes: Option<String>,
    ) -> Result<TransitionOutcome, ApprovalError> {
        let now = Utc::now();
        let run = self.load_run(tenant_id, run_id).await?;
        let sender = self.resolve_actor(tenant_id, sender_id).await?;

        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let plan = ApprovalTransitions::mark_sent(&run, &sender, notes, now)?;
        if !self.policy().can_send(sender.role) {
            return Err(ApprovalError::ActionNotPermitted {
                role: sender.role,
                action: "mark quotes as sent",
            });
        }

        let (updated, history) = self.commit(plan).await?;
        info!(%tenant_id, %run_id, sender = %sender.id, "quote marked as sent");

        let mut report = NotificationReport::default();
        let recipients = self.submitter_recipient(&updated, &mut report).await;
        self.enqueue(
            Notification::Sent {
                recipients,
                run: RunSummary::from(&updated),
                sent_by: sender.name.clone(),
            },
            &mut report,
        );

        Ok(TransitionOutcome {
            pricing_run: updated,
            history,
            notifications: report,
        })
    }

    /// Lists every pending run of the tenant.
    ///
    /// # Errors
    ///
    /// `TenantNotFound` or a store error.
    pub async fn get_pending_approvals(
        &self,
        tenant_id: TenantId,
        page: PageRequest,
        sort: SortOrder,
    ) -> Result<PageResponse<PricingRun>, ApprovalError> {
        self.ensure_tenant(tenant_id).await?;
        self.list(tenant_id, page, sort, QueueScope::All).await
    }

    /// Lists the pending runs `user_id` can act on: runs at a stage their
    /// role may approve, runs reassigned to them, and runs escalated to
    /// their role.
    ///
    /// # Errors
    ///
    /// `UnknownActor` or a store error.
    pub async fn get_my_approval_queue(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        page: PageRequest,
        sort: SortOrder,
    ) -> Result<PageResponse<PricingRun>, ApprovalError> {
        let user = self.resolve_actor(tenant_id, user_id).await?;
        let stages = if user.can_approve {
            self.policy().stages_for(user.role)
        } else {
            Vec::new()
        };
        let scope = QueueScope::Actionable {
            user_id: user.id,
            stages,
            role: user.role,
        };
        self.list(tenant_id, page, sort, scope).await
    }

    /// History of a run, oldest first.
    ///
    /// # Errors
    ///
    /// `PricingRunNotFound` or a store error.
    pub async fn get_approval_history(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
    ) -> Result<Vec<ApprovalHistoryEntry>, ApprovalError> {
        self.load_run(tenant_id, run_id).await?;
        self.store.list_history(tenant_id, run_id).await
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        page: PageRequest,
        sort: SortOrder,
        scope: QueueScope,
    ) -> Result<PageResponse<PricingRun>, ApprovalError> {
        let page = page.normalized();
        let query = PendingQuery {
            page: page.clone(),
            sort,
            scope,
        };
        let result = self.store.list_pending(tenant_id, &query).await?;
        Ok(PageResponse::new(
            result.items,
            page.page,
            page.per_page,
            result.total,
        ))
    }

    async fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), ApprovalError> {
        self.store
            .find_tenant(tenant_id)
            .await?
            .map(|_| ())
            .ok_or(ApprovalError::TenantNotFound(tenant_id))
    }

    async fn load_run(
        &self,
        tenant_id: TenantId,
        run_id: PricingRunId,
    ) -> Result<PricingRun, ApprovalError> {
        self.store
            .find_pricing_run(tenant_id, run_id)
            .await?
            .ok_or(ApprovalError::PricingRunNotFound(run_id))
    }

    async fn resolve_actor(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Approver, ApprovalError> {
        self.store
            .find_user(tenant_id, user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(ApprovalError::UnknownActor)
    }

    /// The policy table grants the role, or the level was reassigned to the actor.
    fn authorize_stage_action(
        &self,
        run: &PricingRun,
        level: &ApprovalLevel,
        actor: &Approver,
    ) -> Result<(), ApprovalError> {
        let by_policy = self.policy().allows(level.stage, actor.role);
        let by_reassignment = run.workflow.assigned_approver_id == Some(actor.id);
        if actor.can_approve && (by_policy || by_reassignment) {
            Ok(())
        } else {
            Err(ApprovalError::NotAuthorized {
                role: actor.role,
                stage: level.stage,
            })
        }
    }

    async fn commit(
        &self,
        plan: TransitionPlan,
    ) -> Result<(PricingRun, ApprovalHistoryEntry), ApprovalError> {
        match self.store.apply_transition(&plan).await? {
            TransitionWrite::Applied(run) => Ok((run, plan.entry)),
            TransitionWrite::Stale => {
                warn!(
                    run_id = %plan.guard.run_id,
                    expected_status = %plan.guard.status,
                    expected_revision = plan.guard.revision,
                    "conditional write lost a race"
                );
                Err(ApprovalError::StaleState(plan.guard.run_id))
            }
        }
    }

    async fn recipients_for_roles(
        &self,
        tenant_id: TenantId,
        roles: &[UserRole],
        exclude: Option<UserId>,
        report: &mut NotificationReport,
    ) -> Vec<Recipient> {
        match self.store.find_approvers(tenant_id, roles).await {
            Ok(approvers) => approvers
                .iter()
                .filter(|a| Some(a.id) != exclude)
                .map(Recipient::from)
                .collect(),
            Err(err) => {
                report.record_failure(format!("recipient lookup failed: {err}"));
                Vec::new()
            }
        }
    }

    async fn submitter_recipient(
        &self,
        run: &PricingRun,
        report: &mut NotificationReport,
    ) -> Vec<Recipient> {
        let Some(submitter_id) = run.workflow.submitted_by else {
            return Vec::new();
        };
        match self.store.find_user(run.tenant_id, submitter_id).await {
            Ok(Some(user)) if user.is_active => vec![Recipient::from(&user)],
            Ok(_) => Vec::new(),
            Err(err) => {
                report.record_failure(format!("submitter lookup failed: {err}"));
                Vec::new()
            }
        }
    }

    /// Enqueues unless there is nobody to tell.
    fn enqueue(&self, notification: Notification, report: &mut NotificationReport) {
        if notification.recipients().is_empty() {
            return;
        }
        let kind = notification.kind();
        let run_id = notification.run().run_id;
        match self.notifier.enqueue(notification) {
            Ok(()) => report.enqueued += 1,
            Err(err) => {
                warn!(kind, %run_id, error = %err, "failed to enqueue notification");
                report.record_failure(format!("{kind}: {err}"));
            }
        }
    }
}

pub(crate) fn current_level(run: &PricingRun) -> Option<&ApprovalLevel> {
    run.workflow
        .path
        .as_ref()
        .and_then(|p| p.level(run.workflow.level))
}

pub(crate) fn level_summary(run: &PricingRun, level: &ApprovalLevel) -> LevelSummary {
    LevelSummary {
        level: level.level,
        stage: level.stage,
        sla_deadline: run.workflow.sla_deadline,
    }
}

/// Timestamp helper shared with the SLA sweep.
pub(crate) fn is_overdue(run: &PricingRun, now: DateTime<Utc>) -> bool {
    run.workflow.sla_deadline.is_some_and(|d| d <= now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::fixtures::{Fixture, RacingStore};
    use crate::approval::notify::RecordingOutbox;
    use crate::approval::types::{ApprovalStage, HistoryAction};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_scenario_single_level_sales_approval() {
        let fx = Fixture::new().await;
        let run = fx.draft_run(dec!(10000), "standard").await;

        let submitted = fx
            .service
            .submit_for_approval(fx.tenant.id, run.id, fx.estimator.id)
            .await
            .unwrap();
        assert_eq!(submitted.pricing_run.workflow.status, ApprovalStatus::PendingApproval);
        assert_eq!(submitted.pricing_run.workflow.level, 1);
        assert_eq!(submitted.notifications.enqueued, 1);

        let approved = fx
            .service
            .approve_pricing_run(fx.tenant.id, run.id, fx.sales.id, Some("Looks good".into()))
            .await
            .unwrap();
        assert_eq!(approved.pricing_run.workflow.status, ApprovalStatus::Approved);
        assert_eq!(approved.pricing_run.workflow.approved_by, Some(fx.sales.id));

        let history = fx
            .service
            .get_approval_history(fx.tenant.id, run.id)
            .await
            .unwrap();
        let actions: Vec<HistoryAction> = history.iter().map(|h| h.action).collect();
        assert_eq!(actions, vec![HistoryAction::Submitted, HistoryAction::Approved]);
        assert_eq!(history[1].notes.as_deref(), Some("Looks good"));

        let notifications = fx.outbox.recorded();
        assert!(matches!(notifications.last(), Some(Notification::Approved { recipients, .. }) if recipients[0].user_id == fx.estimator.id));
    }

    #[tokio::test]
    async fn test_scenario_healthy_margin_stays_on_sales_path() {
        let fx = Fixture::new().await;
        let mut run = fx.draft_run(dec!(1000), "standard").await;
        run.snapshot.items[0].quantity = dec!(10);
        run.snapshot.items[0].unit_price = dec!(100);
        run.snapshot.items[0].base_cost = Some(dec!(83.333333));
        fx.store.insert_pricing_run(run.clone()).await;
        assert_eq!(run.snapshot.margin().map(|m| m.round_dp(4)), Some(dec!(0.2000)));

        let submitted = fx
            .service
            .submit_for_approval(fx.tenant.id, run.id, fx.estimator.id)
            .await
            .unwrap();
        let path = submitted.pricing_run.workflow.path.clone().unwrap();
        assert_eq!(path.stages(), vec![ApprovalStage::Sales]);
        assert!(path.reasons.is_empty());

        let approved = fx
            .service
            .approve_pricing_run(fx.tenant.id, run.id, fx.sales.id, None)
            .await
            .unwrap();
        assert_eq!(approved.pricing_run.workflow.status, ApprovalStatus::Approved);
        assert_eq!(approved.pricing_run.workflow.current_stage, None);
        assert_eq!(approved.pricing_run.workflow.sla_deadline, None);
    }

    #[tokio::test]
    async fn test_scenario_three_level_path_walks_each_stage() {
        let fx = Fixture::new().await;
        let run = fx.draft_run(dec!(300000), "standard").await;

        fx.service
            .submit_for_approval(fx.tenant.id, run.id, fx.estimator.id)
            .await
            .unwrap();

        let step = fx
            .service
            .approve_pricing_run(fx.tenant.id, run.id, fx.sales.id, None)
            .await
            .unwrap();
        assert_eq!(step.pricing_run.workflow.level, 2);
        assert_eq!(step.pricing_run.workflow.current_stage, Some(ApprovalStage::Procurement));
        assert_eq!(step.pricing_run.workflow.status, ApprovalStatus::PendingApproval);

        // sales may not act on procurement
        let err = fx
            .service
            .approve_pricing_run(fx.tenant.id, run.id, fx.sales.id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::NotAuthorized {
                role: UserRole::Sales,
                stage: ApprovalStage::Procurement
            }
        ));

        fx.service
            .approve_pricing_run(fx.tenant.id, run.id, fx.procurement.id, None)
            .await
            .unwrap();
        let done = fx
            .service
            .approve_pricing_run(fx.tenant.id, run.id, fx.manager.id, None)
            .await
            .unwrap();
        assert_eq!(done.pricing_run.workflow.status, ApprovalStatus::Approved);
        assert_eq!(done.history.approval_level, 3);

        let history = fx.store.list_history(fx.tenant.id, run.id).await.unwrap();
        assert_eq!(history.len(), 4);
        let levels: Vec<i32> = history.iter().map(|h| h.approval_level).collect();
        assert_eq!(levels, vec![1, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_scenario_rejection_is_terminal() {
        let fx = Fixture::new().await;
        let run = fx.draft_run(dec!(10000), "standard").await;
        fx.service
            .submit_for_approval(fx.tenant.id, run.id, fx.estimator.id)
            .await
            .unwrap();

        let rejected = fx
            .service
            .reject_pricing_run(fx.tenant.id, run.id, fx.sales.id, "Freight missing", None)
            .await
            .unwrap();
        assert_eq!(rejected.pricing_run.workflow.status, ApprovalStatus::Rejected);
        assert_eq!(
            rejected.pricing_run.workflow.rejection_reason.as_deref(),
            Some("Freight missing")
        );

        let err = fx
            .service
            .approve_pricing_run(fx.tenant.id, run.id, fx.manager.id, None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert!(err.to_string().contains("rejected"));

        let err = fx
            .service
            .submit_for_approval(fx.tenant.id, run.id, fx.estimator.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::InvalidTransition { .. }));
        assert_eq!(fx.store.history_len().await, 2);
    }

    #[tokio::test]
    async fn test_blank_reason_rejected_before_any_read() {
        let fx = Fixture::new().await;
        // run does not exist; the reason check still wins
        let err = fx
            .service
            .reject_pricing_run(fx.tenant.id, PricingRunId::new(), fx.sales.id, "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::RejectionReasonRequired));
    }

    #[tokio::test]
    async fn test_reject_draft_conflicts_before_authorization() {
        let fx = Fixture::new().await;
        let run = fx.draft_run(dec!(10000), "standard").await;
        let err = fx
            .service
            .reject_pricing_run(fx.tenant.id, run.id, fx.viewer.id, "No", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_mark_sent_flow() {
        let fx = Fixture::new().await;
        let run = fx.draft_run(dec!(10000), "standard").await;

        let err = fx
            .service
            .mark_quote_as_sent(fx.tenant.id, run.id, fx.sales.id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::InvalidTransition {
                from: ApprovalStatus::Draft,
                to: ApprovalStatus::SentToClient
            }
        ));

        fx.service
            .submit_for_approval(fx.tenant.id, run.id, fx.estimator.id)
            .await
            .unwrap();
        fx.service
            .approve_pricing_run(fx.tenant.id, run.id, fx.sales.id, None)
            .await
            .unwrap();

        let err = fx
            .service
            .mark_quote_as_sent(fx.tenant.id, run.id, fx.viewer.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::ActionNotPermitted { .. }));

        let sent = fx
            .service
            .mark_quote_as_sent(fx.tenant.id, run.id, fx.sales.id, Some("Emailed PDF".into()))
            .await
            .unwrap();
        assert_eq!(sent.pricing_run.workflow.status, ApprovalStatus::SentToClient);
        assert_eq!(sent.pricing_run.workflow.sent_by, Some(fx.sales.id));
        assert!(sent.pricing_run.workflow.status.is_terminal());
    }

    #[tokio::test]
    async fn test_cross_tenant_access_is_not_found() {
        let fx = Fixture::new().await;
        let run = fx.draft_run(dec!(10000), "standard").await;
        let other = fx.other_tenant_user().await;

        let err = fx
            .service
            .submit_for_approval(other.tenant_id, run.id, other.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::PricingRunNotFound(_)));

        let err = fx
            .service
            .get_approval_history(other.tenant_id, run.id)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_foreign_tenant_cannot_approve_pending_run() {
        let fx = Fixture::new().await;
        let run = fx.draft_run(dec!(10000), "standard").await;
        fx.service
            .submit_for_approval(fx.tenant.id, run.id, fx.estimator.id)
            .await
            .unwrap();
        let before = fx
            .store
            .find_pricing_run(fx.tenant.id, run.id)
            .await
            .unwrap()
            .unwrap();
        let other = fx.other_tenant_user().await;

        let err = fx
            .service
            .approve_pricing_run(other.tenant_id, run.id, other.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::PricingRunNotFound(_)));
        assert_eq!(err.status_code(), 404);

        let after = fx
            .store
            .find_pricing_run(fx.tenant.id, run.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.workflow.status, ApprovalStatus::PendingApproval);
        assert_eq!(after.workflow.level, before.workflow.level);
        assert_eq!(after.workflow.revision, before.workflow.revision);
        assert_eq!(fx.store.history_len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_actor_is_refused() {
        let fx = Fixture::new().await;
        let run = fx.draft_run(dec!(10000), "standard").await;

        let err = fx
            .service
            .submit_for_approval(fx.tenant.id, run.id, UserId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::UnknownActor));

        let mut retired = fx.estimator.clone();
        retired.id = UserId::new();
        retired.is_active = false;
        fx.store.insert_user(retired.clone()).await;
        let err = fx
            .service
            .submit_for_approval(fx.tenant.id, run.id, retired.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::UnknownActor));
    }

    #[tokio::test]
    async fn test_lost_race_is_stale_and_writes_nothing() {
        let fx = Fixture::new().await;
        let run = fx.draft_run(dec!(10000), "standard").await;
        fx.service
            .submit_for_approval(fx.tenant.id, run.id, fx.estimator.id)
            .await
            .unwrap();

        let racing = Arc::new(RacingStore::new(fx.store.clone()));
        let service = ApprovalService::new(
            racing.clone(),
            Arc::new(RecordingOutbox::new()),
            ApprovalRulesEngine::default(),
        );
        racing.arm_reject(fx.manager.clone()).await;

        let err = service
            .approve_pricing_run(fx.tenant.id, run.id, fx.sales.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::StaleState(_)));
        assert!(err.is_retryable());

        // submitted + the racing rejection, no approval row
        let history = fx.store.list_history(fx.tenant.id, run.id).await.unwrap();
        let actions: Vec<HistoryAction> = history.iter().map(|h| h.action).collect();
        assert_eq!(actions, vec![HistoryAction::Submitted, HistoryAction::Rejected]);
    }

    #[tokio::test]
    async fn test_enqueue_failure_does_not_roll_back() {
        let fx = Fixture::new().await;
        let run = fx.draft_run(dec!(10000), "standard").await;
        fx.outbox.set_failing(true);

        let outcome = fx
            .service
            .submit_for_approval(fx.tenant.id, run.id, fx.estimator.id)
            .await
            .unwrap();
        assert_eq!(outcome.pricing_run.workflow.status, ApprovalStatus::PendingApproval);
        assert_eq!(outcome.notifications.failed, 1);
        assert!(!outcome.notifications.is_clean());
        assert_eq!(fx.store.history_len().await, 1);
    }

    #[tokio::test]
    async fn test_queue_of_sales_user_contains_sales_stage_only() {
        let fx = Fixture::new().await;
        let small = fx.draft_run(dec!(10000), "standard").await;
        let large = fx.draft_run(dec!(60000), "standard").await;
        for id in [small.id, large.id] {
            fx.service
                .submit_for_approval(fx.tenant.id, id, fx.estimator.id)
                .await
                .unwrap();
        }
        // move the large run to procurement
        fx.service
            .approve_pricing_run(fx.tenant.id, large.id, fx.sales.id, None)
            .await
            .unwrap();

        let queue = fx
            .service
            .get_my_approval_queue(fx.tenant.id, fx.sales.id, PageRequest::default(), SortOrder::Newest)
            .await
            .unwrap();
        assert_eq!(queue.meta.total, 1);
        assert_eq!(queue.data[0].id, small.id);

        let queue = fx
            .service
            .get_my_approval_queue(fx.tenant.id, fx.procurement.id, PageRequest::default(), SortOrder::Newest)
            .await
            .unwrap();
        assert_eq!(queue.data.iter().map(|r| r.id).collect::<Vec<_>>(), vec![large.id]);

        let pending = fx
            .service
            .get_pending_approvals(fx.tenant.id, PageRequest::new(1, 1), SortOrder::Oldest)
            .await
            .unwrap();
        assert_eq!(pending.meta.total, 2);
        assert_eq!(pending.meta.total_pages, 2);
        assert_eq!(pending.data.len(), 1);

        let viewer_queue = fx
            .service
            .get_my_approval_queue(fx.tenant.id, fx.viewer.id, PageRequest::default(), SortOrder::Newest)
            .await
            .unwrap();
        assert!(viewer_queue.data.is_empty());
    }

    #[tokio::test]
    async fn test_pending_for_unknown_tenant_is_not_found() {
        let fx = Fixture::new().await;
        let err = fx
            .service
            .get_pending_approvals(TenantId::new(), PageRequest::default(), SortOrder::Newest)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::TenantNotFound(_)));
    }

    #[test]
    fn test_overdue_helper() {
        let mut run = crate::approval::fixtures::bare_run(TenantId::new());
        let now = Utc::now();
        assert!(!is_overdue(&run, now));
        run.workflow.sla_deadline = Some(now);
        assert!(is_overdue(&run, now));
    }
}
