//! Pure transition planning for the approval state machine.
//!
//! Each function validates the current workflow state and returns a
//! [`TransitionPlan`]: the guard the conditional write must match, the next
//! workflow state, and the single history row the write must append.
//! Nothing here performs I/O.

use chrono::{DateTime, Utc};
use quoteflow_shared::types::{ApprovalHistoryId, PricingRunId, TenantId};

use crate::approval::error::ApprovalError;
use crate::approval::path::ApprovalLevel;
use crate::approval::rules::{ApprovalRulesEngine, sla_deadline};
use crate::approval::types::{
    ApprovalHistoryEntry, ApprovalStage, ApprovalStatus, Approver, HistoryAction, HistoryActor,
    PricingRun, WorkflowState,
};

/// Values a conditional write must still observe to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionGuard {
    /// Pricing run being written.
    pub run_id: PricingRunId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Status read before planning.
    pub status: ApprovalStatus,
    /// Level read before planning.
    pub level: i32,
    /// Revision read before planning.
    pub revision: i64,
}

impl TransitionGuard {
    /// Captures the guard from the run as read.
    #[must_use]
    pub fn capture(run: &PricingRun) -> Self {
        Self {
            run_id: run.id,
            tenant_id: run.tenant_id,
            status: run.workflow.status,
            level: run.workflow.level,
            revision: run.workflow.revision,
        }
    }

    /// Returns true if `state` still matches the guard.
    #[must_use]
    pub fn matches(&self, tenant_id: TenantId, state: &WorkflowState) -> bool {
        self.tenant_id == tenant_id
            && self.status == state.status
            && self.level == state.level
            && self.revision == state.revision
    }
}

/// A validated transition, ready to be written atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Conditional write guard.
    pub guard: TransitionGuard,
    /// Workflow state after the write.
    pub next: WorkflowState,
    /// History row appended in the same transaction.
    pub entry: ApprovalHistoryEntry,
}

/// Stateless planner for workflow transitions.
pub struct ApprovalTransitions;

impl ApprovalTransitions {
    /// Returns true for the edges of the status DAG.
    #[must_use]
    pub fn is_valid_transition(from: ApprovalStatus, to: ApprovalStatus) -> bool {
        matches!(
            (from, to),
            (ApprovalStatus::Draft, ApprovalStatus::PendingApproval)
                | (
                    ApprovalStatus::PendingApproval,
                    ApprovalStatus::Approved | ApprovalStatus::Rejected
                )
                | (ApprovalStatus::Approved, ApprovalStatus::SentToClient)
        )
    }

    fn require(run: &PricingRun, to: ApprovalStatus) -> Result<(), ApprovalError> {
        if Self::is_valid_transition(run.workflow.status, to) {
            Ok(())
        } else {
            Err(ApprovalError::InvalidTransition {
                from: run.workflow.status,
                to,
            })
        }
    }

    /// Requires the run to be pending and returns its current level definition.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if not pending, `CorruptPath` if the stored path
    /// does not describe the current level.
    pub fn pending_level(
        run: &PricingRun,
        to: ApprovalStatus,
    ) -> Result<&ApprovalLevel, ApprovalError> {
        if run.workflow.status != ApprovalStatus::PendingApproval {
            return Err(ApprovalError::InvalidTransition {
                from: run.workflow.status,
                to,
            });
        }
        run.workflow
            .path
            .as_ref()
            .and_then(|path| path.level(run.workflow.level))
            .ok_or(ApprovalError::CorruptPath(run.id))
    }

    /// Draft → pending at level 1 with a freshly computed path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the run is a draft.
    pub fn submit(
        run: &PricingRun,
        submitter: &Approver,
        rules: &ApprovalRulesEngine,
        now: DateTime<Utc>,
    ) -> Result<TransitionPlan, ApprovalError> {
        Self::require(run, ApprovalStatus::PendingApproval)?;

        let path = rules.determine_approval_path(&run.snapshot, now)?;
        let first_deadline = path.sla_deadlines.first().copied();

        let next = WorkflowState {
            status: ApprovalStatus::PendingApproval,
            level: 1,
            current_stage: Some(ApprovalStage::Sales),
            submitted_at: Some(now),
            submitted_by: Some(submitter.id),
            level_submitted_at: Some(now),
            sla_deadline: first_deadline,
            path: Some(path),
            revision: run.workflow.revision + 1,
            ..WorkflowState::draft()
        };

        let entry = history_entry(
            run,
            HistoryAction::Submitted,
            &HistoryActor::from(submitter),
            None,
            ApprovalStatus::PendingApproval,
            1,
            now,
        );

        Ok(TransitionPlan {
            guard: TransitionGuard::capture(run),
            next,
            entry,
        })
    }

    /// Approves the current level; advances or completes the path.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless pending, `CorruptPath` if the path is
    /// inconsistent with the current level.
    pub fn approve(
        run: &PricingRun,
        approver: &Approver,
        notes: Option<String>,
        rules: &ApprovalRulesEngine,
        now: DateTime<Utc>,
    ) -> Result<TransitionPlan, ApprovalError> {
        Self::pending_level(run, ApprovalStatus::Approved)?;
        let path = run
            .workflow
            .path
            .as_ref()
            .ok_or(ApprovalError::CorruptPath(run.id))?;
        let level = run.workflow.level;

        let mut next = run.workflow.clone();
        next.revision += 1;
        next.assigned_approver_id = None;

        if path.is_final(level) {
            next.status = ApprovalStatus::Approved;
            next.approved_at = Some(now);
            next.approved_by = Some(approver.id);
            next.current_stage = None;
            next.sla_deadline = None;
        } else {
            let following = path
                .level(level + 1)
                .ok_or(ApprovalError::CorruptPath(run.id))?;
            next.level = level + 1;
            next.current_stage = Some(following.stage);
            next.level_submitted_at = Some(now);
            next.sla_deadline = Some(rules.deadline_for_level(following, now)?);
        }

        let entry = history_entry(
            run,
            HistoryAction::Approved,
            &HistoryActor::from(approver),
            notes,
            next.status,
            level,
            now,
        );

        Ok(TransitionPlan {
            guard: TransitionGuard::capture(run),
            next,
            entry,
        })
    }

    /// Pending → rejected with a reason.
    ///
    /// # Errors
    ///
    /// `RejectionReasonRequired` on a blank reason, `InvalidTransition`
    /// unless pending.
    pub fn reject(
        run: &PricingRun,
        rejector: &Approver,
        reason: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TransitionPlan, ApprovalError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApprovalError::RejectionReasonRequired);
        }
        Self::require(run, ApprovalStatus::Rejected)?;

        let mut next = run.workflow.clone();
        next.status = ApprovalStatus::Rejected;
        next.rejection_reason = Some(reason.to_string());
        next.current_stage = None;
        next.sla_deadline = None;
        next.assigned_approver_id = None;
        next.revision += 1;

        let history_notes = match notes.map(str::trim).filter(|n| !n.is_empty()) {
            Some(extra) => format!("{reason}\n{extra}"),
            None => reason.to_string(),
        };

        let entry = history_entry(
            run,
            HistoryAction::Rejected,
            &HistoryActor::from(rejector),
            Some(history_notes),
            ApprovalStatus::Rejected,
            run.workflow.level,
            now,
        );

        Ok(TransitionPlan {
            guard: TransitionGuard::capture(run),
            next,
            entry,
        })
    }

    /// Approved → sent to client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the run is approved.
    pub fn mark_sent(
        run: &PricingRun,
        sender: &Approver,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionPlan, ApprovalError> {
        Self::require(run, ApprovalStatus::SentToClient)?;

        let mut next = run.workflow.clone();
        next.status = ApprovalStatus::SentToClient;
        next.sent_at = Some(now);
        next.sent_by = Some(sender.id);
        next.revision += 1;

        let entry = history_entry(
            run,
            HistoryAction::SentToClient,
            &HistoryActor::from(sender),
            notes,
            ApprovalStatus::SentToClient,
            run.workflow.level,
            now,
        );

        Ok(TransitionPlan {
            guard: TransitionGuard::capture(run),
            next,
            entry,
        })
    }

    /// Hands the current level to a backup approver and extends its deadline.
    ///
    /// Status and level are unchanged.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless pending, `CorruptPath` on a bad path,
    /// `Validation` if the extension is not a positive number of hours.
    pub fn assign_backup(
        run: &PricingRun,
        backup: &Approver,
        primary: &Approver,
        extension_hours: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<TransitionPlan, ApprovalError> {
        let level_def = Self::pending_level(run, ApprovalStatus::PendingApproval)?;
        let hours = extension_hours.unwrap_or(level_def.sla_hours);
        let level = run.workflow.level;

        let mut next = run.workflow.clone();
        next.assigned_approver_id = Some(backup.id);
        next.backup_assigned_level = Some(level);
        next.sla_deadline = Some(sla_deadline(now, hours)?);
        next.revision += 1;

        let notes = format!(
            "{} level {level} missed its SLA; reassigned from {} to backup approver {} for {hours}h",
            level_def.stage.display_name(),
            primary.name,
            backup.name
        );

        let entry = history_entry(
            run,
            HistoryAction::BackupAssigned,
            &HistoryActor::system(),
            Some(notes),
            ApprovalStatus::PendingApproval,
            level,
            now,
        );

        Ok(TransitionPlan {
            guard: TransitionGuard::capture(run),
            next,
            entry,
        })
    }

    /// Marks the current level as escalated. Status and level are unchanged.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless pending, `CorruptPath` on a bad path.
    pub fn escalate(run: &PricingRun, now: DateTime<Utc>) -> Result<TransitionPlan, ApprovalError> {
        let level_def = Self::pending_level(run, ApprovalStatus::PendingApproval)?;
        let level = run.workflow.level;

        let mut next = run.workflow.clone();
        next.escalated_level = Some(level);
        next.escalated_at = Some(now);
        next.revision += 1;

        let deadline = run
            .workflow
            .sla_deadline
            .map_or_else(|| "unknown".to_string(), |d| d.to_rfc3339());
        let notes = format!(
            "{} level {level} exceeded its SLA deadline ({deadline})",
            level_def.stage.display_name()
        );

        let entry = history_entry(
            run,
            HistoryAction::Escalated,
            &HistoryActor::system(),
            Some(notes),
            ApprovalStatus::PendingApproval,
            level,
            now,
        );

        Ok(TransitionPlan {
            guard: TransitionGuard::capture(run),
            next,
            entry,
        })
    }
}

fn history_entry(
    run: &PricingRun,
    action: HistoryAction,
    actor: &HistoryActor,
    notes: Option<String>,
    new_status: ApprovalStatus,
    approval_level: i32,
    now: DateTime<Utc>,
) -> ApprovalHistoryEntry {
    ApprovalHistoryEntry {
        id: ApprovalHistoryId::new(),
        tenant_id: run.tenant_id,
        pricing_run_id: run.id,
        action,
        actor_id: actor.id,
        actor_name: actor.name.clone(),
        actor_email: actor.email.clone(),
        notes,
        previous_status: run.workflow.status,
        new_status,
        approval_level,
        created_at: now,
    }
}
