//! SLA enforcement sweep.
//!
//! For each pending run whose current-level deadline has passed:
//! hand the level to a designated backup approver once, otherwise escalate
//! it to the level's escalation roles. Neither action changes status or
//! level. Per-item failures are counted and never stop the sweep.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use quoteflow_shared::types::TenantId;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::approval::error::ApprovalError;
use crate::approval::notify::{Notification, NotificationSink, Recipient, RunSummary};
use crate::approval::path::ApprovalLevel;
use crate::approval::rules::ApprovalRulesEngine;
use crate::approval::service::{current_level, is_overdue, level_summary};
use crate::approval::store::{ApprovalStore, TransitionWrite};
use crate::approval::transition::{ApprovalTransitions, TransitionPlan};
use crate::approval::types::{Approver, PricingRun, Tenant};

/// Sweep counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaCounts {
    /// Runs found past their deadline.
    pub sla_expired: u32,
    /// Runs escalated.
    pub escalated: u32,
    /// Runs handed to a backup approver.
    pub backup_assigned: u32,
    /// Failures (store errors, lost races, enqueue failures).
    pub errors: u32,
}

impl SlaCounts {
    fn absorb(&mut self, other: &Self) {
        self.sla_expired += other.sla_expired;
        self.escalated += other.escalated;
        self.backup_assigned += other.backup_assigned;
        self.errors += other.errors;
    }
}

/// Counters for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSlaReport {
    /// Tenant swept.
    pub tenant_id: TenantId,
    /// Tenant display name.
    pub tenant_name: String,
    /// Counters.
    #[serde(flatten)]
    pub counts: SlaCounts,
}

/// Aggregate report of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaReport {
    /// Totals across tenants.
    #[serde(flatten)]
    pub totals: SlaCounts,
    /// Per-tenant breakdown.
    pub tenants: Vec<TenantSlaReport>,
}

impl SlaReport {
    fn push(&mut self, tenant: TenantSlaReport) {
        self.totals.absorb(&tenant.counts);
        self.tenants.push(tenant);
    }
}

enum SweepAction {
    BackupAssigned { notify_failed: bool },
    Escalated { notify_failed: bool },
}

/// Runs the SLA sweep against the shared store.
#[derive(Clone)]
pub struct SlaEnforcer {
    store: Arc<dyn ApprovalStore>,
    notifier: Arc<dyn NotificationSink>,
    rules: Arc<ApprovalRulesEngine>,
    backup_extension_hours: Option<i64>,
}

impl SlaEnforcer {
    /// Creates an enforcer. `backup_extension_hours` of `None` grants a
    /// backup the level's own SLA.
    #[must_use]
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        notifier: Arc<dyn NotificationSink>,
        rules: ApprovalRulesEngine,
        backup_extension_hours: Option<i64>,
    ) -> Self {
        Self {
            store,
            notifier,
            rules: Arc::new(rules),
            backup_extension_hours,
        }
    }

    /// The rules engine in use.
    #[must_use]
    pub fn rules(&self) -> &ApprovalRulesEngine {
        &self.rules
    }

    /// Sweeps every active tenant.
    ///
    /// # Errors
    ///
    /// Only if the tenant list itself cannot be read. Failures inside a
    /// tenant are counted in its report.
    pub async fn enforce_sla(&self, now: DateTime<Utc>) -> Result<SlaReport, ApprovalError> {
        let tenants = self.store.list_active_tenants().await?;
        let mut report = SlaReport::default();

        for tenant in tenants {
            let counts = match self.sweep_tenant(&tenant, now).await {
                Ok(counts) => counts,
                Err(err) => {
                    error!(tenant_id = %tenant.id, error = %err, "SLA sweep failed for tenant");
                    SlaCounts {
                        errors: 1,
                        ..SlaCounts::default()
                    }
                }
            };
            report.push(TenantSlaReport {
                tenant_id: tenant.id,
                tenant_name: tenant.name,
                counts,
            });
        }

        info!(
            tenants = report.tenants.len(),
            sla_expired = report.totals.sla_expired,
            escalated = report.totals.escalated,
            backup_assigned = report.totals.backup_assigned,
            errors = report.totals.errors,
            "SLA sweep complete"
        );
        Ok(report)
    }

    /// Sweeps one tenant.
    ///
    /// # Errors
    ///
    /// `TenantNotFound`, or a store error while listing expired runs.
    pub async fn enforce_tenant_sla(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<SlaReport, ApprovalError> {
        let tenant = self
            .store
            .find_tenant(tenant_id)
            .await?
            .ok_or(ApprovalError::TenantNotFound(tenant_id))?;

        let counts = self.sweep_tenant(&tenant, now).await?;
        let mut report = SlaReport::default();
        report.push(TenantSlaReport {
            tenant_id: tenant.id,
            tenant_name: tenant.name,
            counts,
        });
        Ok(report)
    }

    async fn sweep_tenant(
        &self,
        tenant: &Tenant,
        now: DateTime<Utc>,
    ) -> Result<SlaCounts, ApprovalError> {
        let expired = self.store.list_sla_expired(tenant.id, now).await?;
        let mut counts = SlaCounts::default();

        for run in expired.iter().filter(|r| is_overdue(r, now)) {
            counts.sla_expired += 1;
            match self.handle_expired(run, now).await {
                Ok(SweepAction::BackupAssigned { notify_failed }) => {
                    counts.backup_assigned += 1;
                    counts.errors += u32::from(notify_failed);
                }
                Ok(SweepAction::Escalated { notify_failed }) => {
                    counts.escalated += 1;
                    counts.errors += u32::from(notify_failed);
                }
                Err(err) => {
                    counts.errors += 1;
                    warn!(
                        tenant_id = %tenant.id,
                        run_id = %run.id,
                        error = %err,
                        "SLA action failed"
                    );
                }
            }
        }

        Ok(counts)
    }

    async fn handle_expired(
        &self,
        run: &PricingRun,
        now: DateTime<Utc>,
    ) -> Result<SweepAction, ApprovalError> {
        let level = current_level(run).ok_or(ApprovalError::CorruptPath(run.id))?;

        if run.workflow.backup_assigned_level != Some(run.workflow.level)
            && let Some((primary, backup)) = self.find_backup(run, level).await?
        {
            let plan = ApprovalTransitions::assign_backup(
                run,
                &backup,
                &primary,
                self.backup_extension_hours,
                now,
            )?;
            let updated = self.write(plan).await?;
            info!(
                run_id = %run.id,
                level = level.level,
                backup = %backup.id,
                "SLA breached; backup approver assigned"
            );
            let notify_failed = !self.enqueue(Notification::BackupAssigned {
                recipients: vec![Recipient::from(&backup)],
                run: RunSummary::from(&updated),
                primary_name: primary.name.clone(),
                level: level_summary(&updated, level),
            });
            return Ok(SweepAction::BackupAssigned { notify_failed });
        }

        let plan = ApprovalTransitions::escalate(run, now)?;
        let updated = self.write(plan).await?;
        info!(run_id = %run.id, level = level.level, "SLA breached; escalated");

        let recipients = self
            .store
            .find_approvers(run.tenant_id, &level.escalation_roles)
            .await
            .map(|approvers| approvers.iter().map(Recipient::from).collect::<Vec<_>>());
        let notify_failed = match recipients {
            Ok(recipients) if recipients.is_empty() => false,
            Ok(recipients) => !self.enqueue(Notification::Escalated {
                recipients,
                run: RunSummary::from(&updated),
                level: level_summary(&updated, level),
            }),
            Err(err) => {
                warn!(run_id = %run.id, error = %err, "escalation recipient lookup failed");
                true
            }
        };
        Ok(SweepAction::Escalated { notify_failed })
    }

    /// First primary approver of the level, by name, whose designated
    /// backup is an active approver other than themselves.
    async fn find_backup(
        &self,
        run: &PricingRun,
        level: &ApprovalLevel,
    ) -> Result<Option<(Approver, Approver)>, ApprovalError> {
        let primaries = self
            .store
            .find_approvers(run.tenant_id, &level.approver_roles)
            .await?;

        for primary in primaries {
            let Some(backup_id) = primary.backup_user_id.filter(|id| *id != primary.id) else {
                continue;
            };
            if let Some(backup) = self.store.find_user(run.tenant_id, backup_id).await?
                && backup.is_eligible_approver()
            {
                return Ok(Some((primary, backup)));
            }
        }
        Ok(None)
    }

    async fn write(
        &self,
        plan: TransitionPlan,
    ) -> Result<PricingRun, ApprovalError> {
        match self.store.apply_transition(&plan).await? {
            TransitionWrite::Applied(run) => Ok(run),
            TransitionWrite::Stale => Err(ApprovalError::StaleState(plan.guard.run_id)),
        }
    }

    /// Returns false when the outbox refused the notification.
    fn enqueue(&self, notification: Notification) -> bool {
        let kind = notification.kind();
        match self.notifier.enqueue(notification) {
            Ok(()) => true,
            Err(err) => {
                warn!(kind, error = %err, "failed to enqueue SLA notification");
                false
            }
        }
    }
}
