//! Background job: periodic SLA enforcement across all tenants.
//!
//! Each tick runs one sweep. A failed sweep is logged and the loop keeps
//! going; overdue runs are picked up again on the next tick.

use std::time::Duration;

use chrono::Utc;
use quoteflow_core::approval::{SlaEnforcer, SlaReport};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Spawns the sweep loop. The first sweep runs immediately.
pub fn spawn(enforcer: SlaEnforcer, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(every_secs = every.as_secs(), "SLA enforcement job started");
        loop {
            interval.tick().await;
            run_once(&enforcer).await;
        }
    })
}

/// Runs a single sweep. Returns `None` if the sweep could not start.
pub async fn run_once(enforcer: &SlaEnforcer) -> Option<SlaReport> {
    match enforcer.enforce_sla(Utc::now()).await {
        Ok(report) => {
            if report.totals.sla_expired > 0 {
                tracing::info!(
                    sla_expired = report.totals.sla_expired,
                    escalated = report.totals.escalated,
                    backup_assigned = report.totals.backup_assigned,
                    errors = report.totals.errors,
                    "SLA job processed overdue runs"
                );
            }
            Some(report)
        }
        Err(e) => {
            tracing::error!(error = %e, "SLA job failed");
            None
        }
    }
}
