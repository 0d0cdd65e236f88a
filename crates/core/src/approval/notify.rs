//! Approval notifications.
//!
//! The state machine hands [`Notification`]s to a [`NotificationSink`] after
//! a transition commits. Enqueueing never blocks on delivery; a
//! [`NotificationDispatcher`] performs delivery out of band.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quoteflow_shared::types::{PricingRunId, RfqId, TenantId, UserId};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::approval::types::{ApprovalStage, Approver, PricingRun};

/// Addressee of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    /// User ID.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl From<&Approver> for Recipient {
    fn from(approver: &Approver) -> Self {
        Self {
            user_id: approver.id,
            name: approver.name.clone(),
            email: approver.email.clone(),
        }
    }
}

/// Pricing run fields quoted in messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Pricing run ID.
    pub run_id: PricingRunId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// RFQ being priced.
    pub rfq_id: RfqId,
    /// Total quoted price.
    pub total_price: Decimal,
    /// Currency code.
    pub currency: String,
    /// Project classification.
    pub project_type: String,
}

impl From<&PricingRun> for RunSummary {
    fn from(run: &PricingRun) -> Self {
        Self {
            run_id: run.id,
            tenant_id: run.tenant_id,
            rfq_id: run.rfq_id,
            total_price: run.snapshot.total_price,
            currency: run.snapshot.currency.clone(),
            project_type: run.snapshot.project_type.clone(),
        }
    }
}

/// Approval level quoted in messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    /// Level number.
    pub level: i32,
    /// Stage of the level.
    pub stage: ApprovalStage,
    /// Current deadline of the level.
    pub sla_deadline: Option<DateTime<Utc>>,
}

/// An event to deliver, with its recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A run awaits approval at its first level.
    ApprovalRequested {
        /// Approvers of the level.
        recipients: Vec<Recipient>,
        /// The run.
        run: RunSummary,
        /// The level awaiting approval.
        level: LevelSummary,
    },
    /// A level was approved and the next level awaits approval.
    LevelApproved {
        /// Approvers of the next level.
        recipients: Vec<Recipient>,
        /// The run.
        run: RunSummary,
        /// Who approved the previous level.
        approved_by: String,
        /// The next level.
        next: LevelSummary,
    },
    /// The final level was approved.
    Approved {
        /// The submitter.
        recipients: Vec<Recipient>,
        /// The run.
        run: RunSummary,
        /// Who approved the final level.
        approved_by: String,
    },
    /// The run was rejected.
    Rejected {
        /// The submitter.
        recipients: Vec<Recipient>,
        /// The run.
        run: RunSummary,
        /// Who rejected.
        rejected_by: String,
        /// Reason given.
        reason: String,
    },
    /// The quote was delivered to the client.
    Sent {
        /// The submitter.
        recipients: Vec<Recipient>,
        /// The run.
        run: RunSummary,
        /// Who sent the quote.
        sent_by: String,
    },
    /// A backup approver took over an overdue level.
    BackupAssigned {
        /// The backup approver.
        recipients: Vec<Recipient>,
        /// The run.
        run: RunSummary,
        /// The primary approver being covered.
        primary_name: String,
        /// The level handed over.
        level: LevelSummary,
    },
    /// An overdue level was escalated.
    Escalated {
        /// Holders of the escalation roles.
        recipients: Vec<Recipient>,
        /// The run.
        run: RunSummary,
        /// The overdue level.
        level: LevelSummary,
    },
}

impl Notification {
    /// Event name used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApprovalRequested { .. } => "approval_requested",
            Self::LevelApproved { .. } => "level_approved",
            Self::Approved { .. } => "approved",
            Self::Rejected { .. } => "rejected",
            Self::Sent { .. } => "sent",
            Self::BackupAssigned { .. } => "backup_assigned",
            Self::Escalated { .. } => "escalated",
        }
    }

    /// Recipients of the event.
    #[must_use]
    pub fn recipients(&self) -> &[Recipient] {
        match self {
            Self::ApprovalRequested { recipients, .. }
            | Self::LevelApproved { recipients, .. }
            | Self::Approved { recipients, .. }
            | Self::Rejected { recipients, .. }
            | Self::Sent { recipients, .. }
            | Self::BackupAssigned { recipients, .. }
            | Self::Escalated { recipients, .. } => recipients,
        }
    }

    /// The run the event is about.
    #[must_use]
    pub fn run(&self) -> &RunSummary {
        match self {
            Self::ApprovalRequested { run, .. }
            | Self::LevelApproved { run, .. }
            | Self::Approved { run, .. }
            | Self::Rejected { run, .. }
            | Self::Sent { run, .. }
            | Self::BackupAssigned { run, .. }
            | Self::Escalated { run, .. } => run,
        }
    }
}

/// Result of delivering one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    /// Whether delivery succeeded.
    pub success: bool,
    /// Provider message ID on success.
    pub id: Option<String>,
    /// Failure description.
    pub error: Option<String>,
}

impl DispatchOutcome {
    /// Successful delivery.
    #[must_use]
    pub fn delivered(id: impl Into<String>) -> Self {
        Self {
            success: true,
            id: Some(id.into()),
            error: None,
        }
    }

    /// Failed delivery.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            error: Some(error.into()),
        }
    }
}

/// Delivers approval events. Best effort: failures are reported, not raised.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// A level awaits `to`'s approval.
    async fn approval_requested(
        &self,
        to: &Recipient,
        run: &RunSummary,
        level: &LevelSummary,
    ) -> DispatchOutcome;

    /// A level was approved; `next` awaits `to`'s approval.
    async fn level_approved(
        &self,
        to: &Recipient,
        run: &RunSummary,
        approved_by: &str,
        next: &LevelSummary,
    ) -> DispatchOutcome;

    /// The run is fully approved.
    async fn approved(&self, to: &Recipient, run: &RunSummary, approved_by: &str)
    -> DispatchOutcome;

    /// The run was rejected.
    async fn rejected(
        &self,
        to: &Recipient,
        run: &RunSummary,
        rejected_by: &str,
        reason: &str,
    ) -> DispatchOutcome;

    /// The quote was sent.
    async fn sent(&self, to: &Recipient, run: &RunSummary, sent_by: &str) -> DispatchOutcome;

    /// `to` now covers an overdue level.
    async fn backup_assigned(
        &self,
        to: &Recipient,
        run: &RunSummary,
        primary_name: &str,
        level: &LevelSummary,
    ) -> DispatchOutcome;

    /// An overdue level was escalated to `to`.
    async fn escalated(
        &self,
        to: &Recipient,
        run: &RunSummary,
        level: &LevelSummary,
    ) -> DispatchOutcome;

    /// Fans a notification out to each recipient.
    async fn dispatch(&self, notification: &Notification) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::with_capacity(notification.recipients().len());
        for to in notification.recipients() {
            let outcome = match notification {
                Notification::ApprovalRequested { run, level, .. } => {
                    self.approval_requested(to, run, level).await
                }
                Notification::LevelApproved {
                    run,
                    approved_by,
                    next,
                    ..
                } => self.level_approved(to, run, approved_by, next).await,
                Notification::Approved {
                    run, approved_by, ..
                } => self.approved(to, run, approved_by).await,
                Notification::Rejected {
                    run,
                    rejected_by,
                    reason,
                    ..
                } => self.rejected(to, run, rejected_by, reason).await,
                Notification::Sent { run, sent_by, .. } => self.sent(to, run, sent_by).await,
                Notification::BackupAssigned {
                    run,
                    primary_name,
                    level,
                    ..
                } => self.backup_assigned(to, run, primary_name, level).await,
                Notification::Escalated { run, level, .. } => {
                    self.escalated(to, run, level).await
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Errors raised when a notification cannot be enqueued.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The outbox worker has stopped.
    #[error("Notification outbox is closed")]
    Closed,

    /// The sink refused the notification.
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// Fire-and-forget queue for notifications.
pub trait NotificationSink: Send + Sync {
    /// Queues a notification for delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be queued.
    fn enqueue(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Outbox backed by an unbounded Tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelOutbox {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelOutbox {
    /// Creates an outbox and the worker that drains it into `dispatcher`.
    #[must_use]
    pub fn channel(dispatcher: Arc<dyn NotificationDispatcher>) -> (Self, OutboxWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, OutboxWorker { rx, dispatcher })
    }
}

impl NotificationSink for ChannelOutbox {
    fn enqueue(&self, notification: Notification) -> Result<(), NotifyError> {
        self.tx.send(notification).map_err(|_| NotifyError::Closed)
    }
}

/// Drains a [`ChannelOutbox`] until every sender is dropped.
pub struct OutboxWorker {
    rx: mpsc::UnboundedReceiver<Notification>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl OutboxWorker {
    /// Delivers queued notifications, logging each outcome.
    pub async fn run(mut self) {
        while let Some(notification) = self.rx.recv().await {
            let kind = notification.kind();
            let run_id = notification.run().run_id;
            let outcomes = self.dispatcher.dispatch(&notification).await;
            for (to, outcome) in notification.recipients().iter().zip(&outcomes) {
                if outcome.success {
                    tracing::info!(
                        kind,
                        %run_id,
                        recipient = %to.email,
                        message_id = outcome.id.as_deref().unwrap_or_default(),
                        "notification delivered"
                    );
                } else {
                    tracing::warn!(
                        kind,
                        %run_id,
                        recipient = %to.email,
                        error = outcome.error.as_deref().unwrap_or_default(),
                        "notification delivery failed"
                    );
                }
            }
        }
        tracing::debug!("notification outbox closed");
    }

    /// Runs the worker on the Tokio runtime.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Sink that keeps notifications in memory.
#[derive(Debug, Default)]
pub struct RecordingOutbox {
    items: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingOutbox {
    /// Creates an empty recording outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `enqueue` calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Notifications recorded so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<Notification> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drops recorded notifications.
    pub fn clear(&self) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl NotificationSink for RecordingOutbox {
    fn enqueue(&self, notification: Notification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected("recording outbox set to fail".into()));
        }
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}

/// Dispatcher that writes each message to the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

impl LogDispatcher {
    fn log(kind: &str, to: &Recipient, run: &RunSummary, detail: &str) -> DispatchOutcome {
        let id = format!("log-{}", Uuid::now_v7());
        tracing::info!(
            kind,
            run_id = %run.run_id,
            tenant_id = %run.tenant_id,
            recipient = %to.email,
            detail,
            message_id = %id,
            "notification (email disabled)"
        );
        DispatchOutcome::delivered(id)
    }
}

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn approval_requested(
        &self,
        to: &Recipient,
        run: &RunSummary,
        level: &LevelSummary,
    ) -> DispatchOutcome {
        Self::log("approval_requested", to, run, level.stage.as_str())
    }

    async fn level_approved(
        &self,
        to: &Recipient,
        run: &RunSummary,
        approved_by: &str,
        next: &LevelSummary,
    ) -> DispatchOutcome {
        let detail = format!("{approved_by} -> {}", next.stage);
        Self::log("level_approved", to, run, &detail)
    }

    async fn approved(
        &self,
        to: &Recipient,
        run: &RunSummary,
        approved_by: &str,
    ) -> DispatchOutcome {
        Self::log("approved", to, run, approved_by)
    }

    async fn rejected(
        &self,
        to: &Recipient,
        run: &RunSummary,
        rejected_by: &str,
        reason: &str,
    ) -> DispatchOutcome {
        let detail = format!("{rejected_by}: {reason}");
        Self::log("rejected", to, run, &detail)
    }

    async fn sent(&self, to: &Recipient, run: &RunSummary, sent_by: &str) -> DispatchOutcome {
        Self::log("sent", to, run, sent_by)
    }

    async fn backup_assigned(
        &self,
        to: &Recipient,
        run: &RunSummary,
        primary_name: &str,
        level: &LevelSummary,
    ) -> DispatchOutcome {
        let detail = format!("covering {primary_name} at {}", level.stage);
        Self::log("backup_assigned", to, run, &detail)
    }

    async fn escalated(
        &self,
        to: &Recipient,
        run: &RunSummary,
        level: &LevelSummary,
    ) -> DispatchOutcome {
        Self::log("escalated", to, run, level.stage.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    fn recipient(name: &str) -> Recipient {
        Recipient {
            user_id: UserId::new(),
            name: name.to_string(),
            email: format!("{name}@example.com"),
        }
    }

    fn summary() -> RunSummary {
        RunSummary {
            run_id: PricingRunId::new(),
            tenant_id: TenantId::new(),
            rfq_id: RfqId::new(),
            total_price: dec!(12500),
            currency: "USD".to_string(),
            project_type: "standard".to_string(),
        }
    }

    fn requested(recipients: Vec<Recipient>) -> Notification {
        Notification::ApprovalRequested {
            recipients,
            run: summary(),
            level: LevelSummary {
                level: 1,
                stage: ApprovalStage::Sales,
                sla_deadline: None,
            },
        }
    }

    /// Counts calls; fails for recipients named "bounce".
    #[derive(Default)]
    struct CountingDispatcher {
        calls: AtomicUsize,
    }

    impl CountingDispatcher {
        fn outcome(&self, to: &Recipient) -> DispatchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if to.name == "bounce" {
                DispatchOutcome::failed("mailbox unavailable")
            } else {
                DispatchOutcome::delivered(format!("<{}@test>", to.name))
            }
        }
    }

    #[async_trait]
    impl NotificationDispatcher for CountingDispatcher {
        async fn approval_requested(&self, to: &Recipient, _: &RunSummary, _: &LevelSummary) -> DispatchOutcome {
            self.outcome(to)
        }
        async fn level_approved(&self, to: &Recipient, _: &RunSummary, _: &str, _: &LevelSummary) -> DispatchOutcome {
            self.outcome(to)
        }
        async fn approved(&self, to: &Recipient, _: &RunSummary, _: &str) -> DispatchOutcome {
            self.outcome(to)
        }
        async fn rejected(&self, to: &Recipient, _: &RunSummary, _: &str, _: &str) -> DispatchOutcome {
            self.outcome(to)
        }
        async fn sent(&self, to: &Recipient, _: &RunSummary, _: &str) -> DispatchOutcome {
            self.outcome(to)
        }
        async fn backup_assigned(&self, to: &Recipient, _: &RunSummary, _: &str, _: &LevelSummary) -> DispatchOutcome {
            self.outcome(to)
        }
        async fn escalated(&self, to: &Recipient, _: &RunSummary, _: &LevelSummary) -> DispatchOutcome {
            self.outcome(to)
        }
    }

    #[tokio::test]
    async fn test_dispatch_fans_out_per_recipient() {
        let dispatcher = CountingDispatcher::default();
        let outcomes = dispatcher
            .dispatch(&requested(vec![recipient("ana"), recipient("bounce")]))
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert_eq!(outcomes[0].id.as_deref(), Some("<ana@test>"));
        assert!(!outcomes[1].success);
    }

    #[tokio::test]
    async fn test_channel_outbox_drains_into_dispatcher() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let (outbox, worker) = ChannelOutbox::channel(dispatcher.clone());
        let handle = worker.spawn();

        outbox.enqueue(requested(vec![recipient("ana")])).unwrap();
        outbox
            .enqueue(requested(vec![recipient("bo"), recipient("bounce")]))
            .unwrap();
        drop(outbox);

        handle.await.unwrap();
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_channel_outbox_closed_after_worker_stops() {
        let (outbox, worker) = ChannelOutbox::channel(Arc::new(LogDispatcher));
        drop(worker);
        let err = outbox.enqueue(requested(vec![])).unwrap_err();
        assert!(matches!(err, NotifyError::Closed));
    }

    #[test]
    fn test_recording_outbox_failure_toggle() {
        let outbox = RecordingOutbox::new();
        outbox.enqueue(requested(vec![recipient("ana")])).unwrap();
        outbox.set_failing(true);
        assert!(outbox.enqueue(requested(vec![])).is_err());
        outbox.set_failing(false);
        assert_eq!(outbox.recorded().len(), 1);
        outbox.clear();
        assert!(outbox.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_log_dispatcher_always_delivers() {
        let outcomes = LogDispatcher
            .dispatch(&Notification::Rejected {
                recipients: vec![recipient("ana")],
                run: summary(),
                rejected_by: "Bo".to_string(),
                reason: "Margin too thin".to_string(),
            })
            .await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].success);
        assert!(outcomes[0].id.as_deref().unwrap().starts_with("log-"));
    }

    #[test]
    fn test_notification_accessors() {
        let n = requested(vec![recipient("ana")]);
        assert_eq!(n.kind(), "approval_requested");
        assert_eq!(n.recipients().len(), 1);
    }
}
