//! Quote approval workflow.
//!
//! # Modules
//!
//! - `types` - Domain types (statuses, stages, pricing runs, history rows)
//! - `path` - Approval path embedded in a submitted run
//! - `policy` - Declarative `{stage, role}` authorization table
//! - `rules` - Path and SLA determination
//! - `transition` - Pure transition planning and the status DAG
//! - `store` - Persistence contract; `memory` is an in-process implementation
//! - `notify` - Notification events, outbox and dispatchers
//! - `service` - The approval state machine
//! - `sla` - SLA enforcement sweep
//! - `error` - Approval error taxonomy

pub mod error;
pub mod memory;
pub mod notify;
pub mod path;
pub mod policy;
pub mod rules;
pub mod service;
pub mod sla;
pub mod store;
pub mod transition;
pub mod types;

#[cfg(test)]
mod fixtures;
#[cfg(test)]
mod rules_props;
#[cfg(test)]
mod transition_props;

pub use error::ApprovalError;
pub use memory::InMemoryApprovalStore;
pub use notify::{
    ChannelOutbox, DispatchOutcome, LevelSummary, LogDispatcher, Notification,
    NotificationDispatcher, NotificationSink, NotifyError, OutboxWorker, Recipient,
    RecordingOutbox, RunSummary,
};
pub use path::{ApprovalLevel, ApprovalPath};
pub use policy::{ApprovalPolicy, PolicyEntry};
pub use rules::{ApprovalRulesConfig, ApprovalRulesEngine};
pub use service::{ApprovalService, NotificationReport, TransitionOutcome};
pub use sla::{SlaCounts, SlaEnforcer, SlaReport, TenantSlaReport};
pub use store::{ApprovalStore, PendingPage, PendingQuery, QueueScope, TransitionWrite};
pub use transition::{ApprovalTransitions, TransitionGuard, TransitionPlan};
pub use types::{
    ApprovalHistoryEntry, ApprovalStage, ApprovalStatus, Approver, HistoryAction, HistoryActor,
    PricingItem, PricingRun, PricingSnapshot, Tenant, UserRole, WorkflowState,
};
