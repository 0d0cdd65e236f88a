//! Approval domain types.
//!
//! A pricing run carries two halves: the priced snapshot (what is being
//! approved) and the workflow state (where it is in the approval path).
//! Only the workflow half is ever written by this crate.

use chrono::{DateTime, Utc};
use quoteflow_shared::types::{ApprovalHistoryId, PricingRunId, RfqId, TenantId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::approval::path::ApprovalPath;

/// Approval status of a pricing run.
///
/// The valid transitions are:
/// - Draft → PendingApproval (submit)
/// - PendingApproval → Approved (approve at the final level)
/// - PendingApproval → Rejected (reject)
/// - Approved → SentToClient (mark sent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Priced but not yet submitted.
    Draft,
    /// Waiting on the current approval level.
    PendingApproval,
    /// All levels approved.
    Approved,
    /// Rejected at some level (terminal).
    Rejected,
    /// Quote delivered to the client (terminal).
    SentToClient,
}

impl ApprovalStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::SentToClient => "sent_to_client",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending_approval" => Some(Self::PendingApproval),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "sent_to_client" => Some(Self::SentToClient),
            _ => None,
        }
    }

    /// Returns true if no further transition is permitted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::SentToClient)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Business function responsible for an approval level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStage {
    /// Always level 1.
    Sales,
    /// Added for high-value or procurement-heavy projects.
    Procurement,
    /// Added for very high value, thin margin or strategic projects.
    Management,
}

impl ApprovalStage {
    /// All stages in path order.
    pub const ALL: [Self; 3] = [Self::Sales, Self::Procurement, Self::Management];

    /// Returns the string representation of the stage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Procurement => "procurement",
            Self::Management => "management",
        }
    }

    /// Parses a stage from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sales" => Some(Self::Sales),
            "procurement" => Some(Self::Procurement),
            "management" => Some(Self::Management),
            _ => None,
        }
    }

    /// Human-readable level name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sales => "Sales",
            Self::Procurement => "Procurement",
            Self::Management => "Management",
        }
    }
}

impl fmt::Display for ApprovalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User role within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Read-only access.
    Viewer,
    /// Prepares pricing runs.
    Estimator,
    /// Sales approver.
    Sales,
    /// Procurement approver.
    Procurement,
    /// Line manager; may act for sales and procurement.
    Manager,
    /// Tenant administrator.
    Admin,
}

impl UserRole {
    /// Parse a role from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "viewer" => Some(Self::Viewer),
            "estimator" => Some(Self::Estimator),
            "sales" => Some(Self::Sales),
            "procurement" => Some(Self::Procurement),
            "manager" => Some(Self::Manager),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Returns the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Estimator => "estimator",
            Self::Sales => "sales",
            Self::Procurement => "procurement",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit action recorded in the approval history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// Run entered the approval path.
    Submitted,
    /// A level was approved.
    Approved,
    /// Run was rejected.
    Rejected,
    /// Level missed its SLA and was escalated.
    Escalated,
    /// Level missed its SLA and was handed to a backup approver.
    BackupAssigned,
    /// Quote was delivered.
    SentToClient,
}

impl HistoryAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
            Self::BackupAssigned => "backup_assigned",
            Self::SentToClient => "sent_to_client",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A priced line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingItem {
    /// Normalized SKU.
    pub sku: String,
    /// Quantity quoted.
    pub quantity: Decimal,
    /// Quoted unit price.
    pub unit_price: Decimal,
    /// Unit cost, when known.
    pub base_cost: Option<Decimal>,
}

/// The priced proposal under approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    /// Total quoted price.
    pub total_price: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Project classification (e.g. `standard`, `turnkey`, `strategic`).
    pub project_type: String,
    /// Line items.
    pub items: Vec<PricingItem>,
}

impl PricingSnapshot {
    /// Blended margin over cost, `(revenue - cost) / cost`.
    ///
    /// Only items with a positive base cost participate. Returns `None`
    /// when no item carries cost data, or when the sums overflow the
    /// decimal range and the margin cannot be known.
    #[must_use]
    pub fn margin(&self) -> Option<Decimal> {
        let (revenue, cost) = self
            .items
            .iter()
            .filter_map(|item| item.base_cost.filter(|c| *c > Decimal::ZERO).map(|c| (item, c)))
            .try_fold((Decimal::ZERO, Decimal::ZERO), |(r, c), (item, unit_cost)| {
                let line_revenue = item.unit_price.checked_mul(item.quantity)?;
                let line_cost = unit_cost.checked_mul(item.quantity)?;
                Some((r.checked_add(line_revenue)?, c.checked_add(line_cost)?))
            })?;

        if cost <= Decimal::ZERO {
            return None;
        }
        revenue.checked_sub(cost)?.checked_div(cost)
    }
}

/// Mutable approval state of a pricing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Current status.
    pub status: ApprovalStatus,
    /// Current level (1-based).
    pub level: i32,
    /// Path computed at submission.
    pub path: Option<ApprovalPath>,
    /// Stage of the current level while pending.
    pub current_stage: Option<ApprovalStage>,
    /// When the current cycle was submitted.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Who submitted the current cycle.
    pub submitted_by: Option<UserId>,
    /// When the current level started.
    pub level_submitted_at: Option<DateTime<Utc>>,
    /// Deadline of the current level.
    pub sla_deadline: Option<DateTime<Utc>>,
    /// When the final level approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// Who approved the final level.
    pub approved_by: Option<UserId>,
    /// Reason given on rejection.
    pub rejection_reason: Option<String>,
    /// When the quote was sent.
    pub sent_at: Option<DateTime<Utc>>,
    /// Who sent the quote.
    pub sent_by: Option<UserId>,
    /// Backup approver holding the current level.
    pub assigned_approver_id: Option<UserId>,
    /// Level at which a backup was assigned.
    pub backup_assigned_level: Option<i32>,
    /// Level at which the run was escalated.
    pub escalated_level: Option<i32>,
    /// When the run was escalated.
    pub escalated_at: Option<DateTime<Utc>>,
    /// Incremented on every workflow write.
    pub revision: i64,
}

impl WorkflowState {
    /// State of a freshly priced run.
    #[must_use]
    pub fn draft() -> Self {
        Self {
            status: ApprovalStatus::Draft,
            level: 1,
            path: None,
            current_stage: None,
            submitted_at: None,
            submitted_by: None,
            level_submitted_at: None,
            sla_deadline: None,
            approved_at: None,
            approved_by: None,
            rejection_reason: None,
            sent_at: None,
            sent_by: None,
            assigned_approver_id: None,
            backup_assigned_level: None,
            escalated_level: None,
            escalated_at: None,
            revision: 0,
        }
    }

    /// Returns true once the current level has been escalated.
    #[must_use]
    pub fn is_escalated_at_current_level(&self) -> bool {
        self.escalated_level == Some(self.level)
    }
}

/// A pricing run as seen by the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRun {
    /// Pricing run ID.
    pub id: PricingRunId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// RFQ the run prices.
    pub rfq_id: RfqId,
    /// Priced content.
    pub snapshot: PricingSnapshot,
    /// Approval state.
    pub workflow: WorkflowState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Tenant isolation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant ID.
    pub id: TenantId,
    /// Display name.
    pub name: String,
    /// Inactive tenants are skipped by the SLA sweep.
    pub is_active: bool,
}

/// A user of a tenant, as relevant to approvals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    /// User ID.
    pub id: UserId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Role within the tenant.
    pub role: UserRole,
    /// Whether the user may approve at all.
    pub can_approve: bool,
    /// Whether the user account is active.
    pub is_active: bool,
    /// Designated backup for SLA misses.
    pub backup_user_id: Option<UserId>,
}

impl Approver {
    /// Returns true when the user may take approval actions.
    #[must_use]
    pub fn is_eligible_approver(&self) -> bool {
        self.is_active && self.can_approve
    }
}

/// Identity recorded on a history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryActor {
    /// User ID; `None` for the SLA sweep.
    pub id: Option<UserId>,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl HistoryActor {
    /// Actor used for automated SLA actions.
    #[must_use]
    pub fn system() -> Self {
        Self {
            id: None,
            name: "SLA Enforcement".to_string(),
            email: "sla-enforcement@quoteflow.local".to_string(),
        }
    }
}

impl From<&Approver> for HistoryActor {
    fn from(approver: &Approver) -> Self {
        Self {
            id: Some(approver.id),
            name: approver.name.clone(),
            email: approver.email.clone(),
        }
    }
}

/// An immutable row of the approval audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalHistoryEntry {
    /// Row ID (time ordered).
    pub id: ApprovalHistoryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Subject of the action.
    pub pricing_run_id: PricingRunId,
    /// What happened.
    pub action: HistoryAction,
    /// Actor user ID, absent for automated actions.
    pub actor_id: Option<UserId>,
    /// Actor display name.
    pub actor_name: String,
    /// Actor email.
    pub actor_email: String,
    /// Free-form notes (rejection reason, approval comment).
    pub notes: Option<String>,
    /// Status before the action.
    pub previous_status: ApprovalStatus,
    /// Status after the action.
    pub new_status: ApprovalStatus,
    /// Level the action applied to.
    pub approval_level: i32,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(unit_price: Decimal, base_cost: Option<Decimal>, quantity: Decimal) -> PricingItem {
        PricingItem {
            sku: "PIPE-6IN-SCH40".to_string(),
            quantity,
            unit_price,
            base_cost,
        }
    }

    fn snapshot(items: Vec<PricingItem>) -> PricingSnapshot {
        PricingSnapshot {
            total_price: dec!(1000),
            currency: "USD".to_string(),
            project_type: "standard".to_string(),
            items,
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ApprovalStatus::Draft,
            ApprovalStatus::PendingApproval,
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
            ApprovalStatus::SentToClient,
        ] {
            assert_eq!(ApprovalStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ApprovalStatus::parse("PENDING_APPROVAL"), Some(ApprovalStatus::PendingApproval));
        assert_eq!(ApprovalStatus::parse("pending"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ApprovalStatus::Rejected.is_terminal());
        assert!(ApprovalStatus::SentToClient.is_terminal());
        assert!(!ApprovalStatus::Approved.is_terminal());
        assert!(!ApprovalStatus::PendingApproval.is_terminal());
        assert!(!ApprovalStatus::Draft.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ApprovalStatus::SentToClient).unwrap();
        assert_eq!(json, "\"sent_to_client\"");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(UserRole::parse("Manager"), Some(UserRole::Manager));
        assert_eq!(UserRole::parse("procurement"), Some(UserRole::Procurement));
        assert_eq!(UserRole::parse("owner"), None);
    }

    #[test]
    fn test_margin_blended_over_items() {
        // revenue 1200 + 500 = 1700, cost 1000 + 400 = 1400
        let snapshot = snapshot(vec![
            item(dec!(120), Some(dec!(100)), dec!(10)),
            item(dec!(50), Some(dec!(40)), dec!(10)),
        ]);
        assert_eq!(snapshot.margin(), Some(dec!(300) / dec!(1400)));
    }

    #[test]
    fn test_margin_twenty_percent() {
        let snapshot = snapshot(vec![item(dec!(120), Some(dec!(100)), dec!(1))]);
        assert_eq!(snapshot.margin(), Some(dec!(0.2)));
    }

    #[test]
    fn test_margin_ignores_items_without_cost() {
        let snapshot = snapshot(vec![
            item(dec!(120), Some(dec!(100)), dec!(1)),
            item(dec!(999), None, dec!(1)),
            item(dec!(999), Some(Decimal::ZERO), dec!(1)),
        ]);
        assert_eq!(snapshot.margin(), Some(dec!(0.2)));
    }

    #[test]
    fn test_margin_none_without_cost_data() {
        let snapshot = snapshot(vec![item(dec!(120), None, dec!(1))]);
        assert_eq!(snapshot.margin(), None);
        assert_eq!(self::snapshot(vec![]).margin(), None);
    }

    #[test]
    fn test_margin_none_when_totals_overflow() {
        let line_overflow = snapshot(vec![item(Decimal::MAX, Some(dec!(1)), dec!(2))]);
        assert_eq!(line_overflow.margin(), None);

        let sum_overflow = snapshot(vec![
            item(Decimal::MAX, Some(Decimal::MAX), dec!(1)),
            item(Decimal::MAX, Some(Decimal::MAX), dec!(1)),
        ]);
        assert_eq!(sum_overflow.margin(), None);
    }

    #[test]
    fn test_draft_workflow_state() {
        let state = WorkflowState::draft();
        assert_eq!(state.status, ApprovalStatus::Draft);
        assert_eq!(state.level, 1);
        assert!(state.path.is_none());
        assert!(!state.is_escalated_at_current_level());
    }

    #[test]
    fn test_eligible_approver() {
        let mut approver = Approver {
            id: UserId::new(),
            tenant_id: TenantId::new(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            role: UserRole::Sales,
            can_approve: true,
            is_active: true,
            backup_user_id: None,
        };
        assert!(approver.is_eligible_approver());
        approver.is_active = false;
        assert!(!approver.is_eligible_approver());
    }
}
