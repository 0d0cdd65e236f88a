//! Declarative authorization table for approval actions.

use crate::approval::types::{ApprovalStage, UserRole};

/// One row of the policy table: `role` may approve or reject at `stage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEntry {
    /// Stage the entry applies to.
    pub stage: ApprovalStage,
    /// Role granted.
    pub role: UserRole,
}

const fn entry(stage: ApprovalStage, role: UserRole) -> PolicyEntry {
    PolicyEntry { stage, role }
}

const DEFAULT_STAGE_ENTRIES: [PolicyEntry; 8] = [
    entry(ApprovalStage::Sales, UserRole::Sales),
    entry(ApprovalStage::Sales, UserRole::Manager),
    entry(ApprovalStage::Sales, UserRole::Admin),
    entry(ApprovalStage::Procurement, UserRole::Procurement),
    entry(ApprovalStage::Procurement, UserRole::Manager),
    entry(ApprovalStage::Procurement, UserRole::Admin),
    entry(ApprovalStage::Management, UserRole::Manager),
    entry(ApprovalStage::Management, UserRole::Admin),
];

const DEFAULT_SUBMIT_ROLES: [UserRole; 4] = [
    UserRole::Estimator,
    UserRole::Sales,
    UserRole::Manager,
    UserRole::Admin,
];

/// Who may act on pricing runs.
///
/// Stage entries govern approve and reject. Submit and send are governed
/// by a flat role list.
#[derive(Debug, Clone)]
pub struct ApprovalPolicy {
    entries: Vec<PolicyEntry>,
    submit_roles: Vec<UserRole>,
    send_roles: Vec<UserRole>,
    sweep_roles: Vec<UserRole>,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            entries: DEFAULT_STAGE_ENTRIES.to_vec(),
            submit_roles: DEFAULT_SUBMIT_ROLES.to_vec(),
            send_roles: DEFAULT_SUBMIT_ROLES.to_vec(),
            sweep_roles: vec![UserRole::Admin],
        }
    }
}

impl ApprovalPolicy {
    /// Builds a policy from explicit stage entries, keeping default role lists.
    #[must_use]
    pub fn with_entries(entries: Vec<PolicyEntry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    /// Returns true if `role` may approve or reject at `stage`.
    #[must_use]
    pub fn allows(&self, stage: ApprovalStage, role: UserRole) -> bool {
        self.entries
            .iter()
            .any(|e| e.stage == stage && e.role == role)
    }

    /// Roles that may approve `stage`, in table order.
    #[must_use]
    pub fn roles_for(&self, stage: ApprovalStage) -> Vec<UserRole> {
        self.entries
            .iter()
            .filter(|e| e.stage == stage)
            .map(|e| e.role)
            .collect()
    }

    /// Stages `role` may approve.
    #[must_use]
    pub fn stages_for(&self, role: UserRole) -> Vec<ApprovalStage> {
        ApprovalStage::ALL
            .into_iter()
            .filter(|stage| self.allows(*stage, role))
            .collect()
    }

    /// Returns true if `role` may submit a pricing run.
    #[must_use]
    pub fn can_submit(&self, role: UserRole) -> bool {
        self.submit_roles.contains(&role)
    }

    /// Returns true if `role` may mark an approved quote as sent.
    #[must_use]
    pub fn can_send(&self, role: UserRole) -> bool {
        self.send_roles.contains(&role)
    }

    /// Returns true if `role` may trigger SLA enforcement manually.
    #[must_use]
    pub fn can_enforce_sla(&self, role: UserRole) -> bool {
        self.sweep_roles.contains(&role)
    }
}
