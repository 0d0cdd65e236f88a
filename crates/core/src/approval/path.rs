//! Approval path embedded in a pricing run at submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::approval::types::{ApprovalStage, UserRole};

/// One sequential level of an approval path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLevel {
    /// Level number, starting at 1.
    pub level: i32,
    /// Business function that approves this level.
    pub stage: ApprovalStage,
    /// Display name.
    pub name: String,
    /// Roles that may approve this level.
    pub approver_roles: Vec<UserRole>,
    /// Hours allowed before the level breaches its SLA.
    pub sla_hours: i64,
    /// Roles notified when the level breaches its SLA.
    pub escalation_roles: Vec<UserRole>,
}

/// Ordered approval levels with their SLA deadlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPath {
    /// Levels in approval order.
    pub levels: Vec<ApprovalLevel>,
    /// Always true; level 1 is sales.
    pub requires_sales: bool,
    /// Deadline per level, computed at submission.
    pub sla_deadlines: Vec<DateTime<Utc>>,
    /// Why each non-sales level was added.
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl ApprovalPath {
    /// Returns the level definition for a 1-based level number.
    #[must_use]
    pub fn level(&self, level: i32) -> Option<&ApprovalLevel> {
        let index = usize::try_from(level).ok()?.checked_sub(1)?;
        self.levels.get(index)
    }

    /// Number of levels in the path.
    #[must_use]
    pub fn total_levels(&self) -> i32 {
        i32::try_from(self.levels.len()).unwrap_or(i32::MAX)
    }

    /// Returns true if `level` is the last level of the path.
    #[must_use]
    pub fn is_final(&self, level: i32) -> bool {
        level == self.total_levels()
    }

    /// Returns true if the path contains the given stage.
    #[must_use]
    pub fn contains_stage(&self, stage: ApprovalStage) -> bool {
        self.levels.iter().any(|l| l.stage == stage)
    }

    /// Stages in path order.
    #[must_use]
    pub fn stages(&self) -> Vec<ApprovalStage> {
        self.levels.iter().map(|l| l.stage).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(level: i32, stage: ApprovalStage) -> ApprovalLevel {
        ApprovalLevel {
            level,
            stage,
            name: stage.display_name().to_string(),
            approver_roles: vec![UserRole::Manager],
            sla_hours: 24,
            escalation_roles: vec![UserRole::Admin],
        }
    }

    fn path() -> ApprovalPath {
        ApprovalPath {
            levels: vec![
                level(1, ApprovalStage::Sales),
                level(2, ApprovalStage::Management),
            ],
            requires_sales: true,
            sla_deadlines: vec![Utc::now(), Utc::now()],
            reasons: vec![],
        }
    }

    #[test]
    fn test_level_lookup_is_one_based() {
        let path = path();
        assert_eq!(path.level(1).map(|l| l.stage), Some(ApprovalStage::Sales));
        assert_eq!(
            path.level(2).map(|l| l.stage),
            Some(ApprovalStage::Management)
        );
        assert!(path.level(0).is_none());
        assert!(path.level(3).is_none());
        assert!(path.level(-1).is_none());
    }

    #[test]
    fn test_final_level() {
        let path = path();
        assert_eq!(path.total_levels(), 2);
        assert!(!path.is_final(1));
        assert!(path.is_final(2));
        assert!(!path.contains_stage(ApprovalStage::Procurement));
    }

    #[test]
    fn test_path_json_shape() {
        let json = serde_json::to_value(path()).unwrap();
        assert_eq!(json["requires_sales"], true);
        assert_eq!(json["levels"][1]["stage"], "management");
        assert_eq!(json["levels"][0]["approver_roles"][0], "manager");
        assert_eq!(json["sla_deadlines"].as_array().map(Vec::len), Some(2));
    }
}
