//! Approval rules engine.
//!
//! Decides which levels a pricing run must pass and when each level's SLA
//! expires. The engine is pure: the same snapshot and `now` always yield the
//! same path.

use chrono::{DateTime, Duration, Utc};
use quoteflow_shared::config::ApprovalConfig;
use rust_decimal::Decimal;

use crate::approval::error::ApprovalError;
use crate::approval::path::{ApprovalLevel, ApprovalPath};
use crate::approval::policy::ApprovalPolicy;
use crate::approval::types::{ApprovalStage, PricingSnapshot, UserRole};

/// Typed thresholds and SLA settings for path determination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRulesConfig {
    /// Total price at or above which procurement is added.
    pub procurement_value_threshold: Decimal,
    /// Total price at or above which management is added.
    pub management_value_threshold: Decimal,
    /// Margin below which management is added.
    pub minimum_margin: Decimal,
    /// Project types that add procurement (lowercase).
    pub procurement_project_types: Vec<String>,
    /// Project types that add management (lowercase).
    pub management_project_types: Vec<String>,
    /// SLA hours for the sales level.
    pub sales_sla_hours: i64,
    /// SLA hours for the procurement level.
    pub procurement_sla_hours: i64,
    /// SLA hours for the management level.
    pub management_sla_hours: i64,
    /// Escalation roles for the sales level.
    pub sales_escalation_roles: Vec<UserRole>,
    /// Escalation roles for the procurement level.
    pub procurement_escalation_roles: Vec<UserRole>,
    /// Escalation roles for the management level.
    pub management_escalation_roles: Vec<UserRole>,
}

impl Default for ApprovalRulesConfig {
    fn default() -> Self {
        Self {
            procurement_value_threshold: Decimal::new(50_000, 0),
            management_value_threshold: Decimal::new(250_000, 0),
            minimum_margin: Decimal::new(10, 2),
            procurement_project_types: vec!["turnkey".into(), "framework".into()],
            management_project_types: vec!["strategic".into()],
            sales_sla_hours: 24,
            procurement_sla_hours: 48,
            management_sla_hours: 72,
            sales_escalation_roles: vec![UserRole::Manager],
            procurement_escalation_roles: vec![UserRole::Manager],
            management_escalation_roles: vec![UserRole::Admin],
        }
    }
}

fn parse_roles(field: &str, raw: &[String]) -> Result<Vec<UserRole>, ApprovalError> {
    raw.iter()
        .map(|r| {
            UserRole::parse(r.trim()).ok_or_else(|| {
                ApprovalError::Validation(format!("{field}: unknown role '{r}'"))
            })
        })
        .collect()
}

/// Longest SLA or backup extension accepted from configuration: one year.
pub const MAX_SLA_HOURS: i64 = 24 * 366;

fn positive_hours(field: &str, hours: i64) -> Result<i64, ApprovalError> {
    if !(1..=MAX_SLA_HOURS).contains(&hours) {
        return Err(ApprovalError::Validation(format!(
            "{field} must be between 1 and {MAX_SLA_HOURS}, got {hours}"
        )));
    }
    Ok(hours)
}

/// Validates the configured backup extension. `None` keeps the level SLA.
///
/// # Errors
///
/// `Validation` unless the value is within `1..=MAX_SLA_HOURS`.
pub fn backup_extension_hours(hours: Option<i64>) -> Result<Option<i64>, ApprovalError> {
    hours
        .map(|h| positive_hours("backup_extension_hours", h))
        .transpose()
}

/// `now` plus `hours`, for a positive number of hours.
///
/// # Errors
///
/// `Validation` if `hours` is not positive or the deadline is not
/// representable.
pub fn sla_deadline(now: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>, ApprovalError> {
    Duration::try_hours(hours)
        .filter(|_| hours > 0)
        .and_then(|span| now.checked_add_signed(span))
        .ok_or_else(|| ApprovalError::Validation(format!("SLA of {hours} hours is out of range")))
}

fn normalize_types(raw: &[String]) -> Vec<String> {
    raw.iter().map(|t| t.trim().to_lowercase()).collect()
}

impl TryFrom<&ApprovalConfig> for ApprovalRulesConfig {
    type Error = ApprovalError;

    fn try_from(config: &ApprovalConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            procurement_value_threshold: config.procurement_value_threshold,
            management_value_threshold: config.management_value_threshold,
            minimum_margin: config.minimum_margin,
            procurement_project_types: normalize_types(&config.procurement_project_types),
            management_project_types: normalize_types(&config.management_project_types),
            sales_sla_hours: positive_hours("sales_sla_hours", config.sales_sla_hours)?,
            procurement_sla_hours: positive_hours(
                "procurement_sla_hours",
                config.procurement_sla_hours,
            )?,
            management_sla_hours: positive_hours(
                "management_sla_hours",
                config.management_sla_hours,
            )?,
            sales_escalation_roles: parse_roles(
                "sales_escalation_roles",
                &config.sales_escalation_roles,
            )?,
            procurement_escalation_roles: parse_roles(
                "procurement_escalation_roles",
                &config.procurement_escalation_roles,
            )?,
            management_escalation_roles: parse_roles(
                "management_escalation_roles",
                &config.management_escalation_roles,
            )?,
        })
    }
}

impl ApprovalRulesConfig {
    /// SLA hours configured for a stage.
    #[must_use]
    pub fn sla_hours(&self, stage: ApprovalStage) -> i64 {
        match stage {
            ApprovalStage::Sales => self.sales_sla_hours,
            ApprovalStage::Procurement => self.procurement_sla_hours,
            ApprovalStage::Management => self.management_sla_hours,
        }
    }

    /// Escalation roles configured for a stage.
    #[must_use]
    pub fn escalation_roles(&self, stage: ApprovalStage) -> &[UserRole] {
        match stage {
            ApprovalStage::Sales => &self.sales_escalation_roles,
            ApprovalStage::Procurement => &self.procurement_escalation_roles,
            ApprovalStage::Management => &self.management_escalation_roles,
        }
    }
}

/// Computes approval paths from pricing snapshots.
#[derive(Debug, Clone)]
pub struct ApprovalRulesEngine {
    config: ApprovalRulesConfig,
    policy: ApprovalPolicy,
}

impl Default for ApprovalRulesEngine {
    fn default() -> Self {
        Self::new(ApprovalRulesConfig::default(), ApprovalPolicy::default())
    }
}

impl ApprovalRulesEngine {
    /// Creates an engine from typed configuration and the policy table.
    #[must_use]
    pub fn new(config: ApprovalRulesConfig, policy: ApprovalPolicy) -> Self {
        Self { config, policy }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ApprovalRulesConfig {
        &self.config
    }

    /// The policy table in use.
    #[must_use]
    pub fn policy(&self) -> &ApprovalPolicy {
        &self.policy
    }

    /// Determine the approval path for a pricing snapshot.
    ///
    /// Sales is always level 1. Procurement and management follow, in that
    /// order, when their triggers fire. `sla_deadlines[i]` is `now` plus the
    /// SLA hours of level `i + 1`.
    ///
    /// # Errors
    ///
    /// `Validation` if a level's SLA does not yield a valid deadline.
    pub fn determine_approval_path(
        &self,
        snapshot: &PricingSnapshot,
        now: DateTime<Utc>,
    ) -> Result<ApprovalPath, ApprovalError> {
        let project_type = snapshot.project_type.trim().to_lowercase();
        let mut reasons = Vec::new();

        let mut stages = vec![ApprovalStage::Sales];

        let procurement_by_value = snapshot.total_price >= self.config.procurement_value_threshold;
        let procurement_by_type = self.config.procurement_project_types.contains(&project_type);
        if procurement_by_value {
            reasons.push(format!(
                "Total price {} meets the procurement threshold of {}",
                snapshot.total_price, self.config.procurement_value_threshold
            ));
        }
        if procurement_by_type {
            reasons.push(format!(
                "Project type '{project_type}' requires procurement review"
            ));
        }
        if procurement_by_value || procurement_by_type {
            stages.push(ApprovalStage::Procurement);
        }

        let management_by_value = snapshot.total_price >= self.config.management_value_threshold;
        let margin = snapshot.margin();
        let management_by_margin = margin.is_some_and(|m| m < self.config.minimum_margin);
        let management_by_type = self.config.management_project_types.contains(&project_type);
        if management_by_value {
            reasons.push(format!(
                "Total price {} meets the management threshold of {}",
                snapshot.total_price, self.config.management_value_threshold
            ));
        }
        if let Some(m) = margin.filter(|_| management_by_margin) {
            reasons.push(format!(
                "Margin {} is below the minimum of {}",
                m.round_dp(4),
                self.config.minimum_margin
            ));
        }
        if management_by_type {
            reasons.push(format!(
                "Project type '{project_type}' requires management review"
            ));
        }
        if management_by_value || management_by_margin || management_by_type {
            stages.push(ApprovalStage::Management);
        }

        let levels: Vec<ApprovalLevel> = stages
            .into_iter()
            .zip(1..)
            .map(|(stage, level)| self.level_for(stage, level))
            .collect();

        let sla_deadlines = levels
            .iter()
            .map(|l| self.deadline_for_level(l, now))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ApprovalPath {
            levels,
            requires_sales: true,
            sla_deadlines,
            reasons,
        })
    }

    /// Deadline for a level that starts at `now`.
    ///
    /// # Errors
    ///
    /// `Validation` if the level's SLA hours are out of range.
    pub fn deadline_for_level(
        &self,
        level: &ApprovalLevel,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ApprovalError> {
        sla_deadline(now, level.sla_hours)
    }

    fn level_for(&self, stage: ApprovalStage, level: i32) -> ApprovalLevel {
        ApprovalLevel {
            level,
            stage,
            name: format!("{} Approval", stage.display_name()),
            approver_roles: self.policy.roles_for(stage),
            sla_hours: self.config.sla_hours(stage),
            escalation_roles: self.config.escalation_roles(stage).to_vec(),
        }
    }
}
