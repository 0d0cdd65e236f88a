//! `SeaORM` active enums mirroring the PostgreSQL enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use quoteflow_core::approval::{
    ApprovalStage as CoreStage, ApprovalStatus as CoreStatus, HistoryAction as CoreAction,
    UserRole as CoreRole,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "approval_status")]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "sent_to_client")]
    SentToClient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "approval_stage")]
pub enum ApprovalStage {
    #[sea_orm(string_value = "sales")]
    Sales,
    #[sea_orm(string_value = "procurement")]
    Procurement,
    #[sea_orm(string_value = "management")]
    Management,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role")]
pub enum UserRole {
    #[sea_orm(string_value = "viewer")]
    Viewer,
    #[sea_orm(string_value = "estimator")]
    Estimator,
    #[sea_orm(string_value = "sales")]
    Sales,
    #[sea_orm(string_value = "procurement")]
    Procurement,
    #[sea_orm(string_value = "manager")]
    Manager,
    #[sea_orm(string_value = "admin")]
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "approval_action")]
pub enum ApprovalAction {
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "escalated")]
    Escalated,
    #[sea_orm(string_value = "backup_assigned")]
    BackupAssigned,
    #[sea_orm(string_value = "sent_to_client")]
    SentToClient,
}

impl From<CoreStatus> for ApprovalStatus {
    fn from(status: CoreStatus) -> Self {
        match status {
            CoreStatus::Draft => Self::Draft,
            CoreStatus::PendingApproval => Self::PendingApproval,
            CoreStatus::Approved => Self::Approved,
            CoreStatus::Rejected => Self::Rejected,
            CoreStatus::SentToClient => Self::SentToClient,
        }
    }
}

impl From<ApprovalStatus> for CoreStatus {
    fn from(status: ApprovalStatus) -> Self {
        match status {
            ApprovalStatus::Draft => Self::Draft,
            ApprovalStatus::PendingApproval => Self::PendingApproval,
            ApprovalStatus::Approved => Self::Approved,
            ApprovalStatus::Rejected => Self::Rejected,
            ApprovalStatus::SentToClient => Self::SentToClient,
        }
    }
}

impl From<CoreStage> for ApprovalStage {
    fn from(stage: CoreStage) -> Self {
        match stage {
            CoreStage::Sales => Self::Sales,
            CoreStage::Procurement => Self::Procurement,
            CoreStage::Management => Self::Management,
        }
    }
}

impl From<ApprovalStage> for CoreStage {
    fn from(stage: ApprovalStage) -> Self {
        match stage {
            ApprovalStage::Sales => Self::Sales,
            ApprovalStage::Procurement => Self::Procurement,
            ApprovalStage::Management => Self::Management,
        }
    }
}

impl From<CoreRole> for UserRole {
    fn from(role: CoreRole) -> Self {
        match role {
            CoreRole::Viewer => Self::Viewer,
            CoreRole::Estimator => Self::Estimator,
            CoreRole::Sales => Self::Sales,
            CoreRole::Procurement => Self::Procurement,
            CoreRole::Manager => Self::Manager,
            CoreRole::Admin => Self::Admin,
        }
    }
}

impl From<UserRole> for CoreRole {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Viewer => Self::Viewer,
            UserRole::Estimator => Self::Estimator,
            UserRole::Sales => Self::Sales,
            UserRole::Procurement => Self::Procurement,
            UserRole::Manager => Self::Manager,
            UserRole::Admin => Self::Admin,
        }
    }
}

impl From<CoreAction> for ApprovalAction {
    fn from(action: CoreAction) -> Self {
        match action {
            CoreAction::Submitted => Self::Submitted,
            CoreAction::Approved => Self::Approved,
            CoreAction::Rejected => Self::Rejected,
            CoreAction::Escalated => Self::Escalated,
            CoreAction::BackupAssigned => Self::BackupAssigned,
            CoreAction::SentToClient => Self::SentToClient,
        }
    }
}

impl From<ApprovalAction> for CoreAction {
    fn from(action: ApprovalAction) -> Self {
        match action {
            ApprovalAction::Submitted => Self::Submitted,
            ApprovalAction::Approved => Self::Approved,
            ApprovalAction::Rejected => Self::Rejected,
            ApprovalAction::Escalated => Self::Escalated,
            ApprovalAction::BackupAssigned => Self::BackupAssigned,
            ApprovalAction::SentToClient => Self::SentToClient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CoreStatus::Draft)]
    #[case(CoreStatus::PendingApproval)]
    #[case(CoreStatus::Approved)]
    #[case(CoreStatus::Rejected)]
    #[case(CoreStatus::SentToClient)]
    fn test_status_string_values_match_core(#[case] status: CoreStatus) {
        let db: ApprovalStatus = status.into();
        assert_eq!(db.to_value(), status.as_str());
        assert_eq!(CoreStatus::from(db), status);
    }

    #[rstest]
    #[case(CoreRole::Viewer)]
    #[case(CoreRole::Estimator)]
    #[case(CoreRole::Sales)]
    #[case(CoreRole::Procurement)]
    #[case(CoreRole::Manager)]
    #[case(CoreRole::Admin)]
    fn test_role_string_values_match_core(#[case] role: CoreRole) {
        let db: UserRole = role.into();
        assert_eq!(db.to_value(), role.as_str());
        assert_eq!(CoreRole::from(db), role);
    }

    #[test]
    fn test_stage_and_action_string_values_match_core() {
        for stage in CoreStage::ALL {
            assert_eq!(ApprovalStage::from(stage).to_value(), stage.as_str());
        }
        assert_eq!(
            ApprovalAction::from(CoreAction::BackupAssigned).to_value(),
            CoreAction::BackupAssigned.as_str()
        );
    }
}
