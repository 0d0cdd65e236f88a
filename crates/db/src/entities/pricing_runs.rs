//! `SeaORM` Entity for pricing_runs table.

use super::sea_orm_active_enums::{ApprovalStage, ApprovalStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "pricing_runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub rfq_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub total_price: Decimal,
    pub currency: String,
    pub project_type: String,
    pub approval_status: ApprovalStatus,
    pub approval_level: i32,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub approval_path: Option<Json>,
    pub current_stage: Option<ApprovalStage>,
    pub submitted_at: Option<DateTimeWithTimeZone>,
    pub submitted_by: Option<Uuid>,
    pub level_submitted_at: Option<DateTimeWithTimeZone>,
    pub sla_deadline: Option<DateTimeWithTimeZone>,
    pub approved_at: Option<DateTimeWithTimeZone>,
    pub approved_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub sent_at: Option<DateTimeWithTimeZone>,
    pub sent_by: Option<Uuid>,
    pub assigned_approver_id: Option<Uuid>,
    pub backup_assigned_level: Option<i32>,
    pub escalated_level: Option<i32>,
    pub escalated_at: Option<DateTimeWithTimeZone>,
    pub revision: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenants::Entity",
        from = "Column::TenantId",
        to = "super::tenants::Column::Id"
    )]
    Tenants,
    #[sea_orm(has_many = "super::pricing_run_items::Entity")]
    PricingRunItems,
    #[sea_orm(has_many = "super::approval_history::Entity")]
    ApprovalHistory,
}

impl Related<super::tenants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenants.def()
    }
}

impl Related<super::pricing_run_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PricingRunItems.def()
    }
}

impl Related<super::approval_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
