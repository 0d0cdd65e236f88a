//! `SeaORM` Entity for approval_history table.
//!
//! Rows are append-only; the database rejects UPDATE and DELETE.

use super::sea_orm_active_enums::{ApprovalAction, ApprovalStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub pricing_run_id: Uuid,
    pub action: ApprovalAction,
    pub actor_id: Option<Uuid>,
    pub actor_name: String,
    pub actor_email: String,
    pub notes: Option<String>,
    pub previous_status: ApprovalStatus,
    pub new_status: ApprovalStatus,
    pub approval_level: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pricing_runs::Entity",
        from = "Column::PricingRunId",
        to = "super::pricing_runs::Column::Id"
    )]
    PricingRuns,
}

impl Related<super::pricing_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PricingRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
