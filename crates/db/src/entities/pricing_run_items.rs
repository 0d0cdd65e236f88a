//! `SeaORM` Entity for pricing_run_items table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "pricing_run_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub pricing_run_id: Uuid,
    pub line_no: i32,
    pub sku: String,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))", nullable)]
    pub base_cost: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pricing_runs::Entity",
        from = "Column::PricingRunId",
        to = "super::pricing_runs::Column::Id",
        on_delete = "Cascade"
    )]
    PricingRuns,
}

impl Related<super::pricing_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PricingRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
