//! `SeaORM` entities for the approval schema.

pub mod prelude;

pub mod approval_history;
pub mod pricing_run_items;
pub mod pricing_runs;
pub mod sea_orm_active_enums;
pub mod tenants;
pub mod users;
