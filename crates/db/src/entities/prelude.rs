//! Entity re-exports.

pub use super::approval_history::Entity as ApprovalHistory;
pub use super::pricing_run_items::Entity as PricingRunItems;
pub use super::pricing_runs::Entity as PricingRuns;
pub use super::tenants::Entity as Tenants;
pub use super::users::Entity as Users;
