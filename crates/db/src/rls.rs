//! Row-Level Security (RLS) context management.
//!
//! Every tenant-scoped table carries a `tenant_isolation` policy keyed on the
//! `app.current_tenant_id` setting. The setting is transaction-local, so all
//! tenant-scoped queries run inside an [`RlsConnection`].
//!
//! # Usage
//!
//! ```ignore
//! use quoteflow_db::rls::RlsExt;
//!
//! let rls = db.with_rls(tenant_id).await?;
//! let runs = pricing_runs::Entity::find().all(rls.transaction()).await?;
//! rls.commit().await?;
//! ```

use quoteflow_shared::types::TenantId;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, Statement,
    TransactionTrait,
};

/// Name of the PostgreSQL setting read by the RLS policies.
pub const TENANT_SETTING: &str = "app.current_tenant_id";

/// A database transaction with the tenant RLS context already set.
pub struct RlsConnection {
    txn: DatabaseTransaction,
}

impl RlsConnection {
    /// Begins a transaction and sets the tenant context for its lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the RLS
    /// context cannot be set.
    pub async fn new(db: &DatabaseConnection, tenant_id: TenantId) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        set_rls_context(&txn, tenant_id).await?;
        Ok(Self { txn })
    }

    /// Returns the underlying transaction for executing queries.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commits the transaction, persisting all changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction, discarding all changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Extension trait for `DatabaseConnection` to easily create RLS-enabled connections.
#[async_trait::async_trait]
pub trait RlsExt {
    /// Creates an RLS-enabled connection for the given tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the RLS connection cannot be created.
    async fn with_rls(&self, tenant_id: TenantId) -> Result<RlsConnection, DbErr>;
}

#[async_trait::async_trait]
impl RlsExt for DatabaseConnection {
    async fn with_rls(&self, tenant_id: TenantId) -> Result<RlsConnection, DbErr> {
        RlsConnection::new(self, tenant_id).await
    }
}

/// Sets the tenant RLS context on an existing transaction.
///
/// # Errors
///
/// Returns an error if the RLS context cannot be set.
pub async fn set_rls_context(txn: &DatabaseTransaction, tenant_id: TenantId) -> Result<(), DbErr> {
    txn.execute(rls_statement(tenant_id)).await?;
    Ok(())
}

fn rls_statement(tenant_id: TenantId) -> Statement {
    // `is_local = true` is the function form of SET LOCAL and accepts a bind value.
    Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT set_config($1, $2, true)",
        [TENANT_SETTING.into(), tenant_id.to_string().into()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_rls_statement_binds_tenant() {
        let tenant_id = TenantId::from_uuid(
            Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
        );
        let stmt = rls_statement(tenant_id);
        assert_eq!(stmt.sql, "SELECT set_config($1, $2, true)");
        let values = stmt.values.unwrap().0;
        assert_eq!(values.len(), 2);
        assert_eq!(
            values[1],
            sea_orm::Value::from("550e8400-e29b-41d4-a716-446655440000".to_string())
        );
    }
}
