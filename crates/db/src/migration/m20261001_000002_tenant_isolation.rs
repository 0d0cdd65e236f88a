//! Row-level security for tenant-scoped tables.
//!
//! Policies read `app.current_tenant_id`, set per transaction by
//! [`crate::rls`]. `FORCE` makes them apply to the table owner as well.
//! `tenants` itself is not tenant-scoped: the SLA sweep lists it.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(RLS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DISABLE_RLS_SQL).await?;
        Ok(())
    }
}

const RLS_SQL: &str = r"
ALTER TABLE users ENABLE ROW LEVEL SECURITY;
ALTER TABLE pricing_runs ENABLE ROW LEVEL SECURITY;
ALTER TABLE pricing_run_items ENABLE ROW LEVEL SECURITY;
ALTER TABLE approval_history ENABLE ROW LEVEL SECURITY;

ALTER TABLE users FORCE ROW LEVEL SECURITY;
ALTER TABLE pricing_runs FORCE ROW LEVEL SECURITY;
ALTER TABLE pricing_run_items FORCE ROW LEVEL SECURITY;
ALTER TABLE approval_history FORCE ROW LEVEL SECURITY;

-- Application sets context per transaction:
-- SELECT set_config('app.current_tenant_id', 'tenant-uuid', true);
CREATE POLICY tenant_isolation ON users
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON pricing_runs
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON pricing_run_items
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON approval_history
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);
";

const DISABLE_RLS_SQL: &str = r"
DROP POLICY IF EXISTS tenant_isolation ON approval_history;
DROP POLICY IF EXISTS tenant_isolation ON pricing_run_items;
DROP POLICY IF EXISTS tenant_isolation ON pricing_runs;
DROP POLICY IF EXISTS tenant_isolation ON users;

ALTER TABLE approval_history NO FORCE ROW LEVEL SECURITY;
ALTER TABLE pricing_run_items NO FORCE ROW LEVEL SECURITY;
ALTER TABLE pricing_runs NO FORCE ROW LEVEL SECURITY;
ALTER TABLE users NO FORCE ROW LEVEL SECURITY;

ALTER TABLE approval_history DISABLE ROW LEVEL SECURITY;
ALTER TABLE pricing_run_items DISABLE ROW LEVEL SECURITY;
ALTER TABLE pricing_runs DISABLE ROW LEVEL SECURITY;
ALTER TABLE users DISABLE ROW LEVEL SECURITY;
";
