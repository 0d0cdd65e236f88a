//! Approval schema migration.
//!
//! Creates the enums, tables, indexes and the append-only trigger for the
//! quote approval workflow.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: TENANTS & USERS
        // ============================================================
        db.execute_unprepared(TENANTS_SQL).await?;
        db.execute_unprepared(USERS_SQL).await?;

        // ============================================================
        // PART 3: PRICING RUNS
        // ============================================================
        db.execute_unprepared(PRICING_RUNS_SQL).await?;
        db.execute_unprepared(PRICING_RUN_ITEMS_SQL).await?;

        // ============================================================
        // PART 4: AUDIT TRAIL
        // ============================================================
        db.execute_unprepared(APPROVAL_HISTORY_SQL).await?;
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE approval_status AS ENUM (
    'draft',
    'pending_approval',
    'approved',
    'rejected',
    'sent_to_client'
);

CREATE TYPE approval_stage AS ENUM ('sales', 'procurement', 'management');

CREATE TYPE user_role AS ENUM (
    'viewer',
    'estimator',
    'sales',
    'procurement',
    'manager',
    'admin'
);

CREATE TYPE approval_action AS ENUM (
    'submitted',
    'approved',
    'rejected',
    'escalated',
    'backup_assigned',
    'sent_to_client'
);
";

const TENANTS_SQL: &str = r"
CREATE TABLE tenants (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_tenants_active ON tenants(name, id) WHERE is_active;
";

const USERS_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL,
    role user_role NOT NULL DEFAULT 'viewer',
    can_approve BOOLEAN NOT NULL DEFAULT false,
    is_active BOOLEAN NOT NULL DEFAULT true,
    backup_user_id UUID REFERENCES users(id) ON DELETE SET NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_users_tenant_email UNIQUE (tenant_id, email),
    CONSTRAINT chk_backup_not_self CHECK (backup_user_id IS NULL OR backup_user_id <> id)
);

-- Approver lookup by role
CREATE INDEX idx_users_approvers ON users(tenant_id, role, name) WHERE is_active AND can_approve;
";

const PRICING_RUNS_SQL: &str = r"
CREATE TABLE pricing_runs (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    rfq_id UUID NOT NULL,
    total_price NUMERIC(20, 4) NOT NULL,
    currency VARCHAR(3) NOT NULL DEFAULT 'USD',
    project_type VARCHAR(100) NOT NULL DEFAULT 'standard',

    -- Workflow
    approval_status approval_status NOT NULL DEFAULT 'draft',
    approval_level INTEGER NOT NULL DEFAULT 1,
    approval_path JSONB,
    current_stage approval_stage,
    submitted_at TIMESTAMPTZ,
    submitted_by UUID REFERENCES users(id),
    level_submitted_at TIMESTAMPTZ,
    sla_deadline TIMESTAMPTZ,
    approved_at TIMESTAMPTZ,
    approved_by UUID REFERENCES users(id),
    rejection_reason TEXT,
    sent_at TIMESTAMPTZ,
    sent_by UUID REFERENCES users(id),
    assigned_approver_id UUID REFERENCES users(id),
    backup_assigned_level INTEGER,
    escalated_level INTEGER,
    escalated_at TIMESTAMPTZ,
    revision BIGINT NOT NULL DEFAULT 0,

    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_total_non_negative CHECK (total_price >= 0),
    CONSTRAINT chk_level_positive CHECK (approval_level >= 1),
    CONSTRAINT chk_rejection_reason CHECK (
        approval_status <> 'rejected' OR length(trim(rejection_reason)) > 0
    ),
    CONSTRAINT chk_pending_has_path CHECK (
        approval_status <> 'pending_approval'
        OR (approval_path IS NOT NULL AND sla_deadline IS NOT NULL)
    )
);

-- Pending listings ordered by submission time
CREATE INDEX idx_pricing_runs_pending ON pricing_runs(tenant_id, submitted_at DESC, id DESC)
    WHERE approval_status = 'pending_approval';

-- SLA sweep
CREATE INDEX idx_pricing_runs_sla ON pricing_runs(tenant_id, sla_deadline)
    WHERE approval_status = 'pending_approval';

CREATE INDEX idx_pricing_runs_rfq ON pricing_runs(tenant_id, rfq_id);
";

const PRICING_RUN_ITEMS_SQL: &str = r"
CREATE TABLE pricing_run_items (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    pricing_run_id UUID NOT NULL REFERENCES pricing_runs(id) ON DELETE CASCADE,
    line_no INTEGER NOT NULL,
    sku VARCHAR(100) NOT NULL,
    quantity NUMERIC(20, 4) NOT NULL,
    unit_price NUMERIC(20, 4) NOT NULL,
    base_cost NUMERIC(20, 4),
    CONSTRAINT uq_pricing_run_items_line UNIQUE (pricing_run_id, line_no),
    CONSTRAINT chk_quantity_positive CHECK (quantity > 0)
);
";

const APPROVAL_HISTORY_SQL: &str = r"
CREATE TABLE approval_history (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE RESTRICT,
    pricing_run_id UUID NOT NULL REFERENCES pricing_runs(id) ON DELETE RESTRICT,
    action approval_action NOT NULL,
    actor_id UUID REFERENCES users(id),
    actor_name VARCHAR(255) NOT NULL,
    actor_email VARCHAR(255) NOT NULL,
    notes TEXT,
    previous_status approval_status NOT NULL,
    new_status approval_status NOT NULL,
    approval_level INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- History of a run, oldest first
CREATE INDEX idx_approval_history_run ON approval_history(tenant_id, pricing_run_id, created_at, id);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_history_modification
-- Approval history is append-only
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_history_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'approval_history is append-only: % is not allowed', TG_OP;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_approval_history_append_only
BEFORE UPDATE OR DELETE ON approval_history
FOR EACH ROW
EXECUTE FUNCTION prevent_history_modification();

-- ============================================================
-- FUNCTION: touch_updated_at
-- ============================================================
CREATE OR REPLACE FUNCTION touch_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = GREATEST(NEW.updated_at, now());
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_tenants_updated_at
BEFORE UPDATE ON tenants
FOR EACH ROW
EXECUTE FUNCTION touch_updated_at();

CREATE TRIGGER trg_users_updated_at
BEFORE UPDATE ON users
FOR EACH ROW
EXECUTE FUNCTION touch_updated_at();
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS approval_history CASCADE;
DROP TABLE IF EXISTS pricing_run_items CASCADE;
DROP TABLE IF EXISTS pricing_runs CASCADE;
DROP TABLE IF EXISTS users CASCADE;
DROP TABLE IF EXISTS tenants CASCADE;
DROP FUNCTION IF EXISTS prevent_history_modification();
DROP FUNCTION IF EXISTS touch_updated_at();
DROP TYPE IF EXISTS approval_action;
DROP TYPE IF EXISTS user_role;
DROP TYPE IF EXISTS approval_stage;
DROP TYPE IF EXISTS approval_status;
";
