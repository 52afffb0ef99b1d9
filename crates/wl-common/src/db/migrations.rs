use thiserror::Error;
use tracing::info;

use crate::db::PgPool;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

const SCHEMA: &str = r#"
CREATE SCHEMA IF NOT EXISTS wl;

CREATE TABLE IF NOT EXISTS wl.users (
    id          BIGINT PRIMARY KEY,
    level       INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS wl.milestones (
    id              BIGSERIAL PRIMARY KEY,
    contract_id     BIGINT NOT NULL,
    amount_cents    BIGINT NOT NULL CHECK (amount_cents >= 0),
    status          TEXT NOT NULL DEFAULT 'pending',
    transaction_id  BIGINT
);

CREATE TABLE IF NOT EXISTS wl.escrow_transactions (
    id              BIGSERIAL PRIMARY KEY,
    contract_id     BIGINT NOT NULL,
    milestone_id    BIGINT,
    client_id       BIGINT NOT NULL,
    freelancer_id   BIGINT NOT NULL,
    gateway_ref     TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'held',
    held_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
    released_at     TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS wl.deliveries (
    id              BIGSERIAL PRIMARY KEY,
    milestone_id    BIGINT NOT NULL REFERENCES wl.milestones (id),
    file_ref        TEXT NOT NULL,
    content_hash    TEXT NOT NULL,
    delivered_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS wl.ledger_entries (
    id              BIGSERIAL PRIMARY KEY,
    kind            TEXT NOT NULL,
    transaction_id  BIGINT NOT NULL,
    amount_cents    BIGINT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS wl.audit_log (
    id          BIGSERIAL PRIMARY KEY,
    action      TEXT NOT NULL,
    actor_id    BIGINT NOT NULL,
    payload     JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS wl.commission_log (
    id                      BIGSERIAL PRIMARY KEY,
    user_id                 BIGINT NOT NULL,
    gross_cents             BIGINT NOT NULL,
    final_commission_cents  BIGINT NOT NULL,
    effective_rate          DOUBLE PRECISION NOT NULL,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS commission_log_user_created
    ON wl.commission_log (user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS escrow_transactions_milestone
    ON wl.escrow_transactions (milestone_id);
"#;

/// Idempotent schema bootstrap, run once at service start.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let client = pool.get().await?;
    client.batch_execute(SCHEMA).await?;
    info!("schema migrations applied");
    Ok(())
}
