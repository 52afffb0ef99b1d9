use chrono::{DateTime, Utc};
use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::instrument;

use crate::commission::{summarize, CommissionEntry, CommissionSummary, SummaryWindow};
use crate::db::PgPool;

#[derive(Debug, Error)]
pub enum CommissionStorageError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
}

/// Loyalty level for commission discounts. Unknown users are level 1.
#[instrument(skip(pool))]
pub async fn get_user_level(pool: &PgPool, user_id: i64) -> Result<i32, CommissionStorageError> {
    let client = pool.get().await?;
    let row = client
        .query_opt("SELECT level FROM wl.users WHERE id = $1", &[&user_id])
        .await?;
    Ok(row.map(|row| row.get::<_, i32>(0)).unwrap_or(1))
}

#[derive(Debug, Clone)]
pub struct CommissionLogInsert {
    pub user_id: i64,
    pub gross_cents: i64,
    pub final_commission_cents: i64,
    pub effective_rate: f64,
    pub created_at: Option<DateTime<Utc>>,
}

#[instrument(skip(pool, log))]
pub async fn insert_commission_log(
    pool: &PgPool,
    log: &CommissionLogInsert,
) -> Result<u64, CommissionStorageError> {
    let client = pool.get().await?;
    let created_at = log.created_at.unwrap_or_else(Utc::now);
    let rows = client
        .execute(
            "INSERT INTO wl.commission_log
                (user_id, gross_cents, final_commission_cents, effective_rate, created_at)
             VALUES ($1, $2, $3, $4, $5)",
            &[
                &log.user_id,
                &log.gross_cents,
                &log.final_commission_cents,
                &log.effective_rate,
                &created_at,
            ],
        )
        .await?;
    Ok(rows)
}

/// Fetch a user's outgoing commission rows since `since` and fold them with
/// the pure summarizer.
#[instrument(skip(pool))]
pub async fn fetch_commission_summary(
    pool: &PgPool,
    user_id: i64,
    window: SummaryWindow,
) -> Result<CommissionSummary, CommissionStorageError> {
    let now = Utc::now();
    let since = window.start_from(now);

    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT gross_cents, final_commission_cents, created_at
             FROM wl.commission_log
             WHERE user_id = $1 AND created_at >= $2
             ORDER BY created_at DESC",
            &[&user_id, &since],
        )
        .await?;

    let entries: Vec<CommissionEntry> = rows
        .iter()
        .map(|row| CommissionEntry {
            gross_cents: row.get(0),
            final_commission_cents: row.get(1),
            created_at: row.get(2),
        })
        .collect();

    Ok(summarize(&entries, window, now))
}
