use async_trait::async_trait;
use tokio_postgres::types::Json;
use tokio_postgres::Row;
use tracing::instrument;

use crate::db::PgPool;
use crate::escrow::store::{
    AuditLogEntry, Delivery, EscrowStatus, EscrowStore, EscrowTransaction, LedgerKind, Milestone,
    MilestoneStatus, MilestoneView, NewDelivery, RefundGroup, ReleaseGroup, StoreError,
};

/// Postgres-backed escrow store. Every `apply_*` group runs inside one
/// database transaction with a status-guarded UPDATE, so concurrent
/// releases on the same transaction id serialize on the row and the loser
/// observes a conflict.
pub struct PgEscrowStore {
    pool: PgPool,
}

impl PgEscrowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn escrow_status(value: &str) -> Result<EscrowStatus, StoreError> {
    match value {
        "held" => Ok(EscrowStatus::Held),
        "released" => Ok(EscrowStatus::Released),
        "refunded" => Ok(EscrowStatus::Refunded),
        other => Err(StoreError::Backend(format!(
            "unknown escrow status in storage: {other}"
        ))),
    }
}

fn milestone_status(value: &str) -> Result<MilestoneStatus, StoreError> {
    match value {
        "pending" => Ok(MilestoneStatus::Pending),
        "review" => Ok(MilestoneStatus::Review),
        "approved" => Ok(MilestoneStatus::Approved),
        "disputed" => Ok(MilestoneStatus::Disputed),
        other => Err(StoreError::Backend(format!(
            "unknown milestone status in storage: {other}"
        ))),
    }
}

fn milestone_from_row(row: &Row) -> Result<Milestone, StoreError> {
    Ok(Milestone {
        id: row.get("id"),
        contract_id: row.get("contract_id"),
        amount_cents: row.get("amount_cents"),
        status: milestone_status(row.get("status"))?,
        transaction_id: row.get("transaction_id"),
    })
}

fn transaction_from_row(row: &Row) -> Result<EscrowTransaction, StoreError> {
    Ok(EscrowTransaction {
        id: row.get("id"),
        contract_id: row.get("contract_id"),
        milestone_id: row.get("milestone_id"),
        client_id: row.get("client_id"),
        freelancer_id: row.get("freelancer_id"),
        gateway_ref: row.get("gateway_ref"),
        status: escrow_status(row.get("status"))?,
        held_at: row.get("held_at"),
        released_at: row.get("released_at"),
    })
}

#[async_trait]
impl EscrowStore for PgEscrowStore {
    #[instrument(skip(self))]
    async fn milestone_view(&self, milestone_id: i64) -> Result<MilestoneView, StoreError> {
        let client = self.pool.get().await.map_err(backend)?;

        let row = client
            .query_opt(
                "SELECT id, contract_id, amount_cents, status, transaction_id
                 FROM wl.milestones WHERE id = $1",
                &[&milestone_id],
            )
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound {
                entity: "milestone",
                id: milestone_id,
            })?;
        let milestone = milestone_from_row(&row)?;

        let transaction = match milestone.transaction_id {
            Some(transaction_id) => client
                .query_opt(
                    "SELECT id, contract_id, milestone_id, client_id, freelancer_id,
                            gateway_ref, status, held_at, released_at
                     FROM wl.escrow_transactions WHERE id = $1",
                    &[&transaction_id],
                )
                .await
                .map_err(backend)?
                .map(|row| transaction_from_row(&row))
                .transpose()?,
            None => None,
        };

        Ok(MilestoneView {
            milestone,
            transaction,
        })
    }

    #[instrument(skip(self))]
    async fn transaction(&self, transaction_id: i64) -> Result<EscrowTransaction, StoreError> {
        let client = self.pool.get().await.map_err(backend)?;
        let row = client
            .query_opt(
                "SELECT id, contract_id, milestone_id, client_id, freelancer_id,
                        gateway_ref, status, held_at, released_at
                 FROM wl.escrow_transactions WHERE id = $1",
                &[&transaction_id],
            )
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound {
                entity: "escrow transaction",
                id: transaction_id,
            })?;
        transaction_from_row(&row)
    }

    #[instrument(skip(self, delivery, audit))]
    async fn apply_delivery(
        &self,
        delivery: NewDelivery,
        audit: AuditLogEntry,
    ) -> Result<Delivery, StoreError> {
        let mut client = self.pool.get().await.map_err(backend)?;
        let tx = client.transaction().await.map_err(backend)?;

        let updated = tx
            .execute(
                "UPDATE wl.milestones SET status = 'review'
                 WHERE id = $1 AND status = 'pending'",
                &[&delivery.milestone_id],
            )
            .await
            .map_err(backend)?;
        if updated == 0 {
            let row = tx
                .query_opt(
                    "SELECT status FROM wl.milestones WHERE id = $1",
                    &[&delivery.milestone_id],
                )
                .await
                .map_err(backend)?;
            return Err(match row {
                Some(row) => StoreError::Conflict {
                    current: row.get::<_, String>(0),
                },
                None => StoreError::NotFound {
                    entity: "milestone",
                    id: delivery.milestone_id,
                },
            });
        }

        let row = tx
            .query_one(
                "INSERT INTO wl.deliveries (milestone_id, file_ref, content_hash, delivered_at)
                 VALUES ($1, $2, $3, $4) RETURNING id",
                &[
                    &delivery.milestone_id,
                    &delivery.file_ref,
                    &delivery.content_hash,
                    &delivery.delivered_at,
                ],
            )
            .await
            .map_err(backend)?;
        let delivery_id: i64 = row.get(0);

        insert_audit(&tx, &audit).await?;
        tx.commit().await.map_err(backend)?;

        Ok(Delivery {
            id: delivery_id,
            milestone_id: delivery.milestone_id,
            file_ref: delivery.file_ref,
            content_hash: delivery.content_hash,
            delivered_at: delivery.delivered_at,
        })
    }

    #[instrument(skip(self, group))]
    async fn apply_release(&self, group: ReleaseGroup) -> Result<(), StoreError> {
        let mut client = self.pool.get().await.map_err(backend)?;
        let tx = client.transaction().await.map_err(backend)?;

        let updated = tx
            .execute(
                "UPDATE wl.escrow_transactions
                 SET status = 'released', released_at = $2
                 WHERE id = $1 AND status = 'held'",
                &[&group.transaction_id, &group.released_at],
            )
            .await
            .map_err(backend)?;
        if updated == 0 {
            return Err(transaction_write_conflict(&tx, group.transaction_id).await?);
        }

        if let Some(milestone_id) = group.milestone_id {
            let updated = tx
                .execute(
                    "UPDATE wl.milestones SET status = 'approved' WHERE id = $1",
                    &[&milestone_id],
                )
                .await
                .map_err(backend)?;
            if updated == 0 {
                return Err(StoreError::NotFound {
                    entity: "milestone",
                    id: milestone_id,
                });
            }
        }

        insert_ledger(
            &tx,
            LedgerKind::EscrowRelease,
            group.transaction_id,
            group.amount_cents,
        )
        .await?;
        insert_audit(&tx, &group.audit).await?;
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    #[instrument(skip(self, group))]
    async fn apply_refund(&self, group: RefundGroup) -> Result<(), StoreError> {
        let mut client = self.pool.get().await.map_err(backend)?;
        let tx = client.transaction().await.map_err(backend)?;

        let updated = tx
            .execute(
                "UPDATE wl.escrow_transactions
                 SET status = 'refunded'
                 WHERE id = $1 AND status = 'held'",
                &[&group.transaction_id],
            )
            .await
            .map_err(backend)?;
        if updated == 0 {
            return Err(transaction_write_conflict(&tx, group.transaction_id).await?);
        }

        if let Some(milestone_id) = group.milestone_id {
            let updated = tx
                .execute(
                    "UPDATE wl.milestones SET status = 'disputed' WHERE id = $1",
                    &[&milestone_id],
                )
                .await
                .map_err(backend)?;
            if updated == 0 {
                return Err(StoreError::NotFound {
                    entity: "milestone",
                    id: milestone_id,
                });
            }
        }

        insert_ledger(
            &tx,
            LedgerKind::EscrowRefund,
            group.transaction_id,
            group.amount_cents,
        )
        .await?;
        insert_audit(&tx, &group.audit).await?;
        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}

/// A guarded UPDATE matched no row: either the transaction is gone or it
/// left `held` under our feet. Report which.
async fn transaction_write_conflict(
    tx: &tokio_postgres::Transaction<'_>,
    transaction_id: i64,
) -> Result<StoreError, StoreError> {
    let row = tx
        .query_opt(
            "SELECT status FROM wl.escrow_transactions WHERE id = $1",
            &[&transaction_id],
        )
        .await
        .map_err(backend)?;
    Ok(match row {
        Some(row) => StoreError::Conflict {
            current: row.get::<_, String>(0),
        },
        None => StoreError::NotFound {
            entity: "escrow transaction",
            id: transaction_id,
        },
    })
}

async fn insert_ledger(
    tx: &tokio_postgres::Transaction<'_>,
    kind: LedgerKind,
    transaction_id: i64,
    amount_cents: i64,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO wl.ledger_entries (kind, transaction_id, amount_cents)
         VALUES ($1, $2, $3)",
        &[&kind.as_str(), &transaction_id, &amount_cents],
    )
    .await
    .map_err(backend)?;
    Ok(())
}

async fn insert_audit(
    tx: &tokio_postgres::Transaction<'_>,
    audit: &AuditLogEntry,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO wl.audit_log (action, actor_id, payload, created_at)
         VALUES ($1, $2, $3, $4)",
        &[
            &audit.action,
            &audit.actor_id,
            &Json(&audit.payload),
            &audit.created_at,
        ],
    )
    .await
    .map_err(backend)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_round_trips() {
        for status in [
            EscrowStatus::Held,
            EscrowStatus::Released,
            EscrowStatus::Refunded,
        ] {
            assert_eq!(escrow_status(status.as_str()).unwrap(), status);
        }
        assert!(escrow_status("limbo").is_err());
    }

    #[test]
    fn milestone_status_parsing_round_trips() {
        for status in [
            MilestoneStatus::Pending,
            MilestoneStatus::Review,
            MilestoneStatus::Approved,
            MilestoneStatus::Disputed,
        ] {
            assert_eq!(milestone_status(status.as_str()).unwrap(), status);
        }
        assert!(milestone_status("shipped").is_err());
    }
}
