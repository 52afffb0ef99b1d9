use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::store::{
    AuditLogEntry, Delivery, EscrowStatus, EscrowStore, EscrowTransaction, LedgerEntry, LedgerKind,
    Milestone, MilestoneStatus, MilestoneView, NewDelivery, RefundGroup, ReleaseGroup, StoreError,
};

#[derive(Debug, Default)]
struct State {
    milestones: HashMap<i64, Milestone>,
    transactions: HashMap<i64, EscrowTransaction>,
    deliveries: Vec<Delivery>,
    ledger: Vec<LedgerEntry>,
    audit: Vec<AuditLogEntry>,
    next_delivery_id: i64,
}

/// In-memory `EscrowStore` used by tests and local development. The single
/// mutex makes every `apply_*` group atomic and serializes concurrent
/// releases the same way the row lock does in postgres.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_milestone(&self, milestone: Milestone) {
        self.lock().milestones.insert(milestone.id, milestone);
    }

    pub fn insert_transaction(&self, transaction: EscrowTransaction) {
        self.lock()
            .transactions
            .insert(transaction.id, transaction);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.lock().deliveries.clone()
    }

    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.lock().ledger.clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.lock().audit.clone()
    }

    pub fn milestone(&self, id: i64) -> Option<Milestone> {
        self.lock().milestones.get(&id).cloned()
    }

    pub fn stored_transaction(&self, id: i64) -> Option<EscrowTransaction> {
        self.lock().transactions.get(&id).cloned()
    }
}

#[async_trait]
impl EscrowStore for MemoryStore {
    async fn milestone_view(&self, milestone_id: i64) -> Result<MilestoneView, StoreError> {
        let state = self.lock();
        let milestone = state
            .milestones
            .get(&milestone_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "milestone",
                id: milestone_id,
            })?;
        let transaction = milestone
            .transaction_id
            .and_then(|id| state.transactions.get(&id).cloned());
        Ok(MilestoneView {
            milestone,
            transaction,
        })
    }

    async fn transaction(&self, transaction_id: i64) -> Result<EscrowTransaction, StoreError> {
        self.lock()
            .transactions
            .get(&transaction_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "escrow transaction",
                id: transaction_id,
            })
    }

    async fn apply_delivery(
        &self,
        delivery: NewDelivery,
        audit: AuditLogEntry,
    ) -> Result<Delivery, StoreError> {
        let mut state = self.lock();
        let milestone =
            state
                .milestones
                .get_mut(&delivery.milestone_id)
                .ok_or(StoreError::NotFound {
                    entity: "milestone",
                    id: delivery.milestone_id,
                })?;

        if milestone.status != MilestoneStatus::Pending {
            return Err(StoreError::Conflict {
                current: milestone.status.as_str().to_string(),
            });
        }
        milestone.status = MilestoneStatus::Review;

        state.next_delivery_id += 1;
        let record = Delivery {
            id: state.next_delivery_id,
            milestone_id: delivery.milestone_id,
            file_ref: delivery.file_ref,
            content_hash: delivery.content_hash,
            delivered_at: delivery.delivered_at,
        };
        state.deliveries.push(record.clone());
        state.audit.push(audit);
        Ok(record)
    }

    async fn apply_release(&self, group: ReleaseGroup) -> Result<(), StoreError> {
        let mut state = self.lock();

        // Validate the whole group before mutating anything so the apply
        // stays all-or-nothing.
        if let Some(milestone_id) = group.milestone_id {
            if !state.milestones.contains_key(&milestone_id) {
                return Err(StoreError::NotFound {
                    entity: "milestone",
                    id: milestone_id,
                });
            }
        }
        let transaction =
            state
                .transactions
                .get_mut(&group.transaction_id)
                .ok_or(StoreError::NotFound {
                    entity: "escrow transaction",
                    id: group.transaction_id,
                })?;

        // Re-check under the lock; the loser of a race sees the conflict.
        if transaction.status != EscrowStatus::Held {
            return Err(StoreError::Conflict {
                current: transaction.status.as_str().to_string(),
            });
        }
        transaction.status = EscrowStatus::Released;
        transaction.released_at = Some(group.released_at);

        if let Some(milestone_id) = group.milestone_id {
            if let Some(milestone) = state.milestones.get_mut(&milestone_id) {
                milestone.status = MilestoneStatus::Approved;
            }
        }

        state.ledger.push(LedgerEntry {
            kind: LedgerKind::EscrowRelease,
            transaction_id: group.transaction_id,
            amount_cents: group.amount_cents,
            created_at: group.released_at,
        });
        state.audit.push(group.audit);
        Ok(())
    }

    async fn apply_refund(&self, group: RefundGroup) -> Result<(), StoreError> {
        let mut state = self.lock();

        if let Some(milestone_id) = group.milestone_id {
            if !state.milestones.contains_key(&milestone_id) {
                return Err(StoreError::NotFound {
                    entity: "milestone",
                    id: milestone_id,
                });
            }
        }
        let transaction =
            state
                .transactions
                .get_mut(&group.transaction_id)
                .ok_or(StoreError::NotFound {
                    entity: "escrow transaction",
                    id: group.transaction_id,
                })?;

        if transaction.status != EscrowStatus::Held {
            return Err(StoreError::Conflict {
                current: transaction.status.as_str().to_string(),
            });
        }
        transaction.status = EscrowStatus::Refunded;

        if let Some(milestone_id) = group.milestone_id {
            if let Some(milestone) = state.milestones.get_mut(&milestone_id) {
                milestone.status = MilestoneStatus::Disputed;
            }
        }

        state.ledger.push(LedgerEntry {
            kind: LedgerKind::EscrowRefund,
            transaction_id: group.transaction_id,
            amount_cents: group.amount_cents,
            created_at: group.refunded_at,
        });
        state.audit.push(group.audit);
        Ok(())
    }
}
