pub mod memory;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::gateway::{GatewayError, PaymentGateway};
use store::{
    AuditLogEntry, Delivery, EscrowStatus, EscrowStore, EscrowTransaction, MilestoneStatus,
    NewDelivery, RefundGroup, ReleaseGroup, StoreError,
};

pub use memory::MemoryStore;
pub use store::{LedgerEntry, LedgerKind, Milestone, MilestoneView};

#[derive(Debug, Error)]
pub enum EscrowError {
    /// Malformed or out-of-range input; always recoverable by the caller.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Caller is not the expected principal. Deliberately generic.
    #[error("forbidden")]
    Unauthorized,
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },
    /// Transition attempted from an incompatible state. A business-rule
    /// violation, not a system fault.
    #[error("state conflict: current status is {current}")]
    StateConflict { current: String },
    #[error("payment gateway error: {0}")]
    Gateway(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for EscrowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { entity, id } => EscrowError::NotFound { entity, id },
            StoreError::Conflict { current } => EscrowError::StateConflict { current },
            StoreError::Backend(message) => EscrowError::Storage(message),
        }
    }
}

impl From<GatewayError> for EscrowError {
    fn from(value: GatewayError) -> Self {
        EscrowError::Gateway(value.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    pub transaction_id: i64,
    pub release_amount_cents: i64,
    pub released_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundOutcome {
    pub transaction_id: i64,
    pub refund_amount_cents: i64,
    pub refunded_at: DateTime<Utc>,
}

/// Milestone escrow state machine over injected collaborators.
///
/// Every mutating operation runs its guards (authorization first, then
/// state) before touching anything, calls the gateway as the de-facto
/// commit point, and only then applies the local record group atomically
/// through the store.
#[derive(Clone)]
pub struct EscrowService {
    store: Arc<dyn EscrowStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl EscrowService {
    pub fn new(store: Arc<dyn EscrowStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Freelancer submits work for a milestone: `pending -> review` plus a
    /// delivery record and a `milestone_delivered` audit entry.
    pub async fn deliver_milestone(
        &self,
        milestone_id: i64,
        caller_id: i64,
        file_ref: &str,
        content_hash: &str,
    ) -> Result<Delivery, EscrowError> {
        if file_ref.trim().is_empty() {
            return Err(EscrowError::Validation("file reference is required".into()));
        }

        let view = self.store.milestone_view(milestone_id).await?;
        let transaction = funded_transaction(view.transaction)?;

        if caller_id != transaction.freelancer_id {
            return Err(EscrowError::Unauthorized);
        }
        if view.milestone.status != MilestoneStatus::Pending {
            return Err(EscrowError::StateConflict {
                current: view.milestone.status.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let delivery = self
            .store
            .apply_delivery(
                NewDelivery {
                    milestone_id,
                    file_ref: file_ref.to_string(),
                    content_hash: content_hash.to_string(),
                    delivered_at: now,
                },
                AuditLogEntry {
                    action: "milestone_delivered",
                    actor_id: caller_id,
                    payload: serde_json::json!({
                        "milestone_id": milestone_id,
                        "file_ref": file_ref,
                        "content_hash": content_hash,
                    }),
                    created_at: now,
                },
            )
            .await?;

        info!(milestone_id, caller_id, "milestone delivered");
        Ok(delivery)
    }

    /// Client accepts a milestone and releases funds, fully or partially.
    pub async fn release_milestone(
        &self,
        milestone_id: i64,
        caller_id: i64,
        partial_cents: Option<i64>,
    ) -> Result<ReleaseOutcome, EscrowError> {
        let view = self.store.milestone_view(milestone_id).await?;
        let transaction = funded_transaction(view.transaction)?;

        self.release(
            transaction,
            Some(view.milestone),
            caller_id,
            partial_cents,
            "milestone_accepted",
        )
        .await
    }

    /// Direct release of a non-milestone transaction. Same guards, same
    /// all-or-nothing record group.
    pub async fn release_transaction(
        &self,
        transaction_id: i64,
        caller_id: i64,
        partial_cents: Option<i64>,
    ) -> Result<ReleaseOutcome, EscrowError> {
        let transaction = self.store.transaction(transaction_id).await?;
        let milestone = match transaction.milestone_id {
            Some(id) => Some(self.store.milestone_view(id).await?.milestone),
            None => None,
        };

        self.release(
            transaction,
            milestone,
            caller_id,
            partial_cents,
            "escrow_released",
        )
        .await
    }

    /// Dispute path: refund held funds back to the client,
    /// `held -> refunded`, milestone -> `disputed`.
    pub async fn refund_milestone(
        &self,
        milestone_id: i64,
        caller_id: i64,
    ) -> Result<RefundOutcome, EscrowError> {
        let view = self.store.milestone_view(milestone_id).await?;
        let transaction = funded_transaction(view.transaction)?;

        if caller_id != transaction.client_id {
            return Err(EscrowError::Unauthorized);
        }
        if transaction.status != EscrowStatus::Held {
            return Err(EscrowError::StateConflict {
                current: transaction.status.as_str().to_string(),
            });
        }

        let amount = view.milestone.amount_cents;
        let refund = self
            .gateway
            .refund(&transaction.gateway_ref, Some(amount))
            .await
            .map_err(EscrowError::from)?;

        let now = Utc::now();
        let group = RefundGroup {
            transaction_id: transaction.id,
            milestone_id: Some(milestone_id),
            amount_cents: refund.refunded_cents,
            refunded_at: now,
            audit: AuditLogEntry {
                action: "milestone_refunded",
                actor_id: caller_id,
                payload: serde_json::json!({
                    "milestone_id": milestone_id,
                    "transaction_id": transaction.id,
                    "amount_cents": refund.refunded_cents,
                }),
                created_at: now,
            },
        };

        if let Err(err) = self.store.apply_refund(group).await {
            // Funds already moved at the provider; flag for reconciliation.
            error!(
                transaction_id = transaction.id,
                gateway_ref = %transaction.gateway_ref,
                error = %err,
                "refund captured at gateway but local commit failed"
            );
            return Err(err.into());
        }

        info!(milestone_id, caller_id, amount, "milestone refunded");
        Ok(RefundOutcome {
            transaction_id: transaction.id,
            refund_amount_cents: refund.refunded_cents,
            refunded_at: now,
        })
    }

    async fn release(
        &self,
        transaction: EscrowTransaction,
        milestone: Option<Milestone>,
        caller_id: i64,
        partial_cents: Option<i64>,
        audit_action: &'static str,
    ) -> Result<ReleaseOutcome, EscrowError> {
        if caller_id != transaction.client_id {
            return Err(EscrowError::Unauthorized);
        }
        if transaction.status != EscrowStatus::Held {
            return Err(EscrowError::StateConflict {
                current: transaction.status.as_str().to_string(),
            });
        }

        let full_amount = milestone.as_ref().map(|m| m.amount_cents);
        let release_amount = match (partial_cents, full_amount) {
            (Some(partial), _) if partial <= 0 => {
                return Err(EscrowError::Validation(
                    "partial release amount must be positive".into(),
                ));
            }
            (Some(partial), Some(full)) if partial > full => {
                return Err(EscrowError::Validation(format!(
                    "partial release amount {partial} exceeds milestone amount {full}"
                )));
            }
            (Some(partial), _) => partial,
            (None, Some(full)) => full,
            (None, None) => {
                return Err(EscrowError::Validation(
                    "release amount is required for a transaction without a milestone".into(),
                ));
            }
        };

        // Gateway first: its fund movement is not revocable here, so it is
        // the commit point. A failure aborts with no local writes.
        let capture = self
            .gateway
            .capture(&transaction.gateway_ref, Some(release_amount))
            .await
            .map_err(EscrowError::from)?;

        let now = Utc::now();
        let group = ReleaseGroup {
            transaction_id: transaction.id,
            milestone_id: milestone.as_ref().map(|m| m.id),
            amount_cents: capture.captured_cents,
            released_at: now,
            audit: AuditLogEntry {
                action: audit_action,
                actor_id: caller_id,
                payload: serde_json::json!({
                    "transaction_id": transaction.id,
                    "milestone_id": milestone.as_ref().map(|m| m.id),
                    "amount_cents": capture.captured_cents,
                }),
                created_at: now,
            },
        };

        if let Err(err) = self.store.apply_release(group).await {
            error!(
                transaction_id = transaction.id,
                gateway_ref = %transaction.gateway_ref,
                error = %err,
                "capture succeeded at gateway but local commit failed"
            );
            return Err(err.into());
        }

        info!(
            transaction_id = transaction.id,
            caller_id, release_amount, "escrow released"
        );
        Ok(ReleaseOutcome {
            transaction_id: transaction.id,
            release_amount_cents: capture.captured_cents,
            released_at: now,
        })
    }
}

/// A milestone without a funding transaction has nothing to move through
/// the state machine yet.
fn funded_transaction(
    transaction: Option<EscrowTransaction>,
) -> Result<EscrowTransaction, EscrowError> {
    transaction.ok_or(EscrowError::StateConflict {
        current: "unfunded".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CaptureResult, HoldStatus, RefundResult, StaticGateway};
    use async_trait::async_trait;

    struct FailingGateway;

    #[async_trait]
    impl PaymentGateway for FailingGateway {
        async fn hold(&self, _: i64, _: &str) -> Result<String, GatewayError> {
            Err(GatewayError::Transport("connection reset".into()))
        }
        async fn capture(&self, _: &str, _: Option<i64>) -> Result<CaptureResult, GatewayError> {
            Err(GatewayError::Declined("card expired".into()))
        }
        async fn refund(&self, _: &str, _: Option<i64>) -> Result<RefundResult, GatewayError> {
            Err(GatewayError::Declined("refund window closed".into()))
        }
        async fn get_status(&self, _: &str) -> Result<HoldStatus, GatewayError> {
            Err(GatewayError::Transport("connection reset".into()))
        }
    }

    const CLIENT: i64 = 100;
    const FREELANCER: i64 = 200;

    fn seeded_store(status: EscrowStatus, milestone_status: MilestoneStatus) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_milestone(Milestone {
            id: 1,
            contract_id: 10,
            amount_cents: 50_000,
            status: milestone_status,
            transaction_id: Some(7),
        });
        store.insert_transaction(EscrowTransaction {
            id: 7,
            contract_id: 10,
            milestone_id: Some(1),
            client_id: CLIENT,
            freelancer_id: FREELANCER,
            gateway_ref: "hold-abc".into(),
            status,
            held_at: Utc::now(),
            released_at: None,
        });
        store
    }

    fn service(store: Arc<MemoryStore>) -> EscrowService {
        EscrowService::new(store, Arc::new(StaticGateway::new()))
    }

    #[tokio::test]
    async fn full_release_approves_milestone_and_writes_ledger_and_audit() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Review);
        let escrow = service(store.clone());

        let outcome = escrow.release_milestone(1, CLIENT, None).await.unwrap();
        assert_eq!(outcome.release_amount_cents, 50_000);

        let transaction = store.stored_transaction(7).unwrap();
        assert_eq!(transaction.status, EscrowStatus::Released);
        assert!(transaction.released_at.is_some());
        assert_eq!(store.milestone(1).unwrap().status, MilestoneStatus::Approved);

        let ledger = store.ledger_entries();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, LedgerKind::EscrowRelease);
        assert_eq!(ledger[0].amount_cents, 50_000);

        let audit = store.audit_entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "milestone_accepted");
        assert_eq!(audit[0].actor_id, CLIENT);
    }

    #[tokio::test]
    async fn partial_release_passes_amount_through() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Review);
        let escrow = service(store.clone());

        let outcome = escrow
            .release_milestone(1, CLIENT, Some(20_000))
            .await
            .unwrap();
        assert_eq!(outcome.release_amount_cents, 20_000);
        assert_eq!(store.ledger_entries()[0].amount_cents, 20_000);
    }

    #[tokio::test]
    async fn partial_over_milestone_amount_fails_validation_with_no_writes() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Review);
        let escrow = service(store.clone());

        let err = escrow
            .release_milestone(1, CLIENT, Some(50_001))
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::Validation(_)));

        assert_eq!(store.stored_transaction(7).unwrap().status, EscrowStatus::Held);
        assert!(store.ledger_entries().is_empty());
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn non_positive_partial_fails_validation() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Review);
        let escrow = service(store);

        for amount in [0, -5] {
            let err = escrow
                .release_milestone(1, CLIENT, Some(amount))
                .await
                .unwrap_err();
            assert!(matches!(err, EscrowError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn release_requires_the_contract_client() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Review);
        let escrow = service(store.clone());

        let err = escrow
            .release_milestone(1, FREELANCER, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::Unauthorized));
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn release_from_non_held_status_names_the_current_state() {
        let store = seeded_store(EscrowStatus::Released, MilestoneStatus::Approved);
        let escrow = service(store.clone());

        let err = escrow.release_milestone(1, CLIENT, None).await.unwrap_err();
        match err {
            EscrowError::StateConflict { current } => assert_eq!(current, "released"),
            other => panic!("expected state conflict, got {other:?}"),
        }
        assert!(store.ledger_entries().is_empty());
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn gateway_failure_aborts_release_with_no_local_writes() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Review);
        let escrow = EscrowService::new(store.clone(), Arc::new(FailingGateway));

        let err = escrow.release_milestone(1, CLIENT, None).await.unwrap_err();
        assert!(matches!(err, EscrowError::Gateway(_)));

        assert_eq!(store.stored_transaction(7).unwrap().status, EscrowStatus::Held);
        assert_eq!(store.milestone(1).unwrap().status, MilestoneStatus::Review);
        assert!(store.ledger_entries().is_empty());
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn delivery_moves_milestone_to_review_with_audit() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Pending);
        let escrow = service(store.clone());

        let delivery = escrow
            .deliver_milestone(1, FREELANCER, "s3://bundle.tar.gz", "sha256:abc")
            .await
            .unwrap();
        assert_eq!(delivery.milestone_id, 1);

        assert_eq!(store.milestone(1).unwrap().status, MilestoneStatus::Review);
        let audit = store.audit_entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "milestone_delivered");
        assert_eq!(audit[0].actor_id, FREELANCER);
    }

    #[tokio::test]
    async fn delivery_requires_the_freelancer() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Pending);
        let escrow = service(store);

        let err = escrow
            .deliver_milestone(1, CLIENT, "s3://bundle.tar.gz", "sha256:abc")
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::Unauthorized));
    }

    #[tokio::test]
    async fn delivery_of_already_delivered_milestone_conflicts() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Review);
        let escrow = service(store.clone());

        let err = escrow
            .deliver_milestone(1, FREELANCER, "s3://bundle.tar.gz", "sha256:abc")
            .await
            .unwrap_err();
        match err {
            EscrowError::StateConflict { current } => assert_eq!(current, "review"),
            other => panic!("expected state conflict, got {other:?}"),
        }
        assert!(store.deliveries().is_empty());
    }

    #[tokio::test]
    async fn missing_milestone_is_not_found() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Pending);
        let escrow = service(store);

        let err = escrow.release_milestone(99, CLIENT, None).await.unwrap_err();
        assert!(matches!(err, EscrowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn refund_disputes_milestone_and_writes_refund_ledger() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Review);
        let escrow = service(store.clone());

        let outcome = escrow.refund_milestone(1, CLIENT).await.unwrap();
        assert_eq!(outcome.refund_amount_cents, 50_000);

        assert_eq!(
            store.stored_transaction(7).unwrap().status,
            EscrowStatus::Refunded
        );
        assert_eq!(store.milestone(1).unwrap().status, MilestoneStatus::Disputed);
        assert_eq!(store.ledger_entries()[0].kind, LedgerKind::EscrowRefund);
        assert_eq!(store.audit_entries()[0].action, "milestone_refunded");
    }

    #[tokio::test]
    async fn concurrent_releases_let_exactly_one_win() {
        let store = seeded_store(EscrowStatus::Held, MilestoneStatus::Review);
        let escrow = service(store.clone());

        let first = escrow.release_milestone(1, CLIENT, None).await;
        let second = escrow.release_milestone(1, CLIENT, None).await;

        assert!(first.is_ok());
        assert!(matches!(second, Err(EscrowError::StateConflict { .. })));
        assert_eq!(store.ledger_entries().len(), 1);
        assert_eq!(store.audit_entries().len(), 1);
    }

    #[tokio::test]
    async fn direct_transaction_release_without_milestone_needs_amount() {
        let store = Arc::new(MemoryStore::new());
        store.insert_transaction(EscrowTransaction {
            id: 8,
            contract_id: 11,
            milestone_id: None,
            client_id: CLIENT,
            freelancer_id: FREELANCER,
            gateway_ref: "hold-def".into(),
            status: EscrowStatus::Held,
            held_at: Utc::now(),
            released_at: None,
        });
        let escrow = service(store.clone());

        let err = escrow
            .release_transaction(8, CLIENT, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::Validation(_)));

        let outcome = escrow
            .release_transaction(8, CLIENT, Some(12_500))
            .await
            .unwrap();
        assert_eq!(outcome.release_amount_cents, 12_500);
        assert_eq!(store.audit_entries()[0].action, "escrow_released");
    }
}
