use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of funds held against a contract milestone. Two terminal
/// states; a transaction enters the store already `Held` once the gateway
/// hold has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Held,
    Released,
    Refunded,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStatus::Held => "held",
            EscrowStatus::Released => "released",
            EscrowStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Pending,
    Review,
    Approved,
    Disputed,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "pending",
            MilestoneStatus::Review => "review",
            MilestoneStatus::Approved => "approved",
            MilestoneStatus::Disputed => "disputed",
        }
    }
}

/// Never deleted; mutated only through the release/refund transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowTransaction {
    pub id: i64,
    pub contract_id: i64,
    pub milestone_id: Option<i64>,
    pub client_id: i64,
    pub freelancer_id: i64,
    /// Provider reference for the hold backing this transaction.
    pub gateway_ref: String,
    pub status: EscrowStatus,
    pub held_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: i64,
    pub contract_id: i64,
    pub amount_cents: i64,
    pub status: MilestoneStatus,
    pub transaction_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: i64,
    pub milestone_id: i64,
    pub file_ref: String,
    pub content_hash: String,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    EscrowRelease,
    EscrowRefund,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::EscrowRelease => "escrow_release",
            LedgerKind::EscrowRefund => "escrow_refund",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub kind: LedgerKind,
    pub transaction_id: i64,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Append-only. Exactly one entry per successful logical action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    pub action: &'static str,
    pub actor_id: i64,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Milestone plus its funding transaction, as one consistent read.
#[derive(Debug, Clone, PartialEq)]
pub struct MilestoneView {
    pub milestone: Milestone,
    pub transaction: Option<EscrowTransaction>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },
    /// The guarded write found the record in a different state than the
    /// caller observed. The current state is reported for the caller.
    #[error("state conflict: current status is {current}")]
    Conflict { current: String },
    #[error("storage error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub milestone_id: i64,
    pub file_ref: String,
    pub content_hash: String,
    pub delivered_at: DateTime<Utc>,
}

/// All records written when a client accepts (releases) a milestone.
#[derive(Debug, Clone)]
pub struct ReleaseGroup {
    pub transaction_id: i64,
    pub milestone_id: Option<i64>,
    pub amount_cents: i64,
    pub released_at: DateTime<Utc>,
    pub audit: AuditLogEntry,
}

#[derive(Debug, Clone)]
pub struct RefundGroup {
    pub transaction_id: i64,
    pub milestone_id: Option<i64>,
    pub amount_cents: i64,
    pub refunded_at: DateTime<Utc>,
    pub audit: AuditLogEntry,
}

/// Persistence seam for the escrow state machine. Each `apply_*` method is
/// one atomic group: everything it names is written together or not at all,
/// and it re-checks the guarded status so concurrent releases serialize per
/// transaction id (the loser sees `Conflict`).
#[async_trait]
pub trait EscrowStore: Send + Sync {
    async fn milestone_view(&self, milestone_id: i64) -> Result<MilestoneView, StoreError>;

    async fn transaction(&self, transaction_id: i64) -> Result<EscrowTransaction, StoreError>;

    /// Milestone `pending -> review` plus the delivery record and audit
    /// entry.
    async fn apply_delivery(
        &self,
        delivery: NewDelivery,
        audit: AuditLogEntry,
    ) -> Result<Delivery, StoreError>;

    /// Transaction `held -> released`, linked milestone -> `approved`,
    /// ledger entry, audit entry.
    async fn apply_release(&self, group: ReleaseGroup) -> Result<(), StoreError>;

    /// Transaction `held -> refunded`, linked milestone -> `disputed`,
    /// ledger entry, audit entry.
    async fn apply_refund(&self, group: RefundGroup) -> Result<(), StoreError>;
}
