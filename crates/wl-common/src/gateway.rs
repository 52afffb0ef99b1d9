use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The payment provider is an opaque collaborator: funds it has moved are
/// not revocable through this code path, so callers treat a successful call
/// as the commit point and only then touch local state.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(String),
    #[error("gateway declined: {0}")]
    Declined(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResult {
    pub status: String,
    pub captured_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub status: String,
    pub refunded_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldStatus {
    pub status: String,
    pub amount_cents: i64,
    pub captured_cents: i64,
    pub refunded_cents: i64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Place a hold and return the provider's reference for it.
    async fn hold(&self, amount_cents: i64, currency: &str) -> Result<String, GatewayError>;

    /// Capture all or part of a hold. `None` captures the full held amount.
    async fn capture(
        &self,
        hold_ref: &str,
        amount_cents: Option<i64>,
    ) -> Result<CaptureResult, GatewayError>;

    /// Refund all or part of a hold back to the payer.
    async fn refund(
        &self,
        hold_ref: &str,
        amount_cents: Option<i64>,
    ) -> Result<RefundResult, GatewayError>;

    async fn get_status(&self, hold_ref: &str) -> Result<HoldStatus, GatewayError>;
}

/// JSON-over-HTTP provider client. The provider's own timeout is the only
/// timeout; a timed-out call surfaces as `Transport` and the caller aborts
/// its transition.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPaymentGateway {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let mut request = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Declined(format!("{status}: {message}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let mut request = self.client.get(format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Declined(format!("{status}: {message}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn hold(&self, amount_cents: i64, currency: &str) -> Result<String, GatewayError> {
        #[derive(Deserialize)]
        struct HoldResponse {
            hold_ref: String,
        }

        let response: HoldResponse = self
            .post_json(
                "/holds",
                serde_json::json!({ "amount_cents": amount_cents, "currency": currency }),
            )
            .await?;
        Ok(response.hold_ref)
    }

    async fn capture(
        &self,
        hold_ref: &str,
        amount_cents: Option<i64>,
    ) -> Result<CaptureResult, GatewayError> {
        self.post_json(
            &format!("/holds/{hold_ref}/capture"),
            serde_json::json!({ "amount_cents": amount_cents }),
        )
        .await
    }

    async fn refund(
        &self,
        hold_ref: &str,
        amount_cents: Option<i64>,
    ) -> Result<RefundResult, GatewayError> {
        self.post_json(
            &format!("/holds/{hold_ref}/refund"),
            serde_json::json!({ "amount_cents": amount_cents }),
        )
        .await
    }

    async fn get_status(&self, hold_ref: &str) -> Result<HoldStatus, GatewayError> {
        self.get_json(&format!("/holds/{hold_ref}")).await
    }
}

/// Always-approving in-process gateway for tests and local development.
/// Echoes requested amounts back as captured/refunded.
#[derive(Debug, Default)]
pub struct StaticGateway {
    next_ref: AtomicU64,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentGateway for StaticGateway {
    async fn hold(&self, _amount_cents: i64, _currency: &str) -> Result<String, GatewayError> {
        let id = self.next_ref.fetch_add(1, Ordering::Relaxed);
        Ok(format!("hold-{id}"))
    }

    async fn capture(
        &self,
        _hold_ref: &str,
        amount_cents: Option<i64>,
    ) -> Result<CaptureResult, GatewayError> {
        Ok(CaptureResult {
            status: "captured".into(),
            captured_cents: amount_cents.unwrap_or(0),
        })
    }

    async fn refund(
        &self,
        _hold_ref: &str,
        amount_cents: Option<i64>,
    ) -> Result<RefundResult, GatewayError> {
        Ok(RefundResult {
            status: "refunded".into(),
            refunded_cents: amount_cents.unwrap_or(0),
        })
    }

    async fn get_status(&self, hold_ref: &str) -> Result<HoldStatus, GatewayError> {
        Ok(HoldStatus {
            status: format!("held:{hold_ref}"),
            amount_cents: 0,
            captured_cents: 0,
            refunded_cents: 0,
        })
    }
}
