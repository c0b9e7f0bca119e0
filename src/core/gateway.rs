//! Mobile-money payout gateway adapter.

use crate::{
    config::settings::GatewaySettings,
    errors::{Error, Result},
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// One payout order sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutRequest {
    /// Idempotency reference; the gateway pays a reference at most once
    pub reference: String,
    /// Recipient phone number
    pub phone: String,
    /// Amount in `currency`
    pub amount: Decimal,
    /// Payout currency code
    pub currency: String,
    /// Mobile-money operator
    pub carrier: String,
}

/// Gateway-side state of a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    /// Accepted; the outcome arrives by callback
    Pending,
    /// Paid out
    Completed,
    /// Refused by the operator
    Failed,
}

/// Gateway acknowledgement of a payout order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PayoutResponse {
    /// Session id echoed back by the asynchronous callback
    pub session_id: String,
    /// State at acknowledgement time
    pub status: PayoutStatus,
    /// Refusal reason, when the gateway gives one
    #[serde(default)]
    pub message: Option<String>,
}

/// Something that can send money to a phone.
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    /// Dispatches a payout. A `failed` answer is an error, not a response.
    async fn payout(&self, request: &PayoutRequest) -> Result<PayoutResponse>;
}

/// HTTP client for the payout API.
#[derive(Debug, Clone)]
pub struct HttpPayoutGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPayoutGateway {
    /// Builds a client with the configured timeout.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("cannot build payout HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Builds a client from settings, reading the API key from the environment.
    pub fn from_settings(settings: &GatewaySettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)?;
        Self::new(
            settings.base_url.clone(),
            api_key,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn payouts_url(&self) -> String {
        format!("{}/payouts", self.base_url)
    }
}

#[async_trait]
impl PayoutGateway for HttpPayoutGateway {
    async fn payout(&self, request: &PayoutRequest) -> Result<PayoutResponse> {
        debug!(
            "Dispatching payout {} of {} {} to {}",
            request.reference, request.amount, request.currency, request.carrier
        );
        let resp = self
            .client
            .post(self.payouts_url())
            .header("X-Api-Key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::GatewayUnavailable {
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::GatewayUnavailable {
            message: e.to_string(),
        })?;
        if !status.is_success() {
            warn!("Payout {} refused with HTTP {}", request.reference, status);
            return Err(Error::GatewayRejected {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: PayoutResponse =
            serde_json::from_str(&body).map_err(|e| Error::GatewayRejected {
                status: status.as_u16(),
                message: format!("invalid response: {e}; body={body}"),
            })?;
        ensure_not_failed(parsed)
    }
}

/// Turns a `failed` acknowledgement into [`Error::GatewayRejected`].
pub(crate) fn ensure_not_failed(response: PayoutResponse) -> Result<PayoutResponse> {
    if response.status == PayoutStatus::Failed {
        return Err(Error::GatewayRejected {
            status: 0,
            message: response
                .message
                .unwrap_or_else(|| format!("payout session {} failed", response.session_id)),
        });
    }
    Ok(response)
}
