use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{LaminarError, Result};

/// Quote for a cross-chain transfer
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeQuote {
    pub fee: Decimal,
    pub estimated_seconds: u64,
}

/// Backend-reported state of a submitted transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeTransferStatus {
    Pending,
    Completed,
    Failed(String),
}

/// Third-party composition service that executes value transfer across
/// chains. Its own retry and idempotency semantics are external to this
/// agent; the correlation id is the only handle on an in-flight transfer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BridgeClient: Send + Sync {
    fn is_dry_run(&self) -> bool;

    async fn quote(
        &self,
        source_chain: u64,
        dest_chain: u64,
        asset: &str,
        amount: Decimal,
    ) -> Result<BridgeQuote>;

    /// Submit the transfer; returns the backend's correlation id
    async fn initiate_transfer(
        &self,
        source_chain: u64,
        dest_chain: u64,
        asset: &str,
        amount: Decimal,
    ) -> Result<String>;

    async fn transfer_status(&self, correlation_id: &str) -> Result<BridgeTransferStatus>;
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    fee: Decimal,
    estimated_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    correlation_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// Live bridge backend client
pub struct HttpBridgeClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBridgeClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl BridgeClient for HttpBridgeClient {
    fn is_dry_run(&self) -> bool {
        false
    }

    async fn quote(
        &self,
        source_chain: u64,
        dest_chain: u64,
        asset: &str,
        amount: Decimal,
    ) -> Result<BridgeQuote> {
        let body = serde_json::json!({
            "source_chain": source_chain,
            "dest_chain": dest_chain,
            "asset": asset,
            "amount": amount,
        });
        let resp = self
            .http
            .post(format!("{}/quotes", self.base_url))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(LaminarError::BridgeTransfer(format!(
                "quote rejected: {}",
                resp.status()
            )));
        }
        let quote: QuoteResponse = resp.json().await?;
        Ok(BridgeQuote {
            fee: quote.fee,
            estimated_seconds: quote.estimated_seconds,
        })
    }

    async fn initiate_transfer(
        &self,
        source_chain: u64,
        dest_chain: u64,
        asset: &str,
        amount: Decimal,
    ) -> Result<String> {
        let body = serde_json::json!({
            "source_chain": source_chain,
            "dest_chain": dest_chain,
            "asset": asset,
            "amount": amount,
        });
        let resp = self
            .http
            .post(format!("{}/transfers", self.base_url))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(LaminarError::BridgeTransfer(format!(
                "transfer rejected: {}",
                resp.status()
            )));
        }
        let transfer: TransferResponse = resp.json().await?;
        Ok(transfer.correlation_id)
    }

    async fn transfer_status(&self, correlation_id: &str) -> Result<BridgeTransferStatus> {
        let resp = self
            .http
            .get(format!("{}/transfers/{}", self.base_url, correlation_id))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LaminarError::BridgeTransferNotFound(
                correlation_id.to_string(),
            ));
        }
        if !resp.status().is_success() {
            return Err(LaminarError::BridgeTransfer(format!(
                "status query failed: {}",
                resp.status()
            )));
        }
        let status: StatusResponse = resp.json().await?;
        match status.status.as_str() {
            "pending" | "in_flight" => Ok(BridgeTransferStatus::Pending),
            "completed" => Ok(BridgeTransferStatus::Completed),
            "failed" => Ok(BridgeTransferStatus::Failed(
                status.error.unwrap_or_else(|| "unknown".to_string()),
            )),
            other => Err(LaminarError::BridgeTransfer(format!(
                "unknown transfer status '{}'",
                other
            ))),
        }
    }
}
