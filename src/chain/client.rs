use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{LaminarError, Result};

/// Boundary to one chain's deployed contracts (vault, position manager,
/// pool), consumed as opaque asynchronous operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    fn name(&self) -> &str;

    fn is_dry_run(&self) -> bool;

    /// Current gas cost normalized to the quote asset
    async fn gas_price(&self) -> Result<Decimal>;

    /// Free balance of `asset` sitting in the chain's vault buffer
    async fn vault_balance(&self, asset: &str) -> Result<Decimal>;

    /// Value currently deployed into the pool for `pair`
    async fn pool_position(&self, pair: &str) -> Result<Decimal>;

    /// Historic yield of the reference pool for `pair`
    async fn pool_yield(&self, pair: &str) -> Result<Decimal>;

    /// Historic price volatility of `pair`
    async fn price_volatility(&self, pair: &str) -> Result<Decimal>;

    /// Swap `amount` of `sell` into `buy` inside the vault; returns the tx hash
    async fn swap(&self, sell: &str, buy: &str, amount: Decimal) -> Result<String>;

    /// Move `amount` from the vault buffer into the pool; returns the tx hash
    async fn deposit_liquidity(&self, pair: &str, amount: Decimal) -> Result<String>;

    /// Pull `amount` out of the pool back into the vault buffer
    async fn withdraw_liquidity(&self, pair: &str, amount: Decimal) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct GasResponse {
    gas_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Decimal,
}

#[derive(Debug, Deserialize)]
struct PoolStatsResponse {
    pool_yield: Decimal,
    volatility: Decimal,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    tx_hash: String,
}

/// Live client speaking JSON to a per-chain execution gateway
pub struct GatewayChainClient {
    chain_id: u64,
    name: String,
    base_url: String,
    http: reqwest::Client,
}

impl GatewayChainClient {
    pub fn new(chain_id: u64, name: &str, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            chain_id,
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(LaminarError::Rpc {
                chain_id: self.chain_id,
                message: format!("GET {} -> {}", path, resp.status()),
            });
        }
        Ok(resp.json().await?)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.post(&url).json(body).send().await?;
        if !resp.status().is_success() {
            return Err(LaminarError::Rpc {
                chain_id: self.chain_id,
                message: format!("POST {} -> {}", path, resp.status()),
            });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ChainClient for GatewayChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_dry_run(&self) -> bool {
        false
    }

    async fn gas_price(&self) -> Result<Decimal> {
        let resp: GasResponse = self.get_json("/gas").await?;
        Ok(resp.gas_price)
    }

    async fn vault_balance(&self, asset: &str) -> Result<Decimal> {
        let resp: BalanceResponse = self.get_json(&format!("/vault/{}", asset)).await?;
        Ok(resp.balance)
    }

    async fn pool_position(&self, pair: &str) -> Result<Decimal> {
        let resp: BalanceResponse = self.get_json(&format!("/pools/{}/position", pair)).await?;
        Ok(resp.balance)
    }

    async fn pool_yield(&self, pair: &str) -> Result<Decimal> {
        let resp: PoolStatsResponse = self.get_json(&format!("/pools/{}/stats", pair)).await?;
        Ok(resp.pool_yield)
    }

    async fn price_volatility(&self, pair: &str) -> Result<Decimal> {
        let resp: PoolStatsResponse = self.get_json(&format!("/pools/{}/stats", pair)).await?;
        Ok(resp.volatility)
    }

    async fn swap(&self, sell: &str, buy: &str, amount: Decimal) -> Result<String> {
        let body = serde_json::json!({ "sell": sell, "buy": buy, "amount": amount });
        let resp: TxResponse = self.post_json("/swap", &body).await?;
        Ok(resp.tx_hash)
    }

    async fn deposit_liquidity(&self, pair: &str, amount: Decimal) -> Result<String> {
        let body = serde_json::json!({ "amount": amount });
        let resp: TxResponse = self
            .post_json(&format!("/pools/{}/deposit", pair), &body)
            .await?;
        Ok(resp.tx_hash)
    }

    async fn withdraw_liquidity(&self, pair: &str, amount: Decimal) -> Result<String> {
        let body = serde_json::json!({ "amount": amount });
        let resp: TxResponse = self
            .post_json(&format!("/pools/{}/withdraw", pair), &body)
            .await?;
        Ok(resp.tx_hash)
    }
}
