//! Simulated chain and bridge backends for dry-run sessions and tests
//!
//! Balances live in memory, swaps settle instantly at par, and bridge
//! transfers complete after a configurable number of status polls.

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{LaminarError, Result};

use super::{BridgeClient, BridgeQuote, BridgeTransferStatus, ChainClient};

pub struct SimChainClient {
    chain_id: u64,
    name: String,
    quote_asset: String,
    base_yield: Decimal,
    base_volatility: Decimal,
    base_gas: Decimal,
    vault: RwLock<HashMap<String, Decimal>>,
    pools: RwLock<HashMap<String, Decimal>>,
}

impl SimChainClient {
    pub fn new(chain_id: u64, name: &str, quote_asset: &str) -> Self {
        Self {
            chain_id,
            name: name.to_string(),
            quote_asset: quote_asset.to_string(),
            base_yield: Decimal::ONE,
            base_volatility: Decimal::ONE,
            base_gas: Decimal::new(1, 1),
            vault: RwLock::new(HashMap::new()),
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Tune the sampled market profile for this simulated chain
    pub fn with_market_profile(
        mut self,
        pool_yield: Decimal,
        volatility: Decimal,
        gas: Decimal,
    ) -> Self {
        self.base_yield = pool_yield;
        self.base_volatility = volatility;
        self.base_gas = gas;
        self
    }

    pub async fn fund_vault(&self, asset: &str, amount: Decimal) {
        let mut vault = self.vault.write().await;
        *vault.entry(asset.to_string()).or_insert(Decimal::ZERO) += amount;
    }

    /// Small multiplicative noise so repeated samples look like a live feed
    fn jitter(value: Decimal) -> Decimal {
        let bps: i64 = rand::thread_rng().gen_range(-50..=50);
        value * (Decimal::ONE + Decimal::new(bps, 4))
    }

    fn sim_tx_hash() -> String {
        format!("sim-tx-{}", Uuid::new_v4().simple())
    }
}

#[async_trait]
impl ChainClient for SimChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_dry_run(&self) -> bool {
        true
    }

    async fn gas_price(&self) -> Result<Decimal> {
        Ok(Self::jitter(self.base_gas))
    }

    async fn vault_balance(&self, asset: &str) -> Result<Decimal> {
        Ok(self
            .vault
            .read()
            .await
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn pool_position(&self, pair: &str) -> Result<Decimal> {
        Ok(self
            .pools
            .read()
            .await
            .get(pair)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn pool_yield(&self, _pair: &str) -> Result<Decimal> {
        Ok(Self::jitter(self.base_yield))
    }

    async fn price_volatility(&self, _pair: &str) -> Result<Decimal> {
        Ok(Self::jitter(self.base_volatility))
    }

    async fn swap(&self, sell: &str, buy: &str, amount: Decimal) -> Result<String> {
        let mut vault = self.vault.write().await;
        let available = vault.get(sell).copied().unwrap_or(Decimal::ZERO);
        if available < amount {
            return Err(LaminarError::InsufficientBalance(format!(
                "swap needs {} {} but vault holds {}",
                amount, sell, available
            )));
        }
        *vault.entry(sell.to_string()).or_insert(Decimal::ZERO) -= amount;
        // Par settlement; good enough for a dry run
        *vault.entry(buy.to_string()).or_insert(Decimal::ZERO) += amount;
        Ok(Self::sim_tx_hash())
    }

    async fn deposit_liquidity(&self, pair: &str, amount: Decimal) -> Result<String> {
        let mut vault = self.vault.write().await;
        let available = vault
            .get(&self.quote_asset)
            .copied()
            .unwrap_or(Decimal::ZERO);
        if available < amount {
            return Err(LaminarError::InsufficientBalance(format!(
                "deposit needs {} {} but vault holds {}",
                amount, self.quote_asset, available
            )));
        }
        *vault
            .entry(self.quote_asset.clone())
            .or_insert(Decimal::ZERO) -= amount;
        drop(vault);

        let mut pools = self.pools.write().await;
        *pools.entry(pair.to_string()).or_insert(Decimal::ZERO) += amount;
        Ok(Self::sim_tx_hash())
    }

    async fn withdraw_liquidity(&self, pair: &str, amount: Decimal) -> Result<String> {
        let mut pools = self.pools.write().await;
        let deployed = pools.get(pair).copied().unwrap_or(Decimal::ZERO);
        if deployed < amount {
            return Err(LaminarError::InsufficientBalance(format!(
                "withdraw needs {} from pool {} but only {} deployed",
                amount, pair, deployed
            )));
        }
        *pools.entry(pair.to_string()).or_insert(Decimal::ZERO) -= amount;
        drop(pools);

        let mut vault = self.vault.write().await;
        *vault
            .entry(self.quote_asset.clone())
            .or_insert(Decimal::ZERO) += amount;
        Ok(Self::sim_tx_hash())
    }
}

/// Bridge backend whose transfers complete after a fixed number of polls
pub struct SimBridgeClient {
    completion_polls: u32,
    transfers: RwLock<HashMap<String, u32>>,
}

impl SimBridgeClient {
    pub fn new(completion_polls: u32) -> Self {
        Self {
            completion_polls,
            transfers: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BridgeClient for SimBridgeClient {
    fn is_dry_run(&self) -> bool {
        true
    }

    async fn quote(
        &self,
        _source_chain: u64,
        _dest_chain: u64,
        _asset: &str,
        amount: Decimal,
    ) -> Result<BridgeQuote> {
        Ok(BridgeQuote {
            fee: amount * Decimal::new(1, 3),
            estimated_seconds: 60,
        })
    }

    async fn initiate_transfer(
        &self,
        _source_chain: u64,
        _dest_chain: u64,
        _asset: &str,
        _amount: Decimal,
    ) -> Result<String> {
        let correlation_id = format!("sim-xfer-{}", Uuid::new_v4().simple());
        self.transfers
            .write()
            .await
            .insert(correlation_id.clone(), self.completion_polls);
        Ok(correlation_id)
    }

    async fn transfer_status(&self, correlation_id: &str) -> Result<BridgeTransferStatus> {
        let mut transfers = self.transfers.write().await;
        match transfers.get_mut(correlation_id) {
            None => Err(LaminarError::BridgeTransferNotFound(
                correlation_id.to_string(),
            )),
            Some(remaining) => {
                if *remaining == 0 {
                    Ok(BridgeTransferStatus::Completed)
                } else {
                    *remaining -= 1;
                    Ok(BridgeTransferStatus::Pending)
                }
            }
        }
    }
}
