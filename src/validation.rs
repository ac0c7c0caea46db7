//! Startup validation of the loaded configuration
//!
//! Malformed configuration is fatal: it aborts process startup and never
//! reaches the scheduler.

use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::config::AppConfig;
use crate::error::{LaminarError, Result};

/// Validate the whole configuration, collecting every problem before failing
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.scheduler.tick_interval_ms == 0 {
        errors.push("scheduler.tick_interval_ms must be positive".to_string());
    }

    if config.database.url.is_empty() {
        errors.push("database.url must be set".to_string());
    }

    if config.chains.is_empty() {
        errors.push("at least one chain must be configured".to_string());
    }

    let mut seen_ids = HashSet::new();
    for chain in &config.chains {
        if !seen_ids.insert(chain.chain_id) {
            errors.push(format!("duplicate chain_id {}", chain.chain_id));
        }
        if chain.name.is_empty() {
            errors.push(format!("chain {} has an empty name", chain.chain_id));
        }
        if !config.dry_run.enabled {
            if let Err(e) = validate_endpoint_url(&chain.gateway_url) {
                errors.push(format!(
                    "chain {} gateway_url invalid: {}",
                    chain.chain_id, e
                ));
            }
        }
        if chain.quote_asset.is_empty() {
            errors.push(format!("chain {} has an empty quote_asset", chain.chain_id));
        }
    }

    if !config.dry_run.enabled {
        if let Err(e) = validate_endpoint_url(&config.bridge.url) {
            errors.push(format!("bridge.url invalid: {}", e));
        }
    }

    if config.scoring.reference_pair.is_empty() {
        errors.push("scoring.reference_pair must be set".to_string());
    }
    if config.scoring.min_score_delta < Decimal::ZERO {
        errors.push("scoring.min_score_delta cannot be negative".to_string());
    }
    if config.scoring.refresh_interval_ms == 0 {
        errors.push("scoring.refresh_interval_ms must be positive".to_string());
    }

    if config.actions.liquidity.tranche <= Decimal::ZERO {
        errors.push("actions.liquidity.tranche must be positive".to_string());
    }
    if config.actions.liquidity.min_vault_reserve < Decimal::ZERO {
        errors.push("actions.liquidity.min_vault_reserve cannot be negative".to_string());
    }
    if config.actions.swap.amount <= Decimal::ZERO {
        errors.push("actions.swap.amount must be positive".to_string());
    }
    if config.actions.rebalance.transfer_amount <= Decimal::ZERO {
        errors.push("actions.rebalance.transfer_amount must be positive".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LaminarError::Validation(errors.join("; ")))
    }
}

fn validate_endpoint_url(url: &str) -> std::result::Result<(), String> {
    if url.is_empty() {
        return Err("empty url".to_string());
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(format!("'{}' is not an http(s) url", url));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_defaults_validate() {
        let config = AppConfig::default_dry_run();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn duplicate_chain_ids_are_fatal() {
        let mut config = AppConfig::default_dry_run();
        config.chains[1].chain_id = config.chains[0].chain_id;

        let err = validate_config(&config).expect_err("duplicate ids should fail");
        assert!(err.to_string().contains("duplicate chain_id"));
    }

    #[test]
    fn live_mode_requires_gateway_urls() {
        let mut config = AppConfig::default_dry_run();
        config.dry_run.enabled = false;

        let err = validate_config(&config).expect_err("empty urls should fail live");
        assert!(err.to_string().contains("gateway_url"));
    }

    #[test]
    fn zero_tick_interval_is_fatal() {
        let mut config = AppConfig::default_dry_run();
        config.scheduler.tick_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }
}
