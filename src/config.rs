use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub database: DatabaseConfig,
    pub scoring: ScoringConfig,
    /// One entry per managed chain
    pub chains: Vec<ChainConfig>,
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub dry_run: DryRunConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between scheduling ticks in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Sqlite connection URL, e.g. `sqlite://laminar.db`
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Reference pool pair the score samples (e.g. "weth-usdc")
    pub reference_pair: String,
    /// Weight on the reference pool's historic yield
    pub yield_weight: Decimal,
    /// Weight on historic price volatility
    pub volatility_weight: Decimal,
    /// Weight on gas cost (subtracted)
    pub gas_weight: Decimal,
    /// Absolute score floor a chain must clear to attract liquidity
    pub min_score: Decimal,
    /// Minimum best-to-worst spread before a cross-chain rebalance triggers
    pub min_score_delta: Decimal,
    /// Interval between score recomputations in milliseconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_ms: u64,
    /// Snapshot age after which predicates treat the feed as stale
    #[serde(default = "default_stale_after")]
    pub stale_after_ms: u64,
}

fn default_refresh_interval() -> u64 {
    15_000
}

fn default_stale_after() -> u64 {
    60_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// Human-readable chain name (e.g. "base")
    pub name: String,
    /// Per-chain execution gateway endpoint
    pub gateway_url: String,
    /// Asset the vault buffer and pool tranches are denominated in
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
}

fn default_quote_asset() -> String {
    "usdc".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Bridge composition service endpoint
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ActionsConfig {
    #[serde(default)]
    pub vault_sync: VaultSyncConfig,
    #[serde(default)]
    pub swap: SwapConfig,
    #[serde(default)]
    pub liquidity: LiquidityConfig,
    #[serde(default)]
    pub rebalance: RebalanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultSyncConfig {
    /// Seconds between vault syncs on one chain
    #[serde(default = "default_vault_sync_cooldown")]
    pub cooldown_secs: u64,
}

fn default_vault_sync_cooldown() -> u64 {
    300
}

impl Default for VaultSyncConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_vault_sync_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    /// Asset sold out of the vault when rebalancing composition
    #[serde(default = "default_swap_sell_asset")]
    pub sell_asset: String,
    /// Swap when the vault holds at least this much of the sell asset
    #[serde(default = "default_swap_min_balance")]
    pub min_sell_balance: Decimal,
    /// Amount swapped per task
    #[serde(default = "default_swap_amount")]
    pub amount: Decimal,
    #[serde(default = "default_action_cooldown")]
    pub cooldown_secs: u64,
}

fn default_swap_sell_asset() -> String {
    "weth".to_string()
}

fn default_swap_min_balance() -> Decimal {
    Decimal::new(1, 0)
}

fn default_swap_amount() -> Decimal {
    Decimal::new(1, 0)
}

fn default_action_cooldown() -> u64 {
    300
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            sell_asset: default_swap_sell_asset(),
            min_sell_balance: default_swap_min_balance(),
            amount: default_swap_amount(),
            cooldown_secs: default_action_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiquidityConfig {
    /// Amount deposited into or withdrawn from a pool per task
    #[serde(default = "default_liquidity_tranche")]
    pub tranche: Decimal,
    /// Vault balance that must remain free after a deposit
    #[serde(default = "default_min_vault_reserve")]
    pub min_vault_reserve: Decimal,
    #[serde(default = "default_action_cooldown")]
    pub cooldown_secs: u64,
}

fn default_liquidity_tranche() -> Decimal {
    Decimal::new(1_000, 0)
}

fn default_min_vault_reserve() -> Decimal {
    Decimal::new(500, 0)
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            tranche: default_liquidity_tranche(),
            min_vault_reserve: default_min_vault_reserve(),
            cooldown_secs: default_action_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RebalanceConfig {
    /// Asset moved between chains
    #[serde(default = "default_quote_asset")]
    pub asset: String,
    /// Amount transferred per bridge task
    #[serde(default = "default_transfer_amount")]
    pub transfer_amount: Decimal,
    #[serde(default = "default_rebalance_cooldown")]
    pub cooldown_secs: u64,
}

fn default_transfer_amount() -> Decimal {
    Decimal::new(2_500, 0)
}

fn default_rebalance_cooldown() -> u64 {
    900
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            asset: default_quote_asset(),
            transfer_amount: default_transfer_amount(),
            cooldown_secs: default_rebalance_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Task query API port (default: 8080)
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Result-count cap applied when the caller asks for more
    #[serde(default = "default_api_max_limit")]
    pub max_limit: usize,
}

fn default_api_port() -> u16 {
    8080
}

fn default_api_max_limit() -> usize {
    500
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            max_limit: default_api_max_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DryRunConfig {
    /// Enable dry run mode (simulated chains, no real transfers)
    pub enabled: bool,
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("scheduler.tick_interval_ms", default_tick_interval() as i64)?
            .set_default("database.max_connections", default_max_connections() as i64)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g. config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("LAMINAR_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (LAMINAR_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("LAMINAR")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Default configuration for a dry-run session: two simulated chains,
    /// in-memory persistence
    pub fn default_dry_run() -> Self {
        Self {
            scheduler: SchedulerConfig {
                tick_interval_ms: 1000,
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            scoring: ScoringConfig {
                reference_pair: "weth-usdc".to_string(),
                yield_weight: Decimal::ONE,
                volatility_weight: Decimal::new(5, 1),
                gas_weight: Decimal::TWO,
                min_score: Decimal::new(1, 1),
                min_score_delta: Decimal::new(5, 1),
                refresh_interval_ms: 2000,
                stale_after_ms: 60_000,
            },
            chains: vec![
                ChainConfig {
                    chain_id: 1,
                    name: "mainnet".to_string(),
                    gateway_url: String::new(),
                    quote_asset: "usdc".to_string(),
                },
                ChainConfig {
                    chain_id: 8453,
                    name: "base".to_string(),
                    gateway_url: String::new(),
                    quote_asset: "usdc".to_string(),
                },
            ],
            bridge: BridgeConfig { url: String::new() },
            actions: ActionsConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
            dry_run: DryRunConfig { enabled: true },
        }
    }
}
