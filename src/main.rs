use clap::{Parser, Subcommand};
use chrono::{DateTime, Utc};
use laminar::actions::{
    AddLiquidityAction, BridgeRebalanceAction, RemoveLiquidityAction, SwapAction, VaultSyncAction,
};
use laminar::api::{self, ApiState};
use laminar::chain::{
    BridgeClient, ChainClient, GatewayChainClient, HttpBridgeClient, SimBridgeClient,
    SimChainClient,
};
use laminar::config::{AppConfig, LoggingConfig};
use laminar::error::Result;
use laminar::persistence::{MemoryTaskStore, SqliteTaskStore, TaskStore};
use laminar::runner::{ActionRunner, Scheduler};
use laminar::scoring::ScoreFeed;
use laminar::validation::validate_config;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "laminar", about = "Cross-chain liquidity rebalancing agent")]
struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rebalancing daemon
    Run {
        /// Force dry-run mode (simulated chains, in-memory store)
        #[arg(long)]
        dry_run: bool,
    },
    /// List recent tasks from the store
    Tasks {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Only tasks in a non-terminal status
        #[arg(long)]
        active: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { dry_run } => {
            let config = load_config(&cli.config_dir, dry_run)?;
            init_logging(&config.logging);
            validate_config(&config)?;
            run_daemon(config).await
        }
        Commands::Tasks { limit, active } => {
            init_logging(&LoggingConfig::default());
            let config = load_config(&cli.config_dir, false)?;
            show_tasks(&config, limit, active).await
        }
    }
}

fn load_config(config_dir: &str, force_dry_run: bool) -> Result<AppConfig> {
    match AppConfig::load_from(config_dir) {
        Ok(mut config) => {
            if force_dry_run {
                config.dry_run.enabled = true;
            }
            Ok(config)
        }
        Err(e) if force_dry_run => {
            eprintln!(
                "No usable configuration in '{}' ({}); using built-in dry-run defaults",
                config_dir, e
            );
            Ok(AppConfig::default_dry_run())
        }
        Err(e) => Err(e.into()),
    }
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},laminar=debug,sqlx=warn", config.level))
    });

    // Opt-in daily rotating file log next to the console output
    let file_layer = std::env::var("LAMINAR_LOG_DIR").ok().and_then(|log_dir| {
        if std::fs::create_dir_all(&log_dir).is_err() {
            eprintln!(
                "Warning: could not create log directory {}, file logging disabled",
                log_dir
            );
            return None;
        }

        let file_appender = tracing_appender::rolling::daily(&log_dir, "laminar.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // Keep the guard alive by leaking it (acceptable for a long-running process)
        Box::leak(Box::new(guard));

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .boxed(),
        )
    });

    let console_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .json()
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn TaskStore>> {
    if config.dry_run.enabled {
        info!("Dry run: using the in-memory task store");
        Ok(Arc::new(MemoryTaskStore::new()))
    } else {
        let store =
            SqliteTaskStore::open(&config.database.url, config.database.max_connections).await?;
        Ok(Arc::new(store))
    }
}

async fn build_chains(config: &AppConfig) -> Result<Vec<Arc<dyn ChainClient>>> {
    let mut chains: Vec<Arc<dyn ChainClient>> = Vec::with_capacity(config.chains.len());

    for (index, chain_config) in config.chains.iter().enumerate() {
        if config.dry_run.enabled {
            // Stagger the simulated market profiles so the score spread is
            // wide enough for the rebalance route to fire
            let sim = SimChainClient::new(
                chain_config.chain_id,
                &chain_config.name,
                &chain_config.quote_asset,
            )
            .with_market_profile(
                Decimal::from(1 + index as i64),
                Decimal::ONE,
                Decimal::new(1, 1),
            );
            sim.fund_vault(&chain_config.quote_asset, Decimal::new(10_000, 0))
                .await;
            chains.push(Arc::new(sim));
        } else {
            chains.push(Arc::new(GatewayChainClient::new(
                chain_config.chain_id,
                &chain_config.name,
                &chain_config.gateway_url,
            )?));
        }
    }

    Ok(chains)
}

fn build_runner(
    config: &AppConfig,
    store: Arc<dyn TaskStore>,
    chains: &[Arc<dyn ChainClient>],
    bridge: Arc<dyn BridgeClient>,
    feed: &ScoreFeed,
) -> ActionRunner {
    let mut runner = ActionRunner::new(store);
    let handle = feed.handle();
    let pair = config.scoring.reference_pair.as_str();

    for (chain, chain_config) in chains.iter().zip(&config.chains) {
        runner.register(Arc::new(VaultSyncAction::new(
            chain.clone(),
            &chain_config.quote_asset,
            pair,
            &config.actions.vault_sync,
        )));
        runner.register(Arc::new(SwapAction::new(
            chain.clone(),
            handle.clone(),
            &chain_config.quote_asset,
            config.actions.swap.clone(),
            &config.scoring,
        )));
        runner.register(Arc::new(AddLiquidityAction::new(
            chain.clone(),
            handle.clone(),
            pair,
            &chain_config.quote_asset,
            config.actions.liquidity.clone(),
            &config.scoring,
        )));
        runner.register(Arc::new(RemoveLiquidityAction::new(
            chain.clone(),
            handle.clone(),
            pair,
            config.actions.liquidity.clone(),
            &config.scoring,
        )));
    }

    // One bridge definition per directed chain pair
    for source in chains {
        for dest in chains {
            if source.chain_id() != dest.chain_id() {
                runner.register(Arc::new(BridgeRebalanceAction::new(
                    source.clone(),
                    dest.clone(),
                    bridge.clone(),
                    handle.clone(),
                    config.actions.rebalance.clone(),
                    &config.scoring,
                )));
            }
        }
    }

    runner
}

async fn run_daemon(config: AppConfig) -> Result<()> {
    info!(
        "Starting laminar: {} chains, dry_run={}",
        config.chains.len(),
        config.dry_run.enabled
    );

    let store = open_store(&config).await?;
    let chains = build_chains(&config).await?;

    let bridge: Arc<dyn BridgeClient> = if config.dry_run.enabled {
        Arc::new(SimBridgeClient::new(2))
    } else {
        Arc::new(HttpBridgeClient::new(&config.bridge.url)?)
    };

    let feed = ScoreFeed::new(config.scoring.clone(), chains.clone());
    if let Err(e) = feed.refresh().await {
        warn!("Initial score refresh failed: {}", e);
    }

    let runner = build_runner(&config, store.clone(), &chains, bridge, &feed);
    info!(
        "Registered {} action definitions",
        runner.definitions().len()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed_handle = tokio::spawn(feed.run(shutdown_rx.clone()));

    let api_state = Arc::new(ApiState {
        store: store.clone(),
        started_at: Utc::now(),
        max_limit: config.api.max_limit,
    });
    let api_port = config.api.port;
    let api_shutdown = shutdown_rx.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, api_port, api_shutdown).await {
            error!("Task query API failed: {}", e);
        }
    });

    let scheduler = Scheduler::new(
        runner,
        Duration::from_millis(config.scheduler.tick_interval_ms),
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = scheduler_handle.await;
    let _ = feed_handle.await;
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

async fn show_tasks(config: &AppConfig, limit: usize, active: bool) -> Result<()> {
    let store =
        SqliteTaskStore::open(&config.database.url, config.database.max_connections).await?;

    let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_else(Utc::now);
    let mut tasks = if active {
        store.get_active_tasks().await?
    } else {
        store.get_all_tasks(epoch, None).await?
    };
    tasks.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    tasks.truncate(limit);

    if tasks.is_empty() {
        println!("no tasks recorded");
        return Ok(());
    }

    for task in tasks {
        let finished = task
            .finished_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<28} {:<10} started={} finished={} {}",
            task.id,
            task.definition_name,
            task.status.to_string(),
            task.started_at.to_rfc3339(),
            finished,
            task.status_message
        );
    }
    Ok(())
}
