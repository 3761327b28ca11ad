//! Fabric adapter daemon.
//!
//! Wires the SID store, controller lookup, pushers and engine together from
//! the configuration file, optionally applies a desired-state forest given on
//! the command line, and serves until Ctrl-C.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fabric_adapter::config::SidStoreConfig;
use fabric_adapter::pusher::{GnmiPusher, RestPusher, TonicSetClient};
use fabric_adapter::{
    AdapterConfig, ConfigForest, DeviceSettings, DeviceSynchronizer, ModelCatalog, PushCache,
    SidBackend, StaticLookup, SyncMetrics, Synchronizer, UpdateKind, DEFAULT_CONFIG_PATH,
};
use fabric_sid_store::{MemoryBackend, RedisBackend, SidAllocator, SidStore};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// SDN fabric adapter for ONOS and Stratum
#[derive(Parser, Debug)]
#[command(name = "fabric-adapter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Push every netconfig, even when unchanged
    #[arg(long)]
    partial_update_disable: bool,

    /// Translate only, never push
    #[arg(long)]
    post_disable: bool,

    /// Push timeout in seconds
    #[arg(long)]
    post_timeout: Option<u64>,

    /// Print the supported models and exit
    #[arg(long)]
    show_models: bool,

    /// Desired-state forest (JSON) to apply at start-up
    #[arg(long)]
    apply: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.show_models {
        for model in ModelCatalog::sdn_fabric().supported_models() {
            println!("{}", model);
        }
        return Ok(());
    }
    init_logging()?;

    let mut config = AdapterConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let metrics = SyncMetrics::new().context("registering metrics")?;
    let sid_store = open_sid_store(&config.sid_store).await?;
    let cache = Arc::new(PushCache::new());

    let controller = RestPusher::new(config.post_timeout()).context("building HTTP client")?;
    let chassis = GnmiPusher::new(
        Arc::new(TonicSetClient::new(config.post_timeout())),
        config.chassis.target.clone(),
        &config.chassis.path,
    )
    .with_encoding(config.chassis.payload_encoding);

    let device = DeviceSynchronizer::new(
        sid_store.clone(),
        Arc::new(StaticLookup::new(config.fabrics.clone())),
        Arc::new(controller),
        Arc::new(chassis),
        cache.clone(),
    )
    .with_settings(DeviceSettings::from(&config.synchronizer))
    .with_metrics(metrics.clone());

    let synchronizer = Synchronizer::new(Arc::new(device), cache)
        .with_retry_interval(config.retry_interval())
        .with_metrics(metrics.clone());

    info!(
        fabrics = config.fabrics.len(),
        post_enable = config.synchronizer.post_enable,
        partial_update_enable = config.synchronizer.partial_update_enable,
        "fabric-adapter: Starting"
    );
    synchronizer.start();

    if let Some(path) = &args.apply {
        let forest = load_forest(path)?;
        info!(path = %path.display(), fabrics = forest.configs.len(), "Applying forest");
        synchronizer
            .accept(
                Arc::new(forest),
                UpdateKind::Applied,
                &path.display().to_string(),
                &[],
            )
            .await;
    }

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl-C")?;
    info!("fabric-adapter: Received shutdown signal");

    if !synchronizer.wait_idle(config.post_timeout()).await {
        warn!("Engine still busy at shutdown, abandoning pending update");
    }
    synchronizer.shutdown().await;
    sid_store.close().await?;
    debug!(metrics = %metrics.gather_text(), "Final metrics");

    info!("fabric-adapter: Shutdown complete");
    Ok(())
}

/// Initialize structured logging, filtered by `RUST_LOG` (default info)
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set logger")?;
    Ok(())
}

fn apply_overrides(config: &mut AdapterConfig, args: &Args) {
    if args.partial_update_disable {
        config.synchronizer.partial_update_enable = false;
    }
    if args.post_disable {
        config.synchronizer.post_enable = false;
    }
    if let Some(secs) = args.post_timeout {
        config.synchronizer.post_timeout_secs = secs;
    }
}

async fn open_sid_store(config: &SidStoreConfig) -> Result<Arc<dyn SidStore>> {
    match config.backend {
        SidBackend::Redis => {
            let backend = RedisBackend::connect(&config.redis_url)
                .await
                .with_context(|| format!("connecting to {}", config.redis_url))?;
            Ok(Arc::new(SidAllocator::new(backend).await?))
        }
        SidBackend::Memory => {
            warn!("Using in-memory SID store; SIDs are not shared or persisted");
            Ok(Arc::new(SidAllocator::new(MemoryBackend::new()).await?))
        }
    }
}

fn load_forest(path: &Path) -> Result<ConfigForest> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}
