use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use grove_common::{
    api::ApiResponse,
    config::VERSION,
    error::EngineError,
    types::{AccountId, Grove, HarvestRecord, TokenHolding},
};
use grove_engine::{
    clock::SystemClock,
    config::EngineConfig,
    core::{
        external::{MemoryGroveRegistry, MemoryHoldings, MemoryTransferSink},
        storage::MemoryStorage,
    },
    ApiRequest, GroveApi, GroveEngine,
};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => Self::Off,
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

/// Serve engine operations as JSON lines over stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "grove-engine")]
#[command(about = "Grove revenue distribution and marketplace settlement engine")]
struct CliConfig {
    /// Set log level
    #[clap(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// JSON file to load the engine configuration from
    #[clap(long)]
    config_file: Option<String>,

    /// Generate the template at the `config_file` path
    #[clap(long)]
    generate_config_template: bool,

    /// JSON file seeding groves, harvests and balances of the in-memory collaborators
    #[clap(long)]
    fixtures_file: Option<String>,

    /// Seconds between expiry sweeps and reconciliation passes, 0 to disable
    #[clap(long, default_value_t = 60)]
    maintenance_interval_secs: u64,

    #[clap(flatten)]
    engine: EngineConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentBalance {
    holder: AccountId,
    asset: String,
    balance: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Fixtures {
    #[serde(default)]
    groves: Vec<Grove>,
    #[serde(default)]
    harvests: Vec<HarvestRecord>,
    #[serde(default)]
    holdings: Vec<TokenHolding>,
    #[serde(default)]
    payments: Vec<PaymentBalance>,
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &str) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Error while reading {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Error while parsing {}", path))
}

async fn seed(
    fixtures: Fixtures,
    registry: &MemoryGroveRegistry,
    holdings: &MemoryHoldings,
) -> Result<(), EngineError> {
    let (groves, harvests) = (fixtures.groves.len(), fixtures.harvests.len());
    for grove in fixtures.groves {
        registry.add_grove(grove).await?;
    }
    for harvest in fixtures.harvests {
        registry.add_harvest(harvest).await?;
    }
    for holding in fixtures.holdings {
        holdings
            .set_balance(&holding.grove_id, &holding.holder, holding.balance)
            .await;
    }
    for payment in fixtures.payments {
        holdings
            .set_payment_balance(&payment.holder, &payment.asset, payment.balance)
            .await;
    }
    info!("Seeded {} groves and {} harvests", groves, harvests);
    Ok(())
}

fn spawn_maintenance(engine: Arc<GroveEngine<MemoryStorage>>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = engine.sweep_expired().await {
                warn!("Expiry sweep failed: {}", e);
            }
            match engine.reconcile().await {
                Ok(report) if report.retried > 0 => debug!("Reconciled {:?}", report),
                Ok(_) => {}
                Err(e) => error!("Reconciliation failed: {}", e),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_config = CliConfig::parse();

    if let Some(path) = cli_config.config_file.as_ref() {
        if cli_config.generate_config_template {
            if Path::new(path).exists() {
                eprintln!("Config file already exists at {}", path);
                return Ok(());
            }
            let template = serde_json::to_string_pretty(&EngineConfig::default())?;
            tokio::fs::write(path, template)
                .await
                .with_context(|| format!("Error while writing {}", path))?;
            println!("Configuration template generated at {}", path);
            return Ok(());
        }
    }

    env_logger::Builder::new()
        .filter_level(cli_config.log_level.into())
        .parse_default_env()
        .init();
    info!("Grove engine v{} starting...", VERSION);

    let config = match &cli_config.config_file {
        Some(path) => {
            info!("Loading configuration from {}", path);
            read_json::<EngineConfig>(path).await?
        }
        None => cli_config.engine.clone(),
    };

    let holdings = Arc::new(MemoryHoldings::new());
    let registry = Arc::new(MemoryGroveRegistry::new());
    if let Some(path) = &cli_config.fixtures_file {
        let fixtures: Fixtures = read_json(path).await?;
        seed(fixtures, &registry, &holdings)
            .await
            .context("Error while seeding fixtures")?;
    }

    let engine = Arc::new(
        GroveEngine::new(
            config,
            Arc::new(MemoryStorage::new()),
            holdings.clone(),
            registry,
            Arc::new(MemoryTransferSink::settling_into(holdings)),
            Arc::new(SystemClock),
        )
        .context("Invalid engine configuration")?,
    );
    if cli_config.maintenance_interval_secs > 0 {
        spawn_maintenance(engine.clone(), cli_config.maintenance_interval_secs);
    }
    let api = GroveApi::new(engine);
    info!("Serving {} methods on stdin", api.method_names().len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ApiRequest>(line) {
            Ok(request) => api.handle_request(request).await,
            Err(e) => ApiResponse::err(&EngineError::from(e)),
        };
        let mut output = serde_json::to_vec(&response)?;
        output.push(b'\n');
        stdout.write_all(&output).await?;
        stdout.flush().await?;
    }

    info!("Input closed, shutting down");
    Ok(())
}
