// # wlmd - Cloud Whitelist Manager Daemon
//
// ⚠️ ARCHITECTURAL CONSTRAINTS ⚠️
//
// - This is a THIN integration layer ONLY
// - DO NOT add whitelist logic, provider logic, or retry logic here
// - All reconciliation logic MUST be in wlm-core
//
// The wlmd daemon is responsible for:
// 1. Parsing the command line and loading the YAML configuration
// 2. Initializing logging and the runtime
// 3. Registering providers and IP sources
// 4. Starting the whitelist engine (or running a single pass with `--once`)
//
// ## Configuration
//
// - `--config <path>` / `WLM_CONFIG`: YAML configuration file (default `config.yaml`)
// - `--log-level <level>` / `WLM_LOG_LEVEL`: trace, debug, info, warn, error
// - `--once`: run one check-and-reconcile cycle and exit
// - `WLM_MODE=dry-run`: read whitelists but log instead of changing them
//
// ## Example
//
// ```bash
// export WLM_MODE=dry-run
// wlmd --config /etc/wlm/config.yaml --once
// ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use wlm_core::{
    AccountReconciler, CycleReport, EngineEvent, PluginRegistry, WhitelistConfig, WhitelistEngine,
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WlmExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<WlmExitCode> for ExitCode {
    fn from(code: WlmExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep public IP addresses whitelisted on cloud resources
#[derive(Debug, Parser)]
#[command(name = "wlmd", version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "WLM_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "WLM_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Run a single check-and-reconcile cycle, then exit
    #[arg(long)]
    once: bool,
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "log level '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

/// Load and validate the configuration file
fn load_config(path: &Path) -> Result<WhitelistConfig> {
    let config = WhitelistConfig::load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

/// Registry with every plugin compiled into this binary
fn build_registry() -> PluginRegistry {
    let registry = PluginRegistry::new();

    #[cfg(feature = "aliyun")]
    {
        info!("Registering Alibaba Cloud provider");
        wlm_provider_aliyun::register(&registry);
    }

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP IP source");
        wlm_ip_http::register(&registry);
    }

    #[cfg(feature = "local")]
    {
        info!("Registering command and interface IP sources");
        wlm_ip_local::register(&registry);
    }

    registry
}

/// Build the engine from a validated configuration
fn build_engine(
    registry: &PluginRegistry,
    config: &WhitelistConfig,
) -> Result<(WhitelistEngine, tokio::sync::mpsc::Receiver<EngineEvent>)> {
    let resolver = registry
        .create_resolver(&config.sources())
        .context("failed to create IP sources")?;

    let mut reconcilers = Vec::new();
    for account in config.effective_accounts() {
        let provider = registry
            .create_provider(&account)
            .with_context(|| format!("failed to create provider for account {}", account.name))?;
        let reconciler = AccountReconciler::new(&account, provider);
        info!(
            "Account {}: {} target(s)",
            reconciler.name(),
            reconciler.target_count()
        );
        reconcilers.push(reconciler);
    }

    Ok(WhitelistEngine::new(resolver, reconcilers, &config.engine))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match parse_log_level(&cli.log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return WlmExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WlmExitCode::ConfigError.into();
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return WlmExitCode::ConfigError.into();
        }
    };

    info!("Starting wlmd");
    info!(
        "Configuration loaded: {} IP source(s), {} account(s), interval {}s",
        config.sources().len(),
        config.effective_accounts().len(),
        config.interval
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WlmExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let registry = build_registry();
        let (engine, events) = match build_engine(&registry, &config) {
            Ok(built) => built,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return WlmExitCode::ConfigError;
            }
        };
        tokio::spawn(log_events(events));

        let result = if cli.once {
            run_once(&engine).await
        } else {
            run_daemon(&engine, &config).await
        };

        match result {
            Ok(()) => WlmExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                WlmExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Run one cycle and report it
async fn run_once(engine: &WhitelistEngine) -> Result<()> {
    match engine.on_trigger().await? {
        CycleReport::Unchanged { ip } => info!("IP unchanged: {}", ip),
        CycleReport::Reconciled { accounts, .. } => {
            for report in &accounts {
                info!(
                    "[{}] {} target(s) updated, {} failed",
                    report.account,
                    report.succeeded(),
                    report.failed()
                );
            }
        }
        CycleReport::Skipped => warn!("Cycle skipped"),
    }
    Ok(())
}

/// Run the periodic loop until SIGTERM or SIGINT
async fn run_daemon(engine: &WhitelistEngine, config: &WhitelistConfig) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown signal error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Checking public IP every {:?}", config.interval());
    engine
        .run_with_shutdown(config.interval(), Some(shutdown_rx))
        .await?;

    info!("Shutting down daemon");
    Ok(())
}

/// Drain engine events so the channel never fills
async fn log_events(mut events: tokio::sync::mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Engine event: {:?}", event);
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
