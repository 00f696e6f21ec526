//! Metrilens daemon
//!
//! Hosts the reload hub and the control socket. Recompute triggers write
//! fresh `.Metrics/<unit>.json` caches and every connected lens refreshes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use metrilens_broadcaster::ReloadHub;
use metrilens_cache::{describe, details, MetricsCache, MetricsRecord};
use metrilens_daemon::config::DaemonConfig;
use metrilens_daemon::ipc::{send_command, ControlContext, ControlServer};
use metrilens_daemon::lens::{LensDescriptor, LensProvider, StaticUnit};
use metrilens_daemon::recompute::{Recomputer, TreeFileAnalyzer};
use metrilens_daemon::settings::SettingsStore;
use metrilens_daemon::version;

#[derive(Parser)]
#[command(name = "metrilens-daemon", version, about = "Code metrics cache and reload broadcaster")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reload hub and control socket (default)
    Serve,
    /// Print the cached metrics of one symbol
    Lookup {
        #[arg(long)]
        unit: String,
        #[arg(long)]
        symbol: String,
        /// Description format, overriding the saved settings
        #[arg(long)]
        format: Option<String>,
    },
    /// Print a symbol's description every time the daemon broadcasts a reload
    Watch {
        #[arg(long)]
        unit: String,
        #[arg(long)]
        symbol: String,
    },
    /// Send a control command to a running daemon
    Send {
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Print build and protocol information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DaemonConfig::load_from(path),
        None => DaemonConfig::load(),
    }
    .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(config.tracing_level())
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Lookup {
            unit,
            symbol,
            format,
        } => lookup(&config, &unit, &symbol, format),
        Command::Watch { unit, symbol } => watch(&config, unit, symbol).await,
        Command::Send { command } => {
            let reply = send_command(&config.control_socket_path, &command.join(" ")).await?;
            println!("{}", reply);
            Ok(())
        }
        Command::Version => {
            print!("{}", version::version_long());
            Ok(())
        }
    }
}

async fn serve(config: DaemonConfig) -> Result<()> {
    info!("Starting metrilens daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config.config_path.display());

    let cache = MetricsCache::new(&config.project_root);
    info!("Metrics cache directory: {}", cache.cache_dir().display());

    let hub = Arc::new(ReloadHub::new(&config.reload_socket_path));
    hub.start().await.context("Failed to start reload hub")?;

    let mut settings = SettingsStore::new(config.settings_path(), Some(Arc::clone(&hub)));
    if config.watch_settings {
        if let Err(e) = settings.start_watching(Handle::current()) {
            warn!("Settings hot-reload disabled: {:#}", e);
        }
    }

    let recomputer = Arc::new(Recomputer::new(
        cache,
        Arc::clone(&hub),
        Arc::new(TreeFileAnalyzer),
    ));

    let shutdown = Arc::new(Notify::new());
    let context = Arc::new(ControlContext {
        hub: Arc::clone(&hub),
        recomputer,
        settings: Arc::new(settings),
        shutdown: Arc::clone(&shutdown),
    });

    let mut control = ControlServer::bind(&config.control_socket_path, context)
        .context("Failed to start control server")?;

    info!("Metrilens daemon ready");
    info!("   Use 'metrilens-daemon send recompute <unit>=<tree.json>' to refresh caches");

    tokio::select! {
        result = control.run() => {
            if let Err(e) = result {
                error!("Control server error: {:#}", e);
            }
        }
        _ = shutdown.notified() => {
            info!("Shutdown requested over control socket");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down...");
    drop(control);
    if let Err(e) = hub.stop().await {
        warn!("Failed to stop reload hub: {}", e);
    }
    info!("Metrilens daemon stopped");

    Ok(())
}

fn lookup(config: &DaemonConfig, unit: &str, symbol: &str, format: Option<String>) -> Result<()> {
    let cache = MetricsCache::new(&config.project_root);
    let format = match format {
        Some(format) => format,
        None => SettingsStore::new(config.settings_path(), None).description_format(),
    };

    let record = cache.find_record(unit, symbol).unwrap_or_else(|| {
        warn!("No metrics cached for {} in unit {}", symbol, unit);
        MetricsRecord::placeholder(symbol)
    });

    println!("{}", describe(&record, &format));
    for row in details(&record) {
        println!("  {:<24} {}", row.label, row.value);
    }

    Ok(())
}

async fn watch(config: &DaemonConfig, unit: String, symbol: String) -> Result<()> {
    let settings = Arc::new(SettingsStore::new(config.settings_path(), None));
    let provider = Arc::new(LensProvider::new(
        MetricsCache::new(&config.project_root),
        Arc::new(StaticUnit(unit)),
        Arc::clone(&settings),
        &config.reload_socket_path,
    ));

    let lens = provider.create(LensDescriptor::new(PathBuf::new(), symbol));
    let mut invalidated = lens.invalidated();

    println!("{}", lens.data().description);

    loop {
        tokio::select! {
            changed = invalidated.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Err(e) = settings.reload() {
                    warn!("Failed to reload settings: {:#}", e);
                }
                println!("{}", lens.data().description);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
