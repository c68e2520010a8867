//! ovpn-control: daemon and command-line client.
//!
//! `ovpn-control serve` runs the daemon: it restores the last saved `.ovpn`
//! configuration, then serves WebSocket standing channels and the one-shot
//! control socket.  Every other subcommand is a client that sends a single
//! request to a running daemon over the control socket.
//!
//! # Usage
//!
//! ```text
//! ovpn-control serve [--ws-addr ADDR] [--state-dir DIR] [--ephemeral]
//! ovpn-control status
//! ovpn-control show
//! ovpn-control connect  office.ovpn
//! ovpn-control disconnect
//! ovpn-control save     office.ovpn
//! ovpn-control export   [vpn-config.ovpn]
//! ovpn-control init-config
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable            | Default                  | Description                 |
//! |---------------------|--------------------------|-----------------------------|
//! | `OVPN_CONFIG`       | platform `daemon.toml`   | Settings file               |
//! | `OVPN_WS_ADDR`      | `127.0.0.1:24850`        | WebSocket listener          |
//! | `OVPN_CONTROL_ADDR` | `127.0.0.1:24851`        | Control socket              |
//! | `OVPN_STATE_DIR`    | platform config dir      | Persisted config directory  |
//!
//! Precedence: command-line flag, then environment variable, then the
//! settings file, then the built-in default.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ovpn_core::{parse_config, ConnectionStatus};
use ovpn_daemon::application::{ConnectionStateStore, Dispatcher, PersistenceAdapter, RequestGateway};
use ovpn_daemon::infrastructure::control_socket::{self, ControlClient};
use ovpn_daemon::infrastructure::storage::config::{self as settings, DaemonConfig};
use ovpn_daemon::infrastructure::storage::{JsonFileStore, MemoryStore};
use ovpn_daemon::infrastructure::transfer::{self, DEFAULT_EXPORT_FILENAME};
use ovpn_daemon::infrastructure::tunnel::SimulatedTunnel;
use ovpn_daemon::infrastructure::ws_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// OpenVPN configuration control-plane.
#[derive(Debug, Parser)]
#[command(
    name = "ovpn-control",
    about = "Holds the active .ovpn configuration and keeps every UI in sync with it",
    version
)]
struct Cli {
    /// Settings file to read instead of the platform default.
    #[arg(long, global = true, env = "OVPN_CONFIG")]
    config: Option<PathBuf>,

    /// Control socket address; the daemon binds it, clients connect to it.
    #[arg(long, global = true, env = "OVPN_CONTROL_ADDR")]
    control_addr: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the daemon in the foreground.
    Serve {
        /// WebSocket listener address for standing channels.
        #[arg(long, env = "OVPN_WS_ADDR")]
        ws_addr: Option<String>,

        /// Directory for the persisted configuration record.
        #[arg(long, env = "OVPN_STATE_DIR")]
        state_dir: Option<PathBuf>,

        /// Keep the configuration in memory only.
        #[arg(long)]
        ephemeral: bool,
    },
    /// Print the connection status and a summary of the active config.
    Status,
    /// Print the active config text.
    Show,
    /// Import a .ovpn/.conf file, activate it and connect.
    Connect { file: PathBuf },
    /// Disconnect; the active config is kept.
    Disconnect,
    /// Import a .ovpn/.conf file and activate it without connecting.
    Save { file: PathBuf },
    /// Write the active config to a file (or into a directory).
    Export {
        #[arg(default_value = DEFAULT_EXPORT_FILENAME)]
        file: PathBuf,
    },
    /// Write a settings file with the default values.
    InitConfig,
}

/// Daemon settings after merging flags, environment and the settings file.
#[derive(Debug, Clone, PartialEq)]
struct ServeSettings {
    ws_addr: SocketAddr,
    control_addr: SocketAddr,
    /// `None` keeps the config in memory only.
    state_dir: Option<PathBuf>,
}

impl Cli {
    /// Resolves the control socket address against the settings file.
    fn control_addr(&self, file: &DaemonConfig) -> anyhow::Result<SocketAddr> {
        parse_addr(
            self.control_addr
                .as_deref()
                .unwrap_or(&file.network.control_bind_address),
            "control socket",
        )
    }

    /// Builds [`ServeSettings`] for the `serve` subcommand.
    fn serve_settings(&self, file: &DaemonConfig) -> anyhow::Result<ServeSettings> {
        let Command::Serve {
            ws_addr,
            state_dir,
            ephemeral,
        } = &self.command
        else {
            anyhow::bail!("serve settings requested for a client subcommand");
        };

        let ws_addr = parse_addr(
            ws_addr.as_deref().unwrap_or(&file.network.ws_bind_address),
            "WebSocket",
        )?;
        let state_dir = if *ephemeral {
            None
        } else {
            match state_dir {
                Some(dir) => Some(dir.clone()),
                None => Some(file.state_dir().context("no state directory available")?),
            }
        };

        Ok(ServeSettings {
            ws_addr,
            control_addr: self.control_addr(file)?,
            state_dir,
        })
    }
}

fn parse_addr(value: &str, what: &str) -> anyhow::Result<SocketAddr> {
    value
        .parse()
        .with_context(|| format!("invalid {what} address: '{value}'"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings_path = match &cli.config {
        Some(path) => path.clone(),
        None => settings::config_file_path()?,
    };
    let file = settings::load_config_from(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;

    // `RUST_LOG` wins over the settings file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&file.log_level)),
        )
        .init();

    match &cli.command {
        Command::Serve { .. } => serve(cli.serve_settings(&file)?).await,
        Command::InitConfig => {
            settings::save_config_to(&DaemonConfig::default(), &settings_path)?;
            println!("Wrote default settings to {}", settings_path.display());
            Ok(())
        }
        command => run_client(command, ControlClient::new(cli.control_addr(&file)?)).await,
    }
}

// ── Daemon ────────────────────────────────────────────────────────────────────

async fn serve(settings: ServeSettings) -> anyhow::Result<()> {
    let persistence: Arc<dyn PersistenceAdapter> = match &settings.state_dir {
        Some(dir) => {
            info!("Persisting config under {}", dir.display());
            Arc::new(JsonFileStore::new(dir))
        }
        None => {
            info!("Ephemeral mode: config is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let mut store = ConnectionStateStore::new(persistence);
    if store.load_initial().await.is_err() {
        warn!("Starting without a stored config");
    }

    let gateway = RequestGateway::new(Arc::new(SimulatedTunnel::new()));
    let (dispatcher, handle) = Dispatcher::new(store, gateway);
    tokio::spawn(dispatcher.run());

    info!(
        "ovpn-control daemon starting: ws={}, control={}",
        settings.ws_addr, settings.control_addr
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    tokio::try_join!(
        ws_server::run_server(settings.ws_addr, handle.clone(), Arc::clone(&running)),
        control_socket::run_server(settings.control_addr, handle, Arc::clone(&running)),
    )?;

    info!("ovpn-control daemon stopped");
    Ok(())
}

// ── Client subcommands ────────────────────────────────────────────────────────

async fn run_client(command: &Command, client: ControlClient) -> anyhow::Result<()> {
    match command {
        Command::Status => {
            let (connected, config) = client.status().await?;
            println!("Status: {}", ConnectionStatus::from_connected(connected));
            if let Some(raw) = config {
                print_summary(&raw);
            }
        }
        Command::Show => match client.config().await? {
            Some(raw) => print!("{raw}"),
            None => println!("No config saved"),
        },
        Command::Connect { file } => {
            let text = transfer::import_config(file)?;
            let raw = transfer::config_for_connect(&text)?;
            println!("{}", ConnectionStatus::Connecting);
            client.connect(raw).await?;
            println!("Connected successfully!");
            print_summary(raw);
        }
        Command::Disconnect => {
            client.disconnect().await?;
            println!("Disconnected successfully!");
        }
        Command::Save { file } => {
            let text = transfer::import_config(file)?;
            let raw = transfer::config_for_save(&text)?;
            client.save_config(raw).await?;
            println!("Config saved successfully!");
            print_summary(raw);
        }
        Command::Export { file } => export(&client, file).await?,
        Command::Serve { .. } | Command::InitConfig => {
            anyhow::bail!("not a client subcommand")
        }
    }
    Ok(())
}

async fn export(client: &ControlClient, file: &Path) -> anyhow::Result<()> {
    let raw = client.config().await?.unwrap_or_default();
    let written = transfer::export_config(&raw, file)?;
    println!("Exported to {}", written.display());
    Ok(())
}

/// Prints the connection details derived from `raw`, if it parses.
fn print_summary(raw: &str) {
    if let Ok(config) = parse_config(raw) {
        for line in config.summary() {
            println!("  {line}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
