//! Scoreboard Control - headless control client for the live scoreboard
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use scoreboard_client::{HttpGameApi, ProtocolVersion, TungsteniteConnector};
use scoreboard_control::config::{self, Settings};
use scoreboard_control::headless::runner;
use scoreboard_control::{stdout_sink, HeadlessEvent};
use scoreboard_core::prelude::*;

/// Scoreboard Control - follow and drive the live scoreboard from a terminal
#[derive(Parser, Debug)]
#[command(name = "scorectl")]
#[command(about = "Headless control client for the live scoreboard server", long_about = None)]
struct Args {
    /// Config file (default: .scoreboard/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Full socket URL; wins over host, port and path
    #[arg(long, global = true)]
    url: Option<String>,

    #[arg(long, global = true)]
    host: Option<String>,

    #[arg(long, global = true)]
    port: Option<u16>,

    #[arg(long, global = true)]
    path: Option<String>,

    /// Wire dialect for `watch`: v2 or legacy
    #[arg(long, global = true)]
    protocol: Option<ProtocolVersion>,

    /// Control page URL; supplies scheme, host and socketHost/socketPort
    #[arg(long, global = true, value_name = "URL")]
    page_url: Option<String>,

    /// REST base URL
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Directory for log files (default: per-user data dir)
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print state, connection and broadcast events until Ctrl-C
    Watch,

    /// Send one v2 command, e.g. `send SET_PERIOD --payload '{"period":2}'`
    Send {
        command: String,

        /// JSON payload
        #[arg(long)]
        payload: Option<String>,

        /// How long to wait for the socket to open
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },

    /// Emit one legacy event, e.g. `emit goal --data '{"team":"home"}'`
    Emit {
        event: String,

        /// JSON data
        #[arg(long)]
        data: Option<String>,

        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },

    /// List serial ports via REST
    Ports,

    /// Select the scoreboard serial port via REST
    SetPort { name: String },

    /// Reset the game via REST
    Reset,

    /// Write a default config file
    Init,
}

impl Args {
    /// Fold command-line flags into file settings
    fn apply_overrides(&self, settings: &mut Settings) {
        let connection = &mut settings.connection;
        if let Some(url) = &self.url {
            connection.url = Some(url.clone());
        }
        if let Some(host) = &self.host {
            connection.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            connection.port = Some(port);
        }
        if let Some(path) = &self.path {
            connection.path = Some(path.clone());
        }
        if let Some(protocol) = self.protocol {
            connection.protocol = protocol;
        }
        if let Some(page_url) = &self.page_url {
            connection.page_url = Some(page_url.clone());
        }
        if let Some(api_url) = &self.api_url {
            settings.api.base_url = api_url.clone();
        }
    }
}

fn parse_json(text: Option<String>) -> Result<Option<Value>> {
    Ok(text.map(|t| serde_json::from_str(&t)).transpose()?)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize error handling
    color_eyre::install().map_err(|e| Error::config(e.to_string()))?;

    // Initialize logging (to file, since stdout carries NDJSON)
    let log_file = scoreboard_core::logging::init(args.log_dir.as_deref())?;

    let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config::default_config_path(&base));

    if let Cmd::Init = args.command {
        if config::init_config_file(&config_path)? {
            eprintln!("Wrote {}", config_path.display());
        } else {
            eprintln!("{} already exists", config_path.display());
        }
        eprintln!("Logs: {}", log_file.display());
        return Ok(());
    }

    if args.config.is_some() && !config_path.exists() {
        return Err(Error::ConfigNotFound { path: config_path });
    }

    let mut settings = config::load_settings_from(&config_path);
    args.apply_overrides(&mut settings);
    debug!("Effective settings: {:?}", settings);

    let sink = stdout_sink();
    let api = || HttpGameApi::new(&settings.api.base_url);

    let result = match args.command {
        Cmd::Watch => runner::watch(&settings, TungsteniteConnector, sink, ctrl_c()).await,
        Cmd::Send {
            command,
            payload,
            timeout_ms,
        } => match parse_json(payload) {
            Ok(payload) => {
                runner::send(
                    &settings,
                    TungsteniteConnector,
                    sink,
                    &command,
                    payload,
                    Duration::from_millis(timeout_ms),
                )
                .await
            }
            Err(e) => Err(e),
        },
        Cmd::Emit {
            event,
            data,
            timeout_ms,
        } => match parse_json(data) {
            Ok(data) => {
                runner::emit(
                    &settings,
                    TungsteniteConnector,
                    sink,
                    &event,
                    data,
                    Duration::from_millis(timeout_ms),
                )
                .await
            }
            Err(e) => Err(e),
        },
        Cmd::Ports => runner::ports(&api(), sink).await,
        Cmd::SetPort { name } => runner::set_port(&api(), sink, &name).await,
        Cmd::Reset => runner::reset(&api(), sink).await,
        Cmd::Init => Ok(()),
    };

    if let Err(ref e) = result {
        error!("scorectl failed: {:?}", e);
        HeadlessEvent::error(e.to_string(), e.is_fatal()).emit();
    }

    info!("Scoreboard Control exiting");
    result
}
