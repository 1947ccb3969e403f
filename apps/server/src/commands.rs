//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use studyaid_shared::{AppConfig, init_config, load_config, load_config_from};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// StudyAid: study aids generated from your own material.
#[derive(Parser)]
#[command(
    name = "studyaid",
    version,
    about = "Serve the StudyAid API: uploads, summaries, quizzes and key concepts.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.studyaid/studyaid.toml).
    #[arg(long, global = true, env = "STUDYAID_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP API.
    Serve {
        /// Interface to bind (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Database file (overrides config).
        #[arg(long)]
        db: Option<String>,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. `RUST_LOG` wins when set.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "studyaid=info,tower_http=info",
        1 => "studyaid=debug,tower_http=debug",
        _ => "studyaid=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { host, port, db } => {
            let mut config = resolve_config(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(db) = db {
                config.database.path = db;
            }
            cmd_serve(config).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&std::path::Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn cmd_serve(config: AppConfig) -> Result<()> {
    let address = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::from_config(config)
        .await
        .wrap_err("failed to initialize server state")?;

    let resumed = state.enricher.resume_interrupted().await?;
    if resumed > 0 {
        info!(resumed, "re-enriching materials interrupted by the last shutdown");
    }

    let app = build_router(state);
    let listener = TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("cannot bind {address}"))?;
    info!(%address, "StudyAid API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&std::path::Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
