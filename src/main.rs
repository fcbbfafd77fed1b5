use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use launchpad::config::Settings;
use launchpad::server;

#[derive(Parser)]
#[command(name = "launchpad")]
#[command(version, about = "Webhook service that generates, publishes and reports single-page apps")]
pub struct Cli {
    /// Log level filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Also write daily-rolling log files to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook server
    Serve {
        /// Address to bind (overrides the config file)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
        /// Path to a launchpad.toml
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate configuration and print the effective settings
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(level: &str, format: LogFormat, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level '{}'", level))?;

    let console = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "launchpad.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Held until exit so buffered file logs are flushed.
    let _guard = init_tracing(&cli.log_level, cli.log_format, cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Serve { host, port, config } => {
            let settings = Settings::load(config.as_deref())
                .context("Failed to load configuration")?
                .with_overrides(host, port);
            info!("Starting launchpad {}", env!("CARGO_PKG_VERSION"));
            if let Some(source) = &settings.source {
                info!("Config: {}", source.display());
            }
            info!("Listening on {}", settings.server.address());
            server::start_server(settings).await
        }
        Commands::Config { config } => {
            let settings =
                Settings::load(config.as_deref()).context("Failed to load configuration")?;
            print!("{}", settings.redacted_summary());
            Ok(())
        }
    }
}
