use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livehub::config::ConfigStore;
use livehub::registry::ConnectionRegistry;
use livehub::state::AppState;
use livehub::transcribe::TranscriptionBridge;
use livehub::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Livehub command line arguments
#[derive(Parser, Debug)]
#[command(name = "livehub")]
#[command(version, about = "Signaling and live-session relay hub", long_about = None)]
struct CliArgs {
    /// Listen address (overrides config file)
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// HTTP port (overrides config file)
    #[arg(short = 'p', long, value_name = "PORT")]
    http_port: Option<u16>,

    /// Configuration file path (default: /etc/livehub/livehub.toml)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting livehub v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.unwrap_or_else(get_config_path);
    tracing::info!("Configuration file: {}", config_path.display());

    let config_store = ConfigStore::new(&config_path).await?;
    let mut config = (*config_store.get()).clone();

    // CLI argument overrides (not persisted)
    if let Some(addr) = args.address {
        config.web.bind_address = addr;
    }
    if let Some(port) = args.http_port {
        config.web.http_port = port;
    }

    let transcriber = if config.transcribe.enabled {
        if config.transcribe.resolved_api_key().is_none() {
            tracing::warn!(
                "Transcription enabled without an API key, requests may be rejected upstream"
            );
        }
        tokio::fs::create_dir_all(config.transcribe.spool_dir_path()).await?;
        tracing::info!(
            endpoint = %config.transcribe.endpoint,
            model = %config.transcribe.model,
            "Transcription bridge enabled"
        );
        Some(Arc::new(TranscriptionBridge::from_config(
            &config.transcribe,
        )))
    } else {
        tracing::info!("Transcription bridge disabled, audio chunks will be dropped");
        None
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let registry = Arc::new(ConnectionRegistry::new());
    let state = AppState::new(
        config_store,
        registry,
        transcriber,
        shutdown_tx.clone(),
    );

    let app = web::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.web.bind_address, config.web.http_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .unwrap_or_else(|e| tracing::error!("Failed to listen for shutdown signal: {}", e));
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "livehub=error,tower_http=error",
        LogLevel::Warn => "livehub=warn,tower_http=warn",
        LogLevel::Info => "livehub=info,tower_http=info",
        LogLevel::Verbose => "livehub=debug,tower_http=info",
        LogLevel::Debug => "livehub=debug,tower_http=debug",
        LogLevel::Trace => "livehub=trace,tower_http=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Configuration file location, overridable via environment
fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("LIVEHUB_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("/etc/livehub/livehub.toml")
}
