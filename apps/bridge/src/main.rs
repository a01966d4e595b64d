use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nowplaying_bridge::{BridgeConfig, ChannelServer};
use nowplaying_core::MethodCall;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Now-playing media session bridge")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the listener component (`package/class`)
    #[arg(long, global = true)]
    listener: Option<String>,

    /// Override the per-call timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Serve the JSON-lines method channel over stdin/stdout
    Serve,
    /// Issue a single method call and print the response
    Call {
        /// Method name, e.g. getStatus or playPause
        method: String,
    },
    /// Print the effective configuration
    Config,
}

fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => BridgeConfig::default_path()?,
    };
    let mut config = BridgeConfig::load(&path)?;

    if let Some(listener) = &cli.listener {
        config.listener_component = listener.clone();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.call_timeout_ms = timeout_ms;
    }
    config.validate()?;
    Ok(config)
}

/// Logs go to stderr; stdout carries the channel.
fn init_logging(config: &BridgeConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "nowplaying-bridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if let Some(Cmd::Config) = cli.cmd {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let _guard = init_logging(&config)?;

    let listener = config.listener()?;
    tracing::info!("Starting now-playing bridge for {}", listener);

    let bridge = nowplaying_media_session::create_backend(&listener).into_bridge(listener);
    let server = ChannelServer::new(Arc::new(bridge), config.call_timeout());

    match cli.cmd {
        Some(Cmd::Call { method }) => {
            let response = server.handle_call(MethodCall::new(method)).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Some(Cmd::Serve) | None => {
            server
                .serve(tokio::io::stdin(), tokio::io::stdout())
                .await?;
        }
        Some(Cmd::Config) => {}
    }

    Ok(())
}
