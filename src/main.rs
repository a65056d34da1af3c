use clap::Parser;
use ollama_bridge::config::config_search_paths;
use ollama_bridge::{build_router, AppState, BridgeConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "ollama-bridge",
    about = "Ollama-compatible API in front of an OpenAI-style completions server",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Target completions URL (overrides config)
    #[arg(long)]
    target_url: Option<String>,

    /// Target timeout in seconds (overrides config)
    #[arg(long)]
    timeout: Option<u64>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ollama_bridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = BridgeConfig::find_and_load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(url) = cli.target_url {
        config.target.url = url;
    }
    if let Some(timeout) = cli.timeout {
        config.target.timeout_secs = timeout;
    }

    config.validate()?;

    info!("ollama-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("  Target:    {}", config.target.url);
    info!("  Timeout:   {}s", config.target.timeout_secs);
    info!(
        "  Defaults:  temperature={} max_tokens={}",
        config.defaults.temperature, config.defaults.max_tokens
    );
    info!("  Models:    {} mapped", config.models.len());

    let port = config.port;
    let state = Arc::new(AppState::new(config)?);

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  Point Ollama clients at OLLAMA_HOST=http://localhost:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
