use anyhow::Result;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use trendwatch_notify::plugin::ChannelRegistry;
use trendwatch_server::config::ServerConfig;
use trendwatch_server::scheduler::TrendScheduler;
use trendwatch_server::state::{AppState, PollStatus};
use trendwatch_server::{app, builder};

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  trendwatch-server [config.toml]            Run the poller and HTTP API");
    eprintln!("  trendwatch-server run-once [config.toml]   Run a single poll cycle and print the report");
    eprintln!("  trendwatch-server --help                   Show this help");
    eprintln!();
    eprintln!(
        "Without a config path, {} is used if it exists.",
        trendwatch_server::config::DEFAULT_CONFIG_PATH
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trendwatch=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        Some("run-once") => {
            let config = load_config(args.get(2).map(String::as_str))?;
            run_once(config).await
        }
        other => {
            let config = load_config(other)?;
            run_server(config).await
        }
    }
}

/// Load, apply environment overrides and validate. Errors are fatal.
fn load_config(path: Option<&str>) -> Result<(ServerConfig, ChannelRegistry)> {
    let mut config = ServerConfig::resolve(path)?;
    config.apply_env_overrides()?;
    let registry = ChannelRegistry::with_builtin(config.notify.delivery_options());
    config.validate(&registry)?;
    Ok((config, registry))
}

struct Components {
    state: AppState,
    scheduler: TrendScheduler,
}

fn build_components(config: ServerConfig, registry: &ChannelRegistry) -> Result<Components> {
    let source = builder::build_source(&config)?;
    let (notifier, channels) = builder::build_notifier(&config, registry)?;
    let engine = Arc::new(Mutex::new(builder::build_engine(&config)));
    let notifier = Arc::new(notifier);
    let poll_status = Arc::new(Mutex::new(PollStatus::default()));

    let scheduler = TrendScheduler::new(
        source.clone(),
        engine.clone(),
        notifier.clone(),
        poll_status.clone(),
        builder::poll_settings(&config),
    );

    let state = AppState {
        engine,
        source,
        notifier,
        poll_status,
        channels: Arc::new(channels),
        config: Arc::new(config),
        start_time: Utc::now(),
    };

    Ok(Components { state, scheduler })
}

#[allow(clippy::print_stdout)]
async fn run_once((config, registry): (ServerConfig, ChannelRegistry)) -> Result<()> {
    let components = build_components(config, &registry)?;
    let report = components.scheduler.run_cycle().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_server((config, registry): (ServerConfig, ChannelRegistry)) -> Result<()> {
    let http_port = config.http_port;
    let Components { state, scheduler } = build_components(config, &registry)?;

    let scheduler_handle = tokio::spawn(async move {
        scheduler.run().await;
    });

    let http_addr: SocketAddr = format!("0.0.0.0:{http_port}").parse()?;
    let app = app::build_http_app(state.clone());
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;

    tracing::info!(
        http = %http_addr,
        region = %state.config.region,
        source = state.source.name(),
        "Server started"
    );

    if let Err(e) = axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await
    {
        tracing::error!(error = %e, "HTTP server error");
    }

    scheduler_handle.abort();
    tracing::info!("Server stopped");
    Ok(())
}
