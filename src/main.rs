use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::broadcast::error::RecvError};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use traffic_logger::{
    app::create_app,
    config::{watcher::ConfigWatcher, AppConfig},
    middleware::{TracingSink, TrafficLogging},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;

    let config_path = AppConfig::config_path();
    let config = AppConfig::load()?;
    info!(mode = ?config.logging.mode, "Configuration loaded");

    init_metrics(&config)?;

    let traffic = TrafficLogging::from_config(&config.logging, Arc::new(TracingSink))?;
    spawn_reload_task(&config_path, traffic.clone());

    let state = AppState {
        config: Arc::new(config.clone()),
    };
    let app = create_app(state, &traffic);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Traffic logger demo listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Keeps the ignore lists in step with the configuration file.
fn spawn_reload_task(config_path: &str, traffic: TrafficLogging) {
    let watcher = match ConfigWatcher::new(config_path) {
        Ok(watcher) => watcher,
        Err(e) => {
            warn!("Configuration hot-reload disabled: {}", e);
            return;
        }
    };

    tokio::spawn(async move {
        let mut reload_rx = watcher.subscribe_to_reloads();
        loop {
            match reload_rx.recv().await {
                Ok(new_config) => match traffic.reload(&new_config.logging) {
                    Ok(()) => info!(
                        ignore_routes = new_config.logging.ignore_routes.len(),
                        "Ignore routes reloaded"
                    ),
                    Err(e) => error!("Keeping previous ignore routes: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed configuration reloads");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn init_tracing() -> Result<()> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(filter);

    match log_format.as_str() {
        "json" => subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        _ => subscriber.with(tracing_subscriber::fmt::layer()).try_init()?,
    }

    Ok(())
}

fn init_metrics(config: &AppConfig) -> Result<()> {
    if config.metrics.enabled {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()?;

        info!("Metrics exporter initialized on port {}", config.metrics.port);
    }

    Ok(())
}
