use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wx_server::adds::{AddsClient, MockWeatherSource, WeatherSource};
use wx_server::config::Settings;
use wx_server::engine::{Engine, EngineHandle};
use wx_server::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wx_server=info")),
        )
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    if !settings.inputs.consent {
        warn!("WX_ACCEPT_TERMS not set. No weather will be fetched until terms are accepted.");
    }

    // Serve canned data if a mock directory is given
    let handle = match &settings.mock_dir {
        Some(dir) => {
            let source = MockWeatherSource::from_dir(dir).expect("Failed to load mock data");
            info!(dir = %dir.display(), "using mock weather data");
            start_engine(source, &settings)
        }
        None => {
            let client =
                AddsClient::new(settings.adds.clone()).expect("Failed to create ADDS client");
            info!(base_url = client.base_url(), "using ADDS data server");
            start_engine(client, &settings)
        }
    };

    let state = AppState::new(handle.clone());
    let app = create_router(state);

    let addr = settings.server.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    info!(%addr, "weather server listening");
    info!("API Endpoints:");
    info!("  GET  /health          - Health check");
    info!("  GET  /stations        - Stations, nearest first");
    info!("  GET  /stations/:code  - One station");
    info!("  GET  /qnh             - Nearest pressure setting");
    info!("  GET  /status          - Update status");
    info!("  POST /refresh         - Update now");
    info!("  PUT  /position        - Set position");
    info!("  PUT  /route           - Set route");
    info!("  PUT  /consent         - Accept data provider terms");
    info!("  POST /save            - Save registry snapshot");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
    }

    match handle.save().await {
        Ok(Some(saved)) => info!(saved, "registry saved"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "failed to save registry"),
    }
}

fn start_engine<S: WeatherSource>(source: S, settings: &Settings) -> EngineHandle {
    let engine = Engine::new(
        Arc::new(source),
        settings.engine.clone(),
        settings.inputs.clone(),
    );
    let (handle, _task) = engine.spawn();
    handle
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
