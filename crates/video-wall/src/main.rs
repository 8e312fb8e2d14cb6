use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use video_wall::{api, AppState, WallConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = telemetry::init_with_service("video-wall");

    let config = WallConfig::from_env()?;
    let bind_addr = config.bind_addr;
    info!(
        directory = %config.camera_directory_url,
        transport = ?config.transport,
        layout = %config.default_layout,
        quality = %config.default_quality,
        "starting video-wall"
    );

    let state = AppState::new(config).await?;
    let poller = state.spawn_poller();

    let app = api::router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "video-wall listening");
    info!("WebSocket available at ws://{}/ws", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
