use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use camera_bus::{Encoder, FrameSource};
use tokio::{net::TcpListener, sync::Mutex};
use tokio_util::sync::CancellationToken;

use crate::{handler, sensor::EnvSensor};

/// The camera and its encoder, owned by at most one stream session at a time.
pub(crate) struct Camera {
    pub source: Box<dyn FrameSource>,
    pub encoder: Box<dyn Encoder>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub camera: Arc<Mutex<Camera>>,
    pub sensor: Arc<dyn EnvSensor>,
    pub web_root: Arc<PathBuf>,
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(
        source: Box<dyn FrameSource>,
        encoder: Box<dyn Encoder>,
        sensor: Arc<dyn EnvSensor>,
        web_root: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            camera: Arc::new(Mutex::new(Camera { source, encoder })),
            sensor,
            web_root: Arc::new(web_root),
            cancel,
        }
    }
}

pub(crate) fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/stream", get(handler::stream::stream))
        .route("/dht", get(handler::sensor::dht))
        .fallback(get(handler::files::serve_file))
        .with_state(state)
}

pub(crate) async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let cancel = state.cancel.clone();
    let app = app_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
}

pub(crate) fn start_api_server(state: AppState, port: u16) {
    tokio::spawn(async move {
        let listener = match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => listener,
            Err(e) => {
                log::error!("Error binding port {}: {}", port, e);
                state.cancel.cancel();
                return;
            }
        };
        log::info!("Stream server started on port {}", port);
        if let Err(e) = serve(listener, state).await {
            log::error!("Error running stream server: {}", e);
        }
    });
}

async fn shutdown_signal(cancel: CancellationToken) {
    cancel.cancelled().await;
    log::info!("Shutting down stream server...");
}

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;
