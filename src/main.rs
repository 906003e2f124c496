use std::sync::Arc;

use camera_bus::JpegEncoder;
use tokio_util::sync::CancellationToken;

mod api;
mod config;
mod handler;
mod media;
mod sensor;

fn init_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("camera_bus", log::LevelFilter::Info)
        .filter_module("hyper", log::LevelFilter::Warn)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> ! {
    init_logging();
    let config = config::config();

    let source = config.source().open().unwrap_or_else(|e| {
        log::error!("Error opening camera '{}': {}", config.source(), e);
        std::process::exit(1);
    });
    let encoder = JpegEncoder::new(config.jpeg_quality());
    let sensor = config.sensor().open();
    log::info!(
        "camera {}, jpeg quality {}, sensor {}, web root {}",
        config.source(),
        encoder.quality(),
        config.sensor(),
        config.web_root().display()
    );

    let cancel = CancellationToken::new();
    let state = api::AppState::new(
        source,
        Box::new(encoder),
        Arc::from(sensor),
        config.web_root().clone(),
        cancel.clone(),
    );
    api::start_api_server(state, config.port());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
            },
        }
    }

    std::process::exit(0);
}
