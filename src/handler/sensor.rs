use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{api::AppState, sensor::EnvReading};

/// `{"temperature":..,"humidity":..}`, or a bare 500 when the sensor fails.
pub(crate) async fn dht(State(state): State<AppState>) -> Response {
    let sensor = state.sensor.clone();
    // a DHT read bit-bangs for a few milliseconds
    match tokio::task::spawn_blocking(move || EnvReading::read(sensor.as_ref())).await {
        Ok(Some(reading)) => Json(reading).into_response(),
        Ok(None) => {
            log::warn!("sensor read failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            log::error!("sensor task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
