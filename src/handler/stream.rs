use std::{convert::Infallible, net::SocketAddr};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    api::{AppState, Camera},
    media::{chunk::ChannelChunkWriter, session::StreamSession},
};

/// `GET /stream`: MJPEG over `multipart/x-mixed-replace` until the client goes away.
///
/// Only one session owns the camera at a time; concurrent requests get 503.
pub(crate) async fn stream(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    let camera = match state.camera.clone().try_lock_owned() {
        Ok(camera) => camera,
        Err(_) => {
            log::warn!("stream {}: rejected, camera is busy", peer);
            return (StatusCode::SERVICE_UNAVAILABLE, "stream busy").into_response();
        }
    };

    let (mut writer, head_rx, body_rx) = ChannelChunkWriter::new();
    let mut session = StreamSession::new(peer.to_string(), state.cancel.child_token());
    tokio::task::spawn_blocking(move || {
        let mut camera = camera;
        let Camera { source, encoder } = &mut *camera;
        // the session logs its own outcome; dropping the writer ends the body
        let _ = session.run(source.as_mut(), encoder.as_mut(), &mut writer);
    });

    let head = match head_rx.await {
        Ok(head) => head,
        Err(_) => {
            log::error!("stream {}: session ended before sending a response head", peer);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(content_type) = head.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    for (name, value) in head.headers {
        builder = builder.header(name, value);
    }
    let body = Body::from_stream(ReceiverStream::new(body_rx).map(Ok::<_, Infallible>));
    builder.body(body).unwrap_or_else(|e| {
        log::error!("stream {}: invalid response head: {}", peer, e);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}
