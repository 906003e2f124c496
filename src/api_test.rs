// ============================================================================
// HTTP Surface Tests
// ============================================================================

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use bytes::Bytes;
use camera_bus::{FrameSource, JpegEncoder, PixelFormat, pattern::PatternSource};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::{AppState, serve};
use crate::{
    media::chunk::{STREAM_BOUNDARY, STREAM_CONTENT_TYPE},
    sensor::FixedSensor,
};

const TIMEOUT: Duration = Duration::from_secs(10);

fn pattern(format: PixelFormat) -> Box<dyn FrameSource> {
    Box::new(PatternSource::new(format, 32, 16, 200.0).unwrap())
}

fn state_with(source: Box<dyn FrameSource>, sensor: FixedSensor, web_root: &Path) -> AppState {
    AppState::new(
        source,
        Box::new(JpegEncoder::default()),
        Arc::new(sensor),
        web_root.to_path_buf(),
        CancellationToken::new(),
    )
}

fn idle_sensor() -> FixedSensor {
    FixedSensor {
        temperature: 20.0,
        humidity: 50.0,
    }
}

async fn start(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, state));
    addr
}

/// Complete parts found so far as (declared length, payload).
fn complete_parts(body: &[u8]) -> Vec<(usize, Bytes)> {
    let mut parts = Vec::new();
    let mut rest = body;
    while let Some(after) = rest.strip_prefix(STREAM_BOUNDARY) {
        let Some(header_end) = after.windows(4).position(|w| w == b"\r\n\r\n") else {
            break;
        };
        let header = std::str::from_utf8(&after[..header_end]).unwrap();
        let declared: usize = header
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        let payload_start = header_end + 4;
        let Some(payload) = after.get(payload_start..payload_start + declared) else {
            break;
        };
        parts.push((declared, Bytes::copy_from_slice(payload)));
        rest = &after[payload_start + declared..];
    }
    parts
}

async fn read_parts(resp: &mut reqwest::Response, count: usize) -> Vec<(usize, Bytes)> {
    let mut body = Vec::new();
    tokio::time::timeout(TIMEOUT, async {
        loop {
            let parts = complete_parts(&body);
            if parts.len() >= count {
                return parts;
            }
            let chunk = resp.chunk().await.unwrap().expect("stream ended early");
            body.extend_from_slice(&chunk);
        }
    })
    .await
    .expect("timed out reading parts")
}

/// Waits until no session holds the camera, then reports held frame slots.
async fn outstanding_when_idle(state: &AppState) -> usize {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            if let Ok(camera) = state.camera.try_lock() {
                return camera.source.outstanding();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stream session never released the camera")
}

// ------------------------------------------------------------------------
// /stream
// ------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn test_stream_serves_multipart_jpeg_parts() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(pattern(PixelFormat::Jpeg), idle_sensor(), dir.path());
    let addr = start(state.clone()).await;

    let mut resp = reqwest::get(format!("http://{}/stream", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], STREAM_CONTENT_TYPE);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    assert_eq!(resp.headers()["cache-control"], "no-cache");

    let parts = read_parts(&mut resp, 3).await;
    for (declared, payload) in &parts {
        assert_eq!(payload.len(), *declared);
        assert_eq!(&payload[..2], &[0xff, 0xd8]);
    }

    drop(resp);
    assert_eq!(outstanding_when_idle(&state).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stream_encodes_raw_frames() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(pattern(PixelFormat::Yuyv), idle_sensor(), dir.path());
    let addr = start(state.clone()).await;

    let mut resp = reqwest::get(format!("http://{}/stream", addr)).await.unwrap();
    let parts = read_parts(&mut resp, 2).await;
    assert!(parts.iter().all(|(_, payload)| payload[..2] == [0xff, 0xd8]));

    drop(resp);
    assert_eq!(outstanding_when_idle(&state).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_stream_client_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(pattern(PixelFormat::Jpeg), idle_sensor(), dir.path());
    let addr = start(state.clone()).await;

    let mut first = reqwest::get(format!("http://{}/stream", addr)).await.unwrap();
    read_parts(&mut first, 1).await;

    let second = reqwest::get(format!("http://{}/stream", addr)).await.unwrap();
    assert_eq!(second.status(), 503);

    // the camera is free again once the first client leaves
    drop(first);
    outstanding_when_idle(&state).await;
    let mut third = reqwest::get(format!("http://{}/stream", addr)).await.unwrap();
    assert_eq!(third.status(), 200);
    read_parts(&mut third, 1).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_ends_stream_body() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(pattern(PixelFormat::Jpeg), idle_sensor(), dir.path());
    let addr = start(state.clone()).await;

    let mut resp = reqwest::get(format!("http://{}/stream", addr)).await.unwrap();
    read_parts(&mut resp, 1).await;
    state.cancel.cancel();

    tokio::time::timeout(TIMEOUT, async {
        while let Ok(Some(_)) = resp.chunk().await {}
    })
    .await
    .expect("stream did not end after cancel");
    assert_eq!(outstanding_when_idle(&state).await, 0);
}

// ------------------------------------------------------------------------
// /dht
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_dht_reports_rounded_json() {
    let dir = tempfile::tempdir().unwrap();
    let sensor = FixedSensor {
        temperature: 23.45,
        humidity: 60.0,
    };
    let addr = start(state_with(pattern(PixelFormat::Jpeg), sensor, dir.path())).await;

    let resp = reqwest::get(format!("http://{}/dht", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/json");
    assert_eq!(
        resp.text().await.unwrap(),
        r#"{"temperature":23.5,"humidity":60.0}"#
    );
}

#[tokio::test]
async fn test_dht_nan_is_internal_error() {
    let dir = tempfile::tempdir().unwrap();
    let sensor = FixedSensor {
        temperature: 21.0,
        humidity: f32::NAN,
    };
    let addr = start(state_with(pattern(PixelFormat::Jpeg), sensor, dir.path())).await;

    let resp = reqwest::get(format!("http://{}/dht", addr)).await.unwrap();
    assert_eq!(resp.status(), 500);
    assert!(resp.text().await.unwrap().is_empty());
}

// ------------------------------------------------------------------------
// static files
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_files_served_with_content_types() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>cam</html>").unwrap();
    std::fs::write(dir.path().join("style.css"), "body {}").unwrap();
    std::fs::write(dir.path().join("script.js"), "fetch('/dht');").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    let addr = start(state_with(pattern(PixelFormat::Jpeg), idle_sensor(), dir.path())).await;

    for (path, content_type, body) in [
        ("/", "text/html", "<html>cam</html>"),
        ("/index.html", "text/html", "<html>cam</html>"),
        ("/style.css", "text/css", "body {}"),
        ("/script.js", "application/javascript", "fetch('/dht');"),
        ("/notes.txt", "text/plain", "hello"),
    ] {
        let resp = reqwest::get(format!("http://{}{}", addr, path)).await.unwrap();
        assert_eq!(resp.status(), 200, "{}", path);
        assert_eq!(resp.headers()["content-type"], content_type, "{}", path);
        assert_eq!(resp.text().await.unwrap(), body, "{}", path);
    }
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    let addr = start(state_with(pattern(PixelFormat::Jpeg), idle_sensor(), dir.path())).await;

    for path in ["/", "/missing.css", "/sub", "/../secret"] {
        let resp = reqwest::get(format!("http://{}{}", addr, path)).await.unwrap();
        assert_eq!(resp.status(), 404, "{}", path);
        assert!(resp.text().await.unwrap().is_empty(), "{}", path);
    }
}
