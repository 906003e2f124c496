use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use axum::{
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

use crate::{api::AppState, config::DEFAULT_DOCUMENT, handler::ApiResult};

/// Maps a request path onto the web root. `/` is the default document.
///
/// Returns `None` for paths that would leave the root.
pub(crate) fn resolve_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    let relative = if relative.is_empty() {
        DEFAULT_DOCUMENT
    } else {
        relative
    };

    let mut path = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

pub(crate) fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        _ => "text/plain",
    }
}

pub(crate) async fn serve_file(State(state): State<AppState>, uri: Uri) -> ApiResult<Response> {
    let Some(path) = resolve_path(&state.web_root, uri.path()) else {
        log::warn!("rejected path outside web root: {}", uri.path());
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Ok(StatusCode::NOT_FOUND.into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("{} not found", path.display());
            return Ok(StatusCode::NOT_FOUND.into_response());
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("stat {}", path.display()))
                .into());
        }
    }

    let body = tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], body).into_response())
}
