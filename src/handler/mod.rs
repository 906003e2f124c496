use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub mod files;
pub mod sensor;
pub mod stream;

pub type ApiResult<T> = Result<T, ApiError>;

/// Any failure that should surface as a bare 500.
pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log::error!("ApiError: {:#}", self.0);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
