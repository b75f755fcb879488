use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use moments_types::api::ErrorBody;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("email address is not allowed")]
    UnauthorizedIdentity,

    #[error("email or password incorrect")]
    AuthenticationFailed,

    #[error("missing or invalid token")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    Conflict,

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::UnauthorizedIdentity => StatusCode::FORBIDDEN,
            ApiError::AuthenticationFailed | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
