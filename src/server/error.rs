// src/server/error.rs

//! Central error responder
//!
//! Every handler error becomes a status code plus a `{"message": ...}` body.

use crate::error::Error;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, error};

#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(Error::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound(_) | Error::BlobNotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) | Error::LoginRequired => StatusCode::BAD_REQUEST,
            Error::InsufficientBalance(_) => StatusCode::PAYMENT_REQUIRED,
            Error::Duplicate(_) => StatusCode::CONFLICT,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::BlobUploadFailed { reason, .. } => {
                StatusCode::from_u16(reason.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected ({}): {}", status, self.0);
        }
        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadFailure;

    #[test]
    fn test_status_mapping() {
        let status = |e: Error| ApiError(e).status();
        assert_eq!(status(Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(Error::BlobNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(Error::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::InsufficientBalance("x".into())), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(status(Error::Duplicate("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status(Error::BlobUploadFailed {
                reason: UploadFailure::RateLimited,
                message: "slow down".into(),
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(status(Error::Parse("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
