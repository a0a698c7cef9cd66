use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use feed::{FetchError, RewriteError, UrlError};
use serde::Serialize;
use thiserror::Error;

use crate::services::{AuthError, RelayError};

const AUTH_CHALLENGE: &str = "Basic realm=\"podcast-proxy\"";

/// Application error type returned by handlers
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid request parameter
    #[error("{0}")]
    BadRequest(String),

    /// Missing or wrong credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Upstream could not be reached or kept failing
    #[error("Upstream error: {0}")]
    BadGateway(String),

    /// Upstream content could not be processed
    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), Some(msg.clone()))
            }
            AppError::BadGateway(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Upstream error".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Processing(msg) => {
                tracing::error!("Processing error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to process feed".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                    Some(msg.clone()),
                )
            }
        };

        let body = ErrorResponse {
            error: error_message,
            details,
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(AUTH_CHALLENGE));
        }
        response
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<UrlError> for AppError {
    fn from(e: UrlError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::InvalidUrl(e) => e.into(),
            FetchError::Build(_) | FetchError::Body { .. } => AppError::Internal(e.to_string()),
            FetchError::Transport { .. } | FetchError::Status { .. } => {
                AppError::BadGateway(e.to_string())
            }
        }
    }
}

impl From<RewriteError> for AppError {
    fn from(e: RewriteError) -> Self {
        AppError::Processing(e.to_string())
    }
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::InvalidUrl(e) => e.into(),
            RelayError::Build(_) => AppError::Internal(e.to_string()),
            RelayError::Upstream { .. } => AppError::BadGateway(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Unauthorized(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::bad_request("x"), StatusCode::BAD_REQUEST),
            (AuthError::Missing.into(), StatusCode::UNAUTHORIZED),
            (AppError::BadGateway("x".into()), StatusCode::BAD_GATEWAY),
            (
                RewriteError::NoRootElement.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (
                FetchError::Status {
                    url: "http://example.com".into(),
                    status: 503,
                    attempts: 5,
                }
                .into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                FetchError::InvalidUrl(UrlError::MissingHost).into(),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_unauthorized_sets_challenge() {
        let response = AppError::from(AuthError::InvalidToken).into_response();
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            AUTH_CHALLENGE
        );
    }
}
