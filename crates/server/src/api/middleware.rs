use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::services::{AuthError, Credentials};
use crate::state::AppState;

/// Reject requests without valid credentials.
///
/// Only the caller address and credential kind are logged, never the secret.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let outcome = Credentials::from_parts(request.headers(), request.uri().query()).and_then(
        |credentials| {
            let credentials = credentials.ok_or(AuthError::Missing)?;
            state.gate.verify(&credentials)?;
            Ok(credentials.kind())
        },
    );

    match outcome {
        Ok(kind) => {
            tracing::debug!(peer = %peer, kind, path = request.uri().path(), "Request authorized");
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!(peer = %peer, path = request.uri().path(), "Unauthorized request: {}", e);
            Err(e.into())
        }
    }
}
