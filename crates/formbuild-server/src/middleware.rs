//! Client-key middleware.
//!
//! Reads the `x-client-key` header and checks it against the configured key
//! set. Requests without a recognized key are answered with `403` before the
//! handler (and its body extraction) runs.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use formbuild_core::{AccessError, CLIENT_KEY_HEADER};

use crate::error::AppError;
use crate::state::AppState;

/// Middleware guarding mutating routes with the client-key check.
pub async fn client_key_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let outcome = match req.headers().get(CLIENT_KEY_HEADER) {
        None => state.gate.authorize(None),
        // A key that is not visible ASCII can never match a configured one.
        Some(value) => value
            .to_str()
            .map_err(|_| AccessError::UnknownKey)
            .and_then(|key| state.gate.authorize(Some(key))),
    };

    match outcome {
        Ok(()) => next.run(req).await,
        Err(e) => {
            warn!(path = %req.uri().path(), reason = %e, "client key rejected");
            AppError::from(e).into_response()
        }
    }
}
