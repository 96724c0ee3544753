//! HTTP route handlers.
//!
//! - `forms`: save, render, and submit forms under `/api`
//! - `ui`: service banner at `/`

pub mod forms;
pub mod ui;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::middleware as axum_mw;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::client_key_middleware;
use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
///
/// Only the save-form route sits behind the client-key gate; rendering and
/// submitting stay open so published form links work for anyone.
pub fn build_router(state: Arc<AppState>) -> Router {
    let gated_routes = forms::gated_router().route_layer(axum_mw::from_fn_with_state(
        Arc::clone(&state),
        client_key_middleware,
    ));

    Router::new()
        .merge(gated_routes)
        .merge(forms::public_router())
        .merge(ui::router())
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .with_state(state)
}
