//! Service banner at `/`.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Build the root router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index))
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: &'static str,
    pub version: &'static str,
}

async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "form builder",
        version: env!("CARGO_PKG_VERSION"),
    })
}
