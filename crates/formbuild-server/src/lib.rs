//! Form builder HTTP server.
//!
//! Wires the core library into an Axum router: a gated endpoint that stores
//! form schemas, an open endpoint that renders them as HTML, and an open
//! endpoint that records submitted answers as CSV.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
