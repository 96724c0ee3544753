//! Shared application state.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. Nothing in it is replaced after construction;
//! the only interior mutability is the answer recorder's per-form locks.

use formbuild_core::{
    AccessGate, AnswerRecorder, FormRenderer, FormRepository, KeyStore, TemplateSource,
};

use crate::config::ServerConfig;

/// Shared application state passed to all HTTP handlers.
#[derive(Debug)]
pub struct AppState {
    /// Client-key check for gated routes.
    pub gate: AccessGate,
    /// Stored form schemas.
    pub repository: FormRepository,
    /// Per-form CSV answer logs.
    pub recorder: AnswerRecorder,
    /// HTML rendering of stored forms.
    pub renderer: FormRenderer,
    /// Public base URL for submission links, without a trailing `/`.
    pub domain: String,
}

impl AppState {
    /// Build the state described by `config`.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        let template = config
            .template_path
            .clone()
            .map_or(TemplateSource::Builtin, TemplateSource::File);

        Self {
            gate: AccessGate::new(KeyStore::new(config.client_keys.iter().cloned())),
            repository: FormRepository::new(&config.data_dir),
            recorder: AnswerRecorder::new(&config.data_dir),
            renderer: FormRenderer::new(template),
            domain: config.domain.clone(),
        }
    }
}
