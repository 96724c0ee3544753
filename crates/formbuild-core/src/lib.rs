//! Core library for the form builder.
//!
//! Contains the form schema model and validator, the client-key access
//! gate, the on-disk form repository, the HTML form renderer, and the CSV
//! answer recorder. This crate knows nothing about HTTP; the server crate
//! maps its results and errors onto responses.

pub mod error;
pub mod form;
pub mod gate;
pub mod recorder;
pub mod render;
pub mod repository;
pub mod validate;

pub use error::{
    AccessError, FormIdError, RecorderError, RenderError, RepositoryError, ValidationError,
    Violation,
};
pub use form::{Field, FieldDraft, FieldType, Form, FormDraft, FormId, FormIdGenerator};
pub use gate::{AccessGate, CLIENT_KEY_HEADER, KeyStore};
pub use recorder::{AnswerRecorder, Submission};
pub use render::{FormPage, FormRenderer, TemplateSource};
pub use repository::FormRepository;
pub use validate::validate;
