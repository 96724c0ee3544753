//! Error types for `formbuild-core`.
//!
//! Each component has its own error enum. Variants carry enough context
//! (paths, identifiers, the failing rule) to diagnose the problem from a log
//! line. Filesystem error details are for logs only; the server never
//! forwards them to clients.

use std::fmt;
use std::path::PathBuf;

/// A single broken validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted location of the offending value, e.g. `fields[1].name`.
    pub location: String,
    /// Human-readable description of the rule that failed.
    pub rule: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.location, self.rule)
    }
}

/// A form schema failed structural validation.
///
/// All violations are collected; none of the form is accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", join_violations(.violations))]
pub struct ValidationError {
    /// Every rule the submitted form broke, in document order.
    pub violations: Vec<Violation>,
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from the client-key access check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// The `x-client-key` header was absent or empty.
    #[error("x-client-key header is required")]
    MissingKey,

    /// The header was present but matched no configured key.
    #[error("key is not found")]
    UnknownKey,
}

/// A form identifier could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormIdError {
    /// Empty or whitespace-only identifier.
    #[error("Missing mandatory parameter")]
    Missing,

    /// Identifier contains characters that are not safe as a directory name.
    #[error("invalid form identifier '{id}'")]
    Invalid { id: String },
}

/// Errors from the on-disk form repository.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The identifier was rejected before touching the filesystem.
    #[error(transparent)]
    InvalidId(#[from] FormIdError),

    /// No stored form exists for this identifier.
    #[error("form '{id}' not found or no longer exists")]
    NotFound { id: String },

    /// Could not allocate a fresh directory after repeated collisions.
    #[error("could not allocate a unique form identifier after {attempts} attempts")]
    IdExhausted { attempts: u32 },

    /// Directory creation, file write, or file read failed.
    #[error("form storage I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The form could not be encoded as JSON.
    #[error("failed to encode form: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A stored `form.json` is not valid JSON.
    #[error("stored form at '{}' is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from turning a stored form into an HTML document.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The template file could not be read.
    #[error("failed to load template '{}': {source}", path.display())]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template references a placeholder the renderer does not supply.
    #[error("template references unknown placeholder '{name}'")]
    UnknownPlaceholder { name: String },

    /// A `{{` opened a placeholder that was never closed.
    #[error("unterminated placeholder at byte offset {offset}")]
    UnterminatedPlaceholder { offset: usize },

    /// The form payload could not be encoded for embedding.
    #[error("failed to encode form payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors from appending an answer to a form's CSV file.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// The identifier was rejected before touching the filesystem.
    #[error(transparent)]
    InvalidId(#[from] FormIdError),

    /// Nothing remained to record once reserved keys were stripped.
    #[error("submission contains no answers")]
    EmptyAnswer,

    /// Directory creation, open, stat, or write failed.
    #[error("answer storage I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding of a row failed.
    #[error("failed to encode CSV row: {0}")]
    Csv(#[from] csv::Error),

    /// The background write panicked or was aborted by runtime shutdown.
    #[error("answer write task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}
