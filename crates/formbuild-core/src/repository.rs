//! On-disk form repository.
//!
//! Layout under the data directory:
//!
//! ```text
//! <root>/<FormID>/form.json         pretty JSON, two-space indent
//! <root>/<FormID>/form_answer.csv   owned by the answer recorder
//! ```
//!
//! Forms are written once and never updated. Reads always go to disk; no
//! copy is kept in memory between requests.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::RepositoryError;
use crate::form::{Form, FormId, FormIdGenerator};

/// File name of the stored schema inside a form directory.
pub const FORM_FILE: &str = "form.json";

/// How many fresh identifiers `create` draws before giving up on collisions.
const MAX_CREATE_ATTEMPTS: u32 = 16;

/// Creates and reads stored forms below a root directory.
#[derive(Debug)]
pub struct FormRepository {
    root: PathBuf,
    ids: FormIdGenerator,
}

impl FormRepository {
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ids: FormIdGenerator::new(),
        }
    }

    /// Directory holding everything stored for `id`.
    #[must_use]
    pub fn form_dir(&self, id: &FormId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Path of the stored schema for `id`.
    #[must_use]
    pub fn form_path(&self, id: &FormId) -> PathBuf {
        self.form_dir(id).join(FORM_FILE)
    }

    /// Persist a validated form under a freshly generated identifier.
    ///
    /// The form directory is created exclusively, so an identifier already
    /// present on disk (for example from a previous process) is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Io`] if the directory or file cannot be
    /// written, [`RepositoryError::IdExhausted`] if every drawn identifier
    /// already existed.
    pub async fn create(&self, form: &Form) -> Result<FormId, RepositoryError> {
        let mut body =
            serde_json::to_vec_pretty(form).map_err(RepositoryError::Serialization)?;
        body.push(b'\n');

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| RepositoryError::Io {
                path: self.root.clone(),
                source,
            })?;

        let id = self.allocate_dir().await?;
        let path = self.form_path(&id);

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| RepositoryError::Io {
                path: path.clone(),
                source,
            })?;
        file.write_all(&body)
            .await
            .map_err(|source| RepositoryError::Io {
                path: path.clone(),
                source,
            })?;
        file.flush().await.map_err(|source| RepositoryError::Io {
            path: path.clone(),
            source,
        })?;

        info!(form_id = %id, fields = form.fields.len(), "form saved");
        Ok(id)
    }

    async fn allocate_dir(&self) -> Result<FormId, RepositoryError> {
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let id = self.ids.next_id();
            let dir = self.form_dir(&id);
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => return Ok(id),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(form_id = %id, "form directory already exists, drawing next id");
                }
                Err(source) => return Err(RepositoryError::Io { path: dir, source }),
            }
        }
        Err(RepositoryError::IdExhausted {
            attempts: MAX_CREATE_ATTEMPTS,
        })
    }

    /// Load the stored schema for `raw_id` as generic JSON.
    ///
    /// The content is not re-validated; whatever was written is returned.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidId`] for a blank or unsafe
    /// identifier (checked before any filesystem access),
    /// [`RepositoryError::NotFound`] if no form was stored under it, and
    /// [`RepositoryError::Io`] / [`RepositoryError::Corrupt`] for read and
    /// parse failures.
    pub async fn read(&self, raw_id: &str) -> Result<serde_json::Value, RepositoryError> {
        let id = FormId::parse(raw_id)?;
        let path = self.form_path(&id);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RepositoryError::NotFound {
                    id: id.to_string(),
                });
            }
            Err(source) => return Err(RepositoryError::Io { path, source }),
        };

        serde_json::from_slice(&bytes).map_err(|source| RepositoryError::Corrupt { path, source })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::FormIdError;
    use crate::form::{Field, FieldType};

    fn sample_form() -> Form {
        Form {
            title: "Feedback".to_owned(),
            fields: vec![
                Field {
                    label: "Name".to_owned(),
                    field_type: FieldType::Text,
                    name: "name".to_owned(),
                    placeholder: "Jane".to_owned(),
                },
                Field {
                    label: "Comments".to_owned(),
                    field_type: FieldType::Textarea,
                    name: "comments".to_owned(),
                    placeholder: String::new(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FormRepository::new(dir.path());
        let form = sample_form();

        let id = repo.create(&form).await.unwrap();
        let stored = repo.read(id.as_str()).await.unwrap();

        assert_eq!(stored, serde_json::to_value(&form).unwrap());
        let typed: Form = serde_json::from_value(stored).unwrap();
        assert_eq!(typed, form);
    }

    #[tokio::test]
    async fn create_writes_pretty_json_with_two_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FormRepository::new(dir.path());

        let id = repo.create(&sample_form()).await.unwrap();
        let text = std::fs::read_to_string(dir.path().join(id.as_str()).join(FORM_FILE)).unwrap();

        assert!(text.starts_with("{\n  \"title\": \"Feedback\",\n  \"fields\": [\n    {"));
    }

    #[tokio::test]
    async fn create_uses_a_timestamp_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FormRepository::new(dir.path());
        let before = chrono::Utc::now().timestamp_millis();

        let id = repo.create(&sample_form()).await.unwrap();
        let millis: i64 = id.as_str().parse().unwrap();

        assert!(millis >= before);
    }

    #[tokio::test]
    async fn rapid_creates_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FormRepository::new(dir.path());
        let form = sample_form();

        let mut ids = Vec::new();
        for _ in 0..20 {
            ids.push(repo.create(&form).await.unwrap());
        }
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[tokio::test]
    async fn create_skips_directories_left_by_an_earlier_process() {
        let dir = tempfile::tempdir().unwrap();
        let now = chrono::Utc::now().timestamp_millis();
        for offset in 0..4 {
            std::fs::create_dir_all(dir.path().join((now + offset).to_string())).unwrap();
        }
        let repo = FormRepository::new(dir.path());

        let id = repo.create(&sample_form()).await.unwrap();

        assert!(repo.form_path(&id).exists());
    }

    #[tokio::test]
    async fn read_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FormRepository::new(dir.path());

        let err = repo.read("1234567890").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { ref id } if id == "1234567890"));
    }

    #[tokio::test]
    async fn read_blank_id_is_rejected_before_touching_disk() {
        let repo = FormRepository::new("/nonexistent/root/for/test");

        let err = repo.read("  ").await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidId(FormIdError::Missing)));
    }

    #[tokio::test]
    async fn read_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FormRepository::new(dir.path());
        let id = repo.create(&sample_form()).await.unwrap();

        let first = repo.read(id.as_str()).await.unwrap();
        let second = repo.read(id.as_str()).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn read_corrupt_file_reports_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("42")).unwrap();
        std::fs::write(dir.path().join("42").join(FORM_FILE), b"{not json").unwrap();
        let repo = FormRepository::new(dir.path());

        let err = repo.read("42").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Corrupt { .. }));
    }
}
