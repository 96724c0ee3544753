//! Append-only CSV recording of submitted answers.
//!
//! Each form has one `form_answer.csv`. The first row written becomes the
//! header: the answer's keys in lexicographic order. Every later row lists
//! values in that same key order. Rows are not checked against the header;
//! a submission with a different key set produces a misaligned row.
//!
//! # Concurrency
//!
//! Writers for the same form are serialized by a per-form async mutex that is
//! held from "is the file empty?" through the final flush, so two concurrent
//! first submissions cannot both write a header. Different forms never
//! contend.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::RecorderError;
use crate::form::FormId;

/// File name of the answer log inside a form directory.
pub const ANSWER_FILE: &str = "form_answer.csv";

/// Body key naming the form an answer belongs to.
pub const FORM_ID_KEY: &str = "formID";
/// Body key carrying the rendered pseudo-token. Accepted and discarded.
pub const TOKEN_KEY: &str = "clientXToken";
/// Body key carrying the page to return to after submitting.
pub const REFERRER_KEY: &str = "referrer";

/// A submitted answer with the reserved keys split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub form_id: FormId,
    pub referrer: String,
    /// Remaining field values, ordered by field name.
    pub answers: BTreeMap<String, String>,
}

impl Submission {
    /// Split a raw form-encoded body into identifier, referrer, and answers.
    ///
    /// `clientXToken` is dropped without inspection.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::InvalidId`] when `formID` is missing, blank,
    /// or unsafe, and [`RecorderError::EmptyAnswer`] when no answer fields
    /// remain after the reserved keys are removed.
    pub fn from_fields(mut fields: HashMap<String, String>) -> Result<Self, RecorderError> {
        let raw_id = fields.remove(FORM_ID_KEY).unwrap_or_default();
        let form_id = FormId::parse(&raw_id)?;
        fields.remove(TOKEN_KEY);
        let referrer = fields.remove(REFERRER_KEY).unwrap_or_default();

        if fields.is_empty() {
            return Err(RecorderError::EmptyAnswer);
        }

        Ok(Self {
            form_id,
            referrer,
            answers: fields.into_iter().collect(),
        })
    }
}

type FormLock = Arc<tokio::sync::Mutex<()>>;
type LockMap = Arc<Mutex<HashMap<FormId, FormLock>>>;

/// A request's claim on one form's lock entry.
///
/// Dropping the lease forgets the entry once no other request holds it.
/// Handles are only cloned or dropped under the map lock, so the count seen
/// in `drop` is exact.
struct LockLease {
    locks: LockMap,
    id: FormId,
    lock: FormLock,
}

impl LockLease {
    fn acquire(locks: &LockMap, id: &FormId) -> Self {
        let lock = {
            let mut map = locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(id.clone()).or_default())
        };
        Self {
            locks: Arc::clone(locks),
            id: id.clone(),
            lock,
        }
    }
}

impl Drop for LockLease {
    fn drop(&mut self) {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(&self.id);
        }
        drop(std::mem::take(&mut self.lock));
    }
}

/// Appends answers to per-form CSV files below a root directory.
#[derive(Debug, Clone)]
pub struct AnswerRecorder {
    root: PathBuf,
    locks: LockMap,
}

impl AnswerRecorder {
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            locks: LockMap::default(),
        }
    }

    /// Path of the answer log for `id`.
    #[must_use]
    pub fn answer_path(&self, id: &FormId) -> PathBuf {
        self.root.join(id.as_str()).join(ANSWER_FILE)
    }

    /// Append one submission, writing the header first if the file is new.
    ///
    /// The form directory is created if it does not exist yet; answers may
    /// arrive for an identifier that was never saved. The write runs on its
    /// own task, so a caller that stops polling cannot leave a half-written
    /// row or a stale lock entry behind.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Io`] on directory, open, stat, or write
    /// failure, [`RecorderError::Csv`] if a row cannot be encoded, and
    /// [`RecorderError::Task`] if the write task did not run to completion.
    pub async fn append(&self, submission: &Submission) -> Result<(), RecorderError> {
        let recorder = self.clone();
        let submission = submission.clone();
        tokio::spawn(async move {
            let lease = LockLease::acquire(&recorder.locks, &submission.form_id);
            let _guard = lease.lock.lock().await;
            recorder.write_locked(&submission).await
        })
        .await?
    }

    async fn write_locked(&self, submission: &Submission) -> Result<(), RecorderError> {
        let path = self.answer_path(&submission.form_id);
        let io_err = |source: std::io::Error| RecorderError::Io {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        let is_new = file.metadata().await.map_err(io_err)?.len() == 0;

        let rows = encode_rows(&submission.answers, is_new)?;
        file.write_all(&rows).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;

        info!(
            form_id = %submission.form_id,
            columns = submission.answers.len(),
            header_written = is_new,
            "answer recorded"
        );
        Ok(())
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Encode the optional header row and the data row.
fn encode_rows(
    answers: &BTreeMap<String, String>,
    with_header: bool,
) -> Result<Vec<u8>, RecorderError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    if with_header {
        writer.write_record(answers.keys())?;
    }
    writer.write_record(answers.values())?;
    writer
        .into_inner()
        .map_err(|e| RecorderError::Csv(e.into_error().into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::FormIdError;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn sample() -> HashMap<String, String> {
        fields(&[
            ("formID", "123"),
            ("clientXToken", "x"),
            ("referrer", "http://x"),
            ("name", "Alice"),
            ("email", "a@b.com"),
        ])
    }

    #[test]
    fn submission_strips_reserved_keys_and_keeps_referrer() {
        let s = Submission::from_fields(sample()).unwrap();
        assert_eq!(s.form_id.as_str(), "123");
        assert_eq!(s.referrer, "http://x");
        let keys: Vec<&str> = s.answers.keys().map(String::as_str).collect();
        assert_eq!(keys, ["email", "name"]);
    }

    #[test]
    fn submission_requires_form_id() {
        let mut f = sample();
        f.remove("formID");
        assert!(matches!(
            Submission::from_fields(f),
            Err(RecorderError::InvalidId(FormIdError::Missing))
        ));

        let mut f = sample();
        f.insert("formID".to_owned(), String::new());
        assert!(matches!(
            Submission::from_fields(f),
            Err(RecorderError::InvalidId(FormIdError::Missing))
        ));
    }

    #[test]
    fn submission_without_answers_is_rejected() {
        let f = fields(&[("formID", "123"), ("referrer", "http://x")]);
        assert!(matches!(
            Submission::from_fields(f),
            Err(RecorderError::EmptyAnswer)
        ));
    }

    #[tokio::test]
    async fn first_append_writes_sorted_header_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = AnswerRecorder::new(dir.path());
        let s = Submission::from_fields(sample()).unwrap();

        recorder.append(&s).await.unwrap();

        let csv = std::fs::read_to_string(recorder.answer_path(&s.form_id)).unwrap();
        assert_eq!(csv, "email,name\na@b.com,Alice\n");
    }

    #[tokio::test]
    async fn second_append_adds_only_a_row() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = AnswerRecorder::new(dir.path());
        let first = Submission::from_fields(sample()).unwrap();
        let second = Submission::from_fields(fields(&[
            ("formID", "123"),
            ("name", "Bob"),
            ("email", "bob@example.com"),
        ]))
        .unwrap();

        recorder.append(&first).await.unwrap();
        recorder.append(&second).await.unwrap();

        let csv = std::fs::read_to_string(recorder.answer_path(&first.form_id)).unwrap();
        assert_eq!(csv, "email,name\na@b.com,Alice\nbob@example.com,Bob\n");
    }

    #[tokio::test]
    async fn values_needing_quotes_are_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = AnswerRecorder::new(dir.path());
        let s = Submission::from_fields(fields(&[
            ("formID", "7"),
            ("comment", "hello, \"world\""),
        ]))
        .unwrap();

        recorder.append(&s).await.unwrap();

        let csv = std::fs::read_to_string(recorder.answer_path(&s.form_id)).unwrap();
        assert_eq!(csv, "comment\n\"hello, \"\"world\"\"\"\n");
    }

    #[tokio::test]
    async fn append_creates_missing_form_directory() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = AnswerRecorder::new(dir.path().join("nested").join("root"));
        let s = Submission::from_fields(sample()).unwrap();

        recorder.append(&s).await.unwrap();

        assert!(recorder.answer_path(&s.form_id).exists());
    }

    #[tokio::test]
    async fn concurrent_first_appends_write_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(AnswerRecorder::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..32 {
            let recorder = Arc::clone(&recorder);
            handles.push(tokio::spawn(async move {
                let s = Submission::from_fields(fields(&[
                    ("formID", "555"),
                    ("n", &i.to_string()),
                ]))
                .unwrap();
                recorder.append(&s).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let id = FormId::parse("555").unwrap();
        let csv = std::fs::read_to_string(recorder.answer_path(&id)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 33);
        assert_eq!(lines.iter().filter(|l| **l == "n").count(), 1);
        assert_eq!(lines[0], "n");
        assert_eq!(recorder.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn abandoned_append_still_writes_and_forgets_its_lock() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = AnswerRecorder::new(dir.path());
        let s = Submission::from_fields(fields(&[("formID", "77"), ("name", "Ann")])).unwrap();

        let held = LockLease::acquire(&recorder.locks, &s.form_id);
        let guard = held.lock.lock().await;

        let waiting = {
            let recorder = recorder.clone();
            let s = s.clone();
            tokio::spawn(async move { recorder.append(&s).await })
        };
        // Map entry, this lease, and the queued write.
        while Arc::strong_count(&held.lock) < 3 {
            tokio::task::yield_now().await;
        }
        waiting.abort();
        assert!(waiting.await.unwrap_err().is_cancelled());

        drop(guard);
        drop(held);

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        while recorder.tracked_locks() != 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(recorder.tracked_locks(), 0);
        let csv = std::fs::read_to_string(recorder.answer_path(&s.form_id)).unwrap();
        assert_eq!(csv, "name\nAnn\n");
    }

    #[test]
    fn dropped_lease_removes_only_the_last_entry() {
        let recorder = AnswerRecorder::new("unused");
        let id = FormId::parse("9").unwrap();

        let first = LockLease::acquire(&recorder.locks, &id);
        let second = LockLease::acquire(&recorder.locks, &id);
        assert_eq!(recorder.tracked_locks(), 1);

        drop(first);
        assert_eq!(recorder.tracked_locks(), 1);
        drop(second);
        assert_eq!(recorder.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn lock_entries_are_dropped_after_use() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = AnswerRecorder::new(dir.path());
        let s = Submission::from_fields(sample()).unwrap();

        recorder.append(&s).await.unwrap();

        assert_eq!(recorder.tracked_locks(), 0);
    }
}
