//! Form schema model.
//!
//! A [`FormDraft`] is what a client posts: every field is a plain string so
//! that missing or malformed values surface as validation messages instead
//! of opaque decode errors. [`crate::validate::validate`] turns a draft into
//! a [`Form`], whose field types come from the fixed [`FieldType`] set.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FormIdError;

/// The fixed set of input types a field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Textarea,
    Number,
    Date,
    Checkbox,
}

impl FieldType {
    /// Every accepted type, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Text,
        Self::Email,
        Self::Textarea,
        Self::Number,
        Self::Date,
        Self::Checkbox,
    ];

    /// Wire name of the type as it appears in `form.json`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Textarea => "textarea",
            Self::Number => "number",
            Self::Date => "date",
            Self::Checkbox => "checkbox",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.as_str() == s).ok_or(())
    }
}

/// One validated input definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub name: String,
    #[serde(default)]
    pub placeholder: String,
}

/// A validated form schema, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub title: String,
    pub fields: Vec<Field>,
}

/// Unvalidated field as posted by a client.
///
/// Absent and `null` members both decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FieldDraft {
    #[serde(deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub field_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub placeholder: String,
}

/// Unvalidated form as posted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormDraft {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub fields: Vec<FieldDraft>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Identifier of a stored form; also the name of its directory.
///
/// Only ASCII letters, digits, `-` and `_` are accepted so an identifier can
/// never escape the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormId(String);

impl FormId {
    /// Parse an identifier received from a client.
    ///
    /// # Errors
    ///
    /// Returns [`FormIdError::Missing`] for empty or whitespace-only input
    /// and [`FormIdError::Invalid`] for anything that is not a safe
    /// directory name.
    pub fn parse(raw: &str) -> Result<Self, FormIdError> {
        if raw.trim().is_empty() {
            return Err(FormIdError::Missing);
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(FormIdError::Invalid { id: raw.to_owned() });
        }
        Ok(Self(raw.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FormId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Issues millisecond-timestamp identifiers that never repeat within a
/// process.
///
/// Each identifier is `max(now_ms, previous + 1)`, so two forms saved in the
/// same millisecond get consecutive values instead of colliding.
#[derive(Debug, Default)]
pub struct FormIdGenerator {
    last: AtomicI64,
}

impl FormIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifier based on the current wall clock.
    pub fn next_id(&self) -> FormId {
        self.next_after(chrono::Utc::now().timestamp_millis())
    }

    fn next_after(&self, now_ms: i64) -> FormId {
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_ms.max(prev.saturating_add(1));
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return FormId(candidate.to_string()),
                Err(actual) => prev = actual,
            }
        }
    }
}
