//! Client-key access check.
//!
//! The set of allowed keys is fixed at construction time. The gate holds no
//! mutable state, so one instance can be shared by every request.

use std::collections::HashSet;

use crate::error::AccessError;

/// Name of the request header carrying the client key.
pub const CLIENT_KEY_HEADER: &str = "x-client-key";

/// Immutable set of allowed client keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStore {
    keys: HashSet<String>,
}

impl KeyStore {
    /// Build a store from configured keys. Empty strings are skipped since
    /// an empty header is always treated as missing.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Decides whether a request may perform a gated operation.
#[derive(Debug, Clone)]
pub struct AccessGate {
    keys: KeyStore,
}

impl AccessGate {
    #[must_use]
    pub fn new(keys: KeyStore) -> Self {
        Self { keys }
    }

    /// Check the raw `x-client-key` header value.
    ///
    /// # Errors
    ///
    /// [`AccessError::MissingKey`] when the header is absent or empty,
    /// [`AccessError::UnknownKey`] when it matches no configured key.
    pub fn authorize(&self, header: Option<&str>) -> Result<(), AccessError> {
        match header {
            None | Some("") => Err(AccessError::MissingKey),
            Some(key) if self.keys.contains(key) => Ok(()),
            Some(_) => Err(AccessError::UnknownKey),
        }
    }
}
