//! Key-value persistence behind the fasting-state store.
//!
//! The store reads and writes the session as four independent preference
//! entries. Backends report failures per key where they can, so a single
//! unreadable field degrades to its default instead of taking the whole
//! session down.
//!
//! # Error classes
//!
//! | Variant    | Transient | Store behaviour                          |
//! |------------|-----------|------------------------------------------|
//! | `Io`       | yes       | substitute defaults, log a warning       |
//! | `Decode`   | yes       | substitute the field default, log        |
//! | `Contract` | no        | propagate to subscribers as an error     |

mod memory;
mod sqlite;

pub use memory::MemoryPersistence;
pub use sqlite::SqlitePersistence;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Persistence failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// The storage medium could not be read or written.
    #[error("storage I/O failed: {0}")]
    Io(String),

    /// A stored value could not be decoded.
    #[error("failed to decode {key}: {reason}")]
    Decode {
        /// Key whose value was unreadable.
        key: String,
        /// Why decoding failed.
        reason: String,
    },

    /// The backend broke its contract (missing schema, constraint violation).
    #[error("storage contract violated: {0}")]
    Contract(String),
}

impl PersistenceError {
    /// I/O and decode failures are recoverable; contract violations are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Decode { .. })
    }

    fn type_mismatch(key: &str, expected: &str, found: &PrefValue) -> Self {
        Self::Decode {
            key: key.to_string(),
            reason: format!("expected {}, found {}", expected, found.type_name()),
        }
    }
}

/// A single stored preference value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefValue {
    /// Boolean flag.
    Bool(bool),
    /// 64-bit integer.
    Long(i64),
    /// UTF-8 text.
    Text(String),
}

impl PrefValue {
    /// Short type tag, also used as the column value by the SQLite backend.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Long(_) => "long",
            Self::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Value(PrefValue),
    Unreadable(PersistenceError),
}

/// A snapshot of stored preferences.
///
/// Entries are either a value or the error that prevented reading it.
/// Typed getters return `Ok(None)` for an absent key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    entries: BTreeMap<String, Entry>,
}

impl Preferences {
    /// Create an empty set of preferences.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing whatever (value or error) was there.
    pub fn set(&mut self, key: &str, value: PrefValue) {
        self.entries.insert(key.to_string(), Entry::Value(value));
    }

    /// Record that `key` exists but could not be read.
    pub fn mark_unreadable(&mut self, key: &str, error: PersistenceError) {
        self.entries
            .insert(key.to_string(), Entry::Unreadable(error));
    }

    /// Drop a key.
    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Raw lookup.
    pub fn get(&self, key: &str) -> Result<Option<&PrefValue>, PersistenceError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::Value(value)) => Ok(Some(value)),
            Some(Entry::Unreadable(err)) => Err(err.clone()),
        }
    }

    /// Read a boolean. A value of another type is a decode error.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, PersistenceError> {
        match self.get(key)? {
            None => Ok(None),
            Some(PrefValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(PersistenceError::type_mismatch(key, "bool", other)),
        }
    }

    /// Read an integer. A value of another type is a decode error.
    pub fn get_long(&self, key: &str) -> Result<Option<i64>, PersistenceError> {
        match self.get(key)? {
            None => Ok(None),
            Some(PrefValue::Long(n)) => Ok(Some(*n)),
            Some(other) => Err(PersistenceError::type_mismatch(key, "long", other)),
        }
    }

    /// Read a string. A value of another type is a decode error.
    pub fn get_text(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match self.get(key)? {
            None => Ok(None),
            Some(PrefValue::Text(s)) => Ok(Some(s.clone())),
            Some(other) => Err(PersistenceError::type_mismatch(key, "text", other)),
        }
    }

    /// Iterate over readable entries.
    pub fn values(&self) -> impl Iterator<Item = (&str, &PrefValue)> {
        self.entries.iter().filter_map(|(key, entry)| match entry {
            Entry::Value(value) => Some((key.as_str(), value)),
            Entry::Unreadable(_) => None,
        })
    }

    /// Every key present, readable or not.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// True when `key` is present, readable or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of keys, readable or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no keys are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A read-modify-write step applied inside [`Persistence::update`].
pub type Transform = Box<dyn FnOnce(&mut Preferences) + Send>;

/// Durable key-value storage for the session fields.
///
/// `update` must be atomic with respect to other `update` calls on the same
/// backend, and must leave keys the transform did not touch exactly as they
/// were, including keys that are currently unreadable.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Read all stored preferences.
    async fn load(&self) -> Result<Preferences, PersistenceError>;

    /// Apply `transform` and commit, returning what a subsequent `load`
    /// would observe.
    async fn update(&self, transform: Transform) -> Result<Preferences, PersistenceError>;
}
