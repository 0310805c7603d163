//! Masking of sensitive values inside tool-call arguments.
//!
//! A value is masked when the object key it sits under contains one of the
//! configured vocabulary words, compared case-insensitively. Arrays and nested
//! objects are walked structurally; the masked value is replaced whole.

use serde_json::{Map, Value};

/// Token written in place of a masked value.
pub const DEFAULT_MASK: &str = "******";

/// Words that mark a key as sensitive.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "token",
    "password",
    "secret",
    "key",
    "authorization",
    "auth",
    "credential",
    "private",
    "cert",
    "access_key",
];

/// Recursive key-based redactor for JSON values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redactor {
    /// Lowercased vocabulary.
    keys: Vec<String>,
    mask: String,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_KEYS.iter().copied(), DEFAULT_MASK)
    }
}

impl Redactor {
    /// Create a redactor from a vocabulary and a mask token.
    #[must_use]
    pub fn new<I, S>(keys: I, mask: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            mask: mask.into(),
        }
    }

    /// The mask token.
    #[must_use]
    pub fn mask(&self) -> &str {
        &self.mask
    }

    /// Returns true if `key` contains any vocabulary word.
    #[must_use]
    pub fn is_sensitive(&self, key: &str) -> bool {
        let lower = key.to_lowercase();
        self.keys.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Return a masked deep copy of `value`.
    ///
    /// Scalars are returned unchanged since they carry no key.
    #[must_use]
    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.redact_object(map)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            other => other.clone(),
        }
    }

    fn redact_object(&self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .map(|(k, v)| {
                let masked = if self.is_sensitive(k) {
                    Value::String(self.mask.clone())
                } else {
                    self.redact(v)
                };
                (k.clone(), masked)
            })
            .collect()
    }
}
