//! The logical contents of a tag.
//!
//! A [`TagDocument`] is a flat string-keyed map with two reserved keys that
//! carry the access-control state. The two always travel together: a password
//! is stored only while `locked` is true, and a locked document always has one.
//! Documents only live for the duration of one operation; they are always
//! re-read from the tag.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Reserved key holding the lock flag (a JSON boolean).
pub const LOCKED_KEY: &str = "locked";

/// Reserved key holding the unlock password (a JSON string).
pub const PASSWORD_KEY: &str = "password";

/// Check if a key is reserved for access control.
#[must_use]
pub fn is_reserved(key: &str) -> bool {
    key == LOCKED_KEY || key == PASSWORD_KEY
}

/// A flat key-value document stored on a tag.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TagDocument {
    fields: BTreeMap<String, String>,
    // Present exactly when the document is locked.
    password: Option<String>,
}

impl TagDocument {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from user fields.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any key is reserved.
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let patch: BTreeMap<String, String> = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut doc = Self::new();
        doc.merge(&patch)?;
        Ok(doc)
    }

    /// Look up a user field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// All user fields, excluding the reserved keys.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Whether the document is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.password.is_some()
    }

    /// The stored password, present only while locked.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Number of user fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when nothing at all is stored, reserved keys included.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.password.is_none()
    }

    /// Shallow-merge `patch` over the user fields.
    ///
    /// Keys in the patch overwrite existing values; every other key is kept.
    /// The patch is checked as a whole before anything is applied.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the patch names a reserved key.
    pub fn merge(&mut self, patch: &BTreeMap<String, String>) -> Result<()> {
        if let Some(key) = patch.keys().find(|key| is_reserved(key)) {
            return Err(Error::validation(format!(
                "'{key}' is reserved for tag locking"
            )));
        }
        for (key, value) in patch {
            self.fields.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    /// Mark the document locked with `password`, replacing any previous one.
    pub fn apply_lock(&mut self, password: &str) {
        self.password = Some(password.to_string());
    }

    /// Remove the lock flag and the password together.
    pub fn clear_lock(&mut self) {
        self.password = None;
    }

    /// The document as a flat JSON object.
    #[must_use]
    pub fn to_json_object(&self) -> Map<String, Value> {
        let mut object: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        if let Some(password) = &self.password {
            object.insert(LOCKED_KEY.to_string(), Value::Bool(true));
            object.insert(PASSWORD_KEY.to_string(), Value::String(password.clone()));
        }
        object
    }

    /// Build a document from a JSON object written by this or another tool.
    ///
    /// Non-string values of user keys are kept as their JSON text. The lock
    /// is honoured only when `locked` is `true` and `password` is a string.
    /// Any other shape of the reserved keys reads as unlocked, so a stray
    /// password is dropped on the next write.
    #[must_use]
    pub fn from_json_object(object: Map<String, Value>) -> Self {
        let mut doc = Self::new();
        let mut locked = false;
        let mut password = None;
        for (key, value) in object {
            if key == LOCKED_KEY {
                locked = value == Value::Bool(true);
            } else if key == PASSWORD_KEY {
                if let Value::String(text) = value {
                    password = Some(text);
                }
            } else {
                let text = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                doc.fields.insert(key, text);
            }
        }
        if locked {
            doc.password = password;
        }
        doc
    }
}

impl fmt::Debug for TagDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDocument")
            .field("fields", &self.fields)
            .field("locked", &self.is_locked())
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Serialize for TagDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json_object().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TagDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_json_object(object))
    }
}
