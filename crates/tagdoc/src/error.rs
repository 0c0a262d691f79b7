//! Error types for tagdoc.
//!
//! Hardware and protocol failures are split by the phase they happen in:
//! anything that prevents talking to the tag is a [`SessionError`], anything the
//! hardware rejects while storing a document is a [`WriteError`]. Neither is
//! ever retried automatically.

use std::path::PathBuf;
use thiserror::Error;

/// Why the radio channel could not be acquired or used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The hardware layer was used before it was started.
    #[error("NFC hardware has not been started")]
    NotInitialized,

    /// No tag was discovered in the field.
    #[error("no tag in range")]
    NoTag,

    /// Another session currently holds the radio.
    #[error("radio is busy with another session")]
    Busy,

    /// The platform refused access to the NFC radio.
    #[error("NFC permission denied: {0}")]
    PermissionDenied(String),

    /// The user dismissed the prompt or removed the tag before it was read.
    #[error("cancelled by user")]
    Cancelled,

    /// The tag left the field while it was being read.
    #[error("tag was removed from the field")]
    TagLost,

    /// Any other hardware failure.
    #[error("{0}")]
    Hardware(String),
}

/// Why the hardware rejected a document write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The tag is permanently or temporarily write-protected.
    #[error("tag is read-only")]
    ReadOnly,

    /// The encoded message does not fit in the tag's user memory.
    #[error("message needs {needed} bytes but the tag holds {capacity}")]
    CapacityExceeded {
        /// Size of the encoded NDEF message.
        needed: usize,
        /// Usable NDEF capacity of the tag.
        capacity: usize,
    },

    /// The tag left the field between read and write.
    #[error("tag was removed from the field")]
    TagLost,

    /// Any other hardware failure.
    #[error("{0}")]
    Hardware(String),
}

/// The main error type for tagdoc operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Protocol Errors ===
    /// The radio channel could not be acquired or used.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The hardware rejected the write.
    #[error("write failed: {0}")]
    Write(#[from] WriteError),

    /// Caller input was rejected before any session was opened.
    #[error("invalid input: {message}")]
    Validation {
        /// Description of the rejected input.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a tag image from disk.
    #[error("failed to load tag image {path}: {source}")]
    TagImage {
        /// Path of the tag image.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for tagdoc operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a user-initiated cancel.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Session(SessionError::Cancelled))
    }

    /// Check if this error was raised before any session was opened.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// A short description of what kind of failure occurred, suitable for
    /// showing to the person holding the device.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Session(err) => format!("Could not reach the tag: {err}"),
            Self::Write(err) => format!("Could not write the tag: {err}"),
            Self::Validation { message } => format!("Please check your input: {message}"),
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } => {
                "The application is misconfigured".to_string()
            }
            Self::Io(_) | Self::TagImage { .. } | Self::Json(_) | Self::Internal(_) => {
                "Something went wrong while talking to the tag".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        assert_eq!(SessionError::NoTag.to_string(), "no tag in range");
        assert_eq!(SessionError::Cancelled.to_string(), "cancelled by user");
        assert_eq!(
            SessionError::PermissionDenied("NFC disabled".to_string()).to_string(),
            "NFC permission denied: NFC disabled"
        );
    }

    #[test]
    fn test_write_error_capacity_display() {
        let err = WriteError::CapacityExceeded {
            needed: 600,
            capacity: 496,
        };
        let msg = err.to_string();
        assert!(msg.contains("600"));
        assert!(msg.contains("496"));
    }

    #[test]
    fn test_from_session_error() {
        let err: Error = SessionError::Busy.into();
        assert!(matches!(err, Error::Session(SessionError::Busy)));
        assert_eq!(err.to_string(), "session error: radio is busy with another session");
    }

    #[test]
    fn test_from_write_error() {
        let err: Error = WriteError::ReadOnly.into();
        assert_eq!(err.to_string(), "write failed: tag is read-only");
    }

    #[test]
    fn test_is_cancelled() {
        assert!(Error::Session(SessionError::Cancelled).is_cancelled());
        assert!(!Error::Session(SessionError::NoTag).is_cancelled());
        assert!(!Error::Write(WriteError::TagLost).is_cancelled());
    }

    #[test]
    fn test_validation_error() {
        let err = Error::validation("password must not be empty");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "invalid input: password must not be empty"
        );
    }

    #[test]
    fn test_user_message_names_the_kind() {
        let msg = Error::Session(SessionError::NoTag).user_message();
        assert!(msg.contains("reach the tag"));
        assert!(msg.contains("no tag in range"));

        let msg = Error::Write(WriteError::ReadOnly).user_message();
        assert!(msg.contains("write the tag"));

        let msg = Error::validation("no fields").user_message();
        assert!(msg.contains("no fields"));

        let msg = Error::internal("bug").user_message();
        assert!(!msg.contains("bug"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_tag_image_error_display() {
        let err = Error::TagImage {
            path: PathBuf::from("/tmp/tag.ndef"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/tag.ndef"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "capacity must be greater than 0".to_string(),
        };
        assert!(err.to_string().contains("capacity"));
    }
}
