//! Interface to the tag-technology hardware library.
//!
//! The protocol never talks to a radio directly. Everything it needs from the
//! platform is expressed by the [`NfcHardware`] trait, and the application's
//! composition root decides which implementation to inject and owns its
//! `start`/`shutdown` lifecycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{SessionError, WriteError};

/// Errors reported by a hardware implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    /// `start` has not been called.
    #[error("hardware not initialized")]
    NotInitialized,

    /// No tag is in the field.
    #[error("no tag in range")]
    NoTag,

    /// A technology request is already active.
    #[error("technology request already in progress")]
    Busy,

    /// The platform denied access to the radio.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The user cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// The tag left the field.
    #[error("tag lost")]
    TagLost,

    /// The tag refuses writes.
    #[error("tag is read-only")]
    ReadOnly,

    /// The payload does not fit on the tag.
    #[error("payload of {needed} bytes exceeds capacity of {capacity} bytes")]
    CapacityExceeded {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        capacity: usize,
    },

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Result type for hardware calls.
pub type Result<T> = std::result::Result<T, HardwareError>;

impl From<HardwareError> for SessionError {
    fn from(err: HardwareError) -> Self {
        match err {
            HardwareError::NotInitialized => Self::NotInitialized,
            HardwareError::NoTag => Self::NoTag,
            HardwareError::Busy => Self::Busy,
            HardwareError::PermissionDenied(reason) => Self::PermissionDenied(reason),
            HardwareError::Cancelled => Self::Cancelled,
            HardwareError::TagLost => Self::TagLost,
            other @ (HardwareError::ReadOnly
            | HardwareError::CapacityExceeded { .. }
            | HardwareError::Other(_)) => Self::Hardware(other.to_string()),
        }
    }
}

impl From<HardwareError> for WriteError {
    fn from(err: HardwareError) -> Self {
        match err {
            HardwareError::ReadOnly => Self::ReadOnly,
            HardwareError::CapacityExceeded { needed, capacity } => {
                Self::CapacityExceeded { needed, capacity }
            }
            HardwareError::TagLost | HardwareError::NoTag => Self::TagLost,
            other => Self::Hardware(other.to_string()),
        }
    }
}

/// The tag technology a session is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    /// NDEF-formatted tags.
    #[default]
    Ndef,
    /// Raw ISO 14443-3A.
    NfcA,
    /// ISO 14443-4.
    IsoDep,
}

impl std::fmt::Display for Technology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ndef => write!(f, "ndef"),
            Self::NfcA => write!(f, "nfc_a"),
            Self::IsoDep => write!(f, "iso_dep"),
        }
    }
}

/// A discovered tag, valid only while the session that produced it is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagHandle {
    id: Vec<u8>,
    technology: Technology,
}

impl TagHandle {
    /// Create a handle for the tag with the given UID.
    #[must_use]
    pub fn new(id: impl Into<Vec<u8>>, technology: Technology) -> Self {
        Self {
            id: id.into(),
            technology,
        }
    }

    /// The tag UID.
    #[must_use]
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// The UID as lowercase hex.
    #[must_use]
    pub fn id_hex(&self) -> String {
        hex::encode(&self.id)
    }

    /// The technology the handle was obtained through.
    #[must_use]
    pub fn technology(&self) -> Technology {
        self.technology
    }
}

/// A platform tag-technology library.
///
/// Only one technology request may be active at a time; implementations report
/// [`HardwareError::Busy`] to a second concurrent request.
#[async_trait::async_trait]
pub trait NfcHardware: Send + Sync + std::fmt::Debug {
    /// Name of this implementation (for logging).
    fn name(&self) -> &'static str;

    /// Initialize the radio stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no usable NFC support.
    async fn start(&self) -> Result<()>;

    /// Tear down the radio stack.
    async fn shutdown(&self);

    /// Request exclusive access to the given technology, waiting for a tag.
    ///
    /// # Errors
    ///
    /// Fails when no tag is presented, the radio is busy, permission is denied
    /// or the user cancels.
    async fn request_technology(&self, technology: Technology) -> Result<()>;

    /// Release the current technology request.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform fails to release the radio.
    async fn cancel_technology_request(&self) -> Result<()>;

    /// The tag held by the current request, if any.
    async fn get_tag(&self) -> Option<TagHandle>;

    /// Read the raw NDEF message stored on the tag. `None` means the tag
    /// carries no NDEF message.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag cannot be read.
    async fn read_ndef_message(&self, tag: &TagHandle) -> Result<Option<Vec<u8>>>;

    /// Replace the NDEF message stored on the tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag rejects the message.
    async fn write_ndef_message(&self, tag: &TagHandle, message: &[u8]) -> Result<()>;
}
