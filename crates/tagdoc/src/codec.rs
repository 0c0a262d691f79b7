//! Conversion between a [`TagDocument`] and the bytes stored on a tag.
//!
//! A document is written as one NDEF message holding one text record whose
//! text is the document's canonical JSON: a flat object, keys sorted, no
//! whitespace.
//!
//! Decoding never fails. A tag without a message, or whose first record is not
//! a JSON text record, reads as an empty document, so a blank tag can be
//! written without a separate formatting step. The reason is available from
//! [`try_decode`] for diagnostics.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::document::TagDocument;
use crate::ndef::{LanguageCode, NdefRecord};

/// Why tag contents could not be read as a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The tag carries no NDEF message.
    #[error("tag carries no NDEF message")]
    NoMessage,

    /// The NDEF message has no bytes.
    #[error("NDEF message is empty")]
    EmptyMessage,

    /// A record field runs past the end of its buffer.
    #[error("record truncated: {needed} bytes needed at offset {offset}")]
    Truncated {
        /// Offset where reading stopped.
        offset: usize,
        /// Bytes that were required.
        needed: usize,
    },

    /// The first record is a chunk of a larger payload.
    #[error("chunked records are not supported")]
    Chunked,

    /// The first record is not a well-known text record.
    #[error("first record is not a text record (tnf {tnf:#04x}, type '{record_type}')")]
    NotText {
        /// Type name format of the record.
        tnf: u8,
        /// Record type, lossily decoded.
        record_type: String,
    },

    /// The record text is not valid in its declared encoding.
    #[error("record text is not valid: {0}")]
    InvalidText(String),

    /// The record text is not JSON.
    #[error("record text is not JSON: {0}")]
    InvalidJson(String),

    /// The record text is JSON but not an object.
    #[error("record text is JSON but not an object")]
    NotAnObject,
}

/// Encode `doc` as a single-record NDEF message.
#[must_use]
pub fn encode(doc: &TagDocument, language: &LanguageCode) -> Vec<u8> {
    let json = Value::Object(doc.to_json_object()).to_string();
    NdefRecord::text(language, &json).to_message_bytes()
}

/// Decode tag contents, falling back to an empty document.
#[must_use]
pub fn decode(message: Option<&[u8]>) -> TagDocument {
    match try_decode(message) {
        Ok(doc) => doc,
        Err(err) => {
            debug!(reason = %err, "tag contents are not a document, starting empty");
            TagDocument::new()
        }
    }
}

/// Decode tag contents, reporting why they are not a document.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first problem found.
pub fn try_decode(message: Option<&[u8]>) -> Result<TagDocument, DecodeError> {
    let message = message.ok_or(DecodeError::NoMessage)?;
    let record = NdefRecord::parse_first(message)?;
    let text = record.to_text()?;

    match serde_json::from_str::<Value>(&text.text) {
        Ok(Value::Object(object)) => Ok(TagDocument::from_json_object(object)),
        Ok(_) => Err(DecodeError::NotAnObject),
        Err(err) => Err(DecodeError::InvalidJson(err.to_string())),
    }
}
