//! Read-modify-write operations on the document stored on a tag.
//!
//! Each operation reads the current document from the tag, applies a pure
//! transform and writes the result back, all within one session. Nothing is
//! cached between operations.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::codec;
use crate::document::TagDocument;
use crate::error::Result;
use crate::hardware::TagHandle;
use crate::ndef::LanguageCode;
use crate::session::Session;

/// Outcome of an unlock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockResult {
    /// The password matched; the lock was removed.
    Success,
    /// The tag was not locked; nothing was written.
    NotLocked,
    /// The password did not match; nothing was written.
    InvalidPassword,
}

impl std::fmt::Display for UnlockResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NotLocked => write!(f, "not_locked"),
            Self::InvalidPassword => write!(f, "invalid_password"),
        }
    }
}

/// Raw tag contents, as returned by [`TagDocumentStore::read_raw`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTag {
    /// The tag UID.
    pub uid: Vec<u8>,
    /// The stored NDEF message, if any.
    pub message: Option<Vec<u8>>,
}

/// The document operations. Stateless apart from the language code used when
/// encoding.
#[derive(Debug, Clone, Default)]
pub struct TagDocumentStore {
    language: LanguageCode,
}

impl TagDocumentStore {
    /// Create a store encoding text records with `language`.
    #[must_use]
    pub fn new(language: LanguageCode) -> Self {
        Self { language }
    }

    /// The language code written into text records.
    #[must_use]
    pub fn language(&self) -> &LanguageCode {
        &self.language
    }

    /// Read the current document.
    ///
    /// # Errors
    ///
    /// Returns a session error if the tag cannot be read.
    pub async fn read(&self, session: &Session) -> Result<TagDocument> {
        let tag = session.tag().await?;
        let doc = Self::load(session, &tag).await?;
        debug!(fields = doc.len(), locked = doc.is_locked(), "Read tag document");
        Ok(doc)
    }

    /// Read the tag UID and raw message without decoding.
    ///
    /// # Errors
    ///
    /// Returns a session error if the tag cannot be read.
    pub async fn read_raw(&self, session: &Session) -> Result<RawTag> {
        let tag = session.tag().await?;
        let message = session.read_message(&tag).await?;
        Ok(RawTag {
            uid: tag.id().to_vec(),
            message,
        })
    }

    /// Merge `patch` over the current document and write it back.
    ///
    /// Returns the merged document as written.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the patch names a reserved key, a session
    /// error if the tag cannot be read, or a write error if the hardware
    /// rejects the new message.
    pub async fn write(
        &self,
        session: &Session,
        patch: &BTreeMap<String, String>,
    ) -> Result<TagDocument> {
        let tag = session.tag().await?;
        let mut doc = Self::load(session, &tag).await?;
        doc.merge(patch)?;
        self.save(session, &tag, &doc).await?;
        info!(patched = patch.len(), fields = doc.len(), "Wrote tag document");
        Ok(doc)
    }

    /// Lock the document with `password`.
    ///
    /// Any previous password is replaced without being checked.
    ///
    /// # Errors
    ///
    /// Returns a session error if the tag cannot be read, or a write error if
    /// the hardware rejects the new message.
    pub async fn lock(&self, session: &Session, password: &str) -> Result<()> {
        let tag = session.tag().await?;
        let mut doc = Self::load(session, &tag).await?;
        doc.apply_lock(password);
        self.save(session, &tag, &doc).await?;
        info!("Locked tag");
        Ok(())
    }

    /// Remove the lock if `candidate` matches the stored password exactly.
    ///
    /// # Errors
    ///
    /// Returns a session error if the tag cannot be read, or a write error if
    /// the hardware rejects the unlocked document.
    pub async fn unlock(&self, session: &Session, candidate: &str) -> Result<UnlockResult> {
        let tag = session.tag().await?;
        let mut doc = Self::load(session, &tag).await?;

        if !doc.is_locked() {
            info!("Unlock requested on a tag that is not locked");
            return Ok(UnlockResult::NotLocked);
        }
        if doc.password() != Some(candidate) {
            info!("Unlock rejected: password mismatch");
            return Ok(UnlockResult::InvalidPassword);
        }

        doc.clear_lock();
        self.save(session, &tag, &doc).await?;
        info!("Unlocked tag");
        Ok(UnlockResult::Success)
    }

    /// Replace whatever is on the tag with an empty document.
    ///
    /// # Errors
    ///
    /// Returns a session error if no tag is held, or a write error if the
    /// hardware rejects the message.
    pub async fn erase(&self, session: &Session) -> Result<()> {
        let tag = session.tag().await?;
        self.save(session, &tag, &TagDocument::new()).await?;
        info!("Erased tag document");
        Ok(())
    }

    async fn load(session: &Session, tag: &TagHandle) -> Result<TagDocument> {
        let message = session.read_message(tag).await?;
        Ok(codec::decode(message.as_deref()))
    }

    async fn save(&self, session: &Session, tag: &TagHandle, doc: &TagDocument) -> Result<()> {
        let message = codec::encode(doc, &self.language);
        debug!(bytes = message.len(), "Writing tag message");
        session.write_message(tag, &message).await
    }
}
