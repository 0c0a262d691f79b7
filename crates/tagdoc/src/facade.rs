//! User-facing tag actions.
//!
//! [`OperationFacade`] validates caller input, runs the matching store
//! operation inside a radio session and turns a user cancel into a quiet
//! [`Outcome::Cancelled`]. Every other failure is returned to the caller, who
//! decides whether to ask for another tap.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::document::{is_reserved, TagDocument};
use crate::error::{Error, Result};
use crate::hardware::NfcHardware;
use crate::session::SessionManager;
use crate::store::{RawTag, TagDocumentStore, UnlockResult};

/// Result of an action that the user may cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The action ran to completion.
    Completed(T),
    /// The user cancelled; nothing was changed and nothing should be reported.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Check if the action was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The completed value, if any.
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Cancelled => None,
        }
    }
}

/// Drop pairs with a blank label and reject reserved labels.
///
/// # Errors
///
/// Returns a validation error if no pair has a label, or a label is reserved.
pub fn collect_fields<I, K, V>(fields: I) -> Result<BTreeMap<String, String>>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut patch = BTreeMap::new();
    for (label, value) in fields {
        let label = label.into();
        if label.trim().is_empty() {
            continue;
        }
        if is_reserved(&label) {
            return Err(Error::validation(format!(
                "'{label}' is reserved for tag locking"
            )));
        }
        patch.insert(label, value.into());
    }
    if patch.is_empty() {
        return Err(Error::validation("at least one labelled field is required"));
    }
    Ok(patch)
}

/// The four tag actions, plus raw dump and erase.
#[derive(Debug)]
pub struct OperationFacade {
    sessions: SessionManager,
    store: TagDocumentStore,
}

impl OperationFacade {
    /// Create a facade from its parts.
    #[must_use]
    pub fn new(sessions: SessionManager, store: TagDocumentStore) -> Self {
        Self { sessions, store }
    }

    /// Create a facade for `hardware` as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured language code is invalid.
    pub fn from_config(hardware: Arc<dyn NfcHardware>, config: &Config) -> Result<Self> {
        let language = config.language_code()?;
        Ok(Self::new(
            SessionManager::new(hardware, config.nfc.technology),
            TagDocumentStore::new(language),
        ))
    }

    /// The session manager, for observing the processing state.
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Read the document on the tag.
    ///
    /// # Errors
    ///
    /// Returns any session failure other than a user cancel.
    pub async fn perform_read(&self) -> Result<Outcome<TagDocument>> {
        let store = self.store.clone();
        let result = self
            .sessions
            .run_with_session(move |session| async move { store.read(&session).await })
            .await;
        settle("read", result)
    }

    /// Merge labelled fields into the document on the tag.
    ///
    /// Pairs with a blank label are dropped before anything else happens.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any session is opened if no labelled
    /// pair remains or a label is reserved; otherwise any session or write
    /// failure other than a user cancel.
    pub async fn perform_write<I, K, V>(&self, fields: I) -> Result<Outcome<TagDocument>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let patch = collect_fields(fields)?;
        let store = self.store.clone();
        let result = self
            .sessions
            .run_with_session(move |session| async move { store.write(&session, &patch).await })
            .await;
        settle("write", result)
    }

    /// Lock the tag with `password`.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any session is opened if `password`
    /// is empty; otherwise any session or write failure other than a user
    /// cancel.
    pub async fn perform_lock(&self, password: &str) -> Result<Outcome<()>> {
        if password.is_empty() {
            return Err(Error::validation("password must not be empty"));
        }
        let store = self.store.clone();
        let password = password.to_string();
        let result = self
            .sessions
            .run_with_session(move |session| async move { store.lock(&session, &password).await })
            .await;
        settle("lock", result)
    }

    /// Try to unlock the tag with `password`.
    ///
    /// A wrong password is reported as [`UnlockResult::InvalidPassword`], not
    /// as an error.
    ///
    /// # Errors
    ///
    /// Returns any session or write failure other than a user cancel.
    pub async fn perform_unlock(&self, password: &str) -> Result<Outcome<UnlockResult>> {
        let store = self.store.clone();
        let password = password.to_string();
        let result = self
            .sessions
            .run_with_session(move |session| async move {
                store.unlock(&session, &password).await
            })
            .await;
        settle("unlock", result)
    }

    /// Read the raw tag contents without decoding them.
    ///
    /// # Errors
    ///
    /// Returns any session failure other than a user cancel.
    pub async fn perform_dump(&self) -> Result<Outcome<RawTag>> {
        let store = self.store.clone();
        let result = self
            .sessions
            .run_with_session(move |session| async move { store.read_raw(&session).await })
            .await;
        settle("dump", result)
    }

    /// Replace the tag contents with an empty document.
    ///
    /// # Errors
    ///
    /// Returns any session or write failure other than a user cancel.
    pub async fn perform_erase(&self) -> Result<Outcome<()>> {
        let store = self.store.clone();
        let result = self
            .sessions
            .run_with_session(move |session| async move { store.erase(&session).await })
            .await;
        settle("erase", result)
    }
}

fn settle<T>(action: &'static str, result: Result<T>) -> Result<Outcome<T>> {
    match result {
        Ok(value) => Ok(Outcome::Completed(value)),
        Err(err) if err.is_cancelled() => {
            info!(action, "Cancelled by user");
            Ok(Outcome::Cancelled)
        }
        Err(err) => {
            info!(action, error = %err, "Tag action failed");
            Err(err)
        }
    }
}
