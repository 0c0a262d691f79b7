//! Radio session bracketing.
//!
//! Every tag operation runs between a technology request and its release.
//! [`SessionManager::run_with_session`] guarantees the release runs exactly
//! once after the request has been attempted, whether the request fails or
//! the operation succeeds, fails or panics.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{Error, Result, SessionError, WriteError};
use crate::hardware::{NfcHardware, TagHandle, Technology};

/// Access to the tag during one active session.
///
/// Handed to the operation by [`SessionManager::run_with_session`]; it must not
/// be used after the operation returns.
#[derive(Debug, Clone)]
pub struct Session {
    hardware: Arc<dyn NfcHardware>,
    technology: Technology,
}

impl Session {
    /// The technology this session was opened for.
    #[must_use]
    pub fn technology(&self) -> Technology {
        self.technology
    }

    /// The tag held by this session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoTag`] if the hardware has no tag.
    pub async fn tag(&self) -> Result<TagHandle> {
        self.hardware
            .get_tag()
            .await
            .ok_or(Error::Session(SessionError::NoTag))
    }

    /// Read the raw NDEF message from `tag`.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the tag cannot be read.
    pub async fn read_message(&self, tag: &TagHandle) -> Result<Option<Vec<u8>>> {
        self.hardware
            .read_ndef_message(tag)
            .await
            .map_err(|err| Error::Session(SessionError::from(err)))
    }

    /// Replace the NDEF message on `tag`.
    ///
    /// # Errors
    ///
    /// Returns a [`WriteError`] if the hardware rejects the message.
    pub async fn write_message(&self, tag: &TagHandle, message: &[u8]) -> Result<()> {
        self.hardware
            .write_ndef_message(tag, message)
            .await
            .map_err(|err| Error::Write(WriteError::from(err)))
    }
}

/// Acquires and releases the radio around tag operations.
#[derive(Debug)]
pub struct SessionManager {
    hardware: Arc<dyn NfcHardware>,
    technology: Technology,
    in_flight: Arc<watch::Sender<usize>>,
}

impl SessionManager {
    /// Create a manager requesting `technology` from `hardware`.
    #[must_use]
    pub fn new(hardware: Arc<dyn NfcHardware>, technology: Technology) -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            hardware,
            technology,
            in_flight: Arc::new(in_flight),
        }
    }

    /// The technology requested for each session.
    #[must_use]
    pub fn technology(&self) -> Technology {
        self.technology
    }

    /// The injected hardware.
    #[must_use]
    pub fn hardware(&self) -> &Arc<dyn NfcHardware> {
        &self.hardware
    }

    /// Whether a bracketed call is in progress.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        *self.in_flight.borrow() > 0
    }

    /// Watch the number of bracketed calls in progress.
    ///
    /// The count rises before the technology request and falls only after the
    /// release has completed, so a UI can hold its "processing" state on it.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.in_flight.subscribe()
    }

    /// Run `operation` inside an exclusive radio session.
    ///
    /// The operation runs on its own task. Once this call has started, the
    /// release path always runs, even if the caller stops awaiting. Nothing is
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the radio cannot be acquired, the
    /// operation's own error, or an internal error if the operation panicked.
    pub async fn run_with_session<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let hardware = Arc::clone(&self.hardware);
        let technology = self.technology;
        let in_flight = Arc::clone(&self.in_flight);

        let span = info_span!("nfc_session", hardware = hardware.name(), %technology);
        let task = tokio::spawn(
            async move {
                in_flight.send_modify(|count| *count += 1);
                let result = bracket(hardware, technology, operation).await;
                in_flight.send_modify(|count| *count -= 1);
                result
            }
            .instrument(span),
        );

        match task.await {
            Ok(result) => result,
            Err(err) => Err(Error::internal(format!("session task failed: {err}"))),
        }
    }
}

async fn bracket<T, F, Fut>(
    hardware: Arc<dyn NfcHardware>,
    technology: Technology,
    operation: F,
) -> Result<T>
where
    F: FnOnce(Session) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    debug!("requesting technology");
    let result = match hardware.request_technology(technology).await {
        Ok(()) => {
            debug!("technology acquired");
            let session = Session {
                hardware: Arc::clone(&hardware),
                technology,
            };
            match tokio::spawn(operation(session)).await {
                Ok(result) => result,
                Err(err) if err.is_panic() => Err(Error::internal("tag operation panicked")),
                Err(err) => Err(Error::internal(format!("tag operation aborted: {err}"))),
            }
        }
        Err(err) => {
            debug!(error = %err, "technology request failed");
            Err(Error::Session(SessionError::from(err)))
        }
    };

    release(hardware.as_ref()).await;
    result
}

async fn release(hardware: &dyn NfcHardware) {
    match hardware.cancel_technology_request().await {
        Ok(()) => debug!("technology released"),
        Err(err) => warn!(error = %err, "failed to release technology"),
    }
}
