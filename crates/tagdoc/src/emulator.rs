//! An in-process reader and tag.
//!
//! [`TagEmulator`] implements [`NfcHardware`] without a radio. It holds at most
//! one tag in its field, enforces the single-session rule, tag capacity and
//! write protection, and can inject one-shot faults into each hardware call.
//! When opened on a tag image file, every successful write is persisted so the
//! tag survives between processes.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::{Error, Result as CrateResult};
use crate::hardware::{HardwareError, NfcHardware, Result, TagHandle, Technology};

/// User memory of an NTAG215, the most common sticker tag.
pub const DEFAULT_CAPACITY: usize = 496;

const DEFAULT_UID: [u8; 7] = [0x04, 0x5a, 0x31, 0xc2, 0x6e, 0x19, 0x80];

/// Counters for calls made against the emulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmulatorStats {
    /// Technology requests, successful or not.
    pub requests: u64,
    /// Technology releases, successful or not.
    pub releases: u64,
    /// Message reads, successful or not.
    pub reads: u64,
    /// Successful message writes.
    pub writes: u64,
}

/// A tag that can be placed in the emulator's field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatedTag {
    /// Tag UID.
    pub uid: Vec<u8>,
    /// Stored NDEF message, `None` for a blank tag.
    pub message: Option<Vec<u8>>,
    /// Usable NDEF capacity in bytes.
    pub capacity: usize,
    /// Whether writes are refused.
    pub read_only: bool,
}

impl EmulatedTag {
    /// A blank, writable tag with the default capacity.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            uid: DEFAULT_UID.to_vec(),
            message: None,
            capacity: DEFAULT_CAPACITY,
            read_only: false,
        }
    }

    /// The same tag holding `message`.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<Vec<u8>>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Default for EmulatedTag {
    fn default() -> Self {
        Self::blank()
    }
}

#[derive(Debug, Default)]
struct Faults {
    request: Option<HardwareError>,
    release: Option<HardwareError>,
    read: Option<HardwareError>,
    write: Option<HardwareError>,
}

#[derive(Debug, Default)]
struct State {
    started: bool,
    active: Option<Technology>,
    // Requests refused as busy whose release has not arrived yet.
    refused: u64,
    tag: Option<EmulatedTag>,
    faults: Faults,
    stats: EmulatorStats,
}

impl State {
    fn check_active(&self) -> Result<()> {
        if self.active.is_none() {
            return Err(HardwareError::Other(
                "no active technology request".to_string(),
            ));
        }
        Ok(())
    }

    fn present(&self, handle: &TagHandle) -> Result<&EmulatedTag> {
        self.check_active()?;
        self.tag
            .as_ref()
            .filter(|tag| tag.uid == handle.id())
            .ok_or(HardwareError::TagLost)
    }

    fn present_mut(&mut self, handle: &TagHandle) -> Result<&mut EmulatedTag> {
        self.check_active()?;
        self.tag
            .as_mut()
            .filter(|tag| tag.uid == handle.id())
            .ok_or(HardwareError::TagLost)
    }
}

/// Emulated NFC hardware.
#[derive(Debug)]
pub struct TagEmulator {
    state: Mutex<State>,
    image_path: Option<PathBuf>,
}

impl TagEmulator {
    /// An emulator with a blank tag in its field.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tag(EmulatedTag::blank())
    }

    /// An emulator with `tag` in its field.
    #[must_use]
    pub fn with_tag(tag: EmulatedTag) -> Self {
        Self {
            state: Mutex::new(State {
                tag: Some(tag),
                ..State::default()
            }),
            image_path: None,
        }
    }

    /// An emulator whose tag is backed by the image file at `path`.
    ///
    /// A missing or empty file is a blank tag. Successful writes replace the
    /// file contents with the new message.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn open_image(
        path: impl AsRef<Path>,
        capacity: usize,
        read_only: bool,
    ) -> CrateResult<Self> {
        let path = path.as_ref().to_path_buf();
        let message = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => None,
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Err(Error::TagImage { path, source }),
        };
        debug!(
            "Opened tag image at {} ({} bytes)",
            path.display(),
            message.as_ref().map_or(0, Vec::len)
        );

        let tag = EmulatedTag {
            message,
            capacity,
            read_only,
            ..EmulatedTag::blank()
        };
        Ok(Self {
            image_path: Some(path),
            ..Self::with_tag(tag)
        })
    }

    /// The backing image file, if any.
    #[must_use]
    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the tag out of the field.
    pub fn remove_tag(&self) -> Option<EmulatedTag> {
        self.state().tag.take()
    }

    /// Put `tag` into the field, replacing any tag already there.
    pub fn place_tag(&self, tag: EmulatedTag) {
        self.state().tag = Some(tag);
    }

    /// The message currently stored on the tag in the field.
    #[must_use]
    pub fn message(&self) -> Option<Vec<u8>> {
        self.state().tag.as_ref().and_then(|tag| tag.message.clone())
    }

    /// Fail the next technology request with `err`.
    pub fn fail_next_request(&self, err: HardwareError) {
        self.state().faults.request = Some(err);
    }

    /// Fail the next release with `err`.
    pub fn fail_next_release(&self, err: HardwareError) {
        self.state().faults.release = Some(err);
    }

    /// Fail the next message read with `err`.
    pub fn fail_next_read(&self, err: HardwareError) {
        self.state().faults.read = Some(err);
    }

    /// Fail the next message write with `err`.
    pub fn fail_next_write(&self, err: HardwareError) {
        self.state().faults.write = Some(err);
    }

    /// Call counters so far.
    #[must_use]
    pub fn stats(&self) -> EmulatorStats {
        self.state().stats
    }

    /// Whether a technology request is currently held.
    #[must_use]
    pub fn session_active(&self) -> bool {
        self.state().active.is_some()
    }
}

impl Default for TagEmulator {
    fn default() -> Self {
        Self::new()
    }
}

async fn persist(path: &Path, message: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                HardwareError::Other(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
    }
    tokio::fs::write(path, message)
        .await
        .map_err(|e| HardwareError::Other(format!("failed to persist tag image: {e}")))
}

#[async_trait::async_trait]
impl NfcHardware for TagEmulator {
    fn name(&self) -> &'static str {
        "emulator"
    }

    async fn start(&self) -> Result<()> {
        self.state().started = true;
        info!("Tag emulator started");
        Ok(())
    }

    async fn shutdown(&self) {
        let mut state = self.state();
        state.started = false;
        state.active = None;
        state.refused = 0;
        info!("Tag emulator stopped");
    }

    async fn request_technology(&self, technology: Technology) -> Result<()> {
        let mut state = self.state();
        state.stats.requests += 1;
        if !state.started {
            return Err(HardwareError::NotInitialized);
        }
        if let Some(err) = state.faults.request.take() {
            return Err(err);
        }
        if state.active.is_some() {
            state.refused += 1;
            return Err(HardwareError::Busy);
        }
        if state.tag.is_none() {
            return Err(HardwareError::NoTag);
        }
        state.active = Some(technology);
        Ok(())
    }

    async fn cancel_technology_request(&self) -> Result<()> {
        let mut state = self.state();
        state.stats.releases += 1;
        // A release owed for a refused request must not end the active session.
        if state.refused > 0 {
            state.refused -= 1;
        } else {
            state.active = None;
        }
        match state.faults.release.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn get_tag(&self) -> Option<TagHandle> {
        let state = self.state();
        let technology = state.active?;
        state
            .tag
            .as_ref()
            .map(|tag| TagHandle::new(tag.uid.clone(), technology))
    }

    async fn read_ndef_message(&self, tag: &TagHandle) -> Result<Option<Vec<u8>>> {
        let mut state = self.state();
        state.stats.reads += 1;
        if let Some(err) = state.faults.read.take() {
            return Err(err);
        }
        Ok(state.present(tag)?.message.clone())
    }

    async fn write_ndef_message(&self, tag: &TagHandle, message: &[u8]) -> Result<()> {
        let previous = {
            let mut state = self.state();
            if let Some(err) = state.faults.write.take() {
                return Err(err);
            }
            let current = state.present_mut(tag)?;
            if current.read_only {
                return Err(HardwareError::ReadOnly);
            }
            if message.len() > current.capacity {
                return Err(HardwareError::CapacityExceeded {
                    needed: message.len(),
                    capacity: current.capacity,
                });
            }
            current.message.replace(message.to_vec())
        };

        if let Some(path) = &self.image_path {
            if let Err(err) = persist(path, message).await {
                let mut state = self.state();
                if let Ok(current) = state.present_mut(tag) {
                    current.message = previous;
                }
                return Err(err);
            }
        }

        self.state().stats.writes += 1;
        debug!(bytes = message.len(), "Tag written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_session(emulator: &TagEmulator) -> TagHandle {
        emulator.start().await.unwrap();
        emulator.request_technology(Technology::Ndef).await.unwrap();
        emulator.get_tag().await.unwrap()
    }

    #[tokio::test]
    async fn test_blank_tag_has_no_message() {
        let emulator = TagEmulator::new();
        let tag = open_session(&emulator).await;

        assert_eq!(emulator.read_ndef_message(&tag).await.unwrap(), None);
        assert_eq!(tag.id(), &DEFAULT_UID);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let emulator = TagEmulator::new();
        let tag = open_session(&emulator).await;

        emulator.write_ndef_message(&tag, &[1, 2, 3]).await.unwrap();

        assert_eq!(
            emulator.read_ndef_message(&tag).await.unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(emulator.message(), Some(vec![1, 2, 3]));
        assert_eq!(emulator.stats().writes, 1);
    }

    #[tokio::test]
    async fn test_request_before_start() {
        let emulator = TagEmulator::new();
        assert_eq!(
            emulator.request_technology(Technology::Ndef).await,
            Err(HardwareError::NotInitialized)
        );
    }

    #[tokio::test]
    async fn test_second_request_is_busy() {
        let emulator = TagEmulator::new();
        open_session(&emulator).await;

        assert_eq!(
            emulator.request_technology(Technology::Ndef).await,
            Err(HardwareError::Busy)
        );
        // The first release answers the refused request; the session survives.
        emulator.cancel_technology_request().await.unwrap();
        assert!(emulator.session_active());
        assert_eq!(
            emulator.request_technology(Technology::Ndef).await,
            Err(HardwareError::Busy)
        );
        emulator.cancel_technology_request().await.unwrap();

        emulator.cancel_technology_request().await.unwrap();
        assert!(!emulator.session_active());
        assert!(emulator.request_technology(Technology::Ndef).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_tag_in_field() {
        let emulator = TagEmulator::new();
        emulator.start().await.unwrap();
        emulator.remove_tag();

        assert_eq!(
            emulator.request_technology(Technology::Ndef).await,
            Err(HardwareError::NoTag)
        );
    }

    #[tokio::test]
    async fn test_get_tag_without_session() {
        let emulator = TagEmulator::new();
        emulator.start().await.unwrap();
        assert!(emulator.get_tag().await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_exceeded() {
        let emulator = TagEmulator::with_tag(EmulatedTag {
            capacity: 4,
            ..EmulatedTag::blank()
        });
        let tag = open_session(&emulator).await;

        assert_eq!(
            emulator.write_ndef_message(&tag, &[0; 5]).await,
            Err(HardwareError::CapacityExceeded {
                needed: 5,
                capacity: 4
            })
        );
        assert_eq!(emulator.message(), None);
    }

    #[tokio::test]
    async fn test_read_only_tag() {
        let emulator = TagEmulator::with_tag(EmulatedTag {
            read_only: true,
            ..EmulatedTag::blank().with_message(vec![9])
        });
        let tag = open_session(&emulator).await;

        assert_eq!(
            emulator.write_ndef_message(&tag, &[1]).await,
            Err(HardwareError::ReadOnly)
        );
        assert_eq!(emulator.message(), Some(vec![9]));
    }

    #[tokio::test]
    async fn test_swapped_tag_is_lost() {
        let emulator = TagEmulator::new();
        let tag = open_session(&emulator).await;
        emulator.place_tag(EmulatedTag {
            uid: vec![0xaa, 0xbb],
            ..EmulatedTag::blank()
        });

        assert_eq!(
            emulator.write_ndef_message(&tag, &[1]).await,
            Err(HardwareError::TagLost)
        );
    }

    #[tokio::test]
    async fn test_faults_are_one_shot() {
        let emulator = TagEmulator::new();
        let tag = open_session(&emulator).await;
        emulator.fail_next_write(HardwareError::TagLost);

        assert_eq!(
            emulator.write_ndef_message(&tag, &[1]).await,
            Err(HardwareError::TagLost)
        );
        assert!(emulator.write_ndef_message(&tag, &[1]).await.is_ok());

        emulator.fail_next_read(HardwareError::Other("crc".to_string()));
        assert!(emulator.read_ndef_message(&tag).await.is_err());
        assert!(emulator.read_ndef_message(&tag).await.is_ok());
    }

    #[tokio::test]
    async fn test_image_persists_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tag.ndef");

        let emulator = TagEmulator::open_image(&path, DEFAULT_CAPACITY, false).unwrap();
        assert_eq!(emulator.image_path(), Some(path.as_path()));
        let tag = open_session(&emulator).await;
        emulator.write_ndef_message(&tag, b"abc").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"abc");

        let reopened = TagEmulator::open_image(&path, DEFAULT_CAPACITY, false).unwrap();
        assert_eq!(reopened.message(), Some(b"abc".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_previous_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("tag.ndef");
        let emulator = TagEmulator::open_image(&path, DEFAULT_CAPACITY, false).unwrap();
        let tag = open_session(&emulator).await;
        // A file where the image directory should be makes the persist fail.
        std::fs::write(dir.path().join("sub"), b"not a directory").unwrap();

        let result = emulator.write_ndef_message(&tag, b"abc").await;

        assert!(matches!(result, Err(HardwareError::Other(_))));
        assert_eq!(emulator.message(), None);
        assert_eq!(emulator.stats().writes, 0);
    }

    #[test]
    fn test_missing_image_is_blank() {
        let dir = tempfile::tempdir().unwrap();
        let emulator =
            TagEmulator::open_image(dir.path().join("absent.ndef"), DEFAULT_CAPACITY, false)
                .unwrap();
        assert_eq!(emulator.message(), None);
    }

    #[test]
    fn test_empty_image_is_blank() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let emulator = TagEmulator::open_image(file.path(), DEFAULT_CAPACITY, false).unwrap();
        assert_eq!(emulator.message(), None);
    }
}
