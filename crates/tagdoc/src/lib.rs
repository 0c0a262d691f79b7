//! `tagdoc` - A small labelled document stored on an NFC tag
//!
//! This library reads and writes a flat JSON object carried in a single NDEF
//! text record, merges updates into it, and protects it with an optional
//! password lock. All tag access goes through a radio session that is always
//! released, whatever the operation does.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod document;
pub mod emulator;
pub mod error;
pub mod facade;
pub mod hardware;
pub mod logging;
pub mod ndef;
pub mod session;
pub mod store;

pub use codec::DecodeError;
pub use config::Config;
pub use document::TagDocument;
pub use emulator::{EmulatedTag, TagEmulator};
pub use error::{Error, Result, SessionError, WriteError};
pub use facade::{OperationFacade, Outcome};
pub use hardware::{NfcHardware, TagHandle, Technology};
pub use logging::init_logging;
pub use ndef::LanguageCode;
pub use session::{Session, SessionManager};
pub use store::{RawTag, TagDocumentStore, UnlockResult};
