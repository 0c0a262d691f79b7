//! NDEF record framing.
//!
//! Only what a single text record needs: one record per message, well-known
//! type `T`, short or long payload length. Chunked records are rejected.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::codec::DecodeError;

/// TNF value for NFC Forum well-known types.
pub const TNF_WELL_KNOWN: u8 = 0x01;

/// Record type of a text record.
pub const RTD_TEXT: &[u8] = b"T";

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

const STATUS_UTF16: u8 = 0x80;
const STATUS_LANG_LEN_MASK: u8 = 0x3f;

/// Longest language code the status byte can describe.
pub const MAX_LANGUAGE_LEN: usize = STATUS_LANG_LEN_MASK as usize;

/// A language code that is rejected by the text record format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid language code '{code}': expected 1-63 ASCII letters, digits or '-'")]
pub struct InvalidLanguageCode {
    /// The rejected code.
    pub code: String,
}

/// The IANA language code carried in front of the text of a text record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageCode {
    code: String,
    len: u8,
}

impl LanguageCode {
    /// Validate a language code such as `en` or `en-US`.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is empty, too long for the status byte, or
    /// contains anything but ASCII alphanumerics and `-`.
    pub fn parse(code: &str) -> Result<Self, InvalidLanguageCode> {
        let valid_chars = code.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
        match u8::try_from(code.len()) {
            Ok(len) if valid_chars && len > 0 && len <= STATUS_LANG_LEN_MASK => Ok(Self {
                code: code.to_string(),
                len,
            }),
            _ => Err(InvalidLanguageCode {
                code: code.to_string(),
            }),
        }
    }

    /// The code as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.code
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        Self {
            code: "en".to_string(),
            len: 2,
        }
    }
}

impl FromStr for LanguageCode {
    type Err = InvalidLanguageCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// The decoded contents of a text record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    /// Language code from the record prefix.
    pub language: String,
    /// The record text.
    pub text: String,
}

/// A single NDEF record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    tnf: u8,
    record_type: Vec<u8>,
    id: Vec<u8>,
    payload: Vec<u8>,
}

impl NdefRecord {
    /// Build a UTF-8 text record.
    #[must_use]
    pub fn text(language: &LanguageCode, text: &str) -> Self {
        let mut payload = Vec::with_capacity(1 + language.code.len() + text.len());
        payload.push(language.len);
        payload.extend_from_slice(language.code.as_bytes());
        payload.extend_from_slice(text.as_bytes());
        Self {
            tnf: TNF_WELL_KNOWN,
            record_type: RTD_TEXT.to_vec(),
            id: Vec::new(),
            payload,
        }
    }

    /// The type name format.
    #[must_use]
    pub fn tnf(&self) -> u8 {
        self.tnf
    }

    /// The record type.
    #[must_use]
    pub fn record_type(&self) -> &[u8] {
        &self.record_type
    }

    /// The record payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Check if this is a well-known text record.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.tnf == TNF_WELL_KNOWN && self.record_type == RTD_TEXT
    }

    /// Encode this record as a complete single-record message.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_message_bytes(&self) -> Vec<u8> {
        let short = self.payload.len() <= usize::from(u8::MAX);
        let mut header = FLAG_MB | FLAG_ME | (self.tnf & TNF_MASK);
        if short {
            header |= FLAG_SR;
        }
        if !self.id.is_empty() {
            header |= FLAG_IL;
        }

        let mut out =
            Vec::with_capacity(7 + self.record_type.len() + self.id.len() + self.payload.len());
        out.push(header);
        // type and id lengths were read from a single byte or are the one-byte text type
        out.push(self.record_type.len() as u8);
        if short {
            out.push(self.payload.len() as u8);
        } else {
            out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        }
        if !self.id.is_empty() {
            out.push(self.id.len() as u8);
        }
        out.extend_from_slice(&self.record_type);
        out.extend_from_slice(&self.id);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse the first record of a message. Trailing records are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is empty, truncated or chunked.
    pub fn parse_first(message: &[u8]) -> Result<Self, DecodeError> {
        if message.is_empty() {
            return Err(DecodeError::EmptyMessage);
        }

        let mut reader = Reader::new(message);
        let header = reader.byte()?;
        if header & FLAG_CF != 0 {
            return Err(DecodeError::Chunked);
        }

        let type_len = usize::from(reader.byte()?);
        let payload_len = if header & FLAG_SR == 0 {
            let raw = reader.take(4)?;
            let len = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
            usize::try_from(len).unwrap_or(usize::MAX)
        } else {
            usize::from(reader.byte()?)
        };
        let id_len = if header & FLAG_IL == 0 {
            0
        } else {
            usize::from(reader.byte()?)
        };

        let record_type = reader.take(type_len)?.to_vec();
        let id = reader.take(id_len)?.to_vec();
        let payload = reader.take(payload_len)?.to_vec();

        Ok(Self {
            tnf: header & TNF_MASK,
            record_type,
            id,
            payload,
        })
    }

    /// Decode the payload of a text record.
    ///
    /// The language-code length is taken from the status byte, so records
    /// written with any language code decode correctly.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a text record or its payload is malformed.
    pub fn to_text(&self) -> Result<TextRecord, DecodeError> {
        if !self.is_text() {
            return Err(DecodeError::NotText {
                tnf: self.tnf,
                record_type: String::from_utf8_lossy(&self.record_type).into_owned(),
            });
        }

        let mut reader = Reader::new(&self.payload);
        let status = reader.byte()?;
        let lang_len = usize::from(status & STATUS_LANG_LEN_MASK);
        let language = String::from_utf8_lossy(reader.take(lang_len)?).into_owned();
        let body = reader.rest();

        let text = if status & STATUS_UTF16 == 0 {
            String::from_utf8(body.to_vec())
                .map_err(|e| DecodeError::InvalidText(e.to_string()))?
        } else {
            decode_utf16(body)?
        };

        Ok(TextRecord { language, text })
    }
}

/// Decode UTF-16 text, honouring a byte order mark and defaulting to big-endian.
fn decode_utf16(bytes: &[u8]) -> Result<String, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::InvalidText(
            "UTF-16 text has an odd number of bytes".to_string(),
        ));
    }
    let (little_endian, body) = match bytes {
        [0xff, 0xfe, rest @ ..] => (true, rest),
        [0xfe, 0xff, rest @ ..] => (false, rest),
        _ => (false, bytes),
    };
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|e| DecodeError::InvalidText(e.to_string()))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::Truncated {
                offset: self.pos,
                needed: n,
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        slice
    }
}
