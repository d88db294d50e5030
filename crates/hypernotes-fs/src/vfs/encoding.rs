//! Content encodings.
//!
//! Callers pass content as strings. `base64` strings carry binary-style
//! payloads and are decoded before storage; the text encodings store their
//! natural byte form. Each file record keeps the tag it was written with,
//! so reads render content the same way it arrived.

use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use strum::EnumString;

use super::error::{FsError, FsResult};

/// Encoding of caller-supplied content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Encoding {
    /// Binary-style payload, base64 encoded on the wire.
    Base64,
    #[strum(serialize = "utf8", serialize = "utf-8")]
    Utf8,
    Ascii,
    /// Little-endian UTF-16.
    #[strum(serialize = "utf16", serialize = "utf-16")]
    Utf16,
}

impl Encoding {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Base64 => "base64",
            Encoding::Utf8 => "utf8",
            Encoding::Ascii => "ascii",
            Encoding::Utf16 => "utf16",
        }
    }

    /// Returns true for the text encodings.
    pub fn is_text(&self) -> bool {
        !matches!(self, Encoding::Base64)
    }

    /// Whether stored bytes of `self` can have bytes of `other` appended
    /// without changing their interpretation.
    pub fn merges_with(&self, other: Encoding) -> bool {
        match (self, other) {
            (Encoding::Base64, Encoding::Base64) => true,
            (Encoding::Utf16, Encoding::Utf16) => true,
            (Encoding::Utf8 | Encoding::Ascii, Encoding::Utf8 | Encoding::Ascii) => true,
            _ => false,
        }
    }

    /// Tag for the concatenation of `self` and `other` bytes.
    pub fn merged(&self, other: Encoding) -> Encoding {
        match (self, other) {
            (Encoding::Ascii, Encoding::Ascii) => Encoding::Ascii,
            (Encoding::Ascii, Encoding::Utf8) | (Encoding::Utf8, Encoding::Ascii) => Encoding::Utf8,
            (this, _) => *this,
        }
    }

    /// Turn caller content into stored bytes.
    pub fn decode(&self, content: &str) -> FsResult<Vec<u8>> {
        match self {
            Encoding::Base64 => STANDARD
                .decode(content)
                .map_err(|e| FsError::invalid_encoding(format!("not valid base64 content: {}", e))),
            Encoding::Utf8 => Ok(content.as_bytes().to_vec()),
            Encoding::Ascii => {
                if content.is_ascii() {
                    Ok(content.as_bytes().to_vec())
                } else {
                    Err(FsError::invalid_encoding("content is not ASCII"))
                }
            }
            Encoding::Utf16 => Ok(content
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect()),
        }
    }

    /// Render stored bytes as caller content.
    pub fn encode(&self, bytes: &[u8]) -> FsResult<String> {
        match self {
            Encoding::Base64 => Ok(STANDARD.encode(bytes)),
            Encoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| FsError::invalid_encoding(format!("stored content is not UTF-8: {}", e))),
            Encoding::Ascii => {
                if bytes.is_ascii() {
                    Ok(String::from_utf8_lossy(bytes).into_owned())
                } else {
                    Err(FsError::invalid_encoding("stored content is not ASCII"))
                }
            }
            Encoding::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return Err(FsError::invalid_encoding(
                        "stored content has an odd number of UTF-16 bytes",
                    ));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units)
                    .map_err(|e| FsError::invalid_encoding(format!("stored content is not UTF-16: {}", e)))
            }
        }
    }

    /// Classify stored bytes that carry no tag.
    pub fn sniff(bytes: &[u8]) -> Encoding {
        if std::str::from_utf8(bytes).is_ok() {
            Encoding::Utf8
        } else {
            Encoding::Base64
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Round-trip test: decode then re-encode must reproduce `content`.
pub fn looks_like_base64(content: &str) -> bool {
    match STANDARD.decode(content) {
        Ok(bytes) => STANDARD.encode(bytes) == content,
        Err(_) => false,
    }
}
