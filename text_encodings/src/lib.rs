//! # Text Encodings
//!
//! Character-set handling for document loading and saving.
//!
//! ## Philosophy
//!
//! - **Strict first**: A candidate encoding only wins a load if it decodes
//!   every byte without substitution
//! - **Fallback is visible**: Lossy decoding reports that it substituted
//! - **Unrepresentable text is an error**: Saving never silently drops
//!   characters unless the caller asks for it
//!
//! ## Example
//!
//! ```ignore
//! let latin = Encoding::for_charset("ISO-8859-15").unwrap();
//! assert!(decode_strict(b"caf\xE9", Encoding::utf8()).is_none());
//! assert_eq!(decode_strict(b"caf\xE9", latin).unwrap(), "café");
//! ```

use encoding_rs::{EncoderResult, UTF_16BE, UTF_16LE};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// A character encoding
///
/// Wraps an `encoding_rs` encoding; equality is by identity of the
/// underlying table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Encoding(&'static encoding_rs::Encoding);

impl Encoding {
    pub fn utf8() -> Self {
        Self(encoding_rs::UTF_8)
    }

    pub fn utf16le() -> Self {
        Self(UTF_16LE)
    }

    pub fn utf16be() -> Self {
        Self(UTF_16BE)
    }

    pub fn iso_8859_15() -> Self {
        Self(encoding_rs::ISO_8859_15)
    }

    pub fn windows_1252() -> Self {
        Self(encoding_rs::WINDOWS_1252)
    }

    pub fn shift_jis() -> Self {
        Self(encoding_rs::SHIFT_JIS)
    }

    /// Looks up an encoding by charset name or alias
    ///
    /// Labels are resolved per the WHATWG table, so `ISO-8859-1`
    /// resolves to windows-1252.
    pub fn for_charset(label: &str) -> Option<Self> {
        encoding_rs::Encoding::for_label(label.trim().as_bytes()).map(Self)
    }

    /// Returns the canonical charset name
    pub fn charset(&self) -> &'static str {
        self.0.name()
    }

    /// Returns a human-readable name for menus and notifications
    pub fn display_name(&self) -> String {
        let family = match self.charset() {
            "UTF-8" | "UTF-16LE" | "UTF-16BE" => "Unicode",
            "ISO-8859-15" | "windows-1252" => "Western",
            "ISO-8859-2" | "windows-1250" => "Central European",
            "ISO-8859-5" | "KOI8-R" | "windows-1251" => "Cyrillic",
            "ISO-8859-7" | "windows-1253" => "Greek",
            "Shift_JIS" | "EUC-JP" | "ISO-2022-JP" => "Japanese",
            "GBK" | "gb18030" => "Chinese Simplified",
            "Big5" => "Chinese Traditional",
            "EUC-KR" => "Korean",
            _ => return self.charset().to_string(),
        };
        format!("{} ({})", family, self.charset())
    }

    pub fn is_utf8(&self) -> bool {
        self.0 == encoding_rs::UTF_8
    }

    /// Encodings offered when the user picks one by hand
    pub fn common() -> Vec<Encoding> {
        [
            "UTF-8",
            "UTF-16LE",
            "UTF-16BE",
            "ISO-8859-15",
            "windows-1252",
            "ISO-8859-2",
            "windows-1251",
            "KOI8-R",
            "Shift_JIS",
            "EUC-JP",
            "GBK",
            "Big5",
            "EUC-KR",
        ]
        .iter()
        .filter_map(|label| Encoding::for_charset(label))
        .collect()
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Self::utf8()
    }
}

impl fmt::Debug for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Encoding({})", self.charset())
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.charset())
    }
}

impl Serialize for Encoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.charset())
    }
}

impl<'de> Deserialize<'de> for Encoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Encoding::for_charset(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown charset: {}", label)))
    }
}

/// Result of a lossy decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossyText {
    pub text: String,
    /// True if malformed input was replaced with U+FFFD
    pub had_errors: bool,
}

/// Error produced when text cannot be represented in the target encoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("character {character:?} at byte {offset} cannot be represented in {encoding}")]
pub struct UnmappableCharacter {
    pub character: char,
    /// Byte offset into the UTF-8 source text
    pub offset: usize,
    pub encoding: Encoding,
}

fn strip_bom(bytes: &[u8], encoding: Encoding) -> &[u8] {
    match encoding_rs::Encoding::for_bom(bytes) {
        Some((bom_encoding, len)) if bom_encoding == encoding.0 => &bytes[len..],
        _ => bytes,
    }
}

/// Decodes `bytes`, failing on any malformed sequence
///
/// A leading byte-order mark matching `encoding` is skipped.
pub fn decode_strict(bytes: &[u8], encoding: Encoding) -> Option<String> {
    let bytes = strip_bom(bytes, encoding);
    encoding
        .0
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// Decodes `bytes`, replacing malformed sequences with U+FFFD
pub fn decode_lossy(bytes: &[u8], encoding: Encoding) -> LossyText {
    let bytes = strip_bom(bytes, encoding);
    let (text, had_errors) = encoding.0.decode_without_bom_handling(bytes);
    LossyText {
        text: text.into_owned(),
        had_errors,
    }
}

/// Encodes `text`, failing at the first unrepresentable character
pub fn encode_strict(text: &str, encoding: Encoding) -> Result<Vec<u8>, UnmappableCharacter> {
    encode(text, encoding, false)
}

/// Encodes `text`, writing `?` for unrepresentable characters
pub fn encode_lossy(text: &str, encoding: Encoding) -> Vec<u8> {
    // Replacement never fails.
    encode(text, encoding, true).unwrap_or_default()
}

fn encode(text: &str, encoding: Encoding, replace: bool) -> Result<Vec<u8>, UnmappableCharacter> {
    if encoding.is_utf8() {
        return Ok(text.as_bytes().to_vec());
    }

    // encoding_rs only decodes UTF-16; its encoder emits UTF-8 for these.
    if encoding.0 == UTF_16LE {
        return Ok(text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect());
    }
    if encoding.0 == UTF_16BE {
        return Ok(text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect());
    }

    let mut encoder = encoding.0.new_encoder();
    let mut out = Vec::with_capacity(
        encoder
            .max_buffer_length_from_utf8_without_replacement(text.len())
            .unwrap_or(text.len() * 4),
    );
    let mut consumed = 0;

    loop {
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(&text[consumed..], &mut out, true);
        consumed += read;
        match result {
            EncoderResult::InputEmpty => return Ok(out),
            EncoderResult::OutputFull => {
                let remaining = text.len() - consumed;
                out.reserve(
                    encoder
                        .max_buffer_length_from_utf8_without_replacement(remaining)
                        .unwrap_or(remaining * 4)
                        .max(16),
                );
            }
            EncoderResult::Unmappable(character) => {
                if !replace {
                    return Err(UnmappableCharacter {
                        character,
                        offset: consumed - character.len_utf8(),
                        encoding,
                    });
                }
                out.push(b'?');
            }
        }
    }
}
