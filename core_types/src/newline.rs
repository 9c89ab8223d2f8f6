//! Line terminator conventions

use serde::{Deserialize, Serialize};
use std::fmt;

/// The line terminator a document uses on disk
///
/// Document text is always held with `\n`; the convention is re-applied
/// when the document is written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NewlineType {
    #[default]
    Lf,
    Cr,
    CrLf,
}

impl NewlineType {
    /// Returns the terminator bytes as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            NewlineType::Lf => "\n",
            NewlineType::Cr => "\r",
            NewlineType::CrLf => "\r\n",
        }
    }

    /// Detects the convention from the first terminator in `text`
    ///
    /// Text without any terminator is treated as LF.
    pub fn detect(text: &str) -> Self {
        let bytes = text.as_bytes();
        for (i, b) in bytes.iter().enumerate() {
            match b {
                b'\n' => return NewlineType::Lf,
                b'\r' => {
                    return if bytes.get(i + 1) == Some(&b'\n') {
                        NewlineType::CrLf
                    } else {
                        NewlineType::Cr
                    }
                }
                _ => {}
            }
        }
        NewlineType::Lf
    }

    /// Converts any terminators in `text` to `\n`
    pub fn normalize(text: &str) -> String {
        if !text.contains('\r') {
            return text.to_string();
        }
        text.replace("\r\n", "\n").replace('\r', "\n")
    }

    /// Converts `\n` terminators in `text` to this convention
    pub fn apply(&self, text: &str) -> String {
        match self {
            NewlineType::Lf => text.to_string(),
            other => text.replace('\n', other.as_str()),
        }
    }
}

impl fmt::Display for NewlineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NewlineType::Lf => "LF",
            NewlineType::Cr => "CR",
            NewlineType::CrLf => "CRLF",
        };
        write!(f, "{}", name)
    }
}
