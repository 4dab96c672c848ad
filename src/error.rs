// Romcomp - A resource compiler for banked cartridge ROM images
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Error types for the resource compiler.
//!
//! Fatal failures are [`RomError`] values carrying a stable [`ErrorCode`].
//! Recoverable findings made while decoding (truncated streams, unknown
//! character codes) are [`Diagnostic`]s: the decoder keeps going and hands
//! them back next to whatever it managed to decode.

use thiserror::Error;

/// Error codes for the resource compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Codec errors (E001-E009)
    DecodeTruncated,
    UnrecognizedCode,
    ContentKindMismatch,
    InvalidEscape,
    ContentTooLarge,

    // Address space errors (E100-E109)
    InvalidAddress,
    InvalidImage,

    // Compaction errors (E200-E209)
    CompactionOutOfSpace,
    RegionOverlap,
    UnknownRegion,
    InvalidRegion,
    EncodeFailed,

    // Layout and edits errors (E300-E309)
    InvalidLayout,
    UnknownPreset,
    UnknownTable,
    InvalidEdit,

    // I/O (E400)
    Io,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::DecodeTruncated => "E001",
            ErrorCode::UnrecognizedCode => "E002",
            ErrorCode::ContentKindMismatch => "E003",
            ErrorCode::InvalidEscape => "E004",
            ErrorCode::ContentTooLarge => "E005",

            ErrorCode::InvalidAddress => "E100",
            ErrorCode::InvalidImage => "E101",

            ErrorCode::CompactionOutOfSpace => "E200",
            ErrorCode::RegionOverlap => "E201",
            ErrorCode::UnknownRegion => "E202",
            ErrorCode::InvalidRegion => "E203",
            ErrorCode::EncodeFailed => "E204",

            ErrorCode::InvalidLayout => "E300",
            ErrorCode::UnknownPreset => "E301",
            ErrorCode::UnknownTable => "E302",
            ErrorCode::InvalidEdit => "E303",

            ErrorCode::Io => "E400",
        }
    }
}

/// A resource compiler error.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct RomError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Optional hint for fixing the error.
    pub hint: Option<String>,
}

impl RomError {
    /// Create a new error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
        }
    }

    /// Add a hint to this error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Get the error code string.
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }
}

impl From<std::io::Error> for RomError {
    fn from(error: std::io::Error) -> Self {
        RomError::new(ErrorCode::Io, error.to_string())
    }
}

/// Result type for resource compiler operations.
pub type Result<T> = std::result::Result<T, RomError>;

/// A non-fatal finding reported while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The diagnostic code.
    pub code: ErrorCode,
    /// Human readable description.
    pub message: String,
    /// Byte offset into the decoded stream, when known.
    pub offset: Option<usize>,
}

impl Diagnostic {
    /// Create a diagnostic without a position.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            offset: None,
        }
    }

    /// Attach the stream offset the diagnostic refers to.
    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// A collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create a new empty collection.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add a diagnostic and log it as a warning.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}", format_diagnostic(&diagnostic));
        self.items.push(diagnostic);
    }

    /// Move diagnostics over, prefixing each message with `context`.
    pub fn extend_with_context(&mut self, other: Diagnostics, context: &str) {
        self.items.extend(other.items.into_iter().map(|mut d| {
            d.message = format!("{}: {}", context, d.message);
            d
        }));
    }

    /// Check whether a diagnostic with the given code was recorded.
    pub fn contains(&self, code: ErrorCode) -> bool {
        self.items.iter().any(|d| d.code == code)
    }

    /// Get the number of diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get an iterator over the diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Format an error for terminal output.
pub fn format_error(error: &RomError) -> String {
    let mut output = format!("error[{}]: {}\n", error.code_str(), error.message);
    if let Some(hint) = &error.hint {
        output.push_str(&format!("  = hint: {}\n", hint));
    }
    output
}

/// Format a diagnostic for terminal output.
pub fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    match diagnostic.offset {
        Some(offset) => format!(
            "warning[{}]: {} (at byte {})",
            diagnostic.code.code(),
            diagnostic.message,
            offset
        ),
        None => format!("warning[{}]: {}", diagnostic.code.code(), diagnostic.message),
    }
}
