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

//! Byte codecs for ROM resources.
//!
//! Every resource kind is stored in one of a small number of formats:
//! - [`rle`] - control-byte run-length compression for maps
//! - [`sixbit`] - dialogue packed four characters into three bytes
//! - [`tiletext`] - names and menus stored as pattern-table indices
//! - [`raw`] - fixed-size records stored verbatim
//!
//! They all implement [`Codec`], so the compactor never needs to know which
//! one it is driving. Stream lengths are implicit: decoders stop at their
//! terminator and report how many source bytes they used.

pub mod raw;
pub mod rle;
pub mod sixbit;
pub mod tiletext;

use crate::error::{Diagnostics, ErrorCode, Result, RomError};
use serde::{Deserialize, Serialize};

/// Decoded resource content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Content {
    /// Binary data such as map tiles or table records.
    Bytes(Vec<u8>),
    /// Display text.
    Text(String),
}

impl Content {
    /// The bytes, if this is binary content.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Content::Bytes(bytes) => Some(bytes),
            Content::Text(_) => None,
        }
    }

    /// The text, if this is text content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Bytes(_) => None,
        }
    }

    /// Short name of the content kind, for messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Content::Bytes(_) => "bytes",
            Content::Text(_) => "text",
        }
    }
}

/// The result of decoding one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// What was decoded, possibly partial.
    pub content: Content,
    /// Source bytes occupied by the stream, terminator included.
    pub consumed: usize,
    /// Problems met while decoding.
    pub diagnostics: Diagnostics,
}

/// A reversible resource encoding.
///
/// Decoding is best effort and never fails: damaged data still has to be
/// shown to the user, so problems are reported as diagnostics instead.
pub trait Codec {
    /// Human readable codec name.
    fn name(&self) -> &str;

    /// Encode content into its stored form.
    fn encode(&self, content: &Content) -> Result<Vec<u8>>;

    /// Decode a stored stream.
    fn decode(&self, bytes: &[u8]) -> Decoded;
}

/// Error for content handed to a codec that stores the other kind.
pub(crate) fn kind_mismatch(codec: &str, expected: &str, content: &Content) -> RomError {
    RomError::new(
        ErrorCode::ContentKindMismatch,
        format!(
            "{} codec stores {} but was given {}",
            codec,
            expected,
            content.kind()
        ),
    )
}

/// Codec selection as written in layout files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodecKind {
    RunLength,
    SixBitText,
    TileText,
    Raw {
        #[serde(default)]
        size: Option<usize>,
    },
}

impl CodecKind {
    /// Instantiate the codec with its standard configuration.
    pub fn build(&self) -> Box<dyn Codec> {
        match self {
            CodecKind::RunLength => Box::new(rle::RunLength),
            CodecKind::SixBitText => Box::new(sixbit::SixBitText::default()),
            CodecKind::TileText => Box::new(tiletext::TileText),
            CodecKind::Raw { size } => Box::new(raw::Raw::new(*size)),
        }
    }

    /// Kind of content the codec works on.
    pub fn is_text(&self) -> bool {
        matches!(self, CodecKind::SixBitText | CodecKind::TileText)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        codec: CodecKind,
    }

    #[test]
    fn test_codec_kind_from_toml() {
        let holder: Holder = toml::from_str(r#"codec = "six-bit-text""#).unwrap();
        assert_eq!(holder.codec, CodecKind::SixBitText);

        let holder: Holder = toml::from_str(r#"codec = { raw = { size = 256 } }"#).unwrap();
        assert_eq!(holder.codec, CodecKind::Raw { size: Some(256) });
    }

    #[test]
    fn test_build_names() {
        assert_eq!(CodecKind::RunLength.build().name(), "run-length");
        assert_eq!(CodecKind::SixBitText.build().name(), "six-bit-text");
        assert_eq!(CodecKind::TileText.build().name(), "tile-text");
        assert_eq!(CodecKind::Raw { size: None }.build().name(), "raw");
    }

    #[test]
    fn test_kind_mismatch() {
        let codec = CodecKind::RunLength.build();
        let err = codec.encode(&Content::Text("HELLO".into())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ContentKindMismatch);
    }

    #[test]
    fn test_content_accessors() {
        let text = Content::Text("HI".into());
        assert_eq!(text.as_text(), Some("HI"));
        assert_eq!(text.as_bytes(), None);
        assert_eq!(Content::Bytes(vec![1]).as_bytes(), Some(&[1u8][..]));
    }
}
