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

//! Name-table text.
//!
//! Names, menus and short messages are stored uncompressed as the pattern
//! indices that draw them, one byte per character, ended by `$FF`. Bytes
//! that have no printable character are written as `\xNN` escapes so they
//! survive a round trip through an editor.

use super::{kind_mismatch, Codec, Content, Decoded};
use crate::error::{format_diagnostic, Diagnostic, Diagnostics, ErrorCode, Result};
use std::fmt::Write as _;

/// End of string marker.
pub const TERMINATOR: u8 = 0xFF;

/// Line break marker.
pub const LINE_BREAK: u8 = 0xFD;

const DIGIT_BASE: u8 = 0x38;
const LETTER_BASE: u8 = 0x8A;

const SYMBOLS: &[(char, u8)] = &[
    (' ', 0x00),
    ('+', 0x01),
    ('-', 0x02),
    (':', 0x03),
    ('\'', 0x04),
    ('"', 0x05),
    ('*', 0x09),
    (',', 0x42),
    ('.', 0x43),
    ('!', 0x7C),
    ('?', 0x7D),
    ('©', 0x88),
    ('…', 0x89),
    ('\n', LINE_BREAK),
    ('~', TERMINATOR),
];

/// Pattern index of a character, `None` for characters with no tile.
fn tile_of(c: char) -> Option<u8> {
    match c {
        '0'..='9' => Some(DIGIT_BASE + (c as u8 - b'0')),
        'A'..='Z' => Some(LETTER_BASE + (c as u8 - b'A')),
        '\r' | '\x07' => Some(LINE_BREAK),
        _ => SYMBOLS.iter().find(|(s, _)| *s == c).map(|&(_, t)| t),
    }
}

/// Printable character of a pattern index.
fn char_of(tile: u8) -> Option<char> {
    match tile {
        0x38..=0x41 => Some((b'0' + tile - DIGIT_BASE) as char),
        0x8A..=0xA3 => Some((b'A' + tile - LETTER_BASE) as char),
        _ => SYMBOLS.iter().find(|(_, t)| *t == tile).map(|&(c, _)| c),
    }
}

fn warn_escape(text: &str, at: usize) {
    let diagnostic = Diagnostic::new(
        ErrorCode::InvalidEscape,
        format!("malformed escape sequence in \"{}\"", text),
    )
    .at(at);
    log::warn!("{}", format_diagnostic(&diagnostic));
}

/// Convert text to pattern indices, terminator included.
pub fn encode_text(text: &str) -> Vec<u8> {
    let chars: Vec<char> = text.to_uppercase().chars().collect();
    let mut out = Vec::with_capacity(chars.len() + 1);

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            if chars.get(i + 1) != Some(&'X') {
                out.push(0x00);
                i += 1;
                continue;
            }
            let digits: String = chars.iter().skip(i + 2).take(2).collect();
            let valid = digits.len() == 2 && digits.chars().all(|d| d.is_ascii_hexdigit());
            match u8::from_str_radix(&digits, 16) {
                Ok(value) if valid => {
                    out.push(value);
                    i += 4;
                }
                _ => {
                    warn_escape(text, i);
                    i += 2;
                }
            }
            continue;
        }

        out.push(tile_of(c).unwrap_or(0x00));
        i += 1;
    }

    if out.last() != Some(&TERMINATOR) {
        out.push(TERMINATOR);
    }
    out
}

/// Convert pattern indices back to text, stopping at the terminator.
pub fn decode_text(bytes: &[u8]) -> Decoded {
    let mut text = String::new();
    let mut diagnostics = Diagnostics::new();

    let end = bytes.iter().position(|&b| b == TERMINATOR);
    let body = &bytes[..end.unwrap_or(bytes.len())];

    for &tile in body {
        match char_of(tile) {
            Some(c) => text.push(c),
            None => {
                let _ = write!(text, "\\x{:02X}", tile);
            }
        }
    }

    let consumed = match end {
        Some(at) => at + 1,
        None => {
            diagnostics.push(
                Diagnostic::new(ErrorCode::DecodeTruncated, "name-table text has no terminator")
                    .at(bytes.len()),
            );
            bytes.len()
        }
    };

    Decoded {
        content: Content::Text(text),
        consumed,
        diagnostics,
    }
}

/// [`Codec`] for name-table text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileText;

impl Codec for TileText {
    fn name(&self) -> &str {
        "tile-text"
    }

    fn encode(&self, content: &Content) -> Result<Vec<u8>> {
        match content {
            Content::Text(text) => Ok(encode_text(text)),
            other => Err(kind_mismatch(self.name(), "text", other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Decoded {
        decode_text(bytes)
    }
}
