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

//! Six-bit packed dialogue text.
//!
//! Every character is a 6-bit code, and four codes share three bytes:
//!
//! ```text
//! b0 = c0 << 2 | c1 >> 4
//! b1 = c1 << 4 | c2 >> 2
//! b2 = c2 << 6 | c3
//! ```
//!
//! Code `$3F` ends a string. Packing stops at the first byte that holds
//! terminator bits, so a string never occupies more bytes than it needs.

use super::{kind_mismatch, Codec, Content, Decoded};
use crate::error::{Diagnostic, Diagnostics, ErrorCode, Result};
use std::collections::HashMap;

/// Code ending a packed string.
pub const TERMINATOR_CODE: u8 = 0x3F;

/// Character used for the terminator in editable text.
pub const TERMINATOR_CHAR: char = '~';

/// Shown in place of codes with no character.
pub const PLACEHOLDER: &str = "[?]";

/// Code used for characters the table does not know (`?`).
const FALLBACK_CODE: u8 = 0x1B;

/// Punctuation and control markers shared by both directions.
const SYMBOLS: &[(char, u8)] = &[
    ('!', 0x1A),
    ('?', 0x1B),
    ('.', 0x1C),
    (',', 0x1D),
    ('-', 0x1E),
    ('"', 0x1F),
    ('`', 0x2C),
    (' ', 0x2D),
    (':', 0x2E),
    ('@', 0x30), // party member name
    ('%', 0x31), // enemy name
    ('#', 0x32), // numeric value
    ('&', 0x34), // next string is a new dialogue
    ('^', 0x35), // yes/no prompt
    ('$', 0x38), // grant the PRAY command
    ('*', 0x39), // grant the BRIBE command
    ('\n', 0x3E),
    (TERMINATOR_CHAR, TERMINATOR_CODE),
];

/// Characters accepted when packing that never come back out.
const ENCODE_ALIASES: &[(char, u8)] = &[('\'', 0x2C), ('\r', 0x3E), ('\x07', 0x3E)];

/// Codes that decode to a character but are never produced when packing.
const DECODE_ALIASES: &[(u8, char)] = &[(0x2B, '-')];

/// Mapping between characters and 6-bit codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharTable {
    to_code: HashMap<char, u8>,
    to_char: [Option<char>; 64],
    fallback: u8,
}

impl CharTable {
    /// The table used by the game's dialogue.
    pub fn standard() -> Self {
        let mut to_code = HashMap::new();
        let mut to_char = [None; 64];

        for (i, c) in ('A'..='Z').enumerate() {
            to_code.insert(c, i as u8);
            to_char[i] = Some(c);
        }
        for (i, c) in ('0'..='9').enumerate() {
            to_code.insert(c, 0x20 + i as u8);
            to_char[0x20 + i] = Some(c);
        }
        for &(c, code) in SYMBOLS {
            to_code.insert(c, code);
            to_char[code as usize] = Some(c);
        }
        for &(c, code) in ENCODE_ALIASES {
            to_code.insert(c, code);
        }
        for &(code, c) in DECODE_ALIASES {
            to_char[code as usize] = Some(c);
        }

        Self {
            to_code,
            to_char,
            fallback: FALLBACK_CODE,
        }
    }

    /// Code for a character; unknown characters become `?`.
    pub fn code_of(&self, c: char) -> u8 {
        self.to_code.get(&c).copied().unwrap_or(self.fallback)
    }

    /// Character for a code, if it has one.
    pub fn char_of(&self, code: u8) -> Option<char> {
        self.to_char.get(code as usize).copied().flatten()
    }
}

impl Default for CharTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Pack text into six-bit form.
///
/// Text is upper-cased first. A short tail quartet is padded with the
/// terminator code; text whose length is a multiple of four and has no `~`
/// is packed without one.
pub fn pack(text: &str, table: &CharTable) -> Vec<u8> {
    let codes: Vec<u8> = text.to_uppercase().chars().map(|c| table.code_of(c)).collect();

    let mut out = Vec::with_capacity(codes.len() * 3 / 4 + 3);
    for quartet in codes.chunks(4) {
        let mut c = [TERMINATOR_CODE; 4];
        c[..quartet.len()].copy_from_slice(quartet);

        out.push((c[0] << 2) | (c[1] >> 4));
        if c[0] == TERMINATOR_CODE {
            break;
        }
        out.push((c[1] << 4) | (c[2] >> 2));
        if c[1] == TERMINATOR_CODE {
            break;
        }
        out.push((c[2] << 6) | c[3]);
        if c[2] == TERMINATOR_CODE || c[3] == TERMINATOR_CODE {
            break;
        }
    }
    out
}

/// Unpack six-bit text, stopping after the first terminator.
///
/// The terminator itself is kept as `~`. Codes without a character are
/// replaced by [`PLACEHOLDER`] and reported.
pub fn unpack(bytes: &[u8], table: &CharTable) -> Decoded {
    let mut text = String::new();
    let mut diagnostics = Diagnostics::new();
    let mut consumed = 0;

    'triplets: for (n, triplet) in bytes.chunks(3).enumerate() {
        let b = [
            triplet[0],
            triplet.get(1).copied().unwrap_or(0),
            triplet.get(2).copied().unwrap_or(0),
        ];
        let codes = [
            (b[0] >> 2) & 0x3F,
            ((b[0] & 0x03) << 4) | (b[1] >> 4),
            ((b[1] & 0x0F) << 2) | (b[2] >> 6),
            b[2] & 0x3F,
        ];
        // Bytes needed to hold each code completely.
        let needed = [1, 2, 3, 3];

        for (i, &code) in codes.iter().enumerate() {
            if needed[i] > triplet.len() {
                break 'triplets;
            }
            consumed = n * 3 + needed[i];

            match table.char_of(code) {
                Some(c) => text.push(c),
                None => {
                    diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::UnrecognizedCode,
                            format!("unrecognised character code ${:02X}", code),
                        )
                        .at(consumed - 1),
                    );
                    text.push_str(PLACEHOLDER);
                }
            }

            if code == TERMINATOR_CODE {
                return Decoded {
                    content: Content::Text(text),
                    consumed,
                    diagnostics,
                };
            }
        }
    }

    diagnostics.push(
        Diagnostic::new(ErrorCode::DecodeTruncated, "packed text has no terminator").at(consumed),
    );
    Decoded {
        content: Content::Text(text),
        consumed,
        diagnostics,
    }
}

/// [`Codec`] for six-bit text with a configurable table.
#[derive(Debug, Clone, Default)]
pub struct SixBitText {
    pub table: CharTable,
}

impl SixBitText {
    pub fn new(table: CharTable) -> Self {
        Self { table }
    }
}

impl Codec for SixBitText {
    fn name(&self) -> &str {
        "six-bit-text"
    }

    fn encode(&self, content: &Content) -> Result<Vec<u8>> {
        match content {
            Content::Text(text) => Ok(pack(text, &self.table)),
            other => Err(kind_mismatch(self.name(), "text", other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Decoded {
        unpack(bytes, &self.table)
    }
}
