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

//! Control-byte run-length codec.
//!
//! Stream format:
//!
//! | Control     | Action                                              |
//! |-------------|-----------------------------------------------------|
//! | `$00-$7F`   | read one byte, write it `control` times            |
//! | `$80`       | copy the next 256 bytes                            |
//! | `$81-$FE`   | copy the next `control - $80` bytes                |
//! | `$FF`       | end of stream                                      |
//!
//! The encoder never produces `$80`, but streams written by other tools may
//! use it, so the decoder accepts it.

use super::{kind_mismatch, Codec, Content, Decoded};
use crate::error::{Diagnostic, Diagnostics, ErrorCode, Result};

/// End of stream marker.
pub const TERMINATOR: u8 = 0xFF;

/// Longest run a single control byte can describe.
pub const MAX_RUN: usize = 0x7F;

/// Longest literal block a single control byte can describe, except `$80`.
pub const MAX_LITERAL: usize = 0xFE - 0x80;

/// The literal buffer is flushed before appending once it grows past this.
const LITERAL_FLUSH: usize = MAX_LITERAL - 2;

/// Control byte announcing a 256-byte literal block.
const LITERAL_256: u8 = 0x80;

fn flush_literals(literals: &mut Vec<u8>, out: &mut Vec<u8>) {
    if literals.is_empty() {
        return;
    }
    out.push(0x80 + literals.len() as u8);
    out.append(literals);
}

/// Compress `data`. The result always ends with [`TERMINATOR`].
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_LITERAL + 2);
    let mut literals: Vec<u8> = Vec::with_capacity(MAX_LITERAL);

    let mut i = 0;
    while i < data.len() {
        let value = data[i];
        let start = i;
        while i < data.len() && data[i] == value {
            i += 1;
        }
        let mut count = i - start;

        if count > 2 {
            flush_literals(&mut literals, &mut out);
            while count > 0 {
                let chunk = count.min(MAX_RUN);
                out.push(chunk as u8);
                out.push(value);
                count -= chunk;
            }
        } else {
            if literals.len() > LITERAL_FLUSH {
                flush_literals(&mut literals, &mut out);
            }
            literals.extend_from_slice(&data[start..i]);
        }
    }

    flush_literals(&mut literals, &mut out);
    out.push(TERMINATOR);
    out
}

/// Decompress a stream, stopping at the terminator.
///
/// A stream that runs out of input first is returned as far as it got, with
/// a `DecodeTruncated` diagnostic.
pub fn decode(data: &[u8]) -> Decoded {
    let mut out = Vec::new();
    let mut diagnostics = Diagnostics::new();
    let mut i = 0;

    loop {
        let Some(&control) = data.get(i) else {
            diagnostics.push(
                Diagnostic::new(ErrorCode::DecodeTruncated, "run-length stream has no terminator")
                    .at(i),
            );
            break;
        };
        i += 1;

        match control {
            TERMINATOR => break,
            0x00..=0x7F => {
                let Some(&value) = data.get(i) else {
                    diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::DecodeTruncated,
                            format!("run of {} is missing its value byte", control),
                        )
                        .at(i - 1),
                    );
                    break;
                };
                i += 1;
                log::trace!("run {} x ${:02X}", control, value);
                out.extend(std::iter::repeat(value).take(control as usize));
            }
            _ => {
                let count = if control == LITERAL_256 {
                    256
                } else {
                    (control - 0x80) as usize
                };
                let end = (i + count).min(data.len());
                log::trace!("literal block of {} bytes", count);
                out.extend_from_slice(&data[i..end]);
                if end - i < count {
                    diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::DecodeTruncated,
                            format!("literal block wants {} bytes, only {} left", count, end - i),
                        )
                        .at(i - 1),
                    );
                    i = end;
                    break;
                }
                i = end;
            }
        }
    }

    Decoded {
        content: Content::Bytes(out),
        consumed: i,
        diagnostics,
    }
}

/// [`Codec`] wrapper around [`encode`] and [`decode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunLength;

impl Codec for RunLength {
    fn name(&self) -> &str {
        "run-length"
    }

    fn encode(&self, content: &Content) -> Result<Vec<u8>> {
        match content {
            Content::Bytes(bytes) => Ok(encode(bytes)),
            other => Err(kind_mismatch(self.name(), "bytes", other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Decoded {
        decode(bytes)
    }
}
