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

//! Fixed-size records stored verbatim.

use super::{kind_mismatch, Codec, Content, Decoded};
use crate::error::{Diagnostic, Diagnostics, ErrorCode, Result, RomError};

/// Byte used to pad records shorter than their slot.
pub const PAD: u8 = 0xFF;

/// Stores bytes unchanged, optionally padded to a fixed record size.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw {
    size: Option<usize>,
}

impl Raw {
    /// Create a raw codec; `None` passes data through at its own length.
    pub fn new(size: Option<usize>) -> Self {
        Self { size }
    }
}

impl Codec for Raw {
    fn name(&self) -> &str {
        "raw"
    }

    fn encode(&self, content: &Content) -> Result<Vec<u8>> {
        let bytes = content
            .as_bytes()
            .ok_or_else(|| kind_mismatch(self.name(), "bytes", content))?;

        let Some(size) = self.size else {
            return Ok(bytes.to_vec());
        };
        if bytes.len() > size {
            return Err(RomError::new(
                ErrorCode::ContentTooLarge,
                format!("record is {} bytes, the slot holds {}", bytes.len(), size),
            ));
        }

        let mut out = bytes.to_vec();
        out.resize(size, PAD);
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Decoded {
        let mut diagnostics = Diagnostics::new();
        let size = self.size.unwrap_or(bytes.len());
        let available = size.min(bytes.len());

        if available < size {
            diagnostics.push(
                Diagnostic::new(
                    ErrorCode::DecodeTruncated,
                    format!("record needs {} bytes, {} available", size, available),
                )
                .at(available),
            );
        }

        Decoded {
            content: Content::Bytes(bytes[..available].to_vec()),
            consumed: available,
            diagnostics,
        }
    }
}
