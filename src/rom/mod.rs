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

//! Banked cartridge address space.
//!
//! The CPU sees cartridge ROM in two 16 KiB windows: `$8000-$BFFF` is bank
//! switched, `$C000-$FFFF` always shows the last PRG bank. Every resource is
//! addressed by a `(bank, offset)` pair where `offset` is the CPU address.

mod ines;

pub use ines::RomImage;

use crate::error::{ErrorCode, Result, RomError};
use std::fmt;

/// First CPU address mapped to cartridge ROM.
pub const WINDOW_START: u16 = 0x8000;

/// Last CPU address of the switchable window.
pub const SWITCHABLE_END: u16 = 0xBFFF;

/// First CPU address of the fixed window.
pub const FIXED_START: u16 = 0xC000;

/// Size of one PRG bank in bytes.
pub const BANK_SIZE: usize = 0x4000;

/// A location in cartridge ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub bank: u8,
    pub offset: u16,
}

impl Address {
    /// Create an address, rejecting offsets below the ROM window.
    pub fn new(bank: u8, offset: u16) -> Result<Self> {
        if offset < WINDOW_START {
            return Err(RomError::new(
                ErrorCode::InvalidAddress,
                format!("address {:02X}:{:04X} is outside the ROM window", bank, offset),
            )
            .with_hint("ROM addresses start at $8000"));
        }
        Ok(Self { bank, offset })
    }

    /// The address `len` bytes further on in the same bank.
    pub fn offset_by(self, len: usize) -> Result<Self> {
        let target = self.offset as usize + len;
        if target > u16::MAX as usize {
            return Err(RomError::new(
                ErrorCode::InvalidAddress,
                format!("{} + {} bytes runs past $FFFF", self, len),
            ));
        }
        Ok(Self {
            bank: self.bank,
            offset: target as u16,
        })
    }

    /// Whether the offset lies in the fixed `$C000-$FFFF` window.
    pub fn is_fixed_window(&self) -> bool {
        self.offset >= FIXED_START
    }

    /// Last CPU address of the window this address falls into.
    pub fn window_end(&self) -> u16 {
        if self.is_fixed_window() {
            u16::MAX
        } else {
            SWITCHABLE_END
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}:{:04X}", self.bank, self.offset)
    }
}

/// Byte-addressable banked storage.
///
/// Reads and writes never wrap around a window boundary; a range that would
/// do so is an `InvalidAddress` error.
pub trait AddressSpace {
    /// Read a single byte.
    fn read_byte(&self, addr: Address) -> Result<u8>;

    /// Read `len` consecutive bytes.
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>>;

    /// Write a single byte.
    fn write_byte(&mut self, addr: Address, value: u8) -> Result<()>;

    /// Write a run of bytes starting at `addr`.
    fn write_bytes(&mut self, addr: Address, bytes: &[u8]) -> Result<()>;

    /// Read a little-endian word.
    fn read_word(&self, addr: Address) -> Result<u16> {
        let bytes = self.read_bytes(addr, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Write a little-endian word.
    fn write_word(&mut self, addr: Address, value: u16) -> Result<()> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    /// Every byte from `addr` up to the end of its window.
    ///
    /// Compressed streams carry no length, so decoders are handed everything
    /// that could belong to them and report how much they consumed.
    fn read_to_window_end(&self, addr: Address) -> Result<Vec<u8>> {
        let len = (addr.window_end() - addr.offset) as usize + 1;
        self.read_bytes(addr, len)
    }
}
