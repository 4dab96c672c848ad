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

//! iNES cartridge image.
//!
//! Layout of the file:
//! - 16-byte header (`NES\x1A`, PRG bank count at byte 4, flags at byte 6)
//! - optional 512-byte trainer (flag bit 2)
//! - PRG ROM in 16 KiB banks, followed by whatever CHR data the image carries

use super::{Address, AddressSpace, BANK_SIZE, FIXED_START, WINDOW_START};
use crate::error::{ErrorCode, Result, RomError};
use std::path::Path;

/// Size of the iNES header.
pub const HEADER_SIZE: usize = 16;

/// Size of the optional trainer block.
pub const TRAINER_SIZE: usize = 512;

const MAGIC: &[u8; 4] = b"NES\x1A";

const FLAG_TRAINER: u8 = 0x04;

/// A cartridge image held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomImage {
    data: Vec<u8>,
    prg_banks: usize,
    prg_start: usize,
}

impl RomImage {
    /// Parse an image from raw file contents.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.len() < HEADER_SIZE || &data[0..4] != MAGIC {
            return Err(RomError::new(ErrorCode::InvalidImage, "missing iNES header")
                .with_hint("the file must start with \"NES\" followed by $1A"));
        }

        let prg_banks = data[4] as usize;
        if prg_banks == 0 {
            return Err(RomError::new(
                ErrorCode::InvalidImage,
                "header declares no PRG banks",
            ));
        }

        let prg_start = if data[6] & FLAG_TRAINER != 0 {
            HEADER_SIZE + TRAINER_SIZE
        } else {
            HEADER_SIZE
        };

        let required = prg_start + prg_banks * BANK_SIZE;
        if data.len() < required {
            return Err(RomError::new(
                ErrorCode::InvalidImage,
                format!(
                    "image is {} bytes but {} PRG banks need {}",
                    data.len(),
                    prg_banks,
                    required
                ),
            ));
        }

        Ok(Self {
            data,
            prg_banks,
            prg_start,
        })
    }

    /// Load an image from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            RomError::new(
                ErrorCode::Io,
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;
        log::debug!("loaded {} ({} bytes)", path.display(), data.len());
        Self::from_bytes(data)
    }

    /// Write the image to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.data).map_err(|e| {
            RomError::new(
                ErrorCode::Io,
                format!("cannot write {}: {}", path.display(), e),
            )
        })
    }

    /// Create an image with `prg_banks` empty banks filled with `$FF`.
    pub fn blank(prg_banks: u8) -> Self {
        let banks = prg_banks.max(1) as usize;
        let mut data = vec![0u8; HEADER_SIZE];
        data[0..4].copy_from_slice(MAGIC);
        data[4] = banks as u8;
        data.resize(HEADER_SIZE + banks * BANK_SIZE, 0xFF);

        Self {
            data,
            prg_banks: banks,
            prg_start: HEADER_SIZE,
        }
    }

    /// The raw file contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of 16 KiB PRG banks.
    pub fn bank_count(&self) -> usize {
        self.prg_banks
    }

    /// The bank hard-wired to `$C000-$FFFF`.
    pub fn fixed_bank(&self) -> u8 {
        (self.prg_banks - 1) as u8
    }

    /// Translate a CPU range to a file range.
    fn file_offset(&self, addr: Address, len: usize) -> Result<usize> {
        let invalid = |reason: &str| {
            RomError::new(
                ErrorCode::InvalidAddress,
                format!("{} ({} bytes): {}", addr, len, reason),
            )
        };

        if addr.offset < WINDOW_START {
            return Err(invalid("outside the ROM window"));
        }
        if addr.bank as usize >= self.prg_banks {
            return Err(invalid("bank not present in the image")
                .with_hint(format!("the image has {} PRG banks", self.prg_banks)));
        }

        let fixed = addr.bank == self.fixed_bank();
        let window_base = if addr.is_fixed_window() {
            if !fixed {
                return Err(invalid("only the fixed bank is mapped at $C000-$FFFF"));
            }
            FIXED_START
        } else {
            if fixed && self.prg_banks > 1 {
                return Err(invalid("the fixed bank is mapped at $C000-$FFFF"));
            }
            WINDOW_START
        };

        if len > 0 && addr.offset as usize + len - 1 > addr.window_end() as usize {
            return Err(invalid("range crosses the end of its window"));
        }

        Ok(self.prg_start + addr.bank as usize * BANK_SIZE + (addr.offset - window_base) as usize)
    }
}

impl AddressSpace for RomImage {
    fn read_byte(&self, addr: Address) -> Result<u8> {
        let at = self.file_offset(addr, 1)?;
        Ok(self.data[at])
    }

    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>> {
        let at = self.file_offset(addr, len)?;
        Ok(self.data[at..at + len].to_vec())
    }

    fn write_byte(&mut self, addr: Address, value: u8) -> Result<()> {
        let at = self.file_offset(addr, 1)?;
        self.data[at] = value;
        Ok(())
    }

    fn write_bytes(&mut self, addr: Address, bytes: &[u8]) -> Result<()> {
        let at = self.file_offset(addr, bytes.len())?;
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(bank: u8, offset: u16) -> Address {
        Address::new(bank, offset).unwrap()
    }

    #[test]
    fn test_blank_image() {
        let rom = RomImage::blank(16);
        assert_eq!(rom.data().len(), HEADER_SIZE + 16 * BANK_SIZE);
        assert_eq!(rom.bank_count(), 16);
        assert_eq!(rom.fixed_bank(), 0x0F);
        assert_eq!(&rom.data()[0..4], b"NES\x1A");
        assert_eq!(rom.read_byte(addr(3, 0x8000)).unwrap(), 0xFF);
    }

    #[test]
    fn test_bank_mapping() {
        let mut rom = RomImage::blank(16);
        rom.write_byte(addr(5, 0x9D80), 0x42).unwrap();
        assert_eq!(rom.data()[HEADER_SIZE + 5 * BANK_SIZE + 0x1D80], 0x42);

        rom.write_word(addr(0x0F, 0xFEA0), 0x1234).unwrap();
        let at = HEADER_SIZE + 15 * BANK_SIZE + 0x3EA0;
        assert_eq!(&rom.data()[at..at + 2], &[0x34, 0x12]);
        assert_eq!(rom.read_word(addr(0x0F, 0xFEA0)).unwrap(), 0x1234);
    }

    #[test]
    fn test_window_rules() {
        let rom = RomImage::blank(16);
        assert!(rom.read_byte(addr(5, 0xC000)).is_err());
        assert!(rom.read_byte(addr(0x0F, 0x8000)).is_err());
        assert!(rom.read_byte(addr(0x10, 0x8000)).is_err());
        assert!(rom.read_bytes(addr(5, 0xBFFF), 2).is_err());
        assert_eq!(rom.read_bytes(addr(5, 0xBFFF), 1).unwrap(), vec![0xFF]);
    }

    #[test]
    fn test_read_to_window_end() {
        let rom = RomImage::blank(16);
        assert_eq!(rom.read_to_window_end(addr(5, 0xBF00)).unwrap().len(), 0x100);
        assert_eq!(rom.read_to_window_end(addr(0x0F, 0xFFF0)).unwrap().len(), 0x10);
    }

    #[test]
    fn test_trainer_offset() {
        let mut data = vec![0u8; HEADER_SIZE + TRAINER_SIZE + 2 * BANK_SIZE];
        data[0..4].copy_from_slice(b"NES\x1A");
        data[4] = 2;
        data[6] = FLAG_TRAINER;
        data[HEADER_SIZE + TRAINER_SIZE + BANK_SIZE] = 0x99;

        let rom = RomImage::from_bytes(data).unwrap();
        assert_eq!(rom.read_byte(addr(1, 0xC000)).unwrap(), 0x99);
    }

    #[test]
    fn test_rejects_bad_images() {
        assert_eq!(
            RomImage::from_bytes(vec![0; 8]).unwrap_err().code,
            ErrorCode::InvalidImage
        );

        let mut short = vec![0u8; HEADER_SIZE + 100];
        short[0..4].copy_from_slice(b"NES\x1A");
        short[4] = 1;
        assert!(RomImage::from_bytes(short).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("game.nes");

        let mut rom = RomImage::blank(2);
        rom.write_bytes(addr(0, 0x8100), &[1, 2, 3]).unwrap();
        rom.save(&path).unwrap();

        let loaded = RomImage::load(&path).unwrap();
        assert_eq!(loaded, rom);
    }
}
