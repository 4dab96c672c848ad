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

//! Pointer tables.
//!
//! Resources are found through tables of pointers in ROM and, after a
//! compaction pass, those tables are rewritten to the new addresses. Three
//! shapes occur:
//! - [`PointerTable`] - one pointer per slot, possibly inside larger records
//! - [`StringBlock`] - terminated strings packed back to back, no pointers
//! - [`ReferenceTable`] - pointers to resources owned by another table

use crate::compactor::Relocations;
use crate::error::{ErrorCode, Result, RomError};
use crate::rom::{Address, AddressSpace, SWITCHABLE_END, WINDOW_START};
use serde::{Deserialize, Serialize};

/// How a pointer is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointerFormat {
    /// Little-endian 16-bit address.
    #[default]
    Word,
    /// Low byte only; the high byte is implied.
    LowByte { high: u8 },
}

impl PointerFormat {
    /// Bytes taken by one pointer.
    pub fn width(&self) -> usize {
        match self {
            PointerFormat::Word => 2,
            PointerFormat::LowByte { .. } => 1,
        }
    }

    fn read<S: AddressSpace + ?Sized>(&self, space: &S, at: Address) -> Result<u16> {
        match self {
            PointerFormat::Word => space.read_word(at),
            PointerFormat::LowByte { high } => {
                Ok(u16::from_be_bytes([*high, space.read_byte(at)?]))
            }
        }
    }

    fn write<S: AddressSpace + ?Sized>(&self, space: &mut S, at: Address, value: u16) -> Result<()> {
        match self {
            PointerFormat::Word => space.write_word(at, value),
            PointerFormat::LowByte { high } => {
                let [hi, lo] = value.to_be_bytes();
                if hi != *high {
                    return Err(RomError::new(
                        ErrorCode::InvalidAddress,
                        format!(
                            "${:04X} cannot be stored as a low byte with implied high byte ${:02X}",
                            value, high
                        ),
                    ));
                }
                space.write_byte(at, lo)
            }
        }
    }
}

/// Address of entry `index` in a table of `stride`-byte records.
fn entry_address(bank: u8, base: u16, index: usize, stride: usize, field: usize) -> Result<Address> {
    Address::new(bank, base)?.offset_by(index * stride + field)
}

/// A pointer exactly as found in ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pointer {
    /// Bank the pointed-to data lives in.
    pub bank: u8,
    pub value: u16,
}

impl Pointer {
    /// The target, if the value lies inside the ROM window.
    pub fn address(&self) -> Option<Address> {
        (self.value >= WINDOW_START).then_some(Address {
            bank: self.bank,
            offset: self.value,
        })
    }
}

fn default_count() -> usize {
    1
}

/// A table holding one pointer per slot.
///
/// Slot `i` is read from `base + i * stride + field` in `bank`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PointerTable {
    pub bank: u8,
    pub base: u16,
    #[serde(default = "default_count")]
    pub count: usize,
    /// Record size; defaults to the pointer width.
    #[serde(default)]
    pub stride: Option<usize>,
    /// Offset of the pointer inside its record.
    #[serde(default)]
    pub field: usize,
    #[serde(default)]
    pub format: PointerFormat,
    /// Bank the data lives in; defaults to the table's bank.
    #[serde(default)]
    pub target_bank: Option<u8>,
    /// Offset of a per-record bank byte, overriding `target_bank`.
    #[serde(default)]
    pub bank_field: Option<usize>,
    /// Offset in `bank` of the word operand the game loads the table base
    /// from. `base` is used when the operand is outside `$8000-$BFFF`.
    #[serde(default)]
    pub base_operand: Option<u16>,
}

impl PointerTable {
    /// A plain table of word pointers into its own bank.
    pub fn words(bank: u8, base: u16, count: usize) -> Self {
        Self {
            bank,
            base,
            count,
            stride: None,
            field: 0,
            format: PointerFormat::Word,
            target_bank: None,
            bank_field: None,
            base_operand: None,
        }
    }

    pub fn stride(&self) -> usize {
        self.stride.unwrap_or_else(|| self.format.width())
    }

    /// Table base as the game sees it.
    pub fn locate_base<S: AddressSpace + ?Sized>(&self, space: &S) -> Result<u16> {
        let Some(operand) = self.base_operand else {
            return Ok(self.base);
        };
        let base = space.read_word(Address::new(self.bank, operand)?)?;
        if (WINDOW_START..=SWITCHABLE_END).contains(&base) {
            Ok(base)
        } else {
            log::warn!(
                "table base ${:04X} read from {:02X}:{:04X} is outside the bank, using ${:04X}",
                base,
                self.bank,
                operand,
                self.base
            );
            Ok(self.base)
        }
    }

    /// Bytes `[start, end)` in `bank` taken by the table.
    pub fn span(&self) -> (u32, u32) {
        let start = self.base as u32;
        (start, start + (self.count * self.stride()) as u32)
    }

    /// Location of slot `index`'s pointer.
    pub fn slot_address(&self, index: usize) -> Result<Address> {
        entry_address(self.bank, self.base, index, self.stride(), self.field)
    }

    fn target_bank_of<S: AddressSpace + ?Sized>(&self, space: &S, index: usize) -> Result<u8> {
        match self.bank_field {
            Some(field) => {
                space.read_byte(entry_address(self.bank, self.base, index, self.stride(), field)?)
            }
            None => Ok(self.target_bank.unwrap_or(self.bank)),
        }
    }

    /// Read every slot.
    pub fn read<S: AddressSpace + ?Sized>(&self, space: &S) -> Result<Vec<Pointer>> {
        (0..self.count)
            .map(|i| {
                Ok(Pointer {
                    bank: self.target_bank_of(space, i)?,
                    value: self.format.read(space, self.slot_address(i)?)?,
                })
            })
            .collect()
    }

    /// Point slot `index` at `target`.
    pub fn write_slot<S: AddressSpace + ?Sized>(
        &self,
        space: &mut S,
        index: usize,
        target: Address,
    ) -> Result<()> {
        if index >= self.count {
            return Err(RomError::new(
                ErrorCode::InvalidEdit,
                format!("slot {} is past the end of a {}-entry table", index, self.count),
            ));
        }
        self.format.write(space, self.slot_address(index)?, target.offset)
    }
}

fn default_terminator() -> u8 {
    0xFF
}

/// Terminated strings stored back to back in `[start, end)`.
///
/// Each string's start is one slot. Bytes after the last terminator do not
/// form a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StringBlock {
    pub bank: u8,
    pub start: u16,
    pub end: u32,
    #[serde(default = "default_terminator")]
    pub terminator: u8,
}

impl StringBlock {
    /// Start address of every complete string.
    pub fn scan<S: AddressSpace + ?Sized>(&self, space: &S) -> Result<Vec<Address>> {
        let first = Address::new(self.bank, self.start)?;
        let len = (self.end.saturating_sub(self.start as u32)) as usize;
        let bytes = space.read_bytes(first, len)?;

        let mut starts = Vec::new();
        let mut current = 0;
        for (i, &byte) in bytes.iter().enumerate() {
            if byte == self.terminator {
                starts.push(first.offset_by(current)?);
                current = i + 1;
            }
        }
        Ok(starts)
    }
}

/// Pointers into resources that another table owns.
///
/// They do not define resources, they follow them: after compaction every
/// entry is looked up in the pass's [`Relocations`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReferenceTable {
    pub name: String,
    pub bank: u8,
    pub base: u16,
    pub count: usize,
    #[serde(default)]
    pub format: PointerFormat,
    /// Bank of the referenced resources; defaults to the table's bank.
    #[serde(default)]
    pub target_bank: Option<u8>,
    /// Stored value meaning "no reference".
    #[serde(default)]
    pub null: Option<u16>,
}

/// What a reference table rewrite changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceStats {
    pub updated: usize,
    pub reset: usize,
}

impl ReferenceTable {
    fn entry(&self, index: usize) -> Result<Address> {
        entry_address(self.bank, self.base, index, self.format.width(), 0)
    }

    /// Redirect every entry through `relocations`.
    ///
    /// Null entries are kept. Entries that match no relocated resource are
    /// reset to null, or left alone when the table has no null value.
    pub fn rewrite<S: AddressSpace + ?Sized>(
        &self,
        space: &mut S,
        relocations: &Relocations,
    ) -> Result<ReferenceStats> {
        let bank = self.target_bank.unwrap_or(self.bank);
        let mut stats = ReferenceStats::default();

        for i in 0..self.count {
            let at = self.entry(i)?;
            let value = self.format.read(space, at)?;
            if Some(value) == self.null {
                continue;
            }

            let new = Pointer { bank, value }
                .address()
                .and_then(|old| relocations.lookup(old));
            match (new, self.null) {
                (Some(new), _) => {
                    self.format.write(space, at, new.offset)?;
                    stats.updated += 1;
                }
                (None, Some(null)) => {
                    log::warn!(
                        "{}[{}] refers to ${:04X}, which holds no resource; resetting",
                        self.name,
                        i,
                        value
                    );
                    self.format.write(space, at, null)?;
                    stats.reset += 1;
                }
                (None, None) => {
                    log::warn!(
                        "{}[{}] refers to ${:04X}, which holds no resource",
                        self.name,
                        i,
                        value
                    );
                }
            }
        }

        log::debug!(
            "{}: {} references updated, {} reset",
            self.name,
            stats.updated,
            stats.reset
        );
        Ok(stats)
    }
}

/// Copy resources that land high in the window into a second bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MirrorRule {
    /// Lowest offset that is mirrored.
    pub threshold: u16,
    pub bank: u8,
}

impl MirrorRule {
    /// Where a copy of data written at `address` goes, if anywhere.
    pub fn apply(&self, address: Address) -> Option<Address> {
        (address.offset >= self.threshold && address.bank != self.bank).then_some(Address {
            bank: self.bank,
            offset: address.offset,
        })
    }
}
