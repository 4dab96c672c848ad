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

//! Bump allocation over bounded ROM regions.
//!
//! A [`RegionPool`] holds the address ranges one compaction pass may write
//! to. Each [`MemoryRegion`] hands out space strictly front to back; freed
//! space is never reused within a pass. Requests go through a
//! [`RegionPreference`], the order in which regions are tried.

use crate::error::{ErrorCode, Result, RomError};
use crate::rom::{Address, FIXED_START, WINDOW_START};
use std::fmt;

/// One past the last CPU address.
const ADDRESS_LIMIT: u32 = 0x1_0000;

/// A contiguous range `[start, end)` inside one bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub id: String,
    pub bank: u8,
    pub start: u32,
    pub end: u32,
    pub cursor: u32,
    /// End as configured, before any relaxation.
    configured_end: u32,
    /// Padding covers `[cursor, pad_end)`; at least `configured_end`.
    pad_end: u32,
}

fn window_limit(start: u32) -> u32 {
    if start >= FIXED_START as u32 {
        ADDRESS_LIMIT
    } else {
        FIXED_START as u32
    }
}

impl MemoryRegion {
    /// Create an empty region. The range must lie inside one ROM window.
    pub fn new(id: impl Into<String>, bank: u8, start: u32, end: u32) -> Result<Self> {
        let id = id.into();
        if start < WINDOW_START as u32 || start > end || end > window_limit(start) {
            return Err(RomError::new(
                ErrorCode::InvalidRegion,
                format!(
                    "region '{}' {:02X}:{:04X}..{:04X} is not inside a single ROM window",
                    id, bank, start, end
                ),
            )
            .with_hint("regions must lie within $8000-$BFFF or $C000-$FFFF"));
        }

        Ok(Self {
            id,
            bank,
            start,
            end,
            cursor: start,
            configured_end: end,
            pad_end: end,
        })
    }

    /// Pad up to `pad_end` instead of the region's end.
    ///
    /// Bytes past the end are never allocated, only filled.
    pub fn with_pad_end(mut self, pad_end: u32) -> Result<Self> {
        if pad_end < self.end || pad_end > window_limit(self.start) {
            return Err(RomError::new(
                ErrorCode::InvalidRegion,
                format!(
                    "region '{}' cannot pad to {:04X}: it ends at {:04X}",
                    self.id, pad_end, self.end
                ),
            ));
        }
        self.pad_end = pad_end;
        Ok(self)
    }

    /// Bytes still available.
    pub fn free(&self) -> usize {
        (self.end - self.cursor) as usize
    }

    /// Bytes handed out so far.
    pub fn used(&self) -> usize {
        (self.cursor - self.start) as usize
    }

    /// Whether the region was widened past its configured end.
    pub fn is_relaxed(&self) -> bool {
        self.end != self.configured_end
    }

    /// The configured range that was left unallocated, plus any padding
    /// past the end.
    pub fn unused(&self) -> std::ops::Range<u32> {
        self.cursor.min(self.pad_end)..self.pad_end
    }

    /// Whether `[offset, offset + len)` in `bank` lies inside this region.
    pub fn contains(&self, bank: u8, offset: u32, len: usize) -> bool {
        bank == self.bank && offset >= self.start && offset + len as u32 <= self.end
    }

    fn overlaps(&self, other: &MemoryRegion) -> bool {
        self.bank == other.bank && self.start < other.reach() && other.start < self.reach()
    }

    /// End of every byte the region may write, padding included.
    fn reach(&self) -> u32 {
        self.end.max(self.pad_end)
    }

    /// Reserve `size` bytes at the cursor.
    fn allocate(&mut self, size: usize) -> Option<Address> {
        if self.free() < size {
            return None;
        }
        let address = Address {
            bank: self.bank,
            offset: self.cursor as u16,
        };
        self.cursor += size as u32;
        Some(address)
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:02X}:{:04X}..{:04X})",
            self.id, self.bank, self.start, self.end
        )
    }
}

/// Order in which regions are tried for an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionPreference {
    order: Vec<String>,
}

impl RegionPreference {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            order: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Region ids, most preferred first.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, id: &str) -> bool {
        self.order.iter().any(|o| o == id)
    }
}

impl fmt::Display for RegionPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.order.join(" > "))
    }
}

/// A set of non-overlapping regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionPool {
    regions: Vec<MemoryRegion>,
}

impl RegionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a region, rejecting duplicate ids and overlapping ranges.
    pub fn add(&mut self, region: MemoryRegion) -> Result<()> {
        if self.region(&region.id).is_some() {
            return Err(RomError::new(
                ErrorCode::InvalidRegion,
                format!("region '{}' is defined twice", region.id),
            ));
        }
        if let Some(other) = self.regions.iter().find(|r| r.overlaps(&region)) {
            return Err(RomError::new(
                ErrorCode::RegionOverlap,
                format!("region {} overlaps {}", region, other),
            ));
        }
        self.regions.push(region);
        Ok(())
    }

    pub fn region(&self, id: &str) -> Option<&MemoryRegion> {
        self.regions.iter().find(|r| r.id == id)
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.regions.iter().position(|r| r.id == id).ok_or_else(|| {
            RomError::new(ErrorCode::UnknownRegion, format!("no region named '{}'", id))
        })
    }

    pub fn regions(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.regions.iter()
    }

    /// Reserve `size` bytes in the first preferred region with room.
    ///
    /// `Ok(None)` means no region in the preference can take the request;
    /// nothing is reserved in that case.
    pub fn allocate(&mut self, size: usize, preference: &RegionPreference) -> Result<Option<Address>> {
        for id in preference.ids() {
            let index = self.index_of(id)?;
            if let Some(address) = self.regions[index].allocate(size) {
                log::debug!("allocated {} bytes at {} in '{}'", size, address, id);
                return Ok(Some(address));
            }
        }
        Ok(None)
    }

    /// Largest free block among the preferred regions.
    pub fn max_available(&self, preference: &RegionPreference) -> Result<usize> {
        let mut best = 0;
        for id in preference.ids() {
            best = best.max(self.regions[self.index_of(id)?].free());
        }
        Ok(best)
    }

    /// Move a region's end forward to `end`.
    pub fn widen(&mut self, id: &str, end: u32) -> Result<()> {
        let index = self.index_of(id)?;
        let region = &self.regions[index];
        if end < region.end || end > window_limit(region.start) {
            return Err(RomError::new(
                ErrorCode::InvalidRegion,
                format!("cannot move the end of {} to ${:04X}", region, end),
            ));
        }

        let mut widened = region.clone();
        widened.end = end;
        if let Some(other) = self
            .regions
            .iter()
            .enumerate()
            .find(|(i, r)| *i != index && r.overlaps(&widened))
            .map(|(_, r)| r)
        {
            return Err(RomError::new(
                ErrorCode::RegionOverlap,
                format!("widening {} would overlap {}", region, other),
            ));
        }

        log::info!("widened region '{}' to end at ${:04X}", id, end);
        self.regions[index] = widened;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> RegionPool {
        let mut pool = RegionPool::new();
        pool.add(MemoryRegion::new("a", 5, 0x8000, 0x8064).unwrap()).unwrap();
        pool.add(MemoryRegion::new("b", 5, 0x9000, 0x90C8).unwrap()).unwrap();
        pool
    }

    #[test]
    fn test_region_bounds() {
        assert!(MemoryRegion::new("x", 0, 0x7F00, 0x8100).is_err());
        assert!(MemoryRegion::new("x", 0, 0x9000, 0x8000).is_err());
        assert!(MemoryRegion::new("x", 0, 0xBF00, 0xC100).is_err());
        assert!(MemoryRegion::new("x", 0, 0xBF00, 0xC000).is_ok());
        assert!(MemoryRegion::new("x", 0xF, 0xFF00, 0x1_0000).is_ok());
    }

    #[test]
    fn test_falls_back_when_first_is_full() {
        let mut pool = pool();
        let preference = RegionPreference::new(["a", "b"]);

        let address = pool.allocate(130, &preference).unwrap().unwrap();
        assert_eq!(address, Address { bank: 5, offset: 0x9000 });
        assert_eq!(pool.region("a").unwrap().cursor, 0x8000);
        assert_eq!(pool.region("b").unwrap().cursor, 0x9082);
    }

    #[test]
    fn test_exact_fit() {
        let mut pool = pool();
        let preference = RegionPreference::new(["a"]);
        assert!(pool.allocate(100, &preference).unwrap().is_some());
        assert_eq!(pool.region("a").unwrap().free(), 0);
        assert!(pool.allocate(1, &preference).unwrap().is_none());
    }

    #[test]
    fn test_max_available() {
        let pool = pool();
        assert_eq!(pool.max_available(&RegionPreference::new(["a", "b"])).unwrap(), 200);
        assert_eq!(pool.max_available(&RegionPreference::new(["a"])).unwrap(), 100);
    }

    #[test]
    fn test_overlap_rejected() {
        let mut pool = pool();
        let err = pool
            .add(MemoryRegion::new("c", 5, 0x8050, 0x8100).unwrap())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RegionOverlap);

        // Same range in another bank is fine.
        assert!(pool.add(MemoryRegion::new("c", 6, 0x8050, 0x8100).unwrap()).is_ok());
    }

    #[test]
    fn test_unknown_region() {
        let mut pool = pool();
        let err = pool.allocate(1, &RegionPreference::new(["zzz"])).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownRegion);
    }

    #[test]
    fn test_widen() {
        let mut pool = pool();
        pool.widen("a", 0x8100).unwrap();
        let region = pool.region("a").unwrap();
        assert!(region.is_relaxed());
        assert_eq!(region.free(), 0x100);
        assert_eq!(region.unused(), 0x8000..0x8064);

        assert_eq!(pool.widen("a", 0x9100).unwrap_err().code, ErrorCode::RegionOverlap);
        assert!(pool.widen("a", 0x8080).is_err());
    }

    #[test]
    fn test_pad_end_past_region_end() {
        let region = MemoryRegion::new("a", 5, 0x8000, 0x8064)
            .unwrap()
            .with_pad_end(0x8065)
            .unwrap();
        assert_eq!(region.free(), 100);
        assert_eq!(region.unused(), 0x8000..0x8065);
        assert!(MemoryRegion::new("a", 5, 0x8000, 0x8064).unwrap().with_pad_end(0x8063).is_err());

        // The padded byte counts for overlaps.
        let mut pool = RegionPool::new();
        pool.add(region).unwrap();
        let err = pool.add(MemoryRegion::new("b", 5, 0x8064, 0x8100).unwrap()).unwrap_err();
        assert_eq!(err.code, ErrorCode::RegionOverlap);
    }

    #[test]
    fn test_unused_after_relaxed_allocation() {
        let mut pool = pool();
        pool.widen("a", 0x8100).unwrap();
        pool.allocate(0x80, &RegionPreference::new(["a"])).unwrap();
        assert_eq!(pool.region("a").unwrap().unused(), 0x8064..0x8064);
    }
}
