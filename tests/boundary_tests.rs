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

//! Boundary and edge case tests for the resource compiler.
//!
//! These tests verify correct handling of block limits, window edges and
//! regions that are filled exactly.

use pretty_assertions::assert_eq;
use romcomp::codec::raw::Raw;
use romcomp::codec::rle;
use romcomp::{
    Address, AddressSpace, Codec, Content, MemoryRegion, RegionPool, RegionPreference, RomImage,
};

// ============================================================================
// Run-length Block Limits
// ============================================================================

/// Literal blocks are cut at 125 bytes when nothing repeats.
#[test]
fn test_literal_blocks_split() {
    let data: Vec<u8> = (0..300).map(|i| i as u8).collect();
    let encoded = rle::encode(&data);

    assert_eq!(encoded[0], 0x80 + 125);
    assert_eq!(encoded[126], 0x80 + 125);
    assert_eq!(encoded[252], 0x80 + 50);
    assert_eq!(encoded.len(), 300 + 3 + 1);
    assert_eq!(rle::decode(&encoded).content, Content::Bytes(data));
}

/// A pair landing on a 124-byte buffer fills the largest literal block.
#[test]
fn test_literal_block_maximum() {
    let mut data: Vec<u8> = (0..124).collect();
    data.extend([200, 200, 201]);
    let encoded = rle::encode(&data);

    assert_eq!(encoded[0], 0xFE);
    assert_eq!(&encoded[125..], &[200, 200, 0x81, 201, 0xFF]);
    assert_eq!(rle::decode(&encoded).content, Content::Bytes(data));
}

#[test]
fn test_run_limits() {
    assert_eq!(rle::encode(&[1; 127]), vec![0x7F, 1, 0xFF]);
    assert_eq!(rle::encode(&[1; 128]), vec![0x7F, 1, 0x01, 1, 0xFF]);
    assert_eq!(rle::encode(&[1; 254]), vec![0x7F, 1, 0x7F, 1, 0xFF]);
}

#[test]
fn test_zero_length_run_decodes_to_nothing() {
    let decoded = rle::decode(&[0x00, 0x42, 0x02, 0x07, 0xFF]);
    assert_eq!(decoded.content, Content::Bytes(vec![7, 7]));
    assert!(decoded.diagnostics.is_empty());
}

// ============================================================================
// Window Edges
// ============================================================================

#[test]
fn test_last_byte_of_switchable_window() {
    let mut rom = RomImage::blank(16);
    let last = Address::new(5, 0xBFFF).unwrap();
    rom.write_byte(last, 0x42).unwrap();

    assert_eq!(rom.read_byte(last).unwrap(), 0x42);
    assert_eq!(rom.read_to_window_end(last).unwrap(), vec![0x42]);
}

#[test]
fn test_fixed_window_reads_last_bank() {
    let mut rom = RomImage::blank(16);
    let vector = Address::new(15, 0xFFFC).unwrap();
    rom.write_word(vector, 0xC123).unwrap();

    assert_eq!(rom.read_word(vector).unwrap(), 0xC123);
    assert_eq!(rom.read_to_window_end(vector).unwrap().len(), 4);
    assert_eq!(rom.fixed_bank(), 15);
}

#[test]
fn test_single_bank_image_maps_both_windows() {
    let mut rom = RomImage::blank(1);
    rom.write_byte(Address::new(0, 0x8000).unwrap(), 0x11).unwrap();
    assert_eq!(rom.read_byte(Address::new(0, 0xC000).unwrap()).unwrap(), 0x11);
}

// ============================================================================
// Region Limits
// ============================================================================

#[test]
fn test_region_filled_exactly() {
    let mut pool = RegionPool::new();
    pool.add(MemoryRegion::new("a", 5, 0x9000, 0x9010).unwrap()).unwrap();
    let only_a = RegionPreference::new(["a"]);

    assert_eq!(pool.allocate(16, &only_a).unwrap(), Some(Address::new(5, 0x9000).unwrap()));
    assert_eq!(pool.region("a").unwrap().free(), 0);
    assert_eq!(pool.allocate(1, &only_a).unwrap(), None);
    assert_eq!(pool.allocate(0, &only_a).unwrap(), Some(Address::new(5, 0x9010).unwrap()));
}

#[test]
fn test_region_up_to_window_end() {
    let region = MemoryRegion::new("tail", 2, 0xBB00, 0xC000).unwrap();
    assert_eq!(region.free(), 0x500);
    assert!(region.contains(2, 0xBFFF, 1));
    assert!(!region.contains(2, 0xBFFF, 2));
}

#[test]
fn test_widen_to_window_end() {
    let mut pool = RegionPool::new();
    pool.add(MemoryRegion::new("a", 5, 0xB000, 0xB100).unwrap()).unwrap();

    pool.widen("a", 0xC000).unwrap();
    assert!(pool.region("a").unwrap().is_relaxed());
    assert!(pool.widen("a", 0xC001).is_err());
}

#[test]
fn test_raw_record_exactly_full() {
    let raw = Raw::new(Some(4));
    assert_eq!(raw.encode(&Content::Bytes(vec![1, 2, 3, 4])).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(raw.encode(&Content::Bytes(vec![])).unwrap(), vec![0xFF; 4]);
}
