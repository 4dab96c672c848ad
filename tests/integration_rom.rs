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

//! Extract, edit and repack against synthetic iNES images.

use pretty_assertions::assert_eq;
use romcomp::codec::rle;
use romcomp::codec::sixbit::{pack, CharTable};
use romcomp::codec::tiletext::encode_text;
use romcomp::pipeline::{EditValue, SlotState};
use romcomp::{extract, repack, Address, AddressSpace, Content, Edits, ErrorCode, Layout, RomImage};

fn addr(bank: u8, offset: u16) -> Address {
    Address::new(bank, offset).unwrap()
}

fn write_text(rom: &mut RomImage, at: Address, text: &str) {
    rom.write_bytes(at, &pack(text, &CharTable::standard())).unwrap();
}

/// Bank 05 laid out like the `text` preset expects.
fn text_rom() -> RomImage {
    let mut rom = RomImage::blank(16);

    write_text(&mut rom, addr(5, 0x8200), "HELLO~");
    write_text(&mut rom, addr(5, 0x8210), "WORLD~");
    for slot in 0..256u16 {
        let target = if slot == 1 { 0x8210 } else { 0x8200 };
        rom.write_word(addr(5, 0x8000 + slot * 2), target).unwrap();
    }

    write_text(&mut rom, addr(5, 0x9F4C), "HOW ARE YOU?~");
    write_text(&mut rom, addr(5, 0xA000), "FINE.~");
    for slot in 0..0xE6u16 {
        let target = if slot == 5 { 0xA000 } else { 0x9F4C };
        rom.write_word(addr(5, 0x9D80 + slot * 2), target).unwrap();
    }

    rom
}

fn text_of(extraction: &romcomp::Extraction, table: &str, index: usize) -> String {
    match &extraction.slot(table, index).unwrap().content {
        Some(Content::Text(text)) => text.clone(),
        other => panic!("{}[{}] holds {:?}", table, index, other),
    }
}

#[test]
fn test_text_preset_round_trip() {
    let mut rom = text_rom();
    let layout = Layout::preset("text").unwrap();

    let mut extraction = extract(&rom, &layout).unwrap();
    assert_eq!(extraction.slots.len(), 256 + 0xE6);
    assert_eq!(text_of(&extraction, "special", 1), "WORLD~");
    assert_eq!(text_of(&extraction, "dialogue", 5), "FINE.~");
    assert!(extraction.diagnostics.is_empty());

    let mut edits = Edits::default();
    edits.set("dialogue", 5, EditValue::Text("FINE, THANKS.~".into()));
    edits.check_tables(std::slice::from_ref(&layout)).unwrap();
    assert_eq!(edits.apply(&mut extraction).unwrap(), 1);

    let report = repack(&mut rom, &layout, &extraction, |_| false).unwrap();
    assert_eq!(report.allocations, 4);
    assert!(!report.relaxed);

    let after = extract(&rom, &layout).unwrap();
    assert_eq!(text_of(&after, "dialogue", 5), "FINE, THANKS.~");
    assert_eq!(text_of(&after, "dialogue", 6), "HOW ARE YOU?~");
    assert_eq!(text_of(&after, "special", 1), "WORLD~");

    let pointer = |table: &str, index: usize| after.slot(table, index).unwrap().old_address;
    assert_eq!(pointer("special", 0), Some(addr(5, 0x8200)));
    assert_eq!(pointer("special", 0), pointer("special", 255));
    assert_eq!(pointer("dialogue", 0), Some(addr(5, 0x9F4C)));
    assert_eq!(pointer("dialogue", 0), pointer("dialogue", 0xE5));
}

#[test]
fn test_repack_twice_is_stable() {
    let mut rom = text_rom();
    let layout = Layout::preset("text").unwrap();

    let first = extract(&rom, &layout).unwrap();
    repack(&mut rom, &layout, &first, |_| false).unwrap();
    let once = rom.clone();

    let second = extract(&rom, &layout).unwrap();
    repack(&mut rom, &layout, &second, |_| false).unwrap();
    assert_eq!(rom, once);
}

#[test]
fn test_text_preset_pads_last_byte_of_each_area() {
    let mut rom = text_rom();
    rom.write_byte(addr(5, 0x9B4F), 0x00).unwrap();
    rom.write_byte(addr(5, 0xBBCF), 0x00).unwrap();
    rom.write_byte(addr(5, 0xBBD0), 0x00).unwrap();
    let layout = Layout::preset("text").unwrap();

    let extraction = extract(&rom, &layout).unwrap();
    repack(&mut rom, &layout, &extraction, |_| false).unwrap();

    assert_eq!(rom.read_byte(addr(5, 0x9B4F)).unwrap(), 0xFF);
    assert_eq!(rom.read_byte(addr(5, 0xBBCF)).unwrap(), 0xFF);
    assert_eq!(rom.read_byte(addr(5, 0xBBD0)).unwrap(), 0x00);
}

#[test]
fn test_edits_file_round_trip() {
    let rom = text_rom();
    let layout = Layout::preset("text").unwrap();
    let extraction = extract(&rom, &layout).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("text.toml");
    std::fs::write(&path, Edits::from_extraction(&extraction).to_toml().unwrap()).unwrap();

    let loaded = Edits::load(&path).unwrap();
    assert_eq!(loaded.len(), 256 + 0xE6);

    let mut again = extraction.clone();
    loaded.apply(&mut again).unwrap();
    assert_eq!(again, extraction);
}

// ============================================================================
// Run-length maps behind the fixed-bank record table
// ============================================================================

const MAP_RECORDS: u16 = 0xFEA0;

/// 32 map records in bank 0F; record 31 belongs to bank 03.
fn map_rom() -> RomImage {
    let mut rom = RomImage::blank(16);

    rom.write_bytes(addr(2, 0x8050), &rle::encode(&[0x11; 64])).unwrap();
    rom.write_bytes(addr(2, 0x8100), &rle::encode(&[1, 2, 3, 3, 3, 3])).unwrap();
    rom.write_bytes(addr(3, 0x9000), &rle::encode(&[0x22; 8])).unwrap();

    for record in 0..32u16 {
        let at = addr(15, MAP_RECORDS + record * 8);
        let (bank, target) = match record {
            4 => (2, 0x8100),
            31 => (3, 0x9000),
            _ => (2, 0x8050),
        };
        rom.write_byte(at, bank).unwrap();
        rom.write_word(at.offset_by(1).unwrap(), target).unwrap();
    }

    rom
}

fn map_pointer(rom: &RomImage, record: u16) -> u16 {
    rom.read_word(addr(15, MAP_RECORDS + record * 8 + 1)).unwrap()
}

#[test]
fn test_map_preset_relocates_edited_map() {
    let mut rom = map_rom();
    let layout = Layout::preset("map-data-rle").unwrap();

    let mut extraction = extract(&rom, &layout).unwrap();
    assert_eq!(extraction.slot("maps", 31).unwrap().state, SlotState::OutOfScope);
    assert_eq!(
        extraction.slot("maps", 4).unwrap().content,
        Some(Content::Bytes(vec![1, 2, 3, 3, 3, 3]))
    );

    let edited: Vec<u8> = (0..40).collect();
    let mut edits = Edits::default();
    edits.set("maps", 4, EditValue::Bytes { hex: hex::encode(&edited) });
    edits.apply(&mut extraction).unwrap();

    let report = repack(&mut rom, &layout, &extraction, |_| false).unwrap();
    assert_eq!(report.allocations, 2);
    assert_eq!(report.pinned, 1);

    assert_eq!(map_pointer(&rom, 0), 0x8050);
    assert_eq!(map_pointer(&rom, 30), 0x8050);
    assert_eq!(map_pointer(&rom, 31), 0x9000);

    let moved = addr(2, map_pointer(&rom, 4));
    assert_ne!(moved.offset, 0x8100);
    let decoded = rle::decode(&rom.read_to_window_end(moved).unwrap());
    assert_eq!(decoded.content, Content::Bytes(edited));

    // The bank 03 map was neither moved nor padded over.
    let untouched = rle::decode(&rom.read_to_window_end(addr(3, 0x9000)).unwrap());
    assert_eq!(untouched.content, Content::Bytes(vec![0x22; 8]));
}

// ============================================================================
// Region relaxation
// ============================================================================

const TIGHT_LAYOUT: &str = r#"
name = "tight"
codec = "six-bit-text"
data-bank = 0x05

[[regions]]
id = "main"
start = 0x9000
end = 0x9010

[relax]
region = "main"
end = 0x9040

[[tables]]
name = "lines"
pointers = { bank = 0x05, base = 0x8000, count = 2 }
"#;

fn tight_rom() -> RomImage {
    let mut rom = RomImage::blank(16);
    write_text(&mut rom, addr(5, 0x9000), "ONE~");
    write_text(&mut rom, addr(5, 0x9008), "TWO~");
    rom.write_word(addr(5, 0x8000), 0x9000).unwrap();
    rom.write_word(addr(5, 0x8002), 0x9008).unwrap();
    rom
}

fn grow_second_line(rom: &RomImage, layout: &Layout) -> romcomp::Extraction {
    let mut extraction = extract(rom, layout).unwrap();
    let mut edits = Edits::default();
    edits.set("lines", 1, EditValue::Text("TWO LINES OF TEXT ARE TOO LONG~".into()));
    edits.apply(&mut extraction).unwrap();
    extraction
}

#[test]
fn test_relaxation_declined() {
    let mut rom = tight_rom();
    let before = rom.clone();
    let layout = Layout::from_toml(TIGHT_LAYOUT).unwrap();
    let extraction = grow_second_line(&rom, &layout);

    let mut asked = 0;
    let err = repack(&mut rom, &layout, &extraction, |relaxation| {
        asked += 1;
        assert_eq!(relaxation.region, "main");
        false
    })
    .unwrap_err();

    assert_eq!(err.code, ErrorCode::CompactionOutOfSpace);
    assert_eq!(asked, 1);
    assert_eq!(rom, before);
}

#[test]
fn test_relaxation_accepted() {
    let mut rom = tight_rom();
    let layout = Layout::from_toml(TIGHT_LAYOUT).unwrap();
    let extraction = grow_second_line(&rom, &layout);

    let report = repack(&mut rom, &layout, &extraction, |_| true).unwrap();
    assert!(report.relaxed);
    assert!(report.regions[0].relaxed);

    let after = extract(&rom, &layout).unwrap();
    assert_eq!(text_of(&after, "lines", 1), "TWO LINES OF TEXT ARE TOO LONG~");
    assert_eq!(rom.read_byte(addr(5, 0x903F)).unwrap(), 0xFF);
}

#[test]
fn test_rom_survives_save_and_load() {
    let rom = text_rom();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("game.nes");

    rom.save(&path).unwrap();
    assert_eq!(RomImage::load(&path).unwrap(), rom);
}

// ============================================================================
// Name-table text presets
// ============================================================================

/// Two speaker names, with a dialogue and a special dialogue both naming
/// the second one.
fn npc_names_rom() -> RomImage {
    let mut rom = RomImage::blank(16);
    rom.write_bytes(addr(0xB, 0xA700), &encode_text("AB")).unwrap();
    rom.write_bytes(addr(0xB, 0xA703), &encode_text("CDE")).unwrap();
    rom.write_byte(addr(0xB, 0xA600), 0x03).unwrap();
    rom.write_byte(addr(0xB, 0x9690), 0x03).unwrap();
    rom.write_byte(addr(0xB, 0x9691), 0x00).unwrap();
    rom
}

#[test]
fn test_npc_names_update_both_speaker_tables() {
    let mut rom = npc_names_rom();
    let layout = Layout::preset("npc-names").unwrap();
    let mut extraction = extract(&rom, &layout).unwrap();
    assert_eq!(text_of(&extraction, "npc-names", 1), "CDE");

    let mut edits = Edits::default();
    edits.set("npc-names", 0, EditValue::Text("ABCDEFG".into()));
    edits.apply(&mut extraction).unwrap();
    repack(&mut rom, &layout, &extraction, |_| false).unwrap();

    // "CDE" moved from $A703 to $A708.
    assert_eq!(rom.read_byte(addr(0xB, 0xA600)).unwrap(), 0x08);
    assert_eq!(rom.read_byte(addr(0xB, 0x9690)).unwrap(), 0x08);
    assert_eq!(rom.read_byte(addr(0xB, 0x9691)).unwrap(), 0x00);
    // Unused entries stay null.
    assert_eq!(rom.read_byte(addr(0xB, 0x9692)).unwrap(), 0xFF);
    assert_eq!(rom.read_byte(addr(0xB, 0xA601)).unwrap(), 0xFF);

    let after = extract(&rom, &layout).unwrap();
    assert_eq!(text_of(&after, "npc-names", 0), "ABCDEFG");
    assert_eq!(text_of(&after, "npc-names", 1), "CDE");
}

/// Dungeon messages with their pointer table at `table`.
fn dungeon_rom(table: u16) -> RomImage {
    let mut rom = RomImage::blank(16);
    if table != 0xAAF6 {
        rom.write_word(addr(0xD, 0xAA88), table).unwrap();
    }
    rom.write_bytes(addr(0xD, 0xB635), &encode_text("A DARK ROOM")).unwrap();
    rom.write_bytes(addr(0xD, 0xB641), &encode_text("THE END")).unwrap();
    for slot in 0..88u16 {
        let target = if slot == 1 { 0xB641 } else { 0xB635 };
        rom.write_word(addr(0xD, table + slot * 2), target).unwrap();
    }
    rom
}

fn fill_first_message(rom: &RomImage, layout: &Layout) -> romcomp::Extraction {
    let mut extraction = extract(rom, layout).unwrap();
    let mut edits = Edits::default();
    // 731 of the 738 bytes in $B635-$B916.
    edits.set("messages", 0, EditValue::Text("X".repeat(730)));
    edits.apply(&mut extraction).unwrap();
    extraction
}

#[test]
fn test_dungeon_messages_spill_into_old_table() {
    let mut rom = dungeon_rom(0xBA00);
    let layout = Layout::preset("dungeon-messages").unwrap();
    let extraction = fill_first_message(&rom, &layout);
    assert_eq!(text_of(&extraction, "messages", 1), "THE END");

    let report = repack(&mut rom, &layout, &extraction, |_| false).unwrap();
    assert_eq!(report.regions.len(), 2);

    assert_eq!(rom.read_word(addr(0xD, 0xBA00)).unwrap(), 0xB635);
    assert_eq!(rom.read_word(addr(0xD, 0xBA02)).unwrap(), 0xAAF6);
    // Every other level shares one copy of the remaining message.
    assert_eq!(rom.read_word(addr(0xD, 0xBA04)).unwrap(), 0xAAFE);
    assert_eq!(rom.read_word(addr(0xD, 0xBAAE)).unwrap(), 0xAAFE);

    let after = extract(&rom, &layout).unwrap();
    assert_eq!(text_of(&after, "messages", 1), "THE END");
    assert_eq!(text_of(&after, "messages", 87), "A DARK ROOM");
}

#[test]
fn test_dungeon_messages_without_moved_table() {
    let mut rom = dungeon_rom(0xAAF6);
    let before = rom.clone();
    let layout = Layout::preset("dungeon-messages").unwrap();
    let extraction = fill_first_message(&rom, &layout);

    let err = repack(&mut rom, &layout, &extraction, |_| true).unwrap_err();
    assert_eq!(err.code, ErrorCode::CompactionOutOfSpace);
    assert_eq!(rom, before);
}
