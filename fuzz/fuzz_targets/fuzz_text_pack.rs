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

//! Fuzz target for the text encoders.
//!
//! Any text must pack without panicking. Terminated six-bit text must
//! unpack to a terminated string.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_text_pack

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use romcomp::codec::sixbit::{pack, unpack, CharTable};
use romcomp::codec::tiletext::{decode_text, encode_text};

#[derive(Debug, Arbitrary)]
struct Input {
    text: String,
    tile_text: bool,
}

fuzz_target!(|input: Input| {
    if input.tile_text {
        let encoded = encode_text(&input.text);
        assert_eq!(encoded.last(), Some(&0xFF));
        let _ = decode_text(&encoded);
    } else {
        let table = CharTable::standard();
        let packed = pack(&format!("{}~", input.text), &table);
        let decoded = unpack(&packed, &table);
        assert!(decoded.content.as_text().is_some_and(|t| t.ends_with('~')));
    }
});
