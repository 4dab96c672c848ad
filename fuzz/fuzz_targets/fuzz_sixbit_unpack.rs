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

//! Fuzz target for the six-bit text unpacker.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_sixbit_unpack

#![no_main]

use libfuzzer_sys::fuzz_target;
use romcomp::codec::sixbit::{unpack, CharTable};

fuzz_target!(|data: &[u8]| {
    let decoded = unpack(data, &CharTable::standard());
    assert!(decoded.consumed <= data.len());
});
