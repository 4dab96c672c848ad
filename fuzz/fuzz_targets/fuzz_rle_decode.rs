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

//! Fuzz target for the run-length decoder.
//!
//! Damaged streams must decode as far as possible without panicking, and
//! whatever was decoded must survive a round trip through the encoder.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_rle_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use romcomp::codec::rle;

fuzz_target!(|data: &[u8]| {
    let decoded = rle::decode(data);
    assert!(decoded.consumed <= data.len());

    if let Some(bytes) = decoded.content.as_bytes() {
        let again = rle::decode(&rle::encode(bytes));
        assert_eq!(again.content.as_bytes(), Some(bytes));
    }
});
