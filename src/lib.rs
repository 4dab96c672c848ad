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

//! Romcomp Library
//!
//! This library provides the pieces needed to rewrite the text and data
//! resources of a banked cartridge ROM image and pack them back into the
//! free space the game left for them.
//!
//! # Modules
//!
//! - [`error`] - Error types and diagnostics
//! - [`rom`] - Banked addresses and the iNES image
//! - [`codec`] - Run-length, six-bit text, tile text and raw codecs
//! - [`region`] - Memory regions and the allocation pool
//! - [`compactor`] - Deduplicating relocation of resources
//! - [`pointer`] - Pointer tables, string blocks and reference tables
//! - [`layout`] - Pass descriptions and the built-in presets
//! - [`pipeline`] - Extract, edit and repack
//!
//! # Example
//!
//! ```no_run
//! use romcomp::{extract, repack, Edits, Layout, RomImage};
//! use std::path::Path;
//!
//! fn translate(rom_path: &Path, edits_path: &Path) -> romcomp::Result<()> {
//!     let mut rom = RomImage::load(rom_path)?;
//!     let layout = Layout::preset("text")?;
//!
//!     let mut extraction = extract(&rom, &layout)?;
//!     Edits::load(edits_path)?.apply(&mut extraction)?;
//!
//!     let report = repack(&mut rom, &layout, &extraction, |_| false)?;
//!     print!("{}", report);
//!
//!     rom.save(rom_path)
//! }
//! ```

pub mod codec;
pub mod compactor;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod pointer;
pub mod region;
pub mod rom;

// Re-export commonly used types
pub use codec::{Codec, CodecKind, Content, Decoded};
pub use compactor::{commit, compact, compact_with, DedupStrategy, Relocations, Resource};
pub use error::{format_diagnostic, format_error, Diagnostics, ErrorCode, Result, RomError};
pub use layout::Layout;
pub use pipeline::{extract, repack, Edits, Extraction, RepackReport};
pub use region::{MemoryRegion, RegionPool, RegionPreference};
pub use rom::{Address, AddressSpace, RomImage};

/// The version of the resource compiler.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the resource compiler.
pub const NAME: &str = "Romcomp";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "Romcomp");
    }

    #[test]
    fn test_every_preset_validates() {
        for name in Layout::preset_names() {
            let layout = Layout::preset(name).unwrap();
            assert!(layout.validate().is_ok(), "preset {} is invalid", name);
        }
    }
}
