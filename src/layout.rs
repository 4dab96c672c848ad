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

//! Layout descriptions.
//!
//! A layout tells a compaction pass where its resources are listed, which
//! codec stores them, which regions they may occupy and which other tables
//! refer to them. Layouts are TOML documents; the stock game's layouts ship
//! as built-in presets:
//!
//! ```toml
//! name = "enemy-names"
//! codec = "tile-text"
//! dedup = "by-content"
//! data-bank = 0x05
//!
//! [[regions]]
//! id = "names"
//! start = 0xBCFA
//! end = 0xBE6F
//!
//! [[tables]]
//! name = "enemy-names"
//! pointers = { bank = 0x05, base = 0xBC80, count = 0x3D }
//! ```

use crate::codec::CodecKind;
use crate::compactor::{CommitOptions, CompactOptions, DedupStrategy, Relaxation};
use crate::error::{ErrorCode, Result, RomError};
use crate::pointer::{MirrorRule, PointerTable, ReferenceTable, StringBlock};
use crate::region::{MemoryRegion, RegionPool, RegionPreference};
use crate::rom::AddressSpace;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// One compaction pass.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Layout {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub codec: CodecKind,
    #[serde(default)]
    pub dedup: DedupStrategy,
    /// Bank the regions belong to.
    pub data_bank: u8,
    /// Only resources whose data lives in this bank are relocated.
    #[serde(default)]
    pub scope_bank: Option<u8>,
    pub regions: Vec<RegionSpec>,
    pub tables: Vec<TableSpec>,
    #[serde(default)]
    pub references: Vec<ReferenceTable>,
    #[serde(default)]
    pub relax: Option<Relaxation>,
    #[serde(default)]
    pub mirror: Option<MirrorRule>,
    /// Pad unused region space after the pass.
    #[serde(default = "default_pad")]
    pub pad: bool,
    #[serde(default = "default_fill")]
    pub fill: u8,
}

fn default_pad() -> bool {
    true
}

fn default_fill() -> u8 {
    0xFF
}

/// A region as written in a layout; its bank is the layout's data bank.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RegionSpec {
    pub id: String,
    pub start: u32,
    /// Exclusive.
    pub end: u32,
    /// Exclusive end of padding when it runs past `end`.
    #[serde(default)]
    pub pad_to: Option<u32>,
    /// Left out of the pass while a pointer table occupies any of its bytes.
    #[serde(default)]
    pub optional: bool,
}

impl RegionSpec {
    fn overlaps(&self, (start, end): (u32, u32)) -> bool {
        start < self.end && self.start < end
    }
}

/// A set of resources and where their pointers live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TableSpec {
    pub name: String,
    /// Region order for this table; all regions in declaration order if empty.
    #[serde(default)]
    pub prefer: Vec<String>,
    /// Slots whose pointer and content are left untouched.
    #[serde(default)]
    pub skip: Vec<usize>,
    #[serde(default)]
    pub pointers: Option<PointerTable>,
    #[serde(default)]
    pub block: Option<StringBlock>,
}

/// Where a table's slots come from.
#[derive(Debug, Clone, Copy)]
pub enum TableSource<'a> {
    Pointers(&'a PointerTable),
    Block(&'a StringBlock),
}

impl TableSpec {
    pub fn source(&self) -> Result<TableSource<'_>> {
        match (&self.pointers, &self.block) {
            (Some(pointers), None) => Ok(TableSource::Pointers(pointers)),
            (None, Some(block)) => Ok(TableSource::Block(block)),
            _ => Err(RomError::new(
                ErrorCode::InvalidLayout,
                format!("table '{}' needs exactly one of 'pointers' or 'block'", self.name),
            )),
        }
    }

    pub fn is_skipped(&self, slot: usize) -> bool {
        self.skip.contains(&slot)
    }
}

// ============================================================================
// Presets
// ============================================================================

const PRESET_TEXT: &str = r#"
name = "text"
description = "Special text and NPC dialogue, six-bit packed in bank 05"
codec = "six-bit-text"
dedup = "by-origin"
data-bank = 0x05

[[regions]]
id = "special"
start = 0x8200
end = 0x9B4F
pad-to = 0x9B50

[[regions]]
id = "normal"
start = 0x9F4C
end = 0xBBCF
pad-to = 0xBBD0

[relax]
region = "normal"
end = 0xBC7F

[[tables]]
name = "special"
prefer = ["special", "normal"]
pointers = { bank = 0x05, base = 0x8000, count = 256 }

[[tables]]
name = "dialogue"
prefer = ["normal", "special"]
pointers = { bank = 0x05, base = 0x9D80, count = 0xE6 }
"#;

const PRESET_ENEMY_NAMES: &str = r#"
name = "enemy-names"
description = "Enemy names shown in battle, bank 05"
codec = "tile-text"
dedup = "by-content"
data-bank = 0x05

[[regions]]
id = "names"
start = 0xBCFA
end = 0xBE6F

[[tables]]
name = "enemy-names"
pointers = { bank = 0x05, base = 0xBC80, count = 0x3D }
"#;

const PRESET_NPC_NAMES: &str = r#"
name = "npc-names"
description = "Speaker names shown above dialogue, bank 0B"
codec = "tile-text"
dedup = "by-content"
data-bank = 0x0B

[[regions]]
id = "names"
start = 0xA700
end = 0xA800

[[tables]]
name = "npc-names"
block = { bank = 0x0B, start = 0xA700, end = 0xA800 }

[[references]]
name = "dialogue-speakers"
bank = 0x0B
base = 0xA600
count = 256
format = { low-byte = { high = 0xA7 } }
null = 0xA7FF

[[references]]
name = "special-speakers"
bank = 0x0B
base = 0x9690
count = 0xB0
format = { low-byte = { high = 0xA7 } }
null = 0xA7FF
"#;

const PRESET_MENU_TEXT: &str = r#"
name = "menu-text"
description = "Intro and pre-game menu text, bank 0C"
codec = "tile-text"
dedup = "by-origin"
data-bank = 0x0C

[[regions]]
id = "menus"
start = 0xA6C7
end = 0xAEC1

[[tables]]
name = "menu-text"
pointers = { bank = 0x0C, base = 0xA675, count = 41 }
"#;

const PRESET_DUNGEON_MESSAGES: &str = r#"
name = "dungeon-messages"
description = "Messages shown on dungeon levels, bank 0D"
codec = "tile-text"
dedup = "by-content"
data-bank = 0x0D

[[regions]]
id = "messages"
start = 0xB635
end = 0xB917

# Free once the pointer table has been moved elsewhere.
[[regions]]
id = "old-table"
start = 0xAAF6
end = 0xAB65
optional = true

[[tables]]
name = "messages"
pointers = { bank = 0x0D, base = 0xAAF6, base-operand = 0xAA88, count = 88 }
"#;

const PRESET_MAP_DATA_RLE: &str = r#"
name = "map-data-rle"
description = "Run-length compressed maps in bank 02"
codec = "run-length"
dedup = "by-origin"
data-bank = 0x02
scope-bank = 0x02

[[regions]]
id = "maps"
start = 0x8050
end = 0xBB00

[[tables]]
name = "maps"
pointers = { bank = 0x0F, base = 0xFEA0, count = 0x20, stride = 8, field = 1, bank-field = 0 }
"#;

const PRESET_NPC_TABLES_RLE: &str = r#"
name = "npc-tables-rle"
description = "NPC placement tables of the maps in bank 02"
codec = { raw = { size = 256 } }
dedup = "by-origin"
data-bank = 0x02
scope-bank = 0x02

[[regions]]
id = "npcs"
start = 0xBB00
end = 0xC000

[[tables]]
name = "npc-tables"
pointers = { bank = 0x0F, base = 0xFEA0, count = 0x20, stride = 8, field = 3, bank-field = 0 }
"#;

const PRESETS: &[(&str, &str)] = &[
    ("text", PRESET_TEXT),
    ("enemy-names", PRESET_ENEMY_NAMES),
    ("npc-names", PRESET_NPC_NAMES),
    ("menu-text", PRESET_MENU_TEXT),
    ("dungeon-messages", PRESET_DUNGEON_MESSAGES),
    ("map-data-rle", PRESET_MAP_DATA_RLE),
    ("npc-tables-rle", PRESET_NPC_TABLES_RLE),
];

impl Layout {
    /// Parse and validate a layout document.
    pub fn from_toml(source: &str) -> Result<Self> {
        let layout: Layout = toml::from_str(source).map_err(|e| {
            RomError::new(ErrorCode::InvalidLayout, format!("cannot parse layout: {}", e))
        })?;
        layout.validate()?;
        Ok(layout)
    }

    /// Load a layout file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            RomError::new(
                ErrorCode::Io,
                format!("cannot read layout {}: {}", path.display(), e),
            )
        })?;
        Self::from_toml(&source)
    }

    /// A built-in layout.
    pub fn preset(name: &str) -> Result<Self> {
        let source = Self::preset_source(name).ok_or_else(|| {
            RomError::new(ErrorCode::UnknownPreset, format!("no preset named '{}'", name))
                .with_hint(format!("available presets: {}", Self::preset_names().join(", ")))
        })?;
        Self::from_toml(source)
    }

    /// TOML text of a built-in layout.
    pub fn preset_source(name: &str) -> Option<&'static str> {
        PRESETS
            .iter()
            .find(|(preset, _)| *preset == name)
            .map(|(_, source)| *source)
    }

    pub fn preset_names() -> Vec<&'static str> {
        PRESETS.iter().map(|(name, _)| *name).collect()
    }

    /// A preset name, or else a path to a layout file.
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        if Self::preset_source(name_or_path).is_some() {
            Self::preset(name_or_path)
        } else {
            Self::load(Path::new(name_or_path))
        }
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(RomError::new(ErrorCode::InvalidLayout, message));

        if self.regions.is_empty() {
            return invalid(format!("layout '{}' has no regions", self.name));
        }
        if self.tables.is_empty() {
            return invalid(format!("layout '{}' has no tables", self.name));
        }

        // Builds every region, which checks bounds and overlaps.
        self.build_pool()?;

        let ids: HashSet<&str> = self.regions.iter().map(|r| r.id.as_str()).collect();
        let unknown_region = |id: &str, context: &str| {
            Err(RomError::new(
                ErrorCode::UnknownRegion,
                format!("{} refers to unknown region '{}'", context, id),
            ))
        };

        let mut names = HashSet::new();
        for table in &self.tables {
            if !names.insert(table.name.as_str()) {
                return invalid(format!("table '{}' is defined twice", table.name));
            }
            if let TableSource::Pointers(pointers) = table.source()? {
                if let Some(&slot) = table.skip.iter().find(|&&s| s >= pointers.count) {
                    return invalid(format!(
                        "table '{}' skips slot {} but has only {} slots",
                        table.name, slot, pointers.count
                    ));
                }
            }
            if let Some(id) = table.prefer.iter().find(|id| !ids.contains(id.as_str())) {
                return unknown_region(id, &format!("table '{}'", table.name));
            }
        }

        if let Some(relax) = &self.relax {
            if !ids.contains(relax.region.as_str()) {
                return unknown_region(&relax.region, "relaxation");
            }
        }

        Ok(())
    }

    /// This layout as it applies to `space`.
    ///
    /// Table bases are read from their operands, and optional regions that
    /// a pointer table occupies are removed along with any mention of them.
    pub fn bind<S: AddressSpace + ?Sized>(&self, space: &S) -> Result<Layout> {
        let mut bound = self.clone();
        for pointers in bound.tables.iter_mut().filter_map(|t| t.pointers.as_mut()) {
            pointers.base = pointers.locate_base(space)?;
            pointers.base_operand = None;
        }

        let spans: Vec<(u32, u32)> = bound
            .tables
            .iter()
            .filter_map(|t| t.pointers.as_ref())
            .filter(|p| p.bank == self.data_bank)
            .map(PointerTable::span)
            .collect();
        let dropped: Vec<String> = bound
            .regions
            .iter()
            .filter(|r| r.optional && spans.iter().any(|&span| r.overlaps(span)))
            .map(|r| r.id.clone())
            .collect();
        if dropped.is_empty() {
            return Ok(bound);
        }

        for id in &dropped {
            log::info!("{}: region '{}' holds a pointer table, leaving it out", self.name, id);
        }
        bound.regions.retain(|r| !dropped.contains(&r.id));
        for table in &mut bound.tables {
            table.prefer.retain(|id| !dropped.contains(id));
        }
        if bound.relax.as_ref().is_some_and(|r| dropped.contains(&r.region)) {
            bound.relax = None;
        }
        bound.validate()?;
        Ok(bound)
    }

    /// A fresh pool holding this layout's regions.
    pub fn build_pool(&self) -> Result<RegionPool> {
        let mut pool = RegionPool::new();
        for spec in &self.regions {
            let mut region = MemoryRegion::new(&spec.id, self.data_bank, spec.start, spec.end)?;
            if let Some(pad_to) = spec.pad_to {
                region = region.with_pad_end(pad_to)?;
            }
            pool.add(region)?;
        }
        Ok(pool)
    }

    /// Region order for a table's resources.
    pub fn preference_for(&self, table: &TableSpec) -> RegionPreference {
        if table.prefer.is_empty() {
            RegionPreference::new(self.regions.iter().map(|r| r.id.clone()))
        } else {
            RegionPreference::new(table.prefer.iter().cloned())
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn compact_options(&self) -> CompactOptions {
        CompactOptions {
            scope_bank: self.scope_bank,
            relaxation: self.relax.clone(),
        }
    }

    pub fn commit_options(&self) -> CommitOptions {
        CommitOptions {
            fill: self.pad.then_some(self.fill),
            mirror: self.mirror,
        }
    }
}
