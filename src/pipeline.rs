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

//! Extract, edit and repack.
//!
//! The pipeline drives one layout at a time:
//! 1. [`extract`] reads every slot's pointer and decodes its current content
//! 2. [`Edits::apply`] replaces the content of selected slots
//! 3. [`repack`] compacts the resources, writes them, and rewrites every
//!    pointer and reference to them
//!
//! Repacking stages all writes on a copy of the address space and only
//! swaps it in once the whole pass went through.

use crate::codec::sixbit::TERMINATOR_CHAR;
use crate::codec::Content;
use crate::compactor::{commit, compact_with, Relaxation, Resource};
use crate::error::{Diagnostic, Diagnostics, ErrorCode, Result, RomError};
use crate::layout::{Layout, TableSource};
use crate::pointer::{Pointer, ReferenceStats};
use crate::region::RegionPreference;
use crate::rom::{Address, AddressSpace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

// ============================================================================
// Extraction
// ============================================================================

/// Whether a slot takes part in compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Decoded and relocated.
    Editable,
    /// Listed in the table's `skip` entries.
    Skipped,
    /// Its data lives outside the layout's scope bank.
    OutOfScope,
    /// The pointer does not point into mapped ROM.
    Unmapped,
}

/// One table entry and its decoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub table: String,
    pub index: usize,
    /// The stored pointer; `None` for string blocks.
    pub pointer: Option<Pointer>,
    pub old_address: Option<Address>,
    /// Decoded content of editable slots.
    pub content: Option<Content>,
    pub state: SlotState,
}

/// Everything read for one layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub layout: String,
    pub slots: Vec<Slot>,
    pub diagnostics: Diagnostics,
}

impl Extraction {
    pub fn slot(&self, table: &str, index: usize) -> Option<&Slot> {
        self.slots.iter().find(|s| s.table == table && s.index == index)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.slots.iter().any(|s| s.table == table)
    }

    pub fn editable(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.state == SlotState::Editable)
    }
}

/// Read and decode every slot of a layout.
pub fn extract<S: AddressSpace + ?Sized>(space: &S, layout: &Layout) -> Result<Extraction> {
    let layout = &layout.bind(space)?;
    let codec = layout.codec.build();
    let mut slots = Vec::new();
    let mut diagnostics = Diagnostics::new();

    for table in &layout.tables {
        let entries: Vec<(Option<Pointer>, Option<Address>)> = match table.source()? {
            TableSource::Pointers(pointers) => pointers
                .read(space)?
                .into_iter()
                .map(|p| (Some(p), p.address()))
                .collect(),
            TableSource::Block(block) => block
                .scan(space)?
                .into_iter()
                .map(|a| (None, Some(a)))
                .collect(),
        };

        for (index, (pointer, old_address)) in entries.into_iter().enumerate() {
            let mut state = match old_address {
                _ if table.is_skipped(index) => SlotState::Skipped,
                None => SlotState::Unmapped,
                Some(a) if layout.scope_bank.is_some_and(|b| b != a.bank) => SlotState::OutOfScope,
                Some(_) => SlotState::Editable,
            };

            let mut content = None;
            if let (SlotState::Editable, Some(address)) = (state, old_address) {
                match space.read_to_window_end(address) {
                    Ok(bytes) => {
                        let decoded = codec.decode(&bytes);
                        diagnostics.extend_with_context(
                            decoded.diagnostics,
                            &format!("{}[{}] at {}", table.name, index, address),
                        );
                        content = Some(decoded.content);
                    }
                    Err(e) if e.code == ErrorCode::InvalidAddress => {
                        diagnostics.push(Diagnostic::new(
                            ErrorCode::InvalidAddress,
                            format!("{}[{}]: {}", table.name, index, e.message),
                        ));
                        state = SlotState::Unmapped;
                    }
                    Err(e) => return Err(e),
                }
            }
            if state == SlotState::Unmapped {
                log::debug!("{}[{}] does not point into ROM, leaving it alone", table.name, index);
            }

            slots.push(Slot {
                table: table.name.clone(),
                index,
                pointer,
                old_address,
                content,
                state,
            });
        }
    }

    log::info!(
        "{}: extracted {} slots ({} editable)",
        layout.name,
        slots.len(),
        slots.iter().filter(|s| s.state == SlotState::Editable).count()
    );

    Ok(Extraction {
        layout: layout.name.clone(),
        slots,
        diagnostics,
    })
}

// ============================================================================
// Edits
// ============================================================================

/// New content for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EditValue {
    Text(String),
    Bytes { hex: String },
}

impl EditValue {
    fn from_content(content: &Content) -> Self {
        match content {
            Content::Text(text) => EditValue::Text(text.clone()),
            Content::Bytes(bytes) => EditValue::Bytes {
                hex: hex::encode(bytes),
            },
        }
    }
}

/// Content overrides keyed by table name and slot number.
///
/// ```toml
/// [dialogue]
/// "003" = "WELCOME, @!~"
///
/// [maps]
/// "004" = { hex = "7f00..." }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Edits {
    tables: BTreeMap<String, BTreeMap<String, EditValue>>,
}

fn slot_key(index: usize) -> String {
    format!("{:03}", index)
}

impl Edits {
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| {
            RomError::new(ErrorCode::InvalidEdit, format!("cannot parse edits: {}", e))
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            RomError::new(
                ErrorCode::Io,
                format!("cannot read edits {}: {}", path.display(), e),
            )
        })?;
        Self::from_toml(&source)
    }

    /// Every editable slot of an extraction, as it currently reads.
    pub fn from_extraction(extraction: &Extraction) -> Self {
        let mut edits = Self::default();
        for slot in extraction.editable() {
            if let Some(content) = &slot.content {
                edits.set(&slot.table, slot.index, EditValue::from_content(content));
            }
        }
        edits
    }

    /// Merge another set of edits into this one.
    pub fn merge(&mut self, other: Edits) {
        for (table, slots) in other.tables {
            self.tables.entry(table).or_default().extend(slots);
        }
    }

    pub fn set(&mut self, table: &str, index: usize, value: EditValue) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(slot_key(index), value);
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| {
            RomError::new(ErrorCode::InvalidEdit, format!("cannot write edits: {}", e))
        })
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail if the edits name a table none of `layouts` defines.
    pub fn check_tables(&self, layouts: &[Layout]) -> Result<()> {
        for table in self.tables.keys() {
            if !layouts.iter().any(|l| l.table(table).is_some()) {
                return Err(RomError::new(
                    ErrorCode::UnknownTable,
                    format!("edits refer to unknown table '{}'", table),
                ));
            }
        }
        Ok(())
    }

    /// Replace slot content in `extraction`. Tables the extraction does not
    /// contain are ignored. Returns the number of slots changed.
    pub fn apply(&self, extraction: &mut Extraction) -> Result<usize> {
        let mut applied = 0;

        for (table, slots) in &self.tables {
            if !extraction.has_table(table) {
                continue;
            }

            for (key, value) in slots {
                let invalid = |message: String| RomError::new(ErrorCode::InvalidEdit, message);
                let index: usize = key
                    .parse()
                    .map_err(|_| invalid(format!("'{}' in [{}] is not a slot number", key, table)))?;

                let slot = extraction
                    .slots
                    .iter_mut()
                    .find(|s| s.table == *table && s.index == index)
                    .ok_or_else(|| invalid(format!("table '{}' has no slot {}", table, index)))?;
                if slot.state != SlotState::Editable {
                    return Err(invalid(format!(
                        "{}[{}] is {:?} and cannot be edited",
                        table, index, slot.state
                    )));
                }

                let content = match value {
                    EditValue::Text(text) => Content::Text(complete_text(slot, text)),
                    EditValue::Bytes { hex } => Content::Bytes(hex::decode(hex).map_err(|e| {
                        invalid(format!("{}[{}] has invalid hex: {}", table, index, e))
                    })?),
                };
                if let Some(current) = &slot.content {
                    if current.kind() != content.kind() {
                        return Err(invalid(format!(
                            "{}[{}] holds {}, not {}",
                            table,
                            index,
                            current.kind(),
                            content.kind()
                        )));
                    }
                }

                slot.content = Some(content);
                applied += 1;
            }
        }

        log::debug!("{}: applied {} edits", extraction.layout, applied);
        Ok(applied)
    }
}

/// Edited text for a slot whose decoded text keeps its terminator gets one
/// too if the edit left it out.
fn complete_text(slot: &Slot, text: &str) -> String {
    let terminated = slot
        .content
        .as_ref()
        .and_then(Content::as_text)
        .is_some_and(|current| current.ends_with(TERMINATOR_CHAR));

    if terminated && !text.contains(TERMINATOR_CHAR) {
        format!("{}{}", text, TERMINATOR_CHAR)
    } else {
        text.to_string()
    }
}

// ============================================================================
// Repack
// ============================================================================

/// Usage of one region after a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionUsage {
    pub id: String,
    pub used: usize,
    pub free: usize,
    pub relaxed: bool,
}

/// Summary of a repack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepackReport {
    pub layout: String,
    pub resources: usize,
    pub allocations: usize,
    pub shared: usize,
    pub pinned: usize,
    pub bytes: usize,
    pub regions: Vec<RegionUsage>,
    pub relaxed: bool,
    pub references: ReferenceStats,
}

impl fmt::Display for RepackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} resources, {} allocations ({} bytes), {} shared, {} unchanged",
            self.layout, self.resources, self.allocations, self.bytes, self.shared, self.pinned
        )?;
        for region in &self.regions {
            writeln!(
                f,
                "  {:<12} {:>5} used {:>5} free{}",
                region.id,
                region.used,
                region.free,
                if region.relaxed { " (expanded)" } else { "" }
            )?;
        }
        if self.references.updated + self.references.reset > 0 {
            writeln!(
                f,
                "  references: {} updated, {} reset",
                self.references.updated, self.references.reset
            )?;
        }
        Ok(())
    }
}

/// Relocate every editable slot of `extraction` and write the result.
///
/// `confirm` is asked before a region is widened past its configured end.
/// On error `space` is unchanged.
pub fn repack<S, F>(
    space: &mut S,
    layout: &Layout,
    extraction: &Extraction,
    confirm: F,
) -> Result<RepackReport>
where
    S: AddressSpace + Clone,
    F: FnMut(&Relaxation) -> bool,
{
    let layout = &layout.bind(&*space)?;
    let codec = layout.codec.build();
    let mut pool = layout.build_pool()?;
    let default_preference = RegionPreference::new(layout.regions.iter().map(|r| r.id.clone()));

    // Resource i belongs to slot owners[i].
    let mut resources = Vec::new();
    let mut owners = Vec::new();
    for (slot_index, slot) in extraction.slots.iter().enumerate() {
        let Some(old_address) = slot.old_address else {
            continue;
        };
        let table = layout.table(&slot.table).ok_or_else(|| {
            RomError::new(
                ErrorCode::UnknownTable,
                format!("layout '{}' has no table '{}'", layout.name, slot.table),
            )
        })?;

        let mut resource = match (slot.state, &slot.content) {
            (SlotState::Editable, Some(content)) => Resource::new(
                resources.len(),
                layout.dedup.key(old_address, content),
                content.clone(),
                old_address,
            )
            .with_preference(layout.preference_for(table)),
            (SlotState::Unmapped, _) => continue,
            _ => {
                let content = Content::Bytes(Vec::new());
                Resource::new(
                    resources.len(),
                    layout.dedup.key(old_address, &content),
                    content,
                    old_address,
                )
            }
        };
        if slot.state == SlotState::Skipped {
            resource.pin();
        }

        resources.push(resource);
        owners.push(slot_index);
    }

    let stats = compact_with(
        &mut resources,
        codec.as_ref(),
        &mut pool,
        &default_preference,
        &layout.compact_options(),
        confirm,
    )?;

    let mut staged = space.clone();
    let relocations = commit(&mut staged, &resources, &pool, &layout.commit_options())?;

    for (resource, &slot_index) in resources.iter().zip(&owners) {
        let slot = &extraction.slots[slot_index];
        let (Some(new_address), false) = (resource.new_address, resource.is_pinned()) else {
            continue;
        };
        let Some(table) = layout.table(&slot.table) else {
            continue;
        };
        if let TableSource::Pointers(pointers) = table.source()? {
            pointers.write_slot(&mut staged, slot.index, new_address)?;
        }
    }

    let mut references = ReferenceStats::default();
    for table in &layout.references {
        let stats = table.rewrite(&mut staged, &relocations)?;
        references.updated += stats.updated;
        references.reset += stats.reset;
    }

    *space = staged;

    let report = RepackReport {
        layout: layout.name.clone(),
        resources: resources.len(),
        allocations: stats.allocations,
        shared: stats.shared,
        pinned: stats.pinned,
        bytes: stats.bytes,
        regions: pool
            .regions()
            .map(|r| RegionUsage {
                id: r.id.clone(),
                used: r.used(),
                free: r.free(),
                relaxed: r.is_relaxed(),
            })
            .collect(),
        relaxed: stats.relaxed,
        references,
    };
    log::info!(
        "{}: wrote {} bytes in {} allocations",
        report.layout,
        report.bytes,
        report.allocations
    );
    Ok(report)
}
