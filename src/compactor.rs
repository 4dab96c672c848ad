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

//! Resource compaction.
//!
//! A compaction pass takes every resource that lives in a set of regions,
//! re-encodes it from its current content and lays the results out again
//! front to back. Resources that share a [`DedupKey`] end up sharing one
//! copy. The pass only plans: nothing touches the ROM until [`commit`] is
//! called with a fully planned resource set.
//!
//! ```text
//! resources ──encode──> bytes ──allocate──> new address ──commit──> ROM
//!                                   │
//!                  later resources with the same key reuse it
//! ```

use crate::codec::{Codec, Content};
use crate::error::{ErrorCode, Result, RomError};
use crate::pointer::MirrorRule;
use crate::region::{RegionPool, RegionPreference};
use crate::rom::{Address, AddressSpace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

// ============================================================================
// Dedup keys
// ============================================================================

/// Equality criterion used to merge resources into one allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupKey {
    /// Slots that pointed at the same bytes before editing keep sharing them.
    ByOrigin(Address),
    /// Slots whose current content is identical share one copy.
    ByContent(u64),
}

/// Which kind of [`DedupKey`] a pass uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupStrategy {
    #[default]
    ByOrigin,
    ByContent,
}

impl DedupStrategy {
    /// Key for a resource found at `old_address` with `content`.
    pub fn key(&self, old_address: Address, content: &Content) -> DedupKey {
        match self {
            DedupStrategy::ByOrigin => DedupKey::ByOrigin(old_address),
            DedupStrategy::ByContent => DedupKey::ByContent(content_hash(content)),
        }
    }
}

/// Stable hash of decoded content.
pub fn content_hash(content: &Content) -> u64 {
    match content {
        Content::Bytes(bytes) => {
            let mut buffer = Vec::with_capacity(bytes.len() + 1);
            buffer.push(b'b');
            buffer.extend_from_slice(bytes);
            xxh3_64(&buffer)
        }
        Content::Text(text) => {
            let mut buffer = Vec::with_capacity(text.len() + 1);
            buffer.push(b't');
            buffer.extend_from_slice(text.as_bytes());
            xxh3_64(&buffer)
        }
    }
}

// ============================================================================
// Resources
// ============================================================================

/// One independently relocated piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub index: usize,
    pub dedup_key: DedupKey,
    pub content: Content,
    pub encoded: Option<Vec<u8>>,
    pub old_address: Address,
    pub new_address: Option<Address>,
    /// Overrides the pass preference for this resource.
    pub preference: Option<RegionPreference>,
    pub processed: bool,
}

impl Resource {
    pub fn new(index: usize, dedup_key: DedupKey, content: Content, old_address: Address) -> Self {
        Self {
            index,
            dedup_key,
            content,
            encoded: None,
            old_address,
            new_address: None,
            preference: None,
            processed: false,
        }
    }

    pub fn with_preference(mut self, preference: RegionPreference) -> Self {
        self.preference = Some(preference);
        self
    }

    /// Leave the resource where it is; its bytes are not rewritten.
    pub fn pin(&mut self) {
        self.new_address = Some(self.old_address);
        self.encoded = None;
        self.processed = true;
    }

    pub fn is_pinned(&self) -> bool {
        self.processed && self.encoded.is_none()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why a compaction pass could not be planned.
#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("resource {resource_index} needs {required} bytes but at most {available} are free")]
    OutOfSpace {
        resource_index: usize,
        required: usize,
        available: usize,
    },

    #[error("resource {resource_index} cannot be encoded: {source}")]
    Encode {
        resource_index: usize,
        #[source]
        source: RomError,
    },

    #[error(transparent)]
    Pool(#[from] RomError),
}

impl From<CompactionError> for RomError {
    fn from(error: CompactionError) -> Self {
        match error {
            CompactionError::OutOfSpace { .. } => {
                RomError::new(ErrorCode::CompactionOutOfSpace, error.to_string())
                    .with_hint("shorten the content or allow the region to expand")
            }
            CompactionError::Encode { .. } => {
                RomError::new(ErrorCode::EncodeFailed, error.to_string())
            }
            CompactionError::Pool(inner) => inner,
        }
    }
}

// ============================================================================
// Planning
// ============================================================================

/// One-time widening of a region, offered when a resource does not fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relaxation {
    pub region: String,
    pub end: u32,
}

/// Variations of the compaction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactOptions {
    /// Only resources whose old address is in this bank are relocated.
    pub scope_bank: Option<u8>,
    pub relaxation: Option<Relaxation>,
}

/// Outcome of a successful pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Resources that received their own allocation.
    pub allocations: usize,
    /// Resources that reuse another resource's allocation.
    pub shared: usize,
    /// Resources left where they were.
    pub pinned: usize,
    pub bytes: usize,
    pub relaxed: bool,
}

/// Plan a pass with default options; relaxation is never offered.
pub fn compact(
    resources: &mut [Resource],
    codec: &dyn Codec,
    pool: &mut RegionPool,
    preference: &RegionPreference,
) -> std::result::Result<(), CompactionError> {
    compact_with(
        resources,
        codec,
        pool,
        preference,
        &CompactOptions::default(),
        |_| false,
    )
    .map(|_| ())
}

/// Plan a pass.
///
/// On error `resources` and `pool` are left exactly as they were. `confirm`
/// is asked at most once, when a resource does not fit and the options
/// carry a relaxation for a region the resource may use.
pub fn compact_with<F>(
    resources: &mut [Resource],
    codec: &dyn Codec,
    pool: &mut RegionPool,
    preference: &RegionPreference,
    options: &CompactOptions,
    mut confirm: F,
) -> std::result::Result<CompactionStats, CompactionError>
where
    F: FnMut(&Relaxation) -> bool,
{
    let mut work = resources.to_vec();
    let mut plan_pool = pool.clone();
    let mut stats = CompactionStats::default();
    let mut relaxation_offered = false;

    if let Some(bank) = options.scope_bank {
        for resource in work.iter_mut().filter(|r| !r.processed && r.old_address.bank != bank) {
            resource.pin();
        }
    }
    stats.pinned = work.iter().filter(|r| r.is_pinned()).count();

    for i in 0..work.len() {
        if work[i].processed {
            continue;
        }

        let encoded = codec
            .encode(&work[i].content)
            .map_err(|source| CompactionError::Encode {
                resource_index: work[i].index,
                source,
            })?;
        let size = encoded.len();
        let wanted = work[i].preference.as_ref().unwrap_or(preference);

        let address = match plan_pool.allocate(size, wanted)? {
            Some(address) => address,
            None => {
                let out_of_space = |pool: &RegionPool| -> std::result::Result<CompactionError, CompactionError> {
                    Ok(CompactionError::OutOfSpace {
                        resource_index: work[i].index,
                        required: size,
                        available: pool.max_available(wanted)?,
                    })
                };

                let relax = options
                    .relaxation
                    .as_ref()
                    .filter(|r| !relaxation_offered && wanted.contains(&r.region));
                let Some(relax) = relax else {
                    return Err(out_of_space(&plan_pool)?);
                };

                relaxation_offered = true;
                if !confirm(relax) {
                    log::warn!("relaxation of region '{}' declined", relax.region);
                    return Err(out_of_space(&plan_pool)?);
                }
                plan_pool.widen(&relax.region, relax.end)?;
                stats.relaxed = true;

                match plan_pool.allocate(size, wanted)? {
                    Some(address) => address,
                    None => return Err(out_of_space(&plan_pool)?),
                }
            }
        };

        stats.allocations += 1;
        stats.bytes += size;

        let index = work[i].index;
        let key = work[i].dedup_key;
        let content = work[i].content.clone();
        for other in work[i + 1..].iter_mut() {
            if other.processed || other.dedup_key != key {
                continue;
            }
            if matches!(key, DedupKey::ByContent(_)) && other.content != content {
                log::warn!(
                    "content hash collision between resources {} and {}",
                    index,
                    other.index
                );
                continue;
            }
            other.new_address = Some(address);
            other.encoded = Some(encoded.clone());
            other.processed = true;
            stats.shared += 1;
        }

        let resource = &mut work[i];
        resource.new_address = Some(address);
        resource.encoded = Some(encoded);
        resource.processed = true;
    }

    log::debug!(
        "planned {} allocations ({} bytes), {} shared, {} pinned",
        stats.allocations,
        stats.bytes,
        stats.shared,
        stats.pinned
    );

    resources.clone_from_slice(&work);
    *pool = plan_pool;
    Ok(stats)
}

// ============================================================================
// Commit
// ============================================================================

/// How a planned pass is written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOptions {
    /// Byte written over the unused part of every region the pass
    /// allocated from, `None` to leave it.
    pub fill: Option<u8>,
    pub mirror: Option<MirrorRule>,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            fill: Some(0xFF),
            mirror: None,
        }
    }
}

/// Mapping from old resource addresses to their new homes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relocations {
    map: BTreeMap<Address, Address>,
}

impl Relocations {
    /// Build from a planned resource set. When two resources moved away from
    /// the same old address, the first one wins.
    pub fn from_resources(resources: &[Resource]) -> Self {
        let mut map = BTreeMap::new();
        for resource in resources {
            if let Some(new) = resource.new_address {
                map.entry(resource.old_address).or_insert(new);
            }
        }
        Self { map }
    }

    pub fn lookup(&self, old: Address) -> Option<Address> {
        self.map.get(&old).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Write a planned pass to the address space.
///
/// Every resource must have been planned. Shared allocations are written
/// once. Pinned resources are not written at all. Padding only touches
/// regions that received an allocation in this pass.
pub fn commit<S: AddressSpace + ?Sized>(
    space: &mut S,
    resources: &[Resource],
    pool: &RegionPool,
    options: &CommitOptions,
) -> Result<Relocations> {
    if let Some(unplanned) = resources.iter().find(|r| r.new_address.is_none()) {
        return Err(RomError::new(
            ErrorCode::EncodeFailed,
            format!("resource {} has not been planned", unplanned.index),
        )
        .with_hint("run a compaction pass before committing"));
    }

    let mut written = HashSet::new();
    for resource in resources {
        let (Some(address), Some(bytes)) = (resource.new_address, &resource.encoded) else {
            continue;
        };
        if !written.insert(address) {
            continue;
        }

        space.write_bytes(address, bytes)?;
        if let Some(mirror) = &options.mirror {
            if let Some(copy) = mirror.apply(address) {
                space.write_bytes(copy, bytes)?;
            }
        }
    }

    if let Some(fill) = options.fill {
        for region in pool.regions().filter(|r| r.used() > 0) {
            let unused = region.unused();
            if unused.is_empty() {
                continue;
            }
            let start = Address::new(region.bank, unused.start as u16)?;
            let padding = vec![fill; unused.len()];
            space.write_bytes(start, &padding)?;
            log::debug!("padded {} bytes of '{}' from {}", padding.len(), region.id, start);
        }
    }

    Ok(Relocations::from_resources(resources))
}
