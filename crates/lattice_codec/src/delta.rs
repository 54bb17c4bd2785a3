//! # Delta Serialization
//!
//! The delta serializer keeps a *shadow* of every serialized column plus
//! a per-store membership cache. Its first `serialize` call walks the
//! world's flattened columns, attaches shadows, and emits a full
//! (mode 0) snapshot that doubles as the baseline sync; every later call
//! emits a delta (mode 1) with the same framing but only changed data
//! inside the entities block:
//!
//! - a tag entry is emitted only for newly added members;
//! - a typed scalar compares bit-for-bit against its shadow, syncing it;
//! - a typed subarray emits only the indices that differ (all of them
//!   for a newly added member);
//! - a faux value compares by deep equality and deep-clones into the
//!   shadow on change.
//!
//! Entity headers that produced no payload are rewound, and a property
//! section with zero writes rewinds its 6-byte pid header too.
//!
//! Shadow drift after out-of-band mutation is not detected; callers must
//! [`DeltaSerializer::reset`] after any non-delta mutation they intend to
//! ignore.

use std::collections::HashSet;

use lattice_core::{Eid, ShadowColumn, World};
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::complex::ComplexBuffer;
use crate::snapshot::{
    apply_header, column_facts, decode_full_into, flattened_pids, read_entities, read_header,
    read_preamble, write_faux_value, write_header, ColumnFacts, PidTarget, MODE_DELTA, MODE_FULL,
    PID_HEADER_BYTES, SERIALIZER_VERSION,
};
use crate::wire::{ByteReader, ByteWriter};

/// Per-pid shadow storage.
#[derive(Debug)]
enum ShadowSlot {
    /// Tag stores carry no data to shadow.
    Tag,
    /// Snapshot of one column.
    Column(ShadowColumn),
}

/// Counters from the most recent delta emission.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaStats {
    /// Total bytes of the produced buffer.
    pub bytes: usize,
    /// Property sections that carried at least one write.
    pub pids_emitted: usize,
    /// Property sections rewound for carrying none.
    pub pids_rewound: usize,
}

/// Stateful encoder producing a baseline snapshot followed by deltas.
#[derive(Debug, Default)]
pub struct DeltaSerializer {
    shadows: Vec<ShadowSlot>,
    membership: Vec<HashSet<Eid>>,
    primed: bool,
    stats: DeltaStats,
}

/// Creates a delta serializer for a world. The first
/// [`DeltaSerializer::serialize`] call emits the shadow-syncing full
/// baseline.
#[must_use]
pub fn create_delta_serializer(world: &World) -> DeltaSerializer {
    DeltaSerializer {
        shadows: Vec::with_capacity(flattened_pids(world).len()),
        membership: Vec::with_capacity(world.components().len()),
        primed: false,
        stats: DeltaStats::default(),
    }
}

fn current_membership(world: &World) -> Vec<HashSet<Eid>> {
    world
        .components()
        .iter()
        .map(|comp| {
            world
                .entities()
                .dense()
                .iter()
                .copied()
                .filter(|&eid| world.masks().test(comp.generation_id, eid, comp.bitflag))
                .collect()
        })
        .collect()
}

impl DeltaSerializer {
    /// Drops all shadows and membership caches; the next `serialize`
    /// emits a fresh full baseline.
    pub fn reset(&mut self) {
        self.shadows.clear();
        self.membership.clear();
        self.primed = false;
        self.stats = DeltaStats::default();
    }

    /// Counters from the most recent emission.
    #[must_use]
    pub fn stats(&self) -> DeltaStats {
        self.stats
    }

    /// Serializes the world: a full baseline on the first call, a delta
    /// afterwards. `max_bytes` pre-sizes the output buffer.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnsupportedTypeTag`] when a faux value does not
    /// match its declared shape.
    pub fn serialize(&mut self, world: &World, max_bytes: Option<usize>) -> CodecResult<Vec<u8>> {
        if self.primed {
            self.serialize_delta(world, max_bytes)
        } else {
            self.prime(world);
            let bytes = crate::snapshot::serialize_full(world)?;
            self.stats = DeltaStats { bytes: bytes.len(), ..DeltaStats::default() };
            Ok(bytes)
        }
    }

    /// Snapshots every column and membership set as the new baseline.
    fn prime(&mut self, world: &World) {
        self.shadows = flattened_pids(world)
            .into_iter()
            .map(|target| match target {
                PidTarget::TagStore { .. } => ShadowSlot::Tag,
                PidTarget::Column { comp, col } => {
                    ShadowSlot::Column(world.components()[comp].store.shadow(col))
                }
            })
            .collect();
        self.membership = current_membership(world);
        self.primed = true;
    }

    /// Shadows for components registered since the last call. Their
    /// membership caches start empty, so every member counts as newly
    /// added and gets a full write regardless of shadow contents.
    fn extend_for_new_pids(&mut self, world: &World) {
        let pids = flattened_pids(world);
        for target in pids.iter().skip(self.shadows.len()) {
            self.shadows.push(match *target {
                PidTarget::TagStore { .. } => ShadowSlot::Tag,
                PidTarget::Column { comp, col } => {
                    ShadowSlot::Column(world.components()[comp].store.shadow(col))
                }
            });
        }
        while self.membership.len() < world.components().len() {
            self.membership.push(HashSet::new());
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::too_many_lines)]
    fn serialize_delta(&mut self, world: &World, max_bytes: Option<usize>) -> CodecResult<Vec<u8>> {
        self.extend_for_new_pids(world);

        let mut w = ByteWriter::with_capacity(max_bytes.unwrap_or(256));
        w.write_u16(SERIALIZER_VERSION);
        w.write_u8(MODE_DELTA);
        if world.entities().is_empty() {
            self.membership = current_membership(world);
            self.stats = DeltaStats { bytes: w.position(), ..DeltaStats::default() };
            return Ok(w.into_bytes());
        }

        write_header(&mut w, world);

        let region_pos = w.position();
        w.write_u32(0);
        let region_start = w.position();
        let mut complex = ComplexBuffer::new();
        let mut stats = DeltaStats::default();

        let current = current_membership(world);
        let newly: Vec<HashSet<Eid>> = current
            .iter()
            .zip(self.membership.iter())
            .map(|(now, before)| now.difference(before).copied().collect())
            .collect();

        let pids = flattened_pids(world);
        for (pid, &target) in pids.iter().enumerate() {
            let comp = target.comp();
            let wc = &world.components()[comp];
            let (generation, flag) = (wc.generation_id, wc.bitflag);
            let facts = column_facts(world, target);

            let pid_pos = w.position();
            w.write_u16(pid as u16);
            let count_pos = w.position();
            w.write_u32(0);
            let mut count = 0u32;

            for &eid in world.entities().dense() {
                if !world.masks().test(generation, eid, flag) {
                    continue;
                }
                let newly_added = newly[comp].contains(&eid);
                let eid_pos = w.position();
                w.write_u32(eid);

                let emitted = self.write_delta_column(
                    &mut w,
                    &mut complex,
                    world,
                    target,
                    &facts,
                    pid,
                    eid,
                    newly_added,
                )?;
                if emitted {
                    count += 1;
                } else {
                    w.rewind_to(eid_pos);
                }
            }

            if count == 0 {
                debug_assert_eq!(w.position(), pid_pos + PID_HEADER_BYTES);
                w.rewind_to(pid_pos);
                stats.pids_rewound += 1;
            } else {
                w.patch_u32(count_pos, count);
                stats.pids_emitted += 1;
            }
        }

        let region_len = (w.position() - region_start) as u32;
        w.patch_u32(region_pos, region_len);
        let complex_bytes = complex.to_bytes();
        w.write_u32(complex_bytes.len() as u32);
        w.write_bytes(&complex_bytes);

        self.membership = current;
        stats.bytes = w.position();
        self.stats = stats;
        debug!(
            bytes = self.stats.bytes,
            emitted = self.stats.pids_emitted,
            rewound = self.stats.pids_rewound,
            "delta serialized"
        );
        Ok(w.into_bytes())
    }

    /// Emits one entity's delta payload.
    ///
    /// # Returns
    ///
    /// Whether anything was written (the caller rewinds the eid header
    /// otherwise). Shadows are synced as a side effect either way.
    #[allow(clippy::too_many_arguments, clippy::cast_precision_loss)]
    fn write_delta_column(
        &mut self,
        w: &mut ByteWriter,
        complex: &mut ComplexBuffer,
        world: &World,
        target: PidTarget,
        facts: &ColumnFacts,
        pid: usize,
        eid: Eid,
        newly_added: bool,
    ) -> CodecResult<bool> {
        let PidTarget::Column { comp, col } = target else {
            return Ok(newly_added); // tag: emit only on entry
        };
        let store = &world.components()[comp].store;

        match facts {
            ColumnFacts::Tag => Ok(newly_added),
            ColumnFacts::Scalar { element } => {
                let ShadowSlot::Column(ShadowColumn::Scalar(shadow)) = &mut self.shadows[pid]
                else {
                    return Err(shadow_shape_error(pid));
                };
                let value = store.scalar_get(col, eid);
                let changed = shadow.get(eid as usize).to_bits() != value.to_bits();
                if changed {
                    shadow.set(*element, eid as usize, value);
                }
                if changed || newly_added {
                    w.write_element(*element, value);
                    return Ok(true);
                }
                Ok(false)
            }
            ColumnFacts::Subarray { element, len, index_type } => {
                let ShadowSlot::Column(ShadowColumn::Subarray { data, .. }) =
                    &mut self.shadows[pid]
                else {
                    return Err(shadow_shape_error(pid));
                };
                let mut changed: Vec<(usize, f64)> = Vec::new();
                for i in 0..*len {
                    let value = store.subarray_get(col, eid, i);
                    let at = eid as usize * *len + i;
                    if data.get(at).to_bits() != value.to_bits() {
                        data.set(*element, at, value);
                        changed.push((i, value));
                    }
                }
                if newly_added {
                    w.write_element(*index_type, *len as f64);
                    for i in 0..*len {
                        w.write_element(*index_type, i as f64);
                        w.write_element(*element, store.subarray_get(col, eid, i));
                    }
                    Ok(true)
                } else if changed.is_empty() {
                    Ok(false)
                } else {
                    w.write_element(*index_type, changed.len() as f64);
                    for (i, value) in changed {
                        w.write_element(*index_type, i as f64);
                        w.write_element(*element, value);
                    }
                    Ok(true)
                }
            }
            ColumnFacts::Faux { kind, component_type, key } => {
                let ShadowSlot::Column(ShadowColumn::Faux(shadow)) = &mut self.shadows[pid]
                else {
                    return Err(shadow_shape_error(pid));
                };
                let value = store.faux_get(col, eid);
                let changed = shadow.get(&eid) != value;
                if changed {
                    match value {
                        Some(v) => {
                            shadow.insert(eid, v.clone());
                        }
                        None => {
                            shadow.remove(&eid);
                        }
                    }
                }
                if changed || newly_added {
                    write_faux_value(w, complex, component_type, key, kind, value, eid)?;
                    return Ok(true);
                }
                Ok(false)
            }
        }
    }
}

fn shadow_shape_error(pid: usize) -> CodecError {
    CodecError::MalformedPayload {
        detail: format!("shadow for pid {pid} does not match its column; reset the serializer"),
    }
}

/// Applies a serialized buffer to a world.
///
/// Mode-0 buffers perform a full restore and establish the baseline.
/// Mode-1 buffers patch only the `(pid, eid, value)` tuples present,
/// leaving everything else untouched; mask membership is **not** cleared
/// for components removed at the source - callers must re-send a full
/// snapshot after removals.
///
/// # Errors
///
/// [`CodecError::ApplyDeltaWithoutBaseline`] for a mode-1 buffer when no
/// baseline has been established on this world;
/// [`CodecError::VersionMismatch`] on a foreign version.
pub fn apply_delta(bytes: &[u8], world: &mut World) -> CodecResult<()> {
    let mut r = ByteReader::new(bytes);
    let mode = read_preamble(&mut r)?;
    match mode {
        MODE_FULL => decode_full_into(bytes, world),
        MODE_DELTA => {
            if !world.has_delta_baseline() {
                return Err(CodecError::ApplyDeltaWithoutBaseline);
            }
            if r.remaining() == 0 {
                world.reset();
                world.set_delta_baseline(true);
                return Ok(());
            }
            let header = read_header(&mut r)?;
            apply_header(world, header, false)?;
            read_entities(&mut r, world)?;
            Ok(())
        }
        other => Err(CodecError::MalformedPayload {
            detail: format!("unknown mode byte {other}"),
        }),
    }
}
