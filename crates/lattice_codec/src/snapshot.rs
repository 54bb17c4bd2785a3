//! # Full Binary Snapshots
//!
//! Wire framing (version 2, big-endian):
//!
//! ```text
//! u16  version
//! u8   mode                      (0 = full, 1 = delta)
//! sparse_set   entity sparse set (u16 elements)
//! uint_array   removed ids
//! u16  entity cursor
//! u16  size
//! u32  bitflag cursor
//! u32  frame
//! u16  component count
//!   repeat: string type; u32 generation; u32 bitflag
//! u16  query count
//!   repeat: string key; serialized query
//! u16  dirty query count
//!   repeat: string key
//! entities block
//! ```
//!
//! A snapshot of a world with no live entities is just the 3-byte
//! version + mode prefix.
//!
//! The entities block opens with the byte length of the per-property
//! region, so a decoder can pre-fetch the out-of-band complex buffer that
//! follows it before interpreting faux payloads. Properties are keyed by
//! `pid` - their position in the stable flattened walk of the world's
//! component map (insertion order; per component its leaf columns, or the
//! store itself for tags).

use lattice_core::{
    ColumnInfo, Eid, ElementType, FauxKind, QueryState, Registry, SparseSet, World,
    DEFAULT_WORLD_SIZE,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::complex::{ComplexBuffer, ComplexData};
use crate::error::{CodecError, CodecResult};
use crate::wire::{ByteReader, ByteWriter};

/// The serializer format version this codec speaks.
pub const SERIALIZER_VERSION: u16 = 2;

/// Mode byte of a full snapshot.
pub const MODE_FULL: u8 = 0;

/// Mode byte of a delta buffer.
pub const MODE_DELTA: u8 = 1;

/// Faux flag byte for a null value.
pub const NULL_FLAG: u8 = 254;

/// Faux flag byte for an absent (undefined) value.
pub const UNDEFINED_FLAG: u8 = 255;

/// Faux flag byte preceding a concrete payload.
pub const CONCRETE_VALUE_MARKER: u8 = 0;

/// Byte length of a pid section header (u16 pid + u32 write count).
pub(crate) const PID_HEADER_BYTES: usize = 6;

// =============================================================================
// Property enumeration
// =============================================================================

/// One slot in the stable flattened property walk.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PidTarget {
    /// A tag store: the store itself is the property.
    TagStore {
        /// World component index.
        comp: usize,
    },
    /// One leaf column of a component's store.
    Column {
        /// World component index.
        comp: usize,
        /// Column index within the store.
        col: usize,
    },
}

impl PidTarget {
    pub(crate) fn comp(self) -> usize {
        match self {
            Self::TagStore { comp } | Self::Column { comp, .. } => comp,
        }
    }
}

/// Walks the world's component map in insertion order, flattening each
/// store's leaf columns (or the store itself for tags) into pid order.
pub(crate) fn flattened_pids(world: &World) -> Vec<PidTarget> {
    let mut pids = Vec::new();
    for (comp, wc) in world.components().iter().enumerate() {
        if wc.store.columns().is_empty() {
            pids.push(PidTarget::TagStore { comp });
        } else {
            for col in 0..wc.store.columns().len() {
                pids.push(PidTarget::Column { comp, col });
            }
        }
    }
    pids
}

/// Owned layout facts for one pid, decoupled from world borrows.
#[derive(Debug, Clone)]
pub(crate) enum ColumnFacts {
    Tag,
    Scalar {
        element: ElementType,
    },
    Subarray {
        element: ElementType,
        len: usize,
        index_type: ElementType,
    },
    Faux {
        kind: FauxKind,
        component_type: String,
        key: String,
    },
}

pub(crate) fn column_facts(world: &World, target: PidTarget) -> ColumnFacts {
    match target {
        PidTarget::TagStore { .. } => ColumnFacts::Tag,
        PidTarget::Column { comp, col } => {
            let wc = &world.components()[comp];
            let column = &wc.store.columns()[col];
            match column.info() {
                ColumnInfo::Scalar { element, .. } => ColumnFacts::Scalar { element },
                ColumnInfo::Subarray { element, len, index_type } => {
                    ColumnFacts::Subarray { element, len, index_type }
                }
                ColumnInfo::Faux { kind } => ColumnFacts::Faux {
                    kind: kind.clone(),
                    component_type: wc.schema.type_name().to_string(),
                    key: column.key().to_string(),
                },
            }
        }
    }
}

// =============================================================================
// Faux payloads
// =============================================================================

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn sorted_props(props: &[(String, FauxKind)]) -> Vec<&(String, FauxKind)> {
    let mut sorted: Vec<&(String, FauxKind)> = props.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
}

/// Writes an inline faux payload (flag byte already emitted).
#[allow(clippy::cast_possible_truncation)]
fn write_inline(w: &mut ByteWriter, kind: &FauxKind, value: &Value) -> CodecResult<()> {
    let mismatch = || CodecError::UnsupportedTypeTag {
        tag: format!("declared {kind:?} got {}", value_type_name(value)),
    };
    match kind {
        FauxKind::String => {
            let s = value.as_str().ok_or_else(mismatch)?;
            let bytes = crate::wire::latin1_bytes(s);
            let len = bytes.len().min(u8::MAX as usize);
            w.write_u8(len as u8);
            w.write_bytes(&bytes[..len]);
        }
        FauxKind::Number => w.write_f64(value.as_f64().ok_or_else(mismatch)?),
        FauxKind::Boolean => w.write_u8(u8::from(value.as_bool().ok_or_else(mismatch)?)),
        FauxKind::Object(props) => {
            let obj = value.as_object().ok_or_else(mismatch)?;
            for (key, sub_kind) in sorted_props(props) {
                write_entry(w, sub_kind, obj.get(key))?;
            }
        }
        FauxKind::Array(items) => {
            let arr = value.as_array().ok_or_else(mismatch)?;
            w.write_u16(arr.len() as u16);
            for item in arr {
                write_entry(w, items, Some(item))?;
            }
        }
        FauxKind::Any => {
            return Err(CodecError::UnsupportedTypeTag {
                tag: "inline encoding of an opaque value".to_string(),
            })
        }
    }
    Ok(())
}

/// Writes a flag byte plus inline payload for one (sub-)value.
fn write_entry(w: &mut ByteWriter, kind: &FauxKind, value: Option<&Value>) -> CodecResult<()> {
    match value {
        None => w.write_u8(UNDEFINED_FLAG),
        Some(Value::Null) => w.write_u8(NULL_FLAG),
        Some(v) => {
            w.write_u8(CONCRETE_VALUE_MARKER);
            write_inline(w, kind, v)?;
        }
    }
    Ok(())
}

fn read_inline(r: &mut ByteReader<'_>, kind: &FauxKind) -> CodecResult<Value> {
    Ok(match kind {
        FauxKind::String => {
            let len = r.read_u8()? as usize;
            Value::String(crate::wire::latin1_string(r.read_bytes(len)?))
        }
        FauxKind::Number => {
            serde_json::Number::from_f64(r.read_f64()?).map_or(Value::Null, Value::Number)
        }
        FauxKind::Boolean => Value::Bool(r.read_u8()? != 0),
        FauxKind::Object(props) => {
            let mut map = serde_json::Map::new();
            for (key, sub_kind) in sorted_props(props) {
                if let Some(v) = read_entry(r, sub_kind)? {
                    map.insert(key.clone(), v);
                }
            }
            Value::Object(map)
        }
        FauxKind::Array(items) => {
            let len = r.read_u16()? as usize;
            let mut arr = Vec::with_capacity(len);
            for _ in 0..len {
                arr.push(read_entry(r, items)?.unwrap_or(Value::Null));
            }
            Value::Array(arr)
        }
        FauxKind::Any => {
            return Err(CodecError::UnsupportedTypeTag {
                tag: "inline decoding of an opaque value".to_string(),
            })
        }
    })
}

fn read_entry(r: &mut ByteReader<'_>, kind: &FauxKind) -> CodecResult<Option<Value>> {
    match r.read_u8()? {
        UNDEFINED_FLAG => Ok(None),
        NULL_FLAG => Ok(Some(Value::Null)),
        CONCRETE_VALUE_MARKER => Ok(Some(read_inline(r, kind)?)),
        other => Err(CodecError::MalformedPayload {
            detail: format!("unknown faux flag byte {other}"),
        }),
    }
}

/// Writes one entity's faux value: flag byte, then an inline payload or
/// an out-of-band complex record.
pub(crate) fn write_faux_value(
    w: &mut ByteWriter,
    complex: &mut ComplexBuffer,
    component_type: &str,
    key: &str,
    kind: &FauxKind,
    value: Option<&Value>,
    eid: Eid,
) -> CodecResult<()> {
    match value {
        None => w.write_u8(UNDEFINED_FLAG),
        Some(Value::Null) => w.write_u8(NULL_FLAG),
        Some(v) => {
            w.write_u8(CONCRETE_VALUE_MARKER);
            if kind.is_inline() {
                write_inline(w, kind, v)?;
            } else {
                complex.insert(eid, component_type, key, v);
            }
        }
    }
    Ok(())
}

/// Reads one entity's faux value. `None` means the value was absent
/// (undefined).
pub(crate) fn read_faux_value(
    r: &mut ByteReader<'_>,
    complex: &ComplexData,
    component_type: &str,
    key: &str,
    kind: &FauxKind,
    eid: Eid,
) -> CodecResult<Option<Value>> {
    match r.read_u8()? {
        UNDEFINED_FLAG => Ok(None),
        NULL_FLAG => Ok(Some(Value::Null)),
        CONCRETE_VALUE_MARKER => {
            if kind.is_inline() {
                Ok(Some(read_inline(r, kind)?))
            } else {
                Ok(Some(
                    complex
                        .get(eid, component_type, key)
                        .cloned()
                        .unwrap_or(Value::Null),
                ))
            }
        }
        other => Err(CodecError::MalformedPayload {
            detail: format!("unknown faux flag byte {other}"),
        }),
    }
}

// =============================================================================
// Header
// =============================================================================

fn sparse_set_from(dense: Vec<u32>, sparse: Vec<i32>) -> SparseSet {
    let mut set = SparseSet::new(0);
    set.reset(Some(dense), Some(sparse));
    set
}

/// Writes everything before the entities block.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub(crate) fn write_header(w: &mut ByteWriter, world: &World) {
    w.write_sparse_set(world.entities());
    let removed: Vec<u32> = world.removed().collect();
    w.write_uint_array(&removed);
    w.write_u16(world.get_entity_cursor() as u16);
    w.write_u16(world.size() as u16);
    w.write_u32(world.bitflag());
    w.write_u32(world.frame());

    w.write_u16(world.components().len() as u16);
    for comp in world.components() {
        w.write_string(comp.schema.type_name());
        w.write_u32(comp.generation_id as u32);
        w.write_u32(comp.bitflag);
    }

    w.write_u16(world.query_order().len() as u16);
    for key in world.query_order() {
        let state = world.query_state(key).expect("ordered query exists");
        w.write_string(key);
        w.write_sparse_set(&state.members);
        w.write_sparse_set(&state.to_remove);
        w.write_sparse_set(&state.entered);
        w.write_string(&state.key);
        let masks: Vec<(u32, f64)> = state
            .masks
            .iter()
            .map(|&(generation, mask)| (generation as u32, f64::from(mask)))
            .collect();
        w.write_number_object(&masks);
        let generations: Vec<f64> = state.generations.iter().map(|&g| g as f64).collect();
        w.write_number_array(&generations);
    }

    w.write_u16(world.dirty_queries().len() as u16);
    for key in world.dirty_queries() {
        w.write_string(key);
    }
}

/// Everything before the entities block, decoded.
pub(crate) struct DecodedHeader {
    pub dense: Vec<u32>,
    pub sparse: Vec<i32>,
    pub removed: Vec<u32>,
    pub cursor: u32,
    pub size: usize,
    pub bitflag: u32,
    pub frame: u32,
    pub components: Vec<(String, usize, u32)>,
    pub queries: Vec<QueryState>,
    pub dirty: Vec<String>,
}

/// Reads everything before the entities block.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn read_header(r: &mut ByteReader<'_>) -> CodecResult<DecodedHeader> {
    let (dense, sparse) = r.read_sparse_set()?;
    let removed = r.read_uint_array()?;
    let cursor = u32::from(r.read_u16()?);
    let size = r.read_u16()? as usize;
    let bitflag = r.read_u32()?;
    let frame = r.read_u32()?;

    let component_count = r.read_u16()? as usize;
    let mut components = Vec::with_capacity(component_count);
    for _ in 0..component_count {
        let name = r.read_string()?;
        let generation = r.read_u32()? as usize;
        let flag = r.read_u32()?;
        components.push((name, generation, flag));
    }

    let query_count = r.read_u16()? as usize;
    let mut queries = Vec::with_capacity(query_count);
    for _ in 0..query_count {
        let _map_key = r.read_string()?;
        let (m_dense, m_sparse) = r.read_sparse_set()?;
        let (t_dense, t_sparse) = r.read_sparse_set()?;
        let (e_dense, e_sparse) = r.read_sparse_set()?;
        let key = r.read_string()?;
        let masks: Vec<(usize, u32)> = r
            .read_number_object()?
            .into_iter()
            .map(|(generation, mask)| (generation as usize, mask as u32))
            .collect();
        let generations: Vec<usize> =
            r.read_number_array()?.into_iter().map(|g| g as usize).collect();
        queries.push(QueryState {
            components: key.split('|').map(str::to_string).collect(),
            key,
            members: sparse_set_from(m_dense, m_sparse),
            entered: sparse_set_from(e_dense, e_sparse),
            to_remove: sparse_set_from(t_dense, t_sparse),
            masks,
            generations,
        });
    }

    let dirty_count = r.read_u16()? as usize;
    let dirty = (0..dirty_count)
        .map(|_| r.read_string())
        .collect::<CodecResult<Vec<String>>>()?;

    Ok(DecodedHeader {
        dense,
        sparse,
        removed,
        cursor,
        size,
        bitflag,
        frame,
        components,
        queries,
        dirty,
    })
}

/// Installs a decoded header: entity sets, cursors, component
/// registrations (with their serialized mask coordinates) and query
/// states. With `reset` the world's stores and masks are cleared first
/// (full decode); without it they are left intact for a delta patch.
pub(crate) fn apply_header(
    world: &mut World,
    header: DecodedHeader,
    reset: bool,
) -> CodecResult<()> {
    if header.size != world.size() {
        return Err(CodecError::MalformedPayload {
            detail: format!(
                "snapshot is sized for {} entities, world holds {}",
                header.size,
                world.size()
            ),
        });
    }
    if reset {
        world.reset();
        world.clear_registration();
    }
    world.restore_entities(header.dense, header.sparse);
    world.restore_removed(header.removed);
    world.set_entity_cursor(header.cursor);
    world.set_frame(header.frame);

    let registry = world.registry().clone();
    let mut max_generation = 0usize;
    let mut wrapped = false;
    for (name, generation, flag) in &header.components {
        let schema = registry
            .component(name)
            .ok_or_else(|| lattice_core::EcsError::ComponentNull { name: name.clone() })?;
        world.register_component_raw(schema, *generation, *flag);
        max_generation = max_generation.max(*generation);
    }
    for (_, generation, flag) in &header.components {
        if *generation == max_generation && *flag >= header.bitflag {
            wrapped = true;
        }
    }
    world.restore_bitflag(
        header.bitflag,
        if wrapped { max_generation + 1 } else { max_generation },
    );

    for state in header.queries {
        world.restore_query(state);
    }
    world.restore_dirty_queries(header.dirty);
    Ok(())
}

// =============================================================================
// Entities block
// =============================================================================

/// Writes one entity's payload for one pid (full write).
#[allow(clippy::cast_precision_loss)]
pub(crate) fn write_column_full(
    w: &mut ByteWriter,
    complex: &mut ComplexBuffer,
    world: &World,
    target: PidTarget,
    facts: &ColumnFacts,
    eid: Eid,
) -> CodecResult<()> {
    let PidTarget::Column { comp, col } = target else {
        return Ok(()); // tag: the eid header suffices
    };
    let store = &world.components()[comp].store;
    match facts {
        ColumnFacts::Tag => {}
        ColumnFacts::Scalar { element } => {
            w.write_element(*element, store.scalar_get(col, eid));
        }
        ColumnFacts::Subarray { element, len, index_type } => {
            w.write_element(*index_type, *len as f64);
            for i in 0..*len {
                w.write_element(*index_type, i as f64);
                w.write_element(*element, store.subarray_get(col, eid, i));
            }
        }
        ColumnFacts::Faux { kind, component_type, key } => {
            write_faux_value(w, complex, component_type, key, kind, store.faux_get(col, eid), eid)?;
        }
    }
    Ok(())
}

/// Writes the full entities block: region length, per-pid sections over
/// every member entity, then the complex buffer.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn write_entities_full(w: &mut ByteWriter, world: &World) -> CodecResult<()> {
    let region_pos = w.position();
    w.write_u32(0);
    let region_start = w.position();
    let mut complex = ComplexBuffer::new();

    let pids = flattened_pids(world);
    for (pid, &target) in pids.iter().enumerate() {
        let wc = &world.components()[target.comp()];
        let (generation, flag) = (wc.generation_id, wc.bitflag);
        let facts = column_facts(world, target);

        w.write_u16(pid as u16);
        let count_pos = w.position();
        w.write_u32(0);
        let mut count = 0u32;
        for &eid in world.entities().dense() {
            if !world.masks().test(generation, eid, flag) {
                continue;
            }
            w.write_u32(eid);
            write_column_full(w, &mut complex, world, target, &facts, eid)?;
            count += 1;
        }
        w.patch_u32(count_pos, count);
    }

    let region_len = (w.position() - region_start) as u32;
    w.patch_u32(region_pos, region_len);

    let complex_bytes = complex.to_bytes();
    w.write_u32(complex_bytes.len() as u32);
    w.write_bytes(&complex_bytes);
    Ok(())
}

/// Reads an entities block, patching stores and setting mask bits for
/// every `(pid, eid)` tuple present. Tuples absent from the buffer leave
/// the world untouched (delta semantics come for free).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn read_entities(r: &mut ByteReader<'_>, world: &mut World) -> CodecResult<()> {
    let region_len = r.read_u32()? as usize;
    let region_start = r.position();

    // Pre-fetch the complex buffer that trails the region.
    r.set_position(region_start + region_len);
    let complex_len = r.read_u32()? as usize;
    let complex = ComplexData::from_bytes(r.read_bytes(complex_len)?)?;
    let block_end = r.position();
    r.set_position(region_start);

    let pids = flattened_pids(world);
    while r.position() < region_start + region_len {
        let pid = r.read_u16()? as usize;
        let count = r.read_u32()?;
        let &target = pids.get(pid).ok_or_else(|| CodecError::MalformedPayload {
            detail: format!("pid {pid} out of range ({} properties)", pids.len()),
        })?;
        let facts = column_facts(world, target);
        for _ in 0..count {
            let eid = r.read_u32()?;
            world.set_membership_raw(target.comp(), eid);
            match (&facts, target) {
                (ColumnFacts::Tag, _) | (_, PidTarget::TagStore { .. }) => {}
                (ColumnFacts::Scalar { element }, PidTarget::Column { comp, col }) => {
                    let value = r.read_element(*element)?;
                    world.store_mut(comp).scalar_set(col, eid, value);
                }
                (
                    ColumnFacts::Subarray { element, index_type, .. },
                    PidTarget::Column { comp, col },
                ) => {
                    let n = r.read_element(*index_type)? as usize;
                    for _ in 0..n {
                        let index = r.read_element(*index_type)? as usize;
                        let value = r.read_element(*element)?;
                        world.store_mut(comp).subarray_set(col, eid, index, value);
                    }
                }
                (
                    ColumnFacts::Faux { kind, component_type, key },
                    PidTarget::Column { comp, col },
                ) => {
                    match read_faux_value(r, &complex, component_type, key, kind, eid)? {
                        Some(value) => world.store_mut(comp).faux_set(col, eid, value),
                        None => world.store_mut(comp).faux_remove(col, eid),
                    }
                }
            }
        }
    }

    r.set_position(block_end);
    Ok(())
}

// =============================================================================
// Public entry points
// =============================================================================

/// Serializes a full (mode 0) snapshot of the world.
///
/// # Errors
///
/// [`CodecError::UnsupportedTypeTag`] when a faux value does not match
/// its declared shape.
pub fn serialize_full(world: &World) -> CodecResult<Vec<u8>> {
    let mut w = ByteWriter::new();
    w.write_u16(SERIALIZER_VERSION);
    w.write_u8(MODE_FULL);
    if !world.entities().is_empty() {
        write_header(&mut w, world);
        write_entities_full(&mut w, world)?;
    }
    debug!(bytes = w.position(), "full snapshot serialized");
    Ok(w.into_bytes())
}

/// Checks the version and reads the mode byte.
pub(crate) fn read_preamble(r: &mut ByteReader<'_>) -> CodecResult<u8> {
    let version = r.read_u16()?;
    if version != SERIALIZER_VERSION {
        warn!(found = version, expected = SERIALIZER_VERSION, "rejecting snapshot");
        return Err(CodecError::VersionMismatch {
            expected: SERIALIZER_VERSION,
            found: version,
        });
    }
    r.read_u8()
}

/// Decodes a full snapshot into an existing world, which must share the
/// snapshot's size and registry. Establishes the delta baseline.
///
/// # Errors
///
/// [`CodecError::VersionMismatch`] on a foreign version;
/// [`CodecError::MalformedPayload`] for a delta buffer or a size
/// mismatch.
pub fn decode_full_into(bytes: &[u8], world: &mut World) -> CodecResult<()> {
    let mut r = ByteReader::new(bytes);
    let mode = read_preamble(&mut r)?;
    if mode != MODE_FULL {
        return Err(CodecError::MalformedPayload {
            detail: format!("expected a full snapshot, found mode {mode}"),
        });
    }
    if r.remaining() == 0 {
        world.reset();
        world.set_delta_baseline(true);
        return Ok(());
    }
    let header = read_header(&mut r)?;
    apply_header(world, header, true)?;
    read_entities(&mut r, world)?;
    world.set_delta_baseline(true);
    Ok(())
}

/// Decodes a full snapshot into a fresh world created from `registry`,
/// sized from the snapshot header.
///
/// # Errors
///
/// As [`decode_full_into`].
pub fn decode_full_fresh(
    bytes: &[u8],
    registry: &std::sync::Arc<Registry>,
) -> CodecResult<World> {
    let mut r = ByteReader::new(bytes);
    let mode = read_preamble(&mut r)?;
    if mode != MODE_FULL {
        return Err(CodecError::MalformedPayload {
            detail: format!("expected a full snapshot, found mode {mode}"),
        });
    }
    if r.remaining() == 0 {
        let mut world = World::new(registry.clone(), DEFAULT_WORLD_SIZE);
        world.set_delta_baseline(true);
        return Ok(world);
    }
    let header = read_header(&mut r)?;
    let mut world = World::new(registry.clone(), header.size);
    apply_header(&mut world, header, true)?;
    read_entities(&mut r, &mut world)?;
    world.set_delta_baseline(true);
    Ok(world)
}
