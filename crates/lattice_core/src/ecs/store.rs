//! # Columnar Component Storage
//!
//! A [`Store`] owns one component's columns for one world:
//!
//! - *Typed scalar* columns are dense arrays of one numeric element type,
//!   one element per entity, zero-initialized.
//! - *Typed subarray* columns give each entity a contiguous fixed-length
//!   slice inside a backing buffer shared by every subarray property of
//!   the same element type. Each column caches the smallest index type
//!   that can address its slice; the serializer uses it to compress
//!   per-entity dirty-index lists.
//! - *Faux* columns map eids to arbitrary JSON values, for shapes the
//!   columnar layout cannot express.
//! - *Tag* stores carry no columns at all; presence is encoded solely in
//!   the entity bitmask.
//!
//! All numeric traffic crosses the store boundary as `f64` and is
//! converted to the column's element type on write (saturating casts;
//! `u8c` rounds then clamps).

use std::collections::HashMap;

use serde_json::Value;

use crate::ecs::component::{ComponentSchema, Eid, ElementType, FauxKind, PropertyKind};

/// Backing bytes are padded to a multiple of this.
const BUFFER_ALIGN: usize = 4;

/// A dense array of one element type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedData {
    /// Signed 8-bit storage.
    I8(Vec<i8>),
    /// Unsigned 8-bit storage (also backs `u8c`).
    U8(Vec<u8>),
    /// Signed 16-bit storage.
    I16(Vec<i16>),
    /// Unsigned 16-bit storage.
    U16(Vec<u16>),
    /// Signed 32-bit storage.
    I32(Vec<i32>),
    /// Unsigned 32-bit storage (also backs `eid`).
    U32(Vec<u32>),
    /// 32-bit float storage.
    F32(Vec<f32>),
    /// 64-bit float storage.
    F64(Vec<f64>),
}

impl TypedData {
    /// Allocates a zero-filled array for `element`'s storage type.
    #[must_use]
    pub fn zeros(element: ElementType, len: usize) -> Self {
        match element.storage() {
            ElementType::I8 => Self::I8(vec![0; len]),
            ElementType::U8 => Self::U8(vec![0; len]),
            ElementType::I16 => Self::I16(vec![0; len]),
            ElementType::U16 => Self::U16(vec![0; len]),
            ElementType::I32 => Self::I32(vec![0; len]),
            ElementType::U32 => Self::U32(vec![0; len]),
            ElementType::F32 => Self::F32(vec![0.0; len]),
            ElementType::F64 => Self::F64(vec![0.0; len]),
            // storage() never yields the aliases
            ElementType::U8C | ElementType::Eid => unreachable!(),
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::I8(d) => d.len(),
            Self::U8(d) => d.len(),
            Self::I16(d) => d.len(),
            Self::U16(d) => d.len(),
            Self::I32(d) => d.len(),
            Self::U32(d) => d.len(),
            Self::F32(d) => d.len(),
            Self::F64(d) => d.len(),
        }
    }

    /// Whether the array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads element `i` widened to f64. Out-of-bounds reads yield 0.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> f64 {
        match self {
            Self::I8(d) => d.get(i).copied().unwrap_or(0) as f64,
            Self::U8(d) => d.get(i).copied().unwrap_or(0) as f64,
            Self::I16(d) => d.get(i).copied().unwrap_or(0) as f64,
            Self::U16(d) => d.get(i).copied().unwrap_or(0) as f64,
            Self::I32(d) => d.get(i).copied().unwrap_or(0) as f64,
            Self::U32(d) => d.get(i).copied().unwrap_or(0) as f64,
            Self::F32(d) => d.get(i).copied().unwrap_or(0.0) as f64,
            Self::F64(d) => d.get(i).copied().unwrap_or(0.0),
        }
    }

    /// Writes element `i`, converting per the declared element type.
    ///
    /// Integer casts saturate; `u8c` rounds before clamping.
    /// Out-of-bounds writes are ignored.
    #[inline]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set(&mut self, element: ElementType, i: usize, value: f64) {
        match self {
            Self::I8(d) => {
                if let Some(slot) = d.get_mut(i) {
                    *slot = value as i8;
                }
            }
            Self::U8(d) => {
                if let Some(slot) = d.get_mut(i) {
                    *slot = if element == ElementType::U8C {
                        value.round() as u8
                    } else {
                        value as u8
                    };
                }
            }
            Self::I16(d) => {
                if let Some(slot) = d.get_mut(i) {
                    *slot = value as i16;
                }
            }
            Self::U16(d) => {
                if let Some(slot) = d.get_mut(i) {
                    *slot = value as u16;
                }
            }
            Self::I32(d) => {
                if let Some(slot) = d.get_mut(i) {
                    *slot = value as i32;
                }
            }
            Self::U32(d) => {
                if let Some(slot) = d.get_mut(i) {
                    *slot = value as u32;
                }
            }
            Self::F32(d) => {
                if let Some(slot) = d.get_mut(i) {
                    *slot = value as f32;
                }
            }
            Self::F64(d) => {
                if let Some(slot) = d.get_mut(i) {
                    *slot = value;
                }
            }
        }
    }

    /// Zeroes element `i`.
    #[inline]
    pub fn zero(&mut self, i: usize) {
        self.zero_range(i, i + 1);
    }

    /// Zeroes elements in `start..end`.
    pub fn zero_range(&mut self, start: usize, end: usize) {
        macro_rules! clear {
            ($d:expr, $zero:expr) => {{
                let end = end.min($d.len());
                if start < end {
                    $d[start..end].fill($zero);
                }
            }};
        }
        match self {
            Self::I8(d) => clear!(d, 0),
            Self::U8(d) => clear!(d, 0),
            Self::I16(d) => clear!(d, 0),
            Self::U16(d) => clear!(d, 0),
            Self::I32(d) => clear!(d, 0),
            Self::U32(d) => clear!(d, 0),
            Self::F32(d) => clear!(d, 0.0),
            Self::F64(d) => clear!(d, 0.0),
        }
    }

    /// Zeroes the whole array.
    pub fn fill_zero(&mut self) {
        let len = self.len();
        self.zero_range(0, len);
    }

    /// Grows or shrinks to `len`, zero-filling new elements.
    pub fn resize(&mut self, len: usize) {
        match self {
            Self::I8(d) => d.resize(len, 0),
            Self::U8(d) => d.resize(len, 0),
            Self::I16(d) => d.resize(len, 0),
            Self::U16(d) => d.resize(len, 0),
            Self::I32(d) => d.resize(len, 0),
            Self::U32(d) => d.resize(len, 0),
            Self::F32(d) => d.resize(len, 0.0),
            Self::F64(d) => d.resize(len, 0.0),
        }
    }
}

/// Kind-specific column state.
#[derive(Debug, Clone)]
enum ColumnKind {
    Scalar {
        element: ElementType,
        boolean: bool,
        data: TypedData,
    },
    Subarray {
        element: ElementType,
        len: usize,
        /// Element offset of this column's region inside the shared buffer.
        base: usize,
        /// Index into the store's backing-buffer table.
        buffer: usize,
        index_type: ElementType,
    },
    Faux {
        kind: FauxKind,
        values: HashMap<Eid, Value>,
    },
}

/// Kind and layout facts about a column, for code walking a store.
#[derive(Debug, Clone, Copy)]
pub enum ColumnInfo<'a> {
    /// A typed scalar column.
    Scalar {
        /// Element type of the column.
        element: ElementType,
        /// Whether reads project to JSON booleans.
        boolean: bool,
    },
    /// A typed subarray column.
    Subarray {
        /// Element type of the backing buffer.
        element: ElementType,
        /// Per-entity slice length.
        len: usize,
        /// Cached smallest index type addressing `len`.
        index_type: ElementType,
    },
    /// A faux column.
    Faux {
        /// Declared value shape.
        kind: &'a FauxKind,
    },
}

/// One leaf column of a store.
#[derive(Debug, Clone)]
pub struct Column {
    key: String,
    kind: ColumnKind,
}

impl Column {
    /// The property key this column stores.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Kind and layout facts.
    #[must_use]
    pub fn info(&self) -> ColumnInfo<'_> {
        match &self.kind {
            ColumnKind::Scalar { element, boolean, .. } => ColumnInfo::Scalar {
                element: *element,
                boolean: *boolean,
            },
            ColumnKind::Subarray { element, len, index_type, .. } => ColumnInfo::Subarray {
                element: *element,
                len: *len,
                index_type: *index_type,
            },
            ColumnKind::Faux { kind, .. } => ColumnInfo::Faux { kind },
        }
    }
}

/// A snapshot of one column's contents, shared-layout with the original.
///
/// Shadows are owned by the delta serializer (keyed by property identity)
/// and compared element-wise against the live column to compute diffs.
#[derive(Debug, Clone)]
pub enum ShadowColumn {
    /// Snapshot of a scalar column.
    Scalar(TypedData),
    /// Snapshot of a subarray column, entity-major (`eid * len + i`).
    Subarray {
        /// Per-entity slice length.
        len: usize,
        /// The snapshotted elements.
        data: TypedData,
    },
    /// Snapshot of a faux column's value map.
    Faux(HashMap<Eid, Value>),
}

/// One component's columns in one world.
#[derive(Debug, Clone)]
pub struct Store {
    size: usize,
    tag: bool,
    columns: Vec<Column>,
    /// Shared subarray backing buffers, one per declared element type.
    buffers: Vec<(ElementType, TypedData)>,
    /// Per-element-type cursor: subarray elements per entity, used to lay
    /// out column regions and re-derive them on resize.
    cursors: Vec<(ElementType, usize)>,
}

impl Store {
    /// Creates the store for `schema` sized for `size` entities.
    ///
    /// Subarray backing buffers are allocated per element type with a byte
    /// length rounded up to a multiple of 4.
    #[must_use]
    pub fn new(schema: &ComponentSchema, size: usize) -> Self {
        let mut columns = Vec::with_capacity(schema.properties().len());
        let mut cursors: Vec<(ElementType, usize)> = Vec::new();

        for prop in schema.properties() {
            let kind = match &prop.kind {
                PropertyKind::Scalar { element, boolean } => ColumnKind::Scalar {
                    element: *element,
                    boolean: *boolean,
                    data: TypedData::zeros(*element, size),
                },
                PropertyKind::Subarray { element, len } => {
                    let slot = cursors.iter().position(|(e, _)| e == element);
                    let buffer = slot.unwrap_or(cursors.len());
                    let cursor = match slot {
                        Some(i) => {
                            let at = cursors[i].1;
                            cursors[i].1 += len;
                            at
                        }
                        None => {
                            cursors.push((*element, *len));
                            0
                        }
                    };
                    ColumnKind::Subarray {
                        element: *element,
                        len: *len,
                        base: cursor * size,
                        buffer,
                        index_type: ElementType::index_type_for(*len),
                    }
                }
                PropertyKind::Faux { kind } => ColumnKind::Faux {
                    kind: kind.clone(),
                    values: HashMap::new(),
                },
            };
            columns.push(Column { key: prop.key.clone(), kind });
        }

        let buffers = cursors
            .iter()
            .map(|&(element, per_entity)| {
                (element, TypedData::zeros(element, Self::buffer_len(element, per_entity, size)))
            })
            .collect();

        Self { size, tag: schema.is_tag(), columns, buffers, cursors }
    }

    /// Buffer length in elements for `per_entity` subarray elements over
    /// `size` entities, padded so the byte length is a multiple of 4.
    fn buffer_len(element: ElementType, per_entity: usize, size: usize) -> usize {
        let bytes = per_entity * size * element.byte_len();
        let padded = bytes.div_ceil(BUFFER_ALIGN) * BUFFER_ALIGN;
        per_entity * size + (padded - bytes).div_ceil(element.byte_len().max(1))
    }

    /// The entity capacity this store was laid out for.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this is a tag store (no columns).
    #[inline]
    #[must_use]
    pub fn is_tag(&self) -> bool {
        self.tag
    }

    /// The flattened leaf columns in stable traversal order.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Finds a column index by property key.
    #[must_use]
    pub fn find_column(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.key == key)
    }

    /// Reads a scalar element widened to f64.
    #[inline]
    #[must_use]
    pub fn scalar_get(&self, col: usize, eid: Eid) -> f64 {
        match &self.columns[col].kind {
            ColumnKind::Scalar { data, .. } => data.get(eid as usize),
            _ => 0.0,
        }
    }

    /// Writes a scalar element, converting to the column's element type.
    pub fn scalar_set(&mut self, col: usize, eid: Eid, value: f64) {
        if let ColumnKind::Scalar { element, data, .. } = &mut self.columns[col].kind {
            data.set(*element, eid as usize, value);
        }
    }

    /// Per-entity slice length of a subarray column (0 for other kinds).
    #[must_use]
    pub fn subarray_len(&self, col: usize) -> usize {
        match &self.columns[col].kind {
            ColumnKind::Subarray { len, .. } => *len,
            _ => 0,
        }
    }

    /// Reads one subarray element widened to f64.
    #[must_use]
    pub fn subarray_get(&self, col: usize, eid: Eid, i: usize) -> f64 {
        match &self.columns[col].kind {
            ColumnKind::Subarray { len, base, buffer, .. } if i < *len => {
                self.buffers[*buffer].1.get(base + eid as usize * len + i)
            }
            _ => 0.0,
        }
    }

    /// Writes one subarray element.
    pub fn subarray_set(&mut self, col: usize, eid: Eid, i: usize, value: f64) {
        if let ColumnKind::Subarray { element, len, base, buffer, .. } = &self.columns[col].kind {
            if i < *len {
                let idx = base + eid as usize * len + i;
                let element = *element;
                let buffer = *buffer;
                self.buffers[buffer].1.set(element, idx, value);
            }
        }
    }

    /// Reads a faux value, if one is stored for the entity.
    #[must_use]
    pub fn faux_get(&self, col: usize, eid: Eid) -> Option<&Value> {
        match &self.columns[col].kind {
            ColumnKind::Faux { values, .. } => values.get(&eid),
            _ => None,
        }
    }

    /// Stores a faux value for the entity.
    pub fn faux_set(&mut self, col: usize, eid: Eid, value: Value) {
        if let ColumnKind::Faux { values, .. } = &mut self.columns[col].kind {
            values.insert(eid, value);
        }
    }

    /// Deletes the entity's faux value.
    pub fn faux_remove(&mut self, col: usize, eid: Eid) {
        if let ColumnKind::Faux { values, .. } = &mut self.columns[col].kind {
            values.remove(&eid);
        }
    }

    /// Reads a column slot as a JSON value.
    ///
    /// Boolean columns project to `true`/`false`; subarrays to arrays;
    /// missing faux values to `Null`.
    #[must_use]
    pub fn value(&self, col: usize, eid: Eid) -> Value {
        match &self.columns[col].kind {
            ColumnKind::Scalar { boolean, data, .. } => {
                let v = data.get(eid as usize);
                if *boolean {
                    Value::Bool(v != 0.0)
                } else {
                    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
                }
            }
            ColumnKind::Subarray { len, .. } => Value::Array(
                (0..*len)
                    .map(|i| {
                        serde_json::Number::from_f64(self.subarray_get(col, eid, i))
                            .map_or(Value::Null, Value::Number)
                    })
                    .collect(),
            ),
            ColumnKind::Faux { values, .. } => values.get(&eid).cloned().unwrap_or(Value::Null),
        }
    }

    /// Writes an override value into a column slot.
    ///
    /// Numbers and booleans coerce into scalar columns; arrays write their
    /// prefix into subarray columns; faux columns store the value as-is.
    /// Values of the wrong shape are ignored (validation is the gate).
    pub fn write_value(&mut self, col: usize, eid: Eid, value: &Value) {
        match &self.columns[col].kind {
            ColumnKind::Scalar { .. } => {
                let v = match value {
                    Value::Bool(b) => Some(f64::from(*b)),
                    _ => value.as_f64(),
                };
                if let Some(v) = v {
                    self.scalar_set(col, eid, v);
                }
            }
            ColumnKind::Subarray { .. } => {
                if let Some(items) = value.as_array() {
                    let items: Vec<f64> =
                        items.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect();
                    for (i, v) in items.into_iter().enumerate() {
                        self.subarray_set(col, eid, i, v);
                    }
                }
            }
            ColumnKind::Faux { .. } => {
                self.faux_set(col, eid, value.clone());
            }
        }
    }

    /// Zero-fills every column and clears faux maps.
    pub fn reset(&mut self) {
        for column in &mut self.columns {
            match &mut column.kind {
                ColumnKind::Scalar { data, .. } => data.fill_zero(),
                ColumnKind::Subarray { .. } => {}
                ColumnKind::Faux { values, .. } => values.clear(),
            }
        }
        for (_, buffer) in &mut self.buffers {
            buffer.fill_zero();
        }
    }

    /// Clears one entity's slot in every column. No-op on tag stores.
    pub fn reset_for(&mut self, eid: Eid) {
        for col in 0..self.columns.len() {
            match &mut self.columns[col].kind {
                ColumnKind::Scalar { data, .. } => data.zero(eid as usize),
                ColumnKind::Subarray { len, base, buffer, .. } => {
                    let start = *base + eid as usize * *len;
                    let end = start + *len;
                    let buffer = *buffer;
                    self.buffers[buffer].1.zero_range(start, end);
                }
                ColumnKind::Faux { values, .. } => {
                    values.remove(&eid);
                }
            }
        }
    }

    /// Re-lays the store out for `new_size` entities.
    ///
    /// Scalar columns reallocate and copy; subarray backing buffers are
    /// reallocated and every entity slice is copied to its new position.
    pub fn resize(&mut self, new_size: usize) {
        let old_size = self.size;

        let new_buffers: Vec<(ElementType, TypedData)> = self
            .cursors
            .iter()
            .map(|&(element, per_entity)| {
                (element, TypedData::zeros(element, Self::buffer_len(element, per_entity, new_size)))
            })
            .collect();
        let old_buffers = std::mem::replace(&mut self.buffers, new_buffers);

        for column in &mut self.columns {
            match &mut column.kind {
                ColumnKind::Scalar { data, .. } => data.resize(new_size),
                ColumnKind::Subarray { element, len, base, buffer, .. } => {
                    let cursor = if old_size == 0 { 0 } else { *base / old_size };
                    let new_base = cursor * new_size;
                    let old = &old_buffers[*buffer].1;
                    let new = &mut self.buffers[*buffer].1;
                    for eid in 0..old_size.min(new_size) {
                        for i in 0..*len {
                            new.set(*element, new_base + eid * *len + i, old.get(*base + eid * *len + i));
                        }
                    }
                    *base = new_base;
                }
                ColumnKind::Faux { .. } => {}
            }
        }
        self.size = new_size;
    }

    /// Snapshots a column's current contents for diffing.
    #[must_use]
    pub fn shadow(&self, col: usize) -> ShadowColumn {
        match &self.columns[col].kind {
            ColumnKind::Scalar { data, .. } => ShadowColumn::Scalar(data.clone()),
            ColumnKind::Subarray { element, len, .. } => {
                let mut data = TypedData::zeros(*element, *len * self.size);
                for eid in 0..self.size {
                    for i in 0..*len {
                        data.set(*element, eid * *len + i, self.subarray_get(col, eid as Eid, i));
                    }
                }
                ShadowColumn::Subarray { len: *len, data }
            }
            ColumnKind::Faux { values, .. } => ShadowColumn::Faux(values.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::ComponentBuilder;
    use serde_json::json;

    fn sample_store(size: usize) -> Store {
        let schema = ComponentBuilder::new("Sample")
            .field("x", ElementType::F64, 0.0)
            .field("hits", ElementType::U8C, 0.0)
            .boolean("active", false)
            .subarray("xyz", ElementType::F32, 3, Value::Null)
            .subarray("uv", ElementType::F32, 2, Value::Null)
            .faux("label", FauxKind::String, Value::Null)
            .build();
        Store::new(&schema, size)
    }

    #[test]
    fn test_tag_store_has_no_columns() {
        let schema = ComponentBuilder::new("Frozen").build();
        let store = Store::new(&schema, 8);
        assert!(store.is_tag());
        assert!(store.columns().is_empty());
        // reset_for on a tag store is a no-op
        let mut store = store;
        store.reset_for(3);
    }

    #[test]
    fn test_scalar_zero_initialized() {
        let store = sample_store(4);
        let x = store.find_column("x").unwrap();
        assert_eq!(store.scalar_get(x, 2), 0.0);
    }

    #[test]
    fn test_scalar_conversion() {
        let mut store = sample_store(4);
        let hits = store.find_column("hits").unwrap();
        store.scalar_set(hits, 0, 300.7); // u8c clamps
        assert_eq!(store.scalar_get(hits, 0), 255.0);
        store.scalar_set(hits, 0, 1.5); // u8c rounds
        assert_eq!(store.scalar_get(hits, 0), 2.0);
    }

    #[test]
    fn test_subarray_slices_are_disjoint() {
        let mut store = sample_store(4);
        let xyz = store.find_column("xyz").unwrap();
        let uv = store.find_column("uv").unwrap();

        store.subarray_set(xyz, 1, 0, 1.5);
        store.subarray_set(xyz, 1, 2, 3.0);
        store.subarray_set(uv, 1, 0, 9.0);
        store.subarray_set(xyz, 2, 0, 7.0);

        assert_eq!(store.subarray_get(xyz, 1, 0), 1.5);
        assert_eq!(store.subarray_get(xyz, 1, 1), 0.0);
        assert_eq!(store.subarray_get(xyz, 1, 2), 3.0);
        assert_eq!(store.subarray_get(uv, 1, 0), 9.0);
        assert_eq!(store.subarray_get(xyz, 2, 0), 7.0);
        // Neighbour slices untouched
        assert_eq!(store.subarray_get(xyz, 0, 0), 0.0);
        assert_eq!(store.subarray_get(uv, 2, 0), 0.0);
    }

    #[test]
    fn test_index_type_cached() {
        let store = sample_store(4);
        let xyz = store.find_column("xyz").unwrap();
        match store.columns()[xyz].info() {
            ColumnInfo::Subarray { index_type, len, .. } => {
                assert_eq!(len, 3);
                assert_eq!(index_type, ElementType::U8);
            }
            _ => panic!("expected subarray column"),
        }
    }

    #[test]
    fn test_reset_for_clears_single_entity() {
        let mut store = sample_store(4);
        let x = store.find_column("x").unwrap();
        let xyz = store.find_column("xyz").unwrap();
        let label = store.find_column("label").unwrap();

        store.scalar_set(x, 1, 5.0);
        store.scalar_set(x, 2, 6.0);
        store.subarray_set(xyz, 1, 1, 2.0);
        store.faux_set(label, 1, json!("one"));

        store.reset_for(1);

        assert_eq!(store.scalar_get(x, 1), 0.0);
        assert_eq!(store.subarray_get(xyz, 1, 1), 0.0);
        assert!(store.faux_get(label, 1).is_none());
        // Other entities untouched
        assert_eq!(store.scalar_get(x, 2), 6.0);
    }

    #[test]
    fn test_resize_preserves_values() {
        let mut store = sample_store(4);
        let x = store.find_column("x").unwrap();
        let xyz = store.find_column("xyz").unwrap();
        let uv = store.find_column("uv").unwrap();

        store.scalar_set(x, 3, 4.5);
        store.subarray_set(xyz, 3, 2, 8.0);
        store.subarray_set(uv, 2, 1, 5.0);

        store.resize(16);

        assert_eq!(store.size(), 16);
        assert_eq!(store.scalar_get(x, 3), 4.5);
        assert_eq!(store.subarray_get(xyz, 3, 2), 8.0);
        assert_eq!(store.subarray_get(uv, 2, 1), 5.0);
        assert_eq!(store.subarray_get(xyz, 9, 0), 0.0);
    }

    #[test]
    fn test_boolean_projection() {
        let mut store = sample_store(4);
        let active = store.find_column("active").unwrap();
        assert_eq!(store.value(active, 0), json!(false));
        store.write_value(active, 0, &json!(true));
        assert_eq!(store.value(active, 0), json!(true));
    }

    #[test]
    fn test_write_value_subarray_prefix() {
        let mut store = sample_store(4);
        let xyz = store.find_column("xyz").unwrap();
        store.write_value(xyz, 0, &json!([1.5, -2.25]));
        assert_eq!(store.value(xyz, 0), json!([1.5, -2.25, 0.0]));
    }

    #[test]
    fn test_shadow_is_independent_snapshot() {
        let mut store = sample_store(4);
        let xyz = store.find_column("xyz").unwrap();
        store.subarray_set(xyz, 1, 1, 2.0);

        let shadow = store.shadow(xyz);
        store.subarray_set(xyz, 1, 1, 9.0);

        match shadow {
            ShadowColumn::Subarray { len, data } => {
                assert_eq!(len, 3);
                assert_eq!(data.get(len + 1), 2.0);
            }
            _ => panic!("expected subarray shadow"),
        }
    }
}
