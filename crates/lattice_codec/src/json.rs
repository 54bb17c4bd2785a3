//! # JSON Snapshots
//!
//! A structured mirror of the same logical data the binary format
//! carries: entity sparse set, removed queue, cursors, the component map
//! as `[type, {generationId, bitflag}]` pairs, query states, dirty query
//! keys, and per-entity component objects.
//!
//! Component objects are the accessor-level projection: booleans are
//! native JSON booleans, subarrays are arrays, and keys starting with
//! `_` or equal to `id`/`store`/`type` are skipped from the object form.

use lattice_core::{QueryState, Registry, SparseSet, World};
use serde_json::{json, Map, Value};

use crate::error::{CodecError, CodecResult};
use crate::snapshot::{apply_header, DecodedHeader};

/// Keys never emitted in a component's object form.
const RESERVED_KEYS: [&str; 3] = ["id", "store", "type"];

fn sparse_set_json(set: &SparseSet) -> Value {
    json!({ "dense": set.dense(), "sparse": set.sparse() })
}

fn component_object(world: &World, comp: usize, eid: u32) -> Value {
    let store = &world.components()[comp].store;
    let mut object = Map::new();
    for (col, column) in store.columns().iter().enumerate() {
        let key = column.key();
        if key.starts_with('_') || RESERVED_KEYS.contains(&key) {
            continue;
        }
        if matches!(column.info(), lattice_core::ColumnInfo::Faux { .. })
            && store.faux_get(col, eid).is_none()
        {
            continue; // absent faux values stay absent
        }
        object.insert(key.to_string(), store.value(col, eid));
    }
    Value::Object(object)
}

/// Serializes the world as a structured JSON document.
#[must_use]
pub fn serialize_json(world: &World) -> Value {
    let component_map: Vec<Value> = world
        .components()
        .iter()
        .map(|comp| {
            json!([
                comp.schema.type_name(),
                { "generationId": comp.generation_id, "bitflag": comp.bitflag }
            ])
        })
        .collect();

    let mut query_map = Map::new();
    for key in world.query_order() {
        let state = world.query_state(key).expect("ordered query exists");
        let masks: Map<String, Value> = state
            .masks
            .iter()
            .map(|&(generation, mask)| (generation.to_string(), json!(mask)))
            .collect();
        query_map.insert(
            key.clone(),
            json!({
                "entities": sparse_set_json(&state.members),
                "toRemove": sparse_set_json(&state.to_remove),
                "entered": sparse_set_json(&state.entered),
                "masks": masks,
                "generations": state.generations,
            }),
        );
    }

    let entities: Vec<Value> = world
        .entities()
        .dense()
        .iter()
        .map(|&eid| {
            let mut components = Map::new();
            for (comp, wc) in world.components().iter().enumerate() {
                if world.masks().test(wc.generation_id, eid, wc.bitflag) {
                    components.insert(
                        wc.schema.type_name().to_string(),
                        component_object(world, comp, eid),
                    );
                }
            }
            json!({ "entityId": eid, "components": components })
        })
        .collect();

    let removed: Vec<u32> = world.removed().collect();
    json!({
        "entitySparseSet": sparse_set_json(world.entities()),
        "removed": removed,
        "entityCursor": world.get_entity_cursor(),
        "size": world.size(),
        "bitflag": world.bitflag(),
        "frame": world.frame(),
        "componentMap": component_map,
        "queryMap": query_map,
        "dirtyQueries": world.dirty_queries(),
        "entities": entities,
    })
}

fn field<'a>(value: &'a Value, key: &str) -> CodecResult<&'a Value> {
    value.get(key).ok_or_else(|| CodecError::MalformedPayload {
        detail: format!("missing field '{key}'"),
    })
}

fn u32_field(value: &Value, key: &str) -> CodecResult<u32> {
    field(value, key)?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| CodecError::MalformedPayload {
            detail: format!("field '{key}' is not a u32"),
        })
}

fn u32_array(value: &Value) -> CodecResult<Vec<u32>> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|v| u32::try_from(v).ok())
                .collect()
        })
        .ok_or_else(|| CodecError::MalformedPayload {
            detail: "expected an array of u32".to_string(),
        })
}

fn sparse_set_from_json(value: &Value) -> CodecResult<(Vec<u32>, Vec<i32>)> {
    let dense = u32_array(field(value, "dense")?)?;
    let sparse = field(value, "sparse")?
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_i64)
                .filter_map(|v| i32::try_from(v).ok())
                .collect()
        })
        .ok_or_else(|| CodecError::MalformedPayload {
            detail: "expected a sparse array".to_string(),
        })?;
    Ok((dense, sparse))
}

fn query_state_from_json(key: &str, value: &Value) -> CodecResult<QueryState> {
    let (m_dense, m_sparse) = sparse_set_from_json(field(value, "entities")?)?;
    let (t_dense, t_sparse) = sparse_set_from_json(field(value, "toRemove")?)?;
    let (e_dense, e_sparse) = sparse_set_from_json(field(value, "entered")?)?;
    let mut masks = field(value, "masks")?
        .as_object()
        .ok_or_else(|| CodecError::MalformedPayload {
            detail: "query masks is not an object".to_string(),
        })?
        .iter()
        .map(|(generation, mask)| {
            let generation = generation.parse::<usize>().map_err(|_| {
                CodecError::MalformedPayload {
                    detail: format!("non-numeric mask generation '{generation}'"),
                }
            })?;
            let mask = mask.as_u64().and_then(|m| u32::try_from(m).ok()).ok_or_else(|| {
                CodecError::MalformedPayload { detail: "mask is not a u32".to_string() }
            })?;
            Ok((generation, mask))
        })
        .collect::<CodecResult<Vec<(usize, u32)>>>()?;
    masks.sort_by_key(|&(generation, _)| generation);
    let generations = field(value, "generations")?
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_u64)
                .map(|g| g as usize)
                .collect()
        })
        .ok_or_else(|| CodecError::MalformedPayload {
            detail: "query generations is not an array".to_string(),
        })?;

    let mut members = SparseSet::new(0);
    members.reset(Some(m_dense), Some(m_sparse));
    let mut to_remove = SparseSet::new(0);
    to_remove.reset(Some(t_dense), Some(t_sparse));
    let mut entered = SparseSet::new(0);
    entered.reset(Some(e_dense), Some(e_sparse));

    Ok(QueryState {
        components: key.split('|').map(str::to_string).collect(),
        key: key.to_string(),
        members,
        entered,
        to_remove,
        masks,
        generations,
    })
}

fn header_from_json(document: &Value) -> CodecResult<DecodedHeader> {
    let (dense, sparse) = sparse_set_from_json(field(document, "entitySparseSet")?)?;
    let removed = u32_array(field(document, "removed")?)?;

    let components = field(document, "componentMap")?
        .as_array()
        .ok_or_else(|| CodecError::MalformedPayload {
            detail: "componentMap is not an array".to_string(),
        })?
        .iter()
        .map(|pair| {
            let name = pair
                .get(0)
                .and_then(Value::as_str)
                .ok_or_else(|| CodecError::MalformedPayload {
                    detail: "componentMap entry has no type name".to_string(),
                })?;
            let coords = pair.get(1).ok_or_else(|| CodecError::MalformedPayload {
                detail: "componentMap entry has no coordinates".to_string(),
            })?;
            Ok((
                name.to_string(),
                u32_field(coords, "generationId")? as usize,
                u32_field(coords, "bitflag")?,
            ))
        })
        .collect::<CodecResult<Vec<(String, usize, u32)>>>()?;

    let queries = field(document, "queryMap")?
        .as_object()
        .ok_or_else(|| CodecError::MalformedPayload {
            detail: "queryMap is not an object".to_string(),
        })?
        .iter()
        .map(|(key, value)| query_state_from_json(key, value))
        .collect::<CodecResult<Vec<QueryState>>>()?;

    let dirty = field(document, "dirtyQueries")?
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .ok_or_else(|| CodecError::MalformedPayload {
            detail: "dirtyQueries is not an array".to_string(),
        })?;

    Ok(DecodedHeader {
        dense,
        sparse,
        removed,
        cursor: u32_field(document, "entityCursor")?,
        size: u32_field(document, "size")? as usize,
        bitflag: u32_field(document, "bitflag")?,
        frame: u32_field(document, "frame")?,
        components,
        queries,
        dirty,
    })
}

fn apply_entities(document: &Value, world: &mut World) -> CodecResult<()> {
    let entities = field(document, "entities")?
        .as_array()
        .ok_or_else(|| CodecError::MalformedPayload {
            detail: "entities is not an array".to_string(),
        })?;
    for entry in entities {
        let eid = u32_field(entry, "entityId")?;
        let components = field(entry, "components")?
            .as_object()
            .ok_or_else(|| CodecError::MalformedPayload {
                detail: "entity components is not an object".to_string(),
            })?;
        for (type_name, object) in components {
            let comp = world.component_position(type_name).ok_or_else(|| {
                CodecError::MalformedPayload {
                    detail: format!("entity references unknown component '{type_name}'"),
                }
            })?;
            world.set_membership_raw(comp, eid);
            if let Some(object) = object.as_object() {
                for (key, value) in object {
                    let store = world.store_mut(comp);
                    if let Some(col) = store.find_column(key) {
                        store.write_value(col, eid, value);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Restores a JSON snapshot into an existing world.
///
/// # Errors
///
/// [`CodecError::MalformedPayload`] when the document is structurally
/// invalid or sized for a different world.
pub fn deserialize_json_into(document: &Value, world: &mut World) -> CodecResult<()> {
    let header = header_from_json(document)?;
    apply_header(world, header, true)?;
    apply_entities(document, world)?;
    Ok(())
}

/// Restores a JSON snapshot into a fresh world created from `registry`.
///
/// # Errors
///
/// As [`deserialize_json_into`].
pub fn deserialize_json_fresh(
    document: &Value,
    registry: &std::sync::Arc<Registry>,
) -> CodecResult<World> {
    let size = u32_field(document, "size")? as usize;
    let mut world = World::new(registry.clone(), size);
    deserialize_json_into(document, &mut world)?;
    Ok(world)
}
