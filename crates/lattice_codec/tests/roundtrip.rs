//! Round-trip and delta-mode coverage for the snapshot codec: binary,
//! JSON and BASE64 modes, wire boundaries, and shadow-diffed deltas.

use std::sync::Arc;

use serde_json::{json, Value};

use lattice_codec::{
    apply_delta, create_delta_serializer, deserialize_world, deserialize_world_into,
    serialize_world, CodecError, SerializationMode, SerializedWorld, SERIALIZER_VERSION,
};
use lattice_core::{ComponentBuilder, ElementType, FauxKind, Registry, World};

fn fixture_registry() -> Arc<Registry> {
    // Install the tracing subscriber once so codec debug!/warn! output
    // lands in the test capture.
    static TRACING: std::sync::Once = std::sync::Once::new();
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
    let registry = Arc::new(Registry::new());
    registry
        .define_component(
            ComponentBuilder::new("Position")
                .field("x", ElementType::F64, 0.0)
                .field("y", ElementType::F64, 0.0)
                .build(),
        )
        .unwrap();
    registry
        .define_component(
            ComponentBuilder::new("Velocity")
                .subarray("xyz", ElementType::F32, 3, Value::Null)
                .build(),
        )
        .unwrap();
    registry
        .define_component(ComponentBuilder::new("Frozen").build())
        .unwrap();
    registry
        .define_component(
            ComponentBuilder::new("Label")
                .faux("text", FauxKind::String, Value::Null)
                .build(),
        )
        .unwrap();
    registry
        .define_component(
            ComponentBuilder::new("Meta")
                .faux("data", FauxKind::Any, Value::Null)
                .faux(
                    "stats",
                    FauxKind::Object(vec![
                        ("name".to_string(), FauxKind::String),
                        ("score".to_string(), FauxKind::Number),
                    ]),
                    Value::Null,
                )
                .build(),
        )
        .unwrap();
    registry
}

fn populated_world(registry: &Arc<Registry>) -> World {
    let position = registry.component("Position").unwrap();
    let velocity = registry.component("Velocity").unwrap();
    let frozen = registry.component("Frozen").unwrap();
    let label = registry.component("Label").unwrap();
    let meta = registry.component("Meta").unwrap();

    let mut world = World::new(registry.clone(), 64);
    let e0 = world.add_entity().unwrap();
    let e1 = world.add_entity().unwrap();
    let e2 = world.add_entity().unwrap();

    world
        .add_component(&position, e0, Some(&json!({"x": 1.0, "y": -2.0})))
        .unwrap();
    world
        .add_component(&velocity, e0, Some(&json!({"xyz": [1.5, -2.25, 3.0]})))
        .unwrap();
    world.add_component(&frozen, e1, None).unwrap();
    world
        .add_component(&label, e1, Some(&json!({"text": "sentinel"})))
        .unwrap();
    world
        .add_component(
            &meta,
            e2,
            Some(&json!({
                "data": {"nested": {"list": [1, 2, {"k": "v"}]}},
                "stats": {"name": "alpha", "score": 9.5},
            })),
        )
        .unwrap();
    world
        .add_component(&position, e2, Some(&json!({"x": 40.0})))
        .unwrap();

    // A populated, then dirtied, query.
    let query = registry.define_query(&["Position"]);
    assert_eq!(world.get_entities(&query).unwrap().len(), 2);
    world.remove_component(&position, e2).unwrap();
    assert_eq!(world.dirty_queries().len(), 1);

    world
}

fn assert_worlds_match(a: &mut World, b: &mut World) {
    assert_eq!(a.entities().dense(), b.entities().dense());
    assert_eq!(a.get_entity_cursor(), b.get_entity_cursor());
    assert_eq!(a.frame(), b.frame());
    assert_eq!(a.bitflag(), b.bitflag());
    assert_eq!(a.dirty_queries(), b.dirty_queries());
    assert_eq!(a.query_order(), b.query_order());
    for key in a.query_order() {
        let qa = a.query_state(key).unwrap();
        let qb = b.query_state(key).unwrap();
        assert_eq!(qa.members.dense(), qb.members.dense(), "query {key}");
        assert_eq!(qa.to_remove.dense(), qb.to_remove.dense(), "query {key}");
        assert_eq!(qa.masks, qb.masks, "query {key}");
    }

    let names: Vec<String> = a
        .components()
        .iter()
        .map(|c| c.schema.type_name().to_string())
        .collect();
    for name in names {
        let registry = a.registry().clone();
        let schema = registry.component(&name).unwrap();
        for eid in a.entities().dense().to_vec() {
            assert_eq!(
                a.has_component(&schema, eid),
                b.has_component(&schema, eid),
                "membership of {name} on {eid}"
            );
            if !a.has_component(&schema, eid) {
                continue;
            }
            let keys = a.proxy(&schema, eid).unwrap().keys();
            for key in keys {
                let va = a.proxy(&schema, eid).unwrap().get(&key);
                let vb = b.proxy(&schema, eid).unwrap().get(&key);
                assert_eq!(va, vb, "{name}.{key} on {eid}");
            }
        }
    }
}

#[test]
fn test_binary_roundtrip() {
    let registry = fixture_registry();
    let mut world = populated_world(&registry);
    let payload = serialize_world(SerializationMode::Binary, &world).unwrap();
    let mut restored = deserialize_world(&payload, &registry).unwrap();
    assert_worlds_match(&mut world, &mut restored);
}

#[test]
fn test_binary_roundtrip_into_existing_world() {
    let registry = fixture_registry();
    let mut world = populated_world(&registry);
    let payload = serialize_world(SerializationMode::Binary, &world).unwrap();

    let mut target = World::new(registry.clone(), 64);
    let junk = target.add_entity().unwrap();
    let position = registry.component("Position").unwrap();
    target
        .add_component(&position, junk, Some(&json!({"x": 99.0})))
        .unwrap();

    deserialize_world_into(&payload, &mut target).unwrap();
    assert_worlds_match(&mut world, &mut target);
}

#[test]
fn test_json_roundtrip() {
    let registry = fixture_registry();
    let mut world = populated_world(&registry);
    let payload = serialize_world(SerializationMode::Json, &world).unwrap();
    let mut restored = deserialize_world(&payload, &registry).unwrap();
    assert_worlds_match(&mut world, &mut restored);
}

#[test]
fn test_base64_is_binary_bytewise() {
    let registry = fixture_registry();
    let world = populated_world(&registry);
    let SerializedWorld::Binary(bytes) =
        serialize_world(SerializationMode::Binary, &world).unwrap()
    else {
        panic!("expected binary payload");
    };
    let SerializedWorld::Base64(text) =
        serialize_world(SerializationMode::Base64, &world).unwrap()
    else {
        panic!("expected base64 payload");
    };
    assert_eq!(lattice_codec::decode_base64_payload(&text).unwrap(), bytes);
    assert_eq!(lattice_codec::encode_base64(&bytes), text);
}

#[test]
fn test_base64_roundtrip() {
    let registry = fixture_registry();
    let mut world = populated_world(&registry);
    let payload = serialize_world(SerializationMode::Base64, &world).unwrap();
    let mut restored = deserialize_world(&payload, &registry).unwrap();
    assert_worlds_match(&mut world, &mut restored);
}

#[test]
fn test_empty_world_snapshot_is_three_bytes() {
    let registry = fixture_registry();
    let world = World::new(registry.clone(), 64);
    let SerializedWorld::Binary(bytes) =
        serialize_world(SerializationMode::Binary, &world).unwrap()
    else {
        panic!("expected binary payload");
    };
    assert_eq!(bytes.len(), 3);
    assert_eq!(&bytes[..2], &SERIALIZER_VERSION.to_be_bytes());
    assert_eq!(bytes[2], 0);

    let restored =
        deserialize_world(&SerializedWorld::Binary(bytes), &registry).unwrap();
    assert!(restored.entities().is_empty());
}

#[test]
fn test_version_mismatch_rejected() {
    let registry = fixture_registry();
    let world = populated_world(&registry);
    let SerializedWorld::Binary(mut bytes) =
        serialize_world(SerializationMode::Binary, &world).unwrap()
    else {
        panic!("expected binary payload");
    };
    bytes[0] = 0;
    bytes[1] = 9;
    let err = deserialize_world(&SerializedWorld::Binary(bytes), &registry).unwrap_err();
    assert!(matches!(
        err,
        CodecError::VersionMismatch { expected: SERIALIZER_VERSION, found: 9 }
    ));
}

#[test]
fn test_subarray_f32_precision_roundtrip() {
    let registry = fixture_registry();
    let velocity = registry.component("Velocity").unwrap();
    let mut world = World::new(registry.clone(), 64);
    let eid = world.add_entity().unwrap();
    world
        .add_component(&velocity, eid, Some(&json!({"xyz": [1.5, -2.25, 3.0]})))
        .unwrap();

    let payload = serialize_world(SerializationMode::Binary, &world).unwrap();
    let mut restored = deserialize_world(&payload, &registry).unwrap();
    assert_eq!(
        restored.proxy(&velocity, eid).unwrap().get("xyz"),
        Some(json!([1.5, -2.25, 3.0]))
    );
}

#[test]
fn test_faux_null_and_absent_are_distinct() {
    let registry = fixture_registry();
    let label = registry.component("Label").unwrap();
    let mut world = World::new(registry.clone(), 64);
    let with_null = world.add_entity().unwrap();
    let with_absent = world.add_entity().unwrap();
    world
        .add_component(&label, with_null, Some(&json!({"text": null})))
        .unwrap();
    world.add_component(&label, with_absent, None).unwrap();

    let payload = serialize_world(SerializationMode::Binary, &world).unwrap();
    let restored = deserialize_world(&payload, &registry).unwrap();

    let comp = restored.component_position("Label").unwrap();
    let col = restored.components()[comp].store.find_column("text").unwrap();
    assert_eq!(
        restored.components()[comp].store.faux_get(col, with_null),
        Some(&Value::Null)
    );
    assert!(restored.components()[comp]
        .store
        .faux_get(col, with_absent)
        .is_none());
    assert!(restored.has_component(&label, with_absent));
}

#[test]
fn test_complex_preserves_map_and_set_projections() {
    let registry = fixture_registry();
    let meta = registry.component("Meta").unwrap();
    let mut world = World::new(registry.clone(), 64);
    let eid = world.add_entity().unwrap();
    let tagged = json!({
        "lookup": {"dataType": "Map", "value": [["a", 1], ["b", 2]]},
        "seen": {"dataType": "Set", "value": [3, 1]},
    });
    world
        .add_component(&meta, eid, Some(&json!({"data": tagged.clone()})))
        .unwrap();

    let payload = serialize_world(SerializationMode::Binary, &world).unwrap();
    let mut restored = deserialize_world(&payload, &registry).unwrap();
    assert_eq!(restored.proxy(&meta, eid).unwrap().get("data"), Some(tagged));
}

// --- delta mode -----------------------------------------------------------

#[test]
fn test_delta_baseline_then_subarray_patch() {
    let registry = fixture_registry();
    let velocity = registry.component("Velocity").unwrap();
    let mut world = World::new(registry.clone(), 64);
    let eid = world.add_entity().unwrap();
    world
        .add_component(&velocity, eid, Some(&json!({"xyz": [1.0, 2.0, 3.0]})))
        .unwrap();

    let mut encoder = create_delta_serializer(&world);
    let baseline = encoder.serialize(&world, None).unwrap();
    assert_eq!(baseline[2], 0); // first call is a full snapshot

    let mut clone =
        deserialize_world(&SerializedWorld::Binary(baseline.clone()), &registry).unwrap();
    assert!(clone.has_delta_baseline());

    world
        .proxy(&velocity, eid)
        .unwrap()
        .set_element("xyz", 1, 99.0)
        .unwrap();

    let delta = encoder.serialize(&world, None).unwrap();
    assert_eq!(delta[2], 1);
    assert!(delta.len() < baseline.len(), "delta must be smaller than baseline");

    apply_delta(&delta, &mut clone).unwrap();
    assert_eq!(
        clone.proxy(&velocity, eid).unwrap().get("xyz"),
        Some(json!([1.0, 99.0, 3.0]))
    );
}

#[test]
fn test_delta_without_baseline_rejected() {
    let registry = fixture_registry();
    let velocity = registry.component("Velocity").unwrap();
    let mut world = World::new(registry.clone(), 64);
    let eid = world.add_entity().unwrap();
    world
        .add_component(&velocity, eid, Some(&json!({"xyz": [1.0, 2.0, 3.0]})))
        .unwrap();

    let mut encoder = create_delta_serializer(&world);
    let _baseline = encoder.serialize(&world, None).unwrap();
    world
        .proxy(&velocity, eid)
        .unwrap()
        .set_element("xyz", 0, 5.0)
        .unwrap();
    let delta = encoder.serialize(&world, None).unwrap();

    let mut cold = World::new(registry.clone(), 64);
    assert!(matches!(
        apply_delta(&delta, &mut cold),
        Err(CodecError::ApplyDeltaWithoutBaseline)
    ));
    assert!(matches!(
        deserialize_world(&SerializedWorld::Binary(delta), &registry),
        Err(CodecError::ApplyDeltaWithoutBaseline)
    ));
}

#[test]
fn test_unchanged_world_rewinds_every_property() {
    let registry = fixture_registry();
    let mut world = populated_world(&registry);
    // populated_world leaves a dirty query; commit it so the two delta
    // headers are comparable.
    world.commit_removals();

    let mut encoder = create_delta_serializer(&world);
    let baseline = encoder.serialize(&world, None).unwrap();
    let quiet = encoder.serialize(&world, None).unwrap();
    assert!(quiet.len() < baseline.len());
    assert_eq!(encoder.stats().pids_emitted, 0);
    assert!(encoder.stats().pids_rewound > 0);

    // Applying the quiet delta changes nothing.
    let mut clone =
        deserialize_world(&SerializedWorld::Binary(baseline), &registry).unwrap();
    let mut reference =
        deserialize_world(&serialize_world(SerializationMode::Binary, &world).unwrap(), &registry)
            .unwrap();
    apply_delta(&quiet, &mut clone).unwrap();
    assert_worlds_match(&mut reference, &mut clone);
}

#[test]
fn test_delta_full_write_for_newly_added_entity() {
    let registry = fixture_registry();
    let position = registry.component("Position").unwrap();
    let mut world = World::new(registry.clone(), 64);
    let first = world.add_entity().unwrap();
    world
        .add_component(&position, first, Some(&json!({"x": 1.0})))
        .unwrap();

    let mut encoder = create_delta_serializer(&world);
    let baseline = encoder.serialize(&world, None).unwrap();
    let mut clone =
        deserialize_world(&SerializedWorld::Binary(baseline), &registry).unwrap();

    let second = world.add_entity().unwrap();
    world
        .add_component(&position, second, Some(&json!({"x": 0.0, "y": 8.0})))
        .unwrap();

    let delta = encoder.serialize(&world, None).unwrap();
    apply_delta(&delta, &mut clone).unwrap();

    assert!(clone.has_component(&position, second));
    // Zero-valued properties of a newly added entity are still written.
    assert_eq!(clone.proxy(&position, second).unwrap().get_f64("x"), Some(0.0));
    assert_eq!(clone.proxy(&position, second).unwrap().get_f64("y"), Some(8.0));
    // The pre-existing entity was not re-sent but survives intact.
    assert_eq!(clone.proxy(&position, first).unwrap().get_f64("x"), Some(1.0));
}

#[test]
fn test_delta_faux_deep_compare() {
    let registry = fixture_registry();
    let meta = registry.component("Meta").unwrap();
    let mut world = World::new(registry.clone(), 64);
    let eid = world.add_entity().unwrap();
    world
        .add_component(
            &meta,
            eid,
            Some(&json!({"data": {"inner": [1, 2]}, "stats": {"name": "a", "score": 1.0}})),
        )
        .unwrap();

    let mut encoder = create_delta_serializer(&world);
    let baseline = encoder.serialize(&world, None).unwrap();
    let mut clone =
        deserialize_world(&SerializedWorld::Binary(baseline), &registry).unwrap();

    // Rewriting an equal value emits nothing.
    world
        .proxy(&meta, eid)
        .unwrap()
        .set("data", &json!({"inner": [1, 2]}))
        .unwrap();
    let quiet = encoder.serialize(&world, None).unwrap();
    assert_eq!(encoder.stats().pids_emitted, 0);
    apply_delta(&quiet, &mut clone).unwrap();

    // A deep change is detected and shipped.
    world
        .proxy(&meta, eid)
        .unwrap()
        .set("data", &json!({"inner": [1, 3]}))
        .unwrap();
    let delta = encoder.serialize(&world, None).unwrap();
    assert_eq!(encoder.stats().pids_emitted, 1);
    apply_delta(&delta, &mut clone).unwrap();
    assert_eq!(
        clone.proxy(&meta, eid).unwrap().get("data"),
        Some(json!({"inner": [1, 3]}))
    );
}

#[test]
fn test_delta_reset_starts_a_fresh_baseline() {
    let registry = fixture_registry();
    let position = registry.component("Position").unwrap();
    let mut world = World::new(registry.clone(), 64);
    let eid = world.add_entity().unwrap();
    world
        .add_component(&position, eid, Some(&json!({"x": 2.0})))
        .unwrap();

    let mut encoder = create_delta_serializer(&world);
    let _ = encoder.serialize(&world, None).unwrap();
    let delta = encoder.serialize(&world, None).unwrap();
    assert_eq!(delta[2], 1);

    encoder.reset();
    let again = encoder.serialize(&world, None).unwrap();
    assert_eq!(again[2], 0); // full baseline again
}
