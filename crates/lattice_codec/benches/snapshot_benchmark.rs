//! # Snapshot Benchmarks
//!
//! Full serialization, decode, and delta emission over a sparse
//! mutation pattern.
//!
//! Run with: `cargo bench --package lattice_codec`

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use lattice_codec::{
    create_delta_serializer, deserialize_world, serialize_world, SerializationMode,
    SerializedWorld,
};
use lattice_core::{ComponentBuilder, ElementType, Registry, World};

const ENTITY_COUNT: usize = 1_000;

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().try_init();
    });
}

fn bench_world() -> (Arc<Registry>, World) {
    init_tracing();
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
    let position = registry.component("Position").unwrap();
    let velocity = registry.component("Velocity").unwrap();

    let mut world = World::new(registry.clone(), ENTITY_COUNT);
    for i in 0..ENTITY_COUNT {
        let eid = world.add_entity().unwrap();
        world
            .add_component(&position, eid, Some(&json!({"x": i as f64, "y": 0.5})))
            .unwrap();
        world
            .add_component(&velocity, eid, Some(&json!({"xyz": [1.0, 2.0, 3.0]})))
            .unwrap();
    }
    (registry, world)
}

fn bench_full_serialize(c: &mut Criterion) {
    let (_registry, world) = bench_world();
    c.bench_function("serialize_binary_1k", |b| {
        b.iter(|| {
            let payload = serialize_world(SerializationMode::Binary, &world).unwrap();
            black_box(match &payload {
                SerializedWorld::Binary(bytes) => bytes.len(),
                _ => 0,
            })
        });
    });
}

fn bench_full_decode(c: &mut Criterion) {
    let (registry, world) = bench_world();
    let payload = serialize_world(SerializationMode::Binary, &world).unwrap();
    c.bench_function("deserialize_binary_1k", |b| {
        b.iter(|| {
            let restored = deserialize_world(&payload, &registry).unwrap();
            black_box(restored.entities().len())
        });
    });
}

fn bench_delta_sparse_mutation(c: &mut Criterion) {
    let (registry, mut world) = bench_world();
    let velocity = registry.component("Velocity").unwrap();
    let mut encoder = create_delta_serializer(&world);
    let _baseline = encoder.serialize(&world, None).unwrap();

    c.bench_function("delta_1pct_dirty_1k", |b| {
        let mut tick = 0f64;
        b.iter(|| {
            tick += 1.0;
            // Mutate 1% of the entities.
            for eid in (0..ENTITY_COUNT as u32).step_by(100) {
                world
                    .proxy(&velocity, eid)
                    .unwrap()
                    .set_element("xyz", 1, tick)
                    .unwrap();
            }
            let delta = encoder.serialize(&world, None).unwrap();
            black_box(delta.len())
        });
    });
}

criterion_group!(
    benches,
    bench_full_serialize,
    bench_full_decode,
    bench_delta_sparse_mutation
);
criterion_main!(benches);
