//! # ECS Benchmarks
//!
//! Entity churn, component writes and full steps over a movement system.
//!
//! Run with: `cargo bench --package lattice_core`

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use lattice_core::{
    create_world, get_component_by_type, step_world, ComponentBuilder, Eid, ElementType,
    Registry, System, World,
};

struct Movement;

impl System for Movement {
    fn run(&self, world: &mut World, eid: Eid) {
        let position = get_component_by_type(world, "Position").unwrap();
        let velocity = get_component_by_type(world, "Velocity").unwrap();
        let vx = world.proxy(&velocity, eid).unwrap().get_f64("x").unwrap();
        let mut p = world.proxy(&position, eid).unwrap();
        let px = p.get_f64("x").unwrap();
        p.set_f64("x", px + vx).unwrap();
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().try_init();
    });
}

fn bench_registry(with_system: bool) -> Arc<Registry> {
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
                .field("x", ElementType::F64, 0.0)
                .field("y", ElementType::F64, 0.0)
                .build(),
        )
        .unwrap();
    if with_system {
        registry.define_system(&["Position", "Velocity"], Movement);
    }
    registry
}

fn populate(world: &mut World, registry: &Arc<Registry>, count: usize) {
    let position = registry.component("Position").unwrap();
    let velocity = registry.component("Velocity").unwrap();
    for _ in 0..count {
        let eid = world.add_entity().unwrap();
        world.add_component(&position, eid, None).unwrap();
        world
            .add_component(&velocity, eid, Some(&json!({"x": 1.0, "y": 0.5})))
            .unwrap();
    }
}

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_with_components");
    for count in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let registry = bench_registry(false);
                let mut world = create_world(&registry, Some(count));
                populate(&mut world, &registry, count);
                black_box(world.entities().len())
            });
        });
    }
    group.finish();
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_movement");
    for count in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let registry = bench_registry(true);
            let mut world = create_world(&registry, Some(count));
            populate(&mut world, &registry, count);
            b.iter(|| {
                step_world(&mut world).unwrap();
                black_box(world.frame())
            });
        });
    }
    group.finish();
}

fn bench_query_read(c: &mut Criterion) {
    let registry = bench_registry(false);
    let query = registry.define_query(&["Position", "Velocity"]);
    let mut world = create_world(&registry, Some(10_000));
    populate(&mut world, &registry, 10_000);

    c.bench_function("get_entities_10k", |b| {
        b.iter(|| black_box(world.get_entities(&query).unwrap().len()));
    });
}

criterion_group!(benches, bench_spawn, bench_step, bench_query_read);
criterion_main!(benches);
