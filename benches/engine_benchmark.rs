//! # Engine Benchmark
//!
//! Exercises the hot paths of the runtime: ticking systems over populated
//! family views, component churn that crosses family boundaries, and
//! entity registration.
//!
//! Run with: `cargo bench`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kindred::{Component, Engine, EntitySystem, EntityView, Family};

struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

struct Velocity {
    dx: f32,
    dy: f32,
}
impl Component for Velocity {}

struct Frozen;
impl Component for Frozen {}

/// Integrates velocities over the movers family view.
struct MovementSystem {
    movers: Option<EntityView>,
}

impl EntitySystem for MovementSystem {
    fn added_to_engine(&mut self, engine: &Engine) {
        let family = Family::all::<(Position, Velocity)>().get();
        self.movers = Some(engine.entities_for(&family));
    }

    fn update(&mut self, _engine: &Engine, delta_time: f32) {
        if let Some(movers) = &self.movers {
            for entity in movers.iter() {
                let (dx, dy) = {
                    let velocity = match entity.get::<Velocity>() {
                        Some(velocity) => velocity,
                        None => continue,
                    };
                    (velocity.dx, velocity.dy)
                };
                if let Some(mut position) = entity.get_mut::<Position>() {
                    position.x += dx * delta_time;
                    position.y += dy * delta_time;
                }
            }
        }
    }
}

fn populated_engine(count: usize) -> Engine {
    let engine = Engine::new();
    for index in 0..count {
        let entity = engine.create_entity();
        entity.add(Position {
            x: index as f32,
            y: 0.0,
        });
        entity.add(Velocity { dx: 0.1, dy: 0.2 });
        engine.add_entity(&entity).expect("fresh entity");
    }
    engine
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for count in [1_000, 10_000] {
        let engine = populated_engine(count);
        engine.add_system(MovementSystem { movers: None });

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                engine.update(0.016).expect("single-threaded tick");
                black_box(engine.entities().len())
            });
        });
    }

    group.finish();
}

fn bench_family_membership_churn(c: &mut Criterion) {
    let engine = populated_engine(1_000);
    let frozen = Family::all::<(Position,)>().exclude::<(Frozen,)>().get();
    let view = engine.entities_for(&frozen);
    let entities = engine.entities().to_vec();

    c.bench_function("membership_churn_1K", |b| {
        b.iter(|| {
            for entity in &entities {
                entity.add(Frozen);
            }
            for entity in &entities {
                entity.remove::<Frozen>();
            }
            black_box(view.len())
        });
    });
}

fn bench_add_remove_entities(c: &mut Criterion) {
    let engine = Engine::new();
    // register the family up front so additions pay the membership cost
    let movers = Family::all::<(Position, Velocity)>().get();
    let _ = engine.entities_for(&movers);

    c.bench_function("add_remove_1K", |b| {
        b.iter(|| {
            let mut entities = Vec::with_capacity(1_000);
            for index in 0..1_000 {
                let entity = engine.create_entity();
                entity.add(Position {
                    x: index as f32,
                    y: 0.0,
                });
                entity.add(Velocity { dx: 1.0, dy: 0.0 });
                engine.add_entity(&entity).expect("fresh entity");
                entities.push(entity);
            }
            for entity in &entities {
                engine.remove_entity(entity);
            }
            black_box(engine.entities().len())
        });
    });
}

fn bench_family_query(c: &mut Criterion) {
    let engine = populated_engine(10_000);
    let movers = Family::all::<(Position, Velocity)>().get();
    let view = engine.entities_for(&movers);

    c.bench_function("family_view_scan_10K", |b| {
        b.iter(|| {
            let mut sum = 0.0_f32;
            for entity in view.iter() {
                if let Some(position) = entity.get::<Position>() {
                    sum += position.x;
                }
            }
            black_box(sum)
        });
    });
}

criterion_group!(
    benches,
    bench_tick,
    bench_family_membership_churn,
    bench_add_remove_entities,
    bench_family_query,
);

criterion_main!(benches);
