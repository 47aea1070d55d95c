//! # Registry Benchmark
//!
//! Hot-path costs of a started registry:
//! - create/destroy churn (arena split + merge)
//! - handle lookups that hit
//! - handle lookups that miss (fault accounting + logging)
//!
//! Run with: `cargo bench --package realms_core`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use realms_core::{FitPolicy, Handle, ObjectRegistry, SystemAllocator};

const LIVE_OBJECTS: usize = 10_000;
const POOL_SIZE: usize = 4 * 1024 * 1024;

#[derive(Clone, Copy)]
struct Particle {
    position: [f32; 3],
    velocity: [f32; 3],
    life: f32,
}

impl Particle {
    fn new(i: usize) -> Self {
        let f = i as f32;
        Self {
            position: [f, f, f],
            velocity: [0.1, 0.2, 0.3],
            life: 1.0,
        }
    }
}

fn populated(policy: FitPolicy) -> (ObjectRegistry<Particle>, Vec<Handle>) {
    let mut registry = ObjectRegistry::new("BenchParticles");
    registry.set_policy(policy);
    registry
        .start(&mut SystemAllocator, POOL_SIZE)
        .expect("pool");
    let handles = (0..LIVE_OBJECTS)
        .map(|i| registry.create(Particle::new(i)).expect("capacity"))
        .collect();
    (registry, handles)
}

/// Destroy every other object, then refill the holes.
fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_destroy_churn");

    for policy in [FitPolicy::FirstFit, FitPolicy::BestFit] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{policy:?}")),
            &policy,
            |b, &policy| {
                let (mut registry, mut handles) = populated(policy);
                b.iter(|| {
                    for slot in handles.iter_mut().step_by(2) {
                        registry.destroy(*slot);
                        *slot = registry.create(Particle::new(0)).expect("refill");
                    }
                    black_box(registry.len())
                });
            },
        );
    }

    group.finish();
}

fn bench_get_hit(c: &mut Criterion) {
    let (mut registry, handles) = populated(FitPolicy::FirstFit);

    c.bench_function("get_hit_10k", |b| {
        b.iter(|| {
            let mut life = 0.0;
            for handle in &handles {
                if let Some(particle) = registry.get(*handle) {
                    life += particle.life;
                }
            }
            black_box(life)
        });
    });

    c.bench_function("get_mut_integrate_10k", |b| {
        b.iter(|| {
            for (_, particle) in registry.iter_mut() {
                for axis in 0..3 {
                    particle.position[axis] += particle.velocity[axis];
                }
            }
        });
    });
}

/// Misses are counted and logged; with no subscriber installed the log is free.
fn bench_get_miss(c: &mut Criterion) {
    let (registry, _) = populated(FitPolicy::FirstFit);
    let stale: Vec<Handle> = (0..1_000u64)
        .map(|i| Handle::from_raw(LIVE_OBJECTS as u64 + 1 + i))
        .collect();

    c.bench_function("get_miss_1k", |b| {
        b.iter(|| {
            for handle in &stale {
                black_box(registry.get(*handle));
            }
        });
    });
}

criterion_group!(benches, bench_churn, bench_get_hit, bench_get_miss);
criterion_main!(benches);
