use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use synopt::evaluation::{estimate, EstimationMode};
use synopt::geodesy::haversine;
use synopt::trajectory::{NoiseAnnotation, TrajectoryPoint, TrajectorySet};

/// A fleet of wiggly tracks, one fix per minute.
fn fleet(vessels: usize, points: usize) -> TrajectorySet {
    let mut set = TrajectorySet::new();
    for v in 0..vessels {
        let id = format!("2270067{:02}", v);
        for k in 0..points {
            let x = k as f64;
            set.push(
                &id,
                TrajectoryPoint::new(
                    -4.5 + 0.002 * x,
                    48.3 + 0.01 * v as f64 + 0.0005 * (0.7 * x).sin(),
                    60_000 * k as i64,
                ),
            );
        }
    }
    set
}

fn every_nth(raw: &TrajectorySet, n: usize) -> TrajectorySet {
    let mut set = TrajectorySet::new();
    for (id, pts) in raw.iter() {
        for (i, p) in pts.iter().enumerate() {
            if i % n == 0 || i + 1 == pts.len() {
                set.push(id, *p);
            }
        }
    }
    set
}

fn criterion_benchmark(c: &mut Criterion) {
    let raw = fleet(200, 500);
    let reduced = every_nth(&raw, 8);
    let noise = NoiseAnnotation::new();

    c.bench_function("haversine", |b| {
        b.iter(|| haversine(black_box(-4.49), black_box(48.38), black_box(-4.10), black_box(48.20)))
    });

    c.bench_function("estimate interpolate (100k points)", |b| {
        b.iter(|| {
            estimate(
                black_box(&raw),
                black_box(&reduced),
                &noise,
                EstimationMode::Interpolate,
            )
        })
    });

    c.bench_function("estimate project (100k points)", |b| {
        b.iter(|| estimate(black_box(&raw), black_box(&reduced), &noise, EstimationMode::Project))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
