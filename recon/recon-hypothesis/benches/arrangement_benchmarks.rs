//! Benchmarks for the plane arrangement.
//!
//! Run with: cargo bench -p recon-hypothesis
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p recon-hypothesis -- --save-baseline main
//! 2. After changes: cargo bench -p recon-hypothesis -- --baseline main

#![allow(missing_docs, clippy::cast_possible_truncation, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use recon_hypothesis::{ArrangementBuilder, ArrangementParams, SupportingPlane};
use recon_types::{Aabb, Plane, Point3, Vector3};

// =============================================================================
// Plane Set Generation
// =============================================================================

/// `per_axis` evenly spaced axis-aligned planes along each axis of the unit box.
fn lattice_planes(per_axis: usize) -> Vec<SupportingPlane> {
    let mut planes = Vec::new();
    for axis in [Vector3::x(), Vector3::y(), Vector3::z()] {
        for k in 0..per_axis {
            let offset = -(k as f64) / (per_axis - 1) as f64;
            planes.push(SupportingPlane {
                id: planes.len(),
                plane: Plane::new(axis, offset).unwrap(),
                members: Vec::new(),
                labels: vec![planes.len() as u32],
                rms_residual: 0.0,
            });
        }
    }
    planes
}

// =============================================================================
// Arrangement Benchmarks
// =============================================================================

fn bench_arrangement(c: &mut Criterion) {
    let mut group = c.benchmark_group("Arrangement");
    group.sample_size(20);

    let bounds = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));

    for per_axis in [2, 3, 5] {
        let planes = lattice_planes(per_axis);
        let name = format!("lattice_{}planes", planes.len());
        group.throughput(Throughput::Elements(planes.len() as u64));

        group.bench_with_input(BenchmarkId::new("parallel", &name), &planes, |b, planes| {
            let builder = ArrangementBuilder::default();
            b.iter(|| builder.build(black_box(planes), black_box(&bounds)));
        });

        group.bench_with_input(BenchmarkId::new("sequential", &name), &planes, |b, planes| {
            let builder = ArrangementBuilder::new(ArrangementParams::default().with_parallel(false));
            b.iter(|| builder.build(black_box(planes), black_box(&bounds)));
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_arrangement);
criterion_main!(benches);
