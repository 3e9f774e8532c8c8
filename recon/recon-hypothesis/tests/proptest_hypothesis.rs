//! Property-based tests for hypothesis generation.
//!
//! Run with: cargo test -p recon-hypothesis -- proptest

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use recon_hypothesis::{
    AdjacencyGraph, ArrangementBuilder, ConfidenceEvaluator, ConfidenceScore, PlaneRefiner,
    RefineParams,
};
use recon_types::{Point, PointSet, Point3, Vector3};

// =============================================================================
// Strategies
// =============================================================================

/// Box corner and extents.
fn arb_box() -> impl Strategy<Value = ([f64; 3], [f64; 3])> {
    (
        prop::array::uniform3(-10.0..10.0f64),
        prop::array::uniform3(0.5..5.0f64),
    )
}

/// Low-discrepancy samples of the unit square.
fn r2_square(n: usize) -> impl Iterator<Item = (f64, f64)> {
    let g = 1.324_717_957_244_746;
    let (a1, a2) = (1.0 / g, 1.0 / (g * g));
    (1..=n).map(move |i| {
        let i = i as f64;
        ((0.5 + a1 * i).fract(), (0.5 + a2 * i).fract())
    })
}

/// Noisy samples on the faces of an axis-aligned box, one segment per face.
fn box_points(corner: [f64; 3], size: [f64; 3], per_face: usize, noise: f64) -> PointSet {
    let mut points = Vec::new();
    let mut wobble = 0.0_f64;
    for axis in 0..3 {
        for side in 0..2u32 {
            let mut normal = Vector3::zeros();
            normal[axis] = if side == 1 { 1.0 } else { -1.0 };
            for (s, t) in r2_square(per_face) {
                wobble = (wobble + 0.618_033_988_749_895).fract();
                let mut p = Point3::origin();
                p[axis] = corner[axis] + f64::from(side) * size[axis] + noise * (wobble - 0.5);
                let (a, b) = ((axis + 1) % 3, (axis + 2) % 3);
                p[a] = corner[a] + s * size[a];
                p[b] = corner[b] + t * size[b];
                let label = u32::try_from(axis).unwrap() * 2 + side;
                points.push(Point::new(p, normal, label));
            }
        }
    }
    PointSet::new(points)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn proptest_box_arrangement_is_closed((corner, size) in arb_box()) {
        let points = box_points(corner, size, 120, 0.0);
        let planes = PlaneRefiner::new(RefineParams::default()).refine(&points).unwrap();
        prop_assert_eq!(planes.len(), 6);

        let arrangement = ArrangementBuilder::default().build(&planes, &points.bounds()).unwrap();
        prop_assert_eq!(arrangement.enclosed_count(), 6);
        prop_assert!(arrangement.is_bounded());

        let graph = AdjacencyGraph::build(&arrangement);
        let all_enclosed: Vec<bool> = arrangement.faces().iter().map(|f| f.enclosed).collect();
        prop_assert!(graph.parity_violations(&all_enclosed).is_empty());
        prop_assert!(graph.branching_vertices(&all_enclosed).is_empty());
        let constraints = graph.constraints();
        prop_assert!(constraints
            .fan_separations
            .iter()
            .all(|s| s.faces.iter().any(|&f| !all_enclosed[f])));
    }

    #[test]
    fn proptest_scores_are_bounded(
        (corner, size) in arb_box(),
        noise in 0.0..0.05f64,
    ) {
        let points = box_points(corner, size, 120, noise);
        let planes = PlaneRefiner::new(RefineParams::default()).refine(&points).unwrap();
        let arrangement = ArrangementBuilder::default().build(&planes, &points.bounds()).unwrap();
        let scores = ConfidenceEvaluator::default()
            .evaluate(&arrangement, &planes, &points)
            .unwrap();

        prop_assert_eq!(scores.len(), arrangement.faces().len());
        for score in &scores {
            if score.is_supported() {
                prop_assert!((0.0..=1.0).contains(&score.fitting));
                prop_assert!((0.0..=1.0).contains(&score.coverage));
            } else {
                prop_assert_eq!(*score, ConfidenceScore::UNSUPPORTED);
            }
        }
        let assigned: usize = scores.iter().map(|s| s.support).sum();
        let members: usize = planes.iter().map(|p| p.support()).sum();
        prop_assert_eq!(assigned, members);
    }
}
