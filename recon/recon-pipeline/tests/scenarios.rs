//! End-to-end reconstruction scenarios.
//!
//! To run: cargo test -p recon-pipeline --test scenarios

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use approx::assert_relative_eq;
use recon_hypothesis::{AdjacencyGraph, ArrangementBuilder, ConfidenceEvaluator, PlaneRefiner};
use recon_pipeline::{
    reconstruct, reconstruct_with_solver, FailureReason, ObjectiveWeights, ReconError,
    ReconstructionParams, SolverBackend,
};
use recon_select::{validate_polygon_mesh, BranchAndBound, SelectionFormulator};
use recon_types::{Point, PointSet, Point3, Vector3};

// =============================================================================
// Fixtures
// =============================================================================

/// Low-discrepancy samples of the unit square.
fn r2_square(n: usize) -> impl Iterator<Item = (f64, f64)> {
    let g = 1.324_717_957_244_746;
    let (a1, a2) = (1.0 / g, 1.0 / (g * g));
    (1..=n).map(move |i| {
        let i = i as f64;
        ((0.5 + a1 * i).fract(), (0.5 + a2 * i).fract())
    })
}

/// Points on the six faces of the unit cube, one segment per face, with a
/// small deterministic offset along the normal.
fn cube_points(per_face: usize) -> Vec<Point> {
    let mut points = Vec::new();
    let mut wobble = 0.0_f64;
    for axis in 0..3 {
        for side in 0..2u32 {
            let mut normal = Vector3::zeros();
            normal[axis] = if side == 1 { 1.0 } else { -1.0 };
            for (s, t) in r2_square(per_face) {
                wobble = (wobble + 0.618_033_988_749_895).fract();
                let mut p = Point3::origin();
                p[axis] = f64::from(side) + 2e-4 * (wobble - 0.5);
                p[(axis + 1) % 3] = s;
                p[(axis + 2) % 3] = t;
                let label = u32::try_from(axis).unwrap() * 2 + side;
                points.push(Point::new(p, normal, label));
            }
        }
    }
    points
}

fn scenario_a_params() -> ReconstructionParams {
    ReconstructionParams::new(ObjectiveWeights::new(0.43, 0.27, 0.30).unwrap())
}

/// Axis-aligned rectangle sampled with `density` points per unit area,
/// skipping points inside `hole` (given in the same two coordinates).
fn patch(
    axis: usize,
    level: f64,
    normal_sign: f64,
    range: ([f64; 2], [f64; 2]),
    hole: Option<([f64; 2], [f64; 2])>,
    density: f64,
    label: u32,
) -> Vec<Point> {
    let (ra, rb) = range;
    let (wa, wb) = (ra[1] - ra[0], rb[1] - rb[0]);
    let n = (density * wa * wb) as usize;
    let mut normal = Vector3::zeros();
    normal[axis] = normal_sign;
    r2_square(n)
        .map(|(s, t)| (ra[0] + s * wa, rb[0] + t * wb))
        .filter(|&(a, b)| {
            hole.map_or(true, |(ha, hb)| !(a > ha[0] && a < ha[1] && b > hb[0] && b < hb[1]))
        })
        .map(|(a, b)| {
            let mut p = Point3::origin();
            p[axis] = level;
            p[(axis + 1) % 3] = a;
            p[(axis + 2) % 3] = b;
            Point::new(p, normal, label)
        })
        .collect()
}

/// Surface points of the L-shaped block [0,2]x[0,1]x[0,1] + [0,1]x[1,2]x[0,1].
///
/// Coordinates of each patch are `(axis + 1) % 3` then `(axis + 2) % 3`, so
/// z-patches are (x, y), x-patches (y, z) and y-patches (z, x).
fn l_block_points() -> PointSet {
    let d = 200.0;
    let notch = Some(([1.0, 2.0], [1.0, 2.0]));
    let mut points = Vec::new();
    points.extend(patch(2, 0.0, -1.0, ([0.0, 2.0], [0.0, 2.0]), notch, d, 0));
    points.extend(patch(2, 1.0, 1.0, ([0.0, 2.0], [0.0, 2.0]), notch, d, 1));
    points.extend(patch(0, 0.0, -1.0, ([0.0, 2.0], [0.0, 1.0]), None, d, 2));
    points.extend(patch(0, 2.0, 1.0, ([0.0, 1.0], [0.0, 1.0]), None, d, 3));
    points.extend(patch(0, 1.0, 1.0, ([1.0, 2.0], [0.0, 1.0]), None, d, 4));
    points.extend(patch(1, 0.0, -1.0, ([0.0, 1.0], [0.0, 2.0]), None, d, 5));
    points.extend(patch(1, 1.0, 1.0, ([0.0, 1.0], [1.0, 2.0]), None, d, 6));
    points.extend(patch(1, 2.0, 1.0, ([0.0, 1.0], [0.0, 1.0]), None, d, 7));
    PointSet::new(points)
}

/// Surface points of the unit cubes [0,1]^3 and [1,2]^3, which share only
/// the corner (1, 1, 1). One segment per cube face.
fn corner_cubes_points() -> PointSet {
    let mut points = Vec::new();
    let mut label = 0;
    for offset in [0.0, 1.0] {
        let range = [offset, offset + 1.0];
        for axis in 0..3 {
            for (level, sign) in [(offset, -1.0), (offset + 1.0, 1.0)] {
                points.extend(patch(axis, level, sign, (range, range), None, 400.0, label));
                label += 1;
            }
        }
    }
    PointSet::new(points)
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn scenario_a_cube() {
    let points = PointSet::new(cube_points(400));
    let result = reconstruct(&points, &scenario_a_params()).unwrap();

    assert_eq!(result.stats.supporting_planes, 6);
    assert_eq!(result.stats.selected_faces, 6);
    assert_eq!(result.mesh.face_count(), 6);
    assert_eq!(result.mesh.vertex_count(), 8);
    assert!(result.mesh.faces.iter().all(|f| f.vertices.len() == 4));

    let check = validate_polygon_mesh(&result.mesh, 1e-12);
    assert!(check.is_closed_manifold(), "{check}");
    assert_relative_eq!(result.mesh.signed_volume(), 1.0, epsilon = 1e-3);
    assert_relative_eq!(result.mesh.surface_area(), 6.0, epsilon = 1e-2);
}

#[test]
fn scenario_b_single_plane() {
    let points: Vec<Point> = cube_points(400)
        .into_iter()
        .filter(|p| p.group == Some(4))
        .collect();
    let err = reconstruct(&PointSet::new(points), &scenario_a_params()).unwrap_err();
    assert!(matches!(err, ReconError::ArrangementEmpty { .. }), "{err}");
}

#[test]
fn scenario_c_weights_rejected_before_running() {
    let err: ReconError = ObjectiveWeights::new(0.5, 0.5, 0.0001).unwrap_err().into();
    assert!(matches!(err, ReconError::InvalidWeights { .. }));
}

#[test]
fn scenario_d_under_supported_group_is_dropped() {
    let mut points = cube_points(400);
    // Ten points on a small patch inside the cube, far below the support
    // threshold.
    for (s, t) in r2_square(10) {
        points.push(Point::new(
            Point3::new(0.4 + 0.2 * s, 0.4 + 0.2 * t, 0.5),
            Vector3::z(),
            99,
        ));
    }
    let points = PointSet::new(points);
    let result = reconstruct(&points, &scenario_a_params()).unwrap();

    assert_eq!(result.planes.len(), 6);
    assert!(result.planes.iter().all(|p| !p.labels.contains(&99)));
    assert!(result
        .mesh
        .faces
        .iter()
        .all(|f| f.plane < result.planes.len()));
    assert_eq!(result.mesh.face_count(), 6);
}

#[test]
fn no_segments_at_all() {
    let points: PointSet = cube_points(50)
        .into_iter()
        .map(|p| Point::ungrouped(p.position, p.normal))
        .collect();
    let err = reconstruct(&points, &scenario_a_params()).unwrap_err();
    assert!(matches!(err, ReconError::InsufficientSegments { groups: 0, .. }));
}

#[test]
fn l_shaped_block_merges_coplanar_cells() {
    let points = l_block_points();
    let result = reconstruct(&points, &scenario_a_params()).unwrap();

    assert_eq!(result.stats.supporting_planes, 8);
    let check = validate_polygon_mesh(&result.mesh, 1e-12);
    assert!(check.is_closed_manifold(), "{check}");
    assert_eq!(result.mesh.face_count(), 8);
    assert_eq!(result.mesh.vertex_count(), 12);
    assert!(result.stats.selected_faces > result.mesh.face_count());
    assert_relative_eq!(result.mesh.signed_volume(), 3.0, epsilon = 1e-6);
    assert_relative_eq!(result.mesh.surface_area(), 14.0, epsilon = 1e-6);
}

#[test]
fn reconstruction_is_deterministic() {
    let points = PointSet::new(cube_points(300));
    let params = scenario_a_params();
    let a = reconstruct(&points, &params).unwrap();
    let b = reconstruct(&points, &params.clone().sequential()).unwrap();
    assert_eq!(a.mesh, b.mesh);
    assert_eq!(a.stats.objective.to_bits(), b.stats.objective.to_bits());
}

#[test]
fn backends_produce_the_same_model() {
    let points = PointSet::new(cube_points(300));
    let bnb = reconstruct(&points, &scenario_a_params()).unwrap();
    let exhaustive = reconstruct(
        &points,
        &scenario_a_params().with_backend(SolverBackend::Exhaustive),
    )
    .unwrap();
    assert_eq!(bnb.mesh, exhaustive.mesh);
    assert_relative_eq!(bnb.stats.objective, exhaustive.stats.objective, epsilon = 1e-9);
}

#[test]
fn zero_budget_times_out() {
    let points = PointSet::new(cube_points(200));
    let params = scenario_a_params().with_time_budget(Duration::ZERO);
    let err = reconstruct_with_solver(&points, &params, &BranchAndBound).unwrap_err();
    assert!(matches!(
        err,
        ReconError::OptimizationFailed {
            reason: FailureReason::Timeout(_)
        }
    ));
}

#[test]
fn selection_respects_edge_parity() {
    let points = l_block_points();
    let params = scenario_a_params();
    let planes = PlaneRefiner::new(params.refine.clone()).refine(&points).unwrap();
    let arrangement = ArrangementBuilder::new(params.arrangement.clone())
        .build(&planes, &points.bounds())
        .unwrap();
    let scores = ConfidenceEvaluator::new(params.confidence.clone())
        .evaluate(&arrangement, &planes, &points)
        .unwrap();
    let graph = AdjacencyGraph::build(&arrangement);

    let formulator = SelectionFormulator::new(params.weights);
    let problem = formulator
        .formulate(&arrangement, &scores, &graph.constraints())
        .unwrap();
    let selection = formulator
        .solve(&problem, &BranchAndBound, Duration::from_secs(60))
        .unwrap();

    assert!(graph.parity_violations(&selection.selected).is_empty());
    for edge in arrangement.edges() {
        let used = edge.faces.iter().filter(|&&f| selection.selected[f]).count();
        assert!(used == 0 || used == 2, "edge {} used by {used} faces", edge.id);
    }
    assert!(selection
        .selected_faces()
        .all(|f| arrangement.faces()[f].enclosed));
}

#[test]
fn cubes_touching_at_a_corner_give_a_manifold() {
    let points = corner_cubes_points();
    let params = scenario_a_params();
    let result = reconstruct(&points, &params).unwrap();

    // x, y and z = 1 each carry one face of both cubes.
    assert_eq!(result.stats.supporting_planes, 9);
    let check = validate_polygon_mesh(&result.mesh, 1e-12);
    assert!(check.is_closed_manifold(), "{check}");
    assert_eq!(check.non_manifold_vertex_count, 0);
    assert!(result.mesh.signed_volume() > 0.9);
}

#[test]
fn selection_never_branches_at_a_vertex() {
    let points = corner_cubes_points();
    let params = scenario_a_params();
    let planes = PlaneRefiner::new(params.refine.clone()).refine(&points).unwrap();
    let arrangement = ArrangementBuilder::new(params.arrangement.clone())
        .build(&planes, &points.bounds())
        .unwrap();
    let scores = ConfidenceEvaluator::new(params.confidence.clone())
        .evaluate(&arrangement, &planes, &points)
        .unwrap();
    let graph = AdjacencyGraph::build(&arrangement);

    let formulator = SelectionFormulator::new(params.weights);
    let problem = formulator
        .formulate(&arrangement, &scores, &graph.constraints())
        .unwrap();
    let selection = formulator
        .solve(&problem, &BranchAndBound, Duration::from_secs(60))
        .unwrap();

    assert!(graph.parity_violations(&selection.selected).is_empty());
    assert!(graph.branching_vertices(&selection.selected).is_empty());
}
