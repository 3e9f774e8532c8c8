//! Stage orchestration.

use std::fmt;
use std::time::{Duration, Instant};

use recon_hypothesis::{
    AdjacencyGraph, ArrangementBuilder, ConfidenceEvaluator, PlaneRefiner, SupportingPlane,
};
use recon_select::{BinarySolver, MeshAssembler, SelectionFormulator};
use recon_types::{PointSet, PolygonMesh};
use tracing::info;

use crate::error::ReconResult;
use crate::params::ReconstructionParams;

/// Counters collected along the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReconstructionStats {
    /// Input points.
    pub points: usize,
    /// Input segments.
    pub groups: usize,
    /// Supporting planes after refinement.
    pub supporting_planes: usize,
    /// Faces of the arrangement.
    pub candidate_faces: usize,
    /// Faces eligible for selection.
    pub enclosed_faces: usize,
    /// Edges of the arrangement.
    pub edges: usize,
    /// Variables of the binary program.
    pub variables: usize,
    /// Rows of the binary program.
    pub constraints: usize,
    /// Faces chosen by the solver.
    pub selected_faces: usize,
    /// Optimal objective value.
    pub objective: f64,
    /// Polygons in the output mesh.
    pub output_faces: usize,
    /// Vertices in the output mesh.
    pub output_vertices: usize,
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
}

impl fmt::Display for ReconstructionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reconstruction:")?;
        writeln!(f, "  Input: {} points, {} groups", self.points, self.groups)?;
        writeln!(f, "  Supporting planes: {}", self.supporting_planes)?;
        writeln!(
            f,
            "  Candidates: {} faces ({} enclosed), {} edges",
            self.candidate_faces, self.enclosed_faces, self.edges
        )?;
        writeln!(
            f,
            "  Program: {} variables, {} constraints",
            self.variables, self.constraints
        )?;
        writeln!(
            f,
            "  Selected: {} faces, objective {:.6}",
            self.selected_faces, self.objective
        )?;
        writeln!(
            f,
            "  Output: {} faces, {} vertices",
            self.output_faces, self.output_vertices
        )?;
        write!(f, "  Time: {:.3}s", self.elapsed.as_secs_f64())
    }
}

/// Result of a successful reconstruction.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// The closed polygon model.
    pub mesh: PolygonMesh,
    /// Supporting planes; [`recon_types::PolygonFace::plane`] indexes this.
    pub planes: Vec<SupportingPlane>,
    /// Run statistics.
    pub stats: ReconstructionStats,
}

/// Reconstruct a closed polygon model from a segmented point set, using the
/// solver backend named in `params`.
///
/// # Errors
///
/// Any [`crate::ReconError`]; see [`reconstruct_with_solver`].
///
/// # Example
///
/// ```
/// use recon_pipeline::{reconstruct, ReconstructionParams};
/// use recon_types::{Point, PointSet, Point3, Vector3};
///
/// // 200 points per face of a 2x2x2 box, one segment per face.
/// let mut points = Vec::new();
/// for axis in 0..3 {
///     for side in 0..2u32 {
///         let mut normal = Vector3::zeros();
///         normal[axis] = if side == 1 { 1.0 } else { -1.0 };
///         for i in 1..=200u32 {
///             let s = (0.5 + f64::from(i) * 0.754_877_666_246_693).fract();
///             let t = (0.5 + f64::from(i) * 0.569_840_290_998_053).fract();
///             let mut p = Point3::origin();
///             p[axis] = 2.0 * f64::from(side);
///             p[(axis + 1) % 3] = 2.0 * s;
///             p[(axis + 2) % 3] = 2.0 * t;
///             points.push(Point::new(p, normal, axis as u32 * 2 + side));
///         }
///     }
/// }
///
/// let result = reconstruct(&PointSet::new(points), &ReconstructionParams::default()).unwrap();
/// assert_eq!(result.mesh.face_count(), 6);
/// assert!((result.mesh.signed_volume() - 8.0).abs() < 1e-6);
/// ```
pub fn reconstruct(
    points: &PointSet,
    params: &ReconstructionParams,
) -> ReconResult<Reconstruction> {
    let solver = params.selection.backend.solver();
    reconstruct_with_solver(points, params, solver.as_ref())
}

/// Reconstruct with a caller-provided solver.
///
/// Runs plane refinement, arrangement, confidence scoring, manifold
/// constraints, face selection and mesh assembly in order. The point set is
/// only borrowed until confidence scoring; the returned mesh is owned by the
/// caller.
///
/// # Errors
///
/// - [`crate::ReconError::InvalidWeights`] / [`crate::ReconError::InvalidParameter`]
///   for bad configuration
/// - [`crate::ReconError::InsufficientSegments`] if no segment survives refinement
/// - [`crate::ReconError::ArrangementEmpty`] if the planes enclose nothing
/// - [`crate::ReconError::OptimizationFailed`] on solver infeasibility or timeout
/// - [`crate::ReconError::EmptyResult`] if the optimum selects nothing
/// - [`crate::ReconError::MeshAssemblyFailed`] if the result is not a closed
///   2-manifold
pub fn reconstruct_with_solver(
    points: &PointSet,
    params: &ReconstructionParams,
    solver: &dyn BinarySolver,
) -> ReconResult<Reconstruction> {
    params.validate()?;
    let start = Instant::now();
    info!(
        points = points.len(),
        groups = points.groups().len(),
        solver = solver.name(),
        weights = %params.weights,
        "Starting reconstruction"
    );

    let planes = PlaneRefiner::new(params.refine.clone()).refine(points)?;
    let arrangement =
        ArrangementBuilder::new(params.arrangement.clone()).build(&planes, &points.bounds())?;
    let scores =
        ConfidenceEvaluator::new(params.confidence.clone()).evaluate(&arrangement, &planes, points)?;
    let constraints = AdjacencyGraph::build(&arrangement).constraints();

    let formulator = SelectionFormulator::new(params.weights);
    let problem = formulator.formulate(&arrangement, &scores, &constraints)?;
    let selection = formulator.solve(&problem, solver, params.selection.time_budget)?;
    let mesh = MeshAssembler::new(params.assembly).assemble(&arrangement, &selection)?;

    let stats = ReconstructionStats {
        points: points.len(),
        groups: points.groups().len(),
        supporting_planes: planes.len(),
        candidate_faces: arrangement.faces().len(),
        enclosed_faces: arrangement.enclosed_count(),
        edges: arrangement.edges().len(),
        variables: problem.program().variable_count(),
        constraints: problem.program().constraint_count(),
        selected_faces: selection.selected_count(),
        objective: selection.objective,
        output_faces: mesh.face_count(),
        output_vertices: mesh.vertex_count(),
        elapsed: start.elapsed(),
    };
    info!(
        faces = stats.output_faces,
        vertices = stats.output_vertices,
        objective = stats.objective,
        elapsed_ms = stats.elapsed.as_millis(),
        "Reconstruction complete"
    );

    Ok(Reconstruction {
        mesh,
        planes,
        stats,
    })
}
