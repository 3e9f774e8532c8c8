//! `recon` - reconstruct a closed polygon model from a segmented point cloud.
//!
//! ```text
//! recon <FITTING> <COVERAGE> <COMPLEXITY> <INPUT> <OUTPUT> [--solver <SOLVER>] [--time-limit <SECS>]
//! ```
//!
//! The three weights must be non-negative and add up to 1. The input is a
//! `.vg` vertex group file; the output format follows the extension (`.obj`
//! or `.off`). Log verbosity is controlled with `RUST_LOG`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use recon_io::{load_vg, save_mesh, MeshFormat};
use recon_pipeline::{
    reconstruct, ObjectiveWeights, ReconError, Reconstruction, ReconstructionParams,
    SolverBackend,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Piecewise-planar surface reconstruction
///
/// Selects a closed polygon model from the plane arrangement of a segmented
/// point cloud.
#[derive(Parser, Debug)]
#[command(name = "recon")]
#[command(about = "Piecewise-planar surface reconstruction", long_about = None)]
#[command(version, allow_negative_numbers = true)]
struct Cli {
    /// Weight of the data fitting term (e.g. 0.43)
    fitting: f64,

    /// Weight of the model coverage term (e.g. 0.27)
    coverage: f64,

    /// Weight of the model complexity term (e.g. 0.30)
    complexity: f64,

    /// Segmented point set (.vg)
    input: PathBuf,

    /// Output mesh (.obj or .off)
    output: PathBuf,

    /// Solver backend: branch-and-bound or exhaustive
    #[arg(long, default_value_t = SolverBackend::BranchAndBound)]
    solver: SolverBackend,

    /// Solver time limit in seconds
    #[arg(long, default_value_t = 60.0)]
    time_limit: f64,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = run(&cli)?;
    println!("{}", result.stats);
    println!("reconstructed model saved to {}", cli.output.display());
    Ok(())
}

/// Validate the arguments, reconstruct and write the mesh.
fn run(cli: &Cli) -> Result<Reconstruction> {
    let params = params(cli)?;
    output_format(&cli.output)?;

    let points = load_vg(&cli.input)
        .with_context(|| format!("failed loading point cloud from {}", cli.input.display()))?;
    if points.groups().is_empty() {
        return Err(anyhow!("planar segments do not exist in {}", cli.input.display()));
    }

    let result = reconstruct(&points, &params).context("reconstruction failed")?;
    drop(points);

    save_mesh(&result.mesh, &cli.output)
        .with_context(|| format!("failed saving model to {}", cli.output.display()))?;
    info!(path = %cli.output.display(), faces = result.mesh.face_count(), "Saved model");
    Ok(result)
}

fn params(cli: &Cli) -> Result<ReconstructionParams> {
    let weights = ObjectiveWeights::new(cli.fitting, cli.coverage, cli.complexity)
        .map_err(ReconError::from)
        .context("weights must be non-negative and sum up to 1")?;
    let budget = Duration::try_from_secs_f64(cli.time_limit)
        .map_err(|_| anyhow!("invalid time limit: {}", cli.time_limit))?;
    Ok(ReconstructionParams::new(weights)
        .with_backend(cli.solver)
        .with_time_budget(budget))
}

fn output_format(path: &Path) -> Result<MeshFormat> {
    MeshFormat::from_path(path).ok_or_else(|| {
        anyhow!(
            "unsupported output format for {} (expected .obj or .off)",
            path.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsString;
    use recon_types::{Point, Point3, PointSet, Vector3};

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_positional_arguments() {
        let cli = Cli::try_parse_from([
            "recon", "0.43", "0.27", "0.30", "in.vg", "out.obj", "--solver", "exhaustive",
        ])
        .unwrap();
        assert_eq!(cli.input, PathBuf::from("in.vg"));
        assert_eq!(cli.solver, SolverBackend::Exhaustive);
        assert!((cli.time_limit - 60.0).abs() < f64::EPSILON);

        assert!(Cli::try_parse_from(["recon", "0.43", "0.27", "0.30", "in.vg"]).is_err());
        assert!(
            Cli::try_parse_from(["recon", "0.4", "0.3", "0.3", "a.vg", "b.obj", "extra"]).is_err()
        );
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let cli =
            Cli::try_parse_from(["recon", "0.5", "0.5", "0.0001", "in.vg", "out.obj"]).unwrap();
        let err = params(&cli).unwrap_err();
        assert!(err.root_cause().to_string().contains("sum to 1"));

        let cli = Cli::try_parse_from(["recon", "-0.2", "0.6", "0.6", "in.vg", "out.obj"]).unwrap();
        assert!(params(&cli).is_err());
    }

    #[test]
    fn test_rejects_bad_time_limit_and_format() {
        let cli = Cli::try_parse_from([
            "recon", "0.4", "0.3", "0.3", "in.vg", "out.obj", "--time-limit", "-1",
        ])
        .unwrap();
        assert!(params(&cli).is_err());
        assert!(output_format(Path::new("out.stl")).is_err());
        assert_eq!(output_format(Path::new("out.off")).unwrap(), MeshFormat::Off);
    }

    fn cube_points() -> PointSet {
        let g = 1.324_717_957_244_746;
        let mut points = Vec::new();
        for axis in 0..3 {
            for side in 0..2u32 {
                let mut normal = Vector3::zeros();
                normal[axis] = if side == 1 { 1.0 } else { -1.0 };
                for i in 1..=300 {
                    let i = f64::from(i);
                    let mut p = Point3::origin();
                    p[axis] = f64::from(side);
                    p[(axis + 1) % 3] = (0.5 + i / g).fract();
                    p[(axis + 2) % 3] = (0.5 + i / (g * g)).fract();
                    let label = u32::try_from(axis).unwrap() * 2 + side;
                    points.push(Point::new(p, normal, label));
                }
            }
        }
        PointSet::new(points)
    }

    fn args(input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "recon".into(),
            "0.43".into(),
            "0.27".into(),
            "0.30".into(),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ]
    }

    #[test]
    fn test_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cube.vg");
        let output = dir.path().join("cube.off");
        recon_io::save_vg(&cube_points(), &input).unwrap();

        let cli = Cli::try_parse_from(args(&input, &output)).unwrap();
        let result = run(&cli).unwrap();
        assert_eq!(result.mesh.face_count(), 6);

        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(text.lines().nth(1), Some("8 6 12"));
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from(args(
            &dir.path().join("missing.vg"),
            &dir.path().join("out.obj"),
        ))
        .unwrap();
        let err = run(&cli).unwrap_err();
        assert!(err.to_string().contains("failed loading point cloud"));
    }
}
