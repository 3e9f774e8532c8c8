//! Wavefront OBJ polygon output.
//!
//! Faces are written as polygons, not triangulated. Indices are 1-based.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use recon_types::PolygonMesh;

use crate::error::{IoError, IoResult};

/// Save a polygon mesh as OBJ.
///
/// # Errors
///
/// Returns [`IoError::EmptyMesh`] for meshes without faces and
/// [`IoError::Io`] if the file cannot be written.
///
/// # Example
///
/// ```no_run
/// use recon_io::save_obj;
/// use recon_types::PolygonMesh;
///
/// # let mesh = PolygonMesh::new();
/// save_obj(&mesh, "model.obj").unwrap();
/// ```
pub fn save_obj<P: AsRef<Path>>(mesh: &PolygonMesh, path: P) -> IoResult<()> {
    if mesh.is_empty() {
        return Err(IoError::EmptyMesh);
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a polygon mesh in OBJ format.
///
/// # Errors
///
/// Returns [`IoError::EmptyMesh`] for meshes without faces and
/// [`IoError::Io`] on write failure.
pub fn write_obj<W: Write>(mesh: &PolygonMesh, writer: &mut W) -> IoResult<()> {
    if mesh.is_empty() {
        return Err(IoError::EmptyMesh);
    }
    writeln!(writer, "# Generated by recon-io")?;
    writeln!(
        writer,
        "# {} vertices, {} faces",
        mesh.vertex_count(),
        mesh.face_count()
    )?;
    for v in &mesh.vertices {
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for face in &mesh.faces {
        write!(writer, "f")?;
        for &i in &face.vertices {
            write!(writer, " {}", u64::from(i) + 1)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_types::{Point3, PolygonFace};

    #[test]
    fn test_write_quad() {
        let mut mesh = PolygonMesh::new();
        mesh.vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        mesh.faces.push(PolygonFace::new(vec![0, 1, 2, 3], 0));

        let mut buffer = Vec::new();
        write_obj(&mesh, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 4);
        assert!(text.lines().any(|l| l == "f 1 2 3 4"));
        assert!(text.contains("v 1 1 0"));
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let mut buffer = Vec::new();
        assert!(matches!(
            write_obj(&PolygonMesh::new(), &mut buffer),
            Err(IoError::EmptyMesh)
        ));
    }
}
