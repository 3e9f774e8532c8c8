//! Object File Format (OFF) polygon output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use recon_types::PolygonMesh;

use crate::error::{IoError, IoResult};

/// Save a polygon mesh as OFF.
///
/// # Errors
///
/// Returns [`IoError::EmptyMesh`] for meshes without faces and
/// [`IoError::Io`] if the file cannot be written.
pub fn save_off<P: AsRef<Path>>(mesh: &PolygonMesh, path: P) -> IoResult<()> {
    if mesh.is_empty() {
        return Err(IoError::EmptyMesh);
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_off(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a polygon mesh in OFF format.
///
/// # Errors
///
/// Returns [`IoError::EmptyMesh`] for meshes without faces and
/// [`IoError::Io`] on write failure.
pub fn write_off<W: Write>(mesh: &PolygonMesh, writer: &mut W) -> IoResult<()> {
    if mesh.is_empty() {
        return Err(IoError::EmptyMesh);
    }
    writeln!(writer, "OFF")?;
    writeln!(
        writer,
        "{} {} {}",
        mesh.vertex_count(),
        mesh.face_count(),
        mesh.edge_count()
    )?;
    for v in &mesh.vertices {
        writeln!(writer, "{} {} {}", v.x, v.y, v.z)?;
    }
    for face in &mesh.faces {
        write!(writer, "{}", face.vertices.len())?;
        for &i in &face.vertices {
            write!(writer, " {i}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
