//! File I/O for planar reconstruction.
//!
//! - **VG** (vertex groups) - segmented point sets, read and write
//! - **OBJ** (Wavefront) - polygon mesh output
//! - **OFF** (Object File Format) - polygon mesh output
//!
//! # Example
//!
//! ```no_run
//! use recon_io::{load_vg, save_mesh};
//! use recon_types::PolygonMesh;
//!
//! let points = load_vg("building.vg").unwrap();
//! # let mesh = PolygonMesh::new();
//! // Format detected from the .off extension
//! save_mesh(&mesh, "building.off").unwrap();
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod error;
mod obj;
mod off;
mod vg;

pub use error::{IoError, IoResult};
pub use obj::{save_obj, write_obj};
pub use off::{save_off, write_off};
pub use vg::{load_vg, read_vg, save_vg, write_vg};

use std::path::Path;

use recon_types::PolygonMesh;

/// Supported polygon mesh output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// Wavefront OBJ.
    Obj,
    /// Object File Format.
    Off,
}

impl MeshFormat {
    /// Detect format from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "obj" => Some(Self::Obj),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    /// Canonical file extension.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Off => "off",
        }
    }
}

/// Save a polygon mesh, detecting the format from the extension.
///
/// # Errors
///
/// Returns an error if:
/// - The extension is not `.obj` or `.off`
/// - The mesh has no faces
/// - The file cannot be written
pub fn save_mesh<P: AsRef<Path>>(mesh: &PolygonMesh, path: P) -> IoResult<()> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path).ok_or_else(|| IoError::UnknownFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })?;
    match format {
        MeshFormat::Obj => save_obj(mesh, path),
        MeshFormat::Off => save_off(mesh, path),
    }
}
