// Exporters. Each one checks the whole mesh against the target format before
// the output file is created, so a rejected mesh never leaves a file behind.

pub mod binary_block;
pub mod gmsh_writer;
pub mod stl_writer;
pub mod vtk_writer;
pub mod xml_writer;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::debug;

use crate::database::{Mesh, MeshFormat};
use crate::error::{MeshError, MeshResult};
use crate::node_ordering::supports;

/// Fails on the first element `format` cannot represent, then on any
/// out-of-range node id or wrong node count.
pub fn check_exportable(mesh: &Mesh, format: MeshFormat) -> MeshResult<()> {
    if let Some(element) = mesh
        .elements
        .iter()
        .find(|element| !supports(element.element_type, format))
    {
        return Err(MeshError::unsupported(element.element_type, format));
    }
    mesh.validate()
}

/// Opens `path` for writing, truncating any existing file
pub(crate) fn create_output(path: &Path) -> MeshResult<BufWriter<File>> {
    debug!("writing {}", path.display());
    Ok(BufWriter::new(File::create(path)?))
}
