// src/lib.rs

//! Mesh interchange between STL, legacy VTK, XML VTU and Gmsh 2.2.
//!
//! Importers yield a [`Mesh`] whose elements hold node ids in the canonical
//! (Gmsh) order of their kind; exporters translate that order and the type
//! codes per format through [`node_ordering`].

pub mod database;
pub mod error;
pub mod node_ordering;
pub mod parser;
pub mod writer;

use std::path::Path;

pub use database::{Element, ElementType, FileEncoding, Mesh, MeshFormat};
pub use error::{MeshError, MeshResult};

use parser::gmsh::GmshParser;
use parser::stl::StlParser;
use parser::vtk_legacy::VtkLegacyParser;
use writer::gmsh_writer::GmshWriter;
use writer::stl_writer::STLWriter;
use writer::vtk_writer::VTKWriter;
use writer::xml_writer::VTUWriter;

pub fn import_stl(path: impl AsRef<Path>) -> MeshResult<Mesh> {
    StlParser::parse_file(path)
}

pub fn import_vtk(path: impl AsRef<Path>) -> MeshResult<Mesh> {
    VtkLegacyParser::parse_file(path)
}

pub fn import_gmsh_v22(path: impl AsRef<Path>) -> MeshResult<Mesh> {
    GmshParser::parse_file(path)
}

/// Triangles only; any other element fails before the file is created
pub fn export_stl(mesh: &Mesh, path: impl AsRef<Path>, encoding: FileEncoding) -> MeshResult<()> {
    STLWriter::write_stl(mesh, path, encoding)
}

pub fn export_vtk(mesh: &Mesh, path: impl AsRef<Path>, encoding: FileEncoding) -> MeshResult<()> {
    VTKWriter::write_vtk(mesh, path, encoding)
}

/// Always binary: every array is a zlib-compressed, base64-encoded block
pub fn export_vtu(mesh: &Mesh, path: impl AsRef<Path>) -> MeshResult<()> {
    VTUWriter::write_vtu(mesh, path)
}

pub fn export_gmsh_v22(mesh: &Mesh, path: impl AsRef<Path>, encoding: FileEncoding) -> MeshResult<()> {
    GmshWriter::write_msh(mesh, path, encoding)
}

fn format_of(path: &Path) -> MeshResult<MeshFormat> {
    MeshFormat::from_path(path).ok_or_else(|| {
        MeshError::format(format!(
            "Cannot infer a mesh format from '{}' (expected .stl, .vtk, .vtu or .msh)",
            path.display()
        ))
    })
}

/// Imports with the reader picked from the file extension.
/// VTU is write-only and is reported as a format error.
pub fn import_mesh(path: impl AsRef<Path>) -> MeshResult<Mesh> {
    let path = path.as_ref();
    match format_of(path)? {
        MeshFormat::Stl => import_stl(path),
        MeshFormat::Vtk => import_vtk(path),
        MeshFormat::Gmsh22 => import_gmsh_v22(path),
        MeshFormat::Vtu => Err(MeshError::format("VTU files can be written but not read")),
    }
}

/// Exports with the writer picked from the file extension; `encoding` is
/// ignored for VTU
pub fn export_mesh(mesh: &Mesh, path: impl AsRef<Path>, encoding: FileEncoding) -> MeshResult<()> {
    let path = path.as_ref();
    match format_of(path)? {
        MeshFormat::Stl => export_stl(mesh, path, encoding),
        MeshFormat::Vtk => export_vtk(mesh, path, encoding),
        MeshFormat::Vtu => export_vtu(mesh, path),
        MeshFormat::Gmsh22 => export_gmsh_v22(mesh, path, encoding),
    }
}
