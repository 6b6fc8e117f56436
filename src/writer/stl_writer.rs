use std::io::Write;
use std::path::Path;

use log::info;

use crate::database::*;
use crate::error::MeshResult;
use crate::node_ordering::to_format_order;
use crate::writer::binary_block::{ByteBuffer, ByteOrder};
use crate::writer::{check_exportable, create_output};

const SOLID_NAME: &str = "meshconv";
// Must not start with "solid" or readers may take the file for ASCII
const BINARY_HEADER: &[u8] = b"binary STL written by meshconv";

pub struct STLWriter;  // Writes Tri3-only meshes as STL surfaces

impl STLWriter {
    pub fn write_stl(mesh: &Mesh, output_path: impl AsRef<Path>, encoding: FileEncoding) -> MeshResult<()> {
        let output_path = output_path.as_ref();
        check_exportable(mesh, MeshFormat::Stl)?; // before the file exists

        let mut out = create_output(output_path)?;
        Self::write_body(mesh, &mut out, encoding)?;
        out.flush()?;

        info!("exported {} facets to {}", mesh.elements.len(), output_path.display());
        Ok(())
    }

    /// Same as [`STLWriter::write_stl`] but into any writer
    pub fn write_to<W: Write>(mesh: &Mesh, out: &mut W, encoding: FileEncoding) -> MeshResult<()> {
        check_exportable(mesh, MeshFormat::Stl)?;
        Self::write_body(mesh, out, encoding)
    }

    fn write_body<W: Write>(mesh: &Mesh, out: &mut W, encoding: FileEncoding) -> MeshResult<()> {
        match encoding {
            FileEncoding::Ascii => Self::write_ascii(mesh, out),
            FileEncoding::Binary => Self::write_binary(mesh, out),
        }
    }

    fn facet_corners(mesh: &Mesh, element: &Element) -> MeshResult<[[f64; 3]; 3]> {
        let ids = to_format_order(element.element_type, MeshFormat::Stl, &element.node_ids)?;
        Ok([mesh.nodes[ids[0]], mesh.nodes[ids[1]], mesh.nodes[ids[2]]])
    }

    fn write_ascii<W: Write>(mesh: &Mesh, out: &mut W) -> MeshResult<()> {
        writeln!(out, "solid {}", SOLID_NAME)?;
        for element in &mesh.elements {
            let corners = Self::facet_corners(mesh, element)?;
            let [nx, ny, nz] = facet_normal(&corners);
            writeln!(out, "  facet normal {:?} {:?} {:?}", nx, ny, nz)?;
            writeln!(out, "    outer loop")?;
            for [x, y, z] in corners {
                writeln!(out, "      vertex {:?} {:?} {:?}", x, y, z)?;
            }
            writeln!(out, "    endloop")?;
            writeln!(out, "  endfacet")?;
        }
        writeln!(out, "endsolid {}", SOLID_NAME)?;
        Ok(())
    }

    // 80-byte header, u32 facet count, then per facet: normal, 3 vertices
    // (12 x f32) and a zero u16 attribute. Everything little-endian.
    fn write_binary<W: Write>(mesh: &Mesh, out: &mut W) -> MeshResult<()> {
        let mut header = [b' '; 80];
        header[..BINARY_HEADER.len()].copy_from_slice(BINARY_HEADER);
        out.write_all(&header)?;

        let mut buffer = ByteBuffer::with_capacity(ByteOrder::LittleEndian, 4 + 50 * mesh.elements.len());
        buffer.push(u32::try_from(mesh.elements.len())?);
        for element in &mesh.elements {
            let corners = Self::facet_corners(mesh, element)?;
            let normal = facet_normal(&corners);
            for value in normal.iter().chain(corners.iter().flatten()) {
                buffer.push(*value as f32);
            }
            buffer.push(0u16);
        }
        out.write_all(buffer.as_bytes())?;
        Ok(())
    }
}

/// Unit normal from the right-hand winding; zero for degenerate facets
fn facet_normal(corners: &[[f64; 3]; 3]) -> [f64; 3] {
    let [a, b, c] = corners;
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    let length = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if length > 0.0 {
        [n[0] / length, n[1] / length, n[2] / length]
    } else {
        [0.0; 3]
    }
}
