use std::io::Write;
use std::path::Path;

use log::info;

use crate::database::*;
use crate::error::MeshResult;
use crate::node_ordering::{format_type_code, to_format_order};
use crate::writer::binary_block::{ByteBuffer, ByteOrder};
use crate::writer::{check_exportable, create_output};

pub struct GmshWriter;  // Gmsh MSH 2.2 writer, ASCII or binary

impl GmshWriter {
    pub fn write_msh(mesh: &Mesh, output_path: impl AsRef<Path>, encoding: FileEncoding) -> MeshResult<()> {
        let output_path = output_path.as_ref();
        check_exportable(mesh, MeshFormat::Gmsh22)?;

        let mut out = create_output(output_path)?;
        Self::write_body(mesh, &mut out, encoding)?;
        out.flush()?;

        info!(
            "exported {} nodes and {} elements to {}",
            mesh.nodes.len(),
            mesh.elements.len(),
            output_path.display()
        );
        Ok(())
    }

    pub fn write_to<W: Write>(mesh: &Mesh, out: &mut W, encoding: FileEncoding) -> MeshResult<()> {
        check_exportable(mesh, MeshFormat::Gmsh22)?;
        Self::write_body(mesh, out, encoding)
    }

    fn write_body<W: Write>(mesh: &Mesh, out: &mut W, encoding: FileEncoding) -> MeshResult<()> {
        writeln!(out, "$MeshFormat")?;
        match encoding {
            FileEncoding::Ascii => writeln!(out, "2.2 0 8")?,
            FileEncoding::Binary => {
                writeln!(out, "2.2 1 8")?;
                out.write_all(&1i32.to_ne_bytes())?; // endianness marker
                writeln!(out)?;
            }
        }
        writeln!(out, "$EndMeshFormat")?;

        writeln!(out, "$Nodes")?;
        writeln!(out, "{}", mesh.nodes.len())?;
        match encoding {
            FileEncoding::Ascii => {
                for (index, [x, y, z]) in mesh.nodes.iter().enumerate() {
                    writeln!(out, "{} {:?} {:?} {:?}", index + 1, x, y, z)?;
                }
            }
            FileEncoding::Binary => {
                let mut buffer = ByteBuffer::with_capacity(ByteOrder::native(), mesh.nodes.len() * 28);
                for (index, point) in mesh.nodes.iter().enumerate() {
                    buffer.push(i32::try_from(index + 1)?);
                    buffer.extend(point);
                }
                out.write_all(buffer.as_bytes())?;
                writeln!(out)?;
            }
        }
        writeln!(out, "$EndNodes")?;

        writeln!(out, "$Elements")?;
        writeln!(out, "{}", mesh.elements.len())?;
        match encoding {
            FileEncoding::Ascii => Self::write_elements_ascii(mesh, out)?,
            FileEncoding::Binary => {
                Self::write_elements_binary(mesh, out)?;
                writeln!(out)?;
            }
        }
        writeln!(out, "$EndElements")?;
        Ok(())
    }

    // elm-number elm-type number-of-tags <tags> <node labels>, labels 1-based
    fn write_elements_ascii<W: Write>(mesh: &Mesh, out: &mut W) -> MeshResult<()> {
        for (index, element) in mesh.elements.iter().enumerate() {
            let code = format_type_code(element.element_type, MeshFormat::Gmsh22)?;
            write!(out, "{} {} {}", index + 1, code, element.tags.len())?;
            for tag in &element.tags {
                write!(out, " {}", tag)?;
            }
            for id in to_format_order(element.element_type, MeshFormat::Gmsh22, &element.node_ids)? {
                write!(out, " {}", id + 1)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    // Runs of consecutive elements with the same type and tag count share one
    // [elm-type, num-elm-follow, num-tags] header
    fn write_elements_binary<W: Write>(mesh: &Mesh, out: &mut W) -> MeshResult<()> {
        let mut buffer = ByteBuffer::new(ByteOrder::native());
        let mut start = 0;
        while start < mesh.elements.len() {
            let first = &mesh.elements[start];
            let run = mesh.elements[start..]
                .iter()
                .take_while(|element| {
                    element.element_type == first.element_type && element.tags.len() == first.tags.len()
                })
                .count();

            buffer.push(i32::try_from(format_type_code(first.element_type, MeshFormat::Gmsh22)?)?);
            buffer.push(i32::try_from(run)?);
            buffer.push(i32::try_from(first.tags.len())?);

            for (offset, element) in mesh.elements[start..start + run].iter().enumerate() {
                buffer.push(i32::try_from(start + offset + 1)?);
                buffer.extend(&element.tags);
                for id in to_format_order(element.element_type, MeshFormat::Gmsh22, &element.node_ids)? {
                    buffer.push(i32::try_from(id + 1)?);
                }
            }
            start += run;
        }
        out.write_all(buffer.as_bytes())?;
        Ok(())
    }
}
