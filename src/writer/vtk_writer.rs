use std::io::Write;
use std::path::Path;

use log::info;

use crate::database::*;
use crate::error::MeshResult;
use crate::node_ordering::{format_type_code, to_format_order};
use crate::parser::vtk_legacy::TAGS_FIELD;
use crate::writer::binary_block::{ByteBuffer, ByteOrder};
use crate::writer::{check_exportable, create_output};

const VTK_TITLE: &str = "written by meshconv";

pub struct VTKWriter;  // Legacy .vtk unstructured grid writer

impl VTKWriter {
    pub fn write_vtk(mesh: &Mesh, output_path: impl AsRef<Path>, encoding: FileEncoding) -> MeshResult<()> {
        let output_path = output_path.as_ref();
        check_exportable(mesh, MeshFormat::Vtk)?;

        let mut out = create_output(output_path)?;
        Self::write_body(mesh, &mut out, encoding)?;
        out.flush()?;

        info!(
            "exported {} points and {} cells to {}",
            mesh.nodes.len(),
            mesh.elements.len(),
            output_path.display()
        );
        Ok(())
    }

    pub fn write_to<W: Write>(mesh: &Mesh, out: &mut W, encoding: FileEncoding) -> MeshResult<()> {
        check_exportable(mesh, MeshFormat::Vtk)?;
        Self::write_body(mesh, out, encoding)
    }

    fn write_body<W: Write>(mesh: &Mesh, out: &mut W, encoding: FileEncoding) -> MeshResult<()> {
        // 1. Reorder connectivity and look up cell types up front
        let mut cells = Vec::with_capacity(mesh.elements.len());
        let mut cell_types = Vec::with_capacity(mesh.elements.len());
        for element in &mesh.elements {
            cells.push(to_format_order(element.element_type, MeshFormat::Vtk, &element.node_ids)?);
            cell_types.push(format_type_code(element.element_type, MeshFormat::Vtk)?);
        }
        let cell_list_size: usize = cells.iter().map(|cell| cell.len() + 1).sum();

        // 2. Preamble
        writeln!(out, "# vtk DataFile Version 3.0")?;
        writeln!(out, "{}", VTK_TITLE)?;
        writeln!(out, "{}", match encoding {
            FileEncoding::Ascii => "ASCII",
            FileEncoding::Binary => "BINARY",
        })?;
        writeln!(out, "DATASET UNSTRUCTURED_GRID")?;

        // 3. Sections
        writeln!(out, "POINTS {} double", mesh.nodes.len())?;
        match encoding {
            FileEncoding::Ascii => {
                for [x, y, z] in &mesh.nodes {
                    writeln!(out, "{:?} {:?} {:?}", x, y, z)?;
                }
            }
            FileEncoding::Binary => {
                let mut buffer = ByteBuffer::with_capacity(ByteOrder::BigEndian, mesh.nodes.len() * 24);
                for point in &mesh.nodes {
                    buffer.extend(point);
                }
                write_binary_section(out, &buffer)?;
            }
        }

        writeln!(out, "CELLS {} {}", cells.len(), cell_list_size)?;
        match encoding {
            FileEncoding::Ascii => {
                for cell in &cells {
                    write!(out, "{}", cell.len())?;
                    for id in cell {
                        write!(out, " {}", id)?;
                    }
                    writeln!(out)?;
                }
            }
            FileEncoding::Binary => {
                let mut buffer = ByteBuffer::with_capacity(ByteOrder::BigEndian, cell_list_size * 4);
                for cell in &cells {
                    buffer.push(i32::try_from(cell.len())?);
                    for &id in cell {
                        buffer.push(i32::try_from(id)?);
                    }
                }
                write_binary_section(out, &buffer)?;
            }
        }

        writeln!(out, "CELL_TYPES {}", cell_types.len())?;
        match encoding {
            FileEncoding::Ascii => {
                for code in &cell_types {
                    writeln!(out, "{}", code)?;
                }
            }
            FileEncoding::Binary => {
                let mut buffer = ByteBuffer::with_capacity(ByteOrder::BigEndian, cell_types.len() * 4);
                for &code in &cell_types {
                    buffer.push(i32::try_from(code)?);
                }
                write_binary_section(out, &buffer)?;
            }
        }

        if let Some(components) = uniform_tag_count(mesh) {
            Self::write_tags(mesh, out, encoding, components)?;
        }
        Ok(())
    }

    fn write_tags<W: Write>(mesh: &Mesh, out: &mut W, encoding: FileEncoding, components: usize) -> MeshResult<()> {
        writeln!(out, "CELL_DATA {}", mesh.elements.len())?;
        writeln!(out, "FIELD FieldData 1")?;
        writeln!(out, "{} {} {} int", TAGS_FIELD, components, mesh.elements.len())?;
        match encoding {
            FileEncoding::Ascii => {
                for element in &mesh.elements {
                    let line: Vec<String> = element.tags.iter().map(i32::to_string).collect();
                    writeln!(out, "{}", line.join(" "))?;
                }
            }
            FileEncoding::Binary => {
                let mut buffer = ByteBuffer::with_capacity(ByteOrder::BigEndian, mesh.elements.len() * components * 4);
                for element in &mesh.elements {
                    buffer.extend(&element.tags);
                }
                write_binary_section(out, &buffer)?;
            }
        }
        Ok(())
    }
}

// Raw big-endian payload followed by the newline that ends the section
fn write_binary_section<W: Write>(out: &mut W, buffer: &ByteBuffer) -> MeshResult<()> {
    out.write_all(buffer.as_bytes())?;
    writeln!(out)?;
    Ok(())
}

/// Tags are stored only when every element has the same, non-zero count
fn uniform_tag_count(mesh: &Mesh) -> Option<usize> {
    let first = mesh.elements.first()?.tags.len();
    if first == 0 || mesh.elements.iter().any(|element| element.tags.len() != first) {
        return None;
    }
    Some(first)
}
