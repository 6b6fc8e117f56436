use std::io::Write;
use std::path::Path;

use log::info;

use crate::database::*;  // Import model definitions (Mesh, Element, ElementType, etc.)
use crate::error::MeshResult;
use crate::node_ordering::{format_type_code, to_format_order};
use crate::writer::binary_block::{encode_array, ByteOrder, Pack};
use crate::writer::{check_exportable, create_output};

pub struct VTUWriter;  // Writes XML VTK unstructured grids (.vtu) with compressed binary arrays

impl VTUWriter {

    pub fn write_vtu(
        mesh: &Mesh,
        output_path: impl AsRef<Path>,
    ) -> MeshResult<()> {
        let output_path = output_path.as_ref();
        check_exportable(mesh, MeshFormat::Vtu)?;

        let mut out = create_output(output_path)?;
        Self::write_body(mesh, &mut out)?;
        out.flush()?;

        info!(
            "exported {} points and {} cells to {}",
            mesh.nodes.len(),
            mesh.elements.len(),
            output_path.display()
        );
        Ok(())
    }

    pub fn write_to<W: Write>(mesh: &Mesh, out: &mut W) -> MeshResult<()> {
        check_exportable(mesh, MeshFormat::Vtu)?;
        Self::write_body(mesh, out)
    }

    fn write_body<W: Write>(mesh: &Mesh, out: &mut W) -> MeshResult<()> {

        // 1. Prepare points data
        let points_data: Vec<f64> = mesh
            .nodes
            .iter()
            .flat_map(|node| node.iter().copied())
            .collect();

        // 2. Pre-calculate sizes
        let total_connectivity: usize = mesh.elements.iter().map(|e| e.node_ids.len()).sum();

        let mut connectivity: Vec<i32> = Vec::with_capacity(total_connectivity);
        let mut offsets: Vec<i32> = Vec::with_capacity(mesh.elements.len());
        let mut cell_types: Vec<u8> = Vec::with_capacity(mesh.elements.len());
        let mut current_offset = 0;

        // 3. Process elements individually (connectivity in VTK order, running offsets, types)
        for element in &mesh.elements {
            let vtk_ids = to_format_order(element.element_type, MeshFormat::Vtu, &element.node_ids)?;
            for id in vtk_ids {
                connectivity.push(i32::try_from(id)?);
            }
            current_offset += i32::try_from(element.node_ids.len())?;
            offsets.push(current_offset);  // offset is the END of each cell
            cell_types.push(u8::try_from(format_type_code(element.element_type, MeshFormat::Vtu)?)?);
        }

        // 4. Document
        writeln!(out, "<?xml version=\"1.0\"?>")?;
        writeln!(
            out,
            "<VTKFile type=\"UnstructuredGrid\" version=\"0.1\" byte_order=\"{}\" header_type=\"UInt32\" compressor=\"vtkZLibDataCompressor\">",
            ByteOrder::native().vtk_name()
        )?;
        writeln!(out, "  <UnstructuredGrid>")?;
        writeln!(
            out,
            "    <Piece NumberOfPoints=\"{}\" NumberOfCells=\"{}\">",
            mesh.nodes.len(),
            mesh.elements.len()
        )?;

        writeln!(out, "      <Points>")?;
        write_data_array(out, "Points", Some(3), &points_data)?;
        writeln!(out, "      </Points>")?;

        writeln!(out, "      <Cells>")?;
        write_data_array(out, "connectivity", None, &connectivity)?;
        write_data_array(out, "offsets", None, &offsets)?;
        write_data_array(out, "types", None, &cell_types)?;
        writeln!(out, "      </Cells>")?;

        writeln!(out, "    </Piece>")?;
        writeln!(out, "  </UnstructuredGrid>")?;
        writeln!(out, "</VTKFile>")?;
        Ok(())
    }
}

// One compressed block per array, on its own line
fn write_data_array<W: Write, T: Pack>(
    out: &mut W,
    name: &str,
    components: Option<usize>,
    values: &[T],
) -> MeshResult<()> {
    let block = encode_array(values)?;  // encode before writing the opening tag
    write!(out, "        <DataArray type=\"{}\" Name=\"{}\"", T::TYPE_NAME, name)?;
    if let Some(components) = components {
        write!(out, " NumberOfComponents=\"{}\"", components)?;
    }
    writeln!(out, " format=\"binary\">")?;
    writeln!(out, "          {}", block)?;
    writeln!(out, "        </DataArray>")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::binary_block::decode_array;

    // Block text of the DataArray named `name`
    fn array_block<'a>(document: &'a str, name: &str) -> &'a str {
        let marker = format!("Name=\"{}\"", name);
        let mut lines = document.lines();
        lines.find(|line| line.contains(&marker)).unwrap();
        lines.next().unwrap().trim()
    }

    #[test]
    fn test_single_triangle() {
        let mut mesh = Mesh::new();
        mesh.add_node([0.0, 0.0, 0.0]);
        mesh.add_node([1.0, 0.0, 0.0]);
        mesh.add_node([0.0, 1.0, 0.0]);
        mesh.add_element(Element::new(ElementType::Tri3, vec![0, 1, 2]));

        let mut bytes = Vec::new();
        VTUWriter::write_to(&mesh, &mut bytes).unwrap();
        let document = String::from_utf8(bytes).unwrap();

        assert!(document.contains("<Piece NumberOfPoints=\"3\" NumberOfCells=\"1\">"));
        assert!(document.contains("header_type=\"UInt32\""));
        assert_eq!(decode_array::<u8>(array_block(&document, "types")).unwrap(), vec![5]);
        assert_eq!(decode_array::<i32>(array_block(&document, "offsets")).unwrap(), vec![3]);
        assert_eq!(decode_array::<i32>(array_block(&document, "connectivity")).unwrap(), vec![0, 1, 2]);
        assert_eq!(
            decode_array::<f64>(array_block(&document, "Points")).unwrap(),
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_hex20_connectivity_is_in_vtk_order() {
        let mut mesh = Mesh::new();
        for i in 0..20 {
            mesh.add_node([i as f64, 0.0, 0.0]);
        }
        mesh.add_element(Element::new(ElementType::Hex20, (0..20).collect()));

        let mut bytes = Vec::new();
        VTUWriter::write_to(&mesh, &mut bytes).unwrap();
        let document = String::from_utf8(bytes).unwrap();
        let connectivity = decode_array::<i32>(array_block(&document, "connectivity")).unwrap();
        assert_eq!(
            connectivity,
            vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 11, 13, 9, 16, 18, 19, 17, 10, 12, 14, 15]
        );
        assert_eq!(decode_array::<u8>(array_block(&document, "types")).unwrap(), vec![25]);
    }
}
