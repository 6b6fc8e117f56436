use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use crate::database::*;
use crate::error::{MeshError, MeshResult};
use crate::node_ordering::{element_type_from_code, from_format_order};
use crate::parser::scanner::{checked_product, Scanner};
use crate::writer::binary_block::ByteOrder;

// Legacy VTK binary payloads are always big-endian
const VTK_BINARY_ORDER: ByteOrder = ByteOrder::BigEndian;

/// Name of the cell field that carries element tags
pub const TAGS_FIELD: &str = "tags";

pub struct VtkLegacyParser;  // Reader for legacy .vtk unstructured grids

impl VtkLegacyParser {
    pub fn parse_file(path: impl AsRef<Path>) -> MeshResult<Mesh> {
        let path = path.as_ref();
        debug!("reading legacy VTK file {}", path.display());
        let bytes = fs::read(path)?;
        let mesh = Self::parse_bytes(&bytes)?;
        info!(
            "imported {} nodes and {} cells from {}",
            mesh.nodes.len(),
            mesh.elements.len(),
            path.display()
        );
        Ok(mesh)
    }

    pub fn parse_bytes(bytes: &[u8]) -> MeshResult<Mesh> {
        let mut scanner = Scanner::new(bytes);

        // Line 1: "# vtk DataFile Version x.y"
        let magic = scanner.next_line()?.unwrap_or_default();
        let version = magic
            .trim()
            .strip_prefix("# vtk DataFile Version")
            .ok_or_else(|| MeshError::format("Missing '# vtk DataFile Version' header"))?;
        let major = version
            .trim()
            .split('.')
            .next()
            .and_then(|major| major.parse::<u32>().ok())
            .ok_or_else(|| MeshError::format(format!("Unreadable VTK version '{}'", version.trim())))?;
        if major >= 5 {
            return Err(MeshError::format(format!(
                "VTK file version {} uses the OFFSETS/CONNECTIVITY layout, only versions up to 4.2 are read",
                version.trim()
            )));
        }

        scanner.next_line()?; // Line 2: title
        let encoding = match scanner.next_non_empty_line()?.map(|line| line.to_ascii_uppercase()) {
            Some(line) if line == "ASCII" => FileEncoding::Ascii,
            Some(line) if line == "BINARY" => FileEncoding::Binary,
            other => {
                return Err(MeshError::format(format!(
                    "Expected ASCII or BINARY, found {:?}",
                    other
                )))
            }
        };

        let mut points: Option<Vec<[f64; 3]>> = None;
        let mut cells: Option<Vec<Vec<usize>>> = None;
        let mut cell_types: Option<Vec<u32>> = None;
        let mut tags: Option<Vec<Vec<i32>>> = None;

        while let Some(keyword) = scanner.next_token()? {
            match keyword.to_ascii_uppercase().as_str() {
                "DATASET" => {
                    let kind = scanner.expect_token("dataset type")?;
                    if !kind.eq_ignore_ascii_case("UNSTRUCTURED_GRID") {
                        return Err(MeshError::format(format!(
                            "Dataset {} is not an unstructured grid",
                            kind
                        )));
                    }
                }
                "POINTS" => points = Some(Self::parse_points(&mut scanner, encoding)?),
                "CELLS" => cells = Some(Self::parse_cells(&mut scanner, encoding)?),
                "CELL_TYPES" => cell_types = Some(Self::parse_cell_types(&mut scanner, encoding)?),
                "CELL_DATA" => {
                    tags = Self::parse_cell_data(&mut scanner, encoding)?;
                    break; // nothing after cell data affects the mesh
                }
                "METADATA" => Self::skip_metadata(&mut scanner)?,
                "POINT_DATA" => break,
                other => {
                    return Err(MeshError::format(format!(
                        "Unexpected keyword '{}' in legacy VTK file",
                        other
                    )))
                }
            }
        }

        let points = points.ok_or_else(|| MeshError::format("Missing POINTS section"))?;
        let cells = cells.unwrap_or_default();
        let cell_types = cell_types.unwrap_or_default();
        if cells.len() != cell_types.len() {
            return Err(MeshError::format(format!(
                "{} cells but {} cell types",
                cells.len(),
                cell_types.len()
            )));
        }

        let mut mesh = Mesh { nodes: points, elements: Vec::with_capacity(cells.len()) };
        for (index, (foreign_ids, &code)) in cells.iter().zip(&cell_types).enumerate() {
            if let Some(&id) = foreign_ids.iter().find(|&&id| id >= mesh.nodes.len()) {
                return Err(MeshError::format(format!(
                    "Cell {} references point {} but only {} points exist",
                    index,
                    id,
                    mesh.nodes.len()
                )));
            }
            let element_type = element_type_from_code(MeshFormat::Vtk, code);
            let node_ids = if element_type == ElementType::Unsupported {
                warn!("cell {} has VTK type {} with no mapping, kept as unsupported", index, code);
                foreign_ids.clone()
            } else {
                from_format_order(element_type, MeshFormat::Vtk, foreign_ids)?
            };
            mesh.add_element(Element::new(element_type, node_ids));
        }

        if let Some(tags) = tags {
            if tags.len() != mesh.elements.len() {
                return Err(MeshError::format(format!(
                    "'{}' field has {} tuples for {} cells",
                    TAGS_FIELD,
                    tags.len(),
                    mesh.elements.len()
                )));
            }
            for (element, element_tags) in mesh.elements.iter_mut().zip(tags) {
                element.tags = element_tags;
            }
        }

        Ok(mesh)
    }

    fn parse_points(scanner: &mut Scanner<'_>, encoding: FileEncoding) -> MeshResult<Vec<[f64; 3]>> {
        let count = scanner.parse::<usize>("number of points")?;
        let data_type = scanner.expect_token("point data type")?.to_ascii_lowercase();

        let num_values = checked_product(count, 3, "points")?;

        let flat: Vec<f64> = match encoding {
            FileEncoding::Ascii => {
                let mut flat = Vec::with_capacity(scanner.capacity_for(num_values));
                for _ in 0..num_values {
                    flat.push(scanner.parse::<f64>("point coordinate")?);
                }
                flat
            }
            FileEncoding::Binary => {
                scanner.finish_line();
                match data_type.as_str() {
                    "float" => scanner
                        .take_values::<f32>(num_values, VTK_BINARY_ORDER, "points")?
                        .into_iter()
                        .map(f64::from)
                        .collect(),
                    "double" => scanner.take_values::<f64>(num_values, VTK_BINARY_ORDER, "points")?,
                    other => {
                        return Err(MeshError::format(format!(
                            "Unsupported binary point type '{}'",
                            other
                        )))
                    }
                }
            }
        };

        Ok(flat.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect())
    }

    fn parse_cells(scanner: &mut Scanner<'_>, encoding: FileEncoding) -> MeshResult<Vec<Vec<usize>>> {
        let count = scanner.parse::<usize>("number of cells")?;
        let size = scanner.parse::<usize>("cell list size")?;

        let flat: Vec<usize> = match encoding {
            FileEncoding::Ascii => {
                let mut flat = Vec::with_capacity(scanner.capacity_for(size));
                for _ in 0..size {
                    flat.push(scanner.parse::<usize>("cell connectivity")?);
                }
                flat
            }
            FileEncoding::Binary => {
                scanner.finish_line();
                scanner
                    .take_values::<i32>(size, VTK_BINARY_ORDER, "cells")?
                    .into_iter()
                    .map(usize::try_from)
                    .collect::<Result<_, _>>()?
            }
        };

        // Each record is "n id_0 .. id_n-1"
        let mut cells = Vec::with_capacity(count.min(flat.len()));
        let mut cursor = 0;
        for index in 0..count {
            let n = *flat
                .get(cursor)
                .ok_or_else(|| MeshError::format(format!("CELLS list ends before cell {}", index)))?;
            let ids = flat
                .get(cursor + 1..)
                .and_then(|rest| rest.get(..n))
                .ok_or_else(|| MeshError::format(format!("CELLS list ends inside cell {}", index)))?;
            cells.push(ids.to_vec());
            cursor += n + 1; // n < flat.len() here
        }
        if cursor != flat.len() {
            return Err(MeshError::format(format!(
                "CELLS declares size {} but records use {}",
                flat.len(),
                cursor
            )));
        }
        Ok(cells)
    }

    fn parse_cell_types(scanner: &mut Scanner<'_>, encoding: FileEncoding) -> MeshResult<Vec<u32>> {
        let count = scanner.parse::<usize>("number of cell types")?;
        match encoding {
            FileEncoding::Ascii => (0..count).map(|_| scanner.parse::<u32>("cell type")).collect(),
            FileEncoding::Binary => {
                scanner.finish_line();
                scanner
                    .take_values::<i32>(count, VTK_BINARY_ORDER, "cell types")?
                    .into_iter()
                    .map(|code| u32::try_from(code).map_err(MeshError::from))
                    .collect()
            }
        }
    }

    // Returns per-cell tags if a FIELD array named "tags" is present
    fn parse_cell_data(
        scanner: &mut Scanner<'_>,
        encoding: FileEncoding,
    ) -> MeshResult<Option<Vec<Vec<i32>>>> {
        scanner.parse::<usize>("number of cell data tuples")?;
        let is_field = scanner
            .next_token()?
            .map_or(false, |token| token.eq_ignore_ascii_case("FIELD"));
        if !is_field {
            return Ok(None); // SCALARS/VECTORS etc. carry no element tags
        }
        scanner.expect_token("field name")?;
        let num_arrays = scanner.parse::<usize>("number of field arrays")?;

        let mut tags = None;
        for _ in 0..num_arrays {
            let name = scanner.expect_token("field array name")?;
            let components = scanner.parse::<usize>("number of components")?;
            let tuples = scanner.parse::<usize>("number of tuples")?;
            let data_type = scanner.expect_token("field array type")?.to_ascii_lowercase();
            let count = checked_product(components, tuples, "field array")?;

            if name == TAGS_FIELD && data_type == "int" {
                let values: Vec<i32> = match encoding {
                    FileEncoding::Ascii => (0..count)
                        .map(|_| scanner.parse::<i32>("tag value"))
                        .collect::<MeshResult<_>>()?,
                    FileEncoding::Binary => {
                        scanner.finish_line();
                        scanner.take_values::<i32>(count, VTK_BINARY_ORDER, "tags")?
                    }
                };
                tags = Some(values.chunks(components.max(1)).map(<[i32]>::to_vec).collect());
            } else {
                Self::skip_array(scanner, encoding, &data_type, count)?;
            }
        }
        Ok(tags)
    }

    // METADATA blocks (array information, component names) run up to the
    // next blank line and carry nothing the mesh needs
    fn skip_metadata(scanner: &mut Scanner<'_>) -> MeshResult<()> {
        scanner.finish_line();
        while let Some(line) = scanner.next_line()? {
            if line.trim().is_empty() {
                break;
            }
        }
        Ok(())
    }

    fn skip_array(
        scanner: &mut Scanner<'_>,
        encoding: FileEncoding,
        data_type: &str,
        count: usize,
    ) -> MeshResult<()> {
        match encoding {
            FileEncoding::Ascii => {
                for _ in 0..count {
                    scanner.expect_token("field value")?;
                }
            }
            FileEncoding::Binary => {
                let width = match data_type {
                    "bit" | "char" | "unsigned_char" => 1,
                    "short" | "unsigned_short" => 2,
                    "int" | "unsigned_int" | "float" => 4,
                    "long" | "unsigned_long" | "double" | "vtktypeint64" | "vtktypeuint64" => 8,
                    other => {
                        return Err(MeshError::format(format!(
                            "Unknown field data type '{}'",
                            other
                        )))
                    }
                };
                scanner.finish_line();
                scanner.take(checked_product(width, count, "field array")?, "field array")?;
            }
        }
        Ok(())
    }
}
