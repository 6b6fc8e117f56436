//! Element type registry.
//!
//! Static metadata for every [`ElementType`]: fixed node count, the canonical
//! (Gmsh) node order, the per-format node permutation and the per-format type
//! code. Everything here is table data; nothing is computed at run time.
//!
//! A permutation `p` for a format means foreign node `i` is canonical slot
//! `p[i]`. Exporters write `node_ids[p[i]]` as node `i`; importers store
//! foreign node `i` into `node_ids[p[i]]`.
//!
//! Canonical numbering (from the Gmsh reference diagrams):
//!
//! ```text
//! Tri6:            Quad9:               Tet10:
//!
//! 2                3-----6-----2                 2
//! |`\              |           |               ,/|`\
//! 5  `4            7     8     5             ,6  |  `5
//! |    `\          |           |           ,/    8    `\
//! 0--3---1         0-----4-----1          0-----4-'.-----1
//!                                          `\.   |   ,9
//!                                             `7. |,/
//!                                                `3
//! ```

use vtkio::model::CellType;

use crate::database::{ElementType, MeshFormat};
use crate::error::{MeshError, MeshResult};

// Longest element (Hex27) fits in the identity table.
const IDENTITY: [usize; 27] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
    25, 26,
];

// VTK node i is canonical slot VTK_*[i]. Only the kinds whose mid-edge or
// mid-face numbering differs from Gmsh need a table.
const VTK_TET10: [usize; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 9, 8];
const VTK_PYR13: [usize; 13] = [0, 1, 2, 3, 4, 5, 8, 10, 6, 7, 9, 11, 12];
const VTK_PRISM15: [usize; 15] = [0, 1, 2, 3, 4, 5, 6, 9, 7, 12, 14, 13, 8, 10, 11];
const VTK_PRISM18: [usize; 18] = [0, 1, 2, 3, 4, 5, 6, 9, 7, 12, 14, 13, 8, 10, 11, 15, 17, 16];
const VTK_HEX20: [usize; 20] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 11, 13, 9, 16, 18, 19, 17, 10, 12, 14, 15,
];
const VTK_HEX27: [usize; 27] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 11, 13, 9, 16, 18, 19, 17, 10, 12, 14, 15, 22, 23, 21, 24, 20,
    25, 26,
];

/// STL facets have no type code of their own; triangles are written as `0`.
pub const STL_FACET_CODE: u32 = 0;

impl ElementType {
    /// Fixed number of nodes of this kind
    pub fn nodes_per_element(&self) -> MeshResult<usize> {
        let count = match self {
            ElementType::Unsupported => {
                return Err(MeshError::format(
                    "Unsupported element has no fixed node count",
                ))
            }
            ElementType::Point1 => 1,
            ElementType::Line2 => 2,
            ElementType::Line3 => 3,
            ElementType::Tri3 => 3,
            ElementType::Tri6 => 6,
            ElementType::Quad4 => 4,
            ElementType::Quad8 => 8,
            ElementType::Quad9 => 9,
            ElementType::Tet4 => 4,
            ElementType::Tet10 => 10,
            ElementType::Pyr5 => 5,
            ElementType::Pyr13 => 13,
            ElementType::Pyr14 => 14,
            ElementType::Prism6 => 6,
            ElementType::Prism15 => 15,
            ElementType::Prism18 => 18,
            ElementType::Hex8 => 8,
            ElementType::Hex20 => 20,
            ElementType::Hex27 => 27,
        };
        Ok(count)
    }

    /// Registry's own reference order, i.e. the identity of matching length
    pub fn canonical_permutation(&self) -> MeshResult<&'static [usize]> {
        Ok(&IDENTITY[..self.nodes_per_element()?])
    }

    pub fn eltype_vtk(&self) -> MeshResult<CellType> { // converts element type to the VTK cell type
        let cell_type = match self {
            ElementType::Point1 => CellType::Vertex,
            ElementType::Line2 => CellType::Line,
            ElementType::Line3 => CellType::QuadraticEdge,
            ElementType::Tri3 => CellType::Triangle,
            ElementType::Tri6 => CellType::QuadraticTriangle,
            ElementType::Quad4 => CellType::Quad,
            ElementType::Quad8 => CellType::QuadraticQuad,
            ElementType::Quad9 => CellType::BiquadraticQuad,
            ElementType::Tet4 => CellType::Tetra,
            ElementType::Tet10 => CellType::QuadraticTetra,
            ElementType::Pyr5 => CellType::Pyramid,
            ElementType::Pyr13 => CellType::QuadraticPyramid,
            ElementType::Prism6 => CellType::Wedge,
            ElementType::Prism15 => CellType::QuadraticWedge,
            ElementType::Prism18 => CellType::BiquadraticQuadraticWedge,
            ElementType::Hex8 => CellType::Hexahedron,
            ElementType::Hex20 => CellType::QuadraticHexahedron,
            ElementType::Hex27 => CellType::TriquadraticHexahedron,
            // VTK has no 14-node pyramid
            ElementType::Pyr14 | ElementType::Unsupported => {
                return Err(MeshError::unsupported(*self, MeshFormat::Vtk))
            }
        };
        Ok(cell_type)
    }

    pub fn eltype_gmsh(&self) -> MeshResult<u32> { // converts element type to the Gmsh element type number
        let code = match self {
            ElementType::Line2 => 1,
            ElementType::Tri3 => 2,
            ElementType::Quad4 => 3,
            ElementType::Tet4 => 4,
            ElementType::Hex8 => 5,
            ElementType::Prism6 => 6,
            ElementType::Pyr5 => 7,
            ElementType::Line3 => 8,
            ElementType::Tri6 => 9,
            ElementType::Quad9 => 10,
            ElementType::Tet10 => 11,
            ElementType::Hex27 => 12,
            ElementType::Prism18 => 13,
            ElementType::Pyr14 => 14,
            ElementType::Point1 => 15,
            ElementType::Quad8 => 16,
            ElementType::Hex20 => 17,
            ElementType::Prism15 => 18,
            ElementType::Pyr13 => 19,
            ElementType::Unsupported => {
                return Err(MeshError::unsupported(*self, MeshFormat::Gmsh22))
            }
        };
        Ok(code)
    }
}

/// Node permutation between canonical order and `format`'s order for `element_type`
pub fn permutation(element_type: ElementType, format: MeshFormat) -> MeshResult<&'static [usize]> {
    match format {
        MeshFormat::Gmsh22 => element_type.canonical_permutation(),
        MeshFormat::Stl => match element_type {
            ElementType::Tri3 => element_type.canonical_permutation(),
            _ => Err(MeshError::unsupported(element_type, format)),
        },
        MeshFormat::Vtk | MeshFormat::Vtu => {
            element_type.eltype_vtk()?; // rejects kinds VTK cannot hold
            let table: &'static [usize] = match element_type {
                ElementType::Tet10 => &VTK_TET10,
                ElementType::Pyr13 => &VTK_PYR13,
                ElementType::Prism15 => &VTK_PRISM15,
                ElementType::Prism18 => &VTK_PRISM18,
                ElementType::Hex20 => &VTK_HEX20,
                ElementType::Hex27 => &VTK_HEX27,
                _ => element_type.canonical_permutation()?,
            };
            Ok(table)
        }
    }
}

/// The format's own numeric identifier for `element_type`
pub fn format_type_code(element_type: ElementType, format: MeshFormat) -> MeshResult<u32> {
    match format {
        MeshFormat::Vtk | MeshFormat::Vtu => element_type
            .eltype_vtk()
            .map(|cell_type| cell_type as u32)
            .map_err(|_| MeshError::unsupported(element_type, format)),
        MeshFormat::Gmsh22 => element_type.eltype_gmsh(),
        MeshFormat::Stl => match element_type {
            ElementType::Tri3 => Ok(STL_FACET_CODE),
            _ => Err(MeshError::unsupported(element_type, format)),
        },
    }
}

/// Reverse lookup used by importers; unknown codes become `Unsupported`
pub fn element_type_from_code(format: MeshFormat, code: u32) -> ElementType {
    ElementType::ALL
        .iter()
        .copied()
        .find(|&element_type| {
            format_type_code(element_type, format).map_or(false, |known| known == code)
        })
        .unwrap_or(ElementType::Unsupported)
}

/// Whether `element_type` can be written to `format` at all
pub fn supports(element_type: ElementType, format: MeshFormat) -> bool {
    format_type_code(element_type, format).is_ok()
}

/// Rewrites canonical node ids into `format` order
pub fn to_format_order(
    element_type: ElementType,
    format: MeshFormat,
    node_ids: &[usize],
) -> MeshResult<Vec<usize>> {
    let table = permutation(element_type, format)?;
    if node_ids.len() != table.len() {
        return Err(MeshError::format(format!(
            "{:?} needs {} nodes, got {}",
            element_type,
            table.len(),
            node_ids.len()
        )));
    }
    Ok(table.iter().map(|&slot| node_ids[slot]).collect())
}

/// Rewrites node ids read in `format` order into canonical order
pub fn from_format_order(
    element_type: ElementType,
    format: MeshFormat,
    foreign_ids: &[usize],
) -> MeshResult<Vec<usize>> {
    let table = permutation(element_type, format)?;
    if foreign_ids.len() != table.len() {
        return Err(MeshError::format(format!(
            "{:?} needs {} nodes, got {}",
            element_type,
            table.len(),
            foreign_ids.len()
        )));
    }
    let mut canonical = vec![0; table.len()];
    for (foreign, &slot) in foreign_ids.iter().zip(table) {
        canonical[slot] = *foreign;
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMATS: [MeshFormat; 4] = [
        MeshFormat::Stl,
        MeshFormat::Vtk,
        MeshFormat::Vtu,
        MeshFormat::Gmsh22,
    ];

    #[test]
    fn test_every_permutation_is_a_bijection() {
        for element_type in ElementType::ALL {
            let n = element_type.nodes_per_element().unwrap();
            for format in FORMATS {
                let Ok(table) = permutation(element_type, format) else {
                    continue;
                };
                assert_eq!(table.len(), n, "{:?} in {:?}", element_type, format);
                let mut seen = vec![false; n];
                for &slot in table {
                    assert!(slot < n, "{:?} in {:?}: slot {} out of range", element_type, format, slot);
                    assert!(!seen[slot], "{:?} in {:?}: slot {} repeated", element_type, format, slot);
                    seen[slot] = true;
                }
            }
        }
    }

    #[test]
    fn test_canonical_permutation_is_identity() {
        for element_type in ElementType::ALL {
            let table = element_type.canonical_permutation().unwrap();
            assert!(table.iter().enumerate().all(|(i, &slot)| i == slot));
        }
    }

    #[test]
    fn test_gmsh_order_is_canonical() {
        for element_type in ElementType::ALL {
            assert_eq!(
                permutation(element_type, MeshFormat::Gmsh22).unwrap(),
                element_type.canonical_permutation().unwrap()
            );
        }
    }

    #[test]
    fn test_vtk_codes_match_cell_types() {
        assert_eq!(format_type_code(ElementType::Point1, MeshFormat::Vtu).unwrap(), 1);
        assert_eq!(format_type_code(ElementType::Tri3, MeshFormat::Vtu).unwrap(), 5);
        assert_eq!(format_type_code(ElementType::Quad4, MeshFormat::Vtk).unwrap(), 9);
        assert_eq!(format_type_code(ElementType::Tet4, MeshFormat::Vtk).unwrap(), 10);
        assert_eq!(format_type_code(ElementType::Hex8, MeshFormat::Vtk).unwrap(), 12);
        assert_eq!(format_type_code(ElementType::Prism6, MeshFormat::Vtk).unwrap(), 13);
        assert_eq!(format_type_code(ElementType::Pyr5, MeshFormat::Vtk).unwrap(), 14);
        assert_eq!(format_type_code(ElementType::Tet10, MeshFormat::Vtk).unwrap(), 24);
        assert_eq!(format_type_code(ElementType::Hex27, MeshFormat::Vtk).unwrap(), 29);
        assert_eq!(format_type_code(ElementType::Prism18, MeshFormat::Vtk).unwrap(), 32);
    }

    #[test]
    fn test_gmsh_codes() {
        assert_eq!(format_type_code(ElementType::Line2, MeshFormat::Gmsh22).unwrap(), 1);
        assert_eq!(format_type_code(ElementType::Point1, MeshFormat::Gmsh22).unwrap(), 15);
        assert_eq!(format_type_code(ElementType::Pyr13, MeshFormat::Gmsh22).unwrap(), 19);
    }

    #[test]
    fn test_codes_are_unique_per_format() {
        for format in FORMATS {
            for element_type in ElementType::ALL {
                if let Ok(code) = format_type_code(element_type, format) {
                    assert_eq!(element_type_from_code(format, code), element_type);
                }
            }
        }
    }

    #[test]
    fn test_unknown_codes_map_to_unsupported() {
        assert_eq!(element_type_from_code(MeshFormat::Vtk, 42), ElementType::Unsupported);
        assert_eq!(element_type_from_code(MeshFormat::Gmsh22, 93), ElementType::Unsupported);
    }

    #[test]
    fn test_unsupported_queries_are_errors() {
        assert!(ElementType::Unsupported.nodes_per_element().is_err());
        for format in FORMATS {
            assert!(format_type_code(ElementType::Unsupported, format).is_err());
            assert!(permutation(ElementType::Unsupported, format).is_err());
        }
        assert!(matches!(
            format_type_code(ElementType::Pyr14, MeshFormat::Vtu),
            Err(MeshError::UnsupportedElement { .. })
        ));
        assert!(!supports(ElementType::Quad4, MeshFormat::Stl));
        assert!(supports(ElementType::Tri3, MeshFormat::Stl));
    }

    #[test]
    fn test_tet10_swaps_last_two_edges_for_vtk() {
        let canonical: Vec<usize> = (100..110).collect();
        let vtk = to_format_order(ElementType::Tet10, MeshFormat::Vtk, &canonical).unwrap();
        assert_eq!(vtk[8], 109);
        assert_eq!(vtk[9], 108);
        let back = from_format_order(ElementType::Tet10, MeshFormat::Vtk, &vtk).unwrap();
        assert_eq!(back, canonical);
    }

    #[test]
    fn test_hex27_face_centres_for_vtk() {
        let canonical: Vec<usize> = (0..27).collect();
        let vtk = to_format_order(ElementType::Hex27, MeshFormat::Vtu, &canonical).unwrap();
        // VTK face order: -x, +x, -y, +y, -z, +z
        assert_eq!(&vtk[20..], &[22, 23, 21, 24, 20, 25, 26]);
    }

    #[test]
    fn test_reordering_round_trips_for_every_kind() {
        for element_type in ElementType::ALL {
            let n = element_type.nodes_per_element().unwrap();
            let canonical: Vec<usize> = (0..n).map(|i| 10 * i + 3).collect();
            for format in FORMATS {
                if !supports(element_type, format) {
                    continue;
                }
                let foreign = to_format_order(element_type, format, &canonical).unwrap();
                let back = from_format_order(element_type, format, &foreign).unwrap();
                assert_eq!(back, canonical, "{:?} in {:?}", element_type, format);
            }
        }
    }

    #[test]
    fn test_reordering_rejects_wrong_arity() {
        assert!(to_format_order(ElementType::Quad4, MeshFormat::Vtk, &[0, 1, 2]).is_err());
    }
}
