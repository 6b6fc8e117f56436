use std::path::Path;

use crate::error::{MeshError, MeshResult};

/// Element kinds known to the interchange layer.
///
/// Node ids of every element are stored in the Gmsh numbering convention for
/// its kind, whichever file the element came from or goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {              // Closed set of supported element kinds
    Unsupported,                    // Sentinel for foreign types with no mapping
    Point1,                         // Single vertex
    Line2, Line3,                   // Edge elements
    Tri3, Tri6,                     // Triangles
    Quad4, Quad8, Quad9,            // Quadrilaterals (serendipity and Lagrange)
    Tet4, Tet10,                    // Tetrahedra
    Pyr5, Pyr13, Pyr14,             // Pyramids
    Prism6, Prism15, Prism18,       // Prisms (wedges)
    Hex8, Hex20, Hex27,             // Hexahedra
}

impl ElementType {
    /// Every supported kind, in declaration order (excludes `Unsupported`)
    pub const ALL: [ElementType; 19] = [
        ElementType::Point1,
        ElementType::Line2,
        ElementType::Line3,
        ElementType::Tri3,
        ElementType::Tri6,
        ElementType::Quad4,
        ElementType::Quad8,
        ElementType::Quad9,
        ElementType::Tet4,
        ElementType::Tet10,
        ElementType::Pyr5,
        ElementType::Pyr13,
        ElementType::Pyr14,
        ElementType::Prism6,
        ElementType::Prism15,
        ElementType::Prism18,
        ElementType::Hex8,
        ElementType::Hex20,
        ElementType::Hex27,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {                // Defines a structure to represent a mesh element
    pub element_type: ElementType,  // Kind of the element
    pub tags: Vec<i32>,             // Format-defined payload (physical group, entity id, ...) passed through verbatim
    pub node_ids: Vec<usize>,       // Node indices in canonical order for this kind
}

impl Element {
    pub fn new(element_type: ElementType, node_ids: Vec<usize>) -> Self {
        Self { element_type, tags: Vec::new(), node_ids }
    }

    pub fn with_tags(mut self, tags: Vec<i32>) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {                   // Shared in-memory representation produced by importers and consumed by exporters
    pub nodes: Vec<[f64; 3]>,       // Node coordinates, index is the canonical node id
    pub elements: Vec<Element>,     // Elements in file order
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node and returns its id
    pub fn add_node(&mut self, coordinates: [f64; 3]) -> usize {
        self.nodes.push(coordinates);
        self.nodes.len() - 1
    }

    pub fn add_element(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Checks that every node id referenced by an element points into `nodes`
    /// and that supported elements carry exactly their fixed number of nodes.
    pub fn validate(&self) -> MeshResult<()> {
        for (index, element) in self.elements.iter().enumerate() {
            if element.element_type != ElementType::Unsupported {
                let expected = element.element_type.nodes_per_element()?;
                if element.node_ids.len() != expected {
                    return Err(MeshError::format(format!(
                        "Element {} ({:?}) has {} nodes, expected {}",
                        index,
                        element.element_type,
                        element.node_ids.len(),
                        expected
                    )));
                }
            }
            if let Some(&id) = element.node_ids.iter().find(|&&id| id >= self.nodes.len()) {
                return Err(MeshError::format(format!(
                    "Element {} references node {} but the mesh has {} nodes",
                    index,
                    id,
                    self.nodes.len()
                )));
            }
        }
        Ok(())
    }
}

/// Text or binary flavour of formats that offer both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileEncoding {
    Ascii,
    #[default]
    Binary,
}

/// File formats handled by the interchange layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    Stl,        // Triangulated surface
    Vtk,        // Legacy VTK unstructured grid
    Vtu,        // XML VTK unstructured grid
    Gmsh22,     // Gmsh MSH 2.2
}

impl MeshFormat {
    /// Infers the format from a file extension (case-insensitive)
    pub fn from_path(path: impl AsRef<Path>) -> Option<MeshFormat> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "stl" => Some(MeshFormat::Stl),
            "vtk" => Some(MeshFormat::Vtk),
            "vtu" => Some(MeshFormat::Vtu),
            "msh" => Some(MeshFormat::Gmsh22),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Mesh {
        let mut mesh = Mesh::new();
        let a = mesh.add_node([0.0, 0.0, 0.0]);
        let b = mesh.add_node([1.0, 0.0, 0.0]);
        let c = mesh.add_node([0.0, 1.0, 0.0]);
        mesh.add_element(Element::new(ElementType::Tri3, vec![a, b, c]));
        mesh
    }

    #[test]
    fn test_builder_assigns_sequential_ids() {
        let mesh = unit_triangle();
        assert_eq!(mesh.num_nodes(), 3);
        assert_eq!(mesh.num_elements(), 1);
        assert_eq!(mesh.elements[0].node_ids, vec![0, 1, 2]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_ids() {
        let mut mesh = unit_triangle();
        mesh.add_element(Element::new(ElementType::Line2, vec![1, 3]));
        assert!(matches!(mesh.validate(), Err(MeshError::Format(_))));
    }

    #[test]
    fn test_validate_rejects_wrong_arity() {
        let mut mesh = unit_triangle();
        mesh.add_element(Element::new(ElementType::Quad4, vec![0, 1, 2]));
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_unsupported_with_any_arity() {
        let mut mesh = unit_triangle();
        mesh.add_element(Element::new(ElementType::Unsupported, vec![0, 1, 2, 0, 1]));
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(MeshFormat::from_path("part.STL"), Some(MeshFormat::Stl));
        assert_eq!(MeshFormat::from_path("out/grid.vtu"), Some(MeshFormat::Vtu));
        assert_eq!(MeshFormat::from_path("a.vtk"), Some(MeshFormat::Vtk));
        assert_eq!(MeshFormat::from_path("b.msh"), Some(MeshFormat::Gmsh22));
        assert_eq!(MeshFormat::from_path("c.inp"), None);
        assert_eq!(MeshFormat::from_path("no_extension"), None);
    }
}
