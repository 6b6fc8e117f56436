use std::collections::HashMap;
use std::fs;                                    // Whole-file reads (STL binary detection needs the file size)
use std::path::Path;

use log::{debug, info};

use crate::database::*;                         // Import mesh data structures
use crate::error::{MeshError, MeshResult};
use crate::parser::scanner::Scanner;
use crate::writer::binary_block::{unpack, ByteOrder};

const BINARY_HEADER_LEN: usize = 80;            // Free-form header of binary STL
const FACET_RECORD_LEN: usize = 50;             // normal + 3 vertices (12 x f32) + u16 attribute

pub struct StlParser;  // Reader for ASCII and binary STL surfaces

impl StlParser {
    pub fn parse_file(path: impl AsRef<Path>) -> MeshResult<Mesh> {
        let path = path.as_ref();
        debug!("reading STL file {}", path.display());
        let bytes = fs::read(path)?;
        let mesh = Self::parse_bytes(&bytes)?;
        info!(
            "imported {} nodes and {} triangles from {}",
            mesh.nodes.len(),
            mesh.elements.len(),
            path.display()
        );
        Ok(mesh)
    }

    pub fn parse_bytes(bytes: &[u8]) -> MeshResult<Mesh> {
        if Self::is_binary(bytes) {
            Self::parse_binary(bytes)
        } else if bytes.starts_with(b"solid") {
            Self::parse_ascii(bytes)
        } else {
            Err(MeshError::format("Not an STL file: no 'solid' keyword and size does not match a binary STL"))
        }
    }

    // Binary files may also start with "solid", so the size check comes first
    fn is_binary(bytes: &[u8]) -> bool {
        if bytes.len() < BINARY_HEADER_LEN + 4 {
            return false;
        }
        let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
        count
            .checked_mul(FACET_RECORD_LEN)
            .and_then(|facets| facets.checked_add(BINARY_HEADER_LEN + 4))
            == Some(bytes.len())
    }

    fn parse_binary(bytes: &[u8]) -> MeshResult<Mesh> {
        let mut builder = SurfaceBuilder::default();
        for record in bytes[BINARY_HEADER_LEN + 4..].chunks_exact(FACET_RECORD_LEN) {
            // skip the stored normal (first 12 bytes) and the attribute (last 2)
            let values: Vec<f32> = unpack(&record[12..48], ByteOrder::LittleEndian)?;
            let corners = [
                [values[0] as f64, values[1] as f64, values[2] as f64],
                [values[3] as f64, values[4] as f64, values[5] as f64],
                [values[6] as f64, values[7] as f64, values[8] as f64],
            ];
            builder.add_facet(corners);
        }
        Ok(builder.mesh)
    }

    fn parse_ascii(bytes: &[u8]) -> MeshResult<Mesh> {
        let mut builder = SurfaceBuilder::default();
        let mut scanner = Scanner::new(bytes);
        scanner.next_line()?; // "solid <name>"

        while let Some(keyword) = scanner.next_token()? {
            match keyword {
                "facet" => {
                    Self::expect_keyword(&mut scanner, "normal")?;
                    for _ in 0..3 {
                        scanner.parse::<f64>("facet normal")?; // recomputed on export
                    }
                    Self::expect_keyword(&mut scanner, "outer")?;
                    Self::expect_keyword(&mut scanner, "loop")?;
                    let mut corners = [[0.0; 3]; 3];
                    for corner in corners.iter_mut() {
                        Self::expect_keyword(&mut scanner, "vertex")?;
                        for value in corner.iter_mut() {
                            *value = scanner.parse::<f64>("vertex coordinate")?;
                        }
                    }
                    Self::expect_keyword(&mut scanner, "endloop")?;
                    Self::expect_keyword(&mut scanner, "endfacet")?;
                    builder.add_facet(corners);
                }
                // a file may hold several solids back to back
                "endsolid" | "solid" => scanner.finish_line(),
                other => {
                    return Err(MeshError::format(format!(
                        "Unexpected token '{}' in ASCII STL",
                        other
                    )))
                }
            }
        }
        Ok(builder.mesh)
    }

    fn expect_keyword(scanner: &mut Scanner<'_>, keyword: &str) -> MeshResult<()> {
        let token = scanner.expect_token(keyword)?;
        if token != keyword {
            return Err(MeshError::format(format!(
                "Expected '{}' in ASCII STL, found '{}'",
                keyword, token
            )));
        }
        Ok(())
    }
}

// STL repeats coordinates per facet; identical corners collapse into one node
// so the mesh gets shared connectivity. Node ids follow first appearance.
#[derive(Default)]
struct SurfaceBuilder {
    mesh: Mesh,
    node_lookup: HashMap<[u64; 3], usize>,
}

impl SurfaceBuilder {
    fn node_id(&mut self, point: [f64; 3]) -> usize {
        let key = [point[0].to_bits(), point[1].to_bits(), point[2].to_bits()];
        let mesh = &mut self.mesh;
        *self.node_lookup.entry(key).or_insert_with(|| mesh.add_node(point))
    }

    fn add_facet(&mut self, corners: [[f64; 3]; 3]) {
        let node_ids = corners.iter().map(|&corner| self.node_id(corner)).collect();
        self.mesh.add_element(Element::new(ElementType::Tri3, node_ids));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FACETS: &str = "solid square
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 1 1 0
    endloop
  endfacet
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 1 0
      vertex 0 1 0
    endloop
  endfacet
endsolid square
";

    #[test]
    fn test_ascii_shares_coincident_vertices() {
        let mesh = StlParser::parse_bytes(TWO_FACETS.as_bytes()).unwrap();
        assert_eq!(mesh.nodes.len(), 4);
        assert_eq!(mesh.elements.len(), 2);
        assert_eq!(mesh.elements[0].node_ids, vec![0, 1, 2]);
        assert_eq!(mesh.elements[1].node_ids, vec![0, 2, 3]);
        assert!(mesh.elements.iter().all(|e| e.element_type == ElementType::Tri3 && e.tags.is_empty()));
    }

    #[test]
    fn test_binary_with_solid_header_is_detected_by_size() {
        let mut bytes = b"solid but actually binary".to_vec();
        bytes.resize(80, b' ');
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for value in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());

        let mesh = StlParser::parse_bytes(&bytes).unwrap();
        assert_eq!(mesh.nodes, vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]]);
        assert_eq!(mesh.elements.len(), 1);
    }

    #[test]
    fn test_corrupted_magic_is_format_error() {
        assert!(matches!(
            StlParser::parse_bytes(b"sloid nope\nendsolid\n"),
            Err(MeshError::Format(_))
        ));
        assert!(StlParser::parse_bytes(b"").is_err());
    }

    #[test]
    fn test_truncated_ascii_facet_is_error() {
        let truncated = "solid t\n facet normal 0 0 1\n outer loop\n vertex 0 0 0\n";
        assert!(StlParser::parse_bytes(truncated.as_bytes()).is_err());
    }

    #[test]
    fn test_invalid_text_between_facets_is_rejected() {
        let second = TWO_FACETS.rfind("  facet").unwrap();
        let mut bytes = TWO_FACETS.as_bytes().to_vec();
        bytes.insert(second, 0xff);
        assert!(matches!(StlParser::parse_bytes(&bytes), Err(MeshError::Format(_))));
    }
}
