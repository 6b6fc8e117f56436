use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use crate::database::*;
use crate::error::{MeshError, MeshResult};
use crate::node_ordering::{element_type_from_code, from_format_order};
use crate::parser::scanner::Scanner;
use crate::writer::binary_block::{ByteOrder, Pack};

pub struct GmshParser;  // Reader for Gmsh MSH 2.2 files, ASCII and binary

/// Parse state shared by the section readers
struct GmshReader<'a> {
    scanner: Scanner<'a>,
    encoding: FileEncoding,
    order: ByteOrder,                       // Byte order of binary payloads, from the endianness marker
    node_index: HashMap<usize, usize>,      // Gmsh node label -> dense node id
}

impl GmshParser {
    pub fn parse_file(path: impl AsRef<Path>) -> MeshResult<Mesh> {
        let path = path.as_ref();
        debug!("reading Gmsh file {}", path.display());
        let bytes = fs::read(path)?;
        let mesh = Self::parse_bytes(&bytes)?;
        info!(
            "imported {} nodes and {} elements from {}",
            mesh.nodes.len(),
            mesh.elements.len(),
            path.display()
        );
        Ok(mesh)
    }

    pub fn parse_bytes(bytes: &[u8]) -> MeshResult<Mesh> {
        let mut reader = GmshReader {
            scanner: Scanner::new(bytes),
            encoding: FileEncoding::Ascii,
            order: ByteOrder::native(),
            node_index: HashMap::new(),
        };

        match reader.scanner.next_token()? {
            Some("$MeshFormat") => reader.parse_mesh_format()?,
            _ => return Err(MeshError::format("File does not start with $MeshFormat")),
        }

        let mut mesh = Mesh::new();
        while let Some(section) = reader.scanner.next_token()? {
            match section {
                "$Nodes" => mesh.nodes = reader.parse_nodes()?,
                "$Elements" => mesh.elements = reader.parse_elements()?,
                other if other.starts_with('$') && !other.starts_with("$End") => {
                    debug!("skipping Gmsh section {}", other);
                    reader.skip_section(&other[1..])?;
                }
                other => {
                    return Err(MeshError::format(format!(
                        "Unexpected '{}' between Gmsh sections",
                        other
                    )))
                }
            }
        }
        Ok(mesh)
    }
}

impl<'a> GmshReader<'a> {
    fn parse_mesh_format(&mut self) -> MeshResult<()> {
        let version = self.scanner.expect_token("mesh format version")?;
        if !version.starts_with("2.") {
            return Err(MeshError::format(format!(
                "Gmsh format version {} is not supported, expected 2.2",
                version
            )));
        }
        self.encoding = match self.scanner.parse::<u32>("file type")? {
            0 => FileEncoding::Ascii,
            1 => FileEncoding::Binary,
            other => return Err(MeshError::format(format!("Unknown Gmsh file type {}", other))),
        };
        let data_size = self.scanner.parse::<usize>("data size")?;
        if data_size != std::mem::size_of::<f64>() {
            return Err(MeshError::format(format!(
                "Gmsh data size {} is not supported, expected 8",
                data_size
            )));
        }

        if self.encoding == FileEncoding::Binary {
            // The integer 1 written in the writer's byte order
            self.scanner.finish_line();
            let marker = self.scanner.take(4, "endianness marker")?;
            self.order = [ByteOrder::LittleEndian, ByteOrder::BigEndian]
                .into_iter()
                .find(|&order| i32::unpack_from(marker, order) == 1)
                .ok_or_else(|| MeshError::format("Invalid endianness marker in binary Gmsh file"))?;
        }
        self.expect_end("MeshFormat")
    }

    fn expect_end(&mut self, section: &str) -> MeshResult<()> {
        let token = self.scanner.expect_token(section)?;
        if token.strip_prefix("$End") != Some(section) {
            return Err(MeshError::format(format!(
                "Expected $End{}, found '{}'",
                section, token
            )));
        }
        Ok(())
    }

    // Unknown sections may hold binary payloads, so the terminator is
    // searched for in the raw bytes
    fn skip_section(&mut self, section: &str) -> MeshResult<()> {
        let terminator = format!("$End{}", section);
        if !self.scanner.skip_past(terminator.as_bytes()) {
            return Err(MeshError::format(format!(
                "Section ${} is not terminated",
                section
            )));
        }
        Ok(())
    }

    fn register_node(&mut self, label: usize, index: usize) -> MeshResult<()> {
        if self.node_index.insert(label, index).is_some() {
            return Err(MeshError::format(format!("Duplicate node label {}", label)));
        }
        Ok(())
    }

    fn parse_nodes(&mut self) -> MeshResult<Vec<[f64; 3]>> {
        let count = self.scanner.parse::<usize>("number of nodes")?;
        let mut nodes = Vec::with_capacity(self.scanner.capacity_for(count));

        match self.encoding {
            FileEncoding::Ascii => {
                for index in 0..count {
                    let label = self.scanner.parse::<usize>("node label")?;
                    let x = self.scanner.parse::<f64>("node x")?;
                    let y = self.scanner.parse::<f64>("node y")?;
                    let z = self.scanner.parse::<f64>("node z")?;
                    self.register_node(label, index)?;
                    nodes.push([x, y, z]);
                }
            }
            FileEncoding::Binary => {
                self.scanner.finish_line();
                for index in 0..count {
                    let label = self.scanner.take_values::<i32>(1, self.order, "node label")?[0];
                    let xyz = self.scanner.take_values::<f64>(3, self.order, "node coordinates")?;
                    self.register_node(usize::try_from(label)?, index)?;
                    nodes.push([xyz[0], xyz[1], xyz[2]]);
                }
            }
        }

        self.expect_end("Nodes")?;
        Ok(nodes)
    }

    fn resolve_nodes(&self, labels: &[usize], element_number: usize) -> MeshResult<Vec<usize>> {
        labels
            .iter()
            .map(|label| {
                self.node_index.get(label).copied().ok_or_else(|| {
                    MeshError::format(format!(
                        "Element {} references unknown node {}",
                        element_number, label
                    ))
                })
            })
            .collect()
    }

    fn build_element(
        &self,
        element_number: usize,
        code: u32,
        tags: Vec<i32>,
        labels: &[usize],
    ) -> MeshResult<Element> {
        let foreign_ids = self.resolve_nodes(labels, element_number)?;
        let element_type = element_type_from_code(MeshFormat::Gmsh22, code);
        let node_ids = if element_type == ElementType::Unsupported {
            warn!("element {} has Gmsh type {} with no mapping, kept as unsupported", element_number, code);
            foreign_ids
        } else {
            from_format_order(element_type, MeshFormat::Gmsh22, &foreign_ids)?
        };
        Ok(Element { element_type, tags, node_ids })
    }

    fn parse_elements(&mut self) -> MeshResult<Vec<Element>> {
        let count = self.scanner.parse::<usize>("number of elements")?;
        let elements = match self.encoding {
            FileEncoding::Ascii => self.parse_elements_ascii(count)?,
            FileEncoding::Binary => self.parse_elements_binary(count)?,
        };
        self.expect_end("Elements")?;
        Ok(elements)
    }

    // elm-number elm-type number-of-tags <tags> <node labels>
    fn parse_elements_ascii(&mut self, count: usize) -> MeshResult<Vec<Element>> {
        let mut elements = Vec::with_capacity(self.scanner.capacity_for(count));
        self.scanner.finish_line();
        for _ in 0..count {
            let line = self
                .scanner
                .next_non_empty_line()?
                .ok_or_else(|| MeshError::format("Unexpected end of element data"))?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return Err(MeshError::format(format!("Malformed element line '{}'", line)));
            }
            let number = fields[0].parse::<usize>()?;
            let code = fields[1].parse::<u32>()?;
            let num_tags = fields[2].parse::<usize>()?;
            let tag_fields = fields[3..].get(..num_tags).ok_or_else(|| {
                MeshError::format(format!("Element {} is missing tags", number))
            })?;
            let tags = tag_fields
                .iter()
                .map(|tag| tag.parse::<i32>())
                .collect::<Result<Vec<_>, _>>()?;
            let labels = fields[3 + num_tags..]
                .iter()
                .map(|label| label.parse::<usize>())
                .collect::<Result<Vec<_>, _>>()?;

            elements.push(self.build_element(number, code, tags, &labels)?);
        }
        Ok(elements)
    }

    // Blocks of [elm-type, num-elm-follow, num-tags] followed by
    // num-elm-follow records of (number, tags, node labels)
    fn parse_elements_binary(&mut self, count: usize) -> MeshResult<Vec<Element>> {
        let mut elements = Vec::with_capacity(self.scanner.capacity_for(count));
        self.scanner.finish_line();
        while elements.len() < count {
            let header = self.scanner.take_values::<i32>(3, self.order, "element block header")?;
            let code = u32::try_from(header[0])?;
            let follow = usize::try_from(header[1])?;
            let num_tags = usize::try_from(header[2])?;

            let element_type = element_type_from_code(MeshFormat::Gmsh22, code);
            if element_type == ElementType::Unsupported {
                return Err(MeshError::format(format!(
                    "Binary element block of unknown type {}: node count cannot be inferred",
                    code
                )));
            }
            let num_nodes = element_type.nodes_per_element()?;
            if follow > count - elements.len() {
                return Err(MeshError::format("Element blocks exceed the declared element count"));
            }

            for _ in 0..follow {
                let record = self.scanner.take_values::<i32>(1 + num_tags + num_nodes, self.order, "element record")?;
                let number = usize::try_from(record[0])?;
                let tags = record[1..1 + num_tags].to_vec();
                let labels = record[1 + num_tags..]
                    .iter()
                    .map(|&label| usize::try_from(label))
                    .collect::<Result<Vec<_>, _>>()?;
                elements.push(self.build_element(number, code, tags, &labels)?);
            }
        }
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_MESH: &str = "$MeshFormat
2.2 0 8
$EndMeshFormat
$PhysicalNames
1
2 7 \"surface\"
$EndPhysicalNames
$Nodes
4
10 0.0 0.0 0.0
20 1.0 0.0 0.0
30 1.0 1.0 0.0
40 0.0 1.0 0.0
$EndNodes
$Elements
3
1 1 2 5 1 10 20
2 3 2 7 2 10 20 30 40
3 21 2 7 2 10 20 30
$EndElements
";

    #[test]
    fn test_ascii_labels_and_tags() {
        let mesh = GmshParser::parse_bytes(ASCII_MESH.as_bytes()).unwrap();
        assert_eq!(mesh.nodes.len(), 4);
        assert_eq!(mesh.nodes[2], [1.0, 1.0, 0.0]);

        assert_eq!(mesh.elements[0].element_type, ElementType::Line2);
        assert_eq!(mesh.elements[0].tags, vec![5, 1]);
        assert_eq!(mesh.elements[0].node_ids, vec![0, 1]);

        assert_eq!(mesh.elements[1].element_type, ElementType::Quad4);
        assert_eq!(mesh.elements[1].node_ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_unknown_type_is_kept_in_position() {
        let mesh = GmshParser::parse_bytes(ASCII_MESH.as_bytes()).unwrap();
        assert_eq!(mesh.elements.len(), 3);
        assert_eq!(mesh.elements[2].element_type, ElementType::Unsupported);
        assert_eq!(mesh.elements[2].tags, vec![7, 2]);
        assert_eq!(mesh.elements[2].node_ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_unknown_node_label_is_rejected() {
        let text = ASCII_MESH.replace("1 1 2 5 1 10 20", "1 1 2 5 1 10 99");
        assert!(matches!(GmshParser::parse_bytes(text.as_bytes()), Err(MeshError::Format(_))));
    }

    #[test]
    fn test_corrupted_magic_is_format_error() {
        let text = ASCII_MESH.replacen("$MeshFormat", "$MeshFromat", 1);
        assert!(matches!(GmshParser::parse_bytes(text.as_bytes()), Err(MeshError::Format(_))));
    }

    #[test]
    fn test_version_four_is_rejected() {
        let text = ASCII_MESH.replacen("2.2 0 8", "4.1 0 8", 1);
        assert!(GmshParser::parse_bytes(text.as_bytes()).is_err());
    }

    #[test]
    fn test_binary_big_endian_file() {
        let order = ByteOrder::BigEndian;
        let mut bytes = b"$MeshFormat\n2.2 1 8\n".to_vec();
        bytes.extend_from_slice(&1i32.to_be_bytes());
        bytes.extend_from_slice(b"\n$EndMeshFormat\n$Nodes\n3\n");
        for (label, xyz) in [(1, [0.0f64, 0.0, 0.0]), (2, [1.0, 0.0, 0.0]), (3, [0.0, 1.0, 0.0])] {
            let mut record = (label as i32).to_be_bytes().to_vec();
            for value in xyz {
                value.pack_into(order, &mut record);
            }
            bytes.extend_from_slice(&record);
        }
        bytes.extend_from_slice(b"\n$EndNodes\n$Elements\n1\n");
        for value in [2i32, 1, 2, 1, 4, 9, 1, 2, 3] {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        bytes.extend_from_slice(b"\n$EndElements\n");

        let mesh = GmshParser::parse_bytes(&bytes).unwrap();
        assert_eq!(mesh.nodes[1], [1.0, 0.0, 0.0]);
        assert_eq!(mesh.elements.len(), 1);
        assert_eq!(mesh.elements[0].element_type, ElementType::Tri3);
        assert_eq!(mesh.elements[0].tags, vec![4, 9]);
        assert_eq!(mesh.elements[0].node_ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_invalid_text_before_a_section_is_rejected() {
        let mut bytes = ASCII_MESH.as_bytes().to_vec();
        let at = ASCII_MESH.find("$Elements").unwrap();
        bytes.insert(at, 0xff);
        assert!(matches!(GmshParser::parse_bytes(&bytes), Err(MeshError::Format(_))));
    }

    #[test]
    fn test_huge_counts_fail_without_allocating() {
        let nodes = "$MeshFormat\n2.2 0 8\n$EndMeshFormat\n$Nodes\n18446744073709551615\n1 0 0 0\n$EndNodes\n";
        assert!(GmshParser::parse_bytes(nodes.as_bytes()).is_err());

        let elements = ASCII_MESH.replace("$Elements\n3\n", "$Elements\n18446744073709551615\n");
        assert!(GmshParser::parse_bytes(elements.as_bytes()).is_err());

        let mut binary = b"$MeshFormat\n2.2 1 8\n".to_vec();
        binary.extend_from_slice(&1i32.to_ne_bytes());
        binary.extend_from_slice(b"\n$EndMeshFormat\n$Nodes\n0\n\n$EndNodes\n$Elements\n18446744073709551615\n");
        for value in [2i32, i32::MAX, 0] {
            binary.extend_from_slice(&value.to_ne_bytes());
        }
        assert!(matches!(GmshParser::parse_bytes(&binary), Err(MeshError::Format(_))));
    }

    #[test]
    fn test_binary_payload_in_unknown_section_is_skipped() {
        let mut bytes = b"$MeshFormat\n2.2 0 8\n$EndMeshFormat\n$NodeData\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0x00, 0xfe, b'\n']);
        bytes.extend_from_slice(b"$EndNodeData\n$Nodes\n1\n7 0.5 0 0\n$EndNodes\n");
        let mesh = GmshParser::parse_bytes(&bytes).unwrap();
        assert_eq!(mesh.nodes, vec![[0.5, 0.0, 0.0]]);
    }
}
