//! Rejected exports and malformed inputs.

use std::fs;

use tempfile::{tempdir, NamedTempFile};

use meshconv::*;

fn triangle_and_unknown() -> Mesh {
    let mut mesh = Mesh::new();
    for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        mesh.add_node(p);
    }
    mesh.add_element(Element::new(ElementType::Tri3, vec![0, 1, 2]));
    mesh.add_element(Element::new(ElementType::Unsupported, vec![2, 1]));
    mesh
}

#[test]
fn unsupported_element_fails_every_export_without_a_file() {
    let dir = tempdir().unwrap();
    let mesh = triangle_and_unknown();
    for extension in ["stl", "vtk", "vtu", "msh"] {
        for encoding in [FileEncoding::Ascii, FileEncoding::Binary] {
            let path = dir.path().join(format!("rejected_{:?}.{}", encoding, extension));
            let result = export_mesh(&mesh, &path, encoding);
            assert!(
                matches!(result, Err(MeshError::UnsupportedElement { element_type: ElementType::Unsupported, .. })),
                "{} accepted an unsupported element",
                extension
            );
            assert!(!path.exists());
        }
    }
}

#[test]
fn out_of_range_node_fails_export() {
    let dir = tempdir().unwrap();
    let mut mesh = Mesh::new();
    mesh.add_node([0.0; 3]);
    mesh.add_element(Element::new(ElementType::Line2, vec![0, 1]));
    let path = dir.path().join("dangling.msh");
    assert!(matches!(export_gmsh_v22(&mesh, &path, FileEncoding::Ascii), Err(MeshError::Format(_))));
    assert!(!path.exists());
}

#[test]
fn corrupted_magic_is_a_format_error() {
    let dir = tempdir().unwrap();
    let mut mesh = Mesh::new();
    mesh.add_node([0.0; 3]);
    mesh.add_node([1.0, 0.0, 0.0]);
    mesh.add_element(Element::new(ElementType::Line2, vec![0, 1]));

    let vtk = dir.path().join("broken.vtk");
    export_vtk(&mesh, &vtk, FileEncoding::Ascii).unwrap();
    let text = fs::read_to_string(&vtk).unwrap().replacen("# vtk", "# vtx", 1);
    fs::write(&vtk, text).unwrap();
    assert!(matches!(import_vtk(&vtk), Err(MeshError::Format(_))));

    let msh = dir.path().join("broken.msh");
    export_gmsh_v22(&mesh, &msh, FileEncoding::Binary).unwrap();
    let mut bytes = fs::read(&msh).unwrap();
    bytes[1] = b'X';
    fs::write(&msh, bytes).unwrap();
    assert!(matches!(import_gmsh_v22(&msh), Err(MeshError::Format(_))));
}

#[test]
fn importers_reject_out_of_range_node_ids() {
    let vtk = NamedTempFile::new().unwrap();
    fs::write(
        vtk.path(),
        "# vtk DataFile Version 3.0\nbad\nASCII\nDATASET UNSTRUCTURED_GRID\n\
         POINTS 2 double\n0 0 0\n1 0 0\nCELLS 1 3\n2 0 2\nCELL_TYPES 1\n3\n",
    )
    .unwrap();
    assert!(matches!(import_vtk(vtk.path()), Err(MeshError::Format(_))));

    let msh = NamedTempFile::new().unwrap();
    fs::write(
        msh.path(),
        "$MeshFormat\n2.2 0 8\n$EndMeshFormat\n$Nodes\n2\n1 0 0 0\n2 1 0 0\n$EndNodes\n\
         $Elements\n1\n1 1 0 1 3\n$EndElements\n",
    )
    .unwrap();
    assert!(matches!(import_gmsh_v22(msh.path()), Err(MeshError::Format(_))));
}

#[test]
fn unknown_codes_are_kept_as_unsupported() {
    let vtk = NamedTempFile::new().unwrap();
    fs::write(
        vtk.path(),
        "# vtk DataFile Version 3.0\npoly\nASCII\nDATASET UNSTRUCTURED_GRID\n\
         POINTS 3 double\n0 0 0\n1 0 0\n0 1 0\nCELLS 2 8\n3 0 1 2\n3 2 1 0\nCELL_TYPES 2\n7\n5\n",
    )
    .unwrap();
    let mesh = import_vtk(vtk.path()).unwrap();
    assert_eq!(mesh.elements[0].element_type, ElementType::Unsupported);
    assert_eq!(mesh.elements[0].node_ids, vec![0, 1, 2]);
    assert_eq!(mesh.elements[1].element_type, ElementType::Tri3);
    assert!(mesh.validate().is_ok());
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mesh.obj");
    assert!(matches!(export_mesh(&Mesh::new(), &path, FileEncoding::Ascii), Err(MeshError::Format(_))));
    assert!(matches!(import_mesh(&path), Err(MeshError::Format(_))));
    assert!(import_mesh(dir.path().join("missing.msh")).is_err());
}
