use std::collections::BTreeMap;  // Ordered per-type counts for the summary
use std::path::PathBuf;
use std::process;               // process::exit() for terminating with error codes

use clap::Parser;

use meshconv::{export_mesh, import_mesh, ElementType, FileEncoding, Mesh};

/// Convert a mesh between STL, legacy VTK, VTU and Gmsh 2.2.
/// Formats are inferred from the file extensions (.stl, .vtk, .vtu, .msh).
#[derive(Parser, Debug)]
#[command(name = "meshconv", version)]
struct Args {
    /// Mesh file to read (.stl, .vtk or .msh)
    input: PathBuf,

    /// Mesh file to write (.stl, .vtk, .vtu or .msh)
    output: PathBuf,

    /// Write text instead of binary where the format offers both
    #[arg(long)]
    ascii: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let encoding = if args.ascii { FileEncoding::Ascii } else { FileEncoding::Binary };

    let mesh = match import_mesh(&args.input) {
        Ok(mesh) => mesh,
        Err(e) => {
            eprintln!("Error reading {}: {}", args.input.display(), e);
            process::exit(1);
        }
    };

    print_mesh_summary(&mesh);

    if let Err(e) = export_mesh(&mesh, &args.output, encoding) {
        eprintln!("Error writing {}: {}", args.output.display(), e);
        process::exit(1);
    }

    println!("Wrote {}", args.output.display());
}

/// Prints node count and the number of elements of each type
fn print_mesh_summary(mesh: &Mesh) {
    println!("Nodes: {}", mesh.num_nodes());
    println!("Elements: {}", mesh.num_elements());

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for element in &mesh.elements {
        *counts.entry(format!("{:?}", element.element_type)).or_default() += 1;
    }
    for (name, count) in &counts {
        println!("  {:<12} {}", name, count);
    }

    let unsupported = mesh
        .elements
        .iter()
        .filter(|element| element.element_type == ElementType::Unsupported)
        .count();
    if unsupported > 0 {
        eprintln!("Warning: {} element(s) have no known type and cannot be exported", unsupported);
    }
}
