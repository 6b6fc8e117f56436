// Importers. Each reads a whole file into memory and yields a `Mesh` whose
// element node ids are already in canonical order.

pub mod gmsh;
pub mod scanner;
pub mod stl;
pub mod vtk_legacy;
