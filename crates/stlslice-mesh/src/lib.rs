#![warn(missing_docs)]

//! Triangle meshes for the stlslice workspace.
//!
//! Provides the indexed [`Mesh`] with its bounds and centroid, STL and OBJ
//! loaders, vertex welding for triangle soups, and the best-effort
//! watertightness [`repair`] run before slicing.

pub mod adjacency;
pub mod error;
pub mod io;
pub mod mesh;
pub mod repair;
pub mod weld;

pub use adjacency::MeshAdjacency;
pub use error::{MeshError, Result};
pub use io::load;
pub use mesh::{cube, unwelded, Aabb, Mesh, DEFAULT_UNITS};
pub use repair::{fill_holes, fix_normals, repair};
pub use weld::merge_vertices;
