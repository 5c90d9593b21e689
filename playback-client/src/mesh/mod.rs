mod mesh_change;
mod screen_share_mesh;

pub use mesh_change::*;
pub use screen_share_mesh::*;
