//! Device-free input to the software city renderer.
//!
//! Holds the structural model of an application, the layouts an external
//! layouter computes for it, the camera, and CPU meshes. Nothing here touches
//! the GPU.

pub mod camera;
pub mod colors;
pub mod layout;
pub mod mesh;
pub mod model;
pub mod tree;

pub use codecity_common as common;

pub use camera::{Camera, ZoomCamera};
pub use colors::ColorScheme;
pub use layout::{AtlasRegion, BoxLayout, LabelLayout, LabelLayoutMap, LayoutMap};
pub use mesh::{Mesh, MeshIndex, Vertex};
pub use model::{Application, Class, Communication, EntityId, Package, StructureCounts};
pub use tree::{walk_application, walk_package, PackageVisitor};
