//! Communication rendering.
//!
//! A communication between two classes becomes a tube from the top of the
//! source box to the top of the target box, straight or lifted into a
//! quadratic curve, with an arrow per direction. A class calling itself is
//! marked with a sphere instead. Meshes are zoomable objects so the semantic
//! zoom manager can swap their appearance.

mod geometry;
mod mesh;
mod renderer;

pub use geometry::{quadratic_bezier, Arrow, CommunicationGeometry, CommunicationLayout, RenderMode};
pub use mesh::{CommunicationMesh, CommunicationMeshDataModel};
pub use renderer::{line_thickness_for_requests, CommunicationRenderer};
