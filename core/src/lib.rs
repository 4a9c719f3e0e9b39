//! Rendering core of a 3D software city.
//!
//! [`InstancedEntityRenderer`] keeps the open, visible, highlighted and
//! hovered state of every component and class and mirrors it into instance
//! buffers, one per entity category. [`CommunicationRenderer`] turns class to
//! class communications into tubes and arrows. [`SemanticZoomManager`]
//! switches zoomable objects between appearance levels from the camera
//! distance. The [`gpu`] module uploads dirty instance ranges with wgpu.

pub mod communication;
pub mod config;
pub mod error;
pub mod gpu;
pub mod instanced;
pub mod semantic_zoom;

// `pub use ... as scene` makes crate::scene::* resolve to codecity_scene::*
pub use codecity_scene as scene;
pub use codecity_scene::common;

pub use communication::{CommunicationMesh, CommunicationRenderer};
pub use config::RenderConfig;
pub use error::{AppearanceError, ClusterError, RenderError};
pub use gpu::{InstanceUploader, WgpuInstanceUploader};
pub use instanced::{EntityKind, EntityRef, EntityZoomable, InstancedEntityRenderer, LabelRenderer, MeshKind};
pub use semantic_zoom::{Appearance, Recipe, SemanticZoomConfig, SemanticZoomManager, ZoomableObject};
