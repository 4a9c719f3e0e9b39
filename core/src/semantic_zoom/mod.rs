//! Semantic zoom: distance driven appearance levels.
//!
//! Objects implement [`ZoomableObject`] by owning a [`ZoomState`] next to
//! their [`Visual`]. Each appearance level above 0 is an [`Appearance`],
//! either a [`Recipe`] patch or a callback; level 0 always restores the
//! snapshot taken on first use. The [`SemanticZoomManager`] groups
//! registered objects with [`k_means`] or [`mean_shift`] and switches levels
//! from the camera distance once per frame.

mod appearance;
mod cluster;
mod manager;
mod zoomable;

pub use appearance::{
    Appearance, AxisPatch, GeometryId, MaterialId, ObjectId, Recipe, ReleasedHandles, ReleasedResource, Visual,
};
pub use cluster::{k_means, mean_shift, Cluster};
pub use manager::{
    ClusterAlgorithm, DecisionMode, SemanticZoomConfig, SemanticZoomManager, SharedZoomable, ZoomId, ZoomLevelTable,
};
pub use zoomable::{ZoomLevel, ZoomState, ZoomableMesh, ZoomableObject};
