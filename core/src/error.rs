use codecity_scene::EntityId;
use thiserror::Error;

use crate::instanced::MeshKind;
use crate::semantic_zoom::ObjectId;

/// Errors raised by the instanced entity and label renderers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// The structural model names an entity the layout pass did not place.
    #[error("No layout for entity '{0}'")]
    MissingLayout(EntityId),

    #[error("No label layout for entity '{0}'")]
    MissingLabelLayout(EntityId),

    #[error("Unknown entity '{0}'")]
    UnknownEntity(EntityId),

    #[error("Index {index} out of range for {kind:?} instances")]
    IndexOutOfRange { kind: MeshKind, index: usize },

    #[error("Not supported: {0}")]
    NotSupported(&'static str),
}

/// Errors raised by the clustering algorithms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("Cannot cluster an empty dataset")]
    EmptyDataset,

    #[error("Cannot form {clusters} clusters from {points} points")]
    TooFewPoints { points: usize, clusters: usize },

    #[error("Invalid clustering parameter: {0}")]
    InvalidParameter(&'static str),
}

/// Errors raised while applying an appearance recipe.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppearanceError {
    /// A child captured by the recipe now belongs to another object.
    #[error("Child {child} is attached to another object")]
    ChildReparented { child: ObjectId },
}
