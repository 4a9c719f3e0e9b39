//! Instanced rendering of component and class boxes and their labels.
//!
//! Every entity category shares one box geometry. Per-entity transforms and
//! colors live in instance buffers whose slot indices follow a pre-order walk
//! of the package tree and stay stable until the next structural update.

mod buffer;
mod entity_renderer;
mod label;
mod state;
mod zoomable;


pub use buffer::{hidden_matrix, BoxInstances, InstanceChannel, InstanceMatrix, LabelInstances};
pub use entity_renderer::InstancedEntityRenderer;
pub use label::LabelRenderer;
pub use state::{ClassRenderState, ComponentRenderState};
pub use zoomable::{register_entities, EntityZoomable};

/// Tag carried by every instanced or child mesh in the city.
///
/// Picking and hover code dispatch on this tag instead of inspecting the
/// mesh type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MeshKind {
    Component,
    Class,
    ComponentLabel,
    ClassLabel,
    Communication,
    Arrow,
}

/// The two box categories of the package tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Component,
    Class,
}

impl EntityKind {
    pub fn box_kind(self) -> MeshKind {
        match self {
            EntityKind::Component => MeshKind::Component,
            EntityKind::Class => MeshKind::Class,
        }
    }

    pub fn label_kind(self) -> MeshKind {
        match self {
            EntityKind::Component => MeshKind::ComponentLabel,
            EntityKind::Class => MeshKind::ClassLabel,
        }
    }
}

impl MeshKind {
    /// The entity category a box or label mesh belongs to.
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            MeshKind::Component | MeshKind::ComponentLabel => Some(EntityKind::Component),
            MeshKind::Class | MeshKind::ClassLabel => Some(EntityKind::Class),
            MeshKind::Communication | MeshKind::Arrow => None,
        }
    }

    pub fn is_label(self) -> bool {
        matches!(self, MeshKind::ComponentLabel | MeshKind::ClassLabel)
    }
}

/// The entity behind an instance slot.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum EntityRef<'a> {
    Component(&'a ComponentRenderState),
    Class(&'a ClassRenderState),
}

impl EntityRef<'_> {
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Component(state) => &state.id,
            EntityRef::Class(state) => &state.id,
        }
    }
}
