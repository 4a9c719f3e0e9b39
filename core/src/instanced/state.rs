use codecity_common::RgbColor;
use codecity_scene::EntityId;

use crate::semantic_zoom::Visual;

/// Render state of one component (package) box.
///
/// Open/closed is not stored here: the renderer's open id set is the single
/// source of truth for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRenderState {
    pub id: EntityId,
    /// Slot in the component instance buffer.
    pub index: usize,
    pub level: u32,
    pub visible: bool,
    pub highlighted: bool,
    pub highlight_color_override: Option<RgbColor>,
    /// Slot in the component label buffer, if the entity has a label layout.
    pub label_index: Option<usize>,
    /// Semantic zoom appearance drawn instead of the laid-out box.
    pub zoom_visual: Option<Visual>,
    pub(crate) parent: Option<usize>,
    pub(crate) sub_components: Vec<usize>,
    pub(crate) classes: Vec<usize>,
}

impl ComponentRenderState {
    pub(crate) fn new(id: EntityId, index: usize, level: u32, parent: Option<usize>) -> Self {
        Self {
            id,
            index,
            level,
            visible: true,
            highlighted: false,
            highlight_color_override: None,
            label_index: None,
            zoom_visual: None,
            parent,
            sub_components: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Index of the parent component, `None` for roots.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Indices of direct sub-components, in tree order.
    pub fn sub_components(&self) -> &[usize] {
        &self.sub_components
    }

    /// Indices of the component's own classes, in tree order.
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }
}

/// Render state of one class box.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRenderState {
    pub id: EntityId,
    /// Slot in the class instance buffer.
    pub index: usize,
    pub visible: bool,
    pub highlighted: bool,
    pub highlight_color_override: Option<RgbColor>,
    pub label_index: Option<usize>,
    pub zoom_visual: Option<Visual>,
    /// Index of the owning component.
    pub(crate) owner: usize,
}

impl ClassRenderState {
    pub(crate) fn new(id: EntityId, index: usize, owner: usize) -> Self {
        Self {
            id,
            index,
            visible: true,
            highlighted: false,
            highlight_color_override: None,
            label_index: None,
            zoom_visual: None,
            owner,
        }
    }

    pub fn owner(&self) -> usize {
        self.owner
    }
}
