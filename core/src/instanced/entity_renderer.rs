use std::collections::{HashMap, HashSet};

use cgmath::{EuclideanSpace, Matrix4, Point3, Vector3};
use codecity_common::RgbColor;
use codecity_scene::{
    walk_application, Application, BoxLayout, Class, ColorScheme, EntityId, LabelLayout, LabelLayoutMap,
    LayoutMap, Mesh, Package, PackageVisitor,
};

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::gpu::InstanceUploader;
use crate::instanced::buffer::{hidden_matrix, BoxInstances};
use crate::instanced::label::LabelRenderer;
use crate::instanced::state::{ClassRenderState, ComponentRenderState};
use crate::instanced::{EntityKind, EntityRef, MeshKind};
use crate::semantic_zoom::Visual;

#[derive(Debug, Copy, Clone, PartialEq)]
struct Hover {
    kind: EntityKind,
    index: usize,
    shift: f32,
}

/// Highlight state carried across a structural update.
type Highlight = (bool, Option<RgbColor>);

/// Transform of a visible box instance on the shared unit cube.
///
/// Open components are drawn as a slab of `open_height`, moved down so the
/// slab starts at the bottom of the laid-out box.
pub fn box_matrix(layout: &BoxLayout, open: bool, open_height: f32) -> Matrix4<f32> {
    let mut center = layout.center;
    let mut height = layout.height;
    if open {
        center.y -= layout.height / 2.0;
        center.y += open_height / 2.0;
        height = open_height;
    }
    Matrix4::from_translation(center.to_vec()) * Matrix4::from_nonuniform_scale(layout.width, height, layout.depth)
}

/// The box a zoom appearance stands for, keeping the laid-out level.
fn zoomed_layout(layout: &BoxLayout, zoom: Option<&Visual>) -> BoxLayout {
    match zoom {
        Some(visual) => {
            let size = visual.dimensions;
            let scale = visual.scale;
            BoxLayout::new(
                Point3::from_vec(visual.position),
                size.x * scale.x,
                size.y * scale.y,
                size.z * scale.z,
                layout.level,
            )
        }
        None => *layout,
    }
}

/// Owns the instanced component and class boxes of one application.
///
/// Visual state (open, visible, highlighted, hovered) lives here and is the
/// only input to the instance rows. Every mutation recomputes the affected
/// rows right away; the rows reach the GPU in one batch on [`flush`].
///
/// [`flush`]: InstancedEntityRenderer::flush
pub struct InstancedEntityRenderer {
    config: RenderConfig,
    geometry: Mesh,
    components: Vec<ComponentRenderState>,
    classes: Vec<ClassRenderState>,
    component_ids: HashMap<EntityId, usize>,
    class_ids: HashMap<EntityId, usize>,
    /// An id is present iff the component is expanded.
    open_component_ids: HashSet<EntityId>,
    layouts: LayoutMap,
    label_layouts: LabelLayoutMap,
    component_boxes: BoxInstances,
    class_boxes: BoxInstances,
    labels: LabelRenderer,
    hovered: Option<Hover>,
}

/// Assigns pre-order indices and initial visibility while walking the tree.
struct StateBuilder<'a> {
    open: &'a HashSet<EntityId>,
    components: Vec<ComponentRenderState>,
    classes: Vec<ClassRenderState>,
    stack: Vec<usize>,
}

impl StateBuilder<'_> {
    fn shows_children(&self, index: usize) -> bool {
        let state = &self.components[index];
        state.visible && self.open.contains(&state.id)
    }
}

impl PackageVisitor for StateBuilder<'_> {
    fn enter_package(&mut self, package: &Package) -> bool {
        let index = self.components.len();
        let parent = self.stack.last().copied();

        let mut state = ComponentRenderState::new(package.id.clone(), index, package.level, parent);
        if let Some(parent) = parent {
            state.visible = self.shows_children(parent);
            self.components[parent].sub_components.push(index);
        }
        self.components.push(state);
        self.stack.push(index);
        true
    }

    fn visit_class(&mut self, class: &Class, _owner: &Package) {
        let Some(&owner) = self.stack.last() else {
            return;
        };
        let index = self.classes.len();
        let mut state = ClassRenderState::new(class.id.clone(), index, owner);
        state.visible = self.shows_children(owner);
        self.components[owner].classes.push(index);
        self.classes.push(state);
    }

    fn exit_package(&mut self, _package: &Package) {
        self.stack.pop();
    }
}

impl InstancedEntityRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            labels: LabelRenderer::new(&config),
            config,
            geometry: Mesh::unit_box(),
            components: Vec::new(),
            classes: Vec::new(),
            component_ids: HashMap::new(),
            class_ids: HashMap::new(),
            open_component_ids: HashSet::new(),
            layouts: LayoutMap::new(),
            label_layouts: LabelLayoutMap::new(),
            component_boxes: BoxInstances::default(),
            class_boxes: BoxInstances::default(),
            hovered: None,
        }
    }

    // ========== Structural population ==========

    /// Populates all instance rows for a structural revision.
    ///
    /// Indices follow a pre-order walk of the package tree. Buffers are
    /// reallocated only when the entity counts differ from the current
    /// allocation. Entities without a layout are logged and hidden.
    ///
    /// # Arguments
    /// * `application` - Structural model to render
    /// * `layouts` - Box layout of every component and class
    /// * `label_layouts` - Label placement and atlas region per entity
    /// * `open_component_ids` - Components that start expanded
    pub fn init(
        &mut self,
        application: &Application,
        layouts: &LayoutMap,
        label_layouts: &LabelLayoutMap,
        open_component_ids: &HashSet<EntityId>,
    ) {
        self.populate(
            application,
            layouts,
            label_layouts,
            open_component_ids,
            &HashMap::new(),
            &HashMap::new(),
        );
    }

    /// Rebuilds state after a structural change.
    ///
    /// Open state, highlights and highlight overrides survive for every id
    /// still present. Ids that disappeared are dropped and the hover is reset.
    pub fn update(&mut self, application: &Application, layouts: &LayoutMap, label_layouts: &LabelLayoutMap) {
        let open = std::mem::take(&mut self.open_component_ids);
        let component_highlights: HashMap<EntityId, Highlight> = self
            .components
            .iter()
            .map(|state| (state.id.clone(), (state.highlighted, state.highlight_color_override)))
            .collect();
        let class_highlights: HashMap<EntityId, Highlight> = self
            .classes
            .iter()
            .map(|state| (state.id.clone(), (state.highlighted, state.highlight_color_override)))
            .collect();

        log::debug!("Structural update of application '{}'", application.id);
        self.populate(
            application,
            layouts,
            label_layouts,
            &open,
            &component_highlights,
            &class_highlights,
        );
    }

    fn populate(
        &mut self,
        application: &Application,
        layouts: &LayoutMap,
        label_layouts: &LabelLayoutMap,
        open_component_ids: &HashSet<EntityId>,
        component_highlights: &HashMap<EntityId, Highlight>,
        class_highlights: &HashMap<EntityId, Highlight>,
    ) {
        let mut builder = StateBuilder {
            open: open_component_ids,
            components: Vec::new(),
            classes: Vec::new(),
            stack: Vec::new(),
        };
        walk_application(application, &mut builder);

        self.components = builder.components;
        self.classes = builder.classes;
        self.component_ids = self.components.iter().map(|s| (s.id.clone(), s.index)).collect();
        self.class_ids = self.classes.iter().map(|s| (s.id.clone(), s.index)).collect();
        self.open_component_ids = open_component_ids
            .iter()
            .filter(|id| self.component_ids.contains_key(*id))
            .cloned()
            .collect();
        self.layouts = layouts.clone();
        self.hovered = None;

        for state in &mut self.components {
            if let Some(&(highlighted, color)) = component_highlights.get(&state.id) {
                state.highlighted = highlighted;
                state.highlight_color_override = color;
            }
        }
        for state in &mut self.classes {
            if let Some(&(highlighted, color)) = class_highlights.get(&state.id) {
                state.highlighted = highlighted;
                state.highlight_color_override = color;
            }
        }

        for id in self.component_ids.keys().chain(self.class_ids.keys()) {
            if !self.layouts.contains_key(id) {
                log::error!("{}, hiding it", RenderError::MissingLayout(id.clone()));
            }
        }

        let counts = application.counts();
        if self.component_boxes.resize(counts.packages) {
            log::debug!("Allocated component instances for {} packages", counts.packages);
        }
        if self.class_boxes.resize(counts.classes) {
            log::debug!("Allocated class instances for {} classes", counts.classes);
        }

        self.assign_labels(label_layouts.clone());
        self.refresh_all();
    }

    /// Replaces label layouts, e.g. after the label atlas was rebuilt.
    ///
    /// Atlas regions are only sent to the GPU from here and from
    /// [`init`](Self::init)/[`update`](Self::update), never on toggles.
    pub fn set_label_layouts(&mut self, label_layouts: &LabelLayoutMap) {
        self.assign_labels(label_layouts.clone());
        self.refresh_all();
    }

    fn assign_labels(&mut self, label_layouts: LabelLayoutMap) {
        self.label_layouts = label_layouts;

        let mut component_entries = Vec::new();
        for state in &mut self.components {
            state.label_index = self.label_layouts.get(&state.id).map(|label| label.label_index);
            match state.label_index {
                Some(label) => component_entries.push((state.index, label)),
                None => log::error!("{}", RenderError::MissingLabelLayout(state.id.clone())),
            }
        }
        let mut class_entries = Vec::new();
        for state in &mut self.classes {
            state.label_index = self.label_layouts.get(&state.id).map(|label| label.label_index);
            match state.label_index {
                Some(label) => class_entries.push((state.index, label)),
                None => log::error!("{}", RenderError::MissingLabelLayout(state.id.clone())),
            }
        }

        self.labels.allocate(EntityKind::Component, &component_entries);
        self.labels.allocate(EntityKind::Class, &class_entries);

        for state in &self.components {
            if let Some(label) = self.label_layouts.get(&state.id) {
                self.labels.set_atlas(EntityKind::Component, label);
            }
        }
        for state in &self.classes {
            if let Some(label) = self.label_layouts.get(&state.id) {
                self.labels.set_atlas(EntityKind::Class, label);
            }
        }
    }

    // ========== Row computation ==========

    fn refresh_all(&mut self) {
        for index in 0..self.components.len() {
            self.refresh_component(index);
        }
        for index in 0..self.classes.len() {
            self.refresh_class(index);
        }
    }

    fn refresh_component(&mut self, index: usize) {
        let state = &self.components[index];
        let open = self.open_component_ids.contains(&state.id);
        let zoom = state.zoom_visual.as_ref();
        let visible = state.visible && zoom.map_or(true, |visual| visual.visible);
        let layout = self.layouts.get(&state.id).map(|layout| zoomed_layout(layout, zoom));

        let matrix = match &layout {
            Some(layout) if visible => box_matrix(layout, open, self.config.open_component_height).into(),
            _ => hidden_matrix(),
        };
        let color = self.color_of(EntityKind::Component, index);
        self.component_boxes.matrices.set(index, matrix);
        self.component_boxes.colors.set(index, color);

        if let Some(label) = self.label_layouts.get(&state.id) {
            match &layout {
                Some(layout) => self.labels.place(EntityKind::Component, label, layout, visible, open),
                None => self.labels.hide(EntityKind::Component, label.label_index),
            }
        }
    }

    fn refresh_class(&mut self, index: usize) {
        let state = &self.classes[index];
        let zoom = state.zoom_visual.as_ref();
        let visible = state.visible && zoom.map_or(true, |visual| visual.visible);
        let layout = self.layouts.get(&state.id).map(|layout| zoomed_layout(layout, zoom));

        let matrix = match &layout {
            Some(layout) if visible => box_matrix(layout, false, self.config.open_component_height).into(),
            _ => hidden_matrix(),
        };
        let color = self.color_of(EntityKind::Class, index);
        self.class_boxes.matrices.set(index, matrix);
        self.class_boxes.colors.set(index, color);

        if let Some(label) = self.label_layouts.get(&state.id) {
            match &layout {
                Some(layout) => self.labels.place(EntityKind::Class, label, layout, visible, false),
                None => self.labels.hide(EntityKind::Class, label.label_index),
            }
        }
    }

    fn refresh_color(&mut self, kind: EntityKind, index: usize) {
        let color = self.color_of(kind, index);
        match kind {
            EntityKind::Component => self.component_boxes.colors.set(index, color),
            EntityKind::Class => self.class_boxes.colors.set(index, color),
        };
    }

    fn refresh_all_colors(&mut self) {
        for index in 0..self.components.len() {
            self.refresh_color(EntityKind::Component, index);
        }
        for index in 0..self.classes.len() {
            self.refresh_color(EntityKind::Class, index);
        }
    }

    /// Color of an entity before highlight and hover.
    ///
    /// The zoom appearance's color if one is set, otherwise the color by
    /// level parity (components) or the class color.
    fn base_color(&self, kind: EntityKind, index: usize) -> RgbColor {
        let colors = &self.config.colors;
        match kind {
            EntityKind::Component => {
                let state = &self.components[index];
                state
                    .zoom_visual
                    .as_ref()
                    .map_or(colors.component_for_level(state.level), |visual| visual.color)
            }
            EntityKind::Class => {
                let state = &self.classes[index];
                state.zoom_visual.as_ref().map_or(colors.class, |visual| visual.color)
            }
        }
    }

    /// Effective color of an entity.
    ///
    /// The base color, replaced by the override or default highlight color
    /// while highlighted, then brightened if hovered.
    fn color_of(&self, kind: EntityKind, index: usize) -> RgbColor {
        let (highlighted, override_color) = match kind {
            EntityKind::Component => {
                let state = &self.components[index];
                (state.highlighted, state.highlight_color_override)
            }
            EntityKind::Class => {
                let state = &self.classes[index];
                (state.highlighted, state.highlight_color_override)
            }
        };

        let color = if highlighted {
            override_color.unwrap_or(self.config.colors.highlighted_entity)
        } else {
            self.base_color(kind, index)
        };

        match self.hovered {
            Some(hover) if hover.kind == kind && hover.index == index => color.scaled_clamped(hover.shift),
            _ => color,
        }
    }

    // ========== Open / close ==========

    /// Flips a component between open and closed and cascades visibility.
    ///
    /// Returns the new open state so the caller can broadcast it.
    pub fn toggle_component(&mut self, index: usize) -> Result<bool, RenderError> {
        let open = !self.is_open(&self.component_at(index)?.id);
        self.set_open(index, open);
        Ok(open)
    }

    /// [`toggle_component`](Self::toggle_component) by entity id.
    pub fn toggle_component_by_id(&mut self, id: &str) -> Result<bool, RenderError> {
        let index = self.lookup(EntityKind::Component, id)?;
        self.toggle_component(index)
    }

    /// Opens or closes one component. Returns true if its state changed.
    pub fn set_component_open(&mut self, index: usize, open: bool) -> Result<bool, RenderError> {
        let changed = self.is_open(&self.component_at(index)?.id) != open;
        if changed {
            self.set_open(index, open);
        }
        Ok(changed)
    }

    /// Opens or closes every component. Returns the number of components toggled.
    pub fn open_or_close_all_components(&mut self, open: bool) -> usize {
        let mut toggled = 0;
        for index in 0..self.components.len() {
            if self.is_open(&self.components[index].id) != open {
                self.set_open(index, open);
                toggled += 1;
            }
        }
        toggled
    }

    /// Opens every closed ancestor of an entity so it becomes visible.
    ///
    /// For a class the owning component is opened as well. Returns the ids of
    /// the components that were opened, outermost first.
    pub fn open_parents(&mut self, id: &str) -> Result<Vec<EntityId>, RenderError> {
        let mut next = if let Some(&class) = self.class_ids.get(id) {
            Some(self.classes[class].owner)
        } else if let Some(&component) = self.component_ids.get(id) {
            self.components[component].parent
        } else {
            return Err(RenderError::UnknownEntity(id.to_string()));
        };

        let mut chain = Vec::new();
        while let Some(index) = next {
            chain.push(index);
            next = self.components[index].parent;
        }

        let mut opened = Vec::new();
        for &index in chain.iter().rev() {
            if !self.is_open(&self.components[index].id) {
                self.set_open(index, true);
                opened.push(self.components[index].id.clone());
            }
        }
        Ok(opened)
    }

    fn set_open(&mut self, index: usize, open: bool) {
        let id = self.components[index].id.clone();
        if open {
            self.open_component_ids.insert(id);
        } else {
            self.open_component_ids.remove(&id);
        }
        self.refresh_component(index);

        let shows_children = self.components[index].visible && open;
        self.cascade_visibility(index, shows_children);
    }

    /// Recomputes visibility of the whole subtree below `index`.
    fn cascade_visibility(&mut self, index: usize, shows_children: bool) {
        for i in 0..self.components[index].classes.len() {
            let class = self.components[index].classes[i];
            self.classes[class].visible = shows_children;
            self.refresh_class(class);
        }
        for i in 0..self.components[index].sub_components.len() {
            let sub = self.components[index].sub_components[i];
            self.components[sub].visible = shows_children;
            self.refresh_component(sub);

            let sub_open = self.is_open(&self.components[sub].id);
            self.cascade_visibility(sub, shows_children && sub_open);
        }
    }

    // ========== Hover ==========

    /// Brightens an entity by `color_shift` on top of its current color.
    ///
    /// A previously hovered entity is reverted first. Hovering the hovered
    /// entity again does nothing. Only box instances can be hovered.
    pub fn apply_hover_effect(&mut self, kind: MeshKind, index: usize, color_shift: f32) -> Result<(), RenderError> {
        let entity = match kind {
            MeshKind::Component => EntityKind::Component,
            MeshKind::Class => EntityKind::Class,
            MeshKind::ComponentLabel | MeshKind::ClassLabel => {
                return Err(RenderError::NotSupported("hover effect on label instances"))
            }
            MeshKind::Communication | MeshKind::Arrow => {
                return Err(RenderError::NotSupported("hover effect on communication meshes"))
            }
        };
        self.check_index(entity, index)?;

        if let Some(hover) = self.hovered {
            if hover.kind == entity && hover.index == index {
                return Ok(());
            }
        }

        self.reset_hover_effect();
        self.hovered = Some(Hover {
            kind: entity,
            index,
            shift: color_shift,
        });
        self.refresh_color(entity, index);
        Ok(())
    }

    /// Restores the hovered entity's color, recomputed from its current state.
    pub fn reset_hover_effect(&mut self) {
        if let Some(hover) = self.hovered.take() {
            self.refresh_color(hover.kind, hover.index);
        }
    }

    // ========== Highlighting ==========

    /// Returns true if the highlight state changed.
    pub fn highlight_component(&mut self, id: &str) -> Result<bool, RenderError> {
        self.set_highlighted(EntityKind::Component, id, true)
    }

    pub fn unhighlight_component(&mut self, id: &str) -> Result<bool, RenderError> {
        self.set_highlighted(EntityKind::Component, id, false)
    }

    pub fn highlight_class(&mut self, id: &str) -> Result<bool, RenderError> {
        self.set_highlighted(EntityKind::Class, id, true)
    }

    pub fn unhighlight_class(&mut self, id: &str) -> Result<bool, RenderError> {
        self.set_highlighted(EntityKind::Class, id, false)
    }

    fn set_highlighted(&mut self, kind: EntityKind, id: &str, highlighted: bool) -> Result<bool, RenderError> {
        let index = self.lookup(kind, id)?;
        let flag = match kind {
            EntityKind::Component => &mut self.components[index].highlighted,
            EntityKind::Class => &mut self.classes[index].highlighted,
        };
        if *flag == highlighted {
            return Ok(false);
        }
        *flag = highlighted;
        self.refresh_color(kind, index);
        Ok(true)
    }

    /// Sets or clears the highlight color of a single entity (e.g. a remote user's color).
    pub fn set_highlight_color_override(&mut self, id: &str, color: Option<RgbColor>) -> Result<(), RenderError> {
        let (kind, index) = self
            .index_of(id)
            .ok_or_else(|| RenderError::UnknownEntity(id.to_string()))?;
        match kind {
            EntityKind::Component => self.components[index].highlight_color_override = color,
            EntityKind::Class => self.classes[index].highlight_color_override = color,
        }
        self.refresh_color(kind, index);
        Ok(())
    }

    /// Changes the session-wide highlight color.
    ///
    /// Passing the scheme's default highlight color clears every override.
    /// Any other color becomes the override of every entity.
    pub fn set_highlighting_color(&mut self, color: RgbColor) {
        let override_color = (color != self.config.colors.highlighted_entity).then_some(color);
        for state in &mut self.components {
            state.highlight_color_override = override_color;
        }
        for state in &mut self.classes {
            state.highlight_color_override = override_color;
        }
        self.refresh_all_colors();
    }

    /// Replaces the color scheme and recolors every instance.
    pub fn set_color_scheme(&mut self, colors: ColorScheme) {
        self.config.colors = colors;
        self.refresh_all_colors();
    }

    /// Replaces the whole configuration and recomputes every row.
    pub fn set_config(&mut self, config: RenderConfig) {
        self.labels.apply_config(&config);
        self.config = config;
        self.refresh_all();
    }

    // ========== Semantic zoom ==========

    /// Visual of a box as semantic zoom sees it.
    ///
    /// The zoom appearance if one is set, otherwise the closed laid-out box
    /// with its base color. Highlight and hover never show up here.
    pub fn entity_visual(&self, kind: EntityKind, index: usize) -> Result<Visual, RenderError> {
        self.check_index(kind, index)?;
        let (id, zoom) = match kind {
            EntityKind::Component => (&self.components[index].id, &self.components[index].zoom_visual),
            EntityKind::Class => (&self.classes[index].id, &self.classes[index].zoom_visual),
        };
        if let Some(visual) = zoom {
            return Ok(visual.clone());
        }
        let layout = self.layout(id)?;
        Ok(Visual {
            position: layout.center.to_vec(),
            dimensions: layout.size(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            color: self.base_color(kind, index),
            ..Visual::default()
        })
    }

    /// Draws a box with a zoom appearance, or from its layout again with `None`.
    ///
    /// Open state, cascaded visibility, highlight and hover still apply on top.
    pub fn set_entity_visual(&mut self, kind: EntityKind, index: usize, visual: Option<Visual>) -> Result<(), RenderError> {
        self.check_index(kind, index)?;
        match kind {
            EntityKind::Component => {
                self.components[index].zoom_visual = visual;
                self.refresh_component(index);
            }
            EntityKind::Class => {
                self.classes[index].zoom_visual = visual;
                self.refresh_class(index);
            }
        }
        Ok(())
    }

    // ========== Query API ==========

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// The unit cube shared by all box instances.
    pub fn geometry(&self) -> &Mesh {
        &self.geometry
    }

    pub fn labels(&self) -> &LabelRenderer {
        &self.labels
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn component(&self, index: usize) -> Option<&ComponentRenderState> {
        self.components.get(index)
    }

    pub fn class(&self, index: usize) -> Option<&ClassRenderState> {
        self.classes.get(index)
    }

    pub fn component_state(&self, id: &str) -> Option<&ComponentRenderState> {
        self.component_ids.get(id).map(|&index| &self.components[index])
    }

    pub fn class_state(&self, id: &str) -> Option<&ClassRenderState> {
        self.class_ids.get(id).map(|&index| &self.classes[index])
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.open_component_ids.contains(id)
    }

    pub fn open_component_ids(&self) -> &HashSet<EntityId> {
        &self.open_component_ids
    }

    /// Category and buffer slot of an entity id.
    pub fn index_of(&self, id: &str) -> Option<(EntityKind, usize)> {
        self.component_ids
            .get(id)
            .map(|&index| (EntityKind::Component, index))
            .or_else(|| self.class_ids.get(id).map(|&index| (EntityKind::Class, index)))
    }

    /// The entity behind an instance slot of any box or label mesh.
    pub fn data_model(&self, kind: MeshKind, index: usize) -> Option<EntityRef<'_>> {
        let box_index = if kind.is_label() {
            self.labels.owner(kind.entity_kind()?, index)?
        } else {
            index
        };
        match kind.entity_kind()? {
            EntityKind::Component => self.components.get(box_index).map(EntityRef::Component),
            EntityKind::Class => self.classes.get(box_index).map(EntityRef::Class),
        }
    }

    pub fn layout(&self, id: &str) -> Result<&BoxLayout, RenderError> {
        self.layouts
            .get(id)
            .ok_or_else(|| RenderError::MissingLayout(id.to_string()))
    }

    pub fn label_layout(&self, id: &str) -> Result<&LabelLayout, RenderError> {
        self.label_layouts
            .get(id)
            .ok_or_else(|| RenderError::MissingLabelLayout(id.to_string()))
    }

    fn boxes(&self, kind: EntityKind) -> &BoxInstances {
        match kind {
            EntityKind::Component => &self.component_boxes,
            EntityKind::Class => &self.class_boxes,
        }
    }

    /// Current instance transform of a box.
    pub fn matrix(&self, kind: EntityKind, index: usize) -> Option<Matrix4<f32>> {
        self.boxes(kind).matrices.get(index).map(|m| Matrix4::from(*m))
    }

    /// Current instance color of a box.
    pub fn color(&self, kind: EntityKind, index: usize) -> Option<RgbColor> {
        self.boxes(kind).colors.get(index).copied()
    }

    /// Instance rows of a category, in slot order.
    pub fn instances(&self, kind: EntityKind) -> &BoxInstances {
        self.boxes(kind)
    }

    /// The hovered entity, if any.
    pub fn hovered(&self) -> Option<(EntityKind, usize)> {
        self.hovered.map(|hover| (hover.kind, hover.index))
    }

    // ========== Upload ==========

    pub fn needs_upload(&self) -> bool {
        self.component_boxes.needs_upload() || self.class_boxes.needs_upload() || self.labels.needs_upload()
    }

    /// Sends every pending row to the GPU. Call once per frame.
    ///
    /// Returns the number of uploader calls made.
    pub fn flush(&mut self, uploader: &mut dyn InstanceUploader) -> usize {
        self.component_boxes.flush(MeshKind::Component, uploader)
            + self.class_boxes.flush(MeshKind::Class, uploader)
            + self.labels.flush(uploader)
    }

    // ========== Helpers ==========

    fn component_at(&self, index: usize) -> Result<&ComponentRenderState, RenderError> {
        self.components.get(index).ok_or(RenderError::IndexOutOfRange {
            kind: MeshKind::Component,
            index,
        })
    }

    fn check_index(&self, kind: EntityKind, index: usize) -> Result<(), RenderError> {
        let len = match kind {
            EntityKind::Component => self.components.len(),
            EntityKind::Class => self.classes.len(),
        };
        if index < len {
            Ok(())
        } else {
            Err(RenderError::IndexOutOfRange {
                kind: kind.box_kind(),
                index,
            })
        }
    }

    fn lookup(&self, kind: EntityKind, id: &str) -> Result<usize, RenderError> {
        let ids = match kind {
            EntityKind::Component => &self.component_ids,
            EntityKind::Class => &self.class_ids,
        };
        ids.get(id)
            .copied()
            .ok_or_else(|| RenderError::UnknownEntity(id.to_string()))
    }

    #[cfg(test)]
    pub(crate) fn atlas_needs_upload(&self, kind: EntityKind) -> bool {
        self.labels.atlas_needs_upload(kind)
    }
}
