use cgmath::{Deg, Matrix4, Vector3};
use codecity_scene::{AtlasRegion, BoxLayout, LabelLayout, Mesh};

use crate::config::RenderConfig;
use crate::gpu::InstanceUploader;
use crate::instanced::buffer::{hidden_matrix, LabelInstances};
use crate::instanced::EntityKind;

/// Instanced labels of both entity categories.
///
/// Label slots mirror box slots one to one but use their own index space,
/// taken from the label layouts. All labels of a category share one quad and
/// one material; each instance picks its text out of the shared atlas through
/// a per-instance [`AtlasRegion`].
pub struct LabelRenderer {
    components: LabelInstances,
    classes: LabelInstances,
    geometry: Mesh,
    y_epsilon: f32,
    open_x_offset: f32,
    open_height: f32,
}

impl LabelRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            components: LabelInstances::default(),
            classes: LabelInstances::default(),
            geometry: Mesh::quad(1.0, 1.0),
            y_epsilon: config.label_y_epsilon,
            open_x_offset: config.open_label_x_offset,
            open_height: config.open_component_height,
        }
    }

    pub(crate) fn apply_config(&mut self, config: &RenderConfig) {
        self.y_epsilon = config.label_y_epsilon;
        self.open_x_offset = config.open_label_x_offset;
        self.open_height = config.open_component_height;
    }

    /// The quad shared by every label instance.
    pub fn geometry(&self) -> &Mesh {
        &self.geometry
    }

    fn instances(&self, kind: EntityKind) -> &LabelInstances {
        match kind {
            EntityKind::Component => &self.components,
            EntityKind::Class => &self.classes,
        }
    }

    fn instances_mut(&mut self, kind: EntityKind) -> &mut LabelInstances {
        match kind {
            EntityKind::Component => &mut self.components,
            EntityKind::Class => &mut self.classes,
        }
    }

    /// Sizes the label buffer of a category and records slot owners.
    ///
    /// # Arguments
    /// * `entries` - `(box index, label index)` pairs of every labelled entity
    ///
    /// Slots left without an owner are collapsed. Returns true if the buffer
    /// was reallocated.
    pub(crate) fn allocate(&mut self, kind: EntityKind, entries: &[(usize, usize)]) -> bool {
        let count = entries.iter().map(|(_, label)| label + 1).max().unwrap_or(0);
        let instances = self.instances_mut(kind);
        let reallocated = instances.resize(count);
        for &(owner, label) in entries {
            if let Some(previous) = instances.owners[label].replace(owner) {
                log::warn!(
                    "{:?} label slot {} claimed by boxes {} and {}",
                    kind,
                    label,
                    previous,
                    owner
                );
            }
        }
        let orphans: Vec<usize> = (0..count).filter(|&label| instances.owners[label].is_none()).collect();
        for label in orphans {
            instances.matrices.set(label, hidden_matrix());
        }
        reallocated
    }

    pub(crate) fn set_atlas(&mut self, kind: EntityKind, label: &LabelLayout) {
        self.instances_mut(kind).atlas.set(label.label_index, label.atlas);
    }

    /// Positions a label on its owning box, or hides it if the box is hidden.
    pub(crate) fn place(&mut self, kind: EntityKind, label: &LabelLayout, layout: &BoxLayout, visible: bool, open: bool) {
        let matrix = if visible {
            self.label_matrix(kind, label, layout, open).into()
        } else {
            hidden_matrix()
        };
        self.instances_mut(kind).matrices.set(label.label_index, matrix);
    }

    pub(crate) fn hide(&mut self, kind: EntityKind, label_index: usize) {
        self.instances_mut(kind).matrices.set(label_index, hidden_matrix());
    }

    /// Transform of a visible label.
    ///
    /// Labels lie flat on top of their box, lifted by a small epsilon to avoid
    /// z-fighting. The label of an open component moves to the component's
    /// left edge so it does not cover the children.
    pub fn label_matrix(&self, kind: EntityKind, label: &LabelLayout, layout: &BoxLayout, open: bool) -> Matrix4<f32> {
        let open = open && kind == EntityKind::Component;
        let (x, top) = if open {
            (
                layout.center.x - layout.width / 2.0 + self.open_x_offset,
                layout.bottom_y() + self.open_height,
            )
        } else {
            (layout.center.x, layout.top_y())
        };

        Matrix4::from_translation(Vector3::new(x, top + self.y_epsilon, layout.center.z))
            * Matrix4::from_angle_x(Deg(-90.0))
            * Matrix4::from_nonuniform_scale(label.width, label.height, 1.0)
    }

    // ========== Query API ==========

    /// Number of label slots of a category.
    pub fn len(&self, kind: EntityKind) -> usize {
        self.instances(kind).len()
    }

    pub fn matrix(&self, kind: EntityKind, label_index: usize) -> Option<Matrix4<f32>> {
        self.instances(kind).matrices.get(label_index).map(|m| Matrix4::from(*m))
    }

    pub fn atlas(&self, kind: EntityKind, label_index: usize) -> Option<AtlasRegion> {
        self.instances(kind).atlas.get(label_index).copied()
    }

    /// Box index owning a label slot.
    pub fn owner(&self, kind: EntityKind, label_index: usize) -> Option<usize> {
        self.instances(kind).owners.get(label_index).copied().flatten()
    }

    pub fn needs_upload(&self) -> bool {
        self.components.needs_upload() || self.classes.needs_upload()
    }

    pub(crate) fn atlas_needs_upload(&self, kind: EntityKind) -> bool {
        self.instances(kind).atlas.needs_upload()
    }

    /// Sends pending label rows to the uploader.
    pub fn flush(&mut self, uploader: &mut dyn InstanceUploader) -> usize {
        self.components.flush(EntityKind::Component.label_kind(), uploader)
            + self.classes.flush(EntityKind::Class.label_kind(), uploader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Point3, Transform};
    use codecity_common::EPSILON;

    fn label(index: usize) -> LabelLayout {
        LabelLayout {
            label_index: index,
            width: 2.0,
            height: 0.5,
            atlas: AtlasRegion {
                relative_width: 0.25,
                relative_height: 0.05,
                vertical_offset: 0.1,
            },
        }
    }

    fn layout() -> BoxLayout {
        BoxLayout::new(Point3::new(10.0, 2.0, 5.0), 8.0, 4.0, 6.0, 0)
    }

    #[test]
    fn test_closed_label_sits_on_box_top() {
        let renderer = LabelRenderer::new(&RenderConfig::default());
        let matrix = renderer.label_matrix(EntityKind::Component, &label(0), &layout(), false);
        let origin = matrix.transform_point(Point3::new(0.0, 0.0, 0.0));

        assert!((origin.x - 10.0).abs() < EPSILON);
        assert!((origin.y - (4.0 + 0.01)).abs() < EPSILON);
        assert!((origin.z - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_open_label_moves_to_left_edge_of_slab() {
        let config = RenderConfig::default();
        let renderer = LabelRenderer::new(&config);
        let matrix = renderer.label_matrix(EntityKind::Component, &label(0), &layout(), true);
        let origin = matrix.transform_point(Point3::new(0.0, 0.0, 0.0));

        assert!((origin.x - (6.0 + config.open_label_x_offset)).abs() < EPSILON);
        assert!((origin.y - (config.open_component_height + config.label_y_epsilon)).abs() < EPSILON);
    }

    #[test]
    fn test_label_lies_flat() {
        let renderer = LabelRenderer::new(&RenderConfig::default());
        let matrix = renderer.label_matrix(EntityKind::Class, &label(0), &layout(), true);

        // Quad's +Y edge points away from the viewer along -Z
        let top_edge = matrix.transform_point(Point3::new(0.0, 0.5, 0.0));
        assert!((top_edge.y - (4.0 + 0.01)).abs() < EPSILON);
        assert!((top_edge.z - (5.0 - 0.25)).abs() < EPSILON);
    }

    #[test]
    fn test_allocate_sizes_to_highest_label_index() {
        let mut renderer = LabelRenderer::new(&RenderConfig::default());
        assert!(renderer.allocate(EntityKind::Class, &[(0, 2), (1, 0)]));

        assert_eq!(renderer.len(EntityKind::Class), 3);
        assert_eq!(renderer.owner(EntityKind::Class, 2), Some(0));
        assert_eq!(renderer.owner(EntityKind::Class, 1), None);
        assert_eq!(renderer.len(EntityKind::Component), 0);
    }

    #[test]
    fn test_reallocate_same_size_hides_orphaned_slots() {
        let mut renderer = LabelRenderer::new(&RenderConfig::default());
        renderer.allocate(EntityKind::Class, &[(0, 0), (1, 1)]);
        renderer.place(EntityKind::Class, &label(0), &layout(), true, false);
        renderer.place(EntityKind::Class, &label(1), &layout(), true, false);

        // Same slot count, slot 0 lost its owner
        assert!(!renderer.allocate(EntityKind::Class, &[(3, 1)]));

        assert_eq!(renderer.owner(EntityKind::Class, 0), None);
        assert_eq!(renderer.matrix(EntityKind::Class, 0), Some(Matrix4::from(hidden_matrix())));
        assert_ne!(renderer.matrix(EntityKind::Class, 1), Some(Matrix4::from(hidden_matrix())));
        assert!(renderer.needs_upload());
    }

    #[test]
    fn test_place_hidden_collapses_label() {
        let mut renderer = LabelRenderer::new(&RenderConfig::default());
        renderer.allocate(EntityKind::Component, &[(0, 0)]);
        renderer.place(EntityKind::Component, &label(0), &layout(), false, false);

        assert_eq!(renderer.matrix(EntityKind::Component, 0), Some(Matrix4::from(hidden_matrix())));
    }
}
