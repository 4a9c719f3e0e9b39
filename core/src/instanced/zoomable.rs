use std::cell::RefCell;
use std::rc::Rc;

use codecity_scene::EntityId;

use crate::error::RenderError;
use crate::instanced::entity_renderer::InstancedEntityRenderer;
use crate::instanced::EntityKind;
use crate::semantic_zoom::{ObjectId, SemanticZoomManager, Visual, ZoomId, ZoomLevel, ZoomState, ZoomableObject};

/// One component or class box as a zoomable object.
///
/// The visual starts as the laid-out closed box. Every successful transition
/// writes it back into the box's instance row; level 0 hands the row back to
/// the layout. Slots are only valid until the next structural update of the
/// renderer, so adapters are recreated along with it.
pub struct EntityZoomable {
    renderer: Rc<RefCell<InstancedEntityRenderer>>,
    id: EntityId,
    kind: EntityKind,
    index: usize,
    visual: Visual,
    zoom: ZoomState,
}

impl EntityZoomable {
    pub fn new(renderer: Rc<RefCell<InstancedEntityRenderer>>, id: &str) -> Result<Self, RenderError> {
        let (kind, index, visual) = {
            let entities = renderer.borrow();
            let (kind, index) = entities
                .index_of(id)
                .ok_or_else(|| RenderError::UnknownEntity(id.to_string()))?;
            (kind, index, entities.entity_visual(kind, index)?)
        };
        Ok(Self {
            renderer,
            id: id.to_string(),
            kind,
            index,
            visual,
            zoom: ZoomState::new(),
        })
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Slot in the instance buffer of [`kind`](Self::kind).
    pub fn index(&self) -> usize {
        self.index
    }

    fn push_to_renderer(&self) {
        let visual = (self.zoom.level() != 0).then(|| self.visual.clone());
        let Ok(mut entities) = self.renderer.try_borrow_mut() else {
            log::warn!("Entity renderer is borrowed, '{}' keeps its previous row", self.id);
            return;
        };
        if let Err(err) = entities.set_entity_visual(self.kind, self.index, visual) {
            log::error!("Cannot show zoom appearance of '{}': {}", self.id, err);
        }
    }
}

impl ZoomableObject for EntityZoomable {
    fn zoom_parts_mut(&mut self) -> (&mut ZoomState, &mut Visual) {
        (&mut self.zoom, &mut self.visual)
    }

    fn zoom_state(&self) -> &ZoomState {
        &self.zoom
    }

    fn visual(&self) -> &Visual {
        &self.visual
    }

    fn show_appearance_with(
        &mut self,
        level: ZoomLevel,
        restore_first: bool,
        claimed_elsewhere: &dyn Fn(ObjectId) -> bool,
    ) -> bool {
        let shown = self
            .zoom
            .transition(&mut self.visual, level, restore_first, claimed_elsewhere);
        if shown {
            self.push_to_renderer();
        }
        shown
    }
}

/// Wraps every box of a renderer and registers it with `zoom`.
///
/// Entities without a layout are skipped. Returns the adapters in slot order,
/// components first, with their manager ids.
pub fn register_entities(
    renderer: &Rc<RefCell<InstancedEntityRenderer>>,
    zoom: &mut SemanticZoomManager,
) -> Vec<(ZoomId, Rc<RefCell<EntityZoomable>>)> {
    let ids: Vec<EntityId> = {
        let entities = renderer.borrow();
        let components = (0..entities.component_count()).filter_map(|index| entities.component(index));
        let classes = (0..entities.class_count()).filter_map(|index| entities.class(index));
        components
            .map(|state| state.id.clone())
            .chain(classes.map(|state| state.id.clone()))
            .collect()
    };

    let mut registered = Vec::with_capacity(ids.len());
    for id in ids {
        match EntityZoomable::new(renderer.clone(), &id) {
            Ok(adapter) => {
                let adapter = Rc::new(RefCell::new(adapter));
                let zoom_id = zoom.register(adapter.clone());
                registered.push((zoom_id, adapter));
            }
            Err(err) => log::warn!("Not zoomable: {}", err),
        }
    }
    log::debug!("Registered {} entities for semantic zoom", registered.len());
    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Matrix4, Point3, Transform, Vector3};
    use codecity_common::{RgbColor, EPSILON};
    use codecity_scene::{Application, BoxLayout, Class, LabelLayoutMap, LayoutMap, Package};
    use std::collections::HashSet;

    use crate::config::RenderConfig;
    use crate::instanced::MeshKind;
    use crate::semantic_zoom::{Recipe, SemanticZoomConfig};

    fn application() -> Application {
        Application::new("app", "demo", vec![Package::new("p1", "root").with_class(Class::new("c1", "Main"))])
    }

    fn layouts() -> LayoutMap {
        let mut layouts = LayoutMap::new();
        layouts.insert("p1".to_string(), BoxLayout::new(Point3::new(0.0, 1.0, 0.0), 20.0, 2.0, 20.0, 0));
        layouts.insert("c1".to_string(), BoxLayout::new(Point3::new(3.0, 4.0, -2.0), 2.0, 4.0, 2.0, 1));
        layouts
    }

    fn renderer() -> Rc<RefCell<InstancedEntityRenderer>> {
        let mut renderer = InstancedEntityRenderer::new(RenderConfig::default());
        renderer.init(&application(), &layouts(), &LabelLayoutMap::new(), &HashSet::from(["p1".to_string()]));
        Rc::new(RefCell::new(renderer))
    }

    fn top_of_class(renderer: &Rc<RefCell<InstancedEntityRenderer>>) -> f32 {
        let matrix = renderer.borrow().matrix(EntityKind::Class, 0).unwrap();
        matrix.transform_point(Point3::new(0.0, 0.5, 0.0)).y
    }

    // ===== Adapter =====

    #[test]
    fn test_visual_mirrors_layout() {
        let adapter = EntityZoomable::new(renderer(), "c1").unwrap();

        assert_eq!(adapter.kind(), EntityKind::Class);
        assert_eq!(adapter.visual().position, Vector3::new(3.0, 4.0, -2.0));
        assert_eq!(adapter.visual().dimensions, Vector3::new(2.0, 4.0, 2.0));
        assert_eq!(adapter.visual().color, RenderConfig::default().colors.class);
        assert!((adapter.world_position().x - 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_unknown_entity_is_rejected() {
        assert_eq!(
            EntityZoomable::new(renderer(), "nope").err(),
            Some(RenderError::UnknownEntity("nope".to_string()))
        );
    }

    #[test]
    fn test_levels_rewrite_instance_row() {
        let renderer = renderer();
        let mut adapter = EntityZoomable::new(renderer.clone(), "c1").unwrap();
        let red = RgbColor::new(1.0, 0.0, 0.0);
        adapter.set_appearance(1, Recipe::absolute().with_height(10.0).with_color(red).into());

        assert!((top_of_class(&renderer) - 6.0).abs() < EPSILON);
        assert!(adapter.show_appearance(1, true));
        assert!((top_of_class(&renderer) - 9.0).abs() < EPSILON);
        assert_eq!(renderer.borrow().color(EntityKind::Class, 0), Some(red));

        assert!(adapter.show_appearance(0, false));
        assert!((top_of_class(&renderer) - 6.0).abs() < EPSILON);
        assert_eq!(renderer.borrow().color(EntityKind::Class, 0), Some(RenderConfig::default().colors.class));
        assert_eq!(renderer.borrow().class(0).and_then(|state| state.zoom_visual.clone()), None);
    }

    #[test]
    fn test_hidden_level_collapses_box() {
        let renderer = renderer();
        let mut adapter = EntityZoomable::new(renderer.clone(), "c1").unwrap();
        adapter.set_appearance(1, Recipe::delta().with_visible(false).into());

        assert!(adapter.show_appearance(1, true));
        assert_eq!(
            renderer.borrow().matrix(EntityKind::Class, 0),
            Some(Matrix4::from(crate::instanced::hidden_matrix()))
        );
    }

    #[test]
    fn test_hover_and_highlight_stay_on_top() {
        let renderer = renderer();
        let mut adapter = EntityZoomable::new(renderer.clone(), "c1").unwrap();
        let red = RgbColor::new(0.5, 0.0, 0.0);
        adapter.set_appearance(1, Recipe::absolute().with_color(red).into());

        renderer.borrow_mut().apply_hover_effect(MeshKind::Class, 0, 1.5).unwrap();
        assert!(adapter.show_appearance(1, true));
        assert_eq!(adapter.visual().color, red);
        assert_eq!(renderer.borrow().color(EntityKind::Class, 0), Some(red.scaled_clamped(1.5)));

        renderer.borrow_mut().reset_hover_effect();
        assert!(renderer.borrow_mut().highlight_class("c1").unwrap());
        assert_eq!(
            renderer.borrow().color(EntityKind::Class, 0),
            Some(RenderConfig::default().colors.highlighted_entity)
        );

        assert!(adapter.show_appearance(0, false));
        assert_eq!(adapter.visual().color, RenderConfig::default().colors.class);
    }

    // ===== Registration =====

    #[test]
    fn test_manager_drives_entity_rows() {
        let renderer = renderer();
        let mut zoom = SemanticZoomManager::new(SemanticZoomConfig::default());
        let registered = register_entities(&renderer, &mut zoom);
        assert_eq!(registered.len(), 2);
        assert_eq!(zoom.len(), 2);

        let (class_id, class) = &registered[1];
        assert_eq!(class.borrow().id(), "c1");
        class
            .borrow_mut()
            .set_appearance(1, Recipe::absolute().with_height(10.0).into());

        assert_eq!(zoom.force_level(1), 1);
        assert_eq!(zoom.level_of(*class_id), Some(1));
        assert!((top_of_class(&renderer) - 9.0).abs() < EPSILON);

        // The component takes its first level 0 snapshot too
        assert_eq!(zoom.force_level(0), 2);
        assert!((top_of_class(&renderer) - 6.0).abs() < EPSILON);
    }
}
