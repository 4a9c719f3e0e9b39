use std::collections::BTreeMap;
use std::fmt;

use cgmath::{EuclideanSpace, InnerSpace, Point3};

use crate::semantic_zoom::appearance::{Appearance, ObjectId, Recipe, ReleasedHandles, ReleasedResource, Visual};

/// Appearance level of a zoomable object. Level 0 is the original appearance.
pub type ZoomLevel = usize;

type TransitionHook = Box<dyn FnMut(&mut Visual, ZoomLevel)>;

/// Level-of-detail bookkeeping owned by every zoomable object.
pub struct ZoomState {
    level: ZoomLevel,
    appearances: BTreeMap<ZoomLevel, Appearance>,
    original: Option<Recipe>,
    before_transition: Option<TransitionHook>,
    released: Vec<ReleasedResource>,
    /// When set, the zoom manager leaves the object's level alone.
    pub override_visibility: bool,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ZoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoomState")
            .field("level", &self.level)
            .field("levels", &self.appearances.keys().collect::<Vec<_>>())
            .field("original", &self.original)
            .field("released", &self.released)
            .field("override_visibility", &self.override_visibility)
            .finish()
    }
}

impl ZoomState {
    pub fn new() -> Self {
        Self {
            level: 0,
            appearances: BTreeMap::new(),
            original: None,
            before_transition: None,
            released: Vec::new(),
            override_visibility: false,
        }
    }

    pub fn level(&self) -> ZoomLevel {
        self.level
    }

    pub fn original(&self) -> Option<&Recipe> {
        self.original.as_ref()
    }

    /// Registered levels above 0, ascending.
    pub fn levels(&self) -> impl Iterator<Item = ZoomLevel> + '_ {
        self.appearances.keys().copied()
    }

    pub fn has_level(&self, level: ZoomLevel) -> bool {
        level == 0 || self.appearances.contains_key(&level)
    }

    /// Registers the appearance shown at `level`. Level 0 is reserved for the original.
    pub fn set_appearance(&mut self, level: ZoomLevel, appearance: Appearance) {
        if level == 0 {
            log::warn!("Appearance level 0 is the original appearance and cannot be replaced");
            return;
        }
        self.appearances.insert(level, appearance);
    }

    pub fn remove_appearance(&mut self, level: ZoomLevel) -> Option<Appearance> {
        self.appearances.remove(&level)
    }

    /// Sets a hook that runs right before every transition to a level above 0.
    pub fn set_before_transition(&mut self, hook: impl FnMut(&mut Visual, ZoomLevel) + 'static) {
        self.before_transition = Some(Box::new(hook));
    }

    pub fn save_original(&mut self, visual: &Visual) {
        self.original = Some(Recipe::capture(visual));
    }

    /// Drains the geometry and material handles detached by past transitions.
    pub fn take_released(&mut self) -> Vec<ReleasedResource> {
        std::mem::take(&mut self.released)
    }

    /// Switches the visual to an appearance level.
    ///
    /// Returns false and leaves the level unchanged if the level is not
    /// registered or a child to re-attach is `claimed_elsewhere`. Either all
    /// recipes involved are applied or none.
    ///
    /// # Arguments
    /// * `restore_first` - Restore the original before applying the target level
    /// * `claimed_elsewhere` - Whether a child object currently belongs to another object
    pub fn transition(
        &mut self,
        visual: &mut Visual,
        level: ZoomLevel,
        restore_first: bool,
        claimed_elsewhere: &dyn Fn(ObjectId) -> bool,
    ) -> bool {
        if level == 0 {
            return self.restore_original(visual, claimed_elsewhere);
        }

        if !self.appearances.contains_key(&level) {
            log::debug!("No appearance registered for level {}", level);
            return false;
        }
        if self.original.is_none() {
            self.save_original(visual);
        }

        let appearance = self.appearances.get(&level);
        let mut checks = appearance.and_then(Appearance::recipe).into_iter().collect::<Vec<_>>();
        if restore_first {
            checks.extend(self.original.as_ref());
        }
        for recipe in checks {
            if let Err(err) = recipe.check_children(claimed_elsewhere) {
                log::warn!("Refusing transition to level {}: {}", level, err);
                return false;
            }
        }

        if let Some(hook) = self.before_transition.as_mut() {
            hook(visual, level);
        }

        let mut released = Vec::new();
        if restore_first {
            if let Some(original) = &self.original {
                released.push(original.apply(visual));
            }
        }
        if let Some(appearance) = self.appearances.get_mut(&level) {
            released.push(appearance.activate(visual));
        }

        self.level = level;
        self.collect_released(visual, &released);
        true
    }

    fn restore_original(&mut self, visual: &mut Visual, claimed_elsewhere: &dyn Fn(ObjectId) -> bool) -> bool {
        let Some(original) = &self.original else {
            // First visit of level 0 only takes the snapshot
            self.save_original(visual);
            self.level = 0;
            return true;
        };

        if let Err(err) = original.check_children(claimed_elsewhere) {
            log::warn!("Refusing to restore original appearance: {}", err);
            return false;
        }
        let released = original.apply(visual);
        self.level = 0;
        self.collect_released(visual, &[released]);
        true
    }

    /// Keeps detached handles that nothing can bring back.
    fn collect_released(&mut self, visual: &Visual, released: &[ReleasedHandles]) {
        for resource in released.iter().flat_map(ReleasedHandles::resources) {
            let in_use = match resource {
                ReleasedResource::Geometry(id) => visual.geometry == Some(id),
                ReleasedResource::Material(id) => visual.material == Some(id),
            };
            let referenced = self.original.iter().any(|recipe| recipe.references(resource))
                || self
                    .appearances
                    .values()
                    .filter_map(Appearance::recipe)
                    .any(|recipe| recipe.references(resource));
            if !in_use && !referenced && !self.released.contains(&resource) {
                self.released.push(resource);
            }
        }
    }
}

/// Capability of objects whose appearance follows the camera distance.
///
/// Implementors own a [`ZoomState`] next to their [`Visual`] and expose both;
/// every other method has a default.
pub trait ZoomableObject {
    /// Mutable access to the zoom state and the visual it drives.
    fn zoom_parts_mut(&mut self) -> (&mut ZoomState, &mut Visual);

    fn zoom_state(&self) -> &ZoomState;

    fn visual(&self) -> &Visual;

    /// Point used for clustering and camera distance.
    fn world_position(&self) -> Point3<f32> {
        Point3::from_vec(self.visual().position)
    }

    /// Radius of a sphere around [`world_position`](Self::world_position) enclosing the object.
    fn bounding_radius(&self) -> f32 {
        let visual = self.visual();
        let size = visual.dimensions;
        let scale = visual.scale;
        cgmath::Vector3::new(size.x * scale.x, size.y * scale.y, size.z * scale.z).magnitude() / 2.0
    }

    fn appearance_level(&self) -> ZoomLevel {
        self.zoom_state().level()
    }

    fn set_appearance(&mut self, level: ZoomLevel, appearance: Appearance) {
        self.zoom_parts_mut().0.set_appearance(level, appearance);
    }

    /// Snapshots the current visual as the level 0 appearance.
    fn save_original_appearance(&mut self) {
        let (state, visual) = self.zoom_parts_mut();
        state.save_original(visual);
    }

    fn show_appearance(&mut self, level: ZoomLevel, restore_first: bool) -> bool {
        self.show_appearance_with(level, restore_first, &|_| false)
    }

    /// [`show_appearance`](Self::show_appearance) with knowledge of children owned by other objects.
    fn show_appearance_with(
        &mut self,
        level: ZoomLevel,
        restore_first: bool,
        claimed_elsewhere: &dyn Fn(ObjectId) -> bool,
    ) -> bool {
        let (state, visual) = self.zoom_parts_mut();
        state.transition(visual, level, restore_first, claimed_elsewhere)
    }

    fn take_released_resources(&mut self) -> Vec<ReleasedResource> {
        self.zoom_parts_mut().0.take_released()
    }
}

/// A plain zoomable object: a visual and its zoom state.
#[derive(Debug, Default)]
pub struct ZoomableMesh {
    pub visual: Visual,
    pub state: ZoomState,
}

impl ZoomableMesh {
    pub fn new(visual: Visual) -> Self {
        Self {
            visual,
            state: ZoomState::new(),
        }
    }
}

impl ZoomableObject for ZoomableMesh {
    fn zoom_parts_mut(&mut self) -> (&mut ZoomState, &mut Visual) {
        (&mut self.state, &mut self.visual)
    }

    fn zoom_state(&self) -> &ZoomState {
        &self.state
    }

    fn visual(&self) -> &Visual {
        &self.visual
    }
}
