use std::fmt;

use cgmath::{Vector3, Zero};
use codecity_common::RgbColor;

use crate::error::AppearanceError;

/// Handle of a geometry owned by the host renderer.
pub type GeometryId = u32;
/// Handle of a material owned by the host renderer.
pub type MaterialId = u32;
/// Identity of a scene object that can be attached as a child.
pub type ObjectId = u64;

/// The visual properties an appearance can change.
#[derive(Debug, Clone, PartialEq)]
pub struct Visual {
    pub visible: bool,
    pub position: Vector3<f32>,
    /// Box dimensions (width, height, depth).
    pub dimensions: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub color: RgbColor,
    pub geometry: Option<GeometryId>,
    pub material: Option<MaterialId>,
    pub children: Vec<ObjectId>,
}

impl Default for Visual {
    fn default() -> Self {
        Self {
            visible: true,
            position: Vector3::zero(),
            dimensions: Vector3::new(1.0, 1.0, 1.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            color: RgbColor::WHITE,
            geometry: None,
            material: None,
            children: Vec::new(),
        }
    }
}

/// Per-axis patch of a vector field. Unset axes are left untouched.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct AxisPatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
}

impl AxisPatch {
    pub fn all(value: Vector3<f32>) -> Self {
        Self {
            x: Some(value.x),
            y: Some(value.y),
            z: Some(value.z),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }

    fn apply(&self, target: &mut Vector3<f32>, absolute: bool) {
        let apply_axis = |axis: &mut f32, value: Option<f32>| {
            if let Some(value) = value {
                if absolute {
                    *axis = value;
                } else {
                    *axis += value;
                }
            }
        };
        apply_axis(&mut target.x, self.x);
        apply_axis(&mut target.y, self.y);
        apply_axis(&mut target.z, self.z);
    }
}

/// Geometry and material handles that an appearance change detached from an object.
///
/// Nothing is disposed automatically. The owner of the handles decides.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ReleasedHandles {
    pub geometry: Option<GeometryId>,
    pub material: Option<MaterialId>,
}

impl ReleasedHandles {
    /// Handles present in `before` that are no longer used by `after`.
    pub fn between(before: &Visual, after: &Visual) -> Self {
        Self {
            geometry: before.geometry.filter(|&g| after.geometry != Some(g)),
            material: before.material.filter(|&m| after.material != Some(m)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_none() && self.material.is_none()
    }

    pub fn resources(&self) -> impl Iterator<Item = ReleasedResource> {
        self.geometry
            .map(ReleasedResource::Geometry)
            .into_iter()
            .chain(self.material.map(ReleasedResource::Material))
    }
}

/// A sparse patch of visual properties.
///
/// Only fields that are set take part in [`apply`](Recipe::apply). With
/// `values_are_abs` the set fields overwrite the visual; otherwise position,
/// dimensions and scale are added to the current values. The flag covers the
/// whole recipe. Visibility, color, handles and children are always set
/// outright. A handle field of `Some(None)` detaches the handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recipe {
    pub visible: Option<bool>,
    pub position: AxisPatch,
    pub dimensions: AxisPatch,
    pub scale: AxisPatch,
    pub color: Option<RgbColor>,
    pub geometry: Option<Option<GeometryId>>,
    pub material: Option<Option<MaterialId>>,
    /// Replaces all current children with this list, in order.
    pub children: Option<Vec<ObjectId>>,
    pub values_are_abs: bool,
}

impl Recipe {
    /// An empty recipe whose set fields are added to the current values.
    pub fn delta() -> Self {
        Self::default()
    }

    /// An empty recipe whose set fields overwrite the current values.
    pub fn absolute() -> Self {
        Self {
            values_are_abs: true,
            ..Self::default()
        }
    }

    /// Snapshot of every field of a visual, in absolute mode.
    pub fn capture(visual: &Visual) -> Self {
        Self {
            visible: Some(visual.visible),
            position: AxisPatch::all(visual.position),
            dimensions: AxisPatch::all(visual.dimensions),
            scale: AxisPatch::all(visual.scale),
            color: Some(visual.color),
            geometry: Some(visual.geometry),
            material: Some(visual.material),
            children: Some(visual.children.clone()),
            values_are_abs: true,
        }
    }

    // ========== Builders ==========

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.position = AxisPatch::all(position);
        self
    }

    pub fn with_position_y(mut self, y: f32) -> Self {
        self.position.y = Some(y);
        self
    }

    pub fn with_dimensions(mut self, dimensions: Vector3<f32>) -> Self {
        self.dimensions = AxisPatch::all(dimensions);
        self
    }

    pub fn with_height(mut self, height: f32) -> Self {
        self.dimensions.y = Some(height);
        self
    }

    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = AxisPatch::all(scale);
        self
    }

    pub fn with_color(mut self, color: RgbColor) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_geometry(mut self, geometry: GeometryId) -> Self {
        self.geometry = Some(Some(geometry));
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(Some(material));
        self
    }

    /// Detaches the geometry on apply.
    pub fn without_geometry(mut self) -> Self {
        self.geometry = Some(None);
        self
    }

    /// Detaches the material on apply.
    pub fn without_material(mut self) -> Self {
        self.material = Some(None);
        self
    }

    pub fn with_children(mut self, children: Vec<ObjectId>) -> Self {
        self.children = Some(children);
        self
    }

    // ========== Application ==========

    /// Fails if a child the recipe would re-attach is claimed by another object.
    pub fn check_children(&self, claimed_elsewhere: &dyn Fn(ObjectId) -> bool) -> Result<(), AppearanceError> {
        match self
            .children
            .iter()
            .flatten()
            .copied()
            .find(|&child| claimed_elsewhere(child))
        {
            Some(child) => Err(AppearanceError::ChildReparented { child }),
            None => Ok(()),
        }
    }

    /// Applies the set fields to a visual.
    ///
    /// Returns the geometry and material handles the visual no longer uses.
    pub fn apply(&self, visual: &mut Visual) -> ReleasedHandles {
        let mut released = ReleasedHandles::default();

        if let Some(visible) = self.visible {
            visual.visible = visible;
        }
        self.position.apply(&mut visual.position, self.values_are_abs);
        self.dimensions.apply(&mut visual.dimensions, self.values_are_abs);
        self.scale.apply(&mut visual.scale, self.values_are_abs);
        if let Some(color) = self.color {
            visual.color = color;
        }
        if let Some(geometry) = self.geometry {
            released.geometry = std::mem::replace(&mut visual.geometry, geometry).filter(|&old| Some(old) != geometry);
        }
        if let Some(material) = self.material {
            released.material = std::mem::replace(&mut visual.material, material).filter(|&old| Some(old) != material);
        }
        if let Some(children) = &self.children {
            visual.children.clear();
            visual.children.extend_from_slice(children);
        }
        released
    }

    /// True if the recipe refers to a geometry or material handle.
    pub fn references(&self, handle: ReleasedResource) -> bool {
        match handle {
            ReleasedResource::Geometry(id) => self.geometry == Some(Some(id)),
            ReleasedResource::Material(id) => self.material == Some(Some(id)),
        }
    }
}

/// A handle detached from a zoomable object, ready for disposal by its owner.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReleasedResource {
    Geometry(GeometryId),
    Material(MaterialId),
}

/// What happens when an object enters an appearance level.
pub enum Appearance {
    Recipe(Recipe),
    /// Arbitrary change of the visual for effects a recipe cannot express.
    Callback(Box<dyn FnMut(&mut Visual)>),
}

impl Appearance {
    pub fn callback(f: impl FnMut(&mut Visual) + 'static) -> Self {
        Appearance::Callback(Box::new(f))
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        match self {
            Appearance::Recipe(recipe) => Some(recipe),
            Appearance::Callback(_) => None,
        }
    }

    /// Applies the appearance and returns the handles it detached.
    pub fn activate(&mut self, visual: &mut Visual) -> ReleasedHandles {
        match self {
            Appearance::Recipe(recipe) => recipe.apply(visual),
            Appearance::Callback(callback) => {
                let before = visual.clone();
                callback(visual);
                ReleasedHandles::between(&before, visual)
            }
        }
    }
}

impl From<Recipe> for Appearance {
    fn from(recipe: Recipe) -> Self {
        Appearance::Recipe(recipe)
    }
}

impl fmt::Debug for Appearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Appearance::Recipe(recipe) => f.debug_tuple("Recipe").field(recipe).finish(),
            Appearance::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecity_common::EPSILON;

    fn sample_visual() -> Visual {
        Visual {
            visible: true,
            position: Vector3::new(1.0, 2.0, 3.0),
            dimensions: Vector3::new(4.0, 5.0, 6.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            color: RgbColor::from_hex(0x3e14a0),
            geometry: Some(10),
            material: Some(20),
            children: vec![100, 101],
        }
    }

    #[test]
    fn test_unset_fields_are_untouched() {
        let mut visual = sample_visual();
        Recipe::absolute().with_color(RgbColor::WHITE).apply(&mut visual);

        let mut expected = sample_visual();
        expected.color = RgbColor::WHITE;
        assert_eq!(visual, expected);
    }

    #[test]
    fn test_delta_adds_vectors() {
        let mut visual = sample_visual();
        Recipe::delta()
            .with_position(Vector3::new(1.0, -1.0, 0.5))
            .with_scale(Vector3::new(0.5, 0.0, 0.0))
            .apply(&mut visual);

        assert!((visual.position.x - 2.0).abs() < EPSILON);
        assert!((visual.position.y - 1.0).abs() < EPSILON);
        assert!((visual.position.z - 3.5).abs() < EPSILON);
        assert!((visual.scale.x - 1.5).abs() < EPSILON);
        assert!((visual.scale.y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_absolute_overwrites_single_axis() {
        let mut visual = sample_visual();
        Recipe::absolute().with_position_y(9.0).with_height(0.5).apply(&mut visual);

        assert_eq!(visual.position, Vector3::new(1.0, 9.0, 3.0));
        assert_eq!(visual.dimensions, Vector3::new(4.0, 0.5, 6.0));
    }

    #[test]
    fn test_capture_then_apply_restores_exactly() {
        let original = sample_visual();
        let snapshot = Recipe::capture(&original);

        let mut visual = original.clone();
        Recipe::delta()
            .with_position(Vector3::new(0.1, 0.2, 0.3))
            .with_scale(Vector3::new(2.0, 2.0, 2.0))
            .with_visible(false)
            .apply(&mut visual);
        Recipe::absolute().with_geometry(11).with_material(21).apply(&mut visual);
        snapshot.apply(&mut visual);

        assert_eq!(visual, original);
    }

    #[test]
    fn test_replaced_handles_are_reported() {
        let mut visual = sample_visual();
        let released = Recipe::absolute().with_geometry(11).with_material(20).apply(&mut visual);

        assert_eq!(released.geometry, Some(10));
        // Same material again is not a release
        assert_eq!(released.material, None);
        assert_eq!(visual.geometry, Some(11));
    }

    #[test]
    fn test_capture_restores_missing_handles() {
        let bare = Visual::default();
        let snapshot = Recipe::capture(&bare);

        let mut visual = bare.clone();
        Recipe::absolute().with_geometry(5).with_material(6).apply(&mut visual);
        let released = snapshot.apply(&mut visual);

        assert_eq!(visual.geometry, None);
        assert_eq!(visual.material, None);
        let released: Vec<_> = released.resources().collect();
        assert_eq!(released, vec![ReleasedResource::Geometry(5), ReleasedResource::Material(6)]);
    }

    #[test]
    fn test_without_geometry_detaches() {
        let mut visual = sample_visual();
        let released = Recipe::delta().without_geometry().apply(&mut visual);

        assert_eq!(visual.geometry, None);
        assert_eq!(visual.material, Some(20));
        assert_eq!(released.geometry, Some(10));
        assert!(!Recipe::delta().without_geometry().references(ReleasedResource::Geometry(10)));
    }

    #[test]
    fn test_children_replaced_verbatim() {
        let mut visual = sample_visual();
        Recipe::absolute().with_children(vec![7, 5, 7]).apply(&mut visual);

        assert_eq!(visual.children, vec![7, 5, 7]);
    }

    #[test]
    fn test_children_check_reports_reparented_child() {
        let recipe = Recipe::absolute().with_children(vec![100, 101]);

        assert_eq!(
            recipe.check_children(&|child| child == 101),
            Err(AppearanceError::ChildReparented { child: 101 })
        );
        assert_eq!(recipe.check_children(&|_| false), Ok(()));
        assert_eq!(Recipe::absolute().check_children(&|_| true), Ok(()));
    }

    #[test]
    fn test_callback_reports_released_handles() {
        let mut visual = sample_visual();
        let mut appearance = Appearance::callback(|visual| {
            visual.geometry = None;
            visual.scale.y = 3.0;
        });

        let released = appearance.activate(&mut visual);

        assert_eq!(released.geometry, Some(10));
        assert_eq!(released.material, None);
        assert_eq!(visual.scale.y, 3.0);
        assert_eq!(format!("{:?}", appearance), "Callback(..)");
    }
}
