use std::collections::HashMap;

use cgmath::{Point3, Vector3};
use codecity_common::Aabb;

use crate::model::EntityId;

/// Geometric placement of one box, produced by an external layouter.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoxLayout {
    pub center: Point3<f32>,
    pub width: f32,
    pub height: f32,
    pub depth: f32,
    pub level: u32,
}

/// Layout of every entity of one structural revision, keyed by entity id.
pub type LayoutMap = HashMap<EntityId, BoxLayout>;

impl BoxLayout {
    pub fn new(center: Point3<f32>, width: f32, height: f32, depth: f32, level: u32) -> Self {
        Self {
            center,
            width,
            height,
            depth,
            level,
        }
    }

    /// Width, height and depth as a vector.
    pub fn size(&self) -> Vector3<f32> {
        Vector3::new(self.width, self.height, self.depth)
    }

    /// Y coordinate of the top face.
    pub fn top_y(&self) -> f32 {
        self.center.y + self.height / 2.0
    }

    /// Y coordinate of the bottom face.
    pub fn bottom_y(&self) -> f32 {
        self.center.y - self.height / 2.0
    }

    pub fn bounding(&self) -> Aabb {
        Aabb::from_center_size(self.center, self.size())
    }
}

/// Per-instance label attribute: where a label's text sits in the shared atlas.
///
/// All values are relative to the atlas texture size.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AtlasRegion {
    pub relative_width: f32,
    pub relative_height: f32,
    pub vertical_offset: f32,
}

/// Placement of one label.
///
/// Labels live in their own index space, which need not match the index of
/// the box that owns them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LabelLayout {
    pub label_index: usize,
    /// World-space extent of the label quad.
    pub width: f32,
    pub height: f32,
    pub atlas: AtlasRegion,
}

pub type LabelLayoutMap = HashMap<EntityId, LabelLayout>;

#[cfg(test)]
mod tests {
    use super::*;
    use codecity_common::EPSILON;

    #[test]
    fn test_box_layout_faces() {
        let layout = BoxLayout::new(Point3::new(0.0, 2.0, 0.0), 4.0, 1.0, 3.0, 1);

        assert!((layout.top_y() - 2.5).abs() < EPSILON);
        assert!((layout.bottom_y() - 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_box_layout_bounding() {
        let layout = BoxLayout::new(Point3::new(1.0, 0.0, -1.0), 2.0, 2.0, 2.0, 0);
        let bounds = layout.bounding();

        assert_eq!(bounds.min, Point3::new(0.0, -1.0, -2.0));
        assert_eq!(bounds.max, Point3::new(2.0, 1.0, 0.0));
    }
}
