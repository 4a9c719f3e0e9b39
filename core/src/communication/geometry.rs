use cgmath::{EuclideanSpace, InnerSpace, Matrix4, MetricSpace, Point3, Quaternion, Rotation3, SquareMatrix, Vector3};
use codecity_common::{RgbColor, EPSILON};
use codecity_scene::Mesh;

use crate::config::RenderConfig;

/// Endpoints of one communication relative to its application's origin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CommunicationLayout {
    pub start: Point3<f32>,
    pub end: Point3<f32>,
    pub line_thickness: f32,
}

impl CommunicationLayout {
    pub fn new(start: Point3<f32>, end: Point3<f32>, line_thickness: f32) -> Self {
        Self {
            start,
            end,
            line_thickness,
        }
    }

    pub fn midpoint(&self) -> Point3<f32> {
        self.start.midpoint(self.end)
    }

    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RenderMode {
    /// A class calling itself, drawn as a sphere at the source.
    Recursive,
    Straight,
    /// Quadratic Bezier lifted by the configured curve height.
    Curved,
}

/// Evaluates a quadratic Bezier curve at `t` in `[0, 1]`.
pub fn quadratic_bezier(start: Point3<f32>, control: Point3<f32>, end: Point3<f32>, t: f32) -> Point3<f32> {
    let s = 1.0 - t;
    Point3::from_vec(start.to_vec() * (s * s) + control.to_vec() * (2.0 * s * t) + end.to_vec() * (t * t))
}

/// Rotation taking `from` onto the unit vector `to`.
fn rotation_between(from: Vector3<f32>, to: Vector3<f32>) -> Matrix4<f32> {
    if to.magnitude2() < EPSILON {
        return Matrix4::identity();
    }
    Matrix4::from(Quaternion::from_arc(from, to.normalize(), None))
}

/// Tessellated shape of one communication.
#[derive(Debug)]
pub struct CommunicationGeometry {
    pub mode: RenderMode,
    /// Center line of the communication, relative to the application origin.
    pub path: Vec<Point3<f32>>,
    /// Bezier control point of curved communications.
    pub control_point: Option<Point3<f32>>,
    /// Mesh in local space; `transform` places it.
    pub mesh: Mesh,
    pub transform: Matrix4<f32>,
}

impl CommunicationGeometry {
    /// Builds the geometry for a layout.
    ///
    /// # Arguments
    /// * `layout` - Endpoints and line thickness
    /// * `recursive` - Whether source and target are the same class
    /// * `config` - Curve height, curve segment count and sphere radius
    pub fn build(layout: &CommunicationLayout, recursive: bool, config: &RenderConfig) -> Self {
        let radius = layout.line_thickness / 2.0;
        let radial_segments = config.tube_radial_segments;

        if recursive {
            return Self {
                mode: RenderMode::Recursive,
                path: vec![layout.start],
                control_point: None,
                mesh: Mesh::sphere(config.recursive_sphere_radius, 16, 12),
                transform: Matrix4::from_translation(layout.start.to_vec()),
            };
        }

        if config.curve_height.abs() <= EPSILON {
            // One segment along local +Z, rotated and moved onto the path
            let half = layout.length() / 2.0;
            let local = [Point3::new(0.0, 0.0, -half), Point3::new(0.0, 0.0, half)];
            return Self {
                mode: RenderMode::Straight,
                path: vec![layout.start, layout.end],
                control_point: None,
                mesh: Mesh::tube(&local, radius, radial_segments),
                transform: Matrix4::from_translation(layout.midpoint().to_vec())
                    * rotation_between(Vector3::unit_z(), layout.end - layout.start),
            };
        }

        let mut control = layout.midpoint();
        control.y += config.curve_height;
        let segments = config.curve_segments.max(1);
        let path: Vec<Point3<f32>> = (0..=segments)
            .map(|i| quadratic_bezier(layout.start, control, layout.end, i as f32 / segments as f32))
            .collect();

        Self {
            mode: RenderMode::Curved,
            mesh: Mesh::tube(&path, radius, radial_segments),
            path,
            control_point: Some(control),
            transform: Matrix4::identity(),
        }
    }

    /// Number of tube segments; 0 for the recursive sphere.
    pub fn segment_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn path_length(&self) -> f32 {
        self.path.windows(2).map(|pair| pair[0].distance(pair[1])).sum()
    }

    /// Point and unit direction at a fraction of the arc length.
    pub fn point_along(&self, fraction: f32) -> Option<(Point3<f32>, Vector3<f32>)> {
        let total = self.path_length();
        if total <= EPSILON {
            return None;
        }

        let mut remaining = total * fraction.clamp(0.0, 1.0);
        for pair in self.path.windows(2) {
            let length = pair[0].distance(pair[1]);
            if length <= EPSILON {
                continue;
            }
            let direction = (pair[1] - pair[0]) / length;
            if remaining <= length {
                return Some((pair[0] + direction * remaining, direction));
            }
            remaining -= length;
        }

        let last = self.path.len() - 1;
        let direction = (self.path[last] - self.path[last - 1]).normalize();
        Some((self.path[last], direction))
    }
}

/// Direction marker drawn on a communication.
///
/// All arrows share one unit cone pointing up (+Y); [`transform`](Arrow::transform)
/// orients and scales it.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrow {
    pub position: Point3<f32>,
    /// Unit vector the arrow points to.
    pub direction: Vector3<f32>,
    pub head_width: f32,
    pub head_length: f32,
    pub color: RgbColor,
    pub transparent: bool,
    pub opacity: f32,
}

impl Arrow {
    /// Arrows sit slightly past the middle so opposing arrows do not overlap.
    pub const PATH_FRACTION: f32 = 0.51;

    pub const MIN_HEAD_WIDTH: f32 = 0.5;

    /// The geometry every arrow instance shares.
    pub fn unit_geometry() -> Mesh {
        Mesh::cone(0.5, 1.0, 16)
    }

    /// Places an arrow on a path, or `None` if the path has no length.
    ///
    /// # Arguments
    /// * `geometry` - The communication to decorate
    /// * `width` - Requested head width, at least [`MIN_HEAD_WIDTH`](Self::MIN_HEAD_WIDTH)
    /// * `reverse` - Point from target to source
    pub fn along(geometry: &CommunicationGeometry, width: f32, reverse: bool, color: RgbColor) -> Option<Self> {
        let fraction = if reverse {
            1.0 - Self::PATH_FRACTION
        } else {
            Self::PATH_FRACTION
        };
        let (position, direction) = geometry.point_along(fraction)?;
        let head_width = width.max(Self::MIN_HEAD_WIDTH);
        let head_length = (2.0 * head_width).min(0.3 * geometry.path_length());

        Some(Self {
            position,
            direction: if reverse { -direction } else { direction },
            head_width,
            head_length,
            color,
            transparent: false,
            opacity: 1.0,
        })
    }

    pub fn transform(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position.to_vec())
            * rotation_between(Vector3::unit_y(), self.direction)
            * Matrix4::from_nonuniform_scale(self.head_width, self.head_length, self.head_width)
    }

    pub fn set_transparent(&mut self, transparent: bool, opacity: f32) {
        self.transparent = transparent;
        self.opacity = if transparent { opacity } else { 1.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Transform;

    fn layout() -> CommunicationLayout {
        CommunicationLayout::new(Point3::new(0.0, 1.0, 0.0), Point3::new(6.0, 1.0, 8.0), 0.4)
    }

    fn curved_config() -> RenderConfig {
        RenderConfig {
            curve_height: 3.0,
            ..RenderConfig::default()
        }
    }

    // ===== Straight =====

    #[test]
    fn test_straight_has_one_segment_of_full_length() {
        let geometry = CommunicationGeometry::build(&layout(), false, &RenderConfig::default());

        assert_eq!(geometry.mode, RenderMode::Straight);
        assert_eq!(geometry.segment_count(), 1);
        assert!((geometry.path_length() - 10.0).abs() < EPSILON);

        let size = geometry.mesh.bounding().unwrap().size();
        assert!((size.z - 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_straight_transform_maps_tube_onto_endpoints() {
        let geometry = CommunicationGeometry::build(&layout(), false, &RenderConfig::default());

        let start = geometry.transform.transform_point(Point3::new(0.0, 0.0, -5.0));
        let end = geometry.transform.transform_point(Point3::new(0.0, 0.0, 5.0));
        assert!(start.distance(Point3::new(0.0, 1.0, 0.0)) < 1e-4);
        assert!(end.distance(Point3::new(6.0, 1.0, 8.0)) < 1e-4);
    }

    #[test]
    fn test_straight_pointing_backwards() {
        let layout = CommunicationLayout::new(Point3::new(0.0, 0.0, 5.0), Point3::new(0.0, 0.0, -5.0), 0.2);
        let geometry = CommunicationGeometry::build(&layout, false, &RenderConfig::default());

        let end = geometry.transform.transform_point(Point3::new(0.0, 0.0, 5.0));
        assert!(end.distance(Point3::new(0.0, 0.0, -5.0)) < 1e-4);
    }

    // ===== Curved =====

    #[test]
    fn test_curved_control_point_is_lifted_midpoint() {
        let layout = layout();
        let geometry = CommunicationGeometry::build(&layout, false, &curved_config());

        let control = geometry.control_point.unwrap();
        assert_eq!(geometry.mode, RenderMode::Curved);
        assert!((control.y - (layout.midpoint().y + 3.0)).abs() < EPSILON);
        assert!((control.x - 3.0).abs() < EPSILON);
        assert_eq!(geometry.segment_count(), 20);
    }

    #[test]
    fn test_curved_path_runs_through_endpoints() {
        let geometry = CommunicationGeometry::build(&layout(), false, &curved_config());

        assert_eq!(geometry.path.first(), Some(&Point3::new(0.0, 1.0, 0.0)));
        assert_eq!(geometry.path.last(), Some(&Point3::new(6.0, 1.0, 8.0)));
        // Curve peak is half the control point's lift
        let peak = geometry.path[10];
        assert!((peak.y - 2.5).abs() < EPSILON);
        assert!(geometry.path_length() > 10.0);
    }

    #[test]
    fn test_bezier_endpoints() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let c = Point3::new(1.0, 4.0, 0.0);
        let b = Point3::new(2.0, 0.0, 0.0);

        assert_eq!(quadratic_bezier(a, c, b, 0.0), a);
        assert_eq!(quadratic_bezier(a, c, b, 1.0), b);
        assert_eq!(quadratic_bezier(a, c, b, 0.5), Point3::new(1.0, 2.0, 0.0));
    }

    // ===== Recursive =====

    #[test]
    fn test_recursive_is_sphere_at_source() {
        let config = RenderConfig::default();
        let geometry = CommunicationGeometry::build(&layout(), true, &config);

        assert_eq!(geometry.mode, RenderMode::Recursive);
        assert_eq!(geometry.segment_count(), 0);
        let center = geometry.transform.transform_point(Point3::new(0.0, 0.0, 0.0));
        assert_eq!(center, Point3::new(0.0, 1.0, 0.0));
        let size = geometry.mesh.bounding().unwrap().size();
        assert!((size.y - 2.0 * config.recursive_sphere_radius).abs() < 1e-4);
    }

    // ===== Arrows =====

    #[test]
    fn test_arrow_sits_past_middle() {
        let geometry = CommunicationGeometry::build(&layout(), false, &RenderConfig::default());
        let arrow = Arrow::along(&geometry, 1.0, false, RgbColor::BLACK).unwrap();

        assert!((arrow.position.x - 6.0 * 0.51).abs() < 1e-4);
        assert!((arrow.position.z - 8.0 * 0.51).abs() < 1e-4);
        assert!((arrow.direction - Vector3::new(0.6, 0.0, 0.8)).magnitude() < 1e-4);
    }

    #[test]
    fn test_reverse_arrow_mirrors_forward_arrow() {
        let geometry = CommunicationGeometry::build(&layout(), false, &RenderConfig::default());
        let forward = Arrow::along(&geometry, 1.0, false, RgbColor::BLACK).unwrap();
        let reverse = Arrow::along(&geometry, 1.0, true, RgbColor::BLACK).unwrap();

        assert!((reverse.direction + forward.direction).magnitude() < 1e-4);
        assert!((reverse.position.x - 6.0 * 0.49).abs() < 1e-4);
    }

    #[test]
    fn test_arrow_head_clamping() {
        let geometry = CommunicationGeometry::build(&layout(), false, &RenderConfig::default());

        let thin = Arrow::along(&geometry, 0.1, false, RgbColor::BLACK).unwrap();
        assert_eq!(thin.head_width, 0.5);
        assert_eq!(thin.head_length, 1.0);

        // 0.3 * path length caps the head on short paths
        let short = CommunicationLayout::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0), 0.2);
        let geometry = CommunicationGeometry::build(&short, false, &RenderConfig::default());
        let wide = Arrow::along(&geometry, 2.0, false, RgbColor::BLACK).unwrap();
        assert_eq!(wide.head_width, 2.0);
        assert!((wide.head_length - 0.6).abs() < EPSILON);
    }

    #[test]
    fn test_arrow_transform_points_cone_along_direction() {
        let geometry = CommunicationGeometry::build(&layout(), false, &RenderConfig::default());
        let arrow = Arrow::along(&geometry, 1.0, false, RgbColor::BLACK).unwrap();

        let apex = arrow.transform().transform_point(Point3::new(0.0, 0.5, 0.0));
        let expected = arrow.position + arrow.direction * (arrow.head_length / 2.0);
        assert!(apex.distance(expected) < 1e-4);
    }

    #[test]
    fn test_recursive_has_no_arrow() {
        let geometry = CommunicationGeometry::build(&layout(), true, &RenderConfig::default());

        assert!(Arrow::along(&geometry, 1.0, false, RgbColor::BLACK).is_none());
    }

    #[test]
    fn test_arrow_transparency() {
        let geometry = CommunicationGeometry::build(&layout(), false, &RenderConfig::default());
        let mut arrow = Arrow::along(&geometry, 1.0, false, RgbColor::BLACK).unwrap();

        arrow.set_transparent(true, 0.1);
        assert!(arrow.transparent);
        assert_eq!(arrow.opacity, 0.1);
        arrow.set_transparent(false, 0.1);
        assert_eq!(arrow.opacity, 1.0);
    }
}
