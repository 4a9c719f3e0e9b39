use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3};

use crate::EPSILON;

/// Boundary of a half-space, `normal · p + distance = 0`.
///
/// The normal is unit length and points out of the half-space, so points
/// inside have a negative signed distance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub distance: f32,
}

impl Plane {
    /// Plane through `point` facing `normal`, which need not be unit length.
    pub fn new(normal: Vector3<f32>, point: Point3<f32>) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            distance: -normal.dot(point.to_vec()),
        }
    }

    /// Plane `a·x + b·y + c·z + d = 0`, rescaled to a unit normal.
    ///
    /// Returns `None` when `(a, b, c)` has no length.
    pub fn from_equation(a: f32, b: f32, c: f32, d: f32) -> Option<Self> {
        let normal = Vector3::new(a, b, c);
        let length = normal.magnitude();
        (length >= EPSILON).then(|| Self {
            normal: normal / length,
            distance: d / length,
        })
    }

    /// Positive outside, negative inside, zero on the plane.
    pub fn signed_distance(&self, point: Point3<f32>) -> f32 {
        self.normal.dot(point.to_vec()) + self.distance
    }

    pub fn contains_point(&self, point: Point3<f32>) -> bool {
        self.signed_distance(point) <= EPSILON
    }

    /// Whether a sphere lies entirely outside the half-space.
    pub fn excludes_sphere(&self, center: Point3<f32>, radius: f32) -> bool {
        self.signed_distance(center) > radius + EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_at(height: f32) -> Plane {
        // Outside is above the floor
        Plane::new(Vector3::new(0.0, 3.0, 0.0), Point3::new(1.0, height, -2.0))
    }

    #[test]
    fn test_plane_through_point() {
        let plane = floor_at(5.0);

        assert!((plane.normal.magnitude() - 1.0).abs() < EPSILON);
        assert!(plane.signed_distance(Point3::new(-7.0, 5.0, 12.0)).abs() < EPSILON);
        assert!((plane.signed_distance(Point3::new(0.0, 8.0, 0.0)) - 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_plane_from_equation() {
        let plane = Plane::from_equation(0.0, 0.0, -4.0, 8.0).unwrap();

        // -z + 2 = 0, outside towards -z
        assert_eq!(plane.normal, Vector3::new(0.0, 0.0, -1.0));
        assert!(plane.contains_point(Point3::new(0.0, 0.0, 3.0)));
        assert!(!plane.contains_point(Point3::new(0.0, 0.0, 1.0)));
        assert_eq!(Plane::from_equation(0.0, 0.0, 0.0, 1.0), None);
    }

    #[test]
    fn test_plane_excludes_sphere() {
        let plane = floor_at(0.0);

        assert!(plane.excludes_sphere(Point3::new(0.0, 3.0, 0.0), 1.0));
        assert!(!plane.excludes_sphere(Point3::new(0.0, 3.0, 0.0), 3.5));
        assert!(!plane.excludes_sphere(Point3::new(0.0, -3.0, 0.0), 0.1));
    }
}
