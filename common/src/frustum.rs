use cgmath::{Matrix4, Point3, Vector3};

use crate::{Aabb, Plane, EPSILON};

/// A view frustum represented as six outward-facing planes.
///
/// A point is inside when it lies on the inside (negative signed distance)
/// of every plane.
#[derive(Debug, Clone)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the 6 frustum planes from a view-projection matrix.
    ///
    /// Uses the Gribb/Hartmann method. The planes are ordered:
    /// Left, Right, Bottom, Top, Near, Far. The extracted normals point inward,
    /// so they are negated to keep the outward convention of [`Plane`].
    pub fn from_view_projection(view_proj: &Matrix4<f32>) -> Self {
        // cgmath is column-major, rows are gathered across columns
        let row0 = Vector3::new(view_proj[0][0], view_proj[1][0], view_proj[2][0]);
        let row1 = Vector3::new(view_proj[0][1], view_proj[1][1], view_proj[2][1]);
        let row2 = Vector3::new(view_proj[0][2], view_proj[1][2], view_proj[2][2]);
        let row3 = Vector3::new(view_proj[0][3], view_proj[1][3], view_proj[2][3]);

        let w0 = view_proj[3][0];
        let w1 = view_proj[3][1];
        let w2 = view_proj[3][2];
        let w3 = view_proj[3][3];

        // A degenerate row bounds nothing
        let plane = |v: Vector3<f32>, w: f32| {
            Plane::from_equation(-v.x, -v.y, -v.z, -w).unwrap_or(Plane {
                normal: Vector3::unit_y(),
                distance: f32::NEG_INFINITY,
            })
        };

        Self {
            planes: [
                plane(row3 + row0, w3 + w0),
                plane(row3 - row0, w3 - w0),
                plane(row3 + row1, w3 + w1),
                plane(row3 - row1, w3 - w1),
                plane(row3 + row2, w3 + w2),
                plane(row3 - row2, w3 - w2),
            ],
        }
    }

    /// Returns the planes defining this frustum.
    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// Tests if a point is inside the frustum.
    pub fn contains_point(&self, point: Point3<f32>) -> bool {
        self.planes.iter().all(|plane| plane.contains_point(point))
    }

    /// Tests if a sphere touches the frustum.
    pub fn intersects_sphere(&self, center: Point3<f32>, radius: f32) -> bool {
        !self.planes.iter().any(|plane| plane.excludes_sphere(center, radius))
    }

    /// Tests if an AABB intersects the frustum (broad-phase test).
    ///
    /// Conservative: it may report boxes near the frustum corners as intersecting,
    /// but never rejects a box that actually intersects.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let corners = aabb.corners();
        !self.planes.iter().any(|plane| {
            corners
                .iter()
                .all(|corner| plane.signed_distance(*corner) > EPSILON)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{perspective, Deg};

    fn looking_down_negative_z() -> Frustum {
        let view = Matrix4::look_at_rh(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, -1.0),
            Vector3::unit_y(),
        );
        let proj = perspective(Deg(60.0), 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn test_frustum_contains_point_in_front() {
        let frustum = looking_down_negative_z();

        assert!(frustum.contains_point(Point3::new(0.0, 0.0, -5.0)));
        assert!(!frustum.contains_point(Point3::new(0.0, 0.0, 5.0)));
        assert!(!frustum.contains_point(Point3::new(0.0, 0.0, -500.0)));
        assert!(!frustum.contains_point(Point3::new(50.0, 0.0, -5.0)));
    }

    #[test]
    fn test_frustum_sphere_straddling_side_plane() {
        let frustum = looking_down_negative_z();

        // Center outside to the right, radius reaches back in
        assert!(frustum.intersects_sphere(Point3::new(4.0, 0.0, -5.0), 2.0));
        assert!(!frustum.intersects_sphere(Point3::new(40.0, 0.0, -5.0), 2.0));
    }

    #[test]
    fn test_frustum_intersects_aabb() {
        let frustum = looking_down_negative_z();

        let inside = Aabb::new(Point3::new(-1.0, -1.0, -6.0), Point3::new(1.0, 1.0, -4.0));
        let behind = Aabb::new(Point3::new(-1.0, -1.0, 4.0), Point3::new(1.0, 1.0, 6.0));

        assert!(frustum.intersects_aabb(&inside));
        assert!(!frustum.intersects_aabb(&behind));
    }
}
