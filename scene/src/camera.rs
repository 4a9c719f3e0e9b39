use cgmath::{InnerSpace, Matrix4, MetricSpace, Point3, Vector3};
use codecity_common::Frustum;

/// The camera state the semantic zoom decision reads each frame.
///
/// Nothing else about the camera is consulted: distances use [`position`],
/// culling uses the frustum built from the projection and view matrices.
///
/// [`position`]: ZoomCamera::position
pub trait ZoomCamera {
    /// Vertical field of view in degrees.
    fn fov(&self) -> f32;

    /// Camera position in world space.
    fn position(&self) -> Point3<f32>;

    /// Projection matrix in OpenGL clip-space convention.
    fn projection_matrix(&self) -> Matrix4<f32>;

    /// World-to-view transform (inverse of the camera's world matrix).
    fn view_matrix(&self) -> Matrix4<f32>;

    /// View frustum in world space.
    fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&(self.projection_matrix() * self.view_matrix()))
    }
}

/// Look-at camera orbiting a target, perspective or orthographic.
///
/// In orthographic mode the view height follows the eye to target distance
/// and `fovy`, so moving the eye still zooms.
///
/// ```
/// use cgmath::{Point3, Vector3};
/// use codecity_scene::{Camera, ZoomCamera};
///
/// let camera = Camera {
///     eye: Point3::new(0.0, 20.0, 40.0),
///     target: Point3::new(0.0, 0.0, 0.0),
///     up: Vector3::unit_y(),
///     aspect: 16.0 / 9.0,
///     fovy: 45.0,
///     znear: 0.1,
///     zfar: 1000.0,
///     ortho: false,
/// };
/// assert!(camera.frustum().contains_point(Point3::new(0.0, 0.0, 0.0)));
/// ```
#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Viewport width over height.
    pub aspect: f32,
    /// Vertical field of view in degrees.
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    pub ortho: bool,
}

impl Camera {
    fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.target, self.up)
    }

    fn projection(&self) -> Matrix4<f32> {
        if self.ortho {
            let half_height = self.length() * (self.fovy.to_radians() / 2.0).tan();
            let half_width = half_height * self.aspect;
            cgmath::ortho(-half_width, half_width, -half_height, half_height, self.znear, self.zfar)
        } else {
            cgmath::perspective(cgmath::Deg(self.fovy), self.aspect, self.znear, self.zfar)
        }
    }

    /// Unit vector from the eye towards the target.
    pub fn forward(&self) -> Vector3<f32> {
        (self.target - self.eye).normalize()
    }

    /// Distance from the eye to the target.
    pub fn length(&self) -> f32 {
        self.eye.distance(self.target)
    }
}

impl ZoomCamera for Camera {
    fn fov(&self) -> f32 {
        self.fovy
    }

    fn position(&self) -> Point3<f32> {
        self.eye
    }

    fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection()
    }

    fn view_matrix(&self) -> Matrix4<f32> {
        self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Transform};
    use codecity_common::EPSILON;

    fn create_test_camera() -> Camera {
        Camera {
            eye: Point3::new(0.0, 0.0, 5.0),
            target: Point3::new(0.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            aspect: 16.0 / 9.0,
            fovy: 45.0,
            znear: 0.1,
            zfar: 100.0,
            ortho: false,
        }
    }

    // ===== Camera Struct Tests =====

    #[test]
    fn test_camera_forward() {
        let forward = create_test_camera().forward();

        assert!(forward.x.abs() < EPSILON);
        assert!(forward.y.abs() < EPSILON);
        assert!((forward.z + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_camera_length() {
        let mut camera = create_test_camera();
        camera.eye = Point3::new(3.0, 4.0, 0.0);

        assert!((camera.length() - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_ortho_frustum_widens_with_distance() {
        let mut camera = create_test_camera();
        camera.ortho = true;
        let near_side = Point3::new(5.0, 0.0, 0.0);
        assert!(!camera.frustum().contains_point(near_side));

        camera.eye = Point3::new(0.0, 0.0, 20.0);
        assert!(camera.frustum().contains_point(near_side));
    }

    // ===== ZoomCamera Tests =====

    #[test]
    fn test_zoom_camera_view_matrix_is_world_inverse() {
        let camera = create_test_camera();
        let world = camera.view_matrix().invert().unwrap();
        let eye = world.transform_point(Point3::new(0.0, 0.0, 0.0));

        assert!((eye.z - 5.0).abs() < 1e-4);
        assert_eq!(camera.position(), camera.eye);
        assert_eq!(camera.fov(), 45.0);
    }

    #[test]
    fn test_zoom_camera_frustum() {
        let camera = create_test_camera();
        let frustum = camera.frustum();

        assert!(frustum.contains_point(Point3::new(0.0, 0.0, 0.0)));
        assert!(!frustum.contains_point(Point3::new(0.0, 0.0, 10.0)));
        assert!(!frustum.contains_point(Point3::new(0.0, 0.0, -200.0)));
    }
}
