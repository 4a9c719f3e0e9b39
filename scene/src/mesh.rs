//! CPU-side triangle meshes shared by instanced entities and communications.
//!
//! Every generator produces geometry centered at the origin (or along the given
//! polyline for tubes). Instances place the shared geometry through their own
//! transform, so box and label meshes are unit-sized.

use std::cell::Cell;
use std::f32::consts::PI;

use cgmath::{InnerSpace, Point3, Vector3};
use codecity_common::Aabb;

/// Index type used for mesh index buffers.
pub type MeshIndex = u16;

/// Vertex with position, texture coordinates and normal.
///
/// `#[repr(C)]` and `Pod` so vertex slices can be uploaded without conversion.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

/// An indexed triangle list.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<MeshIndex>,
    /// Cached local-space axis-aligned bounding box
    cached_bounding: Cell<Option<Aabb>>,
}

impl Mesh {
    /// Creates a mesh from raw vertex and triangle index data.
    pub fn from_raw(vertices: Vec<Vertex>, indices: Vec<MeshIndex>) -> Self {
        Self {
            vertices,
            indices,
            cached_bounding: Cell::new(None),
        }
    }

    /// Creates a box mesh centered at the origin.
    ///
    /// Each face gets its own four vertices so normals stay flat.
    ///
    /// # Arguments
    /// * `width` - Size along the X axis
    /// * `height` - Size along the Y axis
    /// * `depth` - Size along the Z axis
    pub fn box_mesh(width: f32, height: f32, depth: f32) -> Self {
        let hw = width / 2.0;
        let hh = height / 2.0;
        let hd = depth / 2.0;

        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [[-hw, -hh, hd], [hw, -hh, hd], [hw, hh, hd], [-hw, hh, hd]]),
            ([0.0, 0.0, -1.0], [[hw, -hh, -hd], [-hw, -hh, -hd], [-hw, hh, -hd], [hw, hh, -hd]]),
            ([0.0, 1.0, 0.0], [[-hw, hh, hd], [hw, hh, hd], [hw, hh, -hd], [-hw, hh, -hd]]),
            ([0.0, -1.0, 0.0], [[-hw, -hh, -hd], [hw, -hh, -hd], [hw, -hh, hd], [-hw, -hh, hd]]),
            ([1.0, 0.0, 0.0], [[hw, -hh, hd], [hw, -hh, -hd], [hw, hh, -hd], [hw, hh, hd]]),
            ([-1.0, 0.0, 0.0], [[-hw, -hh, -hd], [-hw, -hh, hd], [-hw, hh, hd], [-hw, hh, -hd]]),
        ];
        let uvs: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, corners) in &faces {
            let base = vertices.len() as MeshIndex;
            for (corner, uv) in corners.iter().zip(uvs) {
                vertices.push(Vertex {
                    position: *corner,
                    tex_coords: uv,
                    normal: *normal,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::from_raw(vertices, indices)
    }

    /// Creates a unit cube, the shared geometry of every entity box.
    pub fn unit_box() -> Self {
        Self::box_mesh(1.0, 1.0, 1.0)
    }

    /// Creates a quad in the XY plane facing +Z.
    ///
    /// Used as the shared label geometry; texture coordinates span the whole
    /// quad and are remapped per instance into the label atlas.
    pub fn quad(width: f32, height: f32) -> Self {
        let hw = width / 2.0;
        let hh = height / 2.0;
        let corner = |x: f32, y: f32, u: f32, v: f32| Vertex {
            position: [x, y, 0.0],
            tex_coords: [u, v],
            normal: [0.0, 0.0, 1.0],
        };

        Self::from_raw(
            vec![
                corner(-hw, -hh, 0.0, 1.0),
                corner(hw, -hh, 1.0, 1.0),
                corner(hw, hh, 1.0, 0.0),
                corner(-hw, hh, 0.0, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    /// Creates a UV sphere mesh centered at the origin.
    ///
    /// # Arguments
    /// * `radius` - Radius of the sphere
    /// * `segments` - Number of longitudinal segments (minimum 3)
    /// * `rings` - Number of latitudinal rings (minimum 2)
    pub fn sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);

        let mut vertices = Vec::new();
        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            for seg in 0..=segments {
                let theta = 2.0 * PI * seg as f32 / segments as f32;
                let normal = [phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()];
                vertices.push(Vertex {
                    position: normal.map(|n| n * radius),
                    tex_coords: [seg as f32 / segments as f32, ring as f32 / rings as f32],
                    normal,
                });
            }
        }

        let mut indices = Vec::new();
        let verts_per_ring = segments + 1;
        for ring in 0..rings {
            for seg in 0..segments {
                let current = ring * verts_per_ring + seg;
                let next = current + verts_per_ring;

                // Skip degenerate triangles at poles
                if ring != 0 {
                    indices.extend([current, next, current + 1].map(|i| i as MeshIndex));
                }
                if ring != rings - 1 {
                    indices.extend([current + 1, next, next + 1].map(|i| i as MeshIndex));
                }
            }
        }

        Self::from_raw(vertices, indices)
    }

    /// Creates a capped cone centered at the origin with its apex pointing up (+Y).
    ///
    /// # Arguments
    /// * `radius` - Radius of the base
    /// * `height` - Height of the cone
    /// * `segments` - Number of segments around the circumference (minimum 3)
    pub fn cone(radius: f32, height: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let half_height = height / 2.0;

        let slope = radius / height;
        let normal_y = slope / (1.0 + slope * slope).sqrt();
        let normal_xz = 1.0 / (1.0 + slope * slope).sqrt();

        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        // Side: base vertex and apex vertex per segment, so the apex normal matches
        for i in 0..=segments {
            let theta = 2.0 * PI * i as f32 / segments as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let normal = [normal_xz * cos_theta, normal_y, normal_xz * sin_theta];
            let u = i as f32 / segments as f32;

            vertices.push(Vertex {
                position: [radius * cos_theta, -half_height, radius * sin_theta],
                tex_coords: [u, 1.0],
                normal,
            });
            vertices.push(Vertex {
                position: [0.0, half_height, 0.0],
                tex_coords: [u, 0.0],
                normal,
            });
        }
        for i in 0..segments {
            let base = (i * 2) as MeshIndex;
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }

        // Bottom cap, winding reversed
        let center = vertices.len() as MeshIndex;
        vertices.push(Vertex {
            position: [0.0, -half_height, 0.0],
            tex_coords: [0.5, 0.5],
            normal: [0.0, -1.0, 0.0],
        });
        for i in 0..=segments {
            let theta = 2.0 * PI * i as f32 / segments as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            vertices.push(Vertex {
                position: [radius * cos_theta, -half_height, radius * sin_theta],
                tex_coords: [(cos_theta + 1.0) / 2.0, (1.0 - sin_theta) / 2.0],
                normal: [0.0, -1.0, 0.0],
            });
        }
        for i in 0..segments as MeshIndex {
            indices.extend_from_slice(&[center, center + i + 2, center + i + 1]);
        }

        Self::from_raw(vertices, indices)
    }

    /// Creates an open tube following a polyline.
    ///
    /// One ring of `radial_segments + 1` vertices is emitted per path point and
    /// consecutive rings are stitched together, so a path of `n` points yields
    /// `n - 1` tube segments. Paths with fewer than two distinct points produce
    /// an empty mesh.
    ///
    /// # Arguments
    /// * `path` - Points along the tube's center line
    /// * `radius` - Radius of the tube
    /// * `radial_segments` - Number of segments around the circumference (minimum 3)
    pub fn tube(path: &[Point3<f32>], radius: f32, radial_segments: u32) -> Self {
        let radial_segments = radial_segments.max(3);
        if path.len() < 2 {
            return Self::default();
        }

        let mut vertices = Vec::with_capacity(path.len() * (radial_segments as usize + 1));
        for (i, point) in path.iter().enumerate() {
            let before = path[i.saturating_sub(1)];
            let after = path[(i + 1).min(path.len() - 1)];
            let tangent = after - before;
            if tangent.magnitude2() == 0.0 {
                return Self::default();
            }
            let tangent = tangent.normalize();

            // Any axis not parallel to the tangent gives a usable frame
            let reference = if tangent.y.abs() < 0.99 {
                Vector3::unit_y()
            } else {
                Vector3::unit_x()
            };
            let side = tangent.cross(reference).normalize();
            let up = side.cross(tangent);

            let v = i as f32 / (path.len() - 1) as f32;
            for seg in 0..=radial_segments {
                let theta = 2.0 * PI * seg as f32 / radial_segments as f32;
                let normal = side * theta.cos() + up * theta.sin();
                let position = *point + normal * radius;
                vertices.push(Vertex {
                    position: position.into(),
                    tex_coords: [seg as f32 / radial_segments as f32, v],
                    normal: normal.into(),
                });
            }
        }

        let mut indices = Vec::new();
        let ring = radial_segments + 1;
        for i in 0..(path.len() as u32 - 1) {
            for seg in 0..radial_segments {
                let a = i * ring + seg;
                let b = a + ring;
                indices.extend([a, b, a + 1, a + 1, b, b + 1].map(|i| i as MeshIndex));
            }
        }

        Self::from_raw(vertices, indices)
    }

    // ========== Query methods ==========

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Triangle indices, three per triangle.
    pub fn indices(&self) -> &[MeshIndex] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Computes the local-space axis-aligned bounding box for a mesh.
    /// Returns None if the mesh has no vertices.
    pub fn bounding(&self) -> Option<Aabb> {
        let cached_bounding = self.cached_bounding.get();
        if cached_bounding.is_some() {
            return cached_bounding;
        }

        let positions: Vec<Point3<f32>> = self
            .vertices
            .iter()
            .map(|v| Point3::from(v.position))
            .collect();

        let bounding = Aabb::from_points(&positions);
        self.cached_bounding.set(bounding);
        bounding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecity_common::EPSILON;

    #[test]
    fn test_unit_box() {
        let mesh = Mesh::unit_box();

        assert_eq!(mesh.vertices().len(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        let bounds = mesh.bounding().unwrap();
        assert_eq!(bounds.min, Point3::new(-0.5, -0.5, -0.5));
        assert_eq!(bounds.max, Point3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_quad_faces_forward() {
        let mesh = Mesh::quad(2.0, 1.0);

        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.vertices().iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_sphere_radius() {
        let mesh = Mesh::sphere(2.0, 16, 8);

        for vertex in mesh.vertices() {
            let length = Vector3::from(vertex.position).magnitude();
            assert!((length - 2.0).abs() < 1e-4);
        }
        assert!(mesh.indices().iter().all(|&i| (i as usize) < mesh.vertices().len()));
    }

    #[test]
    fn test_cone_apex_and_base() {
        let mesh = Mesh::cone(0.5, 2.0, 8);
        let bounds = mesh.bounding().unwrap();

        assert!((bounds.max.y - 1.0).abs() < EPSILON);
        assert!((bounds.min.y + 1.0).abs() < EPSILON);
        assert!((bounds.max.x - 0.5).abs() < EPSILON);
    }

    // ===== Tube Tests =====

    #[test]
    fn test_tube_straight_segment() {
        let path = [Point3::new(0.0, 0.0, -2.0), Point3::new(0.0, 0.0, 2.0)];
        let mesh = Mesh::tube(&path, 0.1, 6);

        // Two rings of seven vertices, one segment of six quads
        assert_eq!(mesh.vertices().len(), 14);
        assert_eq!(mesh.triangle_count(), 12);
        let size = mesh.bounding().unwrap().size();
        assert!((size.z - 4.0).abs() < EPSILON);
        assert!((size.x - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_tube_segments_follow_path() {
        let path: Vec<Point3<f32>> = (0..=20).map(|i| Point3::new(i as f32, (i as f32).sin(), 0.0)).collect();
        let mesh = Mesh::tube(&path, 0.2, 4);

        assert_eq!(mesh.triangle_count(), 20 * 4 * 2);
    }

    #[test]
    fn test_tube_degenerate_path() {
        assert!(Mesh::tube(&[Point3::new(1.0, 1.0, 1.0)], 0.1, 6).is_empty());
        let same = Point3::new(1.0, 1.0, 1.0);
        assert!(Mesh::tube(&[same, same], 0.1, 6).is_empty());
    }
}
