//! Frustum and culling volumes
//!
//! Cameras describe what they can see as a [`Frustum`]; actors describe
//! where they are as a [`BoundingSphere`]. The scheduler only ever asks
//! whether the two intersect.

use crate::foundation::math::{Mat4, Vec3};

/// Plane defined by normal and distance from origin
///
/// Points with a positive signed distance are on the inner side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        let length = normal.magnitude();
        if length > f32::EPSILON {
            Self { normal: normal / length, distance: distance / length }
        } else {
            Self { normal, distance }
        }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Bounding sphere used to cull actors against a frustum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Sphere center in world space
    pub center: Vec3,
    /// Sphere radius
    pub radius: f32,
}

impl BoundingSphere {
    /// Create a new sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, bottom, top, near, far)
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix
    ///
    /// Gribb-Hartmann extraction: each plane is the sum or difference of the
    /// fourth row with one of the first three rows.
    pub fn from_matrix(view_projection: &Mat4) -> Self {
        let row = |i: usize| view_projection.row(i).transpose();
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        let plane = |v: nalgebra::Vector4<f32>| Plane::new(Vec3::new(v.x, v.y, v.z), v.w);

        Self {
            planes: [
                plane(r3 + r0),
                plane(r3 - r0),
                plane(r3 + r1),
                plane(r3 - r1),
                plane(r3 + r2),
                plane(r3 - r2),
            ],
        }
    }

    /// Frustum that contains everything
    pub fn infinite() -> Self {
        let open = Plane { normal: Vec3::zeros(), distance: 1.0 };
        Self { planes: [open; 6] }
    }

    /// Test if a sphere intersects the frustum
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(sphere.center) >= -sphere.radius)
    }

    /// Test if a point is inside the frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_matrix_gives_unit_cube() {
        let frustum = Frustum::from_matrix(&Mat4::identity());

        assert!(frustum.contains_point(Vec3::zeros()));
        assert!(frustum.contains_point(Vec3::new(0.99, -0.99, 0.5)));
        assert!(!frustum.contains_point(Vec3::new(1.5, 0.0, 0.0)));
        for plane in &frustum.planes {
            assert_relative_eq!(plane.normal.magnitude(), 1.0);
            assert_relative_eq!(plane.distance, 1.0);
        }
    }

    #[test]
    fn test_sphere_outside_is_rejected() {
        let frustum = Frustum::from_matrix(&Mat4::identity());

        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(5.0, 0.0, 0.0), 1.0)));
        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::zeros(), 0.5)));
        // Straddles the right plane
        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(1.5, 0.0, 0.0), 1.0)));
    }

    #[test]
    fn test_scaled_projection_shrinks_frustum() {
        let frustum = Frustum::from_matrix(&Mat4::new_scaling(2.0));

        assert!(frustum.contains_point(Vec3::new(0.4, 0.0, 0.0)));
        assert!(!frustum.contains_point(Vec3::new(0.6, 0.0, 0.0)));
    }

    #[test]
    fn test_infinite_frustum_accepts_everything() {
        let frustum = Frustum::infinite();
        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(1.0e6, 0.0, 0.0), 0.0)));
    }
}
