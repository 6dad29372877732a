//! SE3: 6-DOF rigid-body transformation (rotation + translation).
//!
//! Camera poses are stored as T_wc (camera-in-world): `transform_point`
//! maps camera-frame points into the world, `transform_to` maps world-frame
//! points into the camera.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};

/// 6-DOF rigid-body transformation: rotation + translation.
///
/// Transforms points as: p' = R * p + t
#[derive(Debug, Clone, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// Identity transformation (no rotation, no translation).
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Construct from rotation matrix and translation.
    pub fn from_rt(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rot3 = Rotation3::from_matrix_unchecked(rotation);
        Self {
            rotation: UnitQuaternion::from_rotation_matrix(&rot3),
            translation,
        }
    }

    /// Construct from quaternion (w, x, y, z) and translation.
    pub fn from_quaternion(qw: f64, qx: f64, qy: f64, qz: f64, translation: Vector3<f64>) -> Self {
        let rotation = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(qw, qx, qy, qz));
        Self {
            rotation,
            translation,
        }
    }

    /// Inverse transformation: (R, t)⁻¹ = (Rᵀ, -Rᵀ t).
    pub fn inverse(&self) -> Self {
        let rotation_inv = self.rotation.inverse();
        Self {
            rotation: rotation_inv,
            translation: -(rotation_inv * self.translation),
        }
    }

    /// Composition: (self ∘ other)(p) = self(other(p)).
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Transform a point from the local frame into the parent frame.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Transform a point from the parent frame into the local frame.
    ///
    /// For a camera pose T_wc this maps world points into the camera frame.
    pub fn transform_to(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse() * (p - self.translation)
    }

    /// Homogeneous 4x4 matrix [R | t; 0 | 1].
    pub fn matrix(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(self.rotation.to_rotation_matrix().matrix());
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_leaves_points_unchanged() {
        let p = Vector3::new(1.0, -2.0, 3.0);
        let id = SE3::identity();

        assert_relative_eq!(id.transform_point(&p), p, epsilon = 1e-12);
        assert_relative_eq!(id.transform_to(&p), p, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_to_inverts_transform_point() {
        let pose = SE3::from_quaternion(0.9, 0.1, -0.2, 0.3, Vector3::new(0.5, 1.0, -2.0));
        let p_local = Vector3::new(0.3, 0.7, 2.0);

        let p_parent = pose.transform_point(&p_local);
        assert_relative_eq!(pose.transform_to(&p_parent), p_local, epsilon = 1e-10);
    }

    #[test]
    fn test_inverse_composes_to_identity() {
        let pose = SE3::from_quaternion(1.0, 0.2, 0.1, -0.3, Vector3::new(-1.0, 2.0, 0.5));
        let composed = pose.compose(&pose.inverse());

        assert_relative_eq!(
            composed.translation,
            Vector3::zeros(),
            epsilon = 1e-10
        );
        assert_relative_eq!(composed.rotation.angle(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_matrix_round_trip() {
        let pose = SE3::from_quaternion(0.8, 0.0, 0.6, 0.0, Vector3::new(1.0, 2.0, 3.0));
        let m = pose.matrix();
        let p = Vector3::new(0.1, 0.2, 0.3);

        let p_h = m * p.push(1.0);
        assert_relative_eq!(p_h.xyz(), pose.transform_point(&p), epsilon = 1e-10);
    }
}
