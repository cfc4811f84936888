//! Spatial math primitives.
//!
//! `Copy` value types for 3-D vectors, unit quaternions and rigid-body
//! transforms with scale.  Conventions follow a right-handed, Y-up scene
//! graph: cameras look down −Z, quaternions are Hamilton quaternions stored
//! `(w, x, y, z)`, and composition `a.mul(b)` applies `b` first.
//!
//! # Example
//!
//! ```rust
//! use rdk_perception::transform::{Quaternion, Vec3};
//!
//! // 90° about +Y turns the forward axis (−Z) into −X.
//! let q = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), std::f32::consts::FRAC_PI_2);
//! let v = q.rotate(Vec3::new(0.0, 0.0, -1.0));
//! assert!((v.x + 1.0).abs() < 1e-5);
//! ```

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// A vector with every component set to `v`.
    pub fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero-length input.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len > 0.0 {
            self.scale(1.0 / len)
        } else {
            Self::zero()
        }
    }
}

/// Axis order used when building a rotation from Euler angles.
///
/// The order names the intrinsic rotation sequence: `Yxz` rotates about Y
/// first, then the new X, then the new Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EulerOrder {
    #[default]
    Xyz,
    Yxz,
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle_rad` about `axis` (normalised internally).
    pub fn from_axis_angle(axis: Vec3, angle_rad: f32) -> Self {
        let axis = axis.normalize();
        let (s, c) = (angle_rad * 0.5).sin_cos();
        Self::new(c, axis.x * s, axis.y * s, axis.z * s)
    }

    /// Rotation from Euler angles (radians) about X, Y and Z, applied in the
    /// given intrinsic `order`.
    pub fn from_euler(x: f32, y: f32, z: f32, order: EulerOrder) -> Self {
        let (s1, c1) = (x * 0.5).sin_cos();
        let (s2, c2) = (y * 0.5).sin_cos();
        let (s3, c3) = (z * 0.5).sin_cos();

        match order {
            EulerOrder::Xyz => Self::new(
                c1 * c2 * c3 - s1 * s2 * s3,
                s1 * c2 * c3 + c1 * s2 * s3,
                c1 * s2 * c3 - s1 * c2 * s3,
                c1 * c2 * s3 + s1 * s2 * c3,
            ),
            EulerOrder::Yxz => Self::new(
                c1 * c2 * c3 + s1 * s2 * s3,
                s1 * c2 * c3 + c1 * s2 * s3,
                c1 * s2 * c3 - s1 * c2 * s3,
                c1 * c2 * s3 - s1 * s2 * c3,
            ),
        }
    }

    /// Rotation whose columns are the orthonormal basis `(x_axis, y_axis,
    /// z_axis)`.
    pub fn from_basis(x_axis: Vec3, y_axis: Vec3, z_axis: Vec3) -> Self {
        let (m11, m12, m13) = (x_axis.x, y_axis.x, z_axis.x);
        let (m21, m22, m23) = (x_axis.y, y_axis.y, z_axis.y);
        let (m31, m32, m33) = (x_axis.z, y_axis.z, z_axis.z);
        let trace = m11 + m22 + m33;

        if trace > 0.0 {
            let s = 0.5 / (trace + 1.0).sqrt();
            Self::new(0.25 / s, (m32 - m23) * s, (m13 - m31) * s, (m21 - m12) * s)
        } else if m11 > m22 && m11 > m33 {
            let s = 2.0 * (1.0 + m11 - m22 - m33).sqrt();
            Self::new((m32 - m23) / s, 0.25 * s, (m12 + m21) / s, (m13 + m31) / s)
        } else if m22 > m33 {
            let s = 2.0 * (1.0 + m22 - m11 - m33).sqrt();
            Self::new((m13 - m31) / s, (m12 + m21) / s, 0.25 * s, (m23 + m32) / s)
        } else {
            let s = 2.0 * (1.0 + m33 - m11 - m22).sqrt();
            Self::new((m21 - m12) / s, (m13 + m31) / s, (m23 + m32) / s, 0.25 * s)
        }
    }

    /// Rotation that turns the local +Z axis toward `direction`, keeping
    /// local +Y as close to `up` as possible.  A zero `direction` yields the
    /// identity.
    pub fn look_rotation(direction: Vec3, up: Vec3) -> Self {
        let z_axis = direction.normalize();
        if z_axis.length() == 0.0 {
            return Self::identity();
        }
        let mut x_axis = up.cross(z_axis);
        if x_axis.length() < 1e-6 {
            // `up` is parallel to the view direction; nudge it.
            let nudged = if up.z.abs() < 0.999 {
                Vec3::new(0.0, 0.0, 1.0)
            } else {
                Vec3::new(1.0, 0.0, 0.0)
            };
            x_axis = nudged.cross(z_axis);
        }
        let x_axis = x_axis.normalize();
        let y_axis = z_axis.cross(x_axis);
        Self::from_basis(x_axis, y_axis, z_axis)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Inverse rotation.  Falls back to the identity for a zero quaternion.
    pub fn inverse(self) -> Self {
        let norm_sq = self.dot(self);
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq;
            Self::new(self.w * inv, -self.x * inv, -self.y * inv, -self.z * inv)
        } else {
            Self::identity()
        }
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.w * rhs.w + self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit quaternion in the same direction; identity for a zero input.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self::new(self.w / len, self.x / len, self.y / len, self.z / len)
        } else {
            Self::identity()
        }
    }

    /// Angle in radians of the rotation taking `self` to `other`.
    pub fn angle_to(self, other: Self) -> f32 {
        let d = self.conjugate().mul(other);
        let v = (d.x * d.x + d.y * d.y + d.z * d.z).sqrt();
        2.0 * v.atan2(d.w.abs())
    }

    /// Spherical linear interpolation from `self` toward `target` by `t`
    /// (0 = `self`, 1 = `target`), along the shorter arc.
    pub fn slerp(self, target: Self, t: f32) -> Self {
        if t <= 0.0 {
            return self;
        }
        if t >= 1.0 {
            return target;
        }

        let mut cos_half = self.dot(target);
        let target = if cos_half < 0.0 {
            cos_half = -cos_half;
            Self::new(-target.w, -target.x, -target.y, -target.z)
        } else {
            target
        };

        if cos_half >= 1.0 {
            return self;
        }

        let sin_sq = 1.0 - cos_half * cos_half;
        if sin_sq <= f32::EPSILON {
            // Nearly parallel: fall back to a normalised lerp.
            let s = 1.0 - t;
            return Self::new(
                s * self.w + t * target.w,
                s * self.x + t * target.x,
                s * self.y + t * target.y,
                s * self.z + t * target.z,
            )
            .normalize();
        }

        let sin_half = sin_sq.sqrt();
        let half = sin_half.atan2(cos_half);
        let ratio_a = ((1.0 - t) * half).sin() / sin_half;
        let ratio_b = (t * half).sin() / sin_half;

        Self::new(
            self.w * ratio_a + target.w * ratio_b,
            self.x * ratio_a + target.x * ratio_b,
            self.y * ratio_a + target.y * ratio_b,
            self.z * ratio_a + target.z * ratio_b,
        )
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        // Express v as a pure quaternion.
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// Local transform of a scene node: scale, then rotation, then translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub position: Vec3,
    pub rotation: Quaternion,
    pub scale: Vec3,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform3D {
    /// Create a unit-scale transform from a position and rotation.
    pub fn new(position: Vec3, rotation: Quaternion) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::splat(1.0),
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Map a point from local space into the parent space.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let scaled = Vec3::new(p.x * self.scale.x, p.y * self.scale.y, p.z * self.scale.z);
        self.position.add(self.rotation.rotate(scaled))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_2, FRAC_PI_4};

    fn assert_vec(v: Vec3, x: f32, y: f32, z: f32) {
        assert!((v.x - x).abs() < 1e-5, "x: got {}, want {x}", v.x);
        assert!((v.y - y).abs() < 1e-5, "y: got {}, want {y}", v.y);
        assert!((v.z - z).abs() < 1e-5, "z: got {}, want {z}", v.z);
    }

    // ── Vec3 ────────────────────────────────────────────────────────────────

    #[test]
    fn cross_of_x_and_y_is_z() {
        let z = Vec3::new(1.0, 0.0, 0.0).cross(Vec3::new(0.0, 1.0, 0.0));
        assert_vec(z, 0.0, 0.0, 1.0);
    }

    #[test]
    fn normalize_zero_vector_is_zero() {
        assert_eq!(Vec3::zero().normalize(), Vec3::zero());
        assert!((Vec3::new(3.0, 4.0, 0.0).normalize().length() - 1.0).abs() < 1e-6);
    }

    // ── Quaternion ──────────────────────────────────────────────────────────

    #[test]
    fn quaternion_identity_rotate_is_noop() {
        let r = Quaternion::identity().rotate(Vec3::new(1.0, 2.0, 3.0));
        assert_vec(r, 1.0, 2.0, 3.0);
    }

    #[test]
    fn quaternion_90deg_yaw_rotates_x_to_y() {
        // 90° rotation around Z axis: (cos45°, 0, 0, sin45°)
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        assert_vec(q.rotate(Vec3::new(1.0, 0.0, 0.0)), 0.0, 1.0, 0.0);
    }

    #[test]
    fn axis_angle_matches_literal_quaternion() {
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 2.0), FRAC_PI_2);
        assert!((q.w - FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((q.z - FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn conjugate_and_inverse_undo_rotation() {
        let q = Quaternion::from_axis_angle(Vec3::new(1.0, 1.0, 0.0), 0.7);
        for other in [q.conjugate(), q.inverse()] {
            let prod = q.mul(other);
            assert!((prod.w - 1.0).abs() < 1e-5);
            assert!(prod.x.abs() < 1e-5 && prod.y.abs() < 1e-5 && prod.z.abs() < 1e-5);
        }
    }

    #[test]
    fn euler_single_axis_matches_axis_angle() {
        let cases = [
            (Quaternion::from_euler(0.4, 0.0, 0.0, EulerOrder::Yxz), Vec3::new(1.0, 0.0, 0.0)),
            (Quaternion::from_euler(0.0, 0.4, 0.0, EulerOrder::Yxz), Vec3::new(0.0, 1.0, 0.0)),
            (Quaternion::from_euler(0.0, 0.0, 0.4, EulerOrder::Xyz), Vec3::new(0.0, 0.0, 1.0)),
        ];
        for (q, axis) in cases {
            let expected = Quaternion::from_axis_angle(axis, 0.4);
            assert!(q.angle_to(expected) < 1e-4, "{q:?} vs {expected:?}");
        }
    }

    #[test]
    fn euler_yxz_applies_yaw_before_pitch() {
        // Intrinsic Y then X == Ry * Rx.
        let q = Quaternion::from_euler(0.3, 0.5, 0.0, EulerOrder::Yxz);
        let ry = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.5);
        let rx = Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), 0.3);
        assert!(q.angle_to(ry.mul(rx)) < 1e-4);
    }

    #[test]
    fn slerp_endpoints_and_midpoint() {
        let a = Quaternion::identity();
        let b = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), FRAC_PI_2);
        assert_eq!(a.slerp(b, 0.0), a);
        assert_eq!(a.slerp(b, 1.0), b);

        let mid = a.slerp(b, 0.5);
        let expected = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), FRAC_PI_4);
        assert!(mid.angle_to(expected) < 1e-4);
        assert!((mid.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn slerp_takes_the_short_way_round() {
        let a = Quaternion::identity();
        let b = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.2);
        // Same rotation, opposite hemisphere.
        let b_neg = Quaternion::new(-b.w, -b.x, -b.y, -b.z);
        let step = a.slerp(b_neg, 0.5);
        assert!(step.angle_to(Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.1)) < 1e-4);
    }

    #[test]
    fn look_rotation_points_local_z_at_target() {
        let up = Vec3::new(0.0, 1.0, 0.0);
        // Looking at +Z is the identity.
        let q = Quaternion::look_rotation(Vec3::new(0.0, 0.0, 5.0), up);
        assert!(q.angle_to(Quaternion::identity()) < 1e-5);

        let q = Quaternion::look_rotation(Vec3::new(5.0, 0.0, 0.0), up);
        assert_vec(q.rotate(Vec3::new(0.0, 0.0, 1.0)), 1.0, 0.0, 0.0);
        assert_vec(q.rotate(up), 0.0, 1.0, 0.0);

        let q = Quaternion::look_rotation(Vec3::new(0.0, 0.0, -3.0), up);
        assert_vec(q.rotate(Vec3::new(0.0, 0.0, 1.0)), 0.0, 0.0, -1.0);
    }

    #[test]
    fn look_rotation_handles_degenerate_inputs() {
        let up = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(Quaternion::look_rotation(Vec3::zero(), up), Quaternion::identity());

        let q = Quaternion::look_rotation(Vec3::new(0.0, 2.0, 0.0), up);
        assert_vec(q.rotate(Vec3::new(0.0, 0.0, 1.0)), 0.0, 1.0, 0.0);
    }

    // ── Transform3D ─────────────────────────────────────────────────────────

    #[test]
    fn transform_point_applies_scale_rotation_translation() {
        let t = Transform3D::new(
            Vec3::new(1.0, 0.0, 0.0),
            Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2),
        )
        .with_scale(Vec3::splat(2.0));
        assert_vec(t.transform_point(Vec3::new(1.0, 0.0, 0.0)), 1.0, 2.0, 0.0);
    }

    #[test]
    fn identity_transform_has_unit_scale() {
        let t = Transform3D::identity();
        assert_eq!(t.scale, Vec3::splat(1.0));
        assert_eq!(t, Transform3D::default());
    }
}
