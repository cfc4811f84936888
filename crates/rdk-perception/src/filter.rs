//! Orientation filter.
//!
//! Turns raw device-orientation angles into a stable estimate:
//!
//! - **Dead zone** – a change smaller than the threshold is treated as no
//!   change, which removes sensor jitter while the device is at rest.
//! - **Exponential smoothing** – every tick the estimate moves a fixed
//!   fraction of the way toward the (dead-zoned) target:
//!
//! ```text
//! smoothed ← smoothed + (target − smoothed) × factor
//! ```
//!
//! `alpha` is a compass heading in `[0, 360)`, so both the dead zone and the
//! interpolation use the shortest signed arc: 359° → 1° is +2°, not −358°.
//!
//! The module also converts device angles into a camera-frame quaternion
//! (see [`device_quaternion`]).
//!
//! # Example
//!
//! ```rust
//! use rdk_perception::filter::OrientationFilter;
//! use rdk_types::OrientationSample;
//!
//! let filter = OrientationFilter::new(0.5, 0.5);
//! let next = filter.step(
//!     OrientationSample::new(359.0, 0.0, 0.0),
//!     OrientationSample::new(1.0, 0.0, 0.0),
//! );
//! assert!(next.alpha.abs() < 1e-4); // crossed 0°, not 180°
//! ```

use std::f32::consts::FRAC_1_SQRT_2;

use rdk_types::OrientationSample;

use crate::transform::{EulerOrder, Quaternion, Vec3};

/// Default interpolation weight per tick.
pub const DEFAULT_SMOOTHING_FACTOR: f32 = 0.15;

/// Default dead-zone threshold in degrees.
pub const DEFAULT_DEAD_ZONE: f32 = 0.5;

// ────────────────────────────────────────────────────────────────────────────
// Scalar helpers
// ────────────────────────────────────────────────────────────────────────────

/// Shortest signed delta from `from` to `to`, in degrees, in `[-180, 180)`.
pub fn shortest_angle_delta(from: f32, to: f32) -> f32 {
    let delta = ((to - from) % 360.0) + 360.0;
    ((delta + 180.0) % 360.0) - 180.0
}

/// Linear interpolation.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Interpolate between two headings along the shortest arc; the result is
/// wrapped into `[0, 360)`.
pub fn lerp_angle(a: f32, b: f32, t: f32) -> f32 {
    let wrapped = (a + shortest_angle_delta(a, b) * t).rem_euclid(360.0);
    // rem_euclid can round a tiny negative up to exactly 360.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

// ────────────────────────────────────────────────────────────────────────────
// Device → camera rotation
// ────────────────────────────────────────────────────────────────────────────

/// Camera-frame rotation for a device orientation reading.
///
/// Standard device-orientation convention: Euler `(beta, alpha, −gamma)` in
/// Y-X-Z order, then a fixed −90° about X (device-upright frame to
/// camera-forward frame), then `−screen_angle_deg` about Z to compensate for
/// the current screen orientation.
pub fn device_quaternion(sample: OrientationSample, screen_angle_deg: f32) -> Quaternion {
    let euler = Quaternion::from_euler(
        sample.beta.to_radians(),
        sample.alpha.to_radians(),
        -sample.gamma.to_radians(),
        EulerOrder::Yxz,
    );
    let basis = Quaternion::new(FRAC_1_SQRT_2, -FRAC_1_SQRT_2, 0.0, 0.0);
    let screen = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), -screen_angle_deg.to_radians());
    euler.mul(basis).mul(screen)
}

// ────────────────────────────────────────────────────────────────────────────
// OrientationFilter
// ────────────────────────────────────────────────────────────────────────────

/// Dead-zone + exponential-smoothing filter over [`OrientationSample`]s.
///
/// Both constants are fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationFilter {
    smoothing_factor: f32,
    dead_zone: f32,
}

impl Default for OrientationFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_FACTOR, DEFAULT_DEAD_ZONE)
    }
}

impl OrientationFilter {
    /// Create a filter.
    ///
    /// `smoothing_factor` is clamped to `(0, 1]` (a factor of zero would
    /// freeze the estimate); `dead_zone` is clamped to `≥ 0`.
    pub fn new(smoothing_factor: f32, dead_zone: f32) -> Self {
        let smoothing_factor = if smoothing_factor.is_nan() {
            DEFAULT_SMOOTHING_FACTOR
        } else {
            smoothing_factor.clamp(f32::EPSILON, 1.0)
        };
        let dead_zone = if dead_zone.is_nan() { 0.0 } else { dead_zone.max(0.0) };
        Self {
            smoothing_factor,
            dead_zone,
        }
    }

    pub fn smoothing_factor(&self) -> f32 {
        self.smoothing_factor
    }

    pub fn dead_zone(&self) -> f32 {
        self.dead_zone
    }

    /// Return `target` unless it differs from `current` by less than the
    /// dead zone, in which case `current` is returned.  `circular` selects
    /// shortest-arc comparison (for the heading).
    pub fn apply_dead_zone(&self, current: f32, target: f32, circular: bool) -> f32 {
        let delta = if circular {
            shortest_angle_delta(current, target).abs()
        } else {
            (target - current).abs()
        };
        if delta < self.dead_zone { current } else { target }
    }

    /// Advance `smoothed` one tick toward `raw`.
    pub fn step(&self, smoothed: OrientationSample, raw: OrientationSample) -> OrientationSample {
        let target_alpha = self.apply_dead_zone(smoothed.alpha, raw.alpha, true);
        let target_beta = self.apply_dead_zone(smoothed.beta, raw.beta, false);
        let target_gamma = self.apply_dead_zone(smoothed.gamma, raw.gamma, false);

        OrientationSample {
            alpha: lerp_angle(smoothed.alpha, target_alpha, self.smoothing_factor),
            beta: lerp(smoothed.beta, target_beta, self.smoothing_factor),
            gamma: lerp(smoothed.gamma, target_gamma, self.smoothing_factor),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(alpha: f32, beta: f32, gamma: f32) -> OrientationSample {
        OrientationSample::new(alpha, beta, gamma)
    }

    #[test]
    fn shortest_delta_wraps_both_ways() {
        assert!((shortest_angle_delta(359.0, 1.0) - 2.0).abs() < 1e-4);
        assert!((shortest_angle_delta(1.0, 359.0) + 2.0).abs() < 1e-4);
        assert!((shortest_angle_delta(10.0, 40.0) - 30.0).abs() < 1e-4);
        assert!((shortest_angle_delta(0.0, 720.0)).abs() < 1e-4);
    }

    #[test]
    fn lerp_angle_crosses_zero_not_180() {
        let a = lerp_angle(359.0, 1.0, 0.25);
        assert!((a - 359.5).abs() < 1e-3, "got {a}");
        let b = lerp_angle(359.0, 1.0, 0.75);
        assert!((b - 0.5).abs() < 1e-3, "got {b}");
    }

    #[test]
    fn lerp_angle_stays_in_range() {
        for t in [0.0, 0.1, 0.5, 0.9, 1.0] {
            let v = lerp_angle(350.0, 20.0, t);
            assert!((0.0..360.0).contains(&v), "t={t} gave {v}");
        }
    }

    #[test]
    fn dead_zone_holds_small_changes() {
        let filter = OrientationFilter::new(0.15, 0.5);
        let before = sample(120.0, 10.0, -5.0);
        let raw = sample(120.4, 10.3, -5.49);
        assert_eq!(filter.step(before, raw), before);
    }

    #[test]
    fn dead_zone_uses_circular_delta_for_alpha() {
        let filter = OrientationFilter::new(0.15, 0.5);
        let before = sample(359.9, 0.0, 0.0);
        // 0.2° away across the wrap: inside the dead zone.
        let after = filter.step(before, sample(0.1, 0.0, 0.0));
        assert_eq!(after, before);
    }

    #[test]
    fn dead_zone_threshold_is_exclusive() {
        let filter = OrientationFilter::new(1.0, 0.5);
        assert_eq!(filter.apply_dead_zone(0.0, 0.5, false), 0.5);
        assert_eq!(filter.apply_dead_zone(0.0, 0.49, false), 0.0);
    }

    #[test]
    fn circular_step_moves_through_zero() {
        let filter = OrientationFilter::new(0.5, 0.5);
        let next = filter.step(sample(359.0, 0.0, 0.0), sample(1.0, 0.0, 0.0));
        // +2° × 0.5 = +1° → 360° → wrapped to 0°.
        assert!(next.alpha < 1e-3 || next.alpha > 359.999, "got {}", next.alpha);
        let filter = OrientationFilter::new(0.15, 0.5);
        let next = filter.step(sample(359.0, 0.0, 0.0), sample(1.0, 0.0, 0.0));
        assert!((next.alpha - 359.3).abs() < 1e-3, "got {}", next.alpha);
    }

    #[test]
    fn smoothing_converges_monotonically_without_dead_zone() {
        let filter = OrientationFilter::new(0.15, 0.0);
        let raw = sample(90.0, 45.0, -30.0);
        let mut s = OrientationSample::ZERO;
        let mut last_err = f32::MAX;
        for _ in 0..200 {
            s = filter.step(s, raw);
            let err = (raw.beta - s.beta).abs() + (raw.gamma - s.gamma).abs();
            assert!(err <= last_err, "moved away from the target: {err} > {last_err}");
            last_err = err;
        }
        assert!((s.alpha - 90.0).abs() < 1e-3);
        assert!((s.beta - 45.0).abs() < 1e-3);
        assert!((s.gamma + 30.0).abs() < 1e-3);
    }

    #[test]
    fn smoothing_settles_within_dead_zone() {
        let filter = OrientationFilter::new(0.15, 0.5);
        let raw = sample(0.0, 20.0, 0.0);
        let mut s = OrientationSample::ZERO;
        for _ in 0..500 {
            s = filter.step(s, raw);
        }
        assert!((raw.beta - s.beta).abs() < 0.5);
        // Once settled it no longer moves.
        assert_eq!(filter.step(s, raw), s);
    }

    #[test]
    fn constructor_clamps_constants() {
        let f = OrientationFilter::new(3.0, -1.0);
        assert_eq!(f.smoothing_factor(), 1.0);
        assert_eq!(f.dead_zone(), 0.0);
        let f = OrientationFilter::new(0.0, 0.5);
        assert!(f.smoothing_factor() > 0.0);
        let f = OrientationFilter::new(f32::NAN, f32::NAN);
        assert_eq!(f.smoothing_factor(), DEFAULT_SMOOTHING_FACTOR);
        assert_eq!(f.dead_zone(), 0.0);
    }

    // ── device_quaternion ───────────────────────────────────────────────────

    #[test]
    fn upright_device_looks_forward() {
        // beta = 90°: device held upright, camera looks down −Z.
        let q = device_quaternion(sample(0.0, 90.0, 0.0), 0.0);
        assert!(q.angle_to(Quaternion::identity()) < 1e-4, "{q:?}");
    }

    #[test]
    fn flat_device_looks_down() {
        let q = device_quaternion(OrientationSample::ZERO, 0.0);
        let forward = q.rotate(Vec3::new(0.0, 0.0, -1.0));
        assert!((forward.y + 1.0).abs() < 1e-5, "{forward:?}");
    }

    #[test]
    fn relative_yaw_of_flat_device_rolls_about_view_axis() {
        let initial = device_quaternion(sample(10.0, 0.0, 0.0), 0.0);
        let current = device_quaternion(sample(40.0, 0.0, 0.0), 0.0);
        let relative = initial.inverse().mul(current);
        let v = relative.rotate(Vec3::new(1.0, 0.0, 0.0));
        let (s, c) = 30f32.to_radians().sin_cos();
        assert!((v.x - c).abs() < 1e-4 && (v.y - s).abs() < 1e-4 && v.z.abs() < 1e-4, "{v:?}");
    }

    #[test]
    fn screen_rotation_is_compensated() {
        let portrait = device_quaternion(sample(0.0, 90.0, 0.0), 0.0);
        let landscape = device_quaternion(sample(0.0, 90.0, 0.0), 90.0);
        let diff = portrait.inverse().mul(landscape);
        let expected = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), -std::f32::consts::FRAC_PI_2);
        assert!(diff.angle_to(expected) < 1e-4);
    }
}
