//! `rdk-perception` – orientation math.
//!
//! Turns raw device-orientation readings into stable camera rotations.
//!
//! # Modules
//!
//! - [`transform`] – [`Vec3`][transform::Vec3],
//!   [`Quaternion`][transform::Quaternion] and
//!   [`Transform3D`][transform::Transform3D]: the small amount of 3-D math
//!   the session layer needs (Euler conversion, look-at, slerp).
//! - [`filter`] – [`OrientationFilter`][filter::OrientationFilter]: dead-zone
//!   plus exponential smoothing over orientation samples, and the
//!   device-to-camera quaternion conversion.

pub mod filter;
pub mod transform;

pub use filter::{OrientationFilter, device_quaternion};
pub use transform::{EulerOrder, Quaternion, Transform3D, Vec3};
