//! Magic-window engine options.
//!
//! Every field is optional when deserialising; missing fields take the
//! defaults below.  Out-of-range filter constants are clamped (with a
//! warning) by [`MagicOptions::sanitized`] rather than rejected.

use rdk_perception::OrientationFilter;
use rdk_perception::filter::{DEFAULT_DEAD_ZONE, DEFAULT_SMOOTHING_FACTOR};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which physical camera to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, looking at the world.
    #[default]
    Environment,
    /// Front camera, looking at the user.
    User,
}

/// Constraints passed to [`MediaDevices::get_user_media`][crate::platform::MediaDevices::get_user_media].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
    pub facing_mode: FacingMode,
    pub ideal_width: Option<u32>,
    pub ideal_height: Option<u32>,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: false,
            facing_mode: FacingMode::Environment,
            ideal_width: None,
            ideal_height: None,
        }
    }
}

/// Options for [`MagicBackend`][crate::engine::MagicBackend].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagicOptions {
    /// Track device orientation.  When off the backend is camera
    /// passthrough only.
    pub enable_orientation: bool,
    /// Drive the camera rotation from orientation relative to the first
    /// reading.
    pub enable_world_anchoring: bool,
    /// Interpolation weight per tick, in `(0, 1]`.  Lower is smoother but
    /// lags more.
    pub smoothing_factor: f32,
    /// Changes smaller than this many degrees are ignored.
    pub dead_zone: f32,
    pub media_constraints: MediaConstraints,
}

impl Default for MagicOptions {
    fn default() -> Self {
        Self {
            enable_orientation: true,
            enable_world_anchoring: true,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            dead_zone: DEFAULT_DEAD_ZONE,
            media_constraints: MediaConstraints::default(),
        }
    }
}

impl MagicOptions {
    /// Clamp the filter constants into range, warning about each change.
    pub fn sanitized(mut self) -> Self {
        let filter = OrientationFilter::new(self.smoothing_factor, self.dead_zone);

        if filter.smoothing_factor() != self.smoothing_factor {
            warn!(
                requested = self.smoothing_factor,
                applied = filter.smoothing_factor(),
                "smoothing_factor outside (0, 1]; clamped"
            );
            self.smoothing_factor = filter.smoothing_factor();
        }
        if filter.dead_zone() != self.dead_zone {
            warn!(
                requested = self.dead_zone,
                applied = filter.dead_zone(),
                "dead_zone below zero; clamped"
            );
            self.dead_zone = filter.dead_zone();
        }
        self
    }

    /// Filter built from these options.
    pub fn filter(&self) -> OrientationFilter {
        OrientationFilter::new(self.smoothing_factor, self.dead_zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = MagicOptions::default();
        assert!(opts.enable_orientation);
        assert!(opts.enable_world_anchoring);
        assert!((opts.smoothing_factor - 0.15).abs() < f32::EPSILON);
        assert!((opts.dead_zone - 0.5).abs() < f32::EPSILON);
        assert_eq!(opts.media_constraints.facing_mode, FacingMode::Environment);
        assert!(opts.media_constraints.video);
        assert!(!opts.media_constraints.audio);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let opts: MagicOptions = toml::from_str(
            r#"
            smoothing_factor = 0.3
            [media_constraints]
            facing_mode = "user"
            "#,
        )
        .unwrap();
        assert!((opts.smoothing_factor - 0.3).abs() < f32::EPSILON);
        assert!((opts.dead_zone - 0.5).abs() < f32::EPSILON);
        assert_eq!(opts.media_constraints.facing_mode, FacingMode::User);
        assert!(opts.media_constraints.video);
    }

    #[test]
    fn sanitized_clamps_out_of_range_values() {
        let opts = MagicOptions {
            smoothing_factor: 1.5,
            dead_zone: -2.0,
            ..MagicOptions::default()
        }
        .sanitized();
        assert!((opts.smoothing_factor - 1.0).abs() < f32::EPSILON);
        assert_eq!(opts.dead_zone, 0.0);

        let zero = MagicOptions {
            smoothing_factor: 0.0,
            ..MagicOptions::default()
        }
        .sanitized();
        assert!(zero.smoothing_factor > 0.0);
    }

    #[test]
    fn sanitized_keeps_valid_values() {
        let opts = MagicOptions {
            smoothing_factor: 0.4,
            dead_zone: 1.0,
            ..MagicOptions::default()
        };
        assert_eq!(opts.clone().sanitized(), opts);
        let filter = opts.filter();
        assert!((filter.smoothing_factor() - 0.4).abs() < f32::EPSILON);
        assert!((filter.dead_zone() - 1.0).abs() < f32::EPSILON);
    }
}
