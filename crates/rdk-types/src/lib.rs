use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Category of a tracking or presentation backend.  At most one backend of
/// each kind can be live in a registry at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Fiducial-marker tracking (world-tracking strategy).
    Fiducial,
    /// GPS / compass geolocation tracking (world-tracking strategy).
    Geolocation,
    /// WebXR immersive session (presentation strategy).
    Immersive,
    /// Device-orientation "magic window" with camera passthrough
    /// (presentation strategy).
    Magic,
}

impl BackendKind {
    /// Number of backend kinds.
    pub const COUNT: usize = 4;

    /// Every kind, in registry slot order.
    pub const ALL: [BackendKind; Self::COUNT] = [
        BackendKind::Fiducial,
        BackendKind::Geolocation,
        BackendKind::Immersive,
        BackendKind::Magic,
    ];

    /// Stable slot index of this kind (`0..COUNT`).
    pub fn index(self) -> usize {
        match self {
            BackendKind::Fiducial => 0,
            BackendKind::Geolocation => 1,
            BackendKind::Immersive => 2,
            BackendKind::Magic => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Fiducial => "fiducial",
            BackendKind::Geolocation => "geolocation",
            BackendKind::Immersive => "immersive",
            BackendKind::Magic => "magic",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one registered backend instance.
///
/// Handed out by the registry on successful registration; a handle that
/// belongs to a replaced instance no longer matches anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendId(pub Uuid);

impl BackendId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BackendId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque handle to a passthrough video surface owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoHandle(pub u64);

/// Opaque handle to a camera media stream owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamHandle(pub u64);

/// Device-reported orientation angles, in degrees.
///
/// `alpha` is the compass heading in `[0, 360)`, `beta` the front-back tilt
/// in `[-180, 180)` and `gamma` the left-right tilt in `[-90, 90)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientationSample {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

impl OrientationSample {
    pub const ZERO: Self = Self {
        alpha: 0.0,
        beta: 0.0,
        gamma: 0.0,
    };

    pub fn new(alpha: f32, beta: f32, gamma: f32) -> Self {
        Self { alpha, beta, gamma }
    }

    /// Build a sample from a sensor reading whose components may be missing
    /// (platforms report `null` until the sensor has calibrated).  Missing
    /// components read as zero.
    pub fn from_nullable(alpha: Option<f32>, beta: Option<f32>, gamma: Option<f32>) -> Self {
        Self::new(
            alpha.unwrap_or(0.0),
            beta.unwrap_or(0.0),
            gamma.unwrap_or(0.0),
        )
    }

    /// `true` when all three components are exactly zero, i.e. the sensor
    /// has not produced a real reading yet.
    pub fn is_zero(&self) -> bool {
        self.alpha == 0.0 && self.beta == 0.0 && self.gamma == 0.0
    }
}

/// Lifecycle phase of the magic-window backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    AcquiringMedia,
    AwaitingPermission,
    PermissionGranted,
    /// Permission was declined; a retry is armed for the next user gesture.
    PermissionDeniedPendingGesture,
    Tracking,
    /// Camera passthrough only; orientation tracking is disabled.
    PassthroughOnly,
    Disposed,
}

/// Read-only snapshot of the magic-window backend.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MagicState {
    pub video: Option<VideoHandle>,
    pub stream: Option<StreamHandle>,
    pub orientation_enabled: bool,
    pub permission_granted: bool,
    pub world_anchoring_enabled: bool,
    /// Filtered orientation, the value anchors and HUDs should consume.
    pub smoothed: OrientationSample,
    pub initial: OrientationSample,
    pub has_initial_orientation: bool,
    pub phase: SessionPhase,
}

/// Kind-specific snapshot returned by a backend's `internal_state`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BackendState {
    Magic(MagicState),
    /// The backend publishes no state of its own.
    Empty,
}

impl BackendState {
    pub fn as_magic(&self) -> Option<&MagicState> {
        match self {
            BackendState::Magic(state) => Some(state),
            BackendState::Empty => None,
        }
    }
}

/// Error type shared by the registry, the backends, and the platform seams.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RdkError {
    #[error("INCOMPATIBLE SESSIONS: {requested} cannot run alongside {conflicting}")]
    IncompatibleSession {
        requested: BackendKind,
        conflicting: BackendKind,
    },

    #[error("Media Acquisition Error: {0}")]
    MediaAcquisition(String),

    #[error("Orientation Permission Denied: {0}")]
    PermissionDenied(String),

    #[error("Video Surface Error: {0}")]
    Surface(String),

    #[error("Backend Fault on {kind}: {details}")]
    Backend { kind: BackendKind, details: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_serializes_lowercase() {
        let json = serde_json::to_string(&BackendKind::Geolocation).unwrap();
        assert_eq!(json, "\"geolocation\"");
        let back: BackendKind = serde_json::from_str("\"magic\"").unwrap();
        assert_eq!(back, BackendKind::Magic);
    }

    #[test]
    fn backend_kind_indices_match_slot_order() {
        for (i, kind) in BackendKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(BackendKind::Immersive.to_string(), "immersive");
    }

    #[test]
    fn backend_ids_are_unique() {
        assert_ne!(BackendId::new(), BackendId::new());
    }

    #[test]
    fn nullable_components_read_as_zero() {
        let s = OrientationSample::from_nullable(None, Some(12.5), None);
        assert_eq!(s, OrientationSample::new(0.0, 12.5, 0.0));
        assert!(!s.is_zero());
        assert!(OrientationSample::from_nullable(None, None, None).is_zero());
    }

    #[test]
    fn magic_state_accessor() {
        let state = BackendState::Magic(MagicState {
            has_initial_orientation: true,
            ..MagicState::default()
        });
        assert!(state.as_magic().unwrap().has_initial_orientation);
        assert!(BackendState::Empty.as_magic().is_none());
    }

    #[test]
    fn incompatible_session_display() {
        let err = RdkError::IncompatibleSession {
            requested: BackendKind::Geolocation,
            conflicting: BackendKind::Fiducial,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("INCOMPATIBLE SESSIONS"));
        assert!(msg.contains("geolocation"));
        assert!(msg.contains("fiducial"));

        let err2 = RdkError::Backend {
            kind: BackendKind::Magic,
            details: "camera lost".to_string(),
        };
        assert!(err2.to_string().contains("magic"));
    }
}
