//! World anchors: scene content pinned relative to the magic window's
//! initial orientation.
//!
//! An anchor stays inert until the magic-window backend has captured its
//! first orientation reading.  From then on, every frame it writes its
//! authored transform to its scene node and, if it is a billboard, turns the
//! node to face the camera.

use rdk_perception::{EulerOrder, Quaternion, Transform3D, Vec3};
use rdk_session::registry::BackendRegistry;
use rdk_session::render::{self, SharedNode};
use rdk_types::{BackendKind, BackendState};
use serde::{Deserialize, Serialize};

/// Authored placement of an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorTransform {
    /// Offset from the initial viewpoint, in metres.
    pub position: Vec3,
    /// Euler angles (XYZ order), in radians.
    pub rotation: Vec3,
    pub scale: Vec3,
    /// Face the camera every frame instead of using `rotation`.
    pub is_billboard: bool,
}

impl Default for AnchorTransform {
    /// Two metres straight ahead, unrotated, unit scale.
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, -2.0),
            rotation: Vec3::zero(),
            scale: Vec3::splat(1.0),
            is_billboard: false,
        }
    }
}

impl AnchorTransform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    pub fn billboard(mut self) -> Self {
        self.is_billboard = true;
        self
    }

    /// The node transform, ignoring billboarding.
    pub fn local_transform(&self) -> Transform3D {
        let r = self.rotation;
        Transform3D::new(
            self.position,
            Quaternion::from_euler(r.x, r.y, r.z, EulerOrder::Xyz),
        )
        .with_scale(self.scale)
    }
}

/// Result of one [`WorldAnchorResolver::resolve`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorStatus {
    /// The node transform was written this frame.
    Applied,
    /// No magic-window backend, or no initial orientation yet; the node was
    /// left untouched.
    Waiting,
}

/// Places one scene node according to an [`AnchorTransform`].
pub struct WorldAnchorResolver {
    anchor: AnchorTransform,
    node: SharedNode,
}

impl WorldAnchorResolver {
    pub fn new(anchor: AnchorTransform, node: SharedNode) -> Self {
        Self { anchor, node }
    }

    pub fn anchor(&self) -> &AnchorTransform {
        &self.anchor
    }

    /// Apply the anchor for this frame.
    ///
    /// `camera_position` is only used by billboards, which are re-aimed at
    /// it every call with no smoothing.
    pub fn resolve(&self, registry: &BackendRegistry, camera_position: Vec3) -> AnchorStatus {
        let anchored = matches!(
            registry.state(BackendKind::Magic),
            Some(BackendState::Magic(state)) if state.has_initial_orientation
        );
        if !anchored {
            return AnchorStatus::Waiting;
        }

        let mut transform = self.anchor.local_transform();
        if self.anchor.is_billboard {
            transform.rotation = Quaternion::look_rotation(
                camera_position.sub(transform.position),
                Vec3::new(0.0, 1.0, 0.0),
            );
        }
        render::lock(&self.node).set_transform(transform);
        AnchorStatus::Applied
    }
}
