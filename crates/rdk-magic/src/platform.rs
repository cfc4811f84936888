//! Host platform seams consumed by the magic-window engine.
//!
//! The engine never touches a real camera, window, or permission prompt.  It
//! talks to these traits; a browser shell, a native shell, or the in-process
//! doubles in [`sim`][crate::sim] implement them.

use std::sync::Arc;

use async_trait::async_trait;
use rdk_types::{OrientationSample, RdkError, StreamHandle, VideoHandle};

use crate::config::MediaConstraints;

// ────────────────────────────────────────────────────────────────────────────
// Host events
// ────────────────────────────────────────────────────────────────────────────

/// An event delivered by the host window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    /// A device-orientation reading, at sensor rate.
    DeviceOrientation(OrientationSample),
    /// The viewport changed size, in CSS pixels.
    Resize { width: u32, height: u32 },
    /// Any user gesture (click, touch end).  Some platforms only show a
    /// permission prompt from inside one.
    UserInteraction,
}

impl HostEvent {
    pub fn kind(&self) -> HostEventKind {
        match self {
            HostEvent::DeviceOrientation(_) => HostEventKind::DeviceOrientation,
            HostEvent::Resize { .. } => HostEventKind::Resize,
            HostEvent::UserInteraction => HostEventKind::UserInteraction,
        }
    }
}

/// Event category a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    DeviceOrientation,
    Resize,
    UserInteraction,
}

/// Identifies one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Callback invoked by the host for each matching event.
pub type Listener = Arc<dyn Fn(&HostEvent) + Send + Sync>;

// ────────────────────────────────────────────────────────────────────────────
// Media
// ────────────────────────────────────────────────────────────────────────────

/// A live camera stream.
pub trait MediaStream: Send + Sync {
    fn handle(&self) -> StreamHandle;

    /// Stop every track.  Calling it twice is harmless.
    fn stop_all_tracks(&mut self);
}

/// Access to the device cameras.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open a camera stream.
    ///
    /// # Errors
    ///
    /// [`RdkError::MediaAcquisition`] when no matching camera exists or the
    /// user refuses camera access.
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, RdkError>;
}

/// A video element bound to a stream and usable as a scene background.
pub trait VideoSurface: Send + Sync {
    fn handle(&self) -> VideoHandle;

    /// Tell the renderer the current frame needs re-uploading.
    fn mark_dirty(&mut self);

    /// Pause playback, unbind the stream, remove the element, and release
    /// its texture.  Calling it twice is harmless.
    fn detach(&mut self);
}

// ────────────────────────────────────────────────────────────────────────────
// Window
// ────────────────────────────────────────────────────────────────────────────

/// The host window.
///
/// Hosts must tolerate listeners being added or removed from inside a
/// listener callback, and must not hold internal locks while invoking
/// listeners.
#[async_trait]
pub trait HostWindow: Send + Sync {
    /// Current viewport size `(width, height)` in CSS pixels.
    fn viewport(&self) -> (u32, u32);

    /// Screen orientation angle in degrees (0, 90, 180, 270).
    fn screen_orientation_angle(&self) -> f32;

    /// Create a playing, full-viewport video surface for `stream`.
    ///
    /// # Errors
    ///
    /// [`RdkError::Surface`] if the element cannot be created or playback
    /// does not start.
    async fn attach_video(&self, stream: &dyn MediaStream) -> Result<Box<dyn VideoSurface>, RdkError>;

    fn add_listener(&self, kind: HostEventKind, listener: Listener) -> ListenerId;

    /// Returns `false` if `id` was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

// ────────────────────────────────────────────────────────────────────────────
// Permission
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of an orientation-permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// The platform has no permission gate for orientation events.
    NotRequired,
}

impl PermissionStatus {
    pub fn allows_tracking(self) -> bool {
        matches!(self, PermissionStatus::Granted | PermissionStatus::NotRequired)
    }
}

/// The device-orientation permission prompt.
#[async_trait]
pub trait OrientationPermission: Send + Sync {
    /// Ask for permission.  May pend until the user answers.
    async fn request(&self) -> Result<PermissionStatus, RdkError>;
}

/// The three platform services the engine needs, bundled.
#[derive(Clone)]
pub struct Platform {
    pub media: Arc<dyn MediaDevices>,
    pub host: Arc<dyn HostWindow>,
    pub permission: Arc<dyn OrientationPermission>,
}
