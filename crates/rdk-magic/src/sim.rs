//! In-process platform doubles.
//!
//! [`SimMediaDevices`], [`SimHost`] and [`SimPermission`] implement the
//! [`platform`][crate::platform] traits without a camera, a window, or a
//! user.  Tests and the demo CLI drive them directly: [`SimHost::emit`]
//! plays the role of the browser's event loop.
//!
//! # Example
//!
//! ```rust
//! use rdk_magic::platform::{HostEvent, HostEventKind, HostWindow};
//! use rdk_magic::sim::SimHost;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let host = SimHost::new(800, 600);
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = seen.clone();
//! host.add_listener(
//!     HostEventKind::UserInteraction,
//!     Arc::new(move |_: &HostEvent| {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     }),
//! );
//! host.emit(HostEvent::UserInteraction);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rdk_types::{OrientationSample, RdkError, StreamHandle, VideoHandle};

use crate::config::MediaConstraints;
use crate::platform::{
    HostEvent, HostEventKind, HostWindow, Listener, ListenerId, MediaDevices, MediaStream,
    OrientationPermission, PermissionStatus, Platform, VideoSurface,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Media
// ────────────────────────────────────────────────────────────────────────────

/// A camera stream whose "tracks" are a single stopped flag.
pub struct SimMediaStream {
    handle: StreamHandle,
    stopped: Arc<AtomicBool>,
}

impl MediaStream for SimMediaStream {
    fn handle(&self) -> StreamHandle {
        self.handle
    }

    fn stop_all_tracks(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Camera access that always succeeds, unless built with
/// [`SimMediaDevices::failing`].
#[derive(Default)]
pub struct SimMediaDevices {
    fail: bool,
    next_handle: AtomicU64,
    requests: AtomicUsize,
    last_constraints: Mutex<Option<MediaConstraints>>,
    streams: Mutex<Vec<Arc<AtomicBool>>>,
}

impl SimMediaDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request fails with [`RdkError::MediaAcquisition`].
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<MediaConstraints> {
        lock(&self.last_constraints).clone()
    }

    /// Number of streams handed out that have not been stopped.
    pub fn live_streams(&self) -> usize {
        lock(&self.streams)
            .iter()
            .filter(|stopped| !stopped.load(Ordering::SeqCst))
            .count()
    }
}

#[async_trait]
impl MediaDevices for SimMediaDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, RdkError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_constraints) = Some(constraints.clone());
        if self.fail {
            return Err(RdkError::MediaAcquisition(
                "NotAllowedError: camera access refused".to_string(),
            ));
        }

        let stopped = Arc::new(AtomicBool::new(false));
        lock(&self.streams).push(stopped.clone());
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(SimMediaStream {
            handle: StreamHandle(id),
            stopped,
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Video surface
// ────────────────────────────────────────────────────────────────────────────

/// Counters behind a [`SimVideoSurface`].
#[derive(Debug, Default)]
pub struct SurfaceProbe {
    dirty_marks: AtomicUsize,
    detached: AtomicBool,
}

impl SurfaceProbe {
    pub fn dirty_marks(&self) -> usize {
        self.dirty_marks.load(Ordering::SeqCst)
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

pub struct SimVideoSurface {
    handle: VideoHandle,
    probe: Arc<SurfaceProbe>,
}

impl VideoSurface for SimVideoSurface {
    fn handle(&self) -> VideoHandle {
        self.handle
    }

    fn mark_dirty(&mut self) {
        self.probe.dirty_marks.fetch_add(1, Ordering::SeqCst);
    }

    fn detach(&mut self) {
        self.probe.detached.store(true, Ordering::SeqCst);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Host window
// ────────────────────────────────────────────────────────────────────────────

/// A window that dispatches whatever events the test emits.
pub struct SimHost {
    viewport: Mutex<(u32, u32)>,
    screen_angle_bits: AtomicU32,
    listeners: Mutex<Vec<(ListenerId, HostEventKind, Listener)>>,
    next_listener: AtomicU64,
    next_video: AtomicU64,
    surfaces: Mutex<Vec<Arc<SurfaceProbe>>>,
    fail_attach: bool,
}

impl SimHost {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Mutex::new((width, height)),
            screen_angle_bits: AtomicU32::new(0.0f32.to_bits()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            next_video: AtomicU64::new(0),
            surfaces: Mutex::new(Vec::new()),
            fail_attach: false,
        }
    }

    /// A host whose `attach_video` fails with [`RdkError::Surface`].
    pub fn failing_attach(width: u32, height: u32) -> Self {
        Self {
            fail_attach: true,
            ..Self::new(width, height)
        }
    }

    pub fn set_screen_orientation_angle(&self, degrees: f32) {
        self.screen_angle_bits.store(degrees.to_bits(), Ordering::SeqCst);
    }

    /// Deliver `event` to every listener of its kind.
    ///
    /// `Resize` also updates the viewport first.  Listeners run without any
    /// host lock held, so they may add or remove listeners.
    pub fn emit(&self, event: HostEvent) {
        if let HostEvent::Resize { width, height } = event {
            *lock(&self.viewport) = (width, height);
        }
        let kind = event.kind();
        let targets: Vec<Listener> = lock(&self.listeners)
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in targets {
            listener(&event);
        }
    }

    /// Deliver a device-orientation reading whose components may be
    /// missing, as platforms report them before the sensor has calibrated.
    /// Missing components arrive as zero.
    pub fn emit_orientation(&self, alpha: Option<f32>, beta: Option<f32>, gamma: Option<f32>) {
        self.emit(HostEvent::DeviceOrientation(OrientationSample::from_nullable(
            alpha, beta, gamma,
        )));
    }

    pub fn listener_count(&self, kind: HostEventKind) -> usize {
        lock(&self.listeners)
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    /// Probe of the most recently attached video surface.
    pub fn last_surface(&self) -> Option<Arc<SurfaceProbe>> {
        lock(&self.surfaces).last().cloned()
    }
}

#[async_trait]
impl HostWindow for SimHost {
    fn viewport(&self) -> (u32, u32) {
        *lock(&self.viewport)
    }

    fn screen_orientation_angle(&self) -> f32 {
        f32::from_bits(self.screen_angle_bits.load(Ordering::SeqCst))
    }

    async fn attach_video(&self, _stream: &dyn MediaStream) -> Result<Box<dyn VideoSurface>, RdkError> {
        if self.fail_attach {
            return Err(RdkError::Surface("video playback did not start".to_string()));
        }
        let probe = Arc::new(SurfaceProbe::default());
        lock(&self.surfaces).push(probe.clone());
        let id = self.next_video.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(SimVideoSurface {
            handle: VideoHandle(id),
            probe,
        }))
    }

    fn add_listener(&self, kind: HostEventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst) + 1);
        lock(&self.listeners).push((id, kind, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _, _)| *existing != id);
        listeners.len() != before
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Permission
// ────────────────────────────────────────────────────────────────────────────

/// A permission prompt that replays a script of answers, then falls back to
/// a fixed answer.
pub struct SimPermission {
    script: Mutex<VecDeque<Result<PermissionStatus, RdkError>>>,
    fallback: PermissionStatus,
    requests: AtomicUsize,
}

impl SimPermission {
    /// Always grants.
    pub fn granted() -> Self {
        Self::scripted([], PermissionStatus::Granted)
    }

    /// Always denies.
    pub fn denied() -> Self {
        Self::scripted([], PermissionStatus::Denied)
    }

    /// Platform without a permission gate.
    pub fn not_required() -> Self {
        Self::scripted([], PermissionStatus::NotRequired)
    }

    /// Answer with `script` in order, then with `fallback` forever.
    pub fn scripted(
        script: impl IntoIterator<Item = Result<PermissionStatus, RdkError>>,
        fallback: PermissionStatus,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrientationPermission for SimPermission {
    async fn request(&self) -> Result<PermissionStatus, RdkError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.script).pop_front();
        next.unwrap_or(Ok(self.fallback))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bundle
// ────────────────────────────────────────────────────────────────────────────

/// Concrete doubles behind a [`Platform`], kept for inspection.
#[derive(Clone)]
pub struct SimPlatform {
    pub media: Arc<SimMediaDevices>,
    pub host: Arc<SimHost>,
    pub permission: Arc<SimPermission>,
}

impl SimPlatform {
    /// Working camera, an 800×600 window, and the given permission answers.
    pub fn new(permission: SimPermission) -> Self {
        Self {
            media: Arc::new(SimMediaDevices::new()),
            host: Arc::new(SimHost::new(800, 600)),
            permission: Arc::new(permission),
        }
    }

    pub fn with_media(mut self, media: SimMediaDevices) -> Self {
        self.media = Arc::new(media);
        self
    }

    pub fn with_host(mut self, host: SimHost) -> Self {
        self.host = Arc::new(host);
        self
    }

    /// Type-erased view for [`MagicBackend::new`][crate::engine::MagicBackend::new].
    pub fn platform(&self) -> Platform {
        Platform {
            media: self.media.clone(),
            host: self.host.clone(),
            permission: self.permission.clone(),
        }
    }
}
