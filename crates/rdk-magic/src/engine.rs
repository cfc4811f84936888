//! [`MagicBackend`] – the "magic window" backend.
//!
//! Shows the rear camera as the scene background and turns device
//! orientation into a stable camera rotation, so content appears fixed in
//! the room while the user pans the phone around.
//!
//! # Data flow
//!
//! ```text
//! host DeviceOrientation ──▶ raw  ──(first non-zero)──▶ initial (frozen)
//!                             │
//!        update(dt) ──────────┴──▶ filter ──▶ smoothed
//!                             └──▶ inverse(initial) × device(raw) ──slerp──▶ camera
//! ```
//!
//! Sensor events only ever write `raw` (and `initial`, once); `smoothed` and
//! the camera rotation are written only by `update`.
//!
//! # Permission
//!
//! Some platforms only grant orientation access from inside a user gesture.
//! If the request made during `initialize` is declined, the backend keeps
//! running as plain passthrough and retries on the next
//! [`HostEvent::UserInteraction`].  Applications can also ask explicitly
//! through a [`MagicHandle`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use rdk_perception::{OrientationFilter, Quaternion, device_quaternion};
use rdk_session::backend::Backend;
use rdk_session::render::{self, Background, InitContext};
use rdk_types::{BackendKind, BackendState, MagicState, OrientationSample, RdkError, SessionPhase};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MagicOptions;
use crate::platform::{
    HostEvent, HostEventKind, HostWindow, ListenerId, MediaDevices, MediaStream,
    OrientationPermission, Platform, VideoSurface,
};

// ────────────────────────────────────────────────────────────────────────────
// Shared state
// ────────────────────────────────────────────────────────────────────────────

/// First usable reading and its cached rotation.
#[derive(Debug, Clone, Copy)]
struct InitialOrientation {
    sample: OrientationSample,
    inverse: Quaternion,
}

/// State touched by host callbacks and the permission retry task.
#[derive(Default)]
struct EngineShared {
    phase: SessionPhase,
    orientation_enabled: bool,
    permission_granted: bool,
    raw: OrientationSample,
    initial: Option<InitialOrientation>,
    orientation_listener: Option<ListenerId>,
    gesture_listener: Option<ListenerId>,
    retry_task: Option<JoinHandle<()>>,
    runtime: Option<Handle>,
    disposed: bool,
}

impl EngineShared {
    fn record(&mut self, sample: OrientationSample, screen_angle: f32) {
        self.raw = sample;
        if self.initial.is_none() && !sample.is_zero() {
            let quaternion = device_quaternion(sample, screen_angle);
            self.initial = Some(InitialOrientation {
                sample,
                inverse: quaternion.inverse(),
            });
            info!(
                alpha = sample.alpha,
                beta = sample.beta,
                gamma = sample.gamma,
                "initial orientation captured"
            );
        }
    }
}

fn lock_shared(shared: &Mutex<EngineShared>) -> MutexGuard<'_, EngineShared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything needed to request permission and subscribe to orientation
/// events, cloneable so host callbacks, the retry task, and [`MagicHandle`]
/// can each hold one.
#[derive(Clone)]
struct OrientationChannel {
    shared: Arc<Mutex<EngineShared>>,
    host: Arc<dyn HostWindow>,
    permission: Arc<dyn OrientationPermission>,
}

/// Non-owning counterpart of [`OrientationChannel`], captured by host
/// listeners so the host never keeps the engine alive.
struct WeakChannel {
    shared: Weak<Mutex<EngineShared>>,
    host: Weak<dyn HostWindow>,
    permission: Weak<dyn OrientationPermission>,
}

impl WeakChannel {
    fn upgrade(&self) -> Option<OrientationChannel> {
        Some(OrientationChannel {
            shared: self.shared.upgrade()?,
            host: self.host.upgrade()?,
            permission: self.permission.upgrade()?,
        })
    }
}

impl OrientationChannel {
    fn lock(&self) -> MutexGuard<'_, EngineShared> {
        lock_shared(&self.shared)
    }

    fn downgrade(&self) -> WeakChannel {
        WeakChannel {
            shared: Arc::downgrade(&self.shared),
            host: Arc::downgrade(&self.host),
            permission: Arc::downgrade(&self.permission),
        }
    }

    /// Ask the platform for orientation access.  An error counts as a
    /// denial.
    async fn request_permission(&self) -> bool {
        let granted = match self.permission.request().await {
            Ok(status) if status.allows_tracking() => true,
            Ok(_) => {
                warn!("device orientation permission denied");
                false
            }
            Err(e) => {
                warn!(error = %e, "device orientation permission request failed");
                false
            }
        };

        let mut shared = self.lock();
        if granted && !shared.disposed {
            shared.permission_granted = true;
            if shared.orientation_listener.is_none() {
                shared.phase = SessionPhase::PermissionGranted;
            }
        }
        granted
    }

    /// Start listening for orientation events.  No-op if already listening
    /// or disposed.
    fn subscribe(&self) {
        {
            let shared = self.lock();
            if shared.disposed || shared.orientation_listener.is_some() {
                return;
            }
        }

        let weak_shared = Arc::downgrade(&self.shared);
        let weak_host = Arc::downgrade(&self.host);
        let id = self.host.add_listener(
            HostEventKind::DeviceOrientation,
            Arc::new(move |event: &HostEvent| {
                let HostEvent::DeviceOrientation(sample) = *event else {
                    return;
                };
                let Some(shared) = weak_shared.upgrade() else {
                    return;
                };
                let screen_angle = weak_host
                    .upgrade()
                    .map_or(0.0, |host| host.screen_orientation_angle());
                let mut shared = lock_shared(&shared);
                if !shared.disposed {
                    shared.record(sample, screen_angle);
                }
            }),
        );

        let mut shared = self.lock();
        if shared.disposed || shared.orientation_listener.is_some() {
            drop(shared);
            self.host.remove_listener(id);
            return;
        }
        shared.orientation_listener = Some(id);
        shared.phase = SessionPhase::Tracking;
        info!("device orientation tracking started");
    }

    /// Retry the permission request on the next user gesture.  One-shot;
    /// re-armed if the retry is declined too.
    fn arm_gesture_retry(&self) {
        {
            let mut shared = self.lock();
            if shared.disposed
                || shared.gesture_listener.is_some()
                || shared.orientation_listener.is_some()
            {
                return;
            }
            shared.phase = SessionPhase::PermissionDeniedPendingGesture;
        }

        let weak = self.downgrade();
        let id = self.host.add_listener(
            HostEventKind::UserInteraction,
            Arc::new(move |_: &HostEvent| {
                if let Some(channel) = weak.upgrade() {
                    channel.on_user_interaction();
                }
            }),
        );

        let mut shared = self.lock();
        if shared.disposed || shared.gesture_listener.is_some() {
            drop(shared);
            self.host.remove_listener(id);
            return;
        }
        shared.gesture_listener = Some(id);
        debug!("orientation permission retry armed for next user gesture");
    }

    fn on_user_interaction(&self) {
        let (listener, runtime) = {
            let mut shared = self.lock();
            if shared.disposed {
                return;
            }
            let Some(listener) = shared.gesture_listener.take() else {
                return;
            };
            shared.phase = SessionPhase::AwaitingPermission;
            (listener, shared.runtime.clone())
        };
        self.host.remove_listener(listener);

        let Some(runtime) = runtime else {
            warn!("no async runtime available for the permission retry");
            self.lock().phase = SessionPhase::PermissionDeniedPendingGesture;
            return;
        };

        let channel = self.clone();
        let task = runtime.spawn(async move { channel.retry_permission().await });

        let mut shared = self.lock();
        if shared.disposed {
            task.abort();
        } else {
            shared.retry_task = Some(task);
        }
    }

    async fn retry_permission(&self) {
        let granted = self.request_permission().await;
        if self.lock().disposed {
            return;
        }
        if granted {
            self.subscribe();
        } else {
            self.arm_gesture_retry();
        }
    }

    /// Drop the pending gesture retry, if any.
    fn cancel_gesture_retry(&self) {
        let (listener, task) = {
            let mut shared = self.lock();
            (shared.gesture_listener.take(), shared.retry_task.take())
        };
        if let Some(task) = task {
            task.abort();
        }
        if let Some(listener) = listener {
            self.host.remove_listener(listener);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MagicHandle
// ────────────────────────────────────────────────────────────────────────────

/// Cloneable handle to a [`MagicBackend`] that stays usable after the
/// backend has moved into a registry.
#[derive(Clone)]
pub struct MagicHandle {
    channel: OrientationChannel,
}

impl MagicHandle {
    /// Request orientation permission now, typically from a user gesture.
    ///
    /// Cancels a pending gesture retry.  On success starts tracking (unless
    /// already tracking).
    ///
    /// # Errors
    ///
    /// - [`RdkError::PermissionDenied`] if the user declines; the gesture
    ///   retry is re-armed.
    /// - [`RdkError::Backend`] if orientation tracking is disabled or the
    ///   backend has been disposed.
    pub async fn request_orientation_permission(&self) -> Result<(), RdkError> {
        {
            let shared = self.channel.lock();
            if shared.disposed || !shared.orientation_enabled {
                return Err(RdkError::Backend {
                    kind: BackendKind::Magic,
                    details: "orientation tracking is disabled".to_string(),
                });
            }
        }
        self.channel.cancel_gesture_retry();
        {
            let mut shared = self.channel.lock();
            if shared.orientation_listener.is_none() {
                shared.phase = SessionPhase::AwaitingPermission;
            }
        }

        if self.channel.request_permission().await {
            self.channel.subscribe();
            Ok(())
        } else {
            self.channel.arm_gesture_retry();
            Err(RdkError::PermissionDenied(
                "user declined device orientation access".to_string(),
            ))
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.channel.lock().phase
    }

    pub fn permission_granted(&self) -> bool {
        self.channel.lock().permission_granted
    }

    pub fn has_initial_orientation(&self) -> bool {
        self.channel.lock().initial.is_some()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MagicBackend
// ────────────────────────────────────────────────────────────────────────────

/// Device-orientation backend with camera passthrough.
pub struct MagicBackend {
    options: MagicOptions,
    filter: OrientationFilter,
    media: Arc<dyn MediaDevices>,
    channel: OrientationChannel,
    world_anchoring_enabled: bool,
    smoothed: OrientationSample,
    stream: Option<Box<dyn MediaStream>>,
    video: Option<Box<dyn VideoSurface>>,
    resize_listener: Option<ListenerId>,
    ctx: Option<InitContext>,
}

impl MagicBackend {
    /// Create a backend; `options` are sanitised first.
    pub fn new(options: MagicOptions, platform: Platform) -> Self {
        let options = options.sanitized();
        let shared = EngineShared {
            orientation_enabled: options.enable_orientation,
            ..EngineShared::default()
        };
        Self {
            filter: options.filter(),
            world_anchoring_enabled: options.enable_world_anchoring,
            media: platform.media,
            channel: OrientationChannel {
                shared: Arc::new(Mutex::new(shared)),
                host: platform.host,
                permission: platform.permission,
            },
            options,
            smoothed: OrientationSample::ZERO,
            stream: None,
            video: None,
            resize_listener: None,
            ctx: None,
        }
    }

    pub fn options(&self) -> &MagicOptions {
        &self.options
    }

    pub fn handle(&self) -> MagicHandle {
        MagicHandle {
            channel: self.channel.clone(),
        }
    }

    /// Snapshot of the published state.
    pub fn state(&self) -> MagicState {
        let shared = self.channel.lock();
        MagicState {
            video: self.video.as_ref().map(|v| v.handle()),
            stream: self.stream.as_ref().map(|s| s.handle()),
            orientation_enabled: shared.orientation_enabled,
            permission_granted: shared.permission_granted,
            world_anchoring_enabled: self.world_anchoring_enabled,
            smoothed: self.smoothed,
            initial: shared
                .initial
                .map_or(OrientationSample::ZERO, |initial| initial.sample),
            has_initial_orientation: shared.initial.is_some(),
            phase: shared.phase,
        }
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.channel.lock().phase = phase;
    }

    async fn attach_passthrough(&mut self, ctx: &InitContext) -> Result<(), RdkError> {
        let stream = match self
            .media
            .get_user_media(&self.options.media_constraints)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "camera acquisition failed");
                return Err(match e {
                    RdkError::MediaAcquisition(_) => e,
                    other => RdkError::MediaAcquisition(other.to_string()),
                });
            }
        };

        let stream = self.stream.insert(stream);
        let video = self.channel.host.attach_video(&**stream).await?;
        let video_handle = video.handle();
        self.video = Some(video);

        render::lock(&ctx.scene).set_background(Some(Background::Video(video_handle)));
        render::lock(&ctx.renderer).set_clear_color(0x000000, 0.0);
        info!(video = video_handle.0, "camera passthrough attached");
        Ok(())
    }

    fn install_resize(&mut self, ctx: &InitContext) {
        let renderer = ctx.renderer.clone();
        let camera = ctx.camera.clone();
        let apply = move |width: u32, height: u32| {
            render::lock(&renderer).set_size(width, height);
            if height > 0 {
                render::lock(&camera).set_aspect(width as f32 / height as f32);
            }
        };

        let (width, height) = self.channel.host.viewport();
        apply(width, height);

        let id = self.channel.host.add_listener(
            HostEventKind::Resize,
            Arc::new(move |event: &HostEvent| {
                if let HostEvent::Resize { width, height } = *event {
                    apply(width, height);
                }
            }),
        );
        self.resize_listener = Some(id);
    }
}

#[async_trait]
impl Backend for MagicBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Magic
    }

    async fn initialize(&mut self, ctx: &InitContext) -> Result<(), RdkError> {
        {
            let mut shared = self.channel.lock();
            shared.disposed = false;
            shared.phase = SessionPhase::AcquiringMedia;
            shared.orientation_enabled = self.options.enable_orientation;
            shared.runtime = Handle::try_current().ok();
        }
        self.world_anchoring_enabled = self.options.enable_world_anchoring;
        self.ctx = Some(ctx.clone());

        if let Err(e) = self.attach_passthrough(ctx).await {
            self.set_phase(SessionPhase::Uninitialized);
            return Err(e);
        }

        if self.options.enable_orientation {
            self.set_phase(SessionPhase::AwaitingPermission);
            if self.channel.request_permission().await {
                self.channel.subscribe();
            } else {
                self.channel.arm_gesture_retry();
            }
        } else {
            self.set_phase(SessionPhase::PassthroughOnly);
        }

        self.install_resize(ctx);
        Ok(())
    }

    fn update(&mut self, _delta_seconds: f32) -> Result<(), RdkError> {
        let (enabled, granted, raw, initial) = {
            let shared = self.channel.lock();
            (
                shared.orientation_enabled,
                shared.permission_granted,
                shared.raw,
                shared.initial,
            )
        };
        if !enabled || !granted {
            return Ok(());
        }

        self.smoothed = self.filter.step(self.smoothed, raw);

        if self.world_anchoring_enabled
            && let Some(initial) = initial
            && let Some(ctx) = &self.ctx
        {
            let device = device_quaternion(raw, self.channel.host.screen_orientation_angle());
            let target = initial.inverse.mul(device);
            let mut camera = render::lock(&ctx.camera);
            let next = camera.rotation().slerp(target, self.filter.smoothing_factor());
            camera.set_rotation(next);
        }

        if let Some(video) = self.video.as_mut() {
            video.mark_dirty();
        }
        Ok(())
    }

    fn dispose(&mut self) {
        let (orientation, gesture, task, was_disposed) = {
            let mut shared = self.channel.lock();
            let was_disposed = shared.disposed;
            shared.disposed = true;
            shared.phase = SessionPhase::Disposed;
            shared.orientation_enabled = false;
            shared.permission_granted = false;
            shared.raw = OrientationSample::ZERO;
            shared.initial = None;
            shared.runtime = None;
            (
                shared.orientation_listener.take(),
                shared.gesture_listener.take(),
                shared.retry_task.take(),
                was_disposed,
            )
        };

        if let Some(task) = task {
            task.abort();
        }
        for id in [orientation, gesture, self.resize_listener.take()]
            .into_iter()
            .flatten()
        {
            self.channel.host.remove_listener(id);
        }

        if let Some(mut stream) = self.stream.take() {
            stream.stop_all_tracks();
        }
        let video_handle = self.video.take().map(|mut video| {
            video.detach();
            video.handle()
        });

        // Only clear the background if it is still ours; a replacement
        // backend may already have installed its own.
        if let Some(ctx) = self.ctx.take()
            && let Some(handle) = video_handle
        {
            let mut scene = render::lock(&ctx.scene);
            if scene.background() == Some(Background::Video(handle)) {
                scene.set_background(None);
            }
        }

        self.world_anchoring_enabled = false;
        self.smoothed = OrientationSample::ZERO;

        if !was_disposed {
            info!("magic backend disposed");
        }
    }

    fn internal_state(&self) -> BackendState {
        BackendState::Magic(self.state())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
