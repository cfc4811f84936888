//! [`FrameDriver`] – the per-frame tick.
//!
//! Each frame:
//!
//! 1. **Update** – [`BackendRegistry::update_all`] runs every backend's
//!    `update(dt)` in turn; a backend that fails is logged and skipped, the
//!    others still run.
//! 2. **Anchor** – every [`WorldAnchorResolver`] reads the magic-window state
//!    published by the registry and places its scene node.
//!
//! Both steps happen under one registry lock, so anchors always see the
//! state the backends produced in the same frame.
//!
//! [`FrameDriver::run`] repeats the tick at a fixed frame rate on the Tokio
//! timer until a shared shutdown flag is raised.
//!
//! [`BackendRegistry::update_all`]: rdk_session::registry::BackendRegistry::update_all

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rdk_magic::anchor::{AnchorStatus, WorldAnchorResolver};
use rdk_session::registry::SharedRegistry;
use rdk_session::render::{self, SharedCamera};
use rdk_types::BackendKind;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace_span, warn};

/// Frame rate used when the requested one has no usable period.
pub const DEFAULT_FRAME_RATE: f32 = 60.0;

/// Longest `dt` handed to backends.  After a stall (debugger, suspended
/// tab) the next frame reports this instead of the real gap.
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// What happened during one [`FrameDriver::tick`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameReport {
    /// 1-based frame counter.
    pub frame: u64,
    pub delta_seconds: f32,
    /// Backends whose `update` returned an error this frame.
    pub failed: Vec<BackendKind>,
    pub anchors_applied: usize,
    pub anchors_waiting: usize,
}

/// Drives backend updates and anchor resolution once per frame.
pub struct FrameDriver {
    registry: SharedRegistry,
    camera: SharedCamera,
    anchors: Vec<WorldAnchorResolver>,
    frames: u64,
}

impl FrameDriver {
    /// `camera` is the scene camera billboards turn towards; normally the
    /// same handle the backends were initialised with.
    pub fn new(registry: SharedRegistry, camera: SharedCamera) -> Self {
        Self {
            registry,
            camera,
            anchors: Vec::new(),
            frames: 0,
        }
    }

    pub fn add_anchor(&mut self, resolver: WorldAnchorResolver) {
        self.anchors.push(resolver);
    }

    pub fn anchors(&self) -> &[WorldAnchorResolver] {
        &self.anchors
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Frames ticked so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run one frame.
    pub fn tick(&mut self, delta_seconds: f32) -> FrameReport {
        self.frames += 1;
        let span = trace_span!("frame", frame = self.frames);
        let _enter = span.enter();

        let mut registry = self.registry.lock();
        let failed = registry.update_all(delta_seconds);

        let camera_position = render::lock(&self.camera).position();
        let mut report = FrameReport {
            frame: self.frames,
            delta_seconds,
            failed,
            ..FrameReport::default()
        };
        for anchor in &self.anchors {
            match anchor.resolve(&registry, camera_position) {
                AnchorStatus::Applied => report.anchors_applied += 1,
                AnchorStatus::Waiting => report.anchors_waiting += 1,
            }
        }
        report
    }

    /// Tick at `frame_rate` Hz until `shutdown` is set, calling `on_frame`
    /// with each report.  Returns the number of frames run by this call.
    ///
    /// `dt` is the measured time since the previous frame, capped at
    /// [`MAX_FRAME_DELTA`]; the first frame uses the nominal interval.
    /// Missed ticks are skipped rather than replayed in a burst.
    pub async fn run<F>(&mut self, frame_rate: f32, shutdown: Arc<AtomicBool>, mut on_frame: F) -> u64
    where
        F: FnMut(&FrameReport),
    {
        let period = frame_interval(frame_rate);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(frame_rate = 1.0 / period.as_secs_f32(), "frame loop started");
        let mut last: Option<Instant> = None;
        let mut ran = 0u64;

        loop {
            interval.tick().await;
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            let now = Instant::now();
            let delta = last
                .map_or(period.as_secs_f32(), |prev| now.duration_since(prev).as_secs_f32())
                .min(MAX_FRAME_DELTA);
            last = Some(now);

            let report = self.tick(delta);
            if !report.failed.is_empty() {
                debug!(frame = report.frame, failed = ?report.failed, "backend updates failed");
            }
            on_frame(&report);
            ran += 1;
        }

        info!(frames = ran, "frame loop stopped");
        ran
    }
}

/// Tick period for `frame_rate` Hz, falling back to [`DEFAULT_FRAME_RATE`]
/// for rates with no representable non-zero period (non-positive, NaN, so
/// high the period rounds to zero, or so low it overflows).
pub fn frame_interval(frame_rate: f32) -> Duration {
    match Duration::try_from_secs_f32(1.0 / frame_rate) {
        Ok(period) if frame_rate > 0.0 && !period.is_zero() => period,
        _ => {
            warn!(requested = frame_rate, fallback = DEFAULT_FRAME_RATE, "invalid frame rate");
            Duration::from_secs_f32(1.0 / DEFAULT_FRAME_RATE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdk_magic::anchor::AnchorTransform;
    use rdk_magic::config::MagicOptions;
    use rdk_magic::engine::MagicBackend;
    use rdk_magic::platform::HostEvent;
    use rdk_magic::sim::{SimPermission, SimPlatform};
    use rdk_perception::{Quaternion, Vec3};
    use rdk_session::registry::BackendRegistry;
    use rdk_session::render::{Camera, SceneNode};
    use rdk_session::sim::{SimBackend, SimHandles, SimNode, sim_context};
    use rdk_types::{BackendState, OrientationSample};

    fn driver_for(handles: &SimHandles, registry: SharedRegistry) -> FrameDriver {
        FrameDriver::new(registry, handles.camera.clone())
    }

    #[test]
    fn frame_interval_falls_back_for_bad_rates() {
        assert_eq!(frame_interval(50.0), Duration::from_millis(20));
        let fallback = Duration::from_secs_f32(1.0 / DEFAULT_FRAME_RATE);
        assert_eq!(frame_interval(0.0), fallback);
        assert_eq!(frame_interval(-5.0), fallback);
        assert_eq!(frame_interval(f32::NAN), fallback);
        assert_eq!(frame_interval(f32::INFINITY), fallback);
    }

    #[test]
    fn frame_interval_falls_back_for_unrepresentable_periods() {
        let fallback = Duration::from_secs_f32(1.0 / DEFAULT_FRAME_RATE);
        // Period rounds to zero nanoseconds.
        assert_eq!(frame_interval(1e30), fallback);
        // Period overflows.
        assert_eq!(frame_interval(1e-39), fallback);
        // Slow but representable rates are honoured.
        assert_eq!(frame_interval(0.5), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn run_survives_an_absurd_frame_rate() {
        let (_ctx, handles) = sim_context();
        let mut driver = driver_for(&handles, SharedRegistry::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let stopper = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            stopper.store(true, Ordering::SeqCst);
        });
        let ran = driver.run(1e30, shutdown, |_| {}).await;
        assert!(ran > 0);
    }

    #[tokio::test]
    async fn tick_updates_every_backend_and_reports_failures() {
        let (ctx, handles) = sim_context();
        let registry = SharedRegistry::new(BackendRegistry::new());
        let geo = SimBackend::new(BackendKind::Geolocation).failing_update();
        let geo_probe = geo.probe();
        let magic = SimBackend::new(BackendKind::Magic);
        let magic_probe = magic.probe();
        registry.register(Box::new(geo), &ctx).await.unwrap();
        registry.register(Box::new(magic), &ctx).await.unwrap();

        let mut driver = driver_for(&handles, registry);
        let report = driver.tick(0.02);

        assert_eq!(report.frame, 1);
        assert_eq!(report.failed, vec![BackendKind::Geolocation]);
        assert_eq!(geo_probe.update_calls(), 1);
        assert_eq!(magic_probe.update_calls(), 1);
        assert!((magic_probe.last_delta() - 0.02).abs() < f32::EPSILON);

        driver.tick(0.02);
        assert_eq!(driver.frames(), 2);
        assert_eq!(magic_probe.update_calls(), 2);
    }

    #[tokio::test]
    async fn anchors_wait_for_initial_orientation() {
        let sim = SimPlatform::new(SimPermission::granted());
        let (ctx, handles) = sim_context();
        let registry = SharedRegistry::default();
        registry
            .register(
                Box::new(MagicBackend::new(MagicOptions::default(), sim.platform())),
                &ctx,
            )
            .await
            .unwrap();

        let node = SimNode::shared();
        let billboard = SimNode::shared();
        let mut driver = driver_for(&handles, registry.clone());
        driver.add_anchor(WorldAnchorResolver::new(
            AnchorTransform::at(Vec3::new(0.0, 0.0, -3.0)),
            node.clone(),
        ));
        driver.add_anchor(WorldAnchorResolver::new(
            AnchorTransform::default().billboard(),
            billboard.clone(),
        ));
        assert_eq!(driver.anchors().len(), 2);

        let report = driver.tick(0.016);
        assert_eq!(report.anchors_applied, 0);
        assert_eq!(report.anchors_waiting, 2);
        assert_eq!(render::lock(&node).writes(), 0);

        sim.host
            .emit(HostEvent::DeviceOrientation(OrientationSample::new(10.0, 5.0, 0.0)));
        let report = driver.tick(0.016);
        assert_eq!(report.anchors_applied, 2);
        assert_eq!(render::lock(&node).transform().position, Vec3::new(0.0, 0.0, -3.0));
        assert_eq!(render::lock(&billboard).writes(), 1);

        match registry.state(BackendKind::Magic) {
            Some(BackendState::Magic(state)) => {
                assert!(state.has_initial_orientation);
                assert_eq!(state.initial, OrientationSample::new(10.0, 5.0, 0.0));
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn camera_rotation_follows_device_relative_to_first_reading() {
        let sim = SimPlatform::new(SimPermission::granted());
        let (ctx, handles) = sim_context();
        let registry = SharedRegistry::default();
        let options = MagicOptions {
            smoothing_factor: 1.0,
            dead_zone: 0.0,
            ..MagicOptions::default()
        };
        registry
            .register(Box::new(MagicBackend::new(options, sim.platform())), &ctx)
            .await
            .unwrap();
        let mut driver = driver_for(&handles, registry);

        sim.host
            .emit(HostEvent::DeviceOrientation(OrientationSample::new(0.0, 90.0, 0.0)));
        driver.tick(0.016);
        let rotation = render::lock(&handles.camera).rotation();
        assert!(rotation.angle_to(Quaternion::identity()) < 1e-3);

        sim.host
            .emit(HostEvent::DeviceOrientation(OrientationSample::new(30.0, 90.0, 0.0)));
        driver.tick(0.016);
        let rotation = render::lock(&handles.camera).rotation();
        let expected =
            Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 30f32.to_radians());
        assert!(rotation.angle_to(expected) < 1e-3);
    }

    #[tokio::test]
    async fn billboards_face_the_driver_camera() {
        let sim = SimPlatform::new(SimPermission::granted());
        let (ctx, handles) = sim_context();
        let registry = SharedRegistry::default();
        registry
            .register(
                Box::new(MagicBackend::new(MagicOptions::default(), sim.platform())),
                &ctx,
            )
            .await
            .unwrap();
        sim.host
            .emit(HostEvent::DeviceOrientation(OrientationSample::new(0.0, 90.0, 0.0)));

        let node = SimNode::shared();
        let mut driver = driver_for(&handles, registry);
        driver.add_anchor(WorldAnchorResolver::new(
            AnchorTransform::default().billboard(),
            node.clone(),
        ));
        render::lock(&handles.camera).set_position(Vec3::new(2.0, 0.0, -2.0));

        driver.tick(0.016);
        let forward = render::lock(&node)
            .transform()
            .rotation
            .rotate(Vec3::new(0.0, 0.0, 1.0));
        assert!(forward.sub(Vec3::new(1.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[tokio::test]
    async fn run_ticks_until_shutdown() {
        let (ctx, handles) = sim_context();
        let registry = SharedRegistry::default();
        let backend = SimBackend::new(BackendKind::Fiducial);
        let probe = backend.probe();
        registry.register(Box::new(backend), &ctx).await.unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let stopper = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            stopper.store(true, Ordering::SeqCst);
        });

        let mut driver = driver_for(&handles, registry);
        let mut seen = Vec::new();
        let ran = driver
            .run(200.0, shutdown, |report| seen.push(report.delta_seconds))
            .await;

        assert!(ran > 0);
        assert_eq!(ran, driver.frames());
        assert_eq!(seen.len() as u64, ran);
        assert_eq!(probe.update_calls() as u64, ran);
        assert!(seen.iter().all(|&dt| dt > 0.0 && dt <= MAX_FRAME_DELTA));
    }

    #[tokio::test]
    async fn run_returns_immediately_when_already_shut_down() {
        let (_ctx, handles) = sim_context();
        let mut driver = driver_for(&handles, SharedRegistry::default());
        let ran = driver
            .run(60.0, Arc::new(AtomicBool::new(true)), |_| {})
            .await;
        assert_eq!(ran, 0);
    }
}
