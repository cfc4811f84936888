//! Headless magic-window session against simulated devices.
//!
//! The demo registers a [`MagicBackend`] (and optionally a simulated
//! geolocation backend), publishes the passthrough video, feeds a jittery
//! synthetic orientation sweep from its own task at sensor rate, and drives
//! frames until the shutdown flag is raised.  Once a second it hands an HUD
//! line to the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rdk_magic::config::MagicOptions;
use rdk_magic::platform::{HostEvent, PermissionStatus};
use rdk_magic::sim::{SimHost, SimPermission, SimPlatform};
use rdk_magic::{AnchorTransform, MagicBackend, WorldAnchorResolver};
use rdk_runtime::frame_loop::{FrameReport, frame_interval};
use rdk_runtime::FrameDriver;
use rdk_session::SharedRegistry;
use rdk_session::render::SharedNode;
use rdk_session::sim::{SimBackend, SimNode, sim_context};
use rdk_types::{BackendKind, BackendState, MagicState, OrientationSample, RdkError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::hud::{self, FrameStats};

/// Pacing knobs that are not worth a config entry.
#[derive(Debug, Clone, Copy)]
pub struct DemoTiming {
    /// Interval between HUD lines.
    pub hud_period: Duration,
    /// Delay before the simulated user taps the screen.
    pub gesture_delay: Duration,
}

impl Default for DemoTiming {
    fn default() -> Self {
        Self {
            hud_period: Duration::from_secs(1),
            gesture_delay: Duration::from_millis(1500),
        }
    }
}

/// What a finished demo run saw.
#[derive(Debug, Clone)]
pub struct DemoSummary {
    pub frames: u64,
    pub readings: u64,
    /// Magic-window state just before disposal.
    pub final_state: Option<MagicState>,
}

/// A smooth sweep around "phone held upright" with high-frequency jitter on
/// every axis, `t` seconds into the run.
pub fn synthetic_reading(t: f32) -> OrientationSample {
    let jitter = |freq: f32, phase: f32| 0.6 * (t * freq + phase).sin();
    OrientationSample::new(
        (25.0 * (t * 0.4).sin() + jitter(41.0, 0.0)).rem_euclid(360.0),
        80.0 + 8.0 * (t * 0.25).sin() + jitter(37.0, 1.3),
        4.0 * (t * 0.7).sin() + jitter(43.0, 2.1),
    )
}

/// Readings reported with every component missing before the synthetic
/// sensor "calibrates".
pub const WARMUP_READINGS: u64 = 3;

/// The `index`-th sensor report as the platform delivers it: nullable
/// components, all missing during warm-up.
pub fn sensor_report(index: u64, t: f32) -> (Option<f32>, Option<f32>, Option<f32>) {
    if index < WARMUP_READINGS {
        return (None, None, None);
    }
    let o = synthetic_reading(t);
    (Some(o.alpha), Some(o.beta), Some(o.gamma))
}

/// Run the demo until `shutdown` is set (or `cfg.duration_secs` elapses).
///
/// # Errors
///
/// Whatever registering the magic-window backend fails with, typically
/// [`RdkError::MediaAcquisition`].
pub async fn run<S>(
    cfg: &Config,
    timing: DemoTiming,
    shutdown: Arc<AtomicBool>,
    mut sink: S,
) -> Result<DemoSummary, RdkError>
where
    S: FnMut(String),
{
    let permission = if cfg.simulate_permission_prompt {
        SimPermission::scripted([Ok(PermissionStatus::Denied)], PermissionStatus::Granted)
    } else {
        SimPermission::not_required()
    };
    let sim = SimPlatform::new(permission);
    let (ctx, _handles) = sim_context();
    let registry = SharedRegistry::default();

    registry
        .register(Box::new(magic_backend(&cfg.magic, &sim)), &ctx)
        .await?;
    if let Some(BackendState::Magic(state)) = registry.state(BackendKind::Magic)
        && let Some(video) = state.video
    {
        registry.set_passthrough_video(Some(video));
        info!(video = video.0, "passthrough video published");
    }

    if cfg.simulate_geolocation
        && let Err(e) = registry
            .register(Box::new(SimBackend::new(BackendKind::Geolocation)), &ctx)
            .await
    {
        warn!(error = %e, "simulated geolocation backend not registered");
    }

    let sensor = spawn_sensor(sim.host.clone(), cfg.sensor_rate, shutdown.clone());
    if cfg.simulate_permission_prompt {
        spawn_gesture(sim.host.clone(), timing.gesture_delay, shutdown.clone());
        sink(format!(
            "  Permission prompt declined; simulating a tap in {:.1}s",
            timing.gesture_delay.as_secs_f32()
        ));
    }
    if cfg.duration_secs > 0 {
        spawn_deadline(Duration::from_secs(cfg.duration_secs), shutdown.clone());
    }

    let mut driver = FrameDriver::new(registry.clone(), ctx.camera.clone());
    for anchor in &cfg.anchors {
        driver.add_anchor(anchor_node(*anchor));
    }

    let anchors_total = cfg.anchors.len();
    let mut window_start = Instant::now();
    let mut window_frames = 0u32;
    let frames = driver
        .run(cfg.frame_rate, shutdown.clone(), |report: &FrameReport| {
            window_frames += 1;
            let elapsed = window_start.elapsed();
            if elapsed < timing.hud_period {
                return;
            }
            let state = registry.state(BackendKind::Magic);
            let stats = FrameStats {
                frames: report.frame,
                fps: window_frames as f32 / elapsed.as_secs_f32(),
                anchors_applied: report.anchors_applied,
                anchors_total,
            };
            sink(hud::render(state.as_ref().and_then(BackendState::as_magic), stats));
            window_start = Instant::now();
            window_frames = 0;
        })
        .await;

    shutdown.store(true, Ordering::SeqCst);
    let readings = sensor.await.unwrap_or_else(|e| {
        warn!(error = %e, "sensor task ended abnormally");
        0
    });

    let final_state = registry
        .state(BackendKind::Magic)
        .as_ref()
        .and_then(BackendState::as_magic)
        .copied();
    registry.set_passthrough_video(None);
    registry.dispose_all();
    info!(frames, readings, "demo finished");

    Ok(DemoSummary {
        frames,
        readings,
        final_state,
    })
}

fn magic_backend(options: &MagicOptions, sim: &SimPlatform) -> MagicBackend {
    MagicBackend::new(options.clone(), sim.platform())
}

fn anchor_node(anchor: AnchorTransform) -> WorldAnchorResolver {
    let node: SharedNode = SimNode::shared();
    WorldAnchorResolver::new(anchor, node)
}

/// Emit synthetic readings at `rate` Hz until shutdown; yields the count.
fn spawn_sensor(host: Arc<SimHost>, rate: f32, shutdown: Arc<AtomicBool>) -> JoinHandle<u64> {
    let period = frame_interval(rate);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        let start = Instant::now();
        let mut sent = 0u64;
        loop {
            interval.tick().await;
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            let t = start.elapsed().as_secs_f32();
            let (alpha, beta, gamma) = sensor_report(sent, t);
            host.emit_orientation(alpha, beta, gamma);
            sent += 1;
        }
        sent
    })
}

fn spawn_gesture(host: Arc<SimHost>, delay: Duration, shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if !shutdown.load(Ordering::SeqCst) {
            info!("simulated user tap");
            host.emit(HostEvent::UserInteraction);
        }
    });
}

fn spawn_deadline(after: Duration, shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        shutdown.store(true, Ordering::SeqCst);
    });
}
