//! In-process simulation doubles for headless tests and demos.
//!
//! [`SimBackend`] stands in for any backend kind and counts every lifecycle
//! call through a shared [`SimProbe`].  [`SimScene`], [`SimCamera`],
//! [`SimRenderer`] and [`SimNode`] record whatever the backends write to
//! them.  Together they let the whole session stack run in CI without a
//! renderer or any device hardware.
//!
//! # Example
//!
//! ```rust
//! use rdk_session::backend::Backend;
//! use rdk_session::render::Scene;
//! use rdk_session::sim::{SimBackend, sim_context};
//! use rdk_types::BackendKind;
//!
//! let (_ctx, handles) = sim_context();
//! let mut backend = SimBackend::new(BackendKind::Fiducial);
//! let probe = backend.probe();
//!
//! backend.update(0.5).expect("sim update succeeds");
//! assert_eq!(probe.update_calls(), 1);
//! assert!(handles.scene.lock().unwrap().background().is_none());
//! ```

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rdk_perception::{Quaternion, Transform3D, Vec3};
use rdk_types::{BackendKind, BackendState, RdkError};

use crate::backend::Backend;
use crate::render::{Background, Camera, InitContext, Renderer, Scene, SceneNode};

// ────────────────────────────────────────────────────────────────────────────
// Stub backend
// ────────────────────────────────────────────────────────────────────────────

/// Call counters shared between a [`SimBackend`] and the test that owns it.
#[derive(Debug, Default)]
pub struct SimProbe {
    init_calls: AtomicUsize,
    update_calls: AtomicUsize,
    dispose_calls: AtomicUsize,
    last_delta_bits: AtomicU32,
}

impl SimProbe {
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn dispose_calls(&self) -> usize {
        self.dispose_calls.load(Ordering::SeqCst)
    }

    /// `delta_seconds` passed to the most recent `update`.
    pub fn last_delta(&self) -> f32 {
        f32::from_bits(self.last_delta_bits.load(Ordering::SeqCst))
    }
}

/// A backend of any kind that records its lifecycle calls.  Succeeds unless
/// told otherwise.
#[derive(Debug)]
pub struct SimBackend {
    kind: BackendKind,
    probe: Arc<SimProbe>,
    fail_init: bool,
    fail_update: bool,
}

impl SimBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            probe: Arc::new(SimProbe::default()),
            fail_init: false,
            fail_update: false,
        }
    }

    /// Make `initialize` return [`RdkError::Backend`].
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Make every `update` return [`RdkError::Backend`].
    pub fn failing_update(mut self) -> Self {
        self.fail_update = true;
        self
    }

    /// Counters that stay readable after the backend moves into a registry.
    pub fn probe(&self) -> Arc<SimProbe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl Backend for SimBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn initialize(&mut self, _ctx: &InitContext) -> Result<(), RdkError> {
        self.probe.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(RdkError::Backend {
                kind: self.kind,
                details: "simulated initialisation failure".to_string(),
            });
        }
        Ok(())
    }

    fn update(&mut self, delta_seconds: f32) -> Result<(), RdkError> {
        self.probe.update_calls.fetch_add(1, Ordering::SeqCst);
        self.probe
            .last_delta_bits
            .store(delta_seconds.to_bits(), Ordering::SeqCst);
        if self.fail_update {
            return Err(RdkError::Backend {
                kind: self.kind,
                details: "simulated update failure".to_string(),
            });
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.probe.dispose_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn internal_state(&self) -> BackendState {
        BackendState::Empty
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub scene graph
// ────────────────────────────────────────────────────────────────────────────

/// Scene that remembers its background.
#[derive(Debug, Default)]
pub struct SimScene {
    background: Option<Background>,
}

impl Scene for SimScene {
    fn set_background(&mut self, background: Option<Background>) {
        self.background = background;
    }

    fn background(&self) -> Option<Background> {
        self.background
    }
}

/// Camera with a settable position, recording rotation and aspect writes.
#[derive(Debug)]
pub struct SimCamera {
    position: Vec3,
    rotation: Quaternion,
    aspect: f32,
}

impl Default for SimCamera {
    fn default() -> Self {
        Self {
            position: Vec3::zero(),
            rotation: Quaternion::identity(),
            aspect: 1.0,
        }
    }
}

impl SimCamera {
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }
}

impl Camera for SimCamera {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quaternion {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Quaternion) {
        self.rotation = rotation;
    }

    fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }
}

/// Renderer that records its size and clear colour.
#[derive(Debug)]
pub struct SimRenderer {
    size: (u32, u32),
    clear_color: u32,
    clear_alpha: f32,
}

impl Default for SimRenderer {
    fn default() -> Self {
        Self {
            size: (0, 0),
            clear_color: 0x000000,
            clear_alpha: 1.0,
        }
    }
}

impl SimRenderer {
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn clear_color(&self) -> (u32, f32) {
        (self.clear_color, self.clear_alpha)
    }
}

impl Renderer for SimRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn set_clear_color(&mut self, rgb: u32, alpha: f32) {
        self.clear_color = rgb;
        self.clear_alpha = alpha;
    }
}

/// Scene node that counts transform writes.
#[derive(Debug, Default)]
pub struct SimNode {
    transform: Transform3D,
    writes: usize,
}

impl SimNode {
    pub fn shared() -> Arc<Mutex<SimNode>> {
        Arc::new(Mutex::new(SimNode::default()))
    }

    /// Number of `set_transform` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl SceneNode for SimNode {
    fn set_transform(&mut self, transform: Transform3D) {
        self.transform = transform;
        self.writes += 1;
    }

    fn transform(&self) -> Transform3D {
        self.transform
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Context builder
// ────────────────────────────────────────────────────────────────────────────

/// Concrete handles behind an [`InitContext`] built by [`sim_context`], for
/// inspecting what backends wrote.
#[derive(Clone)]
pub struct SimHandles {
    pub scene: Arc<Mutex<SimScene>>,
    pub camera: Arc<Mutex<SimCamera>>,
    pub renderer: Arc<Mutex<SimRenderer>>,
}

/// Build an [`InitContext`] backed by fresh simulation doubles.
pub fn sim_context() -> (InitContext, SimHandles) {
    let handles = SimHandles {
        scene: Arc::new(Mutex::new(SimScene::default())),
        camera: Arc::new(Mutex::new(SimCamera::default())),
        renderer: Arc::new(Mutex::new(SimRenderer::default())),
    };
    let ctx = InitContext::new(
        handles.scene.clone(),
        handles.camera.clone(),
        handles.renderer.clone(),
    );
    (ctx, handles)
}
