//! The `Backend` trait every tracking or presentation backend implements.
//!
//! Backends are created by the application and handed to a
//! [`BackendRegistry`][crate::registry::BackendRegistry], which owns them
//! from registration until disposal.  The rest of the system only ever talks
//! to the trait, so a fiducial tracker, a geolocation tracker, or the
//! magic-window engine can be swapped without touching the frame loop.

use async_trait::async_trait;
use rdk_types::{BackendKind, BackendState, RdkError};

use crate::render::InitContext;

/// A tracking or presentation backend.
///
/// # Lifecycle
///
/// `initialize` runs once, before the backend is inserted into a registry.
/// `update` runs once per frame while registered.  `dispose` runs exactly
/// once when the backend leaves the registry (unregistered, replaced, or
/// torn down), and also after a failed `initialize`, so it must tolerate a
/// partially initialised backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The kind this backend occupies in the registry.
    fn kind(&self) -> BackendKind;

    /// Acquire resources and attach to the scene.
    ///
    /// May pend for a long time (camera or permission prompts).
    ///
    /// # Errors
    ///
    /// Any error aborts the registration; the registry disposes the backend
    /// and leaves its own state unchanged.
    async fn initialize(&mut self, ctx: &InitContext) -> Result<(), RdkError>;

    /// Per-frame work.  `delta_seconds` is the time since the last frame.
    ///
    /// # Errors
    ///
    /// A failing update is logged by the registry and does not stop the
    /// other backends from updating.
    ///
    /// # Panics
    ///
    /// Implementations must not panic: report faults as `Err`.  A panic
    /// unwinds through [`BackendRegistry::update_all`] and ends the caller's
    /// frame loop.
    ///
    /// [`BackendRegistry::update_all`]: crate::registry::BackendRegistry::update_all
    fn update(&mut self, delta_seconds: f32) -> Result<(), RdkError> {
        let _ = delta_seconds;
        Ok(())
    }

    /// Release everything acquired in `initialize`.
    fn dispose(&mut self) {}

    /// Read-only snapshot of the backend's published state.
    fn internal_state(&self) -> BackendState;
}

// ────────────────────────────────────────────────────────────────────────────
// ImmersiveBackend
// ────────────────────────────────────────────────────────────────────────────

/// Marks an externally managed immersive (WebXR) session.
///
/// The XR session itself is driven by the host; registering this marker
/// keeps the compatibility rules honest, e.g. it stops the magic-window
/// backend from fighting the XR loop over the camera.
#[derive(Debug, Default)]
pub struct ImmersiveBackend {
    active: bool,
}

impl ImmersiveBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` between a successful `initialize` and `dispose`.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[async_trait]
impl Backend for ImmersiveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Immersive
    }

    async fn initialize(&mut self, _ctx: &InitContext) -> Result<(), RdkError> {
        self.active = true;
        Ok(())
    }

    fn dispose(&mut self) {
        self.active = false;
    }

    fn internal_state(&self) -> BackendState {
        BackendState::Empty
    }
}
