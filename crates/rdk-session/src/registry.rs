//! [`BackendRegistry`] – owns the live backends and drives them each frame.
//!
//! The registry holds at most one backend per [`BackendKind`], in a fixed
//! slot per kind, so lookups are O(1) and per-frame iteration order is
//! stable (fiducial, geolocation, immersive, magic).  Registration is
//! validated against a [`CompatibilitySet`] before the backend's
//! `initialize` ever runs.
//!
//! [`SharedRegistry`] wraps a registry in `Arc<Mutex<…>>` for callers that
//! register from several tasks; it runs `initialize` with the lock released.
//!
//! # Example
//!
//! ```rust
//! use rdk_session::registry::BackendRegistry;
//! use rdk_session::sim::{SimBackend, sim_context};
//! use rdk_types::BackendKind;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let (ctx, _handles) = sim_context();
//! let mut registry = BackendRegistry::new();
//! registry
//!     .register(Box::new(SimBackend::new(BackendKind::Geolocation)), &ctx)
//!     .await
//!     .expect("nothing conflicts with geolocation yet");
//!
//! let err = registry
//!     .register(Box::new(SimBackend::new(BackendKind::Fiducial)), &ctx)
//!     .await
//!     .unwrap_err();
//! assert!(err.to_string().starts_with("INCOMPATIBLE SESSIONS"));
//! # });
//! ```

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use rdk_types::{BackendId, BackendKind, BackendState, RdkError, VideoHandle};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::compat::CompatibilitySet;
use crate::render::InitContext;

struct Registered {
    id: BackendId,
    backend: Box<dyn Backend>,
}

/// Central backend registry.
///
/// Construct with [`BackendRegistry::new`], [`register`][Self::register]
/// backends, then call [`update_all`][Self::update_all] once per frame.
pub struct BackendRegistry {
    slots: [Option<Registered>; BackendKind::COUNT],
    compat: CompatibilitySet,
    passthrough_video: Option<VideoHandle>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_compatibility(CompatibilitySet::default())
    }
}

impl BackendRegistry {
    /// Create an empty registry with the default compatibility rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry enforcing `compat`.
    pub fn with_compatibility(compat: CompatibilitySet) -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            compat,
            passthrough_video: None,
        }
    }

    pub fn compatibility(&self) -> &CompatibilitySet {
        &self.compat
    }

    // ── Registration ────────────────────────────────────────────────────────

    /// Validate, initialise, and insert `backend`.
    ///
    /// A live backend of the same kind is replaced and disposed.  Nothing is
    /// mutated until `initialize` has succeeded.
    ///
    /// # Errors
    ///
    /// - [`RdkError::IncompatibleSession`] if a conflicting kind is
    ///   registered; `initialize` is not called.
    /// - Whatever `initialize` returns; the backend is disposed before the
    ///   error is handed back.
    pub async fn register(
        &mut self,
        mut backend: Box<dyn Backend>,
        ctx: &InitContext,
    ) -> Result<BackendId, RdkError> {
        self.check_compatible(backend.kind())?;
        initialize_or_dispose(backend.as_mut(), ctx).await?;
        self.commit(backend)
    }

    /// Fail if `kind` conflicts with any registered kind.
    pub fn check_compatible(&self, kind: BackendKind) -> Result<(), RdkError> {
        match self.compat.first_conflict(kind, self.kinds()) {
            Some(conflicting) => {
                warn!(
                    requested = %kind,
                    conflicting = %conflicting,
                    "backend registration rejected"
                );
                Err(RdkError::IncompatibleSession {
                    requested: kind,
                    conflicting,
                })
            }
            None => Ok(()),
        }
    }

    /// Insert an already initialised backend.
    ///
    /// Compatibility is checked again; on conflict the backend is disposed and
    /// the error returned.  A live backend of the same kind is disposed and
    /// replaced.
    pub fn commit(&mut self, mut backend: Box<dyn Backend>) -> Result<BackendId, RdkError> {
        let kind = backend.kind();
        if let Err(e) = self.check_compatible(kind) {
            backend.dispose();
            return Err(e);
        }

        let id = BackendId::new();
        let slot = &mut self.slots[kind.index()];
        if let Some(mut previous) = slot.replace(Registered { id, backend }) {
            info!(kind = %kind, old = %previous.id, new = %id, "backend replaced");
            previous.backend.dispose();
        } else {
            info!(kind = %kind, id = %id, "backend registered");
        }
        Ok(id)
    }

    /// Remove and dispose the backend registered under `id`.
    ///
    /// Returns `false` (and does nothing) when `id` is unknown or belongs to
    /// an instance that has since been replaced.
    pub fn unregister(&mut self, id: BackendId) -> bool {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|r| r.id == id))
        else {
            debug!(id = %id, "unregister ignored: no such backend");
            return false;
        };

        if let Some(mut removed) = slot.take() {
            info!(kind = %removed.backend.kind(), id = %id, "backend unregistered");
            removed.backend.dispose();
        }
        true
    }

    /// Dispose every backend in slot order and empty the registry.
    pub fn dispose_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(mut removed) = slot.take() {
                info!(kind = %removed.backend.kind(), id = %removed.id, "backend disposed");
                removed.backend.dispose();
            }
        }
    }

    // ── Per-frame ───────────────────────────────────────────────────────────

    /// Call `update(delta_seconds)` on every backend exactly once, in slot
    /// order.
    ///
    /// A backend returning `Err` is logged and skipped; the kinds that
    /// failed are returned.  Panics are not caught.
    pub fn update_all(&mut self, delta_seconds: f32) -> Vec<BackendKind> {
        let mut failed = Vec::new();
        for registered in self.slots.iter_mut().flatten() {
            if let Err(e) = registered.backend.update(delta_seconds) {
                let kind = registered.backend.kind();
                warn!(kind = %kind, error = %e, "backend update failed");
                failed.push(kind);
            }
        }
        failed
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn lookup(&self, kind: BackendKind) -> Option<&dyn Backend> {
        self.slots[kind.index()]
            .as_ref()
            .map(|r| r.backend.as_ref())
    }

    /// Identity of the live backend of `kind`, if any.
    pub fn id_of(&self, kind: BackendKind) -> Option<BackendId> {
        self.slots[kind.index()].as_ref().map(|r| r.id)
    }

    /// Snapshot of the live backend of `kind`, if any.
    pub fn state(&self, kind: BackendKind) -> Option<BackendState> {
        self.lookup(kind).map(|b| b.internal_state())
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Registered kinds, in slot order.
    pub fn kinds(&self) -> impl Iterator<Item = BackendKind> + '_ {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Passthrough video ───────────────────────────────────────────────────

    /// Publish the process-wide passthrough video handle, returning the
    /// previous one.  The media behind either handle stays owned by its
    /// backend.
    pub fn set_passthrough_video(&mut self, video: Option<VideoHandle>) -> Option<VideoHandle> {
        std::mem::replace(&mut self.passthrough_video, video)
    }

    pub fn passthrough_video(&self) -> Option<VideoHandle> {
        self.passthrough_video
    }
}

impl Drop for BackendRegistry {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

async fn initialize_or_dispose(
    backend: &mut dyn Backend,
    ctx: &InitContext,
) -> Result<(), RdkError> {
    let kind = backend.kind();
    if let Err(e) = backend.initialize(ctx).await {
        warn!(kind = %kind, error = %e, "backend initialisation failed");
        backend.dispose();
        return Err(e);
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// SharedRegistry
// ────────────────────────────────────────────────────────────────────────────

/// Cloneable, thread-safe handle to a [`BackendRegistry`].
///
/// The lock is never held across an `.await`: [`register`][Self::register]
/// validates under the lock, initialises with it released, then re-validates
/// and commits.  A pending camera or permission prompt therefore never stalls
/// frame updates or other registrations.
#[derive(Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<BackendRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    /// Process-wide registry, created on first use.
    ///
    /// Prefer owning a registry explicitly; this exists for call sites that
    /// cannot thread one through.
    pub fn global() -> &'static SharedRegistry {
        static GLOBAL: OnceLock<SharedRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SharedRegistry::default)
    }

    /// Lock the registry for direct access.
    pub fn lock(&self) -> MutexGuard<'_, BackendRegistry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`BackendRegistry::register`].  If a conflicting kind was
    /// committed while `initialize` was pending, the newcomer is disposed and
    /// [`RdkError::IncompatibleSession`] returned.
    pub async fn register(
        &self,
        mut backend: Box<dyn Backend>,
        ctx: &InitContext,
    ) -> Result<BackendId, RdkError> {
        {
            let registry = self.lock();
            registry.check_compatible(backend.kind())?;
        }
        initialize_or_dispose(backend.as_mut(), ctx).await?;
        self.lock().commit(backend)
    }

    pub fn unregister(&self, id: BackendId) -> bool {
        self.lock().unregister(id)
    }

    pub fn update_all(&self, delta_seconds: f32) -> Vec<BackendKind> {
        self.lock().update_all(delta_seconds)
    }

    pub fn state(&self, kind: BackendKind) -> Option<BackendState> {
        self.lock().state(kind)
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.lock().contains(kind)
    }

    pub fn set_passthrough_video(&self, video: Option<VideoHandle>) -> Option<VideoHandle> {
        self.lock().set_passthrough_video(video)
    }

    pub fn passthrough_video(&self) -> Option<VideoHandle> {
        self.lock().passthrough_video()
    }

    pub fn dispose_all(&self) {
        self.lock().dispose_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBackend, sim_context};
    use BackendKind::*;

    fn boxed(backend: SimBackend) -> Box<dyn Backend> {
        Box::new(backend)
    }

    #[tokio::test]
    async fn register_then_lookup() {
        let (ctx, _) = sim_context();
        let mut registry = BackendRegistry::new();
        let backend = SimBackend::new(Geolocation);
        let probe = backend.probe();

        let id = registry.register(boxed(backend), &ctx).await.unwrap();

        assert_eq!(probe.init_calls(), 1);
        assert!(registry.contains(Geolocation));
        assert_eq!(registry.lookup(Geolocation).map(|b| b.kind()), Some(Geolocation));
        assert_eq!(registry.id_of(Geolocation), Some(id));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn incompatible_kind_is_rejected_without_initialising() {
        let (ctx, _) = sim_context();
        let mut registry = BackendRegistry::new();
        registry
            .register(boxed(SimBackend::new(Geolocation)), &ctx)
            .await
            .unwrap();

        let fiducial = SimBackend::new(Fiducial);
        let probe = fiducial.probe();
        let err = registry.register(boxed(fiducial), &ctx).await.unwrap_err();

        assert_eq!(
            err,
            RdkError::IncompatibleSession {
                requested: Fiducial,
                conflicting: Geolocation,
            }
        );
        assert_eq!(probe.init_calls(), 0);
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec![Geolocation]);
    }

    #[tokio::test]
    async fn immersive_and_magic_are_exclusive() {
        let (ctx, _) = sim_context();
        let mut registry = BackendRegistry::new();
        registry
            .register(boxed(SimBackend::new(Magic)), &ctx)
            .await
            .unwrap();
        let result = registry.register(boxed(SimBackend::new(Immersive)), &ctx).await;
        assert!(matches!(result, Err(RdkError::IncompatibleSession { .. })));

        // Compatible kinds still coexist.
        registry
            .register(boxed(SimBackend::new(Fiducial)), &ctx)
            .await
            .unwrap();
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec![Fiducial, Magic]);
    }

    #[tokio::test]
    async fn same_kind_replaces_and_disposes_once() {
        let (ctx, _) = sim_context();
        let mut registry = BackendRegistry::new();

        let first = SimBackend::new(Geolocation);
        let first_probe = first.probe();
        let first_id = registry.register(boxed(first), &ctx).await.unwrap();

        let second = SimBackend::new(Geolocation);
        let second_probe = second.probe();
        let second_id = registry.register(boxed(second), &ctx).await.unwrap();

        assert_ne!(first_id, second_id);
        assert_eq!(first_probe.dispose_calls(), 1);
        assert_eq!(second_probe.dispose_calls(), 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.id_of(Geolocation), Some(second_id));
    }

    #[tokio::test]
    async fn failed_initialise_disposes_and_leaves_registry_unchanged() {
        let (ctx, _) = sim_context();
        let mut registry = BackendRegistry::new();
        let live = SimBackend::new(Magic);
        let live_probe = live.probe();
        registry.register(boxed(live), &ctx).await.unwrap();

        let broken = SimBackend::new(Magic).failing_init();
        let broken_probe = broken.probe();
        let err = registry.register(boxed(broken), &ctx).await.unwrap_err();

        assert!(matches!(err, RdkError::Backend { kind: Magic, .. }));
        assert_eq!(broken_probe.init_calls(), 1);
        assert_eq!(broken_probe.dispose_calls(), 1);
        // The live instance was not replaced.
        assert_eq!(live_probe.dispose_calls(), 0);
        assert!(registry.contains(Magic));
    }

    #[tokio::test]
    async fn unregister_disposes_exactly_once() {
        let (ctx, _) = sim_context();
        let mut registry = BackendRegistry::new();
        let backend = SimBackend::new(Fiducial);
        let probe = backend.probe();
        let id = registry.register(boxed(backend), &ctx).await.unwrap();

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(probe.dispose_calls(), 1);
        assert!(registry.lookup(Fiducial).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn stale_id_does_not_remove_replacement() {
        let (ctx, _) = sim_context();
        let mut registry = BackendRegistry::new();
        let stale = registry
            .register(boxed(SimBackend::new(Geolocation)), &ctx)
            .await
            .unwrap();
        let replacement = SimBackend::new(Geolocation);
        let probe = replacement.probe();
        registry.register(boxed(replacement), &ctx).await.unwrap();

        assert!(!registry.unregister(stale));
        assert!(registry.contains(Geolocation));
        assert_eq!(probe.dispose_calls(), 0);
    }

    #[tokio::test]
    async fn update_all_reaches_every_backend_once() {
        let (ctx, _) = sim_context();
        let mut registry = BackendRegistry::new();
        let a = SimBackend::new(Fiducial);
        let b = SimBackend::new(Magic);
        let (pa, pb) = (a.probe(), b.probe());
        registry.register(boxed(a), &ctx).await.unwrap();
        registry.register(boxed(b), &ctx).await.unwrap();

        let failed = registry.update_all(0.25);

        assert!(failed.is_empty());
        assert_eq!(pa.update_calls(), 1);
        assert_eq!(pb.update_calls(), 1);
        assert!((pa.last_delta() - 0.25).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn failing_update_is_isolated() {
        let (ctx, _) = sim_context();
        let mut registry = BackendRegistry::new();
        let bad = SimBackend::new(Fiducial).failing_update();
        let good = SimBackend::new(Magic);
        let (bad_probe, good_probe) = (bad.probe(), good.probe());
        registry.register(boxed(bad), &ctx).await.unwrap();
        registry.register(boxed(good), &ctx).await.unwrap();

        let failed = registry.update_all(0.016);

        assert_eq!(failed, vec![Fiducial]);
        assert_eq!(bad_probe.update_calls(), 1);
        assert_eq!(good_probe.update_calls(), 1);
    }

    #[tokio::test]
    async fn dispose_all_and_drop_tear_down_once() {
        let (ctx, _) = sim_context();
        let backend = SimBackend::new(Immersive);
        let probe = backend.probe();
        {
            let mut registry = BackendRegistry::new();
            registry.register(boxed(backend), &ctx).await.unwrap();
            registry.dispose_all();
            assert!(registry.is_empty());
        }
        assert_eq!(probe.dispose_calls(), 1);

        let dropped = SimBackend::new(Fiducial);
        let dropped_probe = dropped.probe();
        {
            let mut registry = BackendRegistry::new();
            registry.register(boxed(dropped), &ctx).await.unwrap();
        }
        assert_eq!(dropped_probe.dispose_calls(), 1);
    }

    #[test]
    fn passthrough_video_is_replaced_not_disposed() {
        let mut registry = BackendRegistry::new();
        assert_eq!(registry.set_passthrough_video(Some(VideoHandle(1))), None);
        assert_eq!(registry.set_passthrough_video(Some(VideoHandle(2))), Some(VideoHandle(1)));
        assert_eq!(registry.passthrough_video(), Some(VideoHandle(2)));
        registry.set_passthrough_video(None);
        assert_eq!(registry.passthrough_video(), None);
    }

    #[test]
    fn custom_compatibility_rules() {
        let registry = BackendRegistry::with_compatibility(CompatibilitySet::empty());
        assert!(registry.check_compatible(Fiducial).is_ok());
        assert!(!registry.compatibility().conflicts(Fiducial, Geolocation));
    }

    #[tokio::test]
    async fn shared_register_revalidates_before_commit() {
        let (ctx, _) = sim_context();
        let shared = SharedRegistry::default();

        // Simulate a conflicting kind landing while initialise was pending:
        // validate, then sneak a geolocation backend in before committing.
        let mut fiducial: Box<dyn Backend> = Box::new(SimBackend::new(Fiducial));
        shared.lock().check_compatible(Fiducial).unwrap();
        shared
            .register(boxed(SimBackend::new(Geolocation)), &ctx)
            .await
            .unwrap();
        fiducial.initialize(&ctx).await.unwrap();

        let err = shared.lock().commit(fiducial).unwrap_err();
        assert!(matches!(err, RdkError::IncompatibleSession { .. }));
        assert!(!shared.contains(Fiducial));
    }

    #[tokio::test]
    async fn shared_registry_round_trip() {
        let (ctx, _) = sim_context();
        let shared = SharedRegistry::default();
        let backend = SimBackend::new(Magic);
        let probe = backend.probe();

        let id = shared.register(boxed(backend), &ctx).await.unwrap();
        let clone = shared.clone();
        assert!(clone.contains(Magic));
        assert_eq!(clone.state(Magic), Some(BackendState::Empty));
        assert!(clone.update_all(0.1).is_empty());
        assert_eq!(probe.update_calls(), 1);

        clone.set_passthrough_video(Some(VideoHandle(9)));
        assert_eq!(shared.passthrough_video(), Some(VideoHandle(9)));

        assert!(shared.unregister(id));
        assert_eq!(probe.dispose_calls(), 1);
    }

    #[test]
    fn global_registry_is_a_singleton() {
        let a = SharedRegistry::global() as *const SharedRegistry;
        let b = SharedRegistry::global() as *const SharedRegistry;
        assert_eq!(a, b);
    }
}
