//! Which backend kinds may run side by side.

use rdk_types::BackendKind;

/// Symmetric relation of mutually exclusive [`BackendKind`] pairs.
///
/// Registering a kind that conflicts with an already registered kind is
/// rejected.  A kind never conflicts with itself: registering it again
/// replaces the live instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilitySet {
    exclusive: Vec<(BackendKind, BackendKind)>,
}

impl Default for CompatibilitySet {
    /// Fiducial and geolocation both drive world tracking; immersive and
    /// magic-window both own the camera loop.
    fn default() -> Self {
        Self::empty()
            .with_exclusive(BackendKind::Fiducial, BackendKind::Geolocation)
            .with_exclusive(BackendKind::Immersive, BackendKind::Magic)
    }
}

impl CompatibilitySet {
    /// A set in which every combination is allowed.
    pub fn empty() -> Self {
        Self {
            exclusive: Vec::new(),
        }
    }

    /// Declare `a` and `b` mutually exclusive.  Self-pairs are ignored.
    pub fn with_exclusive(mut self, a: BackendKind, b: BackendKind) -> Self {
        if a != b && !self.conflicts(a, b) {
            self.exclusive.push((a, b));
        }
        self
    }

    /// `true` when `a` and `b` may not be registered at the same time.
    pub fn conflicts(&self, a: BackendKind, b: BackendKind) -> bool {
        self.exclusive
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    /// First kind in `registered` that conflicts with `candidate`.
    pub fn first_conflict(
        &self,
        candidate: BackendKind,
        registered: impl IntoIterator<Item = BackendKind>,
    ) -> Option<BackendKind> {
        registered
            .into_iter()
            .find(|&kind| self.conflicts(candidate, kind))
    }
}
