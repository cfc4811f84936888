//! `rdk-session` – backend session management.
//!
//! Owns the tracking and presentation backends attached to a scene and
//! decides which of them may run together.
//!
//! # Modules
//!
//! - [`backend`] – the [`Backend`][backend::Backend] trait every tracker
//!   implements, plus the [`ImmersiveBackend`][backend::ImmersiveBackend]
//!   marker for host-managed XR sessions.
//! - [`compat`] – [`CompatibilitySet`][compat::CompatibilitySet]: mutually
//!   exclusive kind pairs.
//! - [`registry`] – [`BackendRegistry`][registry::BackendRegistry] and its
//!   thread-safe wrapper [`SharedRegistry`][registry::SharedRegistry].
//! - [`render`] – scene, camera, renderer and node seams, and the
//!   [`InitContext`][render::InitContext] handed to backends.
//! - [`sim`] – in-process doubles for headless testing.

pub mod backend;
pub mod compat;
pub mod registry;
pub mod render;
pub mod sim;

pub use backend::{Backend, ImmersiveBackend};
pub use compat::CompatibilitySet;
pub use registry::{BackendRegistry, SharedRegistry};
pub use render::InitContext;
