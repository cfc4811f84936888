//! `rdk-magic` – the "magic window" backend.
//!
//! Camera passthrough plus device-orientation tracking, for devices without
//! an XR runtime.
//!
//! # Modules
//!
//! - [`config`] – [`MagicOptions`][config::MagicOptions]: filter constants,
//!   feature switches, and camera constraints.
//! - [`platform`] – the host seams the engine consumes: camera access, the
//!   window and its events, and the orientation permission prompt.
//! - [`engine`] – [`MagicBackend`][engine::MagicBackend], the
//!   orientation-fusion engine, and its [`MagicHandle`][engine::MagicHandle].
//! - [`anchor`] – [`WorldAnchorResolver`][anchor::WorldAnchorResolver]:
//!   places scene nodes once an initial orientation exists.
//! - [`sim`] – in-process platform doubles for tests and the demo.

pub mod anchor;
pub mod config;
pub mod engine;
pub mod platform;
pub mod sim;

pub use anchor::{AnchorStatus, AnchorTransform, WorldAnchorResolver};
pub use config::MagicOptions;
pub use engine::{MagicBackend, MagicHandle};
pub use platform::Platform;
