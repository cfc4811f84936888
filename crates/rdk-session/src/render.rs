//! Rendering seams shared by every backend.
//!
//! The session layer never talks to a real renderer.  Backends receive an
//! [`InitContext`] holding shared handles to the host's [`Scene`], [`Camera`]
//! and [`Renderer`]; any implementation of these traits can sit behind them
//! (the [`sim`][crate::sim] module provides in-process doubles).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rdk_perception::{Quaternion, Transform3D, Vec3};
use rdk_types::VideoHandle;

/// What the scene draws behind all content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    /// Live camera passthrough.
    Video(VideoHandle),
    /// Solid `0xRRGGBB` colour.
    Color(u32),
}

/// The host scene graph root.
pub trait Scene: Send {
    fn set_background(&mut self, background: Option<Background>);

    fn background(&self) -> Option<Background>;
}

/// The perspective camera content is rendered through.
pub trait Camera: Send {
    /// World-space position of the camera.
    fn position(&self) -> Vec3;

    fn rotation(&self) -> Quaternion;

    fn set_rotation(&mut self, rotation: Quaternion);

    /// Update the projection aspect ratio (`width / height`).
    fn set_aspect(&mut self, aspect: f32);
}

/// The output surface.
pub trait Renderer: Send {
    /// Resize the drawing buffer, in CSS pixels.
    fn set_size(&mut self, width: u32, height: u32);

    /// Set the clear colour; `alpha == 0.0` makes the canvas fully
    /// transparent so a background video shows through.
    fn set_clear_color(&mut self, rgb: u32, alpha: f32);
}

/// A node in the scene graph that anchored content hangs off.
pub trait SceneNode: Send {
    fn set_transform(&mut self, transform: Transform3D);

    fn transform(&self) -> Transform3D;
}

pub type SharedScene = Arc<Mutex<dyn Scene>>;
pub type SharedCamera = Arc<Mutex<dyn Camera>>;
pub type SharedRenderer = Arc<Mutex<dyn Renderer>>;
pub type SharedNode = Arc<Mutex<dyn SceneNode>>;

/// Handles passed to [`Backend::initialize`][crate::backend::Backend::initialize].
///
/// They stay valid until the backend is disposed; a backend keeps clones of
/// whatever it needs and drops them in `dispose`.
#[derive(Clone)]
pub struct InitContext {
    pub scene: SharedScene,
    pub camera: SharedCamera,
    pub renderer: SharedRenderer,
}

impl InitContext {
    pub fn new(scene: SharedScene, camera: SharedCamera, renderer: SharedRenderer) -> Self {
        Self {
            scene,
            camera,
            renderer,
        }
    }
}

/// Lock a render handle, recovering the guard if a previous holder panicked.
///
/// Everything behind these mutexes is plain data, so a poisoned lock carries
/// no broken invariant worth propagating.
pub fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCamera, SimNode, SimScene};

    #[test]
    fn shared_handles_coerce_to_trait_objects() {
        let scene = Arc::new(Mutex::new(SimScene::default()));
        let shared: SharedScene = scene.clone();
        lock(&shared).set_background(Some(Background::Color(0x202020)));
        assert_eq!(lock(&scene).background(), Some(Background::Color(0x202020)));
    }

    #[test]
    fn lock_recovers_from_poison() {
        let camera = Arc::new(Mutex::new(SimCamera::default()));
        let poisoner = camera.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the camera lock");
        })
        .join();
        assert!(camera.is_poisoned());
        lock(&camera).set_aspect(2.0);
        assert!((lock(&camera).aspect() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn node_round_trips_transform() {
        let node = SimNode::shared();
        let t = Transform3D::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::identity());
        lock(&node).set_transform(t);
        assert_eq!(lock(&node).transform(), t);
    }
}
