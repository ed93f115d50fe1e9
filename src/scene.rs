//! The active scene collection.
//!
//! A [`SceneManager`] holds the placed entries together with the camera and
//! lighting environment they are rendered with. Entries only refer to their
//! asset through an [`AssetKey`]; the asset itself stays in the cache.

use std::fmt::Display;

use instant::Duration;

use crate::{assets::AssetKey, camera::OrbitCamera, data_structures::instance::Instance, environment::Environment};

/// Opaque handle of a scene entry. Never reused within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(u32);

impl Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// A placed copy of a loaded asset.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneEntry {
    pub key: AssetKey,
    pub transform: Instance,
}

impl SceneEntry {
    pub fn new(key: AssetKey, transform: Instance) -> Self {
        Self { key, transform }
    }
}

#[derive(Debug)]
pub struct SceneManager {
    entries: Vec<(SceneId, SceneEntry)>,
    next_id: u32,
    pub camera: OrbitCamera,
    pub environment: Environment,
    elapsed: Duration,
    frames: u64,
}

impl SceneManager {
    pub fn new(camera: OrbitCamera, environment: Environment) -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            camera,
            environment,
            elapsed: Duration::ZERO,
            frames: 0,
        }
    }

    pub fn add_scene(&mut self, entry: SceneEntry) -> SceneId {
        let id = SceneId(self.next_id);
        self.next_id += 1;
        log::debug!("adding {} for {}", id, entry.key);
        self.entries.push((id, entry));
        id
    }

    /// Remove an entry. Returns `None` if it was already removed.
    pub fn remove_scene(&mut self, id: SceneId) -> Option<SceneEntry> {
        let idx = self.entries.iter().position(|(entry_id, _)| *entry_id == id)?;
        let (_, entry) = self.entries.remove(idx);
        log::debug!("removed {} ({})", id, entry.key);
        Some(entry)
    }

    pub fn contains(&self, id: SceneId) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub fn get(&self, id: SceneId) -> Option<&SceneEntry> {
        self.entries
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, entry)| entry)
    }

    pub fn get_mut(&mut self, id: SceneId) -> Option<&mut SceneEntry> {
        self.entries
            .iter_mut()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, entry)| entry)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (SceneId, &SceneEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance the scene clock by one frame.
    pub fn update(&mut self, dt: Duration) {
        self.elapsed += dt;
        self.frames += 1;
    }

    pub fn update_viewport(&mut self, width: u32, height: u32) {
        self.camera.resize(width, height);
    }

    /// Time accumulated by [`update`](Self::update).
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
