//! Render-thread state.
//!
//! [`World`] bundles the scene collection with the asset cache. The render
//! loop owns it, hands `&mut World` to every per-frame step and to every task
//! drained from the render queue, so nothing else ever touches either half.

use std::collections::HashMap;

use crate::{
    assets::{AssetCache, AssetError, AssetKey, UnloadOutcome},
    data_structures::instance::Instance,
    scene::{SceneEntry, SceneId, SceneManager},
};

#[derive(Debug)]
pub struct World<A> {
    pub scenes: SceneManager,
    pub assets: AssetCache<A>,
    // the asset reference each spawned entry was created from
    held: HashMap<SceneId, AssetKey>,
}

impl<A> World<A> {
    pub fn new(scenes: SceneManager, assets: AssetCache<A>) -> Self {
        Self {
            scenes,
            assets,
            held: HashMap::new(),
        }
    }

    /// Place a loaded asset in the scene, moved by `translation`.
    ///
    /// Every entry takes its own reference on the asset;
    /// [`despawn`](Self::despawn) gives it back.
    pub fn spawn(
        &mut self,
        key: AssetKey,
        translation: cgmath::Vector3<f32>,
    ) -> Result<SceneId, AssetError> {
        self.assets.get_key(&key)?;
        self.assets.load(&key.path, key.kind)?;
        let entry = SceneEntry::new(key.clone(), Instance::new().translate(translation));
        let id = self.scenes.add_scene(entry);
        self.held.insert(id, key);
        Ok(id)
    }

    /// Remove an entry from the scene, then unload its asset.
    ///
    /// Returns `Ok(None)` when the entry is already gone, so a second call is
    /// a no-op rather than a double unload.
    pub fn despawn(&mut self, id: SceneId) -> Result<Option<UnloadOutcome>, AssetError> {
        let Some(entry) = self.scenes.remove_scene(id) else {
            log::warn!("{} is not in the scene, nothing to despawn", id);
            return Ok(None);
        };
        self.held.remove(&id);
        let outcome = self.assets.unload(&entry.key.path)?;
        log::info!("despawned {} ({}): {:?}", id, entry.key, outcome);
        Ok(Some(outcome))
    }

    /// The asset reference held for `id`, if it was not released yet.
    pub fn held(&self, id: SceneId) -> Option<&AssetKey> {
        self.held.get(&id)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Release every entry and every asset.
    pub fn dispose(&mut self) {
        let mut held: Vec<_> = self.held.drain().collect();
        held.sort_by_key(|(id, _)| *id);
        for (id, key) in held {
            self.scenes.remove_scene(id);
            if let Err(e) = self.assets.unload(&key.path) {
                log::warn!("releasing {} failed: {}", key, e);
            }
        }
        self.scenes.clear();
        self.assets.clear();
    }
}
