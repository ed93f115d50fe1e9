//! Reference-counted asset cache.
//!
//! Assets are requested with [`AssetCache::load`] and materialised by
//! [`AssetCache::update`] or [`AssetCache::finish_loading`]. Every `load` of a
//! path takes a reference; every [`AssetCache::unload`] drops one. When the
//! last reference goes, the asset is dropped and with it any GPU resources it
//! owns. The cache is the only owner of loaded assets: everything else refers
//! to them through an [`AssetKey`] and borrows them with [`AssetCache::get`].
//!
//! The cache is not synchronised. It lives on the render thread (inside
//! [`crate::world::World`]) and other threads reach it by posting onto the
//! render queue.

use std::{
    collections::{HashMap, VecDeque},
    fmt::{Debug, Display},
};

/// Type tag of an asset. A path is always loaded as exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Scene,
    Texture,
    Cubemap,
}

impl Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssetKind::Scene => "scene",
            AssetKind::Texture => "texture",
            AssetKind::Cubemap => "cubemap",
        };
        f.write_str(name)
    }
}

/// Identifies an asset in the cache: the file path plus its type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey {
    pub path: String,
    pub kind: AssetKind,
}

impl AssetKey {
    pub fn new(path: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn scene(path: impl Into<String>) -> Self {
        Self::new(path, AssetKind::Scene)
    }
}

impl Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.path, self.kind)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("no loader registered for {kind} asset '{path}'")]
    NoLoader { path: String, kind: AssetKind },
    #[error("asset '{0}' is not loaded")]
    NotLoaded(String),
    #[error("asset '{path}' is a {found}, not a {expected}")]
    KindMismatch {
        path: String,
        expected: AssetKind,
        found: AssetKind,
    },
    #[error("failed to load '{path}': {source}")]
    Load {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Turns a key into an asset.
///
/// Implemented for closures, which keeps tests free of any GPU.
pub trait AssetLoader<A> {
    fn load(&mut self, key: &AssetKey) -> anyhow::Result<A>;
}

impl<A, F> AssetLoader<A> for F
where
    F: FnMut(&AssetKey) -> anyhow::Result<A>,
{
    fn load(&mut self, key: &AssetKey) -> anyhow::Result<A> {
        self(key)
    }
}

/// What [`AssetCache::unload`] did with the reference it dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadOutcome {
    /// The last reference went away and the asset was dropped.
    Disposed,
    /// Other references remain.
    Retained(usize),
    /// The asset had not been loaded yet and its pending load was cancelled.
    Dequeued,
}

struct Slot<A> {
    kind: AssetKind,
    asset: A,
    refs: usize,
}

struct Pending {
    kind: AssetKind,
    refs: usize,
}

struct RegisteredLoader<A> {
    kind: AssetKind,
    suffix: String,
    loader: Box<dyn AssetLoader<A>>,
}

pub struct AssetCache<A> {
    loaders: Vec<RegisteredLoader<A>>,
    loaded: HashMap<String, Slot<A>>,
    pending: HashMap<String, Pending>,
    queue: VecDeque<String>,
    // for progress reporting since the queue was last empty
    queued_total: usize,
}

impl<A> AssetCache<A> {
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
            loaded: HashMap::new(),
            pending: HashMap::new(),
            queue: VecDeque::new(),
            queued_total: 0,
        }
    }

    /// Register `loader` for assets of `kind` whose path ends with `suffix`.
    ///
    /// The longest matching suffix wins; an empty suffix matches any path.
    /// Registering the same kind and suffix again replaces the old loader.
    pub fn set_loader<L>(&mut self, kind: AssetKind, suffix: &str, loader: L)
    where
        L: AssetLoader<A> + 'static,
    {
        self.loaders
            .retain(|registered| !(registered.kind == kind && registered.suffix == suffix));
        self.loaders.push(RegisteredLoader {
            kind,
            suffix: suffix.to_string(),
            loader: Box::new(loader),
        });
    }

    /// Request `path` as an asset of `kind` and take a reference to it.
    ///
    /// Nothing is read until [`update`](Self::update) or
    /// [`finish_loading`](Self::finish_loading) runs. Requesting a path that is
    /// already loaded or queued only bumps its reference count.
    pub fn load(&mut self, path: &str, kind: AssetKind) -> Result<(), AssetError> {
        if let Some(slot) = self.loaded.get_mut(path) {
            if slot.kind != kind {
                return Err(AssetError::KindMismatch {
                    path: path.to_string(),
                    expected: kind,
                    found: slot.kind,
                });
            }
            slot.refs += 1;
            log::debug!("'{}' already loaded, {} reference(s)", path, slot.refs);
            return Ok(());
        }
        if let Some(pending) = self.pending.get_mut(path) {
            if pending.kind != kind {
                return Err(AssetError::KindMismatch {
                    path: path.to_string(),
                    expected: kind,
                    found: pending.kind,
                });
            }
            pending.refs += 1;
            return Ok(());
        }
        if self.find_loader(path, kind).is_none() {
            return Err(AssetError::NoLoader {
                path: path.to_string(),
                kind,
            });
        }
        log::debug!("queueing {} '{}'", kind, path);
        self.pending
            .insert(path.to_string(), Pending { kind, refs: 1 });
        self.queue.push_back(path.to_string());
        self.queued_total += 1;
        Ok(())
    }

    /// Load the next queued asset, if any.
    ///
    /// Returns `Ok(true)` once nothing is left in the queue. A failed load
    /// removes the asset from the queue and returns the error.
    pub fn update(&mut self) -> Result<bool, AssetError> {
        let Some(path) = self.queue.pop_front() else {
            self.queued_total = 0;
            return Ok(true);
        };
        let Some(pending) = self.pending.remove(&path) else {
            // unloaded while queued
            return Ok(self.queue.is_empty());
        };
        let key = AssetKey::new(path.clone(), pending.kind);
        let loader = self
            .find_loader(&path, pending.kind)
            .ok_or_else(|| AssetError::NoLoader {
                path: path.clone(),
                kind: pending.kind,
            })?;
        let asset = self.loaders[loader]
            .loader
            .load(&key)
            .map_err(|source| AssetError::Load {
                path: path.clone(),
                source,
            })?;
        log::info!("loaded {}", key);
        self.loaded.insert(
            path,
            Slot {
                kind: pending.kind,
                asset,
                refs: pending.refs,
            },
        );
        if self.queue.is_empty() {
            self.queued_total = 0;
            return Ok(true);
        }
        Ok(false)
    }

    /// Block until every queued asset is loaded. Stops at the first failure.
    pub fn finish_loading(&mut self) -> Result<(), AssetError> {
        while !self.update()? {}
        Ok(())
    }

    /// Fraction of the current batch of queued assets that finished loading.
    pub fn progress(&self) -> f32 {
        if self.queued_total == 0 {
            return 1.0;
        }
        let done = self.queued_total - self.queue.len();
        done as f32 / self.queued_total as f32
    }

    /// Borrow a loaded asset.
    pub fn get(&self, path: &str, kind: AssetKind) -> Result<&A, AssetError> {
        let slot = self
            .loaded
            .get(path)
            .ok_or_else(|| AssetError::NotLoaded(path.to_string()))?;
        if slot.kind != kind {
            return Err(AssetError::KindMismatch {
                path: path.to_string(),
                expected: kind,
                found: slot.kind,
            });
        }
        Ok(&slot.asset)
    }

    pub fn get_key(&self, key: &AssetKey) -> Result<&A, AssetError> {
        self.get(&key.path, key.kind)
    }

    /// Drop one reference to `path`. The asset is disposed with the last one.
    pub fn unload(&mut self, path: &str) -> Result<UnloadOutcome, AssetError> {
        if let Some(pending) = self.pending.get_mut(path) {
            pending.refs -= 1;
            if pending.refs > 0 {
                return Ok(UnloadOutcome::Retained(pending.refs));
            }
            self.pending.remove(path);
            self.queue.retain(|queued| queued != path);
            self.queued_total = self.queued_total.saturating_sub(1);
            log::debug!("cancelled pending load of '{}'", path);
            return Ok(UnloadOutcome::Dequeued);
        }
        let Some(slot) = self.loaded.get_mut(path) else {
            log::warn!("unload requested for '{}', which is not loaded", path);
            return Err(AssetError::NotLoaded(path.to_string()));
        };
        slot.refs -= 1;
        if slot.refs > 0 {
            log::debug!("'{}' still has {} reference(s)", path, slot.refs);
            return Ok(UnloadOutcome::Retained(slot.refs));
        }
        if let Some(slot) = self.loaded.remove(path) {
            log::info!("disposing {} '{}'", slot.kind, path);
            drop(slot.asset);
        }
        Ok(UnloadOutcome::Disposed)
    }

    pub fn is_loaded(&self, path: &str) -> bool {
        self.loaded.contains_key(path)
    }

    pub fn is_queued(&self, path: &str) -> bool {
        self.pending.contains_key(path)
    }

    /// References held on `path`, loaded or queued. Zero for unknown paths.
    pub fn ref_count(&self, path: &str) -> usize {
        self.loaded
            .get(path)
            .map(|slot| slot.refs)
            .or_else(|| self.pending.get(path).map(|pending| pending.refs))
            .unwrap_or(0)
    }

    pub fn loaded_paths(&self) -> Vec<&str> {
        self.loaded.keys().map(String::as_str).collect()
    }

    /// Dispose every asset regardless of its reference count and forget all
    /// pending loads.
    pub fn clear(&mut self) {
        if !self.loaded.is_empty() {
            log::info!("disposing {} remaining asset(s)", self.loaded.len());
        }
        self.loaded.clear();
        self.pending.clear();
        self.queue.clear();
        self.queued_total = 0;
    }

    fn find_loader(&self, path: &str, kind: AssetKind) -> Option<usize> {
        self.loaders
            .iter()
            .enumerate()
            .filter(|(_, registered)| registered.kind == kind && path.ends_with(&registered.suffix))
            .max_by_key(|(_, registered)| registered.suffix.len())
            .map(|(idx, _)| idx)
    }
}

impl<A> Default for AssetCache<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Debug for AssetCache<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("loaded", &self.loaded.keys().collect::<Vec<_>>())
            .field("queued", &self.queue)
            .field("loaders", &self.loaders.len())
            .finish()
    }
}
