use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use ibl_asteroids::{
    assets::{AssetCache, AssetKey, AssetKind},
    camera::OrbitCamera,
    config::{CameraConfig, EnvironmentConfig},
    demo::advance_frame,
    environment::Environment,
    post::RenderQueue,
    scene::SceneManager,
    world::World,
};

pub(crate) const FRAME: Duration = Duration::from_micros(16_667);

/// Stand-in for a GPU asset: remembers its path and counts its disposal.
#[derive(Debug)]
pub(crate) struct ProbeAsset {
    pub path: String,
    drops: Arc<AtomicUsize>,
}

impl Drop for ProbeAsset {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counts loads and disposals of [`ProbeAsset`]s.
#[derive(Debug, Clone, Default)]
pub(crate) struct Probe {
    loads: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    pub fn loader(&self) -> impl FnMut(&AssetKey) -> anyhow::Result<ProbeAsset> + 'static {
        let probe = self.clone();
        move |key: &AssetKey| {
            if key.path.contains("broken") {
                anyhow::bail!("corrupt file {}", key.path);
            }
            probe.loads.fetch_add(1, Ordering::SeqCst);
            Ok(ProbeAsset {
                path: key.path.clone(),
                drops: probe.drops.clone(),
            })
        }
    }

    pub fn cache(&self) -> AssetCache<ProbeAsset> {
        let mut cache = AssetCache::new();
        cache.set_loader(AssetKind::Scene, ".gltf", self.loader());
        cache
    }
}

pub(crate) fn scene_manager() -> SceneManager {
    let camera = OrbitCamera::new(&CameraConfig::default(), 1024, 768);
    SceneManager::new(camera, Environment::from_config(&EnvironmentConfig::default()))
}

pub(crate) fn world(probe: &Probe) -> World<ProbeAsset> {
    World::new(scene_manager(), probe.cache())
}

/// Run ~60 fps frames of render-thread work until `until` has passed since
/// `start`, calling `inspect` after every frame.
pub(crate) fn run_frames<A>(
    queue: &RenderQueue<World<A>>,
    world: &mut World<A>,
    start: Instant,
    until: Duration,
    mut inspect: impl FnMut(&World<A>),
) -> u64 {
    let mut frames = 0;
    let mut last = Instant::now();
    while start.elapsed() < until {
        let dt = last.elapsed();
        last = Instant::now();
        advance_frame(queue, world, start.elapsed().as_secs_f32(), dt);
        inspect(world);
        frames += 1;
        thread::sleep(FRAME);
    }
    frames
}
