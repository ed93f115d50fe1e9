//! The asteroid demo.
//!
//! Two asteroids are loaded and placed side by side. After a delay, a
//! [`DeferredTask`] posts the removal of the green one onto the render queue;
//! the render loop runs it between two frames, which removes the entry from the
//! scene and unloads the asset.
//!
//! The GPU-free helpers ([`place_asteroids`], [`schedule_unload`],
//! [`advance_frame`]) are generic over the asset type so the lifecycle can be
//! driven without a device. [`Demo`] wires them to the real renderer.

use std::sync::Arc;

use cgmath::Vector3;
use instant::{Duration, Instant};
use winit::window::Window;

use crate::{
    assets::{AssetCache, AssetError, AssetKey, AssetKind},
    camera::{CameraResources, OrbitCamera},
    config::{AppConfig, AssetConfig},
    context::Context,
    data_structures::model::SceneAsset,
    environment::{Environment, EnvironmentResources},
    post::{RenderPoster, RenderQueue},
    render::SceneRenderer,
    resources::{self, GltfLoader},
    scene::{SceneId, SceneManager},
    schedule::{DeferredTask, ScheduleError},
    world::World,
};

/// Scene entries of the two asteroids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asteroids {
    pub blue: SceneId,
    pub green: SceneId,
}

/// Queue both asteroids, load them and place them in the scene.
pub fn place_asteroids<A>(world: &mut World<A>, assets: &AssetConfig) -> Result<Asteroids, AssetError> {
    world.assets.load(&assets.blue, AssetKind::Scene)?;
    world.assets.load(&assets.green, AssetKind::Scene)?;
    world.assets.finish_loading()?;

    let blue = world.spawn(AssetKey::scene(&assets.blue), Vector3::from(assets.blue_offset))?;
    let green = world.spawn(AssetKey::scene(&assets.green), Vector3::from(assets.green_offset))?;
    // the entries hold the assets from here on
    world.assets.unload(&assets.blue)?;
    world.assets.unload(&assets.green)?;
    log::info!("placed blue asteroid as {} and green asteroid as {}", blue, green);
    Ok(Asteroids { blue, green })
}

/// Remove `id` from the scene and unload its asset on the render thread once
/// `delay` has passed.
pub fn schedule_unload<A: 'static>(
    delay: Duration,
    poster: RenderPoster<World<A>>,
    id: SceneId,
) -> Result<DeferredTask, ScheduleError> {
    DeferredTask::schedule(format!("unload-{}", id), delay, poster, move |world: &mut World<A>| {
        if let Err(e) = world.despawn(id) {
            log::error!("unloading {} failed: {}", id, e);
        }
    })
}

/// One frame of render-thread work ahead of drawing: posted tasks first, then
/// the camera orbit, then the scene clock.
pub fn advance_frame<A>(queue: &RenderQueue<World<A>>, world: &mut World<A>, time: f32, dt: Duration) {
    queue.drain(world);
    world.scenes.camera.orbit(time);
    world.scenes.update(dt);
}

// Field order is drop order: the GPU context must outlive everything it created.
pub struct Demo {
    unload: Option<DeferredTask>,
    queue: RenderQueue<World<SceneAsset>>,
    pub world: World<SceneAsset>,
    renderer: SceneRenderer,
    environment: EnvironmentResources,
    pub asteroids: Asteroids,
    started: Instant,
    last_frame: Instant,
    pub ctx: Context,
}

impl Demo {
    /// Set up the GPU, load every asset and schedule the green asteroid's unload.
    ///
    /// Blocks on `runtime` for IO, so it must not be called from inside it.
    pub fn new(
        window: Arc<Window>,
        config: &AppConfig,
        runtime: &tokio::runtime::Runtime,
    ) -> anyhow::Result<Self> {
        let [r, g, b, a] = config.window.clear_color;
        let mut ctx = runtime.block_on(Context::new(window, wgpu::Color { r, g, b, a }))?;
        let (width, height) = ctx.size();
        ctx.resize(width, height);

        let camera = OrbitCamera::new(&config.camera, width, height);
        let scene_environment = Environment::from_config(&config.environment);
        let environment = runtime.block_on(resources::load_environment(
            &config.assets.root,
            &config.environment,
            &scene_environment,
            &ctx.device,
            &ctx.queue,
        ))?;
        let camera_resources = CameraResources::new(&ctx.device, &camera);
        let renderer = SceneRenderer::new(&ctx.device, ctx.config.format, camera_resources, &environment);

        let mut assets = AssetCache::new();
        assets.set_loader(
            AssetKind::Scene,
            ".gltf",
            GltfLoader::new(
                ctx.device.clone(),
                ctx.queue.clone(),
                renderer.material_layout.clone(),
                config.assets.root.clone(),
                runtime.handle().clone(),
            ),
        );
        assets.set_loader(
            AssetKind::Scene,
            ".glb",
            GltfLoader::new(
                ctx.device.clone(),
                ctx.queue.clone(),
                renderer.material_layout.clone(),
                config.assets.root.clone(),
                runtime.handle().clone(),
            ),
        );
        let mut world = World::new(SceneManager::new(camera, scene_environment), assets);
        let asteroids = place_asteroids(&mut world, &config.assets)?;

        let queue = RenderQueue::new();
        let unload = schedule_unload(config.unload_delay(), queue.poster(), asteroids.green)?;
        log::info!("green asteroid will be unloaded in {:?}", config.unload_delay());

        let now = Instant::now();
        Ok(Self {
            unload: Some(unload),
            queue,
            world,
            renderer,
            environment,
            asteroids,
            started: now,
            last_frame: now,
            ctx,
        })
    }

    /// Run posted tasks, advance the scene and draw it.
    pub fn frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let dt = self.last_frame.elapsed();
        self.last_frame = Instant::now();
        let time = self.started.elapsed().as_secs_f32();
        advance_frame(&self.queue, &mut self.world, time, dt);

        if !self.ctx.is_surface_configured() {
            return Ok(());
        }
        self.environment.write(&self.ctx.queue, &self.world.scenes.environment);
        self.renderer.prepare(&self.ctx.device, &self.ctx.queue, &self.world);

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        self.renderer.render(
            &mut encoder,
            &view,
            &self.ctx.depth_texture,
            self.ctx.clear_colour,
            &self.world,
            &self.environment,
        );
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.ctx.resize(width, height) {
            self.world.scenes.update_viewport(width, height);
        }
    }

    /// Release everything in dependency order: pending tasks, the render
    /// queue, scene and assets. The GPU context goes last, with `self`.
    pub fn teardown(&mut self) {
        if self.queue.is_closed() {
            return;
        }
        if let Some(task) = self.unload.take() {
            task.cancel();
        }
        self.queue.close();
        self.renderer.clear();
        self.world.dispose();
        log::info!("demo torn down");
    }
}

impl Drop for Demo {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Demo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Demo")
            .field("asteroids", &self.asteroids)
            .field("entries", &self.world.scenes.len())
            .field("unload", &self.unload)
            .finish()
    }
}
