//! Application control flow.
//!
//! [`run`] sets up logging and the winit event loop and hands control to the
//! [`App`]. The app creates the window and the [`Demo`] on `resumed`, advances
//! and draws one frame per `RedrawRequested` and tears the demo down before
//! the event loop exits.

use std::{path::Path, sync::Arc};

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Icon, Window},
};

use crate::{config::AppConfig, demo::Demo, resources::texture::load_image};

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    config: AppConfig,
    state: Option<Demo>,
    // set when startup failed, returned from `run`
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: AppConfig) -> anyhow::Result<Self> {
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            async_runtime,
            config,
            state: None,
            error: None,
        })
    }

    /// First icon of `names` that can be loaded.
    fn load_icon(&self, root: &Path, names: &[String]) -> Option<Icon> {
        names.iter().find_map(|name| {
            let img = match self.async_runtime.block_on(load_image(root, name)) {
                Ok(img) => img.to_rgba8(),
                Err(e) => {
                    log::debug!("skipping window icon {}: {:#}", name, e);
                    return None;
                }
            };
            let (width, height) = img.dimensions();
            Icon::from_rgba(img.into_raw(), width, height)
                .inspect_err(|e| log::warn!("invalid window icon {}: {}", name, e))
                .ok()
        })
    }

    fn teardown(&mut self) {
        if let Some(mut demo) = self.state.take() {
            demo.teardown();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window_config = &self.config.window;
        let mut window_attributes = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height));
        if let Some(icon) = self.load_icon(&self.config.assets.root, &window_config.icons) {
            window_attributes = window_attributes.with_window_icon(Some(icon));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.error = Some(e.into());
                event_loop.exit();
                return;
            }
        };

        match Demo::new(window.clone(), &self.config, &self.async_runtime) {
            Ok(demo) => {
                self.state = Some(demo);
                window.request_redraw();
            }
            Err(e) => {
                log::error!("App initialization failed: {:#}", e);
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let demo = match &mut self.state {
            Some(demo) => demo,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => {
                self.teardown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => demo.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                // invoke main render loop
                demo.ctx.window.request_redraw();
                match demo.frame() {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = demo.ctx.window.inner_size();
                        demo.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.teardown();
    }
}

pub fn run(config: AppConfig) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
