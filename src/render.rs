//! Drawing the scene collection.
//!
//! [`SceneRenderer`] is the GPU half of [`crate::scene::SceneManager`]. It owns
//! the PBR pipeline, the camera uniform and one instance buffer per live scene
//! entry. Each buffer holds one [`InstanceRaw`] per part of the entry's asset,
//! so drawing part `i` uses instance range `i..i + 1`.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::{
    camera::CameraResources,
    data_structures::{
        instance::{Instance, InstanceRaw},
        model::{DrawModel, SceneAsset},
        texture::Texture,
    },
    environment::EnvironmentResources,
    pipelines::pbr::mk_pbr_pipeline,
    resources::texture::material_layout,
    scene::SceneId,
    world::World,
};

#[derive(Debug)]
struct EntryBuffer {
    buffer: wgpu::Buffer,
    transform: Instance,
    parts: usize,
}

#[derive(Debug)]
pub struct SceneRenderer {
    pipeline: wgpu::RenderPipeline,
    pub material_layout: wgpu::BindGroupLayout,
    pub camera: CameraResources,
    instances: HashMap<SceneId, EntryBuffer>,
}

impl SceneRenderer {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        camera: CameraResources,
        environment: &EnvironmentResources,
    ) -> Self {
        let material_layout = material_layout(device);
        let pipeline = mk_pbr_pipeline(
            device,
            color_format,
            &material_layout,
            &camera.bind_group_layout,
            &environment.bind_group_layout,
        );
        Self {
            pipeline,
            material_layout,
            camera,
            instances: HashMap::new(),
        }
    }

    /// Sync GPU state with the world: upload the camera, create buffers for new
    /// entries, rewrite moved ones and drop those of removed entries.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, world: &World<SceneAsset>) {
        self.camera.write(queue, &world.scenes.camera);

        let before = self.instances.len();
        self.instances.retain(|id, _| world.scenes.contains(*id));
        if self.instances.len() != before {
            log::debug!("released {} instance buffer(s)", before - self.instances.len());
        }

        for (id, entry) in world.scenes.entries() {
            let Ok(asset) = world.assets.get_key(&entry.key) else {
                continue;
            };
            if asset.is_empty() {
                self.instances.remove(&id);
                continue;
            }
            match self.instances.get_mut(&id) {
                Some(cached) if cached.parts == asset.parts.len() => {
                    if cached.transform != entry.transform {
                        let raw = part_instances(&entry.transform, asset);
                        queue.write_buffer(&cached.buffer, 0, bytemuck::cast_slice(&raw));
                        cached.transform = entry.transform.clone();
                    }
                }
                _ => {
                    let raw = part_instances(&entry.transform, asset);
                    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} Instance Buffer", id)),
                        contents: bytemuck::cast_slice(&raw),
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    });
                    self.instances.insert(
                        id,
                        EntryBuffer {
                            buffer,
                            transform: entry.transform.clone(),
                            parts: asset.parts.len(),
                        },
                    );
                }
            }
        }
    }

    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        depth: &Texture,
        clear_color: wgpu::Color,
        world: &World<SceneAsset>,
        environment: &EnvironmentResources,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&self.pipeline);

        for (id, entry) in world.scenes.entries() {
            let (Some(instances), Ok(asset)) =
                (self.instances.get(&id), world.assets.get_key(&entry.key))
            else {
                continue;
            };
            if asset.is_empty() {
                continue;
            }
            render_pass.set_vertex_buffer(1, instances.buffer.slice(..));
            draw_asset(&mut render_pass, asset, &self.camera.bind_group, &environment.bind_group);
        }
    }

    /// Release every instance buffer.
    pub fn clear(&mut self) {
        self.instances.clear();
    }
}

fn draw_asset<'a>(
    render_pass: &mut wgpu::RenderPass<'a>,
    asset: &'a SceneAsset,
    camera_bind_group: &'a wgpu::BindGroup,
    environment_bind_group: &'a wgpu::BindGroup,
) {
    for (idx, part) in asset.parts.iter().enumerate() {
        let idx = idx as u32;
        render_pass.draw_meshes_instanced(
            &asset.model,
            part.meshes.clone(),
            idx..idx + 1,
            camera_bind_group,
            environment_bind_group,
        );
    }
}

/// World transform of every part: the entry's placement applied on top of the
/// node transform baked into the asset.
pub fn part_instances(placement: &Instance, asset: &SceneAsset) -> Vec<InstanceRaw> {
    let placement = placement.to_matrix();
    asset
        .parts
        .iter()
        .map(|part| InstanceRaw::from_matrix(placement * part.transform))
        .collect()
}
