//! Lighting environment: ambient factor, directional lights and the
//! image-based lighting maps.
//!
//! [`Environment`] is plain data owned by the scene manager. The GPU half,
//! [`EnvironmentResources`], holds the BRDF lookup table and the diffuse and
//! specular cubemaps and binds them together with the light uniform.

use serde::{Deserialize, Serialize};
use wgpu::util::DeviceExt;

use crate::{
    config::EnvironmentConfig,
    data_structures::texture::{self, Cubemap, Texture},
};

/// The shader has a fixed number of directional light slots.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 2;

/// Face names in wgpu layer order: +X, -X, +Y, -Y, +Z, -Z.
pub const FACE_NAMES_FULL: [&str; 6] = ["right", "left", "top", "bottom", "front", "back"];

/// `prefix + face + suffix` for every face, in layer order.
pub fn face_paths(prefix: &str, suffix: &str) -> [String; 6] {
    FACE_NAMES_FULL.map(|face| format!("{prefix}{face}{suffix}"))
}

/// Face paths of every mip level: `prefix + face + separator + level + suffix`.
pub fn mip_face_paths(prefix: &str, separator: &str, suffix: &str, levels: u32) -> Vec<[String; 6]> {
    (0..levels)
        .map(|level| face_paths(prefix, &format!("{separator}{level}{suffix}")))
        .collect()
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EnvironmentError {
    #[error("at most {max} directional lights are supported")]
    TooManyLights { max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalLight {
    /// Direction the light travels in. Need not be normalised.
    pub direction: [f32; 3],
    pub color: [f32; 3],
    pub intensity: f32,
}

impl DirectionalLight {
    pub fn white(direction: [f32; 3]) -> Self {
        Self {
            direction,
            color: [1.0; 3],
            intensity: 1.0,
        }
    }

    pub fn normalized_direction(&self) -> [f32; 3] {
        use cgmath::InnerSpace;
        let direction = cgmath::Vector3::from(self.direction);
        if direction.magnitude2() == 0.0 {
            // Straight down rather than NaNs in the shader
            return [0.0, -1.0, 0.0];
        }
        direction.normalize().into()
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::white([0.0, -1.0, 0.0])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Scales the image-based lighting contribution.
    pub ambient: f32,
    lights: Vec<DirectionalLight>,
}

impl Environment {
    pub fn new(ambient: f32) -> Self {
        Self {
            ambient,
            lights: Vec::new(),
        }
    }

    /// Build from config. Lights past [`MAX_DIRECTIONAL_LIGHTS`] are ignored
    /// with a warning.
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        let mut environment = Self::new(config.ambient);
        for light in &config.lights {
            if let Err(e) = environment.add_light(*light) {
                log::warn!("ignoring directional light {:?}: {}", light.direction, e);
            }
        }
        environment
    }

    pub fn add_light(&mut self, light: DirectionalLight) -> Result<(), EnvironmentError> {
        if self.lights.len() >= MAX_DIRECTIONAL_LIGHTS {
            return Err(EnvironmentError::TooManyLights {
                max: MAX_DIRECTIONAL_LIGHTS,
            });
        }
        self.lights.push(light);
        Ok(())
    }

    pub fn lights(&self) -> &[DirectionalLight] {
        &self.lights
    }

    pub fn to_uniform(&self, specular_mip_levels: u32) -> EnvironmentUniform {
        let mut lights = [<LightRaw as bytemuck::Zeroable>::zeroed(); MAX_DIRECTIONAL_LIGHTS];
        for (raw, light) in lights.iter_mut().zip(&self.lights) {
            let [x, y, z] = light.normalized_direction();
            let [r, g, b] = light.color;
            raw.direction = [x, y, z, 0.0];
            raw.color = [r * light.intensity, g * light.intensity, b * light.intensity, 1.0];
        }
        EnvironmentUniform {
            lights,
            ambient: self.ambient,
            light_count: self.lights.len() as u32,
            max_specular_lod: specular_mip_levels.saturating_sub(1) as f32,
            _padding: 0.0,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightRaw {
    pub direction: [f32; 4],
    /// Colour premultiplied by intensity.
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EnvironmentUniform {
    pub lights: [LightRaw; MAX_DIRECTIONAL_LIGHTS],
    pub ambient: f32,
    pub light_count: u32,
    pub max_specular_lod: f32,
    pub _padding: f32,
}

pub fn environment_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let cube = wgpu::BindingType::Texture {
        multisampled: false,
        view_dimension: wgpu::TextureViewDimension::Cube,
        sample_type: wgpu::TextureSampleType::Float { filterable: true },
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: cube,
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: cube,
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 5,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("environment_bind_group_layout"),
    })
}

/// BRDF LUT, IBL cubemaps and light uniform, bound as one group.
#[derive(Debug)]
pub struct EnvironmentResources {
    pub brdf_lut: Texture,
    pub diffuse: Cubemap,
    pub specular: Cubemap,
    pub uniform: EnvironmentUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl EnvironmentResources {
    pub fn new(
        device: &wgpu::Device,
        environment: &Environment,
        brdf_lut: Texture,
        diffuse: Cubemap,
        specular: Cubemap,
    ) -> Self {
        let uniform = environment.to_uniform(specular.mip_level_count);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Environment Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = environment_layout(device);
        let lut_sampler = texture::clamped_sampler(device, wgpu::FilterMode::Nearest);
        let cube_sampler = texture::clamped_sampler(device, wgpu::FilterMode::Linear);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&brdf_lut.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&lut_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&diffuse.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&specular.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&cube_sampler),
                },
            ],
            label: Some("environment_bind_group"),
        });

        Self {
            brdf_lut,
            diffuse,
            specular,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Upload changed lights or ambient factor.
    pub fn write(&mut self, queue: &wgpu::Queue, environment: &Environment) {
        let uniform = environment.to_uniform(self.specular.mip_level_count);
        if uniform == self.uniform {
            return;
        }
        self.uniform = uniform;
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}
