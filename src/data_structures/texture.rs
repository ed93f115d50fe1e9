//! GPU textures and cubemaps.
//!
//! [`Texture`] wraps a 2D wgpu texture with its view and sampler. [`Cubemap`]
//! holds the six-faced, optionally mip-mapped environment maps used for
//! image-based lighting.

use anyhow::*;
use image::GenericImageView;

/// A GPU texture with a view and optional sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture matching the surface size.
    ///
    /// Zero-sized surfaces (minimised windows) are clamped to 1x1.
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// A 1x1 texture of a single colour.
    ///
    /// Used in place of material maps a glTF file does not provide: white for
    /// base colour and metallic-roughness (so the factors apply unchanged) and
    /// the neutral blue of an undeformed normal map.
    pub fn create_solid(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [u8; 4],
        label: &str,
        format: wgpu::TextureFormat,
    ) -> Texture {
        let size = wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_default_sampler(device));
        Texture {
            texture,
            view,
            sampler,
        }
    }

    pub fn create_default_normal_map(device: &wgpu::Device, queue: &wgpu::Queue) -> Texture {
        Self::create_solid(
            device,
            queue,
            [127, 127, 255, 255],
            "default normal map",
            wgpu::TextureFormat::Rgba8Unorm,
        )
    }

    pub fn create_white(device: &wgpu::Device, queue: &wgpu::Queue, srgb: bool) -> Texture {
        let format = if srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        Self::create_solid(device, queue, [255; 4], "white", format)
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: Option<&str>,
        linear: bool,
    ) -> Result<Self> {
        let dimensions = img.dimensions();
        let rgba = img.to_rgba8();

        let size = wgpu::Extent3d {
            width: dimensions.0,
            height: dimensions.1,
            depth_or_array_layers: 1,
        };
        let format = if linear {
            wgpu::TextureFormat::Rgba8Unorm
        } else {
            wgpu::TextureFormat::Rgba8UnormSrgb
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * dimensions.0),
                rows_per_image: Some(dimensions.1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_default_sampler(device));

        Ok(Self {
            texture,
            view,
            sampler,
        })
    }
}

/// Six faces per mip level, in wgpu layer order (+X, -X, +Y, -Y, +Z, -Z).
pub type CubeFaces = [image::DynamicImage; 6];

/// A cube texture sampled by direction, used for diffuse and specular IBL.
#[derive(Clone, Debug)]
pub struct Cubemap {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub mip_level_count: u32,
}

impl Cubemap {
    /// Upload a cubemap whose level `n` is `levels[n]`.
    ///
    /// Every face of a level must be square and the same size, and each level
    /// must be half the size of the previous one.
    pub fn from_faces(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        levels: &[CubeFaces],
        label: &str,
    ) -> Result<Self> {
        let width = validate_cube_levels(levels, label)?;
        let mip_level_count = levels.len() as u32;
        let format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height: width,
                depth_or_array_layers: 6,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, faces) in levels.iter().enumerate() {
            let expected = (width >> level).max(1);
            for (layer, face) in faces.iter().enumerate() {
                queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        aspect: wgpu::TextureAspect::All,
                        texture: &texture,
                        mip_level: level as u32,
                        origin: wgpu::Origin3d {
                            x: 0,
                            y: 0,
                            z: layer as u32,
                        },
                    },
                    &face.to_rgba8(),
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(4 * expected),
                        rows_per_image: Some(expected),
                    },
                    wgpu::Extent3d {
                        width: expected,
                        height: expected,
                        depth_or_array_layers: 1,
                    },
                );
            }
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            mip_level_count,
        })
    }
}

/// Mip levels a texture with a `size` texel edge can have, down to 1x1.
pub fn max_mip_levels(size: u32) -> u32 {
    32 - size.leading_zeros()
}

/// Check that `levels` form a valid mip chain of square faces and return the
/// base edge length.
pub fn validate_cube_levels(levels: &[CubeFaces], label: &str) -> Result<u32> {
    let base = levels
        .first()
        .ok_or_else(|| anyhow!("cubemap {label} has no mip levels"))?;
    let (width, height) = base[0].dimensions();
    if width != height {
        bail!("cubemap {label} faces must be square, got {width}x{height}");
    }
    let max_levels = max_mip_levels(width);
    if levels.len() as u32 > max_levels {
        bail!(
            "cubemap {label} has {} mip levels, but a {width}x{width} face allows at most {max_levels}",
            levels.len()
        );
    }
    for (level, faces) in levels.iter().enumerate() {
        let expected = (width >> level).max(1);
        for (layer, face) in faces.iter().enumerate() {
            let (face_width, face_height) = face.dimensions();
            if face_width != expected || face_height != expected {
                bail!(
                    "cubemap {label} level {level} face {layer} is {face_width}x{face_height}, expected {expected}x{expected}"
                );
            }
        }
    }
    Ok(width)
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Edge-clamped linear sampler, used for LUTs and cubemaps.
pub fn clamped_sampler(device: &wgpu::Device, mipmap_filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter,
        ..Default::default()
    })
}
