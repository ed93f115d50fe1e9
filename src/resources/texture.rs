use std::path::Path;

use anyhow::Context;
use image::ImageFormat;

use crate::data_structures::texture::{self, CubeFaces};

/// Bind group layout of a PBR material, matching [`crate::data_structures::model::Material`].
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = wgpu::BindingType::Texture {
        multisampled: false,
        view_dimension: wgpu::TextureViewDimension::D2,
        sample_type: wgpu::TextureSampleType::Float { filterable: true },
    };
    let sampler = wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering);
    let entry = |binding: u32, ty: wgpu::BindingType| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty,
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            // base colour
            entry(0, texture),
            entry(1, sampler),
            // normal
            entry(2, texture),
            entry(3, sampler),
            // metallic-roughness
            entry(4, texture),
            entry(5, sampler),
            entry(
                6,
                wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
            ),
        ],
        label: Some("material_bind_group_layout"),
    })
}

/// Read `file_name` relative to the asset `root`.
pub async fn load_binary(root: &Path, file_name: &str) -> anyhow::Result<Vec<u8>> {
    let path = root.join(file_name);
    tokio::fs::read(&path)
        .await
        .with_context(|| format!("could not read {}", path.display()))
}

/// Decode an image. `mime_type` (e.g. "image/png") is a hint; without it the
/// format is guessed from the content.
pub fn decode_image(bytes: &[u8], mime_type: Option<&str>) -> anyhow::Result<image::DynamicImage> {
    let format = mime_type
        .and_then(|mime| mime.split('/').next_back())
        .and_then(ImageFormat::from_extension);
    let img = match format {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    Ok(img)
}

pub async fn load_image(root: &Path, file_name: &str) -> anyhow::Result<image::DynamicImage> {
    let data = load_binary(root, file_name).await?;
    let extension = Path::new(file_name).extension().and_then(|ext| ext.to_str());
    let img = match extension.and_then(ImageFormat::from_extension) {
        Some(format) => image::load_from_memory_with_format(&data, format),
        None => image::load_from_memory(&data),
    };
    img.with_context(|| format!("could not decode {}", file_name))
}

pub async fn load_texture(
    root: &Path,
    file_name: &str,
    linear: bool,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<texture::Texture> {
    let img = load_image(root, file_name).await?;
    texture::Texture::from_image(device, queue, &img, Some(file_name), linear)
}

/// Load every face of every mip level concurrently and upload them as one
/// cubemap.
pub async fn load_cubemap(
    root: &Path,
    levels: &[[String; 6]],
    label: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<texture::Cubemap> {
    let loads = levels
        .iter()
        .flat_map(|faces| faces.iter())
        .map(|file_name| load_image(root, file_name));
    let mut images = futures::future::join_all(loads)
        .await
        .into_iter()
        .collect::<anyhow::Result<Vec<_>>>()?
        .into_iter();

    let mut mips: Vec<CubeFaces> = Vec::with_capacity(levels.len());
    for level in 0..levels.len() {
        let faces: Vec<_> = images.by_ref().take(6).collect();
        let faces: CubeFaces = faces
            .try_into()
            .map_err(|_| anyhow::anyhow!("cubemap {} is missing faces of level {}", label, level))?;
        mips.push(faces);
    }
    log::debug!("loaded cubemap {} with {} mip level(s)", label, mips.len());
    texture::Cubemap::from_faces(device, queue, &mips, label)
}
