//! Loading meshes, textures and environment maps from the asset directory.
//!
//! All paths are relative to an asset root. File IO goes through tokio; the
//! synchronous [`GltfLoader`] drives it on the application's runtime so it can
//! sit behind [`crate::assets::AssetCache`].

use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use cgmath::{InnerSpace, Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    assets::{AssetKey, AssetLoader},
    config::EnvironmentConfig,
    data_structures::{
        model::{self, Material, MaterialTextures, MaterialUniform, SceneAsset, ScenePart},
        texture::Texture,
    },
    environment::{self, Environment, EnvironmentResources},
    resources::texture::{decode_image, load_binary, load_cubemap, load_texture},
};

pub mod texture;

/// Resolve a URI referenced by a glTF file. Embedded `data:` URIs are not supported.
async fn load_uri(root: &Path, gltf_dir: &Path, uri: &str) -> anyhow::Result<Vec<u8>> {
    if uri.starts_with("data:") {
        bail!("embedded data URIs are not supported");
    }
    let relative = gltf_dir.join(uri);
    let relative = relative
        .to_str()
        .with_context(|| format!("non UTF-8 path {}", relative.display()))?;
    load_binary(root, relative).await
}

pub async fn load_model_gltf(
    root: &Path,
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
) -> anyhow::Result<SceneAsset> {
    let gltf_bytes = load_binary(root, file_name).await?;
    let gltf = gltf::Gltf::from_slice(&gltf_bytes)
        .with_context(|| format!("{} is not a valid glTF file", file_name))?;
    let gltf_dir = Path::new(file_name).parent().unwrap_or(Path::new(""));

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{} references a missing binary chunk", file_name))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) => {
                let bin = load_uri(root, gltf_dir, uri)
                    .await
                    .with_context(|| format!("buffer {} of {}", buffer.index(), file_name))?;
                buffer_data.push(bin);
            }
        }
    }

    // Decode every image once, materials pick from them
    let mut images = Vec::new();
    for image in gltf.images() {
        let decoded = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let buffer = &buffer_data[view.buffer().index()];
                let bytes = buffer
                    .get(view.offset()..view.offset() + view.length())
                    .with_context(|| format!("image {} of {} is out of bounds", image.index(), file_name))?;
                decode_image(bytes, Some(mime_type))?
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let bytes = load_uri(root, gltf_dir, uri).await?;
                decode_image(&bytes, mime_type)?
            }
        };
        images.push(decoded);
    }

    let white_srgb = || Texture::create_white(device, queue, true);
    let white_linear = || Texture::create_white(device, queue, false);
    let flat_normal = || Texture::create_default_normal_map(device, queue);

    // Load materials
    let mut materials = Vec::new();
    for material in gltf.materials() {
        let pbr = material.pbr_metallic_roughness();
        let normal = material.normal_texture();
        let uniform = MaterialUniform {
            base_color_factor: pbr.base_color_factor(),
            metallic_factor: pbr.metallic_factor(),
            roughness_factor: pbr.roughness_factor(),
            normal_scale: normal.as_ref().map_or(1.0, |n| n.scale()),
            _padding: 0.0,
        };
        let textures = MaterialTextures {
            base_color: material_texture(
                device,
                queue,
                &images,
                pbr.base_color_texture().map(|info| info.texture()),
                false,
                white_srgb,
            )?,
            normal: material_texture(
                device,
                queue,
                &images,
                normal.map(|info| info.texture()),
                true,
                flat_normal,
            )?,
            metallic_roughness: material_texture(
                device,
                queue,
                &images,
                pbr.metallic_roughness_texture().map(|info| info.texture()),
                true,
                white_linear,
            )?,
        };
        let name = material.name().unwrap_or("material");
        materials.push(Material::new(device, name, textures, uniform, layout));
    }
    // glTF's default material, for primitives that name none
    let default_material = materials.len();
    materials.push(Material::new(
        device,
        "default",
        MaterialTextures {
            base_color: white_srgb(),
            normal: flat_normal(),
            metallic_roughness: white_linear(),
        },
        MaterialUniform::default(),
        layout,
    ));

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .with_context(|| format!("{} contains no scene", file_name))?;

    let mut meshes = Vec::new();
    let mut parts = Vec::new();
    let mut stack: Vec<_> = scene
        .nodes()
        .map(|node| (node, Matrix4::identity()))
        .collect();
    while let Some((node, parent)) = stack.pop() {
        let transform = parent * Matrix4::from(node.transform().matrix());
        if let Some(mesh) = node.mesh() {
            let start = meshes.len();
            for primitive in mesh.primitives() {
                meshes.push(load_primitive(
                    device,
                    &mesh,
                    &primitive,
                    &buffer_data,
                    default_material,
                )?);
            }
            parts.push(ScenePart {
                name: node.name().or(mesh.name()).unwrap_or("node").to_string(),
                meshes: Range {
                    start,
                    end: meshes.len(),
                },
                transform,
            });
        }
        stack.extend(node.children().map(|child| (child, transform)));
    }
    if parts.is_empty() {
        log::warn!("{} has no meshes, nothing will be drawn", file_name);
    }

    Ok(SceneAsset {
        name: file_name.to_string(),
        model: model::Model { meshes, materials },
        parts,
    })
}

fn material_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    images: &[image::DynamicImage],
    texture: Option<gltf::texture::Texture<'_>>,
    linear: bool,
    fallback: impl FnOnce() -> Texture,
) -> anyhow::Result<Texture> {
    let Some(texture) = texture else {
        return Ok(fallback());
    };
    let img = images
        .get(texture.source().index())
        .with_context(|| format!("texture {} references a missing image", texture.index()))?;
    Texture::from_image(device, queue, img, texture.name(), linear)
}

fn load_primitive(
    device: &wgpu::Device,
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    buffer_data: &[Vec<u8>],
    default_material: usize,
) -> anyhow::Result<model::Mesh> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        bail!(
            "primitive {} of mesh {:?} is not a triangle list",
            primitive.index(),
            mesh.name()
        );
    }
    let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));

    let mut vertices: Vec<model::ModelVertex> = match reader.read_positions() {
        Some(positions) => positions
            .map(|position| model::ModelVertex {
                position,
                ..Default::default()
            })
            .collect(),
        None => bail!("primitive of mesh {:?} has no positions", mesh.name()),
    };
    if let Some(normals) = reader.read_normals() {
        vertices
            .iter_mut()
            .zip(normals)
            .for_each(|(vertex, normal)| vertex.normal = normal);
    }
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
        vertices
            .iter_mut()
            .zip(tex_coords)
            .for_each(|(vertex, tex_coord)| vertex.tex_coords = tex_coord);
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    match reader.read_tangents() {
        Some(tangents) => {
            vertices.iter_mut().zip(tangents).for_each(|(vertex, tangent)| {
                // glTF tangents are vec4, w holds the bitangent sign
                let tangent: cgmath::Vector4<f32> = tangent.into();
                vertex.tangent = tangent.truncate().into();
                let normal: cgmath::Vector3<f32> = vertex.normal.into();
                vertex.bitangent = (normal.cross(tangent.truncate()) * tangent.w).into();
            });
        }
        None => compute_tangents(&mut vertices, &indices),
    }

    let label = mesh.name().unwrap_or("unknown_mesh");
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Vertex Buffer", label)),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Index Buffer", label)),
        contents: bytemuck::cast_slice(&indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    Ok(model::Mesh {
        name: label.to_string(),
        vertex_buffer,
        index_buffer,
        num_elements: indices.len() as u32,
        material: primitive.material().index().unwrap_or(default_material),
    })
}

/// Per-vertex tangents averaged over the triangles sharing the vertex, for
/// meshes exported without them.
pub fn compute_tangents(vertices: &mut [model::ModelVertex], indices: &[u32]) {
    let mut triangles_included = vec![0u32; vertices.len()];
    for c in indices.chunks_exact(3) {
        let [i0, i1, i2] = [c[0] as usize, c[1] as usize, c[2] as usize];
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let (v0, v1, v2) = (vertices[i0], vertices[i1], vertices[i2]);

        let pos0: cgmath::Vector3<_> = v0.position.into();
        let pos1: cgmath::Vector3<_> = v1.position.into();
        let pos2: cgmath::Vector3<_> = v2.position.into();

        let uv0: cgmath::Vector2<_> = v0.tex_coords.into();
        let uv1: cgmath::Vector2<_> = v1.tex_coords.into();
        let uv2: cgmath::Vector2<_> = v2.tex_coords.into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() < f32::EPSILON {
            // degenerate UVs
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * r;

        for i in [i0, i1, i2] {
            let v = &mut vertices[i];
            v.tangent = (tangent + cgmath::Vector3::from(v.tangent)).into();
            v.bitangent = (bitangent + cgmath::Vector3::from(v.bitangent)).into();
            triangles_included[i] += 1;
        }
    }

    for (v, n) in vertices.iter_mut().zip(triangles_included) {
        if n == 0 {
            continue;
        }
        let tangent = cgmath::Vector3::from(v.tangent);
        let bitangent = cgmath::Vector3::from(v.bitangent);
        if tangent.magnitude2() > 0.0 {
            v.tangent = tangent.normalize().into();
        }
        if bitangent.magnitude2() > 0.0 {
            v.bitangent = bitangent.normalize().into();
        }
    }
}

/// BRDF LUT plus the diffuse and specular cubemaps named by `config`.
pub async fn load_environment(
    root: &Path,
    config: &EnvironmentConfig,
    environment: &Environment,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<EnvironmentResources> {
    let diffuse_faces = [environment::face_paths(&config.diffuse_prefix, &config.diffuse_suffix)];
    let specular_faces = environment::mip_face_paths(
        &config.specular_prefix,
        &config.specular_separator,
        &config.specular_suffix,
        config.specular_mip_levels,
    );
    let (brdf_lut, diffuse, specular) = futures::try_join!(
        load_texture(root, &config.brdf_lut, true, device, queue),
        load_cubemap(root, &diffuse_faces, "diffuse cubemap", device, queue),
        load_cubemap(root, &specular_faces, "specular cubemap", device, queue),
    )?;
    Ok(EnvironmentResources::new(
        device,
        environment,
        brdf_lut,
        diffuse,
        specular,
    ))
}

/// [`AssetLoader`] for glTF scenes, blocking on the application's runtime.
#[derive(Debug, Clone)]
pub struct GltfLoader {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: wgpu::BindGroupLayout,
    root: PathBuf,
    runtime: tokio::runtime::Handle,
}

impl GltfLoader {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        layout: wgpu::BindGroupLayout,
        root: PathBuf,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            device,
            queue,
            layout,
            root,
            runtime,
        }
    }
}

impl AssetLoader<SceneAsset> for GltfLoader {
    fn load(&mut self, key: &AssetKey) -> anyhow::Result<SceneAsset> {
        self.runtime.block_on(load_model_gltf(
            &self.root,
            &key.path,
            &self.device,
            &self.queue,
            &self.layout,
        ))
    }
}
