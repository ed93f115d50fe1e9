//! Render pipelines.
//!
//! - `pbr` draws glTF meshes with metallic-roughness shading, two directional
//!   lights and image-based lighting

pub mod pbr;
