//! ibl-asteroids
//!
//! Two glTF asteroids lit by a pair of directional lights and image-based
//! lighting, seen from a camera orbiting the origin. A few seconds after
//! startup the green asteroid is removed and its asset unloaded. The unload is
//! timed on a background thread but always executed on the render thread,
//! between two frames.
//!
//! High-level modules
//! - `assets`: reference-counted asset cache with pluggable loaders
//! - `post`: queue of closures drained by the render thread once per frame
//! - `schedule`: one-shot deferred tasks posted onto that queue
//! - `scene`: scene entries, camera and lighting environment
//! - `world`: render-thread state (scene + assets) handed to posted tasks
//! - `camera`: orbit camera and its uniform
//! - `environment`: lights, IBL cubemap naming and GPU resources
//! - `context`: GPU and window context
//! - `data_structures`: meshes, materials, textures, instances
//! - `pipelines`: the PBR render pipeline
//! - `resources`: loading glTF files, textures and cubemaps
//! - `render`: drawing the scene collection
//! - `config`: startup configuration
//! - `demo`: the asteroid demo wiring
//! - `flow`: winit event loop
//!

pub mod assets;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod demo;
pub mod environment;
pub mod flow;
pub mod pipelines;
pub mod post;
pub mod render;
pub mod resources;
pub mod scene;
pub mod schedule;
pub mod world;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::Vector3;
pub use instant::Duration;
