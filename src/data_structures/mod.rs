//! Engine data structures: models, textures and instances.
//!
//! - `model` contains mesh and material definitions and the loaded glTF scene asset
//! - `texture` contains GPU texture and cubemap wrappers and creation utilities
//! - `instance` holds per-entry transformation data and its GPU layout

pub mod instance;
pub mod model;
pub mod texture;
