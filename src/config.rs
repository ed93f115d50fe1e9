//! Startup configuration.
//!
//! Everything is optional: the defaults reproduce the asteroid demo and a TOML
//! file only needs to name the values it changes.
//!
//! ```toml
//! unload_delay_ms = 2000
//!
//! [window]
//! width = 1280
//! height = 720
//!
//! [camera]
//! speed = 0.5
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment::DirectionalLight;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "IBL_ASTEROIDS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "ibl-asteroids.toml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub assets: AssetConfig,
    pub environment: EnvironmentConfig,
    pub camera: CameraConfig,
    /// Delay before the green asteroid is unloaded.
    pub unload_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            assets: AssetConfig::default(),
            environment: EnvironmentConfig::default(),
            camera: CameraConfig::default(),
            unload_delay_ms: 5000,
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents, &path.display().to_string())
    }

    /// Read `path`, falling back to defaults when the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::load(path)?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolve the config path from [`CONFIG_ENV`] and load it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_or_default(path)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    pub fn unload_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.unload_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Candidate window icons, largest first. The first one that loads wins.
    pub icons: Vec<String>,
    pub clear_color: [f64; 4],
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "textureresolvertest".to_string(),
            width: 1024,
            height: 768,
            icons: ["libgdx128.png", "libgdx64.png", "libgdx32.png", "libgdx16.png"]
                .map(String::from)
                .to_vec(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory every other asset path is relative to.
    pub root: PathBuf,
    pub blue: String,
    pub green: String,
    pub blue_offset: [f32; 3],
    pub green_offset: [f32; 3],
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            blue: "asteroid1_blue.gltf".to_string(),
            green: "asteroid1_green.gltf".to_string(),
            blue_offset: [-1.0, 0.0, 0.0],
            green_offset: [1.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub brdf_lut: String,
    pub diffuse_prefix: String,
    pub diffuse_suffix: String,
    pub specular_prefix: String,
    /// Between the face name and the mip level.
    pub specular_separator: String,
    pub specular_suffix: String,
    pub specular_mip_levels: u32,
    pub ambient: f32,
    pub lights: Vec<DirectionalLight>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            brdf_lut: "brdfLUT.png".to_string(),
            diffuse_prefix: "diffuse_".to_string(),
            diffuse_suffix: "_0.png".to_string(),
            specular_prefix: "specular_".to_string(),
            specular_separator: "_".to_string(),
            specular_suffix: ".png".to_string(),
            specular_mip_levels: 10,
            ambient: 0.3,
            lights: vec![
                DirectionalLight::white([2.0, -1.0, 0.5]),
                DirectionalLight::white([-2.0, -1.0, -0.5]),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fovy_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub distance: f32,
    /// Fixed azimuthal angle of the orbit in radians.
    pub azimuth: f32,
    /// Polar angle growth in radians per second.
    pub speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fovy_degrees: 60.0,
            near: 1.0,
            far: 10.0,
            distance: 5.0,
            azimuth: std::f32::consts::FRAC_PI_4,
            speed: 0.3,
        }
    }
}
