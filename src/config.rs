//! Configuration file: asset locations, placement, material and bloom
//! constants, camera, lights and window.

use crate::material::TextureChannel;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "showroom.json";
pub const CONFIG_ENV_VAR: &str = "SHOWROOM_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid share base URL {url:?}: {source}")]
    ShareUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub assets: AssetConfig,
    pub placement: PlacementConfig,
    pub material: MaterialConfig,
    pub bloom: BloomConfig,
    pub camera: CameraConfig,
    pub lights: LightConfig,
    pub window: WindowConfig,
    pub share: ShareConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory the other asset paths are relative to.
    pub root: PathBuf,
    pub environment: PathBuf,
    pub model: PathBuf,
    pub textures: BTreeMap<TextureChannel, PathBuf>,
}

/// Uniform scale and offset for the model's authored units.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub scale: f32,
    pub position: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    pub displacement_scale: f32,
    pub emissive_rgb: [f32; 3],
    pub emissive_intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub distance: f32,
    pub damping: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub directional_color: [f32; 3],
    pub directional_intensity: f32,
    pub directional_position: [f32; 3],
    pub directional_cast_shadow: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Location the share query is written onto.
    pub base_url: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        let textures = [
            (TextureChannel::Albedo, "solar_surface.jpg"),
            (TextureChannel::Metalness, "solar_metalness.jpg"),
            (TextureChannel::Roughness, "solar_roughness.jpg"),
            (TextureChannel::Normal, "solar_normal.jpg"),
            (TextureChannel::Height, "solar_height.jpg"),
            (TextureChannel::Emissive, "solar_emissive.jpg"),
        ]
        .into_iter()
        .map(|(channel, file)| (channel, PathBuf::from(file)))
        .collect();
        Self {
            root: PathBuf::from("assets"),
            environment: PathBuf::from("quarry_cloudy_1k.hdr"),
            model: PathBuf::from("solar_skid.glb"),
            textures,
        }
    }
}

impl AssetConfig {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn environment_path(&self) -> PathBuf {
        self.resolve(&self.environment)
    }

    pub fn model_path(&self) -> PathBuf {
        self.resolve(&self.model)
    }

    pub fn texture_paths(&self) -> BTreeMap<TextureChannel, PathBuf> {
        self.textures
            .iter()
            .map(|(channel, path)| (*channel, self.resolve(path)))
            .collect()
    }
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            scale: 0.02,
            position: [0.0, -1.0, 0.0],
        }
    }
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            displacement_scale: 0.05,
            // 0xffaa00
            emissive_rgb: [1.0, 170.0 / 255.0, 0.0],
            emissive_intensity: 2.0,
        }
    }
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            strength: 0.5,
            radius: 0.5,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_deg: 75.0,
            near: 0.1,
            far: 1000.0,
            distance: 5.0,
            damping: 0.05,
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            ambient_color: [1.0, 1.0, 1.0],
            ambient_intensity: 0.1,
            directional_color: [1.0, 1.0, 1.0],
            directional_intensity: 0.1,
            directional_position: [5.0, 5.0, 5.0],
            directional_cast_shadow: true,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Showroom".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_url: "showroom://scene".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets: AssetConfig::default(),
            placement: PlacementConfig::default(),
            material: MaterialConfig::default(),
            bloom: BloomConfig::default(),
            camera: CameraConfig::default(),
            lights: LightConfig::default(),
            window: WindowConfig::default(),
            share: ShareConfig::default(),
        }
    }
}

impl Config {
    pub fn share_location(&self) -> Result<url::Url> {
        url::Url::parse(&self.share.base_url).map_err(|source| ConfigError::ShareUrl {
            url: self.share.base_url.clone(),
            source,
        })
    }

    /// Config path from `SHOWROOM_CONFIG`, falling back to `showroom.json`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Loads `path`, or the defaults when the file does not exist.
    /// A file that exists but fails to parse is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!("Config {} not found; using defaults", path.display());
            return Ok(Self::default());
        }
        load_config_from_file(path)
    }
}

pub fn save_config_to_file(config: &Config, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_config_from_file(path: &Path) -> Result<Config> {
    let json = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&json)?;
    config.share_location()?;
    Ok(config)
}
