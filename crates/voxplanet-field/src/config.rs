use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
pub struct TerrainConfig {
    #[serde(default = "default_seed")]
    pub seed: i32,
    #[serde(default)]
    pub noise: Noise,
    #[serde(default)]
    pub materials: Materials,
    #[serde(default)]
    pub caves: Caves,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            noise: Noise::default(),
            materials: Materials::default(),
            caves: Caves::default(),
        }
    }
}

fn default_seed() -> i32 {
    3564
}

#[derive(Clone, Debug, Deserialize)]
pub struct Noise {
    #[serde(default = "default_octaves")]
    pub octaves: u32,
    #[serde(default = "default_base_roughness")]
    pub base_roughness: f32,
    #[serde(default = "default_roughness")]
    pub roughness: f32,
    #[serde(default = "default_persistence")]
    pub persistence: f32,
    #[serde(default = "default_strength")]
    pub strength: f32,
    #[serde(default = "default_base_height")]
    pub base_height: f32,
    #[serde(default = "default_frequency")]
    pub frequency: f32,
}
fn default_octaves() -> u32 {
    4
}
fn default_base_roughness() -> f32 {
    0.5
}
fn default_roughness() -> f32 {
    2.0
}
fn default_persistence() -> f32 {
    0.5
}
fn default_strength() -> f32 {
    40.0
}
fn default_base_height() -> f32 {
    20.0
}
fn default_frequency() -> f32 {
    0.01
}
impl Default for Noise {
    fn default() -> Self {
        Self {
            octaves: default_octaves(),
            base_roughness: default_base_roughness(),
            roughness: default_roughness(),
            persistence: default_persistence(),
            strength: default_strength(),
            base_height: default_base_height(),
            frequency: default_frequency(),
        }
    }
}

/// World-height bands for solid material assignment, lowest first.
/// Anything above the last threshold is topsoil.
#[derive(Clone, Debug, Deserialize)]
pub struct Materials {
    #[serde(default = "default_bedrock_below")]
    pub bedrock_below: f32,
    #[serde(default = "default_stone_below")]
    pub stone_below: f32,
    #[serde(default = "default_sand_below")]
    pub sand_below: f32,
}
fn default_bedrock_below() -> f32 {
    0.0
}
fn default_stone_below() -> f32 {
    48.0
}
fn default_sand_below() -> f32 {
    56.0
}
impl Default for Materials {
    fn default() -> Self {
        Self {
            bedrock_below: default_bedrock_below(),
            stone_below: default_stone_below(),
            sand_below: default_sand_below(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Caves {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_cave_threshold")]
    pub threshold: f32,
    #[serde(default = "default_cave_strength")]
    pub strength: f32,
    #[serde(default = "default_cave_frequency")]
    pub frequency: f32,
    #[serde(default = "default_cave_max_y")]
    pub max_y: f32,
}
fn default_cave_threshold() -> f32 {
    0.4
}
fn default_cave_strength() -> f32 {
    40.0
}
fn default_cave_frequency() -> f32 {
    0.015
}
fn default_cave_max_y() -> f32 {
    30.0
}
impl Default for Caves {
    fn default() -> Self {
        Self {
            enable: false,
            threshold: default_cave_threshold(),
            strength: default_cave_strength(),
            frequency: default_cave_frequency(),
            max_y: default_cave_max_y(),
        }
    }
}

/// Flattened snapshot of `TerrainConfig` read in the sampling hot loops.
#[derive(Clone, Debug)]
pub struct TerrainParams {
    pub seed: i32,
    pub octaves: u32,
    pub base_roughness: f32,
    pub roughness: f32,
    pub persistence: f32,
    pub strength: f32,
    pub base_height: f32,
    pub frequency: f32,
    pub bedrock_below: f32,
    pub stone_below: f32,
    pub sand_below: f32,
    pub caves: bool,
    pub cave_threshold: f32,
    pub cave_strength: f32,
    pub cave_frequency: f32,
    pub cave_max_y: f32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self::from_config(&TerrainConfig::default())
    }
}

impl TerrainParams {
    pub fn from_config(cfg: &TerrainConfig) -> Self {
        Self {
            seed: cfg.seed,
            octaves: cfg.noise.octaves,
            base_roughness: cfg.noise.base_roughness,
            roughness: cfg.noise.roughness,
            persistence: cfg.noise.persistence,
            strength: cfg.noise.strength,
            base_height: cfg.noise.base_height,
            frequency: cfg.noise.frequency,
            bedrock_below: cfg.materials.bedrock_below,
            stone_below: cfg.materials.stone_below,
            sand_below: cfg.materials.sand_below,
            caves: cfg.caves.enable,
            cave_threshold: cfg.caves.threshold,
            cave_strength: cfg.caves.strength,
            cave_frequency: cfg.caves.frequency,
            cave_max_y: cfg.caves.max_y,
        }
    }
}

pub fn load_params_from_path(path: &Path) -> Result<TerrainParams, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let cfg: TerrainConfig = toml::from_str(&s)?;
    Ok(TerrainParams::from_config(&cfg))
}
