use serde::{Deserialize, Serialize};

pub const DEFAULT_STEPS: u32 = 20;
pub const DEFAULT_DIMENSION: u32 = 512;
pub const DEFAULT_CFG_SCALE: f64 = 7.5;
pub const DEFAULT_SAMPLER: &str = "DPM++ 3M SDE";
pub const DEFAULT_MODEL: &str = "Stable-Diffusion-2.1";

/// Seed value asking the service to pick one at random.
pub const RANDOM_SEED: i64 = -1;

/// A text-to-image request as accepted on the wire.
///
/// Only `prompt` is required, every other field falls back to its default. Types are checked
/// during deserialization; ranges are left to the pipeline.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f64,
    #[serde(default = "default_sampler")]
    pub sampler: String,
    #[serde(default = "default_seed")]
    pub seed: i64,
    #[serde(default = "default_model")]
    pub model: String,
}

impl GenerationRequest {
    /// A request for `prompt` with every other field at its default.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            steps: DEFAULT_STEPS,
            width: DEFAULT_DIMENSION,
            height: DEFAULT_DIMENSION,
            cfg_scale: DEFAULT_CFG_SCALE,
            sampler: DEFAULT_SAMPLER.to_string(),
            seed: RANDOM_SEED,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

fn default_steps() -> u32 {
    DEFAULT_STEPS
}

fn default_dimension() -> u32 {
    DEFAULT_DIMENSION
}

fn default_cfg_scale() -> f64 {
    DEFAULT_CFG_SCALE
}

fn default_sampler() -> String {
    DEFAULT_SAMPLER.to_string()
}

fn default_seed() -> i64 {
    RANDOM_SEED
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
