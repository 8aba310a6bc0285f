use serde::{Deserialize, Serialize};

use crate::GenerationRequest;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    TextToImage,
}

/// Everything a pipeline needs for one generation, with the seed already resolved.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PipelineInput {
    pub mode: GenerationMode,
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: u64,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
    pub guidance_scale: f64,
    pub sampler: String,
    pub model: String,
}

impl PipelineInput {
    pub fn text_to_image(request: &GenerationRequest, seed: u64) -> Self {
        Self {
            mode: GenerationMode::TextToImage,
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            seed,
            steps: request.steps,
            width: request.width,
            height: request.height,
            guidance_scale: request.cfg_scale,
            sampler: request.sampler.clone(),
            model: request.model.clone(),
        }
    }
}
