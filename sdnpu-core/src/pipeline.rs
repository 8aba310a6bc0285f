use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::{PipelineError, PipelineInput};

/// Samplers known to the bundled pipelines, named as the web UI names them.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sampler {
    #[serde(rename = "Euler")]
    Euler,
    #[serde(rename = "Euler a")]
    EulerAncestral,
    #[serde(rename = "Heun")]
    Heun,
    #[serde(rename = "LMS")]
    Lms,
    #[serde(rename = "DDIM")]
    Ddim,
    #[serde(rename = "DPM++ 2M")]
    DpmPp2M,
    #[serde(rename = "DPM++ 2M Karras")]
    DpmPp2MKarras,
    #[serde(rename = "DPM++ SDE")]
    DpmPpSde,
    #[serde(rename = "DPM++ 3M SDE")]
    DpmPp3MSde,
    #[serde(rename = "UniPC")]
    UniPc,
}

serde_plain::derive_display_from_serialize!(Sampler);
serde_plain::derive_fromstr_from_deserialize!(Sampler);

impl Sampler {
    pub fn from_name(name: &str) -> Result<Self, PipelineError> {
        name.parse()
            .map_err(|_| PipelineError::UnknownSampler(name.to_string()))
    }
}

/// Step-level progress reported while a pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub step: u32,
    pub total: u32,
}

pub trait Upscaler: Send + Sync {
    fn upscale(&self, image: DynamicImage) -> Result<DynamicImage, PipelineError>;
}

/// A loaded model bound to a device.
///
/// `generate` blocks until the device is done. Callers are expected to serialize access to the
/// device, see [`crate::PipelineHandle`].
pub trait Pipeline: Send + Sync {
    fn generate(
        &self,
        input: &PipelineInput,
        progress: &dyn Fn(Progress),
        upscaler: Option<&dyn Upscaler>,
    ) -> Result<DynamicImage, PipelineError>;
}

/// Progress callback that ignores every update.
pub fn no_progress(_: Progress) {}

/// Upscales by a fixed factor with a Lanczos filter.
#[derive(Debug, Clone, Copy)]
pub struct ResizeUpscaler {
    pub factor: u32,
}

impl Upscaler for ResizeUpscaler {
    fn upscale(&self, image: DynamicImage) -> Result<DynamicImage, PipelineError> {
        if self.factor == 0 {
            return Err(PipelineError::InvalidInput("upscale factor must be positive".into()));
        }
        let scaled = |side: u32| {
            side.checked_mul(self.factor).ok_or_else(|| {
                PipelineError::InvalidInput(format!(
                    "upscaling {side} px by {} overflows",
                    self.factor
                ))
            })
        };
        let (width, height) = (scaled(image.width())?, scaled(image.height())?);
        Ok(image.resize_exact(width, height, image::imageops::FilterType::Lanczos3))
    }
}
