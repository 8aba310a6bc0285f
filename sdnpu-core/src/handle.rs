use std::sync::Arc;

use image::DynamicImage;

use crate::{Device, ModelVariant, Pipeline, PipelineError, PipelineInput, Progress, Upscaler};

/// A resolved pipeline together with the device it runs on.
///
/// Handles are cheap to clone and are meant to live for a single request; the cache keeps the
/// owning reference.
#[derive(Clone)]
pub struct PipelineHandle {
    variant: ModelVariant,
    pipeline: Arc<dyn Pipeline>,
    device: Arc<Device>,
}

impl PipelineHandle {
    pub fn new(variant: ModelVariant, pipeline: Arc<dyn Pipeline>, device: Arc<Device>) -> Self {
        Self {
            variant,
            pipeline,
            device,
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Runs the pipeline with exclusive use of its device.
    ///
    /// Blocks while another generation holds the device. Must be called from a blocking
    /// context.
    pub fn generate(
        &self,
        input: &PipelineInput,
        progress: &dyn Fn(Progress),
        upscaler: Option<&dyn Upscaler>,
    ) -> Result<DynamicImage, PipelineError> {
        let _guard = self.device.acquire_blocking();
        self.pipeline.generate(input, progress, upscaler)
    }
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("variant", &self.variant)
            .field("device", &self.device.kind())
            .finish()
    }
}
