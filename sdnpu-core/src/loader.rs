use std::sync::Arc;

use anyhow::Result;

use crate::{preview::PreviewPipeline, Device, ModelVariant, Pipeline};

/// Instantiates a pipeline for a model on a device. Loading may be slow; callers cache the result.
pub trait PipelineLoader: Send + Sync {
    fn load(&self, variant: ModelVariant, device: &Arc<Device>) -> Result<Arc<dyn Pipeline>>;
}

/// Loads the CPU-rendered preview pipeline for every variant.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreviewLoader;

impl PipelineLoader for PreviewLoader {
    fn load(&self, variant: ModelVariant, device: &Arc<Device>) -> Result<Arc<dyn Pipeline>> {
        tracing::warn!(
            model = %variant,
            device = %device.kind(),
            "no NPU runtime linked, serving the preview pipeline"
        );
        Ok(Arc::new(PreviewPipeline::new(variant)))
    }
}
