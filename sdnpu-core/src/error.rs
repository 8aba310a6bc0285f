use thiserror::Error;

/// Failure to hand out a pipeline for a model identifier.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("unsupported model: {0}")]
    UnknownModel(String),
    #[error("failed to load model {model}: {reason}")]
    Load { model: String, reason: String },
}

/// Failure raised by a pipeline while generating.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("unknown sampler: {0}")]
    UnknownSampler(String),
    #[error("invalid generation input: {0}")]
    InvalidInput(String),
    #[error("pipeline runtime error: {0}")]
    Runtime(String),
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("could not encode image as PNG: {0}")]
    Png(#[from] image::ImageError),
}
