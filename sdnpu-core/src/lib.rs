//! Request schema, pipeline contracts and pipeline caching for NPU-accelerated
//! text-to-image generation.

pub mod cache;
pub mod device_map;
pub mod error;
mod handle;
pub mod input;
pub mod loader;
mod loader_factory;
pub mod pipeline;
pub mod preview;
pub mod request;
pub mod seed;
mod util;

pub use cache::*;
pub use device_map::*;
pub use error::*;
pub use handle::PipelineHandle;
pub use input::*;
pub use loader::*;
pub use loader_factory::ModelVariant;
pub use pipeline::*;
pub use request::*;
pub use seed::*;
pub use util::*;
