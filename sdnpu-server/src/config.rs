use clap::Parser;
use sdnpu_core::{CacheConfig, DeviceMap, DEFAULT_CACHE_CAPACITY};

use crate::lifecycle::{ServerConfig, DEFAULT_HOST, DEFAULT_PORT};

// Define command line arguments
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "NPU accelerated txt2img API server")]
pub struct Args {
    /// Host address to bind the server to
    #[arg(long, env = "SDNPU_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to bind the server to
    #[arg(long, env = "SDNPU_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Ordinal of the NPU to run on
    #[arg(long, env = "SDNPU_DEVICE", default_value_t = 0)]
    pub device: usize,

    /// Use CPU instead of the NPU
    #[arg(long, env = "SDNPU_CPU")]
    pub cpu: bool,

    /// Maximum number of pipelines kept loaded
    #[arg(long, env = "SDNPU_CACHE_CAPACITY", default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: usize,

    /// Model to load before the first request arrives
    #[arg(long, env = "SDNPU_PRELOAD")]
    pub preload: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "SDNPU_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache_capacity,
        }
    }

    pub fn device_map(&self) -> DeviceMap {
        if self.cpu {
            DeviceMap::ForceCpu
        } else {
            DeviceMap::Ordinal(self.device)
        }
    }
}
