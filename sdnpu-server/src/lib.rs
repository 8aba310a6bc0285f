//! HTTP front end for NPU-accelerated text-to-image generation.
//!
//! [`start`] launches the `/txt2img` listener in the background so a host application can
//! keep running its own loop.

pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod orchestrator;
pub mod routes;

pub use lifecycle::{preload, spawn, start, Listener, ListenerState, ServerConfig, StartError};
pub use orchestrator::{ErrorKind, GenerationError, GenerationResponse};
pub use routes::router;
