//! Background listener hosting the API.
//!
//! The listener runs on its own OS thread with its own tokio runtime. The thread is never
//! joined: it serves until the host process exits, and it does not keep the process alive.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::thread;

use axum::Router;
use sdnpu_core::PipelineResolver;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::routes::router;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 7861;

const THREAD_NAME: &str = "sdnpu-listener";
const PRELOAD_THREAD_NAME: &str = "sdnpu-preload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StartError {
    #[error("could not bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("could not start listener runtime: {0}")]
    Runtime(String),
    #[error("listener stopped: {0}")]
    Serve(String),
    #[error("listener thread exited before reporting its state")]
    Exited,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListenerState {
    Starting,
    Listening(SocketAddr),
    Failed(StartError),
}

/// Observes the background listener. Dropping it has no effect on the listener.
#[derive(Debug, Clone)]
pub struct Listener {
    state: watch::Receiver<ListenerState>,
}

impl Listener {
    pub fn state(&self) -> ListenerState {
        self.state.borrow().clone()
    }

    /// Waits until the listener is bound or has failed to start.
    pub async fn ready(&self) -> Result<SocketAddr, StartError> {
        let mut state = self.state.clone();
        let result = state
            .wait_for(|s| !matches!(s, ListenerState::Starting))
            .await;
        match result.as_deref() {
            Ok(ListenerState::Listening(addr)) => Ok(*addr),
            Ok(ListenerState::Failed(e)) => Err(e.clone()),
            Ok(ListenerState::Starting) | Err(_) => Err(StartError::Exited),
        }
    }
}

static STARTED: OnceLock<Listener> = OnceLock::new();

/// Starts the process-wide API listener and returns immediately.
///
/// Only the first call spawns a listener; later calls log a warning and return the existing one.
/// Failures are logged and reported through the returned [`Listener`], never raised.
pub fn start(config: ServerConfig, resolver: Arc<dyn PipelineResolver>) -> Listener {
    let mut spawned = false;
    let listener = STARTED.get_or_init(|| {
        spawned = true;
        spawn(config, resolver)
    });
    if !spawned {
        tracing::warn!("API server already started, ignoring");
    }
    listener.clone()
}

/// Spawns a listener thread serving the API on `config`'s address.
pub fn spawn(config: ServerConfig, resolver: Arc<dyn PipelineResolver>) -> Listener {
    tracing::info!("Starting API server...");
    let (tx, rx) = watch::channel(ListenerState::Starting);
    let app = router(resolver);
    let addr = config.bind_address();

    let handle = thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .thread_name("sdnpu-worker")
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::error!("Error starting server: {e}");
                    tx.send_replace(ListenerState::Failed(StartError::Runtime(e.to_string())));
                    return;
                }
            };
            runtime.block_on(serve(addr, app, tx));
        });

    match handle {
        Ok(_) => Listener { state: rx },
        Err(e) => {
            tracing::error!("Error starting server: {e}");
            let (_, rx) = watch::channel(ListenerState::Failed(StartError::Runtime(e.to_string())));
            Listener { state: rx }
        }
    }
}

/// Resolves `model` on a detached thread so its pipeline is warm before the first request.
///
/// Like the listener, the thread is never joined, so a slow load never holds up host exit.
/// Failures are logged.
pub fn preload(resolver: Arc<dyn PipelineResolver>, model: String) {
    let spawned = thread::Builder::new()
        .name(PRELOAD_THREAD_NAME.to_string())
        .spawn(move || match resolver.resolve(&model) {
            Ok(_) => tracing::info!(%model, "preloaded pipeline"),
            Err(e) => tracing::error!(%model, "preload failed: {e}"),
        });
    if let Err(e) = spawned {
        tracing::error!("could not spawn preload thread: {e}");
    }
}

async fn serve(addr: String, app: Router, state: watch::Sender<ListenerState>) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, "Error starting server: {e}");
            state.send_replace(ListenerState::Failed(StartError::Bind {
                addr,
                reason: e.to_string(),
            }));
            return;
        }
    };
    let local_addr = match listener.local_addr() {
        Ok(local_addr) => local_addr,
        Err(e) => {
            tracing::error!(%addr, "Error starting server: {e}");
            state.send_replace(ListenerState::Failed(StartError::Bind {
                addr,
                reason: e.to_string(),
            }));
            return;
        }
    };

    tracing::info!("Running at http://{local_addr}/txt2img");
    state.send_replace(ListenerState::Listening(local_addr));

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("API server stopped: {e}");
        state.send_replace(ListenerState::Failed(StartError::Serve(e.to_string())));
    }
}
