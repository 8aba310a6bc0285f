use std::sync::Arc;

use axum::extract::Json;
use axum::routing::{get, post};
use axum::Router;
use sdnpu_core::PipelineResolver;
use serde::{Deserialize, Serialize};

use crate::orchestrator::{txt2img, AppState};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Health {
    pub status: String,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

pub fn router(resolver: Arc<dyn PipelineResolver>) -> Router {
    Router::new()
        .route("/txt2img", post(txt2img))
        .route("/health", get(health))
        .with_state(AppState::new(resolver))
}
