//! The `/txt2img` handler: resolve a pipeline, generate, encode.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Json, State};
use sdnpu_core::{
    image_to_base64_png, no_progress, normalize_seed, EncodeError, GenerationRequest,
    PipelineError, PipelineInput, PipelineResolver, ResolveError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of every `/txt2img` reply. Exactly one of `image` or `error` is present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum GenerationResponse {
    Image { image: String },
    Error { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Resolution,
    Generation,
    Encoding,
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error(transparent)]
    Resolution(#[from] ResolveError),
    #[error(transparent)]
    Generation(#[from] PipelineError),
    #[error(transparent)]
    Encoding(#[from] EncodeError),
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::Resolution(_) => ErrorKind::Resolution,
            GenerationError::Generation(_) => ErrorKind::Generation,
            GenerationError::Encoding(_) => ErrorKind::Encoding,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    resolver: Arc<dyn PipelineResolver>,
}

impl AppState {
    pub fn new(resolver: Arc<dyn PipelineResolver>) -> Self {
        Self { resolver }
    }
}

pub async fn txt2img(
    State(state): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> Json<GenerationResponse> {
    match generate_image(&state, req).await {
        Ok(image) => Json(GenerationResponse::Image { image }),
        Err(e) => {
            tracing::error!(kind = ?e.kind(), "Error: {e}");
            Json(GenerationResponse::Error {
                error: e.to_string(),
            })
        }
    }
}

/// Runs one request on the blocking pool and returns the base64 PNG.
pub async fn generate_image(
    state: &AppState,
    req: GenerationRequest,
) -> Result<String, GenerationError> {
    let resolver = state.resolver.clone();
    tokio::task::spawn_blocking(move || generate_blocking(resolver.as_ref(), req))
        .await
        .map_err(|e| {
            let reason = if e.is_panic() {
                "generation task panicked".to_string()
            } else {
                format!("generation task failed: {e}")
            };
            GenerationError::Generation(PipelineError::Runtime(reason))
        })?
}

/// Synchronous body of a request. Blocks on pipeline loading and on the device.
pub fn generate_blocking(
    resolver: &dyn PipelineResolver,
    req: GenerationRequest,
) -> Result<String, GenerationError> {
    let seed = normalize_seed(req.seed);
    tracing::info!(seed, "Using seed");

    tracing::info!(model = %req.model, "Creating pipeline");
    let pipeline = resolver.resolve(&req.model)?;

    let input = PipelineInput::text_to_image(&req, seed);

    tracing::info!(model = %pipeline.variant(), "Starting generation...");
    let started = Instant::now();
    let image = pipeline.generate(&input, &no_progress, None)?;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Generation completed"
    );

    Ok(image_to_base64_png(&image)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Router;
    use axum_test::TestServer;
    use base64::{prelude::BASE64_STANDARD, Engine};
    use image::DynamicImage;
    use sdnpu_core::{
        CacheConfig, Device, DeviceKind, ModelVariant, Pipeline, PipelineCache, PipelineHandle,
        PipelineLoader, PreviewLoader, Progress, Upscaler, MAX_RANDOM_SEED,
    };
    use serde_json::json;
    use std::future::IntoFuture;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Remembers every input it sees and how long each generation held the device.
    #[derive(Default)]
    struct Recorder {
        inputs: Mutex<Vec<PipelineInput>>,
        windows: Mutex<Vec<(Instant, Instant)>>,
        delay: Duration,
    }

    struct RecordingPipeline(Arc<Recorder>);

    impl Pipeline for RecordingPipeline {
        fn generate(
            &self,
            input: &PipelineInput,
            progress: &dyn Fn(Progress),
            upscaler: Option<&dyn Upscaler>,
        ) -> Result<DynamicImage, PipelineError> {
            assert!(upscaler.is_none());
            let start = Instant::now();
            progress(Progress { step: 1, total: 1 });
            std::thread::sleep(self.0.delay);
            self.0.inputs.lock().unwrap().push(input.clone());
            self.0.windows.lock().unwrap().push((start, Instant::now()));
            Ok(DynamicImage::new_rgb8(input.width, input.height))
        }
    }

    struct RecordingLoader(Arc<Recorder>);

    impl PipelineLoader for RecordingLoader {
        fn load(
            &self,
            _: ModelVariant,
            _: &Arc<Device>,
        ) -> anyhow::Result<Arc<dyn Pipeline>> {
            Ok(Arc::new(RecordingPipeline(self.0.clone())))
        }
    }

    struct FailingResolver;

    impl PipelineResolver for FailingResolver {
        fn resolve(&self, model: &str) -> Result<PipelineHandle, ResolveError> {
            Err(ResolveError::Load {
                model: model.to_string(),
                reason: "context binary not found".into(),
            })
        }

        fn evict(&self, _: &str) -> bool {
            false
        }
    }

    struct PanickingPipeline;

    impl Pipeline for PanickingPipeline {
        fn generate(
            &self,
            _: &PipelineInput,
            _: &dyn Fn(Progress),
            _: Option<&dyn Upscaler>,
        ) -> Result<DynamicImage, PipelineError> {
            panic!("device lost")
        }
    }

    struct FixedResolver(Arc<dyn Pipeline>);

    impl PipelineResolver for FixedResolver {
        fn resolve(&self, _: &str) -> Result<PipelineHandle, ResolveError> {
            Ok(PipelineHandle::new(
                ModelVariant::StableDiffusion21,
                self.0.clone(),
                Arc::new(Device::new(DeviceKind::Cpu)),
            ))
        }

        fn evict(&self, _: &str) -> bool {
            false
        }
    }

    struct EmptyImagePipeline;

    impl Pipeline for EmptyImagePipeline {
        fn generate(
            &self,
            _: &PipelineInput,
            _: &dyn Fn(Progress),
            _: Option<&dyn Upscaler>,
        ) -> Result<DynamicImage, PipelineError> {
            Ok(DynamicImage::new_rgb8(0, 0))
        }
    }

    fn recording(delay: Duration) -> (Arc<Recorder>, Arc<dyn PipelineResolver>) {
        let recorder = Arc::new(Recorder {
            delay,
            ..Default::default()
        });
        let cache: Arc<dyn PipelineResolver> = Arc::new(PipelineCache::new(
            RecordingLoader(recorder.clone()),
            Arc::new(Device::new(DeviceKind::Npu(0))),
            CacheConfig::default(),
        ));
        (recorder, cache)
    }

    fn server(resolver: Arc<dyn PipelineResolver>) -> TestServer {
        let router = Router::new()
            .route("/txt2img", post(txt2img))
            .with_state(AppState::new(resolver));
        TestServer::new(router).expect("cannot instantiate TestServer")
    }

    fn decode_png(image: &str) -> DynamicImage {
        let bytes = BASE64_STANDARD.decode(image).expect("valid base64");
        image::load_from_memory_with_format(&bytes, image::ImageFormat::Png).expect("valid png")
    }

    #[tokio::test]
    async fn cat_with_fixed_seed_yields_512_png() {
        let (recorder, resolver) = recording(Duration::ZERO);
        let server = server(resolver);

        let response = server
            .post("/txt2img")
            .json(&json!({"prompt": "a cat", "seed": 42, "model": "Stable-Diffusion-2.1"}))
            .await;
        response.assert_status_ok();

        let body = response.json::<GenerationResponse>();
        let GenerationResponse::Image { image } = body else {
            panic!("expected an image, got {body:?}");
        };
        let png = decode_png(&image);
        assert_eq!((png.width(), png.height()), (512, 512));

        let inputs = recorder.inputs.lock().unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(
            inputs[0],
            PipelineInput {
                mode: sdnpu_core::GenerationMode::TextToImage,
                prompt: "a cat".into(),
                negative_prompt: "".into(),
                seed: 42,
                steps: 20,
                width: 512,
                height: 512,
                guidance_scale: 7.5,
                sampler: "DPM++ 3M SDE".into(),
                model: "Stable-Diffusion-2.1".into(),
            }
        );
    }

    #[tokio::test]
    async fn random_seed_never_reaches_pipeline() {
        let (recorder, resolver) = recording(Duration::ZERO);
        let server = server(resolver);

        for _ in 0..8 {
            server
                .post("/txt2img")
                .json(&json!({"prompt": "a cat"}))
                .await
                .assert_status_ok();
        }

        let inputs = recorder.inputs.lock().unwrap();
        assert!(inputs.iter().all(|i| i.seed <= MAX_RANDOM_SEED));
        let first = inputs[0].seed;
        assert!(inputs.iter().any(|i| i.seed != first));
    }

    #[tokio::test]
    async fn response_has_exactly_one_field() {
        let (_, resolver) = recording(Duration::ZERO);
        let server = server(resolver);

        for body in [
            json!({"prompt": "a cat"}),
            json!({"prompt": "a cat", "model": "no-such-model"}),
        ] {
            let value = server.post("/txt2img").json(&body).await.json::<serde_json::Value>();
            let object = value.as_object().expect("json object");
            assert_eq!(object.len(), 1, "unexpected body {value}");
            assert!(object.contains_key("image") ^ object.contains_key("error"));
        }
    }

    #[tokio::test]
    async fn failing_resolver_yields_error_body() {
        let server = server(Arc::new(FailingResolver));

        let response = server
            .post("/txt2img")
            .json(&json!({"prompt": "a cat"}))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<serde_json::Value>(),
            json!({"error": "failed to load model Stable-Diffusion-2.1: context binary not found"})
        );
    }

    #[tokio::test]
    async fn schema_mismatch_is_rejected_before_orchestration() {
        let (recorder, resolver) = recording(Duration::ZERO);
        let server = server(resolver);

        let response = server
            .post("/txt2img")
            .json(&json!({"prompt": "a cat", "steps": "twenty"}))
            .expect_failure()
            .await;
        assert_eq!(response.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
        assert!(recorder.inputs.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_generations_do_not_overlap_on_one_device() {
        let (recorder, resolver) = recording(Duration::from_millis(150));
        let server = server(resolver);

        let first = server
            .post("/txt2img")
            .json(&json!({"prompt": "a cat", "seed": 1}))
            .into_future();
        let second = server
            .post("/txt2img")
            .json(&json!({"prompt": "a dog", "seed": 2}))
            .into_future();
        let (first, second) = tokio::join!(first, second);

        for response in [first, second] {
            assert!(matches!(
                response.json::<GenerationResponse>(),
                GenerationResponse::Image { .. }
            ));
        }

        let mut windows = recorder.windows.lock().unwrap().clone();
        assert_eq!(windows.len(), 2);
        windows.sort_by_key(|(start, _)| *start);
        assert!(windows[0].1 <= windows[1].0, "generations overlapped");

        let mut seeds: Vec<u64> = recorder.inputs.lock().unwrap().iter().map(|i| i.seed).collect();
        seeds.sort();
        assert_eq!(seeds, vec![1, 2]);
    }

    #[test]
    fn errors_map_to_closed_kinds() {
        let (_, resolver) = recording(Duration::ZERO);

        let req = GenerationRequest {
            model: "FLUX.1-dev".into(),
            ..GenerationRequest::new("a cat")
        };
        let err = generate_blocking(resolver.as_ref(), req).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert_eq!(err.to_string(), "unsupported model: FLUX.1-dev");

        let preview: Arc<dyn PipelineResolver> = Arc::new(PipelineCache::new(
            PreviewLoader,
            Arc::new(Device::new(DeviceKind::Cpu)),
            CacheConfig::default(),
        ));
        let req = GenerationRequest {
            sampler: "Bogus".into(),
            ..GenerationRequest::new("a cat")
        };
        let err = generate_blocking(preview.as_ref(), req).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);

        let empty = FixedResolver(Arc::new(EmptyImagePipeline));
        let err = generate_blocking(&empty, GenerationRequest::new("a cat")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
    }

    #[tokio::test]
    async fn panicking_pipeline_is_reported_not_propagated() {
        let state = AppState::new(Arc::new(FixedResolver(Arc::new(PanickingPipeline))));
        let err = generate_image(&state, GenerationRequest::new("a cat"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert_eq!(err.to_string(), "pipeline runtime error: generation task panicked");
    }

    #[tokio::test]
    async fn preview_pipeline_serves_end_to_end() {
        let cache = PipelineCache::new(
            PreviewLoader,
            Arc::new(Device::new(DeviceKind::Cpu)),
            CacheConfig::default(),
        );
        let server = server(Arc::new(cache));

        let body = server
            .post("/txt2img")
            .json(&json!({"prompt": "a cat", "seed": 42, "width": 256, "height": 128}))
            .await
            .json::<GenerationResponse>();
        let GenerationResponse::Image { image } = body else {
            panic!("expected an image, got {body:?}");
        };
        let png = decode_png(&image);
        assert_eq!((png.width(), png.height()), (256, 128));
    }
}
