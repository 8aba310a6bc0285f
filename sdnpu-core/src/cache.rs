use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Device, ModelVariant, Pipeline, PipelineHandle, PipelineLoader, ResolveError};

/// Hands out ready-to-run pipelines by model identifier.
pub trait PipelineResolver: Send + Sync {
    /// Returns a pipeline for `model`, loading it if needed. May block for a long time.
    fn resolve(&self, model: &str) -> Result<PipelineHandle, ResolveError>;

    /// Drops the cached pipeline for `model`. Returns whether one was cached.
    fn evict(&self, model: &str) -> bool;
}

pub const DEFAULT_CACHE_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of loaded pipelines. Values below one are treated as one.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

type Entry = (ModelVariant, Arc<dyn Pipeline>);

/// Bounded pipeline cache with least-recently-used eviction.
///
/// Every pipeline is bound to the same device. Loads happen under the cache lock and the
/// device lock, so a model is never loaded twice concurrently and never while a generation is
/// running. The flip side: a cold load first waits for any in-flight generation, and while it
/// runs every other `resolve`, including hits on already cached models, waits on the cache lock.
pub struct PipelineCache {
    loader: Box<dyn PipelineLoader>,
    device: Arc<Device>,
    capacity: usize,
    // Front is most recently used.
    entries: Mutex<VecDeque<Entry>>,
}

impl PipelineCache {
    pub fn new(
        loader: impl PipelineLoader + 'static,
        device: Arc<Device>,
        config: CacheConfig,
    ) -> Self {
        Self {
            loader: Box::new(loader),
            device,
            capacity: config.capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Cached variants, most recently used first.
    pub fn cached(&self) -> Vec<ModelVariant> {
        self.lock_entries().iter().map(|(v, _)| *v).collect()
    }

    fn lock_entries(&self) -> MutexGuard<'_, VecDeque<Entry>> {
        // Poisoning is ignored: every mutation is a single deque operation.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PipelineResolver for PipelineCache {
    fn resolve(&self, model: &str) -> Result<PipelineHandle, ResolveError> {
        let variant = ModelVariant::from_name(model)
            .ok_or_else(|| ResolveError::UnknownModel(model.to_string()))?;

        let mut entries = self.lock_entries();

        let pos = entries.iter().position(|(v, _)| *v == variant);
        if let Some(entry) = pos.and_then(|pos| entries.remove(pos)) {
            let pipeline = entry.1.clone();
            entries.push_front(entry);
            tracing::debug!(model = %variant, "pipeline cache hit");
            return Ok(PipelineHandle::new(variant, pipeline, self.device.clone()));
        }

        tracing::info!(model = %variant, device = %self.device.kind(), "loading pipeline");
        let pipeline = {
            let _guard = self.device.acquire_blocking();
            self.loader
                .load(variant, &self.device)
                .map_err(|e| ResolveError::Load {
                    model: variant.to_string(),
                    reason: format!("{e:#}"),
                })?
        };

        while entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.pop_back() {
                tracing::info!(model = %evicted, "evicting least recently used pipeline");
            }
        }
        entries.push_front((variant, pipeline.clone()));

        Ok(PipelineHandle::new(variant, pipeline, self.device.clone()))
    }

    fn evict(&self, model: &str) -> bool {
        let Some(variant) = ModelVariant::from_name(model) else {
            return false;
        };
        let mut entries = self.lock_entries();
        match entries.iter().position(|(v, _)| *v == variant) {
            Some(pos) => {
                entries.remove(pos);
                tracing::info!(model = %variant, "evicted pipeline");
                true
            }
            None => false,
        }
    }
}
