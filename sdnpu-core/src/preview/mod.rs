//! A CPU-rendered stand-in for the accelerated pipelines.
//!
//! It honours the full pipeline contract (input validation, sampler names, per-step progress,
//! seed determinism, optional upscaling) but draws smooth seeded noise instead of running a
//! diffusion model, so the service can be exercised on machines without an NPU runtime.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use image::{DynamicImage, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{
    GenerationMode, ModelVariant, Pipeline, PipelineError, PipelineInput, Progress, Sampler,
    Upscaler,
};

const MAX_STEPS: u32 = 150;
const MIN_DIMENSION: u32 = 64;
const MAX_DIMENSION: u32 = 2048;
const DIMENSION_MULTIPLE: u32 = 8;
const CELL: u32 = 64;

#[derive(Debug)]
pub struct PreviewPipeline {
    variant: ModelVariant,
}

impl PreviewPipeline {
    pub fn new(variant: ModelVariant) -> Self {
        Self { variant }
    }
}

impl Pipeline for PreviewPipeline {
    fn generate(
        &self,
        input: &PipelineInput,
        progress: &dyn Fn(Progress),
        upscaler: Option<&dyn Upscaler>,
    ) -> Result<DynamicImage, PipelineError> {
        validate(input)?;
        let sampler = Sampler::from_name(&input.sampler)?;

        let mut rng = StdRng::seed_from_u64(input.seed ^ prompt_hash(self.variant, input));
        let grid = Grid::random(input.width, input.height, &mut rng);

        for step in 1..=input.steps {
            progress(Progress {
                step,
                total: input.steps,
            });
        }

        let contrast = 1.0 + (input.guidance_scale.clamp(0.0, 20.0) / 20.0) as f32;
        // Stochastic samplers leave more grain behind.
        let grain = if is_stochastic(sampler) { 1.0 } else { 0.5 };
        let residual = grain / input.steps as f32;
        let img = RgbImage::from_fn(input.width, input.height, |x, y| {
            let base = grid.sample(x, y);
            let mut px = [0u8; 3];
            for (c, out) in px.iter_mut().enumerate() {
                let noise = rng.gen_range(-residual..=residual);
                let v = ((base[c] - 0.5) * contrast + 0.5 + noise).clamp(0.0, 1.0);
                *out = (v * 255.0).round() as u8;
            }
            Rgb(px)
        });

        let img = DynamicImage::ImageRgb8(img);
        match upscaler {
            Some(upscaler) => upscaler.upscale(img),
            None => Ok(img),
        }
    }
}

fn validate(input: &PipelineInput) -> Result<(), PipelineError> {
    if input.mode != GenerationMode::TextToImage {
        return Err(PipelineError::InvalidInput(format!(
            "unsupported mode {:?}",
            input.mode
        )));
    }
    if input.steps == 0 || input.steps > MAX_STEPS {
        return Err(PipelineError::InvalidInput(format!(
            "steps must be between 1 and {MAX_STEPS}, got {}",
            input.steps
        )));
    }
    for (name, value) in [("width", input.width), ("height", input.height)] {
        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) || value % DIMENSION_MULTIPLE != 0 {
            return Err(PipelineError::InvalidInput(format!(
                "{name} must be a multiple of {DIMENSION_MULTIPLE} between {MIN_DIMENSION} and {MAX_DIMENSION}, got {value}"
            )));
        }
    }
    if !input.guidance_scale.is_finite() {
        return Err(PipelineError::InvalidInput("cfg_scale must be finite".into()));
    }
    Ok(())
}

fn is_stochastic(sampler: Sampler) -> bool {
    matches!(
        sampler,
        Sampler::EulerAncestral | Sampler::DpmPpSde | Sampler::DpmPp3MSde
    )
}

fn prompt_hash(variant: ModelVariant, input: &PipelineInput) -> u64 {
    let mut hasher = DefaultHasher::new();
    variant.hash(&mut hasher);
    input.prompt.hash(&mut hasher);
    input.negative_prompt.hash(&mut hasher);
    hasher.finish()
}

/// Coarse lattice of random colours, bilinearly interpolated per pixel.
struct Grid {
    cols: usize,
    cells: Vec<[f32; 3]>,
}

impl Grid {
    fn random(width: u32, height: u32, rng: &mut StdRng) -> Self {
        let cols = (width / CELL) as usize + 2;
        let rows = (height / CELL) as usize + 2;
        let cells = (0..cols * rows)
            .map(|_| [rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>()])
            .collect();
        Self { cols, cells }
    }

    fn at(&self, col: usize, row: usize) -> [f32; 3] {
        self.cells[row * self.cols + col]
    }

    fn sample(&self, x: u32, y: u32) -> [f32; 3] {
        let gx = x as f32 / CELL as f32;
        let gy = y as f32 / CELL as f32;
        let (col, row) = (gx as usize, gy as usize);
        let (tx, ty) = (gx.fract(), gy.fract());

        let tl = self.at(col, row);
        let tr = self.at(col + 1, row);
        let bl = self.at(col, row + 1);
        let br = self.at(col + 1, row + 1);

        let mut out = [0.0; 3];
        for c in 0..3 {
            let top = tl[c] + (tr[c] - tl[c]) * tx;
            let bottom = bl[c] + (br[c] - bl[c]) * tx;
            out[c] = top + (bottom - top) * ty;
        }
        out
    }
}
