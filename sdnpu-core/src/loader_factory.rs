use serde::{Deserialize, Serialize};

/// Stable Diffusion variants with an accelerated pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    #[serde(rename = "Stable-Diffusion-1.5")]
    StableDiffusion15,
    #[serde(rename = "Stable-Diffusion-2.1")]
    StableDiffusion21,
    #[serde(rename = "Stable-Diffusion-XL")]
    StableDiffusionXl,
}

serde_plain::derive_display_from_serialize!(ModelVariant);

impl ModelVariant {
    /// Detect model variant from model name
    ///
    /// Matching ignores case and separators, so `sd-2.1`, `SD21` and `Stable-Diffusion-2.1`
    /// all name the same variant.
    pub fn from_name(model_name: &str) -> Option<Self> {
        let name_upper: String = model_name
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let rest = name_upper
            .strip_prefix("STABLEDIFFUSION")
            .or_else(|| name_upper.strip_prefix("SD"))?;
        let rest = rest.strip_prefix('V').unwrap_or(rest);

        if rest.starts_with("XL") {
            Some(ModelVariant::StableDiffusionXl)
        } else if rest == "21" {
            Some(ModelVariant::StableDiffusion21)
        } else if rest == "15" {
            Some(ModelVariant::StableDiffusion15)
        } else {
            None
        }
    }
}
