use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_HOST: &str = "https://image.novelai.net";

/// Generation models accepted by the service. The curated tiers share wire
/// protocol with their full-tier siblings but use different tag tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    #[serde(rename = "nai-diffusion-3")]
    V3,
    #[serde(rename = "nai-diffusion-3-inpainting")]
    V3Inpainting,
    #[serde(rename = "nai-diffusion-4-full")]
    V4Full,
    #[serde(rename = "nai-diffusion-4-full-inpainting")]
    V4FullInpainting,
    #[serde(rename = "nai-diffusion-4-curated-preview")]
    V4Curated,
    #[serde(rename = "nai-diffusion-4-curated-inpainting")]
    V4CuratedInpainting,
    #[serde(rename = "nai-diffusion-4-5-full")]
    V4_5Full,
    #[serde(rename = "nai-diffusion-4-5-full-inpainting")]
    V4_5FullInpainting,
    #[serde(rename = "nai-diffusion-4-5-curated")]
    V4_5Curated,
    #[serde(rename = "nai-diffusion-4-5-curated-inpainting")]
    V4_5CuratedInpainting,
    #[serde(rename = "nai-diffusion-furry-3")]
    Furry,
    #[serde(rename = "nai-diffusion-furry-3-inpainting")]
    FurryInpainting,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::V3 => "nai-diffusion-3",
            Model::V3Inpainting => "nai-diffusion-3-inpainting",
            Model::V4Full => "nai-diffusion-4-full",
            Model::V4FullInpainting => "nai-diffusion-4-full-inpainting",
            Model::V4Curated => "nai-diffusion-4-curated-preview",
            Model::V4CuratedInpainting => "nai-diffusion-4-curated-inpainting",
            Model::V4_5Full => "nai-diffusion-4-5-full",
            Model::V4_5FullInpainting => "nai-diffusion-4-5-full-inpainting",
            Model::V4_5Curated => "nai-diffusion-4-5-curated",
            Model::V4_5CuratedInpainting => "nai-diffusion-4-5-curated-inpainting",
            Model::Furry => "nai-diffusion-furry-3",
            Model::FurryInpainting => "nai-diffusion-furry-3-inpainting",
        }
    }

    /// Current-protocol models (V4 and V4.5 tiers) answer on the streaming
    /// endpoint with msgpack frames; everything else uses the legacy ZIP path.
    pub fn is_v4(&self) -> bool {
        matches!(
            self,
            Model::V4Full
                | Model::V4FullInpainting
                | Model::V4Curated
                | Model::V4CuratedInpainting
                | Model::V4_5Full
                | Model::V4_5FullInpainting
                | Model::V4_5Curated
                | Model::V4_5CuratedInpainting
        )
    }

    pub fn is_inpainting(&self) -> bool {
        matches!(
            self,
            Model::V3Inpainting
                | Model::V4FullInpainting
                | Model::V4CuratedInpainting
                | Model::V4_5FullInpainting
                | Model::V4_5CuratedInpainting
                | Model::FurryInpainting
        )
    }

    /// Tuning family of the model. Quality-tag suffixes and undesired-content
    /// presets are keyed by family; a model and its inpainting sibling share
    /// one family.
    pub fn family(&self) -> ModelFamily {
        match self {
            Model::V3 | Model::V3Inpainting => ModelFamily::V3,
            Model::V4Full | Model::V4FullInpainting => ModelFamily::V4Full,
            Model::V4Curated | Model::V4CuratedInpainting => ModelFamily::V4Curated,
            Model::V4_5Full | Model::V4_5FullInpainting => ModelFamily::V4_5Full,
            Model::V4_5Curated | Model::V4_5CuratedInpainting => ModelFamily::V4_5Curated,
            Model::Furry | Model::FurryInpainting => ModelFamily::Furry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    V3,
    V4Full,
    V4Curated,
    V4_5Full,
    V4_5Curated,
    Furry,
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Model {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nai-diffusion-3" => Ok(Model::V3),
            "nai-diffusion-3-inpainting" => Ok(Model::V3Inpainting),
            "nai-diffusion-4-full" => Ok(Model::V4Full),
            "nai-diffusion-4-full-inpainting" => Ok(Model::V4FullInpainting),
            "nai-diffusion-4-curated-preview" => Ok(Model::V4Curated),
            "nai-diffusion-4-curated-inpainting" => Ok(Model::V4CuratedInpainting),
            "nai-diffusion-4-5-full" => Ok(Model::V4_5Full),
            "nai-diffusion-4-5-full-inpainting" => Ok(Model::V4_5FullInpainting),
            "nai-diffusion-4-5-curated" => Ok(Model::V4_5Curated),
            "nai-diffusion-4-5-curated-inpainting" => Ok(Model::V4_5CuratedInpainting),
            "nai-diffusion-furry-3" => Ok(Model::Furry),
            "nai-diffusion-furry-3-inpainting" => Ok(Model::FurryInpainting),
            other => Err(Error::Validation(format!("unknown model: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Generate,
    #[serde(rename = "infill")]
    Inpaint,
    Img2Img,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Generate => "generate",
            Action::Inpaint => "infill",
            Action::Img2Img => "img2img",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named resolution presets. Free dimensions are accepted too; these cover
/// the aspect ratios the service bills at known rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    SmallPortrait,
    SmallLandscape,
    SmallSquare,
    NormalPortrait,
    NormalLandscape,
    NormalSquare,
    LargePortrait,
    LargeLandscape,
    LargeSquare,
    WallpaperPortrait,
    WallpaperLandscape,
}

impl Resolution {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Resolution::SmallPortrait => (512, 768),
            Resolution::SmallLandscape => (768, 512),
            Resolution::SmallSquare => (640, 640),
            Resolution::NormalPortrait => (832, 1216),
            Resolution::NormalLandscape => (1216, 832),
            Resolution::NormalSquare => (1024, 1024),
            Resolution::LargePortrait => (1024, 1536),
            Resolution::LargeLandscape => (1536, 1024),
            Resolution::LargeSquare => (1472, 1472),
            Resolution::WallpaperPortrait => (1088, 1920),
            Resolution::WallpaperLandscape => (1920, 1088),
        }
    }

    pub fn area(&self) -> u64 {
        let (w, h) = self.dimensions();
        w as u64 * h as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sampler {
    #[serde(rename = "k_euler")]
    Euler,
    #[serde(rename = "k_euler_ancestral")]
    EulerAncestral,
    #[serde(rename = "k_dpmpp_2s_ancestral")]
    Dpm2SAncestral,
    #[serde(rename = "k_dpmpp_2m")]
    Dpm2M,
    #[serde(rename = "k_dpmpp_2m_sde")]
    Dpm2MSde,
    #[serde(rename = "k_dpmpp_sde")]
    DpmSde,
    #[serde(rename = "ddim_v3")]
    DdimV3,
}

impl Sampler {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sampler::Euler => "k_euler",
            Sampler::EulerAncestral => "k_euler_ancestral",
            Sampler::Dpm2SAncestral => "k_dpmpp_2s_ancestral",
            Sampler::Dpm2M => "k_dpmpp_2m",
            Sampler::Dpm2MSde => "k_dpmpp_2m_sde",
            Sampler::DpmSde => "k_dpmpp_sde",
            Sampler::DdimV3 => "ddim_v3",
        }
    }
}

// Native was deprecated on the V4-curated and later models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseSchedule {
    Native,
    Karras,
    Exponential,
    Polyexponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlnetModel {
    #[serde(rename = "hed")]
    PaletteSwap,
    #[serde(rename = "midas")]
    FormLock,
    #[serde(rename = "fake_scribble")]
    Scribbler,
    #[serde(rename = "mlsd")]
    BuildingControl,
    #[serde(rename = "uniformer")]
    Landscaper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Image,
    ImageStream,
    Director,
    EncodeVibe,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Image => "/ai/generate-image",
            Endpoint::ImageStream => "/ai/generate-image-stream",
            Endpoint::Director => "/ai/augment-image",
            Endpoint::EncodeVibe => "/ai/encode-vibe",
        }
    }
}
