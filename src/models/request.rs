use serde::Serialize;
use serde_json::{json, Value};

use crate::constant::{Action, ControlnetModel, Model, NoiseSchedule, Resolution, Sampler};
use crate::error::Result;
use crate::models::character::{CharacterPrompt, NegativePromptFormat, PromptFormat};

/// Parameters for one generation call.
///
/// Serializes to the `parameters` object of the wire payload; the general
/// fields (`prompt`, `model`, `action`, `res_preset`) are excluded and placed
/// at the top level by `payload_value`. Construct with `Default` plus the
/// `with_*` builders, then hand to `normalize` (or `NaiClient`, which
/// normalizes internally).
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    // General, never part of `parameters`
    #[serde(skip)]
    pub prompt: String,
    #[serde(skip)]
    pub model: Model,
    #[serde(skip)]
    pub action: Action,
    #[serde(skip)]
    pub res_preset: Resolution,

    // Prompt
    pub negative_prompt: String,
    #[serde(rename = "qualityToggle")]
    pub quality_toggle: bool,
    /// Undesired-content preset index, 0-3. Meaning varies per model family.
    #[serde(rename = "ucPreset")]
    pub uc_preset: u8,

    // Image settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub n_samples: u32,

    // Sampling settings
    pub steps: u32,
    pub scale: f64,
    pub dynamic_thresholding: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_noise_seed: Option<u32>,
    pub sampler: Sampler,
    /// Legacy SMEA toggles, V3-era models only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sm: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sm_dyn: Option<bool>,
    pub cfg_rescale: f64,
    pub noise_schedule: NoiseSchedule,

    // img2img
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise: Option<f64>,
    pub controlnet_strength: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controlnet_condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controlnet_model: Option<ControlnetModel>,

    // Inpaint
    pub add_original_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,

    // Vibe transfer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image_multiple: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_information_extracted_multiple: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_strength_multiple: Option<Vec<f64>>,

    // Current-protocol fields
    pub params_version: u8,
    #[serde(rename = "autoSmea")]
    pub auto_smea: bool,
    #[serde(rename = "characterPrompts", skip_serializing_if = "Option::is_none")]
    pub character_prompts: Option<Vec<CharacterPrompt>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v4_prompt: Option<PromptFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v4_negative_prompt: Option<NegativePromptFormat>,
    /// Variety Boost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_cfg_above_sigma: Option<u32>,
    pub use_coords: bool,
    pub legacy_uc: bool,
    pub normalize_reference_strength_multiple: bool,
    pub deliberate_euler_ancestral_bug: bool,
    pub prefer_brownian: bool,
    #[serde(
        rename = "inpaintImg2ImgStrength",
        skip_serializing_if = "Option::is_none"
    )]
    pub inpaint_img2img_strength: Option<u32>,

    // Misc
    pub legacy: bool,
    pub legacy_v3_extend: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        GenerationRequest {
            prompt: String::new(),
            model: Model::V4_5Full,
            action: Action::Generate,
            res_preset: Resolution::NormalSquare,
            negative_prompt: String::new(),
            quality_toggle: true,
            uc_preset: 0,
            width: None,
            height: None,
            n_samples: 1,
            steps: 28,
            scale: 6.0,
            dynamic_thresholding: false,
            seed: None,
            extra_noise_seed: None,
            sampler: Sampler::EulerAncestral,
            sm: None,
            sm_dyn: None,
            cfg_rescale: 0.0,
            noise_schedule: NoiseSchedule::Karras,
            image: None,
            strength: None,
            noise: None,
            controlnet_strength: 1.0,
            controlnet_condition: None,
            controlnet_model: None,
            add_original_image: true,
            mask: None,
            reference_image_multiple: None,
            reference_information_extracted_multiple: None,
            reference_strength_multiple: None,
            params_version: 3,
            auto_smea: false,
            character_prompts: Some(Vec::new()),
            v4_prompt: None,
            v4_negative_prompt: None,
            skip_cfg_above_sigma: None,
            use_coords: false,
            legacy_uc: false,
            normalize_reference_strength_multiple: true,
            deliberate_euler_ancestral_bug: false,
            prefer_brownian: false,
            inpaint_img2img_strength: None,
            legacy: false,
            legacy_v3_extend: false,
            stream: None,
        }
    }
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        GenerationRequest {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = negative_prompt.into();
        self
    }

    pub fn with_resolution(mut self, preset: Resolution) -> Self {
        self.res_preset = preset;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_n_samples(mut self, n_samples: u32) -> Self {
        self.n_samples = n_samples;
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_character_prompts(mut self, prompts: Vec<CharacterPrompt>) -> Self {
        self.character_prompts = Some(prompts);
        self
    }

    pub fn with_quality_toggle(mut self, enabled: bool) -> Self {
        self.quality_toggle = enabled;
        self
    }

    pub fn with_uc_preset(mut self, preset: u8) -> Self {
        self.uc_preset = preset;
        self
    }

    /// Base image for img2img, with optional strength and noise overrides.
    pub fn with_base_image(mut self, image_b64: impl Into<String>) -> Self {
        self.image = Some(image_b64.into());
        self
    }

    pub fn with_vibe_references(
        mut self,
        images_b64: Vec<String>,
        information_extracted: Option<Vec<f64>>,
        strengths: Option<Vec<f64>>,
    ) -> Self {
        self.reference_image_multiple = Some(images_b64);
        self.reference_information_extracted_multiple = information_extracted;
        self.reference_strength_multiple = strengths;
        self
    }

    /// Full request body: prompt as `input`, model and action ids, and the
    /// serialized parameters object.
    pub(crate) fn payload_value(&self) -> Result<Value> {
        let parameters = serde_json::to_value(self)?;
        Ok(json!({
            "input": self.prompt,
            "model": self.model.as_str(),
            "action": self.action.as_str(),
            "parameters": parameters,
        }))
    }
}
