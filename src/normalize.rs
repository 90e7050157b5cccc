use std::ops::Deref;

use rand::Rng;
use serde_json::Value;

use crate::constant::{Action, ModelFamily, Sampler};
use crate::error::{Error, Result};
use crate::models::character::{
    CaptionFormat, CharacterCaption, NegativePromptFormat, PromptFormat,
};
use crate::models::request::GenerationRequest;
use crate::tags::deduplicate_tags;

pub const MAX_SEED: u32 = 4_294_967_288;
const MIN_AREA: u64 = 64 * 64;
const MAX_AREA: u64 = 3_047_424;

/// A request that went through the full normalization pipeline.
///
/// Wraps the request read-only; the only ways to obtain one are
/// `GenerationRequest::normalize` / `normalize_with`, so holding a
/// `NormalizedRequest` means every defaulting and validation rule has run.
#[derive(Debug, Clone)]
pub struct NormalizedRequest(GenerationRequest);

impl NormalizedRequest {
    pub fn dimensions(&self) -> (u32, u32) {
        // Stage 1 always materializes both.
        (self.0.width.unwrap_or(0), self.0.height.unwrap_or(0))
    }

    pub fn to_payload(&self) -> Result<Value> {
        self.0.payload_value()
    }

    /// Replaces the reference images with encoded vibe tokens and drops the
    /// extraction list, which the token already incorporates.
    pub(crate) fn with_vibe_tokens(mut self, tokens: Vec<String>) -> Self {
        self.0.reference_image_multiple = Some(tokens);
        self.0.reference_information_extracted_multiple = None;
        self
    }
}

impl Deref for NormalizedRequest {
    type Target = GenerationRequest;

    fn deref(&self) -> &GenerationRequest {
        &self.0
    }
}

impl GenerationRequest {
    /// Runs the normalization pipeline with seeds drawn from `thread_rng`.
    pub fn normalize(self) -> Result<NormalizedRequest> {
        self.normalize_with(&mut rand::thread_rng())
    }

    /// Runs the normalization pipeline, drawing any missing seeds from `rng`.
    ///
    /// Stages run in a fixed order and each takes and returns the request by
    /// value. The whole pipeline is idempotent: normalizing an already
    /// normalized request changes nothing.
    pub fn normalize_with(self, rng: &mut impl Rng) -> Result<NormalizedRequest> {
        let req = validate_ranges(self)?;
        let req = default_seed(req, rng);
        let req = resolve_resolution(req)?;
        let req = validate_n_samples(req)?;
        let req = append_quality_tags(req);
        let req = append_uc_preset(req);
        let req = dedup_prompts(req);
        let req = infer_use_coords(req);
        let req = default_character_prompts(req);
        let req = set_stream_flag(req);
        let req = synthesize_v4_prompt(req);
        let req = synthesize_v4_negative_prompt(req);
        let req = default_inpaint_strength(req);
        let req = default_action_extras(req, rng);
        let req = reconcile_vibe_lists(req);
        let req = force_sampler_flags(req);
        Ok(NormalizedRequest(req))
    }
}

fn validate_ranges(req: GenerationRequest) -> Result<GenerationRequest> {
    if let Some(seed) = req.seed {
        if seed == 0 || seed > MAX_SEED {
            return Err(Error::Validation(format!(
                "seed must be in (0, {}], got {}",
                MAX_SEED, seed
            )));
        }
    }
    if req.steps == 0 || req.steps > 50 {
        return Err(Error::Validation(format!(
            "steps must be in [1, 50], got {}",
            req.steps
        )));
    }
    if !(0.0..=10.0).contains(&req.scale) {
        return Err(Error::Validation(format!(
            "scale must be in [0, 10], got {}",
            req.scale
        )));
    }
    if !(0.0..=1.0).contains(&req.cfg_rescale) {
        return Err(Error::Validation(format!(
            "cfg_rescale must be in [0, 1], got {}",
            req.cfg_rescale
        )));
    }
    if let Some(strength) = req.strength {
        if !(0.01..=0.99).contains(&strength) {
            return Err(Error::Validation(format!(
                "strength must be in [0.01, 0.99], got {}",
                strength
            )));
        }
    }
    if let Some(noise) = req.noise {
        if !(0.0..=0.99).contains(&noise) {
            return Err(Error::Validation(format!(
                "noise must be in [0, 0.99], got {}",
                noise
            )));
        }
    }
    if !(0.1..=2.0).contains(&req.controlnet_strength) {
        return Err(Error::Validation(format!(
            "controlnet_strength must be in [0.1, 2], got {}",
            req.controlnet_strength
        )));
    }
    if req.uc_preset > 3 {
        return Err(Error::Validation(format!(
            "ucPreset must be in [0, 3], got {}",
            req.uc_preset
        )));
    }
    if req.params_version == 0 || req.params_version > 3 {
        return Err(Error::Validation(format!(
            "params_version must be in [1, 3], got {}",
            req.params_version
        )));
    }
    if let Some(cps) = &req.character_prompts {
        for cp in cps {
            if !(0.1..=0.9).contains(&cp.center.x) || !(0.1..=0.9).contains(&cp.center.y) {
                return Err(Error::Validation(format!(
                    "character center must be in [0.1, 0.9]x[0.1, 0.9], got ({}, {})",
                    cp.center.x, cp.center.y
                )));
            }
        }
    }
    Ok(req)
}

fn default_seed(mut req: GenerationRequest, rng: &mut impl Rng) -> GenerationRequest {
    if req.seed.is_none() {
        req.seed = Some(rng.gen_range(1..=MAX_SEED));
    }
    req
}

fn resolve_resolution(mut req: GenerationRequest) -> Result<GenerationRequest> {
    match (req.width, req.height) {
        (Some(width), Some(height)) => {
            for dim in [width, height] {
                if !(64..=49152).contains(&dim) {
                    return Err(Error::Validation(format!(
                        "width and height must be in [64, 49152], got {}x{}",
                        width, height
                    )));
                }
            }
            req.width = Some(width.div_ceil(64) * 64);
            req.height = Some(height.div_ceil(64) * 64);
        }
        _ => {
            let (width, height) = req.res_preset.dimensions();
            req.width = Some(width);
            req.height = Some(height);
        }
    }

    let area = req.width.unwrap() as u64 * req.height.unwrap() as u64;
    if !(MIN_AREA..=MAX_AREA).contains(&area) {
        return Err(Error::Validation(format!(
            "total resolution must be in [{}, {}] px, got {}x{}={}",
            MIN_AREA,
            MAX_AREA,
            req.width.unwrap(),
            req.height.unwrap(),
            area
        )));
    }
    Ok(req)
}

/// Resolution-dependent cap on samples per request. Anything above the
/// largest band is rejected outright.
fn max_n_samples(width: u32, height: u32) -> u32 {
    let area = width as u64 * height as u64;
    if area <= 512 * 704 {
        8
    } else if area <= 640 * 640 {
        6
    } else if area <= 1024 * 3072 {
        4
    } else {
        0
    }
}

fn validate_n_samples(req: GenerationRequest) -> Result<GenerationRequest> {
    let (width, height) = (req.width.unwrap_or(0), req.height.unwrap_or(0));
    let cap = max_n_samples(width, height);
    if req.n_samples == 0 || req.n_samples > cap {
        return Err(Error::Validation(format!(
            "max value of n_samples is {} under current resolution ({}x{}), got {}",
            cap, width, height, req.n_samples
        )));
    }
    Ok(req)
}

fn quality_tags(family: ModelFamily) -> &'static str {
    match family {
        ModelFamily::V4_5Full => ", very aesthetic, masterpiece, no text",
        ModelFamily::V4_5Curated => {
            ", location, masterpiece, no text, -0.8::feet::, rating:general"
        }
        ModelFamily::V4Full => ", no text, best quality, very aesthetic, absurdres",
        ModelFamily::V4Curated => ", rating:general, amazing quality, very aesthetic, absurdres",
        ModelFamily::V3 => ", best quality, amazing quality, very aesthetic, absurdres",
        ModelFamily::Furry => ", {best quality}, {amazing quality}",
    }
}

fn append_quality_tags(mut req: GenerationRequest) -> GenerationRequest {
    if req.quality_toggle {
        req.prompt.push_str(quality_tags(req.model.family()));
    }
    req
}

/// Undesired-content preset texts, keyed by (family, preset index). Unmapped
/// combinations fall through to `None` and leave the negative prompt alone.
fn uc_preset_text(family: ModelFamily, preset: u8) -> Option<&'static str> {
    match (family, preset) {
        (ModelFamily::V4_5Full, 0) => Some(
            "nsfw, lowres, artistic error, film grain, scan artifacts, worst quality, bad quality, jpeg artifacts, very displeasing, chromatic aberration, dithering, halftone, screentone, multiple views, logo, too many watermarks, negative space, blank page",
        ),
        (ModelFamily::V4_5Full, 1) => Some(
            "nsfw, lowres, artistic error, scan artifacts, worst quality, bad quality, jpeg artifacts, multiple views, very displeasing, too many watermarks, negative space, blank page",
        ),
        (ModelFamily::V4_5Full, 2) => Some(
            "nsfw, {worst quality}, distracting watermark, unfinished, bad quality, {widescreen}, upscale, {sequence}, {{grandfathered content}}, blurred foreground, chromatic aberration, sketch, everyone, [sketch background], simple, [flat colors], ych (character), outline, multiple scenes, [[horror (theme)]], comic",
        ),
        (ModelFamily::V4_5Full, 3) => Some(
            "nsfw, lowres, artistic error, film grain, scan artifacts, worst quality, bad quality, jpeg artifacts, very displeasing, chromatic aberration, dithering, halftone, screentone, multiple views, logo, too many watermarks, negative space, blank page, @_@, mismatched pupils, glowing eyes, bad anatomy",
        ),
        (ModelFamily::V4_5Curated, 0) => Some(
            "blurry, lowres, upscaled, artistic error, film grain, scan artifacts, worst quality, bad quality, jpeg artifacts, very displeasing, chromatic aberration, halftone, multiple views, logo, too many watermarks, negative space, blank page",
        ),
        (ModelFamily::V4_5Curated, 1) => Some(
            "blurry, lowres, upscaled, artistic error, scan artifacts, jpeg artifacts, logo, too many watermarks, negative space, blank page",
        ),
        (ModelFamily::V4_5Curated, 2) => Some(
            "blurry, lowres, upscaled, artistic error, film grain, scan artifacts, bad anatomy, bad hands, worst quality, bad quality, jpeg artifacts, very displeasing, chromatic aberration, halftone, multiple views, logo, too many watermarks, @_@, mismatched pupils, glowing eyes, negative space, blank page",
        ),
        (ModelFamily::V4Full, 0) => Some(
            "blurry, lowres, error, film grain, scan artifacts, worst quality, bad quality, jpeg artifacts, very displeasing, chromatic aberration, multiple views, logo, too many watermarks",
        ),
        (ModelFamily::V4Full, 1) => Some(
            "blurry, lowres, error, worst quality, bad quality, jpeg artifacts, very displeasing",
        ),
        (ModelFamily::V4Curated, 0) => Some(
            "blurry, lowres, error, film grain, scan artifacts, worst quality, bad quality, jpeg artifacts, very displeasing, chromatic aberration, logo, dated, signature, multiple views, gigantic breasts",
        ),
        (ModelFamily::V4Curated, 1) => Some(
            "blurry, lowres, error, worst quality, bad quality, jpeg artifacts, very displeasing, logo, dated, signature",
        ),
        (ModelFamily::V3, 0) => Some(
            "lowres, {bad}, error, fewer, extra, missing, worst quality, jpeg artifacts, bad quality, watermark, unfinished, displeasing, chromatic aberration, signature, extra digits, artistic error, username, scan, [abstract]",
        ),
        (ModelFamily::V3, 1) => Some(
            "lowres, jpeg artifacts, worst quality, watermark, blurry, very displeasing",
        ),
        (ModelFamily::V3, 2) => Some(
            "lowres, {bad}, error, fewer, extra, missing, worst quality, jpeg artifacts, bad quality, watermark, unfinished, displeasing, chromatic aberration, signature, extra digits, artistic error, username, scan, [abstract], bad anatomy, bad hands, @_@, mismatched pupils, heart-shaped pupils, glowing eyes",
        ),
        (ModelFamily::Furry, 0) => Some(
            "{{worst quality}}, [displeasing], {unusual pupils}, guide lines, {{unfinished}}, {bad}, url, artist name, {{tall image}}, mosaic, {sketch page}, comic panel, impact (font), [dated], {logo}, ych, {what}, {where is your god now}, {distorted text}, repeated text, {floating head}, {1994}, {widescreen}, absolutely everyone, sequence, {compression artifacts}, hard translated, {cropped}, {commissioner name}, unknown text, high contrast",
        ),
        (ModelFamily::Furry, 1) => Some(
            "{worst quality}, guide lines, unfinished, bad, url, tall image, widescreen, compression artifacts, unknown text",
        ),
        _ => None,
    }
}

fn append_uc_preset(mut req: GenerationRequest) -> GenerationRequest {
    if let Some(uc) = uc_preset_text(req.model.family(), req.uc_preset) {
        req.negative_prompt = format!("{}, {}", uc, req.negative_prompt);
    }
    req
}

fn dedup_prompts(mut req: GenerationRequest) -> GenerationRequest {
    req.prompt = deduplicate_tags(&req.prompt);
    req.negative_prompt = deduplicate_tags(&req.negative_prompt);
    req
}

fn infer_use_coords(mut req: GenerationRequest) -> GenerationRequest {
    if let Some(cps) = &req.character_prompts {
        if cps.iter().any(|cp| cp.center.x != 0.5 || cp.center.y != 0.5) {
            req.use_coords = true;
        }
    }
    req
}

fn default_character_prompts(mut req: GenerationRequest) -> GenerationRequest {
    if req.action != Action::Generate {
        // Character placement only exists for plain generation.
        req.character_prompts = None;
        return req;
    }

    if let Some(cps) = &mut req.character_prompts {
        for cp in cps {
            cp.enabled = true;
            cp.prompt = if cp.prompt.is_empty() {
                "1girl, cute".to_string()
            } else {
                deduplicate_tags(&cp.prompt)
            };
            cp.uc = if cp.uc.is_empty() {
                "lowres, aliasing".to_string()
            } else {
                deduplicate_tags(&cp.uc)
            };
        }
    }
    req
}

fn set_stream_flag(mut req: GenerationRequest) -> GenerationRequest {
    if req.model.is_v4() && req.action == Action::Generate {
        req.stream = Some("msgpack".to_string());
    }
    req
}

fn synthesize_v4_prompt(mut req: GenerationRequest) -> GenerationRequest {
    if req.v4_prompt.is_some() || !req.model.is_v4() || req.action == Action::Img2Img {
        return req;
    }

    let char_captions = req
        .character_prompts
        .iter()
        .flatten()
        .filter(|cp| cp.enabled)
        .map(|cp| CharacterCaption {
            char_caption: cp.prompt.clone(),
            centers: vec![cp.center],
        })
        .collect();

    req.v4_prompt = Some(PromptFormat {
        caption: CaptionFormat {
            base_caption: req.prompt.clone(),
            char_captions,
        },
        use_coords: req.use_coords,
        use_order: true,
    });
    req
}

fn synthesize_v4_negative_prompt(mut req: GenerationRequest) -> GenerationRequest {
    if req.v4_negative_prompt.is_some() || !req.model.is_v4() || req.action == Action::Img2Img {
        return req;
    }

    let char_captions = req
        .character_prompts
        .iter()
        .flatten()
        .filter(|cp| cp.enabled && !cp.uc.is_empty())
        .map(|cp| CharacterCaption {
            char_caption: cp.uc.clone(),
            centers: vec![cp.center],
        })
        .collect();

    req.v4_negative_prompt = Some(NegativePromptFormat {
        caption: CaptionFormat {
            base_caption: req.negative_prompt.clone(),
            char_captions,
        },
        legacy_uc: req.legacy_uc,
    });
    req
}

fn default_inpaint_strength(mut req: GenerationRequest) -> GenerationRequest {
    if req.model.family() == ModelFamily::V4_5Full && req.inpaint_img2img_strength.is_none() {
        req.inpaint_img2img_strength = Some(1);
    }
    req
}

fn default_action_extras(mut req: GenerationRequest, rng: &mut impl Rng) -> GenerationRequest {
    if matches!(req.action, Action::Img2Img | Action::Inpaint) {
        req.strength = req.strength.or(Some(0.3));
        req.noise = req.noise.or(Some(0.0));
        if req.extra_noise_seed.is_none() {
            req.extra_noise_seed = Some(rng.gen_range(1..=MAX_SEED));
        }
    }
    req
}

fn reconcile_vibe_lists(mut req: GenerationRequest) -> GenerationRequest {
    let len = req.reference_image_multiple.as_ref().map_or(0, Vec::len);
    if len == 0 {
        // Never leave a partially populated trio behind.
        req.reference_image_multiple = None;
        req.reference_information_extracted_multiple = None;
        req.reference_strength_multiple = None;
    } else {
        let mut extracted = req
            .reference_information_extracted_multiple
            .take()
            .unwrap_or_default();
        extracted.resize(len, 1.0);
        req.reference_information_extracted_multiple = Some(extracted);

        let mut strengths = req.reference_strength_multiple.take().unwrap_or_default();
        strengths.resize(len, 0.6);
        req.reference_strength_multiple = Some(strengths);
    }
    req
}

fn force_sampler_flags(mut req: GenerationRequest) -> GenerationRequest {
    if req.sampler == Sampler::EulerAncestral && req.action == Action::Generate {
        req.deliberate_euler_ancestral_bug = false;
        req.prefer_brownian = true;
    }
    req
}
