use crate::constant::{Action, Resolution};
use crate::normalize::NormalizedRequest;

const PIXEL_COST: f64 = 2.951823174884865e-6;
const PIXEL_STEP_COST: f64 = 5.753298233447344e-7;

/// Estimates the Anlas the service will bill for a normalized request.
///
/// Opus-tier accounts generate one sample free when steps stay at or below 28
/// and the billed resolution at or below the normal-square area.
pub fn estimate_anlas(request: &NormalizedRequest, is_opus: bool) -> u64 {
    let (width, height) = request.dimensions();
    let steps = request.steps;
    let n_samples = request.n_samples as u64;

    // Only img2img bills proportionally to strength.
    let strength = if request.action == Action::Img2Img {
        request.strength.unwrap_or(1.0)
    } else {
        1.0
    };

    let smea_factor = if request.model.is_v4() {
        if request.auto_smea {
            1.2
        } else {
            1.0
        }
    } else if request.sm_dyn == Some(true) {
        1.4
    } else if request.sm == Some(true) {
        1.2
    } else {
        1.0
    };

    let mut resolution = (width as u64 * height as u64).max(65536);

    // Normal square is billed at the normal portrait/landscape rate.
    if resolution > Resolution::NormalPortrait.area()
        && resolution <= Resolution::NormalSquare.area()
    {
        resolution = Resolution::NormalPortrait.area();
    }

    let r = resolution as f64;
    let per_sample = (PIXEL_COST * r + PIXEL_STEP_COST * r * steps as f64).ceil() * smea_factor;
    let per_sample = ((per_sample * strength).ceil() as u64).max(2);

    let opus_discount =
        is_opus && steps <= 28 && resolution <= Resolution::NormalSquare.area();

    per_sample * (n_samples - opus_discount as u64)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::constant::Model;
    use crate::models::GenerationRequest;

    fn normalized(request: GenerationRequest) -> NormalizedRequest {
        let mut rng = StdRng::seed_from_u64(7);
        request.normalize_with(&mut rng).unwrap()
    }

    #[test]
    fn normal_portrait_default_request_costs_twenty() {
        let req = normalized(
            GenerationRequest::new("1girl").with_resolution(Resolution::NormalPortrait),
        );
        assert_eq!(estimate_anlas(&req, false), 20);
    }

    #[test]
    fn opus_single_default_sample_is_free() {
        let req = normalized(
            GenerationRequest::new("1girl").with_resolution(Resolution::NormalPortrait),
        );
        assert_eq!(estimate_anlas(&req, true), 0);
    }

    #[test]
    fn opus_discount_skips_only_one_sample() {
        let req = normalized(
            GenerationRequest::new("1girl")
                .with_resolution(Resolution::NormalPortrait)
                .with_n_samples(3),
        );
        assert_eq!(estimate_anlas(&req, false), 60);
        assert_eq!(estimate_anlas(&req, true), 40);
    }

    #[test]
    fn opus_discount_requires_low_steps() {
        let req = normalized(
            GenerationRequest::new("1girl")
                .with_resolution(Resolution::NormalPortrait)
                .with_steps(29),
        );
        assert_eq!(estimate_anlas(&req, true), 20);
    }

    #[test]
    fn normal_square_bills_like_normal_portrait() {
        let portrait = normalized(
            GenerationRequest::new("x").with_resolution(Resolution::NormalPortrait),
        );
        let square = normalized(
            GenerationRequest::new("x").with_resolution(Resolution::NormalSquare),
        );
        assert_eq!(
            estimate_anlas(&portrait, false),
            estimate_anlas(&square, false)
        );
    }

    #[test]
    fn auto_smea_scales_current_protocol_cost() {
        let mut req = GenerationRequest::new("x").with_resolution(Resolution::NormalPortrait);
        req.auto_smea = true;
        assert_eq!(estimate_anlas(&normalized(req), false), 24);
    }

    #[test]
    fn legacy_smea_flags_scale_v3_cost() {
        let mut sm_dyn = GenerationRequest::new("x")
            .with_model(Model::V3)
            .with_resolution(Resolution::NormalPortrait);
        sm_dyn.sm_dyn = Some(true);
        assert_eq!(estimate_anlas(&normalized(sm_dyn), false), 28);

        let mut sm = GenerationRequest::new("x")
            .with_model(Model::V3)
            .with_resolution(Resolution::NormalPortrait);
        sm.sm = Some(true);
        assert_eq!(estimate_anlas(&normalized(sm), false), 24);

        // autoSmea is a current-protocol knob and must not affect V3 pricing.
        let mut auto = GenerationRequest::new("x")
            .with_model(Model::V3)
            .with_resolution(Resolution::NormalPortrait);
        auto.auto_smea = true;
        assert_eq!(estimate_anlas(&normalized(auto), false), 20);
    }

    #[test]
    fn img2img_bills_proportionally_to_strength() {
        let mut req = GenerationRequest::new("x")
            .with_action(Action::Img2Img)
            .with_resolution(Resolution::NormalPortrait)
            .with_base_image("aGVsbG8=");
        req.strength = Some(0.5);
        assert_eq!(estimate_anlas(&normalized(req), false), 10);
    }

    #[test]
    fn inpaint_does_not_bill_by_strength() {
        let mut req = GenerationRequest::new("x")
            .with_model(Model::V4_5FullInpainting)
            .with_action(Action::Inpaint)
            .with_resolution(Resolution::NormalPortrait);
        req.strength = Some(0.5);
        assert_eq!(estimate_anlas(&normalized(req), false), 20);
    }

    #[test]
    fn per_sample_cost_never_drops_below_two() {
        let req = normalized(
            GenerationRequest::new("x").with_size(64, 64).with_steps(1),
        );
        assert_eq!(estimate_anlas(&req, false), 2);
    }
}
