use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;
use sha2::{Digest, Sha256};

use super::{transport_err, NaiClient};
use crate::constant::{Endpoint, Model};
use crate::error::{Error, Result};
use crate::normalize::NormalizedRequest;

impl NaiClient {
    /// Swaps reference images for encoded vibe tokens where the model wants
    /// them pre-encoded (the V4-curated tier). Other models pass reference
    /// images through untouched.
    ///
    /// Tokens are cached in memory per (image, extraction, model), so
    /// repeated generations with the same references cost one encode call.
    pub(crate) async fn encode_vibe(
        &self,
        normalized: NormalizedRequest,
    ) -> Result<NormalizedRequest> {
        if normalized.model != Model::V4Curated {
            return Ok(normalized);
        }
        let references = match &normalized.reference_image_multiple {
            Some(refs) if !refs.is_empty() => refs.clone(),
            _ => return Ok(normalized),
        };

        let mut tokens = Vec::with_capacity(references.len());
        for (i, reference) in references.iter().enumerate() {
            let extracted = normalized
                .reference_information_extracted_multiple
                .as_ref()
                .and_then(|list| list.get(i).copied())
                .unwrap_or(1.0);

            let key = format!(
                "{}:{}:{}",
                image_hash(reference)?,
                extracted,
                normalized.model
            );

            if let Some(token) = self.vibe_cache_get(&key) {
                log::debug!("using cached vibe token");
                tokens.push(token);
                continue;
            }

            log::debug!("encoding new vibe token");
            let payload = json!({
                "image": reference,
                "information_extracted": extracted,
                "model": normalized.model.as_str(),
            });
            let response = self
                .post(Endpoint::EncodeVibe)
                .await?
                .json(&payload)
                .send()
                .await
                .map_err(transport_err)?;
            let content = self.check_response(response).await?;

            let token = BASE64.encode(content);
            self.vibe_cache_put(key, token.clone());
            tokens.push(token);
        }

        Ok(normalized.with_vibe_tokens(tokens))
    }
}

fn image_hash(reference_b64: &str) -> Result<String> {
    let bytes = BASE64
        .decode(reference_b64)
        .map_err(|e| Error::ImageProcessing(format!("invalid base64 reference image: {}", e)))?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex_of_decoded_bytes() {
        let b64 = BASE64.encode(b"hello");
        let hash = image_hash(&b64).unwrap();
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn invalid_base64_is_an_image_processing_error() {
        assert!(matches!(
            image_hash("not base64!!"),
            Err(Error::ImageProcessing(_))
        ));
    }
}
