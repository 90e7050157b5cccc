use std::pin::Pin;

use futures::stream::Stream;
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use super::{transport_err, NaiClient};
use crate::archive::extract_images;
use crate::constant::{Action, Endpoint};
use crate::cost::estimate_anlas;
use crate::error::{Error, Result};
use crate::models::image::{Image, StreamEvent};
use crate::models::request::GenerationRequest;
use crate::stream::{final_images, StreamEventParser};

impl NaiClient {
    /// Generates images and waits for the complete response.
    ///
    /// Legacy models answer with a ZIP archive on `/ai/generate-image`;
    /// current-protocol models answer with an event stream on
    /// `/ai/generate-image-stream`, of which only the final frames are kept.
    pub async fn generate_image(&self, request: GenerationRequest) -> Result<Vec<Image>> {
        let normalized = request.normalize()?;
        log::info!(
            "generating image, estimated Anlas cost: {}",
            estimate_anlas(&normalized, self.config.opus)
        );

        let normalized = self.encode_vibe(normalized).await?;
        let payload = normalized.to_payload()?;
        log::debug!("generation payload: {}", payload);

        if normalized.model.is_v4() {
            let response = self
                .post(Endpoint::ImageStream)
                .await?
                .json(&payload)
                .send()
                .await
                .map_err(transport_err)?;
            let content = self.check_response(response).await?;
            final_images(&content)
        } else {
            let response = self
                .post(Endpoint::Image)
                .await?
                .json(&payload)
                .send()
                .await
                .map_err(transport_err)?;
            let content = self.check_response(response).await?;
            extract_images(&content)
        }
    }

    /// Generates images and yields stream events as the server produces them.
    ///
    /// Only current-protocol plain generation streams; other combinations are
    /// rejected before any network activity. Dropping the returned stream
    /// abandons the transfer.
    pub async fn generate_image_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>> {
        let normalized = request.normalize()?;
        if !normalized.model.is_v4() || normalized.action != Action::Generate {
            return Err(Error::Validation(format!(
                "streaming requires a current-protocol model and plain generation, got {} / {}",
                normalized.model, normalized.action
            )));
        }

        log::info!(
            "streaming generation, estimated Anlas cost: {}",
            estimate_anlas(&normalized, self.config.opus)
        );

        let normalized = self.encode_vibe(normalized).await?;
        let payload = normalized.to_payload()?;
        log::debug!("generation payload: {}", payload);

        let response = self
            .post(Endpoint::ImageStream)
            .await?
            .json(&payload)
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status();
        if !status.is_success() {
            // Reuse the status mapping; the body is already complete on errors.
            return match self.check_response(response).await {
                Err(e) => Err(e),
                Ok(_) => Err(Error::Api {
                    status: status.as_u16(),
                    message: "error status with unreadable body".to_string(),
                }),
            };
        }

        let (tx, rx) = tokio::sync::mpsc::channel(32);
        let mut body = response.bytes_stream();

        tokio::spawn(async move {
            let mut parser = StreamEventParser::new();
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        for event in parser.feed_chunk(&bytes) {
                            if tx.send(Ok(event)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(transport_err(e))).await;
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
