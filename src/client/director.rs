use chrono::Local;

use super::{transport_err, NaiClient};
use crate::archive::extract_first;
use crate::constant::Endpoint;
use crate::error::Result;
use crate::models::director::{DirectorRequest, DirectorTool, Emotion, EmotionLevel};
use crate::models::image::Image;

impl NaiClient {
    /// Runs one director tool over one image via `/ai/augment-image`.
    ///
    /// The response is a single-entry ZIP wrapping the edited image.
    pub async fn use_director_tool(&self, request: &DirectorRequest) -> Result<Image> {
        let payload = request.to_payload();
        log::debug!("director payload for {}", request.tool.req_type());

        let response = self
            .post(Endpoint::Director)
            .await?
            .json(&payload)
            .send()
            .await
            .map_err(transport_err)?;
        let content = self.check_response(response).await?;
        let data = extract_first(&content)?;

        Ok(Image::new(
            format!(
                "{}_{}.png",
                Local::now().format("%Y%m%d_%H%M%S"),
                request.tool.req_type()
            ),
            data,
        ))
    }

    pub async fn line_art(&self, image: &[u8]) -> Result<Image> {
        self.run_tool(DirectorTool::LineArt, image).await
    }

    pub async fn sketch(&self, image: &[u8]) -> Result<Image> {
        self.run_tool(DirectorTool::Sketch, image).await
    }

    pub async fn background_removal(&self, image: &[u8]) -> Result<Image> {
        self.run_tool(DirectorTool::BackgroundRemoval, image).await
    }

    pub async fn declutter(&self, image: &[u8]) -> Result<Image> {
        self.run_tool(DirectorTool::Declutter, image).await
    }

    pub async fn colorize(&self, image: &[u8], prompt: &str, defry: i64) -> Result<Image> {
        self.run_tool(
            DirectorTool::Colorize {
                prompt: prompt.to_string(),
                defry,
            },
            image,
        )
        .await
    }

    pub async fn change_emotion(
        &self,
        image: &[u8],
        emotion: Emotion,
        prompt: &str,
        level: EmotionLevel,
    ) -> Result<Image> {
        self.run_tool(
            DirectorTool::Emotion {
                emotion,
                prompt: prompt.to_string(),
                level,
            },
            image,
        )
        .await
    }

    async fn run_tool(&self, tool: DirectorTool, image: &[u8]) -> Result<Image> {
        let request = DirectorRequest::from_image_bytes(tool, image)?;
        self.use_director_tool(&request).await
    }
}
