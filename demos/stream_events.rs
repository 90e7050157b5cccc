use futures::StreamExt;
use naigen::{ClientConfig, GenerationRequest, NaiClient, StreamEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    naigen::logger::init()?;
    match dotenv::dotenv() {
        Ok(_) => log::info!("✅ .env file loaded"),
        Err(_) => log::warn!("⚠️  No .env file found"),
    }

    let client = NaiClient::new(ClientConfig::from_env())?;
    let request = GenerationRequest::new("scenery, sunset over the ocean, dramatic clouds");

    let mut events = client.generate_image_stream(request).await?;
    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::Intermediate {
                samp_ix,
                step_ix,
                sigma,
                ..
            } => {
                log::info!("sample {} step {} (sigma {:.2})", samp_ix, step_ix, sigma);
            }
            StreamEvent::Final { samp_ix, image, .. } => {
                let path = image.save("output")?;
                log::info!("sample {} finished: {}", samp_ix, path.display());
            }
        }
    }

    Ok(())
}
