use naigen::{ClientConfig, GenerationRequest, Model, NaiClient, Resolution};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    naigen::logger::init()?;
    match dotenv::dotenv() {
        Ok(_) => log::info!("✅ .env file loaded"),
        Err(_) => log::warn!("⚠️  No .env file found"),
    }

    let config = ClientConfig::from_env();
    let client = NaiClient::new(config)?;

    let request = GenerationRequest::new("1girl, silver hair, moonlight, rooftop")
        .with_model(Model::V4_5Full)
        .with_resolution(Resolution::NormalPortrait)
        .with_negative_prompt("blurry, extra fingers")
        .with_seed(1234567890);

    let images = client.generate_image(request).await?;
    for image in &images {
        let path = image.save("output")?;
        log::info!("saved {}", path.display());
    }

    Ok(())
}
