use naigen::{ClientConfig, NaiClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    naigen::logger::init()?;
    match dotenv::dotenv() {
        Ok(_) => log::info!("✅ .env file loaded"),
        Err(_) => log::warn!("⚠️  No .env file found"),
    }

    let client = NaiClient::new(ClientConfig::from_env())?;

    let source = std::fs::read("input.png")?;
    let result = client.line_art(&source).await?;
    let path = result.save("output")?;
    log::info!("line art written to {}", path.display());

    Ok(())
}
