use relayer_node::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = Settings::load()?;
    relayer_node::run(settings).await?;
    Ok(())
}
