#[tokio::main]
async fn main() -> anyhow::Result<()> {
    frame_relay::run().await?;
    Ok(())
}
