use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    invite_relay::cli::app::run().await
}
