#[tokio::main]
async fn main() -> anyhow::Result<()> {
    promptdeck::run().await
}
