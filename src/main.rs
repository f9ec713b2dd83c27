#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ingest_monitor_lib::run().await
}
