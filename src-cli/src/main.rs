#[tokio::main]
async fn main() -> anyhow::Result<()> {
    oplog_cli::run().await
}
