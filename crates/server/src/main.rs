#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatlog_server::run().await
}
