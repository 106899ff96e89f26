#[tokio::main]
async fn main() -> anyhow::Result<()> {
    demo_servers::serve("Static server", demo_servers::static_site::router()).await
}
