#[tokio::main]
async fn main() -> std::io::Result<()> {
    auth_server::run_with_config().await
}
