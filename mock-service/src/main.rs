use std::net::SocketAddr;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("mock_service=debug")
        .init();

    let addr: SocketAddr = "0.0.0.0:3002".parse().unwrap();
    mock_service::run(addr).await;
}
