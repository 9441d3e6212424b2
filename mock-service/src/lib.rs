//! Tiny httpbin-style target for integration tests: fixed delays and
//! canned status codes, nothing else.

use axum::{debug_handler, extract::Path, http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

pub fn router() -> Router {
    Router::new()
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/status/:code", get(status))
        .route("/delay/ms/:delay_ms/status/:code", get(delay_status))
}

pub async fn run(addr: SocketAddr) {
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, router()).await.unwrap();
}

#[debug_handler]
async fn delay(Path(delay_ms): Path<u64>) {
    debug!("delay {delay_ms}ms");
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

#[debug_handler]
async fn status(Path(code): Path<u16>) -> StatusCode {
    debug!("status {code}");
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[debug_handler]
async fn delay_status(Path((delay_ms, code)): Path<(u64, u16)>) -> StatusCode {
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
