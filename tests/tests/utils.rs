use rampart::http::{HttpClient, HttpError, Response, Timings};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("rampart=debug,mock_service=debug")
            .init();
    });
}

/// Installs the subscriber and boots the mock service on :3002.
#[allow(unused)]
pub async fn init_with_service() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    let wait = ONCE_LOCK.get().is_none();

    ONCE_LOCK.get_or_init(|| {
        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("rampart=debug,mock_service=debug")
            .init();

        tokio::spawn(async {
            let addr: SocketAddr = "0.0.0.0:3002".parse().unwrap();
            mock_service::run(addr).await;
        });
    });

    if wait {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// In-process client with a fixed latency; the reported timing matches
/// the simulated wait, so duration thresholds are deterministic.
#[allow(unused)]
pub struct FixedLatencyClient {
    pub latency: Duration,
    pub status: u16,
}

impl HttpClient for FixedLatencyClient {
    async fn get(&self, _url: &str) -> Result<Response, HttpError> {
        tokio::time::sleep(self.latency).await;
        Ok(Response {
            status: self.status,
            body: Vec::new(),
            timings: Timings {
                duration: self.latency,
            },
        })
    }
}
