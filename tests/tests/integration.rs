mod utils;
#[allow(unused)]
use utils::*;

// Network tests against the in-process mock service; run with
// `cargo test -p rampart-tests --features integration`.
#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use rampart::http::{self, HttpClient, HttpError, Response, Timings};
    use rampart::prelude::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    struct ReqwestClient(reqwest::Client);

    impl HttpClient for ReqwestClient {
        async fn get(&self, url: &str) -> Result<Response, HttpError> {
            let start = Instant::now();
            let res = self.0.get(url).send().await.map_err(HttpError::transport)?;
            let status = res.status().as_u16();
            let body = res.bytes().await.map_err(HttpError::transport)?.to_vec();
            Ok(Response {
                status,
                body,
                timings: Timings {
                    duration: start.elapsed(),
                },
            })
        }
    }

    #[tokio::test]
    async fn delayed_route_meets_latency_threshold() {
        init_with_service().await;

        let client = Arc::new(ReqwestClient(reqwest::Client::new()));
        let summary = scenario("delayed", move || {
            let client = client.clone();
            async move {
                let res = http::get(client.as_ref(), "http://0.0.0.0:3002/delay/ms/10").await;
                check("status is 200", res.map(|r| r.status == 200).unwrap_or(false));
            }
        })
        .vus(2)
        .duration(Duration::from_secs(3))
        .threshold("http_req_duration", "p(95)<500")
        .threshold("http_req_failed", "rate<0.1")
        .grace_period(Duration::from_secs(2))
        .await
        .unwrap();

        assert!(summary.passed, "summary:\n{summary}");
        assert!(summary.iterations > 10);
    }

    #[tokio::test]
    async fn error_statuses_count_as_failed_requests() {
        init_with_service().await;

        let client = Arc::new(ReqwestClient(reqwest::Client::new()));
        let summary = scenario("not-found", move || {
            let client = client.clone();
            async move {
                let res = http::get(client.as_ref(), "http://0.0.0.0:3002/status/404").await;
                check("status is 200", res.map(|r| r.status == 200).unwrap_or(false));
                sleep(Duration::from_millis(50)).await;
            }
        })
        .vus(2)
        .duration(Duration::from_secs(2))
        .threshold("http_req_failed", "rate<0.1")
        .grace_period(Duration::from_secs(2))
        .await
        .unwrap();

        // Every request 404s: the failure-rate threshold must fail.
        assert!(!summary.passed);
        let failed = summary
            .metrics
            .iter()
            .find(|m| m.name == "http_req_failed")
            .unwrap();
        assert!((failed.avg - 1.0).abs() < 1e-9);
    }
}
