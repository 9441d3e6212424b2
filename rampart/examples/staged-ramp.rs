//! Staged ramp with thresholds: 30s up to 5 VUs, 1m up to 10, 30s down
//! to 0. Each iteration hits a random URL, sleeps a random 0.5-2.5s, and
//! feeds a custom `errors` rate metric.

use rand::Rng;
use rampart::http::{self, HttpClient, HttpError, Response, Timings};
use rampart::prelude::*;
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;

struct StubClient;

impl HttpClient for StubClient {
    async fn get(&self, url: &str) -> Result<Response, HttpError> {
        let (status, delay_ms) = match url {
            u if u.ends_with("/delay/1") => (200, 1_000),
            u if u.ends_with("/status/404") => (404, 20),
            _ => (200, 30),
        };
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(Response {
            status,
            body: Vec::new(),
            timings: Timings {
                duration: Duration::from_millis(delay_ms),
            },
        })
    }
}

const URLS: &[&str] = &[
    "https://service.example.com",
    "https://httpbin.org/delay/1",
    "https://httpbin.org/status/200",
    "https://httpbin.org/status/404",
];

#[tokio::main]
async fn main() {
    FmtSubscriber::builder().with_env_filter("rampart=debug").init();

    let summary = scenario("staged-ramp", || async {
        let url = URLS[rand::thread_rng().gen_range(0..URLS.len())];

        let res = http::get(&StubClient, url).await;

        let pause = rand::thread_rng().gen_range(0.5..2.5);
        sleep(Duration::from_secs_f64(pause)).await;

        match res {
            Ok(res) => {
                check("status is 200", res.status == 200);
                check(
                    "response time < 500ms",
                    res.timings.duration < Duration::from_millis(500),
                );
                record("errors", if res.status != 200 { 1. } else { 0. });
            }
            Err(_) => {
                check("status is 200", false);
                record("errors", 1.);
            }
        }
    })
    .stages([
        Stage::new(Duration::from_secs(30), 5),
        Stage::new(Duration::from_secs(60), 10),
        Stage::new(Duration::from_secs(30), 0),
    ])
    .threshold("http_req_duration", "p(95)<500")
    .threshold("http_req_failed", "rate<0.1")
    .await
    .unwrap();

    println!("{summary}");
}
