//! Flat profile: 5 virtual users for 60 seconds, one request and a 1s
//! sleep per iteration.

use rampart::http::{self, HttpClient, HttpError, Response, Timings};
use rampart::prelude::*;
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;

/// Stand-in client; swap in a real HTTP stack via the same trait.
struct StubClient;

impl HttpClient for StubClient {
    async fn get(&self, _url: &str) -> Result<Response, HttpError> {
        tokio::time::sleep(Duration::from_millis(40)).await;
        Ok(Response {
            status: 200,
            body: Vec::new(),
            timings: Timings {
                duration: Duration::from_millis(40),
            },
        })
    }
}

#[tokio::main]
async fn main() {
    FmtSubscriber::builder().with_env_filter("rampart=debug").init();

    let summary = scenario("constant-vus", || async {
        let res = http::get(&StubClient, "https://service.example.com").await;
        match res {
            Ok(res) => {
                check("status is 200", res.status == 200);
            }
            Err(_) => {
                check("status is 200", false);
            }
        }
        sleep(Duration::from_secs(1)).await;
    })
    .vus(5)
    .duration(Duration::from_secs(60))
    .await
    .unwrap();

    println!("{summary}");
}
