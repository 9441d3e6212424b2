mod utils;
#[allow(unused)]
use utils::*;

use rampart::http;
use rampart::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// All of these run on virtual time (`start_paused`), so a "60s" run
// finishes in milliseconds of wall clock.

#[tokio::test(start_paused = true)]
async fn constant_vus_hold_concurrency_for_the_run() {
    init();

    let client = Arc::new(FixedLatencyClient {
        latency: Duration::ZERO,
        status: 200,
    });
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let summary = {
        let (current, peak) = (current.clone(), peak.clone());
        scenario("constant", move || {
            let client = client.clone();
            let current = current.clone();
            let peak = peak.clone();
            async move {
                let active = current.fetch_add(1, Ordering::Relaxed) + 1;
                peak.fetch_max(active, Ordering::Relaxed);

                let res = http::get(client.as_ref(), "http://test.local/").await;
                check("status is 200", res.map(|r| r.status == 200).unwrap_or(false));
                sleep(Duration::from_secs(1)).await;

                current.fetch_sub(1, Ordering::Relaxed);
            }
        })
        .vus(5)
        .duration(Duration::from_secs(60))
        .grace_period(Duration::from_secs(5))
        .await
        .unwrap()
    };

    // ~5 VUs x ~60 one-second iterations.
    assert_eq!(peak.load(Ordering::Relaxed), 5);
    assert_eq!(summary.max_vus, 5);
    assert!(
        (250..=310).contains(&summary.iterations),
        "iterations = {}",
        summary.iterations
    );
    assert!(summary.passed);
}

#[tokio::test(start_paused = true)]
async fn staged_ramp_peaks_and_passes_thresholds() {
    init();

    let client = Arc::new(FixedLatencyClient {
        latency: Duration::from_millis(100),
        status: 200,
    });

    let summary = scenario("staged", move || {
        let client = client.clone();
        async move {
            let res = http::get(client.as_ref(), "http://test.local/").await;
            check("status is 200", res.map(|r| r.status == 200).unwrap_or(false));
            sleep(Duration::from_millis(400)).await;
        }
    })
    .stages([
        Stage::new(Duration::from_secs(30), 5),
        Stage::new(Duration::from_secs(60), 10),
        Stage::new(Duration::from_secs(30), 0),
    ])
    .threshold("http_req_duration", "p(95)<500")
    .threshold("http_req_failed", "rate<0.1")
    .grace_period(Duration::from_secs(5))
    .await
    .unwrap();

    assert!(summary.passed, "summary:\n{summary}");
    assert_eq!(summary.max_vus, 10);

    // Every check passed, so the pass count tracks iterations exactly and
    // the built-in pass rate is 1.0.
    let status_check = summary
        .checks
        .iter()
        .find(|c| c.name == "status is 200")
        .unwrap();
    assert_eq!(status_check.fails, 0);
    assert_eq!(status_check.passes, summary.iterations);
    let checks = summary.metrics.iter().find(|m| m.name == "checks").unwrap();
    assert!((checks.avg - 1.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn slow_tail_fails_latency_threshold() {
    init();

    let client = Arc::new(FixedLatencyClient {
        latency: Duration::from_millis(600),
        status: 200,
    });

    let summary = scenario("slow", move || {
        let client = client.clone();
        async move {
            let _ = http::get(client.as_ref(), "http://test.local/").await;
        }
    })
    .vus(3)
    .duration(Duration::from_secs(10))
    .threshold("http_req_duration", "p(95)<500")
    .grace_period(Duration::from_secs(5))
    .await
    .unwrap();

    assert!(!summary.passed);
    let verdict = &summary.thresholds[0];
    assert!(!verdict.passed);
    assert!(verdict.observed.unwrap() >= 500.);
}

#[tokio::test(start_paused = true)]
async fn threshold_on_unrecorded_metric_fails() {
    init();

    let summary = scenario("no-data", || async {
        sleep(Duration::from_millis(100)).await;
    })
    .vus(1)
    .duration(Duration::from_secs(2))
    .threshold("http_req_duration", "p(95)<500")
    .await
    .unwrap();

    assert!(!summary.passed);
    let verdict = &summary.thresholds[0];
    assert!(!verdict.passed);
    assert!(verdict.reason.as_deref().unwrap().contains("no samples"));
}

#[tokio::test(start_paused = true)]
async fn panicking_scenario_still_produces_a_summary() {
    init();

    let summary = scenario("explosive", || async {
        sleep(Duration::from_millis(100)).await;
        panic!("this iteration always fails");
    })
    .vus(2)
    .duration(Duration::from_secs(5))
    .grace_period(Duration::from_secs(1))
    .await
    .unwrap();

    assert!(summary.iterations > 0);
    let failed = summary
        .checks
        .iter()
        .find(|c| c.name == "iteration")
        .unwrap();
    assert_eq!(failed.passes, 0);
    assert_eq!(failed.fails, summary.iterations);
}

#[tokio::test(start_paused = true)]
async fn declarative_config_drives_the_run() {
    init();

    let config: RunConfig = serde_json::from_value(serde_json::json!({
        "vus": 2,
        "duration": "3s",
        "thresholds": { "checks": ["rate>0.9"] },
    }))
    .unwrap();

    let summary = scenario("declarative", || async {
        check("alive", true);
        sleep(Duration::from_millis(500)).await;
    })
    .with_config(config)
    .await
    .unwrap();

    assert_eq!(summary.name, "declarative");
    assert_eq!(summary.max_vus, 2);
    assert!(summary.passed);
}
