use crate::CHECKS;
use pdatastructs::tdigest::{TDigest, K1};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

pub type Tags = Vec<(String, String)>;

/// One recorded observation. Events are append-only: runners push them into
/// the recorder's bucket and the scheduler folds them into an
/// [`AggregateSet`] on its own tick, never on the write path.
#[derive(Debug, Clone)]
pub enum MetricEvent {
    Check {
        name: String,
        passed: bool,
        at: Instant,
    },
    Sample {
        metric: String,
        value: f64,
        tags: Tags,
        at: Instant,
    },
    Counter {
        name: String,
        by: u64,
        at: Instant,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckStats {
    pub passes: u64,
    pub fails: u64,
}

impl CheckStats {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    pub fn rate(&self) -> f64 {
        self.passes as f64 / self.total() as f64
    }
}

/// Streaming aggregate for one sample metric. Percentiles come from a
/// t-digest, so they are approximate; everything else is exact.
#[derive(Debug, Clone)]
pub struct MetricAggregate {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    digest: TDigest<K1>,
}

impl MetricAggregate {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0.,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            digest: default_tdigest(),
        }
    }

    fn observe(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.digest.insert(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn avg(&self) -> f64 {
        self.sum / self.count as f64
    }

    /// Mean of the recorded values; the rate reading for 0/1 metrics.
    pub fn rate(&self) -> f64 {
        self.avg()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn percentile(&self, quantile: f64) -> f64 {
        let value = self.digest.quantile(quantile);

        // TDigest can return NaN on degenerate input.
        if value.is_finite() {
            value
        } else {
            error!("NaN percentile from t-digest; reporting 0");
            0.
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CounterStats {
    total: u64,
    first: Option<Instant>,
    last: Option<Instant>,
}

impl CounterStats {
    fn add(&mut self, by: u64, at: Instant) {
        self.total += by;
        if self.first.is_none() {
            self.first = Some(at);
        }
        self.last = Some(at);
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Increments per second over the observed window. Events are stamped
    /// at recording time, so this reflects wall-clock throughput.
    pub fn rate_per_s(&self) -> f64 {
        match (self.first, self.last) {
            (Some(first), Some(last)) => {
                let window = last.saturating_duration_since(first).max(Duration::from_millis(1));
                self.total as f64 / window.as_secs_f64()
            }
            _ => 0.,
        }
    }
}

/// Read-side view of everything recorded so far. Built by draining the
/// recorder; evaluation (thresholds, summary) is read-only against it.
#[derive(Debug, Default)]
pub struct AggregateSet {
    checks: BTreeMap<String, CheckStats>,
    metrics: BTreeMap<String, MetricAggregate>,
    counters: BTreeMap<String, CounterStats>,
}

impl AggregateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &MetricEvent) {
        match event {
            MetricEvent::Check { name, passed, .. } => {
                let stats = self.checks.entry(name.clone()).or_default();
                if *passed {
                    stats.passes += 1;
                } else {
                    stats.fails += 1;
                }

                // Every check also feeds the built-in pass-rate metric.
                self.metrics
                    .entry(CHECKS.to_string())
                    .or_insert_with(MetricAggregate::new)
                    .observe(if *passed { 1. } else { 0. });
            }
            MetricEvent::Sample { metric, value, .. } => {
                self.metrics
                    .entry(metric.clone())
                    .or_insert_with(MetricAggregate::new)
                    .observe(*value);
            }
            MetricEvent::Counter { name, by, at } => {
                self.counters.entry(name.clone()).or_default().add(*by, *at);
            }
        }
    }

    pub fn check(&self, name: &str) -> Option<&CheckStats> {
        self.checks.get(name)
    }

    pub fn metric(&self, name: &str) -> Option<&MetricAggregate> {
        self.metrics.get(name)
    }

    pub fn counter(&self, name: &str) -> Option<&CounterStats> {
        self.counters.get(name)
    }

    pub fn checks(&self) -> impl Iterator<Item = (&str, &CheckStats)> {
        self.checks.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn metrics(&self) -> impl Iterator<Item = (&str, &MetricAggregate)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn counters(&self) -> impl Iterator<Item = (&str, &CounterStats)> {
        self.counters.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}
