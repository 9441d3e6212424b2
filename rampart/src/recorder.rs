use metrics_util::AtomicBucket;
use rampart_core::{AggregateSet, MetricEvent, Tags};
use std::time::Instant;

/// Shared sink for everything the virtual users observe.
///
/// Writes push onto a lock-free bucket and return immediately; one VU
/// recording a check never blocks another mid-request. The scheduler owns
/// the read side and folds events into an [`AggregateSet`] on its control
/// tick, so aggregation cost never lands on the write path.
pub(crate) struct Recorder {
    events: AtomicBucket<MetricEvent>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            events: AtomicBucket::new(),
        }
    }

    pub fn check(&self, name: &str, passed: bool) {
        #[cfg(feature = "metrics")]
        {
            let label = if passed { "pass" } else { "fail" };
            metrics::counter!(format!("checks_{label}")).increment(1);
        }

        self.events.push(MetricEvent::Check {
            name: name.to_string(),
            passed,
            at: Instant::now(),
        });
    }

    pub fn sample(&self, metric: &str, value: f64, tags: Tags) {
        #[cfg(feature = "metrics")]
        metrics::histogram!(metric.to_string()).record(value);

        self.events.push(MetricEvent::Sample {
            metric: metric.to_string(),
            value,
            tags,
            at: Instant::now(),
        });
    }

    pub fn increment(&self, name: &str, by: u64) {
        #[cfg(feature = "metrics")]
        metrics::counter!(name.to_string()).increment(by);

        self.events.push(MetricEvent::Counter {
            name: name.to_string(),
            by,
            at: Instant::now(),
        });
    }

    /// Drains every pending event into `aggregates`. Writers racing with a
    /// drain land in the next one.
    pub fn drain_into(&self, aggregates: &mut AggregateSet) {
        self.events.clear_with(|events| {
            for event in events {
                aggregates.apply(event);
            }
        });
    }
}
