use crate::{AggregateSet, ThresholdVerdict, ITERATIONS};
use std::fmt;
use std::time::Duration;

/// Final report for a run: per-check pass/fail counts, per-metric
/// aggregates, and the threshold verdicts. How this gets serialized for
/// export is a reporting concern, not ours; `Display` is for humans.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub name: String,
    /// Wall-clock length of the run, including the shutdown grace period.
    pub duration: Duration,
    pub iterations: u64,
    pub max_vus: u32,
    /// True when the scenario called `abort()` before the plan elapsed.
    pub aborted: bool,
    pub checks: Vec<CheckSummary>,
    pub metrics: Vec<MetricSummary>,
    pub thresholds: Vec<ThresholdVerdict>,
    /// Overall verdict: every threshold held and the run was not aborted.
    pub passed: bool,
}

#[derive(Debug, Clone)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckSummary {
    pub fn rate(&self) -> f64 {
        self.passes as f64 / (self.passes + self.fails) as f64
    }
}

#[derive(Debug, Clone)]
pub struct MetricSummary {
    pub name: String,
    pub count: u64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl RunSummary {
    pub fn build(
        name: &str,
        aggregates: &AggregateSet,
        thresholds: Vec<ThresholdVerdict>,
        duration: Duration,
        max_vus: u32,
        aborted: bool,
    ) -> Self {
        let checks = aggregates
            .checks()
            .map(|(name, stats)| CheckSummary {
                name: name.to_string(),
                passes: stats.passes,
                fails: stats.fails,
            })
            .collect();

        let metrics = aggregates
            .metrics()
            .map(|(name, m)| MetricSummary {
                name: name.to_string(),
                count: m.count(),
                avg: m.avg(),
                min: m.min(),
                max: m.max(),
                p50: m.percentile(0.5),
                p90: m.percentile(0.9),
                p95: m.percentile(0.95),
                p99: m.percentile(0.99),
            })
            .collect();

        let iterations = aggregates
            .counter(ITERATIONS)
            .map(|c| c.total())
            .unwrap_or(0);

        let passed = !aborted && thresholds.iter().all(|t| t.passed);

        Self {
            name: name.to_string(),
            duration,
            iterations,
            max_vus,
            aborted,
            checks,
            metrics,
            thresholds,
            passed,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} in {:?}, {} iterations, max {} VUs{}",
            self.name,
            if self.passed { "PASSED" } else { "FAILED" },
            self.duration,
            self.iterations,
            self.max_vus,
            if self.aborted { " (aborted)" } else { "" },
        )?;

        for check in &self.checks {
            writeln!(
                f,
                "  check '{}': {}/{} ({:.1}%)",
                check.name,
                check.passes,
                check.passes + check.fails,
                check.rate() * 100.,
            )?;
        }

        for metric in &self.metrics {
            writeln!(
                f,
                "  {}: count={} avg={:.2} min={:.2} max={:.2} p50={:.2} p90={:.2} p95={:.2} p99={:.2}",
                metric.name,
                metric.count,
                metric.avg,
                metric.min,
                metric.max,
                metric.p50,
                metric.p90,
                metric.p95,
                metric.p99,
            )?;
        }

        for verdict in &self.thresholds {
            write!(
                f,
                "  threshold {} '{}': {}",
                verdict.metric,
                verdict.expression,
                if verdict.passed { "ok" } else { "FAILED" },
            )?;
            match (&verdict.observed, &verdict.reason) {
                (Some(observed), _) => writeln!(f, " (observed {observed:.2})")?,
                (None, Some(reason)) => writeln!(f, " ({reason})")?,
                (None, None) => writeln!(f)?,
            }
        }

        Ok(())
    }
}
