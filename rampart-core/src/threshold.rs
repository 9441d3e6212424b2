use crate::AggregateSet;
use std::fmt;
use thiserror::Error;

/// A pass/fail predicate over one metric's aggregates, e.g. `p(95)<500`
/// on `http_req_duration` or `rate<0.1` on `http_req_failed`.
///
/// Expressions are compiled at configuration load; evaluation is read-only
/// against an [`AggregateSet`]. A threshold whose metric received no data
/// fails rather than passing vacuously.
#[derive(Debug, Clone)]
pub struct Threshold {
    pub metric: String,
    pub expression: String,
    aggregator: Aggregator,
    op: Op,
    bound: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Aggregator {
    Count,
    Rate,
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn holds(self, observed: f64, bound: f64) -> bool {
        match self {
            Op::Lt => observed < bound,
            Op::Le => observed <= bound,
            Op::Gt => observed > bound,
            Op::Ge => observed >= bound,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum ThresholdParseError {
    #[error("`{0}`: expected `<aggregator> <op> <bound>` with one of < <= > >=")]
    MissingOperator(String),
    #[error("unknown aggregator `{0}`")]
    UnknownAggregator(String),
    #[error("percentile must be between 0 and 100, got `{0}`")]
    InvalidQuantile(String),
    #[error("cannot parse bound `{0}` as a number, percentage, or duration")]
    InvalidBound(String),
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ThresholdParseError> {
        let (lhs, op, rhs) = split_on_op(expression)
            .ok_or_else(|| ThresholdParseError::MissingOperator(expression.to_string()))?;

        let aggregator = parse_aggregator(lhs.trim())?;
        let bound = parse_bound(rhs.trim())?;

        Ok(Self {
            metric: metric.to_string(),
            expression: expression.to_string(),
            aggregator,
            op,
            bound,
        })
    }

    pub fn evaluate(&self, aggregates: &AggregateSet) -> ThresholdVerdict {
        let observed = self.observe(aggregates);

        match observed {
            Ok(observed) => ThresholdVerdict {
                metric: self.metric.clone(),
                expression: self.expression.clone(),
                passed: self.op.holds(observed, self.bound),
                observed: Some(observed),
                reason: None,
            },
            Err(reason) => ThresholdVerdict {
                metric: self.metric.clone(),
                expression: self.expression.clone(),
                passed: false,
                observed: None,
                reason: Some(reason),
            },
        }
    }

    fn observe(&self, aggregates: &AggregateSet) -> Result<f64, String> {
        if let Some(metric) = aggregates.metric(&self.metric) {
            let value = match self.aggregator {
                Aggregator::Count => metric.count() as f64,
                Aggregator::Rate => metric.rate(),
                Aggregator::Avg => metric.avg(),
                Aggregator::Min => metric.min(),
                Aggregator::Max => metric.max(),
                Aggregator::Med => metric.percentile(0.5),
                Aggregator::Percentile(q) => metric.percentile(q),
            };
            return Ok(value);
        }

        if let Some(check) = aggregates.check(&self.metric) {
            return match self.aggregator {
                Aggregator::Count => Ok(check.total() as f64),
                Aggregator::Rate => Ok(check.rate()),
                _ => Err(format!(
                    "check `{}` only supports `count` and `rate`",
                    self.metric
                )),
            };
        }

        if let Some(counter) = aggregates.counter(&self.metric) {
            return match self.aggregator {
                Aggregator::Count => Ok(counter.total() as f64),
                Aggregator::Rate => Ok(counter.rate_per_s()),
                _ => Err(format!(
                    "counter `{}` only supports `count` and `rate`",
                    self.metric
                )),
            };
        }

        Err(format!("no samples recorded for `{}`", self.metric))
    }
}

/// Outcome of evaluating one threshold. `reason` is set when the threshold
/// failed without an observation (missing metric, wrong aggregator).
#[derive(Debug, Clone)]
pub struct ThresholdVerdict {
    pub metric: String,
    pub expression: String,
    pub passed: bool,
    pub observed: Option<f64>,
    pub reason: Option<String>,
}

fn split_on_op(expression: &str) -> Option<(&str, Op, &str)> {
    // Two-character operators have to win over their one-character prefixes.
    for (symbol, op) in [("<=", Op::Le), (">=", Op::Ge), ("<", Op::Lt), (">", Op::Gt)] {
        if let Some(idx) = expression.find(symbol) {
            let (lhs, rest) = expression.split_at(idx);
            return Some((lhs, op, &rest[symbol.len()..]));
        }
    }
    None
}

fn parse_aggregator(lhs: &str) -> Result<Aggregator, ThresholdParseError> {
    match lhs {
        "count" => Ok(Aggregator::Count),
        "rate" => Ok(Aggregator::Rate),
        "avg" => Ok(Aggregator::Avg),
        "min" => Ok(Aggregator::Min),
        "max" => Ok(Aggregator::Max),
        "med" => Ok(Aggregator::Med),
        _ => {
            if let Some(inner) = lhs.strip_prefix("p(").and_then(|s| s.strip_suffix(')')) {
                let n: f64 = inner
                    .trim()
                    .parse()
                    .map_err(|_| ThresholdParseError::InvalidQuantile(inner.to_string()))?;
                if n <= 0. || n >= 100. {
                    return Err(ThresholdParseError::InvalidQuantile(inner.to_string()));
                }
                Ok(Aggregator::Percentile(n / 100.))
            } else {
                Err(ThresholdParseError::UnknownAggregator(lhs.to_string()))
            }
        }
    }
}

/// Bare numbers compare in the metric's native unit (milliseconds for the
/// built-in duration metrics). `%` divides by 100; duration suffixes
/// normalize to milliseconds, so `p(95)<500` and `p(95)<500ms` agree.
fn parse_bound(rhs: &str) -> Result<f64, ThresholdParseError> {
    if let Some(percent) = rhs.strip_suffix('%') {
        let n: f64 = percent
            .trim()
            .parse()
            .map_err(|_| ThresholdParseError::InvalidBound(rhs.to_string()))?;
        return Ok(n / 100.);
    }

    if let Ok(n) = rhs.parse::<f64>() {
        return Ok(n);
    }

    humantime::parse_duration(rhs)
        .map(|d| d.as_secs_f64() * 1_000.)
        .map_err(|_| ThresholdParseError::InvalidBound(rhs.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MetricEvent;
    use std::time::Instant;

    fn aggregates_with_samples(metric: &str, values: &[f64]) -> AggregateSet {
        let mut agg = AggregateSet::new();
        for &value in values {
            agg.apply(&MetricEvent::Sample {
                metric: metric.to_string(),
                value,
                tags: Vec::new(),
                at: Instant::now(),
            });
        }
        agg
    }

    #[test]
    fn parses_percentile_expression() {
        let t = Threshold::parse("http_req_duration", "p(95)<500").unwrap();
        assert_eq!(t.aggregator, Aggregator::Percentile(0.95));
        assert_eq!(t.op, Op::Lt);
        assert_eq!(t.bound, 500.);
    }

    #[test]
    fn parses_rate_and_percent() {
        let t = Threshold::parse("http_req_failed", "rate<0.1").unwrap();
        assert_eq!(t.aggregator, Aggregator::Rate);
        assert_eq!(t.bound, 0.1);

        let t = Threshold::parse("checks", "rate>=90%").unwrap();
        assert_eq!(t.op, Op::Ge);
        assert!((t.bound - 0.9).abs() < 1e-9);
    }

    #[test]
    fn parses_duration_bound() {
        let t = Threshold::parse("http_req_duration", "avg <= 1s").unwrap();
        assert_eq!(t.bound, 1_000.);
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(matches!(
            Threshold::parse("m", "p95 below 500"),
            Err(ThresholdParseError::MissingOperator(_))
        ));
        assert!(matches!(
            Threshold::parse("m", "p99th<500"),
            Err(ThresholdParseError::UnknownAggregator(_))
        ));
        assert!(matches!(
            Threshold::parse("m", "p(950)<500"),
            Err(ThresholdParseError::InvalidQuantile(_))
        ));
        assert!(matches!(
            Threshold::parse("m", "rate<fast"),
            Err(ThresholdParseError::InvalidBound(_))
        ));
    }

    #[test]
    fn percentile_verdict_flips_with_tail() {
        let t = Threshold::parse("http_req_duration", "p(95)<500").unwrap();

        let below: Vec<f64> = (0..100).map(|i| 100. + i as f64).collect();
        let agg = aggregates_with_samples("http_req_duration", &below);
        assert!(t.evaluate(&agg).passed);

        let mut shifted = below;
        shifted.extend(std::iter::repeat(2_000.).take(40));
        let agg = aggregates_with_samples("http_req_duration", &shifted);
        let verdict = t.evaluate(&agg);
        assert!(!verdict.passed);
        assert!(verdict.observed.unwrap() >= 500.);
    }

    #[test]
    fn missing_metric_always_fails() {
        let t = Threshold::parse("http_req_duration", "p(95)<500").unwrap();
        let verdict = t.evaluate(&AggregateSet::new());
        assert!(!verdict.passed);
        assert!(verdict.reason.unwrap().contains("no samples"));
    }

    #[test]
    fn evaluates_against_checks() {
        let mut agg = AggregateSet::new();
        for i in 0..10 {
            agg.apply(&MetricEvent::Check {
                name: "status is 200".to_string(),
                passed: i < 9,
                at: Instant::now(),
            });
        }

        let t = Threshold::parse("status is 200", "rate>0.8").unwrap();
        assert!(t.evaluate(&agg).passed);

        let t = Threshold::parse("status is 200", "avg<1").unwrap();
        let verdict = t.evaluate(&agg);
        assert!(!verdict.passed);
        assert!(verdict.reason.is_some());
    }
}
