//! Scenario construction and the run loop.
use crate::recorder::Recorder;
use crate::runner::VuPool;
use crate::scheduler::{ControlClock, RampPlan};
use rampart_core::{
    AggregateSet, ConfigError, RunConfig, RunSummary, Stage, CONTROL_INTERVAL, VUS,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Builds a load scenario around a user-supplied iteration function.
///
/// The function is invoked in a loop by every active virtual user; inside
/// it you can issue requests through [`crate::http::get`], record
/// [`crate::check`]s, and [`crate::sleep`]. Awaiting the scenario runs it.
///
/// # Example
/// ```no_run
/// use rampart::prelude::*;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let summary = scenario("basic", || async {
///         check("alive", true);
///         sleep(Duration::from_secs(1)).await;
///     })
///     .vus(5)
///     .duration(Duration::from_secs(60))
///     .await
///     .unwrap();
///
///     assert!(summary.passed);
/// }
/// ```
pub fn scenario<T, F>(name: &str, func: T) -> Scenario<T>
where
    T: Fn() -> F + Send + 'static + Clone + Sync,
    F: Future<Output = ()> + Send + 'static,
{
    Scenario::new(name, func)
}

/// Handle for a configured-but-not-yet-started run. Created by
/// [`scenario`]; resolves to `Result<RunSummary, ConfigError>`.
#[pin_project::pin_project]
pub struct Scenario<T> {
    func: T,
    runner_fut: Option<Pin<Box<dyn Future<Output = Result<RunSummary, ConfigError>> + Send>>>,
    config: RunConfig,
}

impl<T> Scenario<T> {
    fn new(name: &str, func: T) -> Self {
        Self {
            func,
            runner_fut: None,
            config: RunConfig::new(name),
        }
    }

    /// Flat concurrency for the whole run. Combine with
    /// [`duration`](Self::duration); mutually exclusive with stages.
    pub fn vus(mut self, vus: u32) -> Self {
        self.config.vus = Some(vus);
        self
    }

    /// Run length for a flat profile.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = Some(duration);
        self
    }

    /// Staged ramp profile; the run ends when the last stage elapses.
    ///
    /// # Example
    /// ```no_run
    /// use rampart::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     scenario("ramp", || async {})
    ///         .stages([
    ///             Stage::new(Duration::from_secs(30), 5),
    ///             Stage::new(Duration::from_secs(60), 10),
    ///             Stage::new(Duration::from_secs(30), 0),
    ///         ])
    ///         .await
    ///         .unwrap();
    /// }
    /// ```
    pub fn stages(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.config.stages = stages.into_iter().collect();
        self
    }

    /// Concurrency the first stage ramps from. Defaults to 1.
    pub fn start_vus(mut self, start_vus: u32) -> Self {
        self.config.start_vus = Some(start_vus);
        self
    }

    /// Adds a pass/fail predicate over a metric's aggregates, e.g.
    /// `.threshold("http_req_duration", "p(95)<500")`. The overall verdict
    /// is the AND of every threshold; a threshold on a metric with no
    /// samples fails.
    pub fn threshold(mut self, metric: &str, expression: &str) -> Self {
        self.config
            .thresholds
            .entry(metric.to_string())
            .or_default()
            .push(expression.to_string());
        self
    }

    /// How long stopped virtual users get to finish their current
    /// iteration (default 30s).
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.config.grace_period = grace_period;
        self
    }

    /// Hard per-iteration bound; an iteration exceeding it is cancelled
    /// and recorded as a failed check. Disabled by default.
    pub fn iteration_timeout(mut self, iteration_timeout: Duration) -> Self {
        self.config.iteration_timeout = Some(iteration_timeout);
        self
    }

    /// Replaces the whole configuration, e.g. with a deserialized
    /// [`RunConfig`]. The scenario keeps its name unless the config
    /// carries one.
    pub fn with_config(mut self, mut config: RunConfig) -> Self {
        if config.name.is_empty() {
            config.name = self.config.name.clone();
        }
        self.config = config;
        self
    }
}

impl<T, F> Future for Scenario<T>
where
    T: Fn() -> F + Send + 'static + Clone + Sync,
    F: Future<Output = ()> + Send + 'static,
{
    type Output = Result<RunSummary, ConfigError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if this.runner_fut.is_none() {
            let func = this.func.clone();
            let config = this.config.clone();
            *this.runner_fut = Some(Box::pin(async move { run_scenario(func, config).await }));
        }

        if let Some(runner) = this.runner_fut.as_mut() {
            runner.as_mut().poll(cx)
        } else {
            unreachable!()
        }
    }
}

#[instrument(name = "scenario", skip_all, fields(name = %config.name))]
async fn run_scenario<T, F>(scenario: T, config: RunConfig) -> Result<RunSummary, ConfigError>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    let thresholds = config.validate()?;
    info!("Running {} with config {:?}", config.name, &config);

    let recorder = Arc::new(Recorder::new());
    let abort = Arc::new(AtomicBool::new(false));
    let mut pool = VuPool::new(
        scenario,
        recorder.clone(),
        abort.clone(),
        config.iteration_timeout,
    );
    let plan = RampPlan::from_config(&config);
    let total = plan.total_duration();
    let mut aggregates = AggregateSet::new();
    let mut clock = ControlClock::new(CONTROL_INTERVAL);
    let started = Instant::now();
    let mut max_vus = 0u32;
    let mut aborted = false;

    // NOTE: This loop is time-sensitive. Any long awaits or blocking here
    // delays convergence for every virtual user.
    loop {
        let elapsed = clock.tick().await;
        recorder.drain_into(&mut aggregates);

        if abort.load(Ordering::Relaxed) {
            warn!("run aborted by scenario");
            aborted = true;
            break;
        }
        if elapsed >= total {
            break;
        }

        let target = plan.target_at(elapsed);
        pool.converge(target as usize);
        let active = pool.running() as u32;
        max_vus = max_vus.max(active);
        recorder.sample(VUS, active as f64, Vec::new());
        trace!("tick at {elapsed:?}: target={target} active={active}");
    }

    pool.shutdown(config.grace_period).await;
    recorder.drain_into(&mut aggregates);

    let verdicts = thresholds.iter().map(|t| t.evaluate(&aggregates)).collect();
    let summary = RunSummary::build(
        &config.name,
        &aggregates,
        verdicts,
        started.elapsed(),
        max_vus,
        aborted,
    );

    info!("Scenario complete:\n{summary}");
    Ok(summary)
}
