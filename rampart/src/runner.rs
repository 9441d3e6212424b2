use crate::recorder::Recorder;
use futures_util::FutureExt;
use rampart_core::{ITERATIONS, ITERATION_DURATION};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

/// Name under which failed iterations (panics, hard timeouts) are counted.
const ITERATION_CHECK: &str = "iteration";

#[derive(Clone)]
pub(crate) struct RunnerContext {
    pub recorder: Arc<Recorder>,
    pub vu_id: u64,
    pub abort: Arc<AtomicBool>,
}

tokio::task_local! {
    pub(crate) static RUNNER_HOOK: RunnerContext;
}

fn with_hook<R>(what: &str, f: impl FnOnce(RunnerContext) -> R) -> Option<R> {
    if let Ok(hook) = RUNNER_HOOK.try_with(|v| v.clone()) {
        Some(f(hook))
    } else {
        error!("{what} called outside a running scenario; ignoring");
        None
    }
}

/// Records a named boolean assertion and passes the value through, so it
/// can gate follow-up work:
///
/// ```no_run
/// # async fn doc(res: rampart::http::Response) {
/// rampart::check("status is 200", res.status == 200);
/// # }
/// ```
pub fn check(name: &str, passed: bool) -> bool {
    with_hook("check()", |hook| hook.recorder.check(name, passed));
    passed
}

/// Records one value of a named sample metric (latency, sizes, 0/1 rates).
/// The metric springs into existence on first use.
pub fn record(metric: &str, value: f64) {
    with_hook("record()", |hook| {
        hook.recorder.sample(metric, value, Vec::new())
    });
}

/// Increments a named counter.
pub fn counter(name: &str, by: u64) {
    with_hook("counter()", |hook| hook.recorder.increment(name, by));
}

/// Suspends the calling virtual user. Other virtual users and the
/// scheduler's control tick keep running; only this iteration waits.
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Requests a run-level stop. The scheduler observes the flag on its next
/// control tick, shuts the pool down, and marks the summary as aborted.
pub fn abort() {
    with_hook("abort()", |hook| hook.abort.store(true, Ordering::Relaxed));
}

/// Id of the virtual user executing the current iteration.
pub fn vu_id() -> Option<u64> {
    RUNNER_HOOK.try_with(|v| v.vu_id).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VuState {
    Running,
    Stopping,
}

struct VuHandle {
    id: u64,
    state: VuState,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the virtual users. The scheduler calls [`converge`](Self::converge)
/// once per control tick to diff the pool against the target concurrency.
pub(crate) struct VuPool<T> {
    scenario: T,
    recorder: Arc<Recorder>,
    abort: Arc<AtomicBool>,
    iteration_timeout: Option<Duration>,
    vus: Vec<VuHandle>,
    next_id: u64,
}

impl<T, F> VuPool<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    pub fn new(
        scenario: T,
        recorder: Arc<Recorder>,
        abort: Arc<AtomicBool>,
        iteration_timeout: Option<Duration>,
    ) -> Self {
        Self {
            scenario,
            recorder,
            abort,
            iteration_timeout,
            vus: Vec::new(),
            next_id: 0,
        }
    }

    pub fn running(&self) -> usize {
        self.vus
            .iter()
            .filter(|vu| vu.state == VuState::Running)
            .count()
    }

    /// Spawns or stops virtual users until the running count matches
    /// `target`. Ramp-up uses fresh ids; ramp-down signals the
    /// most-recently-started users first so long-lived ones keep their
    /// iteration cadence.
    pub fn converge(&mut self, target: usize) {
        self.reap();

        let running = self.running();
        if running < target {
            for _ in running..target {
                self.spawn_vu();
            }
        } else if running > target {
            let mut excess = running - target;
            for vu in self.vus.iter_mut().rev() {
                if excess == 0 {
                    break;
                }
                if vu.state == VuState::Running {
                    trace!(vu = vu.id, "signaling stop");
                    vu.state = VuState::Stopping;
                    let _ = vu.stop.send(true);
                    excess -= 1;
                }
            }
        }
    }

    fn reap(&mut self) {
        self.vus.retain(|vu| !vu.handle.is_finished());
    }

    fn spawn_vu(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        let (stop_tx, stop_rx) = watch::channel(false);
        let context = RunnerContext {
            recorder: self.recorder.clone(),
            vu_id: id,
            abort: self.abort.clone(),
        };
        let scenario = self.scenario.clone();
        let recorder = self.recorder.clone();
        let iteration_timeout = self.iteration_timeout;

        let handle = tokio::spawn(RUNNER_HOOK.scope(
            context,
            run_vu(scenario, recorder, id, stop_rx, iteration_timeout),
        ));

        self.vus.push(VuHandle {
            id,
            state: VuState::Running,
            stop: stop_tx,
            handle,
        });
    }

    /// Signals every remaining virtual user and waits up to `grace` for
    /// them to finish their current iteration; stragglers are cancelled.
    pub async fn shutdown(mut self, grace: Duration) {
        for vu in &mut self.vus {
            vu.state = VuState::Stopping;
            let _ = vu.stop.send(true);
        }

        let deadline = Instant::now() + grace;
        for mut vu in self.vus.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, &mut vu.handle).await.is_err() {
                warn!(vu = vu.id, "grace period elapsed; cancelling");
                vu.handle.abort();
            }
        }
    }

    #[cfg(test)]
    fn running_ids(&self) -> Vec<u64> {
        self.vus
            .iter()
            .filter(|vu| vu.state == VuState::Running)
            .map(|vu| vu.id)
            .collect()
    }
}

async fn run_vu<T, F>(
    scenario: T,
    recorder: Arc<Recorder>,
    id: u64,
    stop: watch::Receiver<bool>,
    iteration_timeout: Option<Duration>,
) where
    T: Fn() -> F + Send + Sync + 'static,
    F: Future<Output = ()> + Send,
{
    debug!(vu = id, "virtual user starting");
    loop {
        let start = Instant::now();
        run_iteration(&scenario, &recorder, iteration_timeout).await;
        recorder.sample(
            ITERATION_DURATION,
            start.elapsed().as_secs_f64() * 1_000.,
            Vec::new(),
        );
        recorder.increment(ITERATIONS, 1);

        // Stop signals are only observed at iteration boundaries; an
        // in-flight request is never torn down by a ramp-down.
        if *stop.borrow() {
            break;
        }
    }
    debug!(vu = id, "virtual user stopped");
}

/// One scenario invocation, with its failure modes contained: a panic or a
/// hard timeout is logged and counted as a failed iteration check, and
/// never takes down the runner or its neighbors.
async fn run_iteration<T, F>(scenario: &T, recorder: &Recorder, iteration_timeout: Option<Duration>)
where
    T: Fn() -> F,
    F: Future<Output = ()>,
{
    let iteration = AssertUnwindSafe(scenario()).catch_unwind();

    let outcome = match iteration_timeout {
        Some(limit) => match tokio::time::timeout(limit, iteration).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("iteration exceeded {limit:?} and was cancelled");
                recorder.check(ITERATION_CHECK, false);
                return;
            }
        },
        None => iteration.await,
    };

    if let Err(panic) = outcome {
        error!("iteration panicked: {}", panic_message(&panic));
        recorder.check(ITERATION_CHECK, false);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
