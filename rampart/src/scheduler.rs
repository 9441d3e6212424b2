use rampart_core::{RunConfig, Stage, DEFAULT_START_VUS};
use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Target-concurrency curve for a run.
///
/// A flat `{vus, duration}` profile is one step stage. Staged profiles
/// ramp linearly from the previous stage's target (starting at
/// `start_vus`), so a `{duration: 30s, target: 5}` stage reaches 5 VUs at
/// its end, not its beginning.
#[derive(Debug, Clone)]
pub(crate) struct RampPlan {
    start: u32,
    stages: Vec<Stage>,
}

impl RampPlan {
    /// Builds the plan from a validated config.
    pub fn from_config(config: &RunConfig) -> Self {
        if config.stages.is_empty() {
            let vus = config.vus.unwrap_or(1);
            let duration = config.duration.unwrap_or(Duration::ZERO);
            Self {
                start: vus,
                stages: vec![Stage::new(duration, vus)],
            }
        } else {
            Self {
                start: config.start_vus.unwrap_or(DEFAULT_START_VUS),
                stages: config.stages.clone(),
            }
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn target_at(&self, elapsed: Duration) -> u32 {
        let mut offset = Duration::ZERO;
        let mut prev = self.start as f64;

        for stage in &self.stages {
            let end = offset + stage.duration;
            if elapsed < end {
                let frac = (elapsed - offset).as_secs_f64() / stage.duration.as_secs_f64();
                let target = prev + (stage.target as f64 - prev) * frac;
                return target.round() as u32;
            }
            prev = stage.target as f64;
            offset = end;
        }

        self.stages.last().map(|s| s.target).unwrap_or(self.start)
    }
}

/// Drives the control tick. The tick runs on its own interval with
/// [`MissedTickBehavior::Delay`], so a slow drain shifts the next tick
/// instead of bursting; scenario execution can never starve it since every
/// virtual user lives on its own task.
pub(crate) struct ControlClock {
    interval: Interval,
    started: Instant,
}

impl ControlClock {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            started: Instant::now(),
        }
    }

    /// Waits for the next tick and returns elapsed run time. The first
    /// call completes immediately with an elapsed time of zero.
    pub async fn tick(&mut self) -> Duration {
        self.interval.tick().await;
        self.started.elapsed()
    }
}
