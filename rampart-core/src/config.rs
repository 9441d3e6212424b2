use crate::{Threshold, ThresholdParseError, DEFAULT_GRACE_PERIOD};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// One segment of a ramp profile: concurrency moves to `target` over
/// `duration`, starting from wherever the previous stage left it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stage {
    #[serde(with = "duration_str")]
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// Declarative run options.
///
/// Either a flat profile (`vus` + `duration`) or a staged ramp (`stages`)
/// must be provided; when both are present the stages win. Duration fields
/// accept humantime strings (`"30s"`, `"1m"`) when deserialized.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub vus: Option<u32>,
    #[serde(default, with = "opt_duration_str")]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub start_vus: Option<u32>,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_grace_period", with = "duration_str")]
    pub grace_period: Duration,
    #[serde(default, with = "opt_duration_str")]
    pub iteration_timeout: Option<Duration>,
}

impl RunConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vus: None,
            duration: None,
            start_vus: None,
            stages: Vec::new(),
            thresholds: BTreeMap::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
            iteration_timeout: None,
        }
    }

    /// Checks the profile and compiles every threshold expression.
    /// Any error here is fatal: the run must not start.
    pub fn validate(&self) -> Result<Vec<Threshold>, ConfigError> {
        if self.stages.is_empty() {
            if self.duration.is_none() {
                return Err(ConfigError::MissingProfile);
            }
            if self.vus == Some(0) {
                return Err(ConfigError::ZeroVus);
            }
        } else {
            for (index, stage) in self.stages.iter().enumerate() {
                if stage.duration.is_zero() {
                    return Err(ConfigError::EmptyStage(index));
                }
            }
        }

        let mut thresholds = Vec::new();
        for (metric, expressions) in &self.thresholds {
            for expression in expressions {
                let threshold =
                    Threshold::parse(metric, expression).map_err(|source| {
                        ConfigError::Threshold {
                            metric: metric.clone(),
                            source,
                        }
                    })?;
                thresholds.push(threshold);
            }
        }
        Ok(thresholds)
    }

    /// Scheduled run length: the sum of the stage durations, or the flat
    /// `duration`. `None` only for configs that fail [`validate`](Self::validate).
    pub fn total_duration(&self) -> Option<Duration> {
        if self.stages.is_empty() {
            self.duration
        } else {
            Some(self.stages.iter().map(|s| s.duration).sum())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no load profile: set `duration` (with optional `vus`) or `stages`")]
    MissingProfile,
    #[error("`vus` must be greater than zero")]
    ZeroVus,
    #[error("stage {0}: duration must be greater than zero")]
    EmptyStage(usize),
    #[error("threshold on `{metric}`: {source}")]
    Threshold {
        metric: String,
        #[source]
        source: ThresholdParseError,
    },
}

fn default_grace_period() -> Duration {
    DEFAULT_GRACE_PERIOD
}

mod duration_str {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(de: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(de)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

mod opt_duration_str {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(de: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(de)?;
        s.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
