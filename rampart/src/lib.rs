#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod http;
pub mod scenario;

pub(crate) mod recorder;
pub(crate) mod runner;
pub(crate) mod scheduler;

pub use runner::{abort, check, counter, record, sleep, vu_id};
pub use scenario::{scenario, Scenario};

pub use rampart_core::{
    ConfigError, RunConfig, RunSummary, Stage, Threshold, ThresholdVerdict,
};

pub mod prelude {
    pub use crate::http::{self, HttpClient, Response};
    pub use crate::scenario::{scenario, Scenario};
    pub use crate::{abort, check, counter, record, sleep};
    pub use rampart_core::{ConfigError, RunConfig, RunSummary, Stage};
}
