use std::time::Duration;

/// How often the scheduler re-evaluates the target concurrency and
/// converges the virtual-user pool on it.
pub const CONTROL_INTERVAL: Duration = Duration::from_secs(1);

/// How long stopped virtual users get to finish their current iteration
/// before being forcibly cancelled.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Concurrency a staged ramp starts from when `start_vus` is not set.
pub const DEFAULT_START_VUS: u32 = 1;
