//! Session configuration.

use crate::error::{Error, Result};
use std::time::Duration;

/// Default per-consumer capacity of the event bus.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Tunables for a [`Hook`](crate::Hook) session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookConfig {
    /// Capacity of each consumer queue. On overflow the oldest event is dropped.
    pub bus_capacity: usize,
    /// Upper bound on joining the tap and dispatcher threads in `end()`.
    /// `None` waits indefinitely.
    pub shutdown_timeout: Option<Duration>,
    /// Runtime tap failures recovered before the event stream is closed with an error.
    pub max_restarts: u32,
    /// First backoff delay between restarts; doubled on every attempt.
    pub restart_backoff: Duration,
    /// Window in which consecutive presses of one button count as a multi-click.
    pub multi_click_interval: Duration,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            bus_capacity: DEFAULT_BUS_CAPACITY,
            shutdown_timeout: Some(Duration::from_secs(2)),
            max_restarts: 3,
            restart_backoff: Duration::from_millis(50),
            multi_click_interval: Duration::from_millis(500),
        }
    }
}

impl HookConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> HookConfigBuilder {
        HookConfigBuilder::default()
    }

    /// Backoff to wait before restart number `attempt` (1-based).
    pub(crate) fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.restart_backoff.saturating_mul(factor)
    }
}

/// Builder for [`HookConfig`].
#[derive(Debug, Default)]
pub struct HookConfigBuilder {
    config: HookConfig,
}

impl HookConfigBuilder {
    /// Set the per-consumer bus capacity.
    pub fn bus_capacity(mut self, capacity: usize) -> Self {
        self.config.bus_capacity = capacity;
        self
    }

    /// Bound the time `end()` waits for worker threads.
    pub fn shutdown_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Set how many runtime tap failures are retried.
    pub fn max_restarts(mut self, restarts: u32) -> Self {
        self.config.max_restarts = restarts;
        self
    }

    /// Set the initial restart backoff.
    pub fn restart_backoff(mut self, backoff: Duration) -> Self {
        self.config.restart_backoff = backoff;
        self
    }

    /// Set the multi-click window.
    pub fn multi_click_interval(mut self, interval: Duration) -> Self {
        self.config.multi_click_interval = interval;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<HookConfig> {
        if self.config.bus_capacity == 0 {
            return Err(Error::InvalidConfig(
                "bus_capacity must be greater than zero".into(),
            ));
        }
        Ok(self.config)
    }
}
