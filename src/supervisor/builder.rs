use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{config::SupervisorConfig, task::DynTask, Supervisor, SupervisorError, Worker};

/// Builds a [`Supervisor`] around one worker.
///
/// Defaults: run once, no restart delay, a fresh cancellation source that
/// nothing else can cancel, and the name `"worker"` in logs.
pub struct SupervisorBuilder {
    name: String,
    worker: DynTask,
    config: SupervisorConfig,
    source: CancellationToken,
}

impl SupervisorBuilder {
    pub fn new(worker: impl Worker) -> Self {
        Self {
            name: "worker".to_string(),
            worker: Box::new(worker),
            config: SupervisorConfig::default(),
            source: CancellationToken::new(),
        }
    }

    /// Name used in log events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the whole restart configuration.
    pub fn with_config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    /// `-1` restarts forever, `0` runs once, `n` restarts up to `n` times.
    pub fn with_max_restarts(mut self, restarts: i32) -> Self {
        self.config.restart = restarts;
        self
    }

    /// Sets the pause between a termination and the next invocation.
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.config.restart_delay = delay;
        self
    }

    /// Sets the cancellation source runs are derived from.
    pub fn with_cancellation_source(mut self, source: CancellationToken) -> Self {
        self.source = source;
        self
    }

    /// Validates the configuration and constructs the `Supervisor`.
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        let policy = self.config.policy()?;
        Ok(Supervisor::new(self.name, self.worker, policy, self.source))
    }
}
