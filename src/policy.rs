//! Restart decisions taken after every worker termination.
//!
//! The evaluator does not care whether the worker returned or panicked:
//! both consume the same budget and obey the same delay.

use std::time::Duration;

use crate::SupervisorError;

/// How many times the worker may be restarted over the supervisor's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxRestarts {
    /// Restart forever.
    Unbounded,
    /// Restart at most `n` times. `Limited(0)` runs the worker exactly once.
    Limited(u32),
}

impl TryFrom<i32> for MaxRestarts {
    type Error = SupervisorError;

    /// `-1` is unbounded, `0` runs once, `n > 0` allows `n` extra runs.
    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            -1 => Ok(Self::Unbounded),
            n if n >= 0 => Ok(Self::Limited(n.unsigned_abs())),
            n => Err(SupervisorError::InvalidConfig {
                reason: format!("restart must be -1, 0 or positive, got {n}"),
            }),
        }
    }
}

impl From<MaxRestarts> for i32 {
    fn from(max: MaxRestarts) -> Self {
        match max {
            MaxRestarts::Unbounded => -1,
            MaxRestarts::Limited(n) => i32::try_from(n).unwrap_or(i32::MAX),
        }
    }
}

/// What the control loop does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Stop,
    RestartNow,
    RestartAfter(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_restarts: MaxRestarts,
    pub restart_delay: Duration,
}

impl RestartPolicy {
    pub const fn new(max_restarts: MaxRestarts, restart_delay: Duration) -> Self {
        Self {
            max_restarts,
            restart_delay,
        }
    }

    /// Decides the next step given the restarts the supervisor has performed
    /// so far. The count is cumulative over every run of the supervisor.
    pub fn evaluate(&self, restarts_performed: u64) -> RestartDecision {
        // Limited(0) falls in here too: zero restarts are always exhausted.
        if let MaxRestarts::Limited(max) = self.max_restarts {
            if restarts_performed >= u64::from(max) {
                return RestartDecision::Stop;
            }
        }
        if self.restart_delay.is_zero() {
            RestartDecision::RestartNow
        } else {
            RestartDecision::RestartAfter(self.restart_delay)
        }
    }
}

impl Default for RestartPolicy {
    /// Runs the worker once.
    fn default() -> Self {
        Self::new(MaxRestarts::Limited(0), Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_once_always_stops() {
        let policy = RestartPolicy::new(MaxRestarts::Limited(0), Duration::from_secs(1));
        assert_eq!(policy.evaluate(0), RestartDecision::Stop);
        assert_eq!(policy.evaluate(7), RestartDecision::Stop);
    }

    #[test]
    fn limited_stops_once_budget_is_spent() {
        let policy = RestartPolicy::new(MaxRestarts::Limited(2), Duration::ZERO);
        assert_eq!(policy.evaluate(0), RestartDecision::RestartNow);
        assert_eq!(policy.evaluate(1), RestartDecision::RestartNow);
        assert_eq!(policy.evaluate(2), RestartDecision::Stop);
        assert_eq!(policy.evaluate(3), RestartDecision::Stop);
    }

    #[test]
    fn delay_turns_restart_into_wait() {
        let delay = Duration::from_millis(250);
        let policy = RestartPolicy::new(MaxRestarts::Limited(1), delay);
        assert_eq!(policy.evaluate(0), RestartDecision::RestartAfter(delay));
        assert_eq!(policy.evaluate(1), RestartDecision::Stop);
    }

    #[test]
    fn unbounded_never_stops_on_count() {
        let policy = RestartPolicy::new(MaxRestarts::Unbounded, Duration::ZERO);
        assert_eq!(policy.evaluate(u64::MAX), RestartDecision::RestartNow);
    }

    #[test]
    fn raw_restart_values() {
        assert_eq!(MaxRestarts::try_from(-1), Ok(MaxRestarts::Unbounded));
        assert_eq!(MaxRestarts::try_from(0), Ok(MaxRestarts::Limited(0)));
        assert_eq!(MaxRestarts::try_from(4), Ok(MaxRestarts::Limited(4)));
        let err = MaxRestarts::try_from(-2).unwrap_err();
        assert_eq!(err.as_label(), "invalid_config");
        assert_eq!(i32::from(MaxRestarts::Unbounded), -1);
    }
}
