use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    policy::{MaxRestarts, RestartPolicy},
    SupervisorError,
};

/// Restart configuration of a supervisor.
///
/// ```json
/// { "restart": -1, "restart_delay": 1000 }
/// ```
///
/// `restart` is `-1` for unbounded restarts, `0` to run once, `n` to run and
/// then restart `n` times. `restart_delay` is in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub restart: i32,
    #[serde(default, with = "millis")]
    pub restart_delay: Duration,
}

impl SupervisorConfig {
    pub const fn new(restart: i32, restart_delay: Duration) -> Self {
        Self {
            restart,
            restart_delay,
        }
    }

    /// Validates the raw values and produces the restart policy.
    pub fn policy(&self) -> Result<RestartPolicy, SupervisorError> {
        let max_restarts = MaxRestarts::try_from(self.restart)?;
        Ok(RestartPolicy::new(max_restarts, self.restart_delay))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(delay: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = i64::deserialize(d)?;
        let ms = u64::try_from(ms).map_err(|_| {
            D::Error::custom(format!("restart_delay must not be negative, got {ms}"))
        })?;
        Ok(Duration::from_millis(ms))
    }
}
