use thiserror::Error;

/// Error a worker may return from a single invocation.
///
/// Returning an error is still a normal return: it is logged and the restart
/// policy decides what happens next. Only a panic counts as a crash.
pub type TaskError = anyhow::Error;

pub type TaskResult = Result<(), TaskError>;

/// Caller misuse detected synchronously by the supervisor API.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// The restart configuration cannot be turned into a policy.
    #[error("invalid supervisor configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Another supervisor is already exported under this label.
    #[error("exporter label {label:?} is already registered")]
    DuplicateLabel { label: String },
}

impl SupervisorError {
    /// Short snake_case label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::InvalidConfig { .. } => "invalid_config",
            SupervisorError::DuplicateLabel { .. } => "duplicate_label",
        }
    }
}
