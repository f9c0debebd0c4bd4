// Error handling framework

use thiserror::Error;

/// Option store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Option store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Option store contents are not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outbound workflow dispatch errors
///
/// An incomplete deploy target is not an error; see `DispatchOutcome::Skipped`.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    #[error("Dispatch request failed: {0}")]
    Transport(String),

    #[error("Dispatch rejected with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to read deploy target: {0}")]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// True for network failures and non-2xx responses
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, DispatchError::Transport(_) | DispatchError::Status { .. })
    }
}

/// Schedule-related errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid time of day '{value}': {reason}")]
    InvalidTime { value: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Job '{0}' is already scheduled")]
    AlreadyScheduled(String),

    #[error("Job '{name}' was still being rescheduled after {attempts} removal attempts")]
    RemovalContended { name: String, attempts: u32 },

    #[error("Failed to read schedule settings: {0}")]
    Store(#[from] StoreError),
}
