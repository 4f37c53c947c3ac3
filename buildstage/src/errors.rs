//! Error types for the buildstage core.
//!
//! The taxonomy follows the stage's error handling contract: transient
//! remote errors are a retry signal for the hosting engine, permanent ones
//! terminate the stage, and cancellation-path errors never escape the
//! cancellation boundary at all.

use thiserror::Error;

/// An error reported by the remote build service client.
#[derive(Debug, Clone, Error)]
pub enum RemoteJobError {
    /// A transient error (network blip, rate limit). Safe to retry.
    #[error("transient remote error: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// A permanent error (invalid spec, job not found, auth failure).
    #[error("permanent remote error: {message}")]
    Permanent {
        /// Description of the failure.
        message: String,
    },
}

impl RemoteJobError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a permanent error.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Returns true if retrying the call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Error returned by a task when the engine should re-invoke it later.
///
/// This is the transient channel of the task contract: an `Err(TaskError)`
/// means "try this same invocation again on your own backoff schedule". A
/// permanent failure is never reported this way; it becomes a
/// `TerminalError` task result instead.
#[derive(Debug, Clone, Error)]
#[error("transient failure in task '{task}': {message}")]
pub struct TaskError {
    /// Name of the task that failed.
    pub task: String,
    /// Description of the failure.
    pub message: String,
}

impl TaskError {
    /// Creates a new transient task error.
    #[must_use]
    pub fn new(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            message: message.into(),
        }
    }
}

/// Error raised when the stage definition cannot be parsed from the context.
#[derive(Debug, Clone, Error)]
#[error("invalid stage definition: {message}")]
pub struct DefinitionError {
    /// Description of what was malformed or missing.
    pub message: String,
}

impl DefinitionError {
    /// Creates a new definition error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for DefinitionError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Error raised when an expected artifact has no produced match.
#[derive(Debug, Clone, Error)]
#[error("no produced artifact matches expectation {expectation}")]
pub struct BindError {
    /// Rendered form of the unmatched expectation.
    pub expectation: String,
}

impl BindError {
    /// Creates a new bind error.
    #[must_use]
    pub fn new(expectation: impl Into<String>) -> Self {
        Self {
            expectation: expectation.into(),
        }
    }
}
