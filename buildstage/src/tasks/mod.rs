//! Task trait and result types.
//!
//! Tasks are the discrete execution steps of a stage's graph. Each one is a
//! stateless unit: given the current context, perform at most one external
//! call and report a status plus a context delta for the engine to merge.

mod bind;
mod fetch;
mod monitor;
mod start;
mod stop;

pub use bind::BindArtifactsTask;
pub use fetch::FetchArtifactsTask;
pub use monitor::MonitorJobTask;
pub use start::StartJobTask;
pub use stop::StopJobTask;

use crate::context::{ContextDelta, StageContext};
use crate::errors::TaskError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;

/// The outcome status of a single task invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Work is still in progress; the engine re-invokes this task later.
    Running,
    /// The task finished and the sequence may advance.
    Succeeded,
    /// The remote work finished unsuccessfully.
    Failed,
    /// A permanent error; the stage fails without retry.
    TerminalError,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
            Self::TerminalError => write!(f, "TERMINAL_ERROR"),
        }
    }
}

impl TaskStatus {
    /// Returns true if this status is final for the task.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// The result of one task invocation.
///
/// The delta is merged into the stage context by the engine after every
/// accepted invocation, whatever the status, so the latest remote snapshot
/// is always visible downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Outcome status.
    pub status: TaskStatus,

    /// Keys to merge into the stage context.
    #[serde(default)]
    pub context_delta: ContextDelta,

    /// Error message for failed or terminal outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    /// Creates a running result with an empty delta.
    #[must_use]
    pub fn running() -> Self {
        Self {
            status: TaskStatus::Running,
            context_delta: ContextDelta::new(),
            error: None,
        }
    }

    /// Creates a running result carrying a delta.
    #[must_use]
    pub fn running_with(context_delta: ContextDelta) -> Self {
        Self {
            status: TaskStatus::Running,
            context_delta,
            error: None,
        }
    }

    /// Creates a succeeded result carrying a delta.
    #[must_use]
    pub fn succeeded(context_delta: ContextDelta) -> Self {
        Self {
            status: TaskStatus::Succeeded,
            context_delta,
            error: None,
        }
    }

    /// Creates a succeeded result with an empty delta.
    #[must_use]
    pub fn succeeded_empty() -> Self {
        Self::succeeded(ContextDelta::new())
    }

    /// Creates a failed result with a delta and an error message.
    #[must_use]
    pub fn failed(context_delta: ContextDelta, error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            context_delta,
            error: Some(error.into()),
        }
    }

    /// Creates a terminal-error result.
    #[must_use]
    pub fn terminal_error(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::TerminalError,
            context_delta: ContextDelta::new(),
            error: Some(error.into()),
        }
    }

    /// Adds a single delta entry.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context_delta.insert(key.into(), value);
        self
    }

    /// Gets a value from the delta.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.context_delta.get(key)
    }
}

/// Trait for the discrete execution steps of a stage.
///
/// `Err(TaskError)` is the transient channel: the engine re-invokes the
/// task later on its own backoff schedule. Permanent failures are reported
/// in-band as a [`TaskStatus::TerminalError`] result.
#[async_trait]
pub trait Task: Send + Sync + Debug {
    /// Returns the name of the task.
    fn name(&self) -> &str;

    /// Executes the task against the current stage context.
    async fn execute(&self, ctx: &StageContext) -> Result<TaskResult, TaskError>;
}
