//! Task that polls the remote build until it reaches a terminal state.

use super::{Task, TaskResult};
use crate::client::{JobStatus, RemoteJobClient};
use crate::context::{keys, StageContext};
use crate::definition::StageDefinition;
use crate::errors::{RemoteJobError, TaskError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Polls the job's status once per invocation.
///
/// Returns `Running` while the job is pending or executing; the engine
/// re-invokes on its own backoff schedule. Never sleeps. The fresh
/// `buildInfo` snapshot is written into the delta on every poll so the
/// latest remote state is always visible.
pub struct MonitorJobTask {
    definition: Arc<StageDefinition>,
    client: Arc<dyn RemoteJobClient>,
}

impl MonitorJobTask {
    /// Creates a new monitor task.
    #[must_use]
    pub fn new(definition: Arc<StageDefinition>, client: Arc<dyn RemoteJobClient>) -> Self {
        Self { definition, client }
    }
}

impl fmt::Debug for MonitorJobTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorJobTask")
            .field("account", &self.definition.account)
            .finish()
    }
}

#[async_trait]
impl Task for MonitorJobTask {
    fn name(&self) -> &str {
        "monitorRemoteBuild"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<TaskResult, TaskError> {
        let Some(job_id) = ctx.job_id() else {
            return Ok(TaskResult::terminal_error(
                "no remote job recorded for this stage",
            ));
        };

        let handle = match self.client.poll(&self.definition.account, job_id).await {
            Ok(handle) => handle,
            Err(RemoteJobError::Transient { message }) => {
                return Err(TaskError::new(self.name(), message));
            }
            Err(err @ RemoteJobError::Permanent { .. }) => {
                return Ok(TaskResult::terminal_error(err.to_string()));
            }
        };

        debug!(job_id = %handle.id, status = %handle.status, "polled remote build");
        let info = handle.build_info();

        let result = match handle.status {
            JobStatus::Success => TaskResult::succeeded_empty(),
            status if status.is_terminal() => TaskResult::failed(
                crate::context::ContextDelta::new(),
                format!("remote build {} terminated with status {status}", handle.id),
            ),
            _ => TaskResult::running(),
        };

        Ok(result.with_value(keys::BUILD_INFO, info))
    }
}
