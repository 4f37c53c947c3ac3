//! Task that requests a stop of the remote build. Cancellation path only.

use super::{Task, TaskResult};
use crate::client::RemoteJobClient;
use crate::context::{keys, StageContext};
use crate::definition::StageDefinition;
use crate::errors::{RemoteJobError, TaskError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Requests that the remote job be stopped.
///
/// Unlike the graph tasks this one cannot receive a pre-parsed definition:
/// cancellation may arrive before any graph was built, so the definition is
/// read from the live context. When no job id has been recorded there is
/// nothing to stop and the task short-circuits without a remote call.
pub struct StopJobTask {
    client: Arc<dyn RemoteJobClient>,
}

impl StopJobTask {
    /// Creates a new stop task.
    #[must_use]
    pub fn new(client: Arc<dyn RemoteJobClient>) -> Self {
        Self { client }
    }
}

impl fmt::Debug for StopJobTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopJobTask").finish()
    }
}

#[async_trait]
impl Task for StopJobTask {
    fn name(&self) -> &str {
        "stopRemoteBuild"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<TaskResult, TaskError> {
        let Some(job_id) = ctx.job_id() else {
            return Ok(TaskResult::terminal_error(
                "no remote job recorded for this stage",
            ));
        };

        let definition = match StageDefinition::from_context(ctx) {
            Ok(definition) => definition,
            Err(err) => return Ok(TaskResult::terminal_error(err.to_string())),
        };

        let handle = match self.client.stop(&definition.account, job_id).await {
            Ok(handle) => handle,
            Err(RemoteJobError::Transient { message }) => {
                return Err(TaskError::new(self.name(), message));
            }
            Err(err @ RemoteJobError::Permanent { .. }) => {
                return Ok(TaskResult::terminal_error(err.to_string()));
            }
        };

        debug!(job_id = %handle.id, status = %handle.status, "remote build stop requested");

        Ok(TaskResult::succeeded_empty().with_value(keys::BUILD_INFO, handle.build_info()))
    }
}
