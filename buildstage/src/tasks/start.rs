//! Task that submits the build job to the remote service.

use super::{Task, TaskResult};
use crate::client::RemoteJobClient;
use crate::context::{keys, StageContext};
use crate::definition::StageDefinition;
use crate::errors::{RemoteJobError, TaskError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Submits the job and records its external id in the context.
///
/// Returns `Running` once the job is accepted; the monitor task takes over
/// from there. A rejected submission (bad spec, auth) is a terminal error.
pub struct StartJobTask {
    definition: Arc<StageDefinition>,
    client: Arc<dyn RemoteJobClient>,
}

impl StartJobTask {
    /// Creates a new start task.
    #[must_use]
    pub fn new(definition: Arc<StageDefinition>, client: Arc<dyn RemoteJobClient>) -> Self {
        Self { definition, client }
    }
}

impl fmt::Debug for StartJobTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartJobTask")
            .field("account", &self.definition.account)
            .finish()
    }
}

#[async_trait]
impl Task for StartJobTask {
    fn name(&self) -> &str {
        "startRemoteBuild"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<TaskResult, TaskError> {
        // A re-invocation after the job id was recorded must not resubmit.
        if ctx.job_id().is_some() {
            return Ok(TaskResult::succeeded_empty());
        }

        let handle = match self
            .client
            .start(&self.definition.account, &self.definition.job_spec)
            .await
        {
            Ok(handle) => handle,
            Err(RemoteJobError::Transient { message }) => {
                return Err(TaskError::new(self.name(), message));
            }
            Err(err @ RemoteJobError::Permanent { .. }) => {
                return Ok(TaskResult::terminal_error(err.to_string()));
            }
        };

        debug!(job_id = %handle.id, account = %self.definition.account, "remote build started");

        Ok(TaskResult::running()
            .with_value(keys::JOB_ID, serde_json::json!(handle.id))
            .with_value(keys::BUILD_INFO, handle.build_info()))
    }
}
