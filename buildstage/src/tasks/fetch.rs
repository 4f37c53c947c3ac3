//! Task that lists the artifacts produced by a completed build.

use super::{Task, TaskResult};
use crate::client::RemoteJobClient;
use crate::context::{keys, StageContext};
use crate::definition::StageDefinition;
use crate::errors::{RemoteJobError, TaskError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Lists produced artifacts once the job is terminal-successful.
///
/// Runs only after the monitor task reported success. Transient listing
/// errors are left to the engine's retry policy.
pub struct FetchArtifactsTask {
    definition: Arc<StageDefinition>,
    client: Arc<dyn RemoteJobClient>,
}

impl FetchArtifactsTask {
    /// Creates a new fetch task.
    #[must_use]
    pub fn new(definition: Arc<StageDefinition>, client: Arc<dyn RemoteJobClient>) -> Self {
        Self { definition, client }
    }
}

impl fmt::Debug for FetchArtifactsTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchArtifactsTask")
            .field("account", &self.definition.account)
            .finish()
    }
}

#[async_trait]
impl Task for FetchArtifactsTask {
    fn name(&self) -> &str {
        "fetchBuildArtifacts"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<TaskResult, TaskError> {
        let Some(job_id) = ctx.job_id() else {
            return Ok(TaskResult::terminal_error(
                "no remote job recorded for this stage",
            ));
        };

        let artifacts = match self
            .client
            .list_artifacts(&self.definition.account, job_id)
            .await
        {
            Ok(artifacts) => artifacts,
            Err(RemoteJobError::Transient { message }) => {
                return Err(TaskError::new(self.name(), message));
            }
            Err(err @ RemoteJobError::Permanent { .. }) => {
                return Ok(TaskResult::terminal_error(err.to_string()));
            }
        };

        debug!(job_id = %job_id, count = artifacts.len(), "listed build artifacts");

        Ok(TaskResult::succeeded_empty()
            .with_value(keys::ARTIFACTS, serde_json::json!(artifacts)))
    }
}
