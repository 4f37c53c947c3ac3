//! Task that binds listed artifacts into the pipeline's artifact namespace.

use super::{Task, TaskResult};
use crate::artifacts::{bind_artifacts, ArtifactRef};
use crate::context::{keys, StageContext};
use crate::definition::StageDefinition;
use crate::errors::TaskError;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves the fetched artifacts against the stage's expectations.
///
/// Purely a context transformation: no external I/O. The matched set is
/// written under `boundArtifacts`.
#[derive(Debug)]
pub struct BindArtifactsTask {
    definition: Arc<StageDefinition>,
}

impl BindArtifactsTask {
    /// Creates a new bind task.
    #[must_use]
    pub fn new(definition: Arc<StageDefinition>) -> Self {
        Self { definition }
    }
}

#[async_trait]
impl Task for BindArtifactsTask {
    fn name(&self) -> &str {
        "bindBuildArtifacts"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<TaskResult, TaskError> {
        let produced: Vec<ArtifactRef> = match ctx.get_as(keys::ARTIFACTS) {
            Ok(Some(artifacts)) => artifacts,
            Ok(None) => Vec::new(),
            Err(err) => {
                return Ok(TaskResult::terminal_error(format!(
                    "malformed artifacts in context: {err}"
                )));
            }
        };

        match bind_artifacts(&produced, &self.definition.expected_artifacts) {
            Ok(bound) => Ok(TaskResult::succeeded_empty()
                .with_value(keys::BOUND_ARTIFACTS, serde_json::json!(bound))),
            Err(err) => Ok(TaskResult::terminal_error(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactMatcher;
    use crate::tasks::TaskStatus;
    use pretty_assertions::assert_eq;

    fn definition(expected: Vec<ArtifactMatcher>) -> Arc<StageDefinition> {
        Arc::new(StageDefinition {
            account: "gcb-account".to_string(),
            job_spec: serde_json::json!({}),
            expected_artifacts: expected,
        })
    }

    fn ctx_with_artifacts() -> StageContext {
        let mut ctx = StageContext::new();
        ctx.insert(
            keys::ARTIFACTS,
            serde_json::json!([
                {"type": "docker/image", "name": "a1", "reference": "registry/a1"},
                {"type": "docker/image", "name": "a2", "reference": "registry/a2"}
            ]),
        );
        ctx
    }

    #[tokio::test]
    async fn test_binds_everything_without_expectations() {
        let task = BindArtifactsTask::new(definition(Vec::new()));
        let result = task.execute(&ctx_with_artifacts()).await.unwrap();

        assert_eq!(result.status, TaskStatus::Succeeded);
        let bound = result.get(keys::BOUND_ARTIFACTS).unwrap();
        assert_eq!(bound.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_binds_matching_subset() {
        let task = BindArtifactsTask::new(definition(vec![ArtifactMatcher::named("a2")]));
        let result = task.execute(&ctx_with_artifacts()).await.unwrap();

        let bound = result.get(keys::BOUND_ARTIFACTS).unwrap();
        let names: Vec<_> = bound
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a.get("name").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a2"]);
    }

    #[tokio::test]
    async fn test_unmatched_expectation_is_terminal() {
        let task = BindArtifactsTask::new(definition(vec![ArtifactMatcher::named("missing")]));
        let result = task.execute(&ctx_with_artifacts()).await.unwrap();

        assert_eq!(result.status, TaskStatus::TerminalError);
        assert!(result.error.as_deref().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_no_artifacts_key_binds_empty_set() {
        let task = BindArtifactsTask::new(definition(Vec::new()));
        let result = task.execute(&StageContext::new()).await.unwrap();

        assert_eq!(result.status, TaskStatus::Succeeded);
        let bound = result.get(keys::BOUND_ARTIFACTS).unwrap();
        assert!(bound.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_artifacts_is_terminal() {
        let mut ctx = StageContext::new();
        ctx.insert(keys::ARTIFACTS, serde_json::json!("not-a-list"));

        let task = BindArtifactsTask::new(definition(Vec::new()));
        let result = task.execute(&ctx).await.unwrap();

        assert_eq!(result.status, TaskStatus::TerminalError);
    }
}
