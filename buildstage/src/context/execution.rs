//! The per-instance execution state of a stage.

use super::{ContextDelta, StageContext};
use crate::tasks::TaskResult;
use parking_lot::RwLock;
use uuid::Uuid;

/// One running (or not yet running, or finished) instance of a stage.
///
/// Holds the stage's identity within its owning pipeline execution and the
/// mutable context threaded through its tasks. The hosting engine is
/// expected to serialize task and cancel invocations per instance; the lock
/// here only makes each individual write (delta merge or wholesale replace)
/// atomic.
#[derive(Debug)]
pub struct StageExecution {
    id: Uuid,
    execution_id: Uuid,
    name: String,
    context: RwLock<StageContext>,
}

impl StageExecution {
    /// Creates a new stage execution with fresh ids.
    #[must_use]
    pub fn new(name: impl Into<String>, context: StageContext) -> Self {
        Self::with_ids(Uuid::new_v4(), Uuid::new_v4(), name, context)
    }

    /// Creates a stage execution with explicit ids.
    #[must_use]
    pub fn with_ids(
        id: Uuid,
        execution_id: Uuid,
        name: impl Into<String>,
        context: StageContext,
    ) -> Self {
        Self {
            id,
            execution_id,
            name: name.into(),
            context: RwLock::new(context),
        }
    }

    /// Returns the stage instance id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the owning pipeline execution id.
    #[must_use]
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a snapshot of the current context.
    #[must_use]
    pub fn context_snapshot(&self) -> StageContext {
        self.context.read().clone()
    }

    /// Merges a task's context delta into the stage context.
    pub fn merge_delta(&self, delta: &ContextDelta) {
        self.context.write().merge(delta);
    }

    /// Merges the delta of a task result into the stage context.
    ///
    /// This is the engine-side half of the task contract: the delta of every
    /// accepted invocation is folded in, whatever its status.
    pub fn apply_result(&self, result: &TaskResult) {
        self.merge_delta(&result.context_delta);
    }

    /// Replaces the entire context. Used by the cancellation path only.
    pub fn replace_context(&self, context: StageContext) {
        *self.context.write() = context;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::keys;
    use crate::tasks::TaskResult;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_assigns_distinct_ids() {
        let stage = StageExecution::new("buildJob", StageContext::new());
        assert_ne!(stage.id(), stage.execution_id());
        assert_eq!(stage.name(), "buildJob");
    }

    #[test]
    fn test_merge_delta_visible_in_snapshot() {
        let stage = StageExecution::new("buildJob", StageContext::new());

        let mut delta = ContextDelta::new();
        delta.insert(keys::JOB_ID.to_string(), serde_json::json!("b-9"));
        stage.merge_delta(&delta);

        assert_eq!(stage.context_snapshot().job_id(), Some("b-9"));
    }

    #[test]
    fn test_apply_result_merges_delta() {
        let stage = StageExecution::new("buildJob", StageContext::new());
        let result =
            TaskResult::running().with_value(keys::BUILD_INFO, serde_json::json!({"status": "QUEUED"}));

        stage.apply_result(&result);

        assert_eq!(
            stage.context_snapshot().build_info().cloned(),
            Some(serde_json::json!({"status": "QUEUED"}))
        );
    }

    #[test]
    fn test_replace_context_drops_previous_keys() {
        let mut initial = StageContext::new();
        initial.insert(keys::JOB_ID, serde_json::json!("b-1"));
        initial.insert(keys::ARTIFACTS, serde_json::json!([]));
        let stage = StageExecution::new("buildJob", initial);

        let mut fresh = StageContext::new();
        fresh.insert(keys::BUILD_INFO, serde_json::json!({"status": "CANCELLED"}));
        stage.replace_context(fresh.clone());

        assert_eq!(stage.context_snapshot(), fresh);
        assert!(!stage.context_snapshot().contains_key(keys::JOB_ID));
    }
}
