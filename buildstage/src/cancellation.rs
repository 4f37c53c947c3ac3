//! Out-of-band cancellation of a build stage.
//!
//! Cancellation races with (or substitutes for) the normal task sequence
//! and must tolerate the remote job being in any lifecycle state. From the
//! scheduler's point of view it is terminal, idempotent, and best-effort:
//! it never raises, always returns, and leaves the context in one of
//! exactly two shapes — reset to `{buildInfo}` or unchanged.

use crate::context::{keys, ContextDelta, StageContext, StageExecution};
use crate::events::{self, EventSink};
use crate::tasks::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// The result of cancelling a stage. Always produced, even when the remote
/// stop call failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationResult {
    /// Id of the cancelled stage instance.
    pub stage_id: Uuid,
    /// Id of the owning pipeline execution.
    pub execution_id: Uuid,
    /// The stage context after cancellation: `{buildInfo}` when the stop
    /// call succeeded, otherwise whatever it was before.
    pub context: StageContext,
    /// When the cancellation was processed.
    pub cancelled_at: DateTime<Utc>,
}

/// Outcome of the remote stop attempt, folded from every failure mode.
/// Nothing unwinds past the cancel boundary.
enum StopOutcome {
    Stopped(ContextDelta),
    Failed(String),
}

/// Interrupts a stage that may be anywhere in its lifecycle.
pub struct CancellationController {
    stop_task: Arc<dyn Task>,
    events: Arc<dyn EventSink>,
}

impl CancellationController {
    /// Creates a controller around the given stop task.
    #[must_use]
    pub fn new(stop_task: Arc<dyn Task>, events: Arc<dyn EventSink>) -> Self {
        Self { stop_task, events }
    }

    /// Cancels the stage.
    ///
    /// Invokes the remote stop through the same task abstraction the normal
    /// sequence uses. On success the stage's context is replaced wholesale
    /// with `{buildInfo}` taken from the stop result; every other
    /// accumulated key is intentionally dropped so a cancelled stage
    /// reports last known remote state only. On any failure the error is
    /// logged and swallowed and the context is left untouched.
    pub async fn cancel(&self, stage: &StageExecution) -> CancellationResult {
        let snapshot = stage.context_snapshot();
        info!(
            stage_id = %stage.id(),
            execution_id = %stage.execution_id(),
            context = %snapshot.to_value(),
            "cancelling stage"
        );
        self.events.try_emit(
            events::CANCEL_REQUESTED,
            Some(serde_json::json!({
                "stageId": stage.id(),
                "executionId": stage.execution_id(),
            })),
        );

        let outcome = match self.stop_task.execute(&snapshot).await {
            Ok(result) if result.status == TaskStatus::Succeeded => {
                StopOutcome::Stopped(result.context_delta)
            }
            Ok(result) => StopOutcome::Failed(
                result
                    .error
                    .unwrap_or_else(|| format!("stop task returned {}", result.status)),
            ),
            Err(err) => StopOutcome::Failed(err.to_string()),
        };

        match outcome {
            StopOutcome::Stopped(delta) => {
                let build_info = delta
                    .get(keys::BUILD_INFO)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                let mut fresh = StageContext::new();
                fresh.insert(keys::BUILD_INFO, build_info.clone());
                stage.replace_context(fresh);

                self.events.try_emit(
                    events::CANCEL_COMPLETED,
                    Some(serde_json::json!({
                        "stageId": stage.id(),
                        "buildInfo": build_info,
                    })),
                );
            }
            StopOutcome::Failed(reason) => {
                error!(
                    stage_id = %stage.id(),
                    execution_id = %stage.execution_id(),
                    error = %reason,
                    "failed to stop remote job while cancelling stage"
                );
                self.events.try_emit(
                    events::CANCEL_STOP_FAILED,
                    Some(serde_json::json!({
                        "stageId": stage.id(),
                        "error": reason,
                    })),
                );
            }
        }

        CancellationResult {
            stage_id: stage.id(),
            execution_id: stage.execution_id(),
            context: stage.context_snapshot(),
            cancelled_at: Utc::now(),
        }
    }
}
