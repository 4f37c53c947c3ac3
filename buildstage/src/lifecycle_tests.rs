//! End-to-end stage lifecycle scenarios.
//!
//! These tests stand in for the hosting engine: a minimal sequential loop
//! that threads the context through the declared task graph and re-invokes
//! on `RUNNING`, plus out-of-band cancel calls racing the sequence.

use crate::artifacts::ArtifactRef;
use crate::client::{JobStatus, RemoteJobHandle};
use crate::context::{keys, StageContext, StageExecution};
use crate::definition::StageDefinition;
use crate::errors::RemoteJobError;
use crate::events::CollectingEventSink;
use crate::stage::{BuildJobStage, TaskGraph};
use crate::tasks::{TaskResult, TaskStatus};
use crate::testing::{definition_context, FakeJobClient};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("buildstage=debug")
        .with_test_writer()
        .try_init();
}

/// Drives the graph the way the engine contract describes: sequentially,
/// merging every delta, re-invoking the same task while it reports
/// `RUNNING`. Bails out after a terminal non-success result.
async fn run_stage(graph: &TaskGraph, stage: &StageExecution) -> TaskResult {
    let mut last = TaskResult::succeeded_empty();
    for node in graph {
        loop {
            let result = node
                .task()
                .execute(&stage.context_snapshot())
                .await
                .unwrap_or_else(|err| panic!("unexpected transient error: {err}"));
            stage.apply_result(&result);
            let status = result.status;
            last = result;
            if status != TaskStatus::Running {
                break;
            }
        }
        if last.status != TaskStatus::Succeeded {
            return last;
        }
    }
    last
}

fn scripted_success_client() -> Arc<FakeJobClient> {
    let client = Arc::new(FakeJobClient::new());
    client.enqueue_start(Ok(RemoteJobHandle::new("b-1", JobStatus::Queued)));
    client.enqueue_working_polls("b-1", 3);
    client.enqueue_poll(Ok(RemoteJobHandle::new("b-1", JobStatus::Success)));
    client.enqueue_artifacts(Ok(vec![
        ArtifactRef::new("docker/image", "a1", "registry/a1"),
        ArtifactRef::new("docker/image", "a2", "registry/a2"),
    ]));
    client
}

#[tokio::test]
async fn test_full_success_lifecycle() {
    init_tracing();
    let client = scripted_success_client();
    let stage_def_ctx = definition_context("gcb-account");
    let definition = StageDefinition::from_context(&stage_def_ctx).unwrap();

    let stage = BuildJobStage::new(client.clone());
    let graph = stage.build_task_graph(&definition);
    let execution = StageExecution::new("buildJob", stage_def_ctx);

    let last = run_stage(&graph, &execution).await;
    assert_eq!(last.status, TaskStatus::Succeeded);

    let ctx = execution.context_snapshot();
    assert_eq!(ctx.job_id(), Some("b-1"));
    assert_eq!(
        ctx.build_info().and_then(|i| i.get("status")),
        Some(&serde_json::json!("SUCCESS"))
    );
    let bound = ctx.get(keys::BOUND_ARTIFACTS).unwrap().as_array().unwrap();
    let names: Vec<_> = bound
        .iter()
        .map(|a| a.get("name").unwrap().as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["a1", "a2"]);

    // Three working polls plus the terminal one.
    assert_eq!(client.poll_calls(), 4);
    assert_eq!(client.start_calls(), 1);
}

#[tokio::test]
async fn test_monitor_running_snapshots_are_visible_between_polls() {
    let client = Arc::new(FakeJobClient::new());
    client.enqueue_start(Ok(RemoteJobHandle::new("b-1", JobStatus::Queued)));
    client.enqueue_working_polls("b-1", 1);
    client.enqueue_poll(Ok(RemoteJobHandle::new("b-1", JobStatus::Success)));
    client.enqueue_artifacts(Ok(Vec::new()));

    let ctx = definition_context("gcb-account");
    let definition = StageDefinition::from_context(&ctx).unwrap();
    let stage = BuildJobStage::new(client);
    let graph = stage.build_task_graph(&definition);
    let execution = StageExecution::new("buildJob", ctx);

    run_stage(&graph, &execution).await;

    // The final snapshot overwrote the intermediate WORKING one in place.
    let snapshot = execution.context_snapshot();
    assert_eq!(
        snapshot.build_info().and_then(|i| i.get("status")),
        Some(&serde_json::json!("SUCCESS"))
    );
}

#[tokio::test]
async fn test_remote_failure_stops_sequence_before_fetch() {
    let client = Arc::new(FakeJobClient::new());
    client.enqueue_start(Ok(RemoteJobHandle::new("b-1", JobStatus::Queued)));
    client.enqueue_poll(Ok(RemoteJobHandle::new("b-1", JobStatus::Failure)));

    let ctx = definition_context("gcb-account");
    let definition = StageDefinition::from_context(&ctx).unwrap();
    let stage = BuildJobStage::new(client.clone());
    let graph = stage.build_task_graph(&definition);
    let execution = StageExecution::new("buildJob", ctx);

    let last = run_stage(&graph, &execution).await;

    assert_eq!(last.status, TaskStatus::Failed);
    assert!(last.error.as_deref().unwrap().contains("FAILURE"));
    // Fetch and bind never ran.
    assert_eq!(client.artifact_calls(), 0);
    assert!(!execution.context_snapshot().contains_key(keys::ARTIFACTS));
    // The failing snapshot is still reported.
    assert_eq!(
        execution.context_snapshot().build_info().and_then(|i| i.get("status")),
        Some(&serde_json::json!("FAILURE"))
    );
}

#[tokio::test]
async fn test_bind_runs_only_after_fetch_succeeded() {
    let client = scripted_success_client();
    let ctx = definition_context("gcb-account");
    let definition = StageDefinition::from_context(&ctx).unwrap();
    let stage = BuildJobStage::new(client);
    let graph = stage.build_task_graph(&definition);
    let execution = StageExecution::new("buildJob", ctx);

    for node in &graph {
        if node.name() == "bindBuildArtifacts" {
            // Everything before bind has completed; artifacts are in place.
            assert!(execution.context_snapshot().contains_key(keys::ARTIFACTS));
        }
        loop {
            let result = node.task().execute(&execution.context_snapshot()).await.unwrap();
            execution.apply_result(&result);
            if result.status != TaskStatus::Running {
                assert_eq!(result.status, TaskStatus::Succeeded);
                break;
            }
        }
    }

    assert!(execution
        .context_snapshot()
        .contains_key(keys::BOUND_ARTIFACTS));
}

#[tokio::test]
async fn test_cancel_while_monitor_in_flight() {
    init_tracing();
    let client = Arc::new(FakeJobClient::new());
    client.enqueue_start(Ok(RemoteJobHandle::new("b-1", JobStatus::Queued)));
    client.enqueue_working_polls("b-1", 8);
    client.enqueue_stop(Ok(RemoteJobHandle::new("b-1", JobStatus::Cancelled)));

    let ctx = definition_context("gcb-account");
    let definition = StageDefinition::from_context(&ctx).unwrap();
    let sink = Arc::new(CollectingEventSink::new());
    let stage = BuildJobStage::with_event_sink(client.clone(), sink);
    let graph = stage.build_task_graph(&definition);
    let execution = StageExecution::new("buildJob", ctx);

    // Start, then a couple of monitor polls.
    let start_node = graph.iter().next().unwrap();
    let result = start_node.task().execute(&execution.context_snapshot()).await.unwrap();
    execution.apply_result(&result);
    let monitor_node = graph.iter().nth(1).unwrap();
    for _ in 0..2 {
        let result = monitor_node
            .task()
            .execute(&execution.context_snapshot())
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Running);
        execution.apply_result(&result);
    }

    // Out-of-band cancel instead of the next poll.
    let cancelled = stage.cancel(&execution).await;

    assert_eq!(
        cancelled.context.keys(),
        vec![keys::BUILD_INFO.to_string()]
    );
    assert_eq!(
        cancelled.context.build_info().and_then(|i| i.get("status")),
        Some(&serde_json::json!("CANCELLED"))
    );
    assert!(!cancelled.context.contains_key(keys::JOB_ID));
    assert_eq!(client.stop_calls(), 1);
}

#[tokio::test]
async fn test_cancel_after_stage_finished_still_returns_result() {
    let client = scripted_success_client();
    client.enqueue_stop(Ok(RemoteJobHandle::new("b-1", JobStatus::Success)));

    let ctx = definition_context("gcb-account");
    let definition = StageDefinition::from_context(&ctx).unwrap();
    let stage = BuildJobStage::new(client);
    let graph = stage.build_task_graph(&definition);
    let execution = StageExecution::new("buildJob", ctx);

    run_stage(&graph, &execution).await;
    let cancelled = stage.cancel(&execution).await;

    // The finished stage's context collapses to the last remote snapshot.
    assert_eq!(
        cancelled.context.keys(),
        vec![keys::BUILD_INFO.to_string()]
    );
}

#[tokio::test]
async fn test_cancel_with_unreachable_service_reports_previous_context() {
    let client = Arc::new(FakeJobClient::new());
    client.enqueue_start(Ok(RemoteJobHandle::new("b-1", JobStatus::Queued)));
    client.enqueue_stop(Err(RemoteJobError::transient("service unreachable")));

    let ctx = definition_context("gcb-account");
    let definition = StageDefinition::from_context(&ctx).unwrap();
    let stage = BuildJobStage::new(client);
    let graph = stage.build_task_graph(&definition);
    let execution = StageExecution::new("buildJob", ctx);

    let start_node = graph.iter().next().unwrap();
    let result = start_node.task().execute(&execution.context_snapshot()).await.unwrap();
    execution.apply_result(&result);
    let before = execution.context_snapshot();

    let cancelled = stage.cancel(&execution).await;

    assert_eq!(cancelled.context, before);
    assert_eq!(cancelled.context.job_id(), Some("b-1"));
}

#[tokio::test]
async fn test_cancel_before_start_has_no_side_effects() {
    let client = Arc::new(FakeJobClient::new());
    let stage = BuildJobStage::new(client.clone());
    let execution = StageExecution::new("buildJob", StageContext::new());

    let first = stage.cancel(&execution).await;
    let second = stage.cancel(&execution).await;

    assert!(first.context.is_empty());
    assert_eq!(second.context, first.context);
    assert_eq!(client.total_calls(), 0);
}
