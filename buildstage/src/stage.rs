//! The build stage facade: graph declaration and cancellation.

use crate::cancellation::{CancellationController, CancellationResult};
use crate::client::RemoteJobClient;
use crate::context::StageExecution;
use crate::definition::StageDefinition;
use crate::events::{EventSink, NoOpEventSink};
use crate::tasks::{
    BindArtifactsTask, FetchArtifactsTask, MonitorJobTask, StartJobTask, StopJobTask, Task,
};
use std::fmt;
use std::sync::Arc;

/// One named node of a stage's task graph.
#[derive(Clone)]
pub struct TaskNode {
    name: String,
    task: Arc<dyn Task>,
}

impl TaskNode {
    /// Creates a new task node.
    #[must_use]
    pub fn new(name: impl Into<String>, task: Arc<dyn Task>) -> Self {
        Self {
            name: name.into(),
            task,
        }
    }

    /// Returns the node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the task.
    #[must_use]
    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode").field("name", &self.name).finish()
    }
}

/// An ordered task list declared to the hosting engine.
///
/// The sequence is data, not branching logic: the engine executes nodes in
/// order, threading the stage context through each.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
}

impl TaskGraph {
    /// Creates a graph from an ordered node list.
    #[must_use]
    pub fn new(nodes: Vec<TaskNode>) -> Self {
        Self { nodes }
    }

    /// Iterates over the nodes in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, TaskNode> {
        self.nodes.iter()
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node names in execution order.
    #[must_use]
    pub fn task_names(&self) -> Vec<&str> {
        self.nodes.iter().map(TaskNode::name).collect()
    }
}

impl<'a> IntoIterator for &'a TaskGraph {
    type Item = &'a TaskNode;
    type IntoIter = std::slice::Iter<'a, TaskNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The orchestrated build stage.
///
/// Exposes the two interfaces the hosting engine consumes: the declarative
/// task graph (start, monitor, fetch, bind — fixed and sequential) and the
/// out-of-band cancel operation, callable at any point in the stage's
/// lifetime.
pub struct BuildJobStage {
    client: Arc<dyn RemoteJobClient>,
    controller: CancellationController,
}

impl BuildJobStage {
    /// Creates a stage with the default (no-op) event sink.
    #[must_use]
    pub fn new(client: Arc<dyn RemoteJobClient>) -> Self {
        Self::with_event_sink(client, Arc::new(NoOpEventSink))
    }

    /// Creates a stage emitting cancellation events to the given sink.
    #[must_use]
    pub fn with_event_sink(client: Arc<dyn RemoteJobClient>, events: Arc<dyn EventSink>) -> Self {
        let stop_task: Arc<dyn Task> = Arc::new(StopJobTask::new(client.clone()));
        Self {
            client,
            controller: CancellationController::new(stop_task, events),
        }
    }

    /// Declares the ordered task sequence for one stage instance.
    ///
    /// Pure declaration, no execution. The definition is parsed once by the
    /// caller and handed read-only to every task.
    #[must_use]
    pub fn build_task_graph(&self, definition: &StageDefinition) -> TaskGraph {
        let definition = Arc::new(definition.clone());
        TaskGraph::new(vec![
            TaskNode::new(
                "startRemoteBuild",
                Arc::new(StartJobTask::new(definition.clone(), self.client.clone())),
            ),
            TaskNode::new(
                "monitorRemoteBuild",
                Arc::new(MonitorJobTask::new(definition.clone(), self.client.clone())),
            ),
            TaskNode::new(
                "fetchBuildArtifacts",
                Arc::new(FetchArtifactsTask::new(
                    definition.clone(),
                    self.client.clone(),
                )),
            ),
            TaskNode::new(
                "bindBuildArtifacts",
                Arc::new(BindArtifactsTask::new(definition)),
            ),
        ])
    }

    /// Cancels a stage instance. Never raises; see [`CancellationController`].
    pub async fn cancel(&self, stage: &StageExecution) -> CancellationResult {
        self.controller.cancel(stage).await
    }
}

impl fmt::Debug for BuildJobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildJobStage").finish()
    }
}
