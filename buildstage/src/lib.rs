//! # Buildstage
//!
//! Core for one orchestrated pipeline stage that drives an external,
//! long-running build job through its full lifecycle: start the job, poll
//! it to completion, retrieve produced artifacts, and bind them into the
//! execution's context.
//!
//! The stage exposes exactly two surfaces to a hosting pipeline engine:
//!
//! - **A declarative task graph**: an ordered sequence of stateless task
//!   units (start → monitor → fetch → bind), each a pure
//!   `execute(context) -> TaskResult` call whose context delta the engine
//!   merges after every invocation.
//! - **An out-of-band cancel operation**: best-effort, idempotent, and
//!   infallible from the scheduler's point of view. It stops the remote
//!   job if it can, resets the stage context to the last known remote
//!   state, and swallows every failure along the way.
//!
//! Scheduling, retry/backoff, and persistence belong to the hosting
//! engine; the remote build service is reached only through the
//! [`client::RemoteJobClient`] trait.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use buildstage::prelude::*;
//!
//! let stage = BuildJobStage::new(client);
//! let definition = StageDefinition::from_context(&context)?;
//! let graph = stage.build_task_graph(&definition);
//!
//! // The engine executes graph nodes in order, re-invoking on RUNNING.
//! // At any point it may instead call:
//! let result = stage.cancel(&execution).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod artifacts;
pub mod cancellation;
pub mod client;
pub mod context;
pub mod definition;
pub mod errors;
pub mod events;
pub mod stage;
pub mod tasks;
pub mod testing;

#[cfg(test)]
mod lifecycle_tests;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifacts::{bind_artifacts, ArtifactMatcher, ArtifactRef};
    pub use crate::cancellation::{CancellationController, CancellationResult};
    pub use crate::client::{JobStatus, RemoteJobClient, RemoteJobHandle};
    pub use crate::context::{keys, ContextDelta, StageContext, StageExecution};
    pub use crate::definition::StageDefinition;
    pub use crate::errors::{BindError, DefinitionError, RemoteJobError, TaskError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::stage::{BuildJobStage, TaskGraph, TaskNode};
    pub use crate::tasks::{
        BindArtifactsTask, FetchArtifactsTask, MonitorJobTask, StartJobTask, StopJobTask, Task,
        TaskResult, TaskStatus,
    };
}
