//! Test doubles and fixtures for stage lifecycle tests.
//!
//! [`FakeJobClient`] is a scripted client: each method pops the next queued
//! response, so multi-step scenarios (poll returning `WORKING` three times
//! and then `SUCCESS`) read as a script. For single-call expectations the
//! mockall mock generated on [`crate::client::RemoteJobClient`] is usually
//! the better fit.

use crate::artifacts::ArtifactRef;
use crate::client::{JobStatus, RemoteJobClient, RemoteJobHandle};
use crate::context::{keys, StageContext};
use crate::errors::RemoteJobError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

type Scripted<T> = Mutex<VecDeque<Result<T, RemoteJobError>>>;

/// A scripted remote job client.
///
/// Responses are consumed in FIFO order per method; the last queued poll
/// response is repeated once the queue runs dry, so a monitor loop can keep
/// observing the final state. Running out of responses on any other method
/// is reported as a permanent error naming the method.
#[derive(Debug, Default)]
pub struct FakeJobClient {
    start_responses: Scripted<RemoteJobHandle>,
    poll_responses: Scripted<RemoteJobHandle>,
    stop_responses: Scripted<RemoteJobHandle>,
    artifact_responses: Scripted<Vec<ArtifactRef>>,
    last_poll: Mutex<Option<Result<RemoteJobHandle, RemoteJobError>>>,
    start_calls: Mutex<usize>,
    poll_calls: Mutex<usize>,
    stop_calls: Mutex<usize>,
    artifact_calls: Mutex<usize>,
}

impl FakeJobClient {
    /// Creates a new fake with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `start`.
    pub fn enqueue_start(&self, response: Result<RemoteJobHandle, RemoteJobError>) {
        self.start_responses.lock().push_back(response);
    }

    /// Queues a response for `poll`.
    pub fn enqueue_poll(&self, response: Result<RemoteJobHandle, RemoteJobError>) {
        self.poll_responses.lock().push_back(response);
    }

    /// Queues `count` copies of a `WORKING` poll response for `job_id`.
    pub fn enqueue_working_polls(&self, job_id: &str, count: usize) {
        for _ in 0..count {
            self.enqueue_poll(Ok(RemoteJobHandle::new(job_id, JobStatus::Working)));
        }
    }

    /// Queues a response for `stop`.
    pub fn enqueue_stop(&self, response: Result<RemoteJobHandle, RemoteJobError>) {
        self.stop_responses.lock().push_back(response);
    }

    /// Queues a response for `list_artifacts`.
    pub fn enqueue_artifacts(&self, response: Result<Vec<ArtifactRef>, RemoteJobError>) {
        self.artifact_responses.lock().push_back(response);
    }

    /// Number of `start` calls observed.
    #[must_use]
    pub fn start_calls(&self) -> usize {
        *self.start_calls.lock()
    }

    /// Number of `poll` calls observed.
    #[must_use]
    pub fn poll_calls(&self) -> usize {
        *self.poll_calls.lock()
    }

    /// Number of `stop` calls observed.
    #[must_use]
    pub fn stop_calls(&self) -> usize {
        *self.stop_calls.lock()
    }

    /// Number of `list_artifacts` calls observed.
    #[must_use]
    pub fn artifact_calls(&self) -> usize {
        *self.artifact_calls.lock()
    }

    /// Total calls observed across all methods.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.start_calls() + self.poll_calls() + self.stop_calls() + self.artifact_calls()
    }

    fn exhausted(method: &str) -> RemoteJobError {
        RemoteJobError::permanent(format!("no scripted response for {method}"))
    }
}

#[async_trait]
impl RemoteJobClient for FakeJobClient {
    async fn start(
        &self,
        _account: &str,
        _spec: &serde_json::Value,
    ) -> Result<RemoteJobHandle, RemoteJobError> {
        *self.start_calls.lock() += 1;
        self.start_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("start")))
    }

    async fn poll(&self, _account: &str, _job_id: &str) -> Result<RemoteJobHandle, RemoteJobError> {
        *self.poll_calls.lock() += 1;
        let response = self.poll_responses.lock().pop_front();
        match response {
            Some(response) => {
                *self.last_poll.lock() = Some(response.clone());
                response
            }
            None => self
                .last_poll
                .lock()
                .clone()
                .unwrap_or_else(|| Err(Self::exhausted("poll"))),
        }
    }

    async fn stop(&self, _account: &str, _job_id: &str) -> Result<RemoteJobHandle, RemoteJobError> {
        *self.stop_calls.lock() += 1;
        self.stop_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("stop")))
    }

    async fn list_artifacts(
        &self,
        _account: &str,
        _job_id: &str,
    ) -> Result<Vec<ArtifactRef>, RemoteJobError> {
        *self.artifact_calls.lock() += 1;
        self.artifact_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("list_artifacts")))
    }
}

/// Builds a context carrying a minimal valid stage definition.
#[must_use]
pub fn definition_context(account: &str) -> StageContext {
    let mut ctx = StageContext::new();
    ctx.insert(keys::ACCOUNT, serde_json::json!(account));
    ctx.insert(keys::JOB_SPEC, serde_json::json!({"steps": [{"name": "builder"}]}));
    ctx
}
