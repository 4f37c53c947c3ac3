//! The consumed interface of the remote build service.
//!
//! The service itself (HTTP/gRPC transport, auth, its own retry policy) is
//! an external collaborator; this module only defines the calls the stage
//! needs and the job snapshot they return.

use crate::artifacts::ArtifactRef;
use crate::errors::RemoteJobError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle status reported by the remote build service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Status has not been reported yet.
    Unknown,
    /// Accepted but not yet executing.
    Queued,
    /// Currently executing.
    Working,
    /// Finished successfully.
    Success,
    /// Finished with a build failure.
    Failure,
    /// The service failed internally while running the job.
    InternalError,
    /// The job exceeded its time allowance.
    Timeout,
    /// The job was stopped before completion.
    Cancelled,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::Queued => write!(f, "QUEUED"),
            Self::Working => write!(f, "WORKING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
            Self::InternalError => write!(f, "INTERNAL_ERROR"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl JobStatus {
    /// Returns true if no further progress will occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failure | Self::InternalError | Self::Timeout | Self::Cancelled
        )
    }

    /// Returns true if the job finished successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Last-known snapshot of a remote build job.
///
/// The job's state lives in the remote service; this handle merely mirrors
/// it. Any extra metadata the service reports rides along untyped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteJobHandle {
    /// External id assigned by the remote service.
    pub id: String,
    /// Reported lifecycle status.
    #[serde(default)]
    pub status: JobStatus,
    /// Additional build metadata (log URLs, timings, ...).
    #[serde(flatten, default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RemoteJobHandle {
    /// Creates a handle with no extra metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Renders the handle as the JSON value stored under `buildInfo`.
    #[must_use]
    pub fn build_info(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Client for the external build service.
///
/// All calls are single synchronous round trips from the stage's point of
/// view; timeouts and transport retries belong to the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteJobClient: Send + Sync {
    /// Submits a new build job. Returns its handle.
    async fn start(
        &self,
        account: &str,
        spec: &serde_json::Value,
    ) -> Result<RemoteJobHandle, RemoteJobError>;

    /// Polls the current status of a job.
    async fn poll(&self, account: &str, job_id: &str) -> Result<RemoteJobHandle, RemoteJobError>;

    /// Requests that a job be stopped. Returns the post-stop snapshot.
    async fn stop(&self, account: &str, job_id: &str) -> Result<RemoteJobHandle, RemoteJobError>;

    /// Lists the artifacts produced by a job.
    async fn list_artifacts(
        &self,
        account: &str,
        job_id: &str,
    ) -> Result<Vec<ArtifactRef>, RemoteJobError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_terminal_partition() {
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failure.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Timeout.is_terminal());
        assert!(JobStatus::InternalError.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Working.is_terminal());
        assert!(!JobStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_status_success_only_on_success() {
        assert!(JobStatus::Success.is_success());
        assert!(!JobStatus::Cancelled.is_success());
        assert!(!JobStatus::Working.is_success());
    }

    #[test]
    fn test_status_serde_screaming_snake() {
        let json = serde_json::to_string(&JobStatus::InternalError).unwrap();
        assert_eq!(json, r#""INTERNAL_ERROR""#);

        let status: JobStatus = serde_json::from_str(r#""WORKING""#).unwrap();
        assert_eq!(status, JobStatus::Working);
    }

    #[test]
    fn test_handle_build_info_shape() {
        let handle = RemoteJobHandle::new("b-1", JobStatus::Success)
            .with_metadata("logUrl", serde_json::json!("https://logs/b-1"));

        let info = handle.build_info();
        assert_eq!(info.get("id"), Some(&serde_json::json!("b-1")));
        assert_eq!(info.get("status"), Some(&serde_json::json!("SUCCESS")));
        assert_eq!(info.get("logUrl"), Some(&serde_json::json!("https://logs/b-1")));
    }

    #[test]
    fn test_handle_deserializes_flattened_metadata() {
        let handle: RemoteJobHandle = serde_json::from_value(serde_json::json!({
            "id": "b-2",
            "status": "QUEUED",
            "queuePosition": 4
        }))
        .unwrap();

        assert_eq!(handle.status, JobStatus::Queued);
        assert_eq!(
            handle.metadata.get("queuePosition"),
            Some(&serde_json::json!(4))
        );
    }
}
