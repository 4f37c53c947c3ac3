//! Stage context: the key-value state threaded through a stage's tasks.

mod execution;

pub use execution::StageExecution;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known context keys.
///
/// The key strings match the remote build service's JSON conventions so the
/// context can be persisted and reported without renaming.
pub mod keys {
    /// External id of the remote build job.
    pub const JOB_ID: &str = "jobId";
    /// Last known snapshot of the remote build's metadata.
    pub const BUILD_INFO: &str = "buildInfo";
    /// Artifacts listed from the completed build.
    pub const ARTIFACTS: &str = "artifacts";
    /// Artifacts after binding against the stage's expectations.
    pub const BOUND_ARTIFACTS: &str = "boundArtifacts";
    /// Account used to reach the remote build service.
    pub const ACCOUNT: &str = "account";
    /// The job specification submitted to the remote service.
    pub const JOB_SPEC: &str = "jobSpec";
    /// Artifact expectations driving the bind step.
    pub const EXPECTED_ARTIFACTS: &str = "expectedArtifacts";
}

/// A delta of context keys produced by a single task invocation.
pub type ContextDelta = HashMap<String, serde_json::Value>;

/// The mutable key-value state of one stage instance.
///
/// Tasks never mutate the context directly; they return a [`ContextDelta`]
/// that the hosting engine merges in after each invocation. Cancellation is
/// the one path that replaces the context wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageContext {
    data: HashMap<String, serde_json::Value>,
}

impl StageContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from existing data.
    #[must_use]
    pub fn from_data(data: HashMap<String, serde_json::Value>) -> Self {
        Self { data }
    }

    /// Gets a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Gets a string value by key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Deserializes the value under `key` into `T`.
    ///
    /// Returns `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the stored value has the wrong shape.
    pub fn get_as<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, serde_json::Error> {
        self.data
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }

    /// Returns the external job id, if one has been recorded.
    #[must_use]
    pub fn job_id(&self) -> Option<&str> {
        self.get_str(keys::JOB_ID)
    }

    /// Returns the last known build info snapshot, if any.
    #[must_use]
    pub fn build_info(&self) -> Option<&serde_json::Value> {
        self.get(keys::BUILD_INFO)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Inserts a value, overwriting any previous value under the key.
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Merges a delta into the context. Last write wins per key.
    pub fn merge(&mut self, delta: &ContextDelta) {
        for (key, value) in delta {
            self.data.insert(key.clone(), value.clone());
        }
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Renders the context as a JSON object value.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Consumes the context, returning the underlying map.
    #[must_use]
    pub fn into_data(self) -> HashMap<String, serde_json::Value> {
        self.data
    }
}

impl FromIterator<(String, serde_json::Value)> for StageContext {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_and_get() {
        let mut ctx = StageContext::new();
        ctx.insert(keys::JOB_ID, serde_json::json!("b-1"));

        assert_eq!(ctx.job_id(), Some("b-1"));
        assert_eq!(ctx.get_str(keys::JOB_ID), Some("b-1"));
        assert!(ctx.contains_key(keys::JOB_ID));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut ctx = StageContext::new();
        ctx.insert("a", serde_json::json!(1));

        let mut delta = ContextDelta::new();
        delta.insert("a".to_string(), serde_json::json!(2));
        delta.insert("b".to_string(), serde_json::json!("x"));
        ctx.merge(&delta);

        assert_eq!(ctx.get("a"), Some(&serde_json::json!(2)));
        assert_eq!(ctx.get("b"), Some(&serde_json::json!("x")));
    }

    #[test]
    fn test_merge_preserves_untouched_keys() {
        let mut ctx = StageContext::new();
        ctx.insert(keys::JOB_ID, serde_json::json!("b-1"));

        let mut delta = ContextDelta::new();
        delta.insert(keys::BUILD_INFO.to_string(), serde_json::json!({"status": "WORKING"}));
        ctx.merge(&delta);

        assert_eq!(ctx.job_id(), Some("b-1"));
        assert_eq!(
            ctx.build_info(),
            Some(&serde_json::json!({"status": "WORKING"}))
        );
    }

    #[test]
    fn test_get_as_typed() {
        let mut ctx = StageContext::new();
        ctx.insert("count", serde_json::json!(3));

        let count: Option<u32> = ctx.get_as("count").unwrap();
        assert_eq!(count, Some(3));

        let missing: Option<u32> = ctx.get_as("absent").unwrap();
        assert_eq!(missing, None);

        let wrong: Result<Option<String>, _> = ctx.get_as("count");
        assert!(wrong.is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let ctx: StageContext =
            serde_json::from_value(serde_json::json!({"jobId": "b-2"})).unwrap();
        assert_eq!(ctx.job_id(), Some("b-2"));

        let round = serde_json::to_value(&ctx).unwrap();
        assert_eq!(round, serde_json::json!({"jobId": "b-2"}));
    }
}
