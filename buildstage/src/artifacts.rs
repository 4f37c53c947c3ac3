//! Artifact descriptors and the binding policy applied after a build.

use crate::errors::BindError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Reference to an artifact produced by a remote build.
///
/// The artifact's bytes live wherever the build service put them; this is
/// only the descriptor carried through the stage context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    /// The type of artifact (e.g., "docker/image", "gcs/object").
    #[serde(rename = "type")]
    pub artifact_type: String,

    /// The artifact name.
    pub name: String,

    /// Location of the artifact (URL, registry reference, ...).
    pub reference: String,

    /// Version or digest, when the service reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Additional metadata about the artifact.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ArtifactRef {
    /// Creates a new artifact reference.
    #[must_use]
    pub fn new(
        artifact_type: impl Into<String>,
        name: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            artifact_type: artifact_type.into(),
            name: name.into(),
            reference: reference.into(),
            version: None,
            metadata: HashMap::new(),
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Expectation matched against produced artifacts during binding.
///
/// A field left as `None` matches anything; a matcher with both fields
/// `None` matches every artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMatcher {
    /// Required artifact type, if any.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,

    /// Required artifact name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ArtifactMatcher {
    /// Creates a matcher on artifact type only.
    #[must_use]
    pub fn of_type(artifact_type: impl Into<String>) -> Self {
        Self {
            artifact_type: Some(artifact_type.into()),
            name: None,
        }
    }

    /// Creates a matcher on artifact name only.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            artifact_type: None,
            name: Some(name.into()),
        }
    }

    /// Returns true if the artifact satisfies this expectation.
    #[must_use]
    pub fn matches(&self, artifact: &ArtifactRef) -> bool {
        let type_ok = self
            .artifact_type
            .as_deref()
            .map_or(true, |t| t == artifact.artifact_type);
        let name_ok = self.name.as_deref().map_or(true, |n| n == artifact.name);
        type_ok && name_ok
    }
}

impl fmt::Display for ArtifactMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{type: {}, name: {}}}",
            self.artifact_type.as_deref().unwrap_or("*"),
            self.name.as_deref().unwrap_or("*")
        )
    }
}

/// Resolves produced artifacts against the stage's expectations.
///
/// An empty expectation list binds every produced artifact. Otherwise each
/// matcher must find at least one produced artifact; the bound set is the
/// matched artifacts in production order, without duplicates.
///
/// # Errors
///
/// Returns [`BindError`] naming the first expectation with no match.
pub fn bind_artifacts(
    produced: &[ArtifactRef],
    expected: &[ArtifactMatcher],
) -> Result<Vec<ArtifactRef>, BindError> {
    if expected.is_empty() {
        return Ok(produced.to_vec());
    }

    let mut matched = vec![false; produced.len()];
    for matcher in expected {
        let mut hit = false;
        for (i, artifact) in produced.iter().enumerate() {
            if matcher.matches(artifact) {
                matched[i] = true;
                hit = true;
            }
        }
        if !hit {
            return Err(BindError::new(matcher.to_string()));
        }
    }

    Ok(produced
        .iter()
        .zip(matched)
        .filter_map(|(artifact, hit)| hit.then(|| artifact.clone()))
        .collect())
}
