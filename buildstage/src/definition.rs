//! Stage definition: the immutable configuration of one build stage.

use crate::artifacts::ArtifactMatcher;
use crate::context::StageContext;
use crate::errors::DefinitionError;
use serde::{Deserialize, Serialize};

/// Immutable configuration parsed from the stage context at graph-build
/// time.
///
/// Read-only input to tasks. Unknown context keys are ignored so the
/// definition can be parsed out of a context that also carries task output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDefinition {
    /// Account used to reach the remote build service.
    pub account: String,

    /// The job specification submitted verbatim to the remote service.
    pub job_spec: serde_json::Value,

    /// Expectations driving the artifact bind step. Empty binds everything.
    #[serde(default)]
    pub expected_artifacts: Vec<ArtifactMatcher>,
}

impl StageDefinition {
    /// Parses the definition out of a stage context.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] when required keys are missing or have
    /// the wrong shape.
    pub fn from_context(ctx: &StageContext) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_value(ctx.to_value())?)
    }
}
