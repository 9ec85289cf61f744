//! Stable error codes shared by every pipeline error type.
//!
//! Codes serialize as `snake_case` strings and never change meaning once
//! published, so callers can match on them instead of parsing messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // ─── Construction ───────────────────────────────────────────────────
    /// The pipeline was given no steps at all.
    EmptyPipeline,
    /// The topology itself is malformed (no stages, bad parallel layout).
    InvalidTopology,
    /// A role required by the topology has no step.
    MissingStep,
    /// A step was supplied for a role the topology does not have.
    UnexpectedStep,
    /// A single-step role was given more than one step.
    DuplicateStep,

    // ─── Compatibility (build) ──────────────────────────────────────────
    /// Producer and consumer disagree on the kind of value on an edge.
    KindMismatch,
    /// Producer and consumer disagree on vector dimensionality.
    DimensionMismatch,
    /// Producer and consumer disagree on an item count.
    CountMismatch,
    /// A merge step does not accept the number of incoming branches.
    BranchCountMismatch,
    /// The final step does not declare a fixed-size vector output.
    UnboundedOutput,

    // ─── Chain definitions ──────────────────────────────────────────────
    /// The definition's `v` field is not a supported version.
    UnsupportedVersion,
    /// A step entry names a role that does not exist.
    UnknownRole,
    /// No model with the requested id is registered for the role.
    UnknownModel,
    /// A model option or runtime setting has an invalid value.
    InvalidValue,
    /// A runtime limit is outside its permitted range.
    LimitExceeded,

    // ─── Execution ──────────────────────────────────────────────────────
    /// `embed` was called on a pipeline that is not built.
    NotBuilt,
    /// A step received or produced data that breaks its declared shape.
    ShapeViolation,
    /// A resource needed for execution (e.g., a thread pool) is unavailable.
    ResourceUnavailable,
}

impl ErrorCode {
    /// The stable `snake_case` identifier used in JSON and display output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyPipeline => "empty_pipeline",
            Self::InvalidTopology => "invalid_topology",
            Self::MissingStep => "missing_step",
            Self::UnexpectedStep => "unexpected_step",
            Self::DuplicateStep => "duplicate_step",
            Self::KindMismatch => "kind_mismatch",
            Self::DimensionMismatch => "dimension_mismatch",
            Self::CountMismatch => "count_mismatch",
            Self::BranchCountMismatch => "branch_count_mismatch",
            Self::UnboundedOutput => "unbounded_output",
            Self::UnsupportedVersion => "unsupported_version",
            Self::UnknownRole => "unknown_role",
            Self::UnknownModel => "unknown_model",
            Self::InvalidValue => "invalid_value",
            Self::LimitExceeded => "limit_exceeded",
            Self::NotBuilt => "not_built",
            Self::ShapeViolation => "shape_violation",
            Self::ResourceUnavailable => "resource_unavailable",
        }
    }

    /// Whether this code is produced by the build-time compatibility check.
    pub fn is_compatibility(&self) -> bool {
        matches!(
            self,
            Self::KindMismatch
                | Self::DimensionMismatch
                | Self::CountMismatch
                | Self::BranchCountMismatch
                | Self::UnboundedOutput
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
