//! Pipeline error types for build-time and runtime failures.
//!
//! The lifecycle has three failure points:
//!
//! - [`PipelineBuildError`]: construction or `build()` rejected the chain
//!   (missing roles, malformed topology, incompatible edge shapes).
//! - [`PipelineNotBuiltError`]: `embed()` was called before a successful
//!   `build()`.
//! - [`StepExecutionError`]: a step failed while data was flowing, usually
//!   because it raised a [`ShapeViolation`].
//!
//! [`PipelineError`] is the union returned by `embed()`.
//!
//! Structured errors carry a stable [`ErrorCode`] for programmatic matching,
//! a JSON pointer `path` locating the problem, a human-readable `message`,
//! and an optional `hint` suggesting a fix.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error_code::ErrorCode;
use super::runner::BuildState;
use super::shape::{Mismatch, ShapeDescriptor};

// ─── Build-time errors ──────────────────────────────────────────────────────

/// The edge on which the compatibility checker found a problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDiagnostic {
    /// Edge index, counted left to right from the pipeline input (edge 0).
    pub position: usize,
    /// Label of the producing step (`"input"` for the pipeline input).
    pub producer: String,
    /// Label of the consuming step (`"output"` for the pipeline output).
    pub consumer: String,
    /// Shape the producer declares.
    pub produced: ShapeDescriptor,
    /// Shape the consumer declares (the per-branch item on a fan-in edge).
    pub expected: ShapeDescriptor,
    /// Structured mismatch, when the failure is a shape disagreement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Mismatch>,
}

/// A pipeline that cannot be constructed or built.
///
/// # Display format
///
/// ```text
/// [dimension_mismatch] /edges/2: word_embedding (vectors[*; 128]) -> dimensionality_reduction (vectors[*; 256]): ...
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {path}: {message}")]
pub struct PipelineBuildError {
    /// Stable error code for programmatic matching.
    pub code: ErrorCode,

    /// JSON pointer locating the problem (e.g., `"/edges/2"`,
    /// `"/steps/word_embedding"`).
    pub path: String,

    /// Human-readable description of the problem.
    pub message: String,

    /// Optional suggestion for how to fix the problem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    /// The offending edge, for compatibility failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<EdgeDiagnostic>,
}

impl PipelineBuildError {
    /// Create a new build error.
    pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
            hint: None,
            edge: None,
        }
    }

    /// Create an error for an incompatible edge. The message names both
    /// steps, both declared shapes, and the reason.
    pub fn incompatible_edge(code: ErrorCode, edge: EdgeDiagnostic, why: impl Into<String>) -> Self {
        let message = format!(
            "{} ({}) -> {} ({}): {}",
            edge.producer,
            edge.produced,
            edge.consumer,
            edge.expected,
            why.into()
        );
        Self {
            code,
            path: format!("/edges/{}", edge.position),
            message,
            hint: None,
            edge: Some(edge),
        }
    }

    /// Attach a hint suggesting how to fix the problem.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ─── Not built ──────────────────────────────────────────────────────────────

/// `embed()` was called on a pipeline whose state is not `built`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[error("[not_built] pipeline is {state}; call build() successfully before embed()")]
pub struct PipelineNotBuiltError {
    /// The state the pipeline was in when `embed()` was called.
    pub state: BuildState,
}

impl PipelineNotBuiltError {
    pub fn new(state: BuildState) -> Self {
        Self { state }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::NotBuilt
    }
}

// ─── Runtime errors ─────────────────────────────────────────────────────────

/// Actual data disagreed with a step's declared shape.
///
/// Raised by a step's `transform` when its input is structurally wrong, and
/// by the execution engine when a step's output breaks its declared output
/// shape.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("expected {expected}, found {found}{}", .detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
pub struct ShapeViolation {
    /// The declared shape that was violated.
    pub expected: ShapeDescriptor,
    /// Description of the actual value (see [`Value::describe`](super::artifacts::Value::describe)).
    pub found: String,
    /// Optional specifics, e.g. which branch or which count was wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ShapeViolation {
    pub fn new(expected: ShapeDescriptor, found: impl Into<String>) -> Self {
        Self {
            expected,
            found: found.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A failure that occurred while executing a pipeline step.
///
/// # Display format
///
/// ```text
/// [shape_violation] /stages/2 (step: dimensionality_reduction): expected vectors[*; *], found vectors[0; *] (cannot pool an empty batch)
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {path} (step: {step}): {message}")]
pub struct StepExecutionError {
    /// Stable error code for programmatic matching.
    pub code: ErrorCode,

    /// JSON pointer to the failing stage (`"/stages/<index>"`).
    pub path: String,

    /// Label of the failing step (e.g., `"word_embedding[1]"`).
    pub step: String,

    /// Model name reported by the failing step.
    pub model: String,

    /// Human-readable description of the failure.
    pub message: String,

    /// Optional suggestion for how to fix or work around the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    /// The underlying shape violation, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<ShapeViolation>,
}

impl StepExecutionError {
    /// Create a new step execution error.
    pub fn new(
        code: ErrorCode,
        stage: usize,
        step: impl Into<String>,
        model: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            path: format!("/stages/{stage}"),
            step: step.into(),
            model: model.into(),
            message: message.into(),
            hint: None,
            violation: None,
        }
    }

    /// Wrap a [`ShapeViolation`] raised by (or detected on) a step.
    pub fn shape_violation(
        stage: usize,
        step: impl Into<String>,
        model: impl Into<String>,
        violation: ShapeViolation,
    ) -> Self {
        let mut err = Self::new(
            ErrorCode::ShapeViolation,
            stage,
            step,
            model,
            violation.to_string(),
        );
        err.violation = Some(violation);
        err
    }

    /// Attach a hint suggesting how to fix or work around the failure.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ─── Union ──────────────────────────────────────────────────────────────────

/// Any failure surfaced by the pipeline API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Build(#[from] PipelineBuildError),

    #[error(transparent)]
    NotBuilt(#[from] PipelineNotBuiltError),

    #[error(transparent)]
    Execution(#[from] StepExecutionError),
}

impl PipelineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Build(err) => err.code,
            Self::NotBuilt(err) => err.code(),
            Self::Execution(err) => err.code,
        }
    }

    pub fn is_not_built(&self) -> bool {
        matches!(self, Self::NotBuilt(_))
    }
}
