//! The step capability contract.
//!
//! Every processing unit in a pipeline implements [`Step`]: it declares the
//! shape of value it consumes, the shape it produces, and a pure `transform`.
//! Keyword extractors, word embedders, and reducers are all variants of this
//! one contract that differ only in their shape semantics:
//!
//! | Family | Input | Output |
//! |--------|-------|--------|
//! | keyword extraction | `text` | `words[*]` |
//! | word embedding | `words[*]` | `vectors[*; D]` |
//! | dimensionality reduction | `vectors[*; D]` | `vector[k]` |
//! | multi-embedding reduction | `merged[N x vectors[*; D]]` | `vector[k]` |
//!
//! Pipelines hold steps as `Arc<dyn Step>`; a step is built once by the
//! caller and never mutated afterwards. Models that hold external resources
//! acquire them in [`Step::prepare`] and release them in [`Step::dispose`];
//! the pipeline calls both around its built lifetime.

use std::sync::Arc;

use super::artifacts::Value;
use super::errors::ShapeViolation;
use super::shape::ShapeDescriptor;

/// A single pipeline stage: a pure transformation with declared shapes.
///
/// # Contract
///
/// - **Shapes are fixed**: `input_shape` and `output_shape` depend only on
///   the step's construction-time parameters and return the same value on
///   every call.
/// - **Pure**: `transform` depends only on its input and those parameters.
///   It must not touch pipeline-level state.
/// - **Checked**: `transform` returns a [`ShapeViolation`] when the input
///   does not structurally match `input_shape`. The default
///   [`check_input`](Step::check_input) does this check.
/// - **Shareable**: `Send + Sync`, so one built pipeline can serve
///   concurrent `embed` calls and run parallel branches on worker threads.
/// - **Lifecycle**: `prepare` runs once per successful `build()` before any
///   `transform`; `dispose` runs once after the last `transform`, when the
///   pipeline is reset or dropped. Both default to no-ops.
pub trait Step: Send + Sync {
    /// Short model identifier (e.g., `"dummy"`), used in diagnostics.
    fn name(&self) -> &str;

    /// Shape of the value this step consumes.
    fn input_shape(&self) -> ShapeDescriptor;

    /// Shape of the value this step produces.
    fn output_shape(&self) -> ShapeDescriptor;

    /// Transform one input value.
    fn transform(&self, input: &Value) -> Result<Value, ShapeViolation>;

    /// Verify `input` against [`input_shape`](Step::input_shape).
    fn check_input(&self, input: &Value) -> Result<(), ShapeViolation> {
        self.input_shape().conform(input)
    }

    /// Acquire model resources (weights, vocabularies) ahead of the first
    /// `transform`.
    fn prepare(&self) -> crate::Result<()> {
        Ok(())
    }

    /// Release what [`prepare`](Step::prepare) acquired.
    fn dispose(&self) {}
}

impl<S: Step + ?Sized> Step for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn input_shape(&self) -> ShapeDescriptor {
        (**self).input_shape()
    }

    fn output_shape(&self) -> ShapeDescriptor {
        (**self).output_shape()
    }

    fn transform(&self, input: &Value) -> Result<Value, ShapeViolation> {
        (**self).transform(input)
    }

    fn check_input(&self, input: &Value) -> Result<(), ShapeViolation> {
        (**self).check_input(input)
    }

    fn prepare(&self) -> crate::Result<()> {
        (**self).prepare()
    }

    fn dispose(&self) {
        (**self).dispose();
    }
}

impl<S: Step + ?Sized> Step for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn input_shape(&self) -> ShapeDescriptor {
        (**self).input_shape()
    }

    fn output_shape(&self) -> ShapeDescriptor {
        (**self).output_shape()
    }

    fn transform(&self, input: &Value) -> Result<Value, ShapeViolation> {
        (**self).transform(input)
    }

    fn check_input(&self, input: &Value) -> Result<(), ShapeViolation> {
        (**self).check_input(input)
    }

    fn prepare(&self) -> crate::Result<()> {
        (**self).prepare()
    }

    fn dispose(&self) {
        (**self).dispose();
    }
}

/// Passes its input through unchanged. Useful for padding custom
/// topologies and for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityStep {
    shape: ShapeDescriptor,
}

impl IdentityStep {
    pub fn new(shape: ShapeDescriptor) -> Self {
        Self { shape }
    }
}

impl Step for IdentityStep {
    fn name(&self) -> &str {
        "identity"
    }

    fn input_shape(&self) -> ShapeDescriptor {
        self.shape.clone()
    }

    fn output_shape(&self) -> ShapeDescriptor {
        self.shape.clone()
    }

    fn transform(&self, input: &Value) -> Result<Value, ShapeViolation> {
        self.check_input(input)?;
        Ok(input.clone())
    }
}
