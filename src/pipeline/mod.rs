//! Pipeline definition, validation, and execution.
//!
//! ## Submodules
//!
//! - [`shape`]: Shape descriptors and the edge-compatibility rules
//! - [`artifacts`]: Values flowing between steps
//! - [`traits`]: The [`Step`] contract
//! - [`topology`]: Stage layouts (presets and custom)
//! - [`runner`]: The [`Pipeline`] and its build-state lifecycle
//! - [`validation`]: The compatibility checker run by `build()`
//! - [`engine`]: Stage-by-stage execution with fan-out/fan-in
//! - [`observer`]: Per-stage timing and debug hooks
//! - [`spec`] / [`spec_builder`] / [`registry`]: JSON chain definitions

pub mod artifacts;
pub mod engine;
pub mod error_code;
pub mod errors;
pub mod observer;
pub mod registry;
pub mod runner;
pub mod shape;
pub mod spec;
pub mod spec_builder;
pub mod topology;
pub mod traits;
pub mod validation;

pub use artifacts::Value;
pub use engine::ExecutionEngine;
pub use error_code::ErrorCode;
pub use errors::{
    EdgeDiagnostic, PipelineBuildError, PipelineError, PipelineNotBuiltError, ShapeViolation,
    StepExecutionError,
};
pub use observer::{NoopObserver, PipelineObserver, StageRecorder, StageReport};
pub use registry::{StepFactory, StepRegistry};
pub use runner::{BuildState, NamedStep, Pipeline, Stage};
pub use shape::{Extent, Mismatch, ShapeDescriptor, ShapeKind};
pub use spec::{PipelineSpec, RuntimeSpec, StepSpec, TopologySpec};
pub use spec_builder::SpecPipelineBuilder;
pub use topology::{StageSlot, Topology};
pub use traits::{IdentityStep, Step};
pub use validation::CompatibilityChecker;
