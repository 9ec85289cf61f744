//! # embeddings_pipelines
//!
//! Composable sentence-embedding pipelines with build-time shape checking.
//!
//! A pipeline chains typed steps (keyword extraction, word embedding,
//! dimensionality reduction) over a fixed topology. `build()` checks every
//! edge's declared shapes before any data flows; `embed()` then turns a
//! sentence into a fixed-length vector.
//!
//! ```ignore
//! use embeddings_pipelines::models::{
//!     DummyDimensionalityReducer, DummyKeywordExtractor, DummyWordEmbedder,
//! };
//! use embeddings_pipelines::Pipeline;
//!
//! let mut pipeline = Pipeline::three_stage(
//!     DummyKeywordExtractor::new(" ")?,
//!     DummyWordEmbedder::new(256)?,
//!     DummyDimensionalityReducer::new(16)?,
//! );
//! pipeline.build()?;
//! assert_eq!(pipeline.embed("this is a sentence")?.len(), 16);
//! ```

pub mod errors;
pub mod models;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use errors::{EmbeddingsError, Result};
pub use types::{Embedding, StepRole};

pub use pipeline::{
    BuildState, CompatibilityChecker, ErrorCode, Extent, Pipeline, PipelineBuildError,
    PipelineError, PipelineNotBuiltError, PipelineSpec, RuntimeSpec, ShapeDescriptor,
    ShapeViolation, SpecPipelineBuilder, Step, StepExecutionError, StepRegistry, Topology, Value,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
