//! Chain definitions: the serialized form of a pipeline.
//!
//! A [`PipelineSpec`] names a topology, one model entry per role, and
//! runtime limits. It is the only persisted format; turning it into a
//! runnable [`Pipeline`](super::runner::Pipeline) is the job of
//! [`SpecPipelineBuilder`](super::spec_builder::SpecPipelineBuilder).
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "v": 1,
//!   "topology": "three_stage",
//!   "steps": {
//!     "keyword_extraction": { "type": "dummy", "separator": " " },
//!     "word_embedding": { "type": "dummy", "embedding_size": 256 },
//!     "dimensionality_reduction": { "type": "dummy", "reduced_embedding_size": 16 }
//!   },
//!   "runtime": { "max_threads": 4 }
//! }
//! ```
//!
//! Parallel roles take an array of entries. A custom topology replaces the
//! preset name with `{ "name": "...", "stages": [{ "role": "...", "parallel": true }] }`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::engine::ExecutionEngine;
use super::error_code::ErrorCode;
use super::errors::PipelineBuildError;
use super::topology::Topology;

/// The only supported definition version.
pub const SPEC_VERSION: u32 = 1;

/// Top-level chain definition (v1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Definition version (currently `1`).
    pub v: u32,

    /// Preset name or custom stage list. Defaults to `three_stage`.
    #[serde(default)]
    pub topology: TopologySpec,

    /// Model entries keyed by role name.
    #[serde(default)]
    pub steps: BTreeMap<String, StepEntries>,

    /// Runtime execution limits.
    #[serde(default)]
    pub runtime: RuntimeSpec,
}

impl PipelineSpec {
    /// Parse a definition from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the definition as pretty-printed JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ─── Topology ───────────────────────────────────────────────────────────────

/// A preset topology name, or an inline custom stage list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopologySpec {
    Preset(String),
    Custom(CustomTopologySpec),
}

impl Default for TopologySpec {
    fn default() -> Self {
        Self::Preset(Topology::THREE_STAGE.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTopologySpec {
    #[serde(default = "default_custom_name")]
    pub name: String,
    pub stages: Vec<StageSpec>,
}

fn default_custom_name() -> String {
    "custom".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Role name, e.g. `"word_embedding"`.
    pub role: String,

    /// Whether this stage holds parallel branches.
    #[serde(default)]
    pub parallel: bool,
}

// ─── Steps ──────────────────────────────────────────────────────────────────

/// One model entry, or several for a parallel role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepEntries {
    One(StepSpec),
    Many(Vec<StepSpec>),
}

impl StepEntries {
    pub fn as_slice(&self) -> &[StepSpec] {
        match self {
            Self::One(spec) => std::slice::from_ref(spec),
            Self::Many(specs) => specs,
        }
    }
}

/// A model id plus its construction options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Registered model id for the role (e.g., `"dummy"`).
    #[serde(rename = "type")]
    pub model: String,

    /// Every other field, handed to the model's constructor.
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl StepSpec {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            options: serde_json::Map::new(),
        }
    }

    /// Set one construction option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

// ─── Runtime ────────────────────────────────────────────────────────────────

/// Runtime execution settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    /// Maximum worker threads for parallel branches and batches.
    /// `None` uses the global rayon pool.
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Disable parallelism entirely (equivalent to `max_threads: 1`).
    /// When `true`, overrides `max_threads`.
    #[serde(default)]
    pub single_thread: bool,
}

impl RuntimeSpec {
    /// Run everything on the calling thread.
    pub fn single_threaded() -> Self {
        Self {
            max_threads: None,
            single_thread: true,
        }
    }

    pub fn with_max_threads(mut self, n: usize) -> Self {
        self.max_threads = Some(n);
        self
    }

    /// Resolve the effective thread count.
    ///
    /// - `single_thread == true` → `Some(1)`
    /// - `max_threads == Some(n)` → `Some(n)`
    /// - otherwise → `None` (use Rayon default)
    pub fn effective_threads(&self) -> Option<usize> {
        if self.single_thread {
            Some(1)
        } else {
            self.max_threads
        }
    }

    /// Check limits before any pool is created.
    pub fn validate(&self) -> Result<(), PipelineBuildError> {
        if self.max_threads == Some(0) {
            return Err(PipelineBuildError::new(
                ErrorCode::LimitExceeded,
                "/runtime/max_threads",
                "max_threads must be greater than 0",
            )
            .with_hint("Remove max_threads to use the global pool, or set it to a positive value"));
        }
        Ok(())
    }

    /// Build a scoped Rayon thread pool matching this config.
    ///
    /// Returns `None` when no thread limit is set (use global pool) or when
    /// execution is single-threaded.
    pub fn build_thread_pool(&self) -> Result<Option<rayon::ThreadPool>, PipelineBuildError> {
        self.validate()?;
        match self.effective_threads() {
            None | Some(1) => Ok(None),
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .thread_name(|i| format!("embeddings-pipeline-{i}"))
                .build()
                .map(Some)
                .map_err(|err| {
                    PipelineBuildError::new(
                        ErrorCode::ResourceUnavailable,
                        "/runtime/max_threads",
                        format!("failed to build a {n}-thread pool: {err}"),
                    )
                }),
        }
    }

    /// Create the execution engine these settings describe.
    pub fn engine(&self) -> Result<ExecutionEngine, PipelineBuildError> {
        if self.effective_threads() == Some(1) {
            self.validate()?;
            return Ok(ExecutionEngine::sequential());
        }
        Ok(match self.build_thread_pool()? {
            Some(pool) => ExecutionEngine::new().with_pool(Arc::new(pool)),
            None => ExecutionEngine::new(),
        })
    }
}
