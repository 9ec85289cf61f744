//! Reducers: `vectors[*; D]` → `vector[k]`, and the merge variant that
//! consumes every branch of a parallel embedding stage.
//!
//! Both pool by arithmetic mean and then keep the first `k` components, so
//! they declare an input dimensionality of `>=k`. An explicit
//! `input_embedding_size` narrows that to exactly `D`. An empty batch has
//! nothing to pool and is a shape violation.

use serde::{Deserialize, Serialize};

use super::{mean_pool, parse_options};
use crate::errors::{EmbeddingsError, Result};
use crate::pipeline::artifacts::Value;
use crate::pipeline::errors::ShapeViolation;
use crate::pipeline::shape::{Extent, ShapeDescriptor};
use crate::pipeline::traits::Step;

/// `D` when declared, otherwise `>=k`.
fn input_dim(reduced: usize, input: Option<usize>) -> Extent {
    input.map_or(Extent::AtLeast(reduced), Extent::Fixed)
}

fn check_sizes(reduced: usize, input: Option<usize>) -> Result<()> {
    if reduced == 0 {
        return Err(EmbeddingsError::invalid_config(
            "reduced_embedding_size must be greater than 0",
        ));
    }
    if let Some(input) = input {
        if input < reduced {
            return Err(EmbeddingsError::invalid_config(format!(
                "input_embedding_size ({input}) is smaller than reduced_embedding_size ({reduced})"
            )));
        }
    }
    Ok(())
}

/// Pool one batch and truncate it to `reduced` components.
fn pool_batch(
    expected: &ShapeDescriptor,
    batch: &[Vec<f32>],
    reduced: usize,
    found: impl Fn() -> String,
) -> std::result::Result<Vec<f32>, ShapeViolation> {
    let violation = |detail: String| ShapeViolation::new(expected.clone(), found()).with_detail(detail);

    let Some(first) = batch.first() else {
        return Err(violation("cannot pool an empty batch".into()));
    };
    let dim = first.len();
    if batch.iter().any(|v| v.len() != dim) {
        return Err(violation("batch mixes vector dimensionalities".into()));
    }
    if let Some(declared) = expected.dim() {
        if !declared.admits(dim) {
            return Err(violation(format!(
                "expected dimensionality {declared}, got {dim}"
            )));
        }
    }
    if dim < reduced {
        return Err(violation(format!(
            "cannot reduce dimensionality {dim} to {reduced}"
        )));
    }

    let mut pooled = mean_pool(batch.iter().map(Vec::as_slice), dim);
    pooled.truncate(reduced);
    Ok(pooled)
}

// ─── DummyDimensionalityReducer ─────────────────────────────────────────────

/// Options for [`DummyDimensionalityReducer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DummyDimensionalityReducerOptions {
    pub reduced_embedding_size: usize,
    #[serde(default)]
    pub input_embedding_size: Option<usize>,
}

/// Mean-pools a batch of word vectors, then truncates to
/// `reduced_embedding_size`.
#[derive(Debug, Clone)]
pub struct DummyDimensionalityReducer {
    reduced_embedding_size: usize,
    input_embedding_size: Option<usize>,
}

impl DummyDimensionalityReducer {
    pub fn new(reduced_embedding_size: usize) -> Result<Self> {
        check_sizes(reduced_embedding_size, None)?;
        Ok(Self {
            reduced_embedding_size,
            input_embedding_size: None,
        })
    }

    /// Declare a fixed input dimensionality. It must be at least the
    /// reduced size.
    pub fn with_input_size(mut self, input_embedding_size: usize) -> Result<Self> {
        check_sizes(self.reduced_embedding_size, Some(input_embedding_size))?;
        self.input_embedding_size = Some(input_embedding_size);
        Ok(self)
    }

    pub fn from_options(options: &serde_json::Value) -> Result<Self> {
        let opts: DummyDimensionalityReducerOptions = parse_options(options)?;
        let reducer = Self::new(opts.reduced_embedding_size)?;
        match opts.input_embedding_size {
            Some(size) => reducer.with_input_size(size),
            None => Ok(reducer),
        }
    }

    pub fn reduced_embedding_size(&self) -> usize {
        self.reduced_embedding_size
    }

    fn input_dim(&self) -> Extent {
        input_dim(self.reduced_embedding_size, self.input_embedding_size)
    }
}

impl Step for DummyDimensionalityReducer {
    fn name(&self) -> &str {
        "dummy_dimensionality_reducer"
    }

    fn input_shape(&self) -> ShapeDescriptor {
        ShapeDescriptor::vector_batch(Extent::Any, self.input_dim())
    }

    fn output_shape(&self) -> ShapeDescriptor {
        ShapeDescriptor::vector(self.reduced_embedding_size)
    }

    fn transform(&self, input: &Value) -> std::result::Result<Value, ShapeViolation> {
        let expected = self.input_shape();
        let Some(batch) = input.as_vector_batch() else {
            return Err(ShapeViolation::new(expected, input.describe())
                .with_detail("dimensionality reduction needs a vector batch"));
        };
        let pooled = pool_batch(&expected, batch, self.reduced_embedding_size, || {
            input.describe()
        })?;
        Ok(Value::Vector(pooled))
    }
}

// ─── DummyMultiEmbeddingReducer ─────────────────────────────────────────────

/// Options for [`DummyMultiEmbeddingReducer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DummyMultiEmbeddingReducerOptions {
    pub reduced_embedding_size: usize,
    /// Exact number of branches accepted; omitted means any number.
    #[serde(default)]
    pub branches: Option<usize>,
    #[serde(default)]
    pub input_embedding_size: Option<usize>,
}

/// Merge step for a parallel embedding stage.
///
/// Each branch's batch is mean-pooled, the pooled vectors are averaged
/// across branches, and the result is truncated to
/// `reduced_embedding_size`. All branches must share one dimensionality.
#[derive(Debug, Clone)]
pub struct DummyMultiEmbeddingReducer {
    reduced_embedding_size: usize,
    branches: Extent,
    input_embedding_size: Option<usize>,
}

impl DummyMultiEmbeddingReducer {
    pub fn new(reduced_embedding_size: usize) -> Result<Self> {
        check_sizes(reduced_embedding_size, None)?;
        Ok(Self {
            reduced_embedding_size,
            branches: Extent::Any,
            input_embedding_size: None,
        })
    }

    /// Accept only this many branches (`Extent::Any` for a variable count).
    pub fn with_branches(mut self, branches: Extent) -> Result<Self> {
        if branches == Extent::Fixed(0) {
            return Err(EmbeddingsError::invalid_config(
                "branches must be greater than 0",
            ));
        }
        self.branches = branches;
        Ok(self)
    }

    /// Declare a fixed per-branch input dimensionality. It must be at least
    /// the reduced size.
    pub fn with_input_size(mut self, input_embedding_size: usize) -> Result<Self> {
        check_sizes(self.reduced_embedding_size, Some(input_embedding_size))?;
        self.input_embedding_size = Some(input_embedding_size);
        Ok(self)
    }

    pub fn from_options(options: &serde_json::Value) -> Result<Self> {
        let opts: DummyMultiEmbeddingReducerOptions = parse_options(options)?;
        let reducer = Self::new(opts.reduced_embedding_size)?
            .with_branches(opts.branches.map_or(Extent::Any, Extent::Fixed))?;
        match opts.input_embedding_size {
            Some(size) => reducer.with_input_size(size),
            None => Ok(reducer),
        }
    }

    pub fn reduced_embedding_size(&self) -> usize {
        self.reduced_embedding_size
    }

    pub fn branches(&self) -> Extent {
        self.branches
    }

    fn item_shape(&self) -> ShapeDescriptor {
        ShapeDescriptor::vector_batch(
            Extent::Any,
            input_dim(self.reduced_embedding_size, self.input_embedding_size),
        )
    }
}

impl Step for DummyMultiEmbeddingReducer {
    fn name(&self) -> &str {
        "dummy_multi_embedding_reducer"
    }

    fn input_shape(&self) -> ShapeDescriptor {
        ShapeDescriptor::merged(self.branches, self.item_shape())
    }

    fn output_shape(&self) -> ShapeDescriptor {
        ShapeDescriptor::vector(self.reduced_embedding_size)
    }

    fn transform(&self, input: &Value) -> std::result::Result<Value, ShapeViolation> {
        let expected = self.input_shape();
        let violation =
            |detail: String| ShapeViolation::new(expected.clone(), input.describe()).with_detail(detail);

        let Some(branches) = input.as_merged() else {
            return Err(violation("multi-embedding reduction needs merged branches".into()));
        };
        if branches.is_empty() {
            return Err(violation("no branches to merge".into()));
        }
        if !self.branches.admits(branches.len()) {
            return Err(violation(format!(
                "expected {} branches, got {}",
                self.branches,
                branches.len()
            )));
        }

        let item = self.item_shape();
        let mut pooled = Vec::with_capacity(branches.len());
        for (i, branch) in branches.iter().enumerate() {
            let Some(batch) = branch.as_vector_batch() else {
                return Err(violation(format!("branch {i} is {}", branch.describe())));
            };
            // Pool at full width so branches can be averaged before truncating.
            let full = batch.first().map_or(0, Vec::len).max(self.reduced_embedding_size);
            let vector = pool_batch(&item, batch, full, || branch.describe())
                .map_err(|inner| violation(format!("branch {i}: {inner}")))?;
            pooled.push(vector);
        }

        let dim = pooled[0].len();
        if pooled.iter().any(|v| v.len() != dim) {
            return Err(violation("branches disagree on dimensionality".into()));
        }

        let mut merged = mean_pool(pooled.iter().map(Vec::as_slice), dim);
        merged.truncate(self.reduced_embedding_size);
        Ok(Value::Vector(merged))
    }
}
