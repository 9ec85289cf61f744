//! Word embedders: `words[*]` → `vectors[*; D]`.

use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use super::parse_options;
use crate::errors::{EmbeddingsError, Result};
use crate::pipeline::artifacts::Value;
use crate::pipeline::errors::ShapeViolation;
use crate::pipeline::shape::{Extent, ShapeDescriptor};
use crate::pipeline::traits::Step;

/// Options for [`DummyWordEmbedder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DummyWordEmbedderOptions {
    pub embedding_size: usize,
    #[serde(default)]
    pub seed: u64,
}

/// Deterministic pseudo-random embedder.
///
/// Each word maps to a fixed vector of `embedding_size` components in
/// `[-1, 1)`, drawn from a `StdRng` seeded with an FxHash of `(seed, word)`. The same word always
/// gets the same vector; different seeds give independent embedders, which
/// is what parallel branches want.
#[derive(Debug, Clone)]
pub struct DummyWordEmbedder {
    embedding_size: usize,
    seed: u64,
}

impl DummyWordEmbedder {
    pub fn new(embedding_size: usize) -> Result<Self> {
        if embedding_size == 0 {
            return Err(EmbeddingsError::invalid_config(
                "embedding_size must be greater than 0",
            ));
        }
        Ok(Self {
            embedding_size,
            seed: 0,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn from_options(options: &serde_json::Value) -> Result<Self> {
        let opts: DummyWordEmbedderOptions = parse_options(options)?;
        Ok(Self::new(opts.embedding_size)?.with_seed(opts.seed))
    }

    pub fn embedding_size(&self) -> usize {
        self.embedding_size
    }

    /// The vector for a single word.
    pub fn embed_word(&self, word: &str) -> Vec<f32> {
        let mut hasher = FxHasher::default();
        self.seed.hash(&mut hasher);
        word.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());

        (0..self.embedding_size)
            .map(|_| rng.random_range(-1.0f32..1.0))
            .collect()
    }
}

impl Step for DummyWordEmbedder {
    fn name(&self) -> &str {
        "dummy_word_embedder"
    }

    fn input_shape(&self) -> ShapeDescriptor {
        ShapeDescriptor::words(Extent::Any)
    }

    fn output_shape(&self) -> ShapeDescriptor {
        ShapeDescriptor::vector_batch(Extent::Any, Extent::Fixed(self.embedding_size))
    }

    fn transform(&self, input: &Value) -> std::result::Result<Value, ShapeViolation> {
        let words = input.as_words().ok_or_else(|| {
            ShapeViolation::new(self.input_shape(), input.describe())
                .with_detail("word embedding needs a word sequence")
        })?;
        Ok(Value::VectorBatch(
            words.iter().map(|word| self.embed_word(word)).collect(),
        ))
    }
}
