//! Core types shared across the crate.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// StepRole
// ============================================================================

/// The role a step plays within a pipeline topology.
///
/// Topologies declare which roles they require; the pipeline constructor
/// matches supplied steps to roles, and the [`StepRegistry`] keys its
/// constructors by role.
///
/// [`StepRegistry`]: crate::pipeline::registry::StepRegistry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    /// Text → sequence of words.
    KeywordExtraction,
    /// Words → one vector per word.
    WordEmbedding,
    /// Batch of vectors → one reduced vector.
    DimensionalityReduction,
    /// Several parallel batches of vectors → one reduced vector.
    MultiEmbeddingReduction,
}

impl StepRole {
    pub const ALL: [StepRole; 4] = [
        StepRole::KeywordExtraction,
        StepRole::WordEmbedding,
        StepRole::DimensionalityReduction,
        StepRole::MultiEmbeddingReduction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeywordExtraction => "keyword_extraction",
            Self::WordEmbedding => "word_embedding",
            Self::DimensionalityReduction => "dimensionality_reduction",
            Self::MultiEmbeddingReduction => "multi_embedding_reduction",
        }
    }
}

impl fmt::Display for StepRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown step role \"{s}\""))
    }
}

// ============================================================================
// Embedding
// ============================================================================

/// The fixed-length vector a pipeline produces for one sentence.
///
/// Its length equals the final step's declared output dimensionality.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Dimensionality of the embedding.
    #[inline]
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}

impl Deref for Embedding {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.values
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.values
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}
