//! Bundled step implementations.
//!
//! These are deterministic reference models: they exercise every shape the
//! pipeline understands without needing trained weights. Each model can be
//! constructed directly or from a JSON options object (see
//! [`StepRegistry`](crate::pipeline::registry::StepRegistry)).

pub mod dimensionality_reduction;
pub mod keyword_extraction;
pub mod word_embedding;

use serde::de::DeserializeOwned;

use crate::errors::{EmbeddingsError, Result};

pub use dimensionality_reduction::{DummyDimensionalityReducer, DummyMultiEmbeddingReducer};
pub use keyword_extraction::{DummyKeywordExtractor, UnicodeKeywordExtractor};
pub use word_embedding::DummyWordEmbedder;

/// Deserialize a model's options object. `null` is treated as `{}`.
pub(crate) fn parse_options<T: DeserializeOwned>(options: &serde_json::Value) -> Result<T> {
    let options = match options {
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(options).map_err(|err| EmbeddingsError::invalid_config(err.to_string()))
}

/// Arithmetic mean of equally sized vectors. `vectors` must be non-empty.
pub(crate) fn mean_pool<'a>(vectors: impl ExactSizeIterator<Item = &'a [f32]>, dim: usize) -> Vec<f32> {
    let n = vectors.len().max(1) as f32;
    let mut acc = vec![0.0f32; dim];
    for vector in vectors {
        for (slot, x) in acc.iter_mut().zip(vector) {
            *slot += x;
        }
    }
    for slot in &mut acc {
        *slot /= n;
    }
    acc
}
