//! Model registry: `(role, model id)` → step constructor.
//!
//! The registry is how a [`PipelineSpec`](super::spec::PipelineSpec) names
//! concrete models. It is explicit: callers start from
//! [`StepRegistry::with_defaults`] (the bundled models) or an empty
//! registry and [`register`](StepRegistry::register) their own.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::traits::Step;
use crate::errors::Result;
use crate::models::{
    DummyDimensionalityReducer, DummyKeywordExtractor, DummyMultiEmbeddingReducer,
    DummyWordEmbedder, UnicodeKeywordExtractor,
};
use crate::types::StepRole;

/// Builds a step from its JSON options object.
pub type StepFactory = fn(&serde_json::Value) -> Result<Arc<dyn Step>>;

/// Lookup table of step constructors.
#[derive(Clone, Default)]
pub struct StepRegistry {
    factories: FxHashMap<(StepRole, String), StepFactory>,
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("StepRegistry").field("models", &keys).finish()
    }
}

impl StepRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the bundled models:
    ///
    /// | Role | Model id |
    /// |------|----------|
    /// | `keyword_extraction` | `dummy`, `unicode` |
    /// | `word_embedding` | `dummy` |
    /// | `dimensionality_reduction` | `dummy` |
    /// | `multi_embedding_reduction` | `dummy` |
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(StepRole::KeywordExtraction, "dummy", |opts| {
            Ok(Arc::new(DummyKeywordExtractor::from_options(opts)?) as Arc<dyn Step>)
        });
        registry.register(StepRole::KeywordExtraction, "unicode", |opts| {
            Ok(Arc::new(UnicodeKeywordExtractor::from_options(opts)?) as Arc<dyn Step>)
        });
        registry.register(StepRole::WordEmbedding, "dummy", |opts| {
            Ok(Arc::new(DummyWordEmbedder::from_options(opts)?) as Arc<dyn Step>)
        });
        registry.register(StepRole::DimensionalityReduction, "dummy", |opts| {
            Ok(Arc::new(DummyDimensionalityReducer::from_options(opts)?) as Arc<dyn Step>)
        });
        registry.register(StepRole::MultiEmbeddingReduction, "dummy", |opts| {
            Ok(Arc::new(DummyMultiEmbeddingReducer::from_options(opts)?) as Arc<dyn Step>)
        });
        registry
    }

    /// Register (or replace) the constructor for `model` in `role`.
    pub fn register(&mut self, role: StepRole, model: impl Into<String>, factory: StepFactory) {
        self.factories.insert((role, model.into()), factory);
    }

    pub fn contains(&self, role: StepRole, model: &str) -> bool {
        self.factories.contains_key(&(role, model.to_string()))
    }

    /// Construct `model` for `role`. `None` when nothing is registered.
    pub fn create(
        &self,
        role: StepRole,
        model: &str,
        options: &serde_json::Value,
    ) -> Option<Result<Arc<dyn Step>>> {
        self.factories
            .get(&(role, model.to_string()))
            .map(|factory| factory(options))
    }

    /// Registered model ids for `role`, sorted.
    pub fn models(&self, role: StepRole) -> Vec<&str> {
        let mut models: Vec<&str> = self
            .factories
            .keys()
            .filter(|(r, _)| *r == role)
            .map(|(_, model)| model.as_str())
            .collect();
        models.sort_unstable();
        models
    }
}
