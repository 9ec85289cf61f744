//! Pipeline runner: owns the wiring and the build state.
//!
//! A [`Pipeline`] is constructed from a [`Topology`] plus one step per role
//! (several for a parallel role). Construction only matches steps to roles;
//! nothing is validated until [`Pipeline::build`] runs the
//! [`CompatibilityChecker`]. Only a `built` pipeline can
//! [`embed`](Pipeline::embed).
//!
//! A successful build also calls [`Step::prepare`] on every step; the steps
//! are disposed when the pipeline is reset or dropped.
//!
//! ```text
//!            new()            build() ok
//!   ─────────────▶ unbuilt ─────────────▶ built ──▶ embed()
//!                     │  build() err        ▲
//!                     ▼                     │ build() ok
//!                  invalid ─────────────────┘
//! ```
//!
//! # Factory methods
//!
//! Use [`Pipeline::three_stage`] and [`Pipeline::merge_at_reduction`] for the
//! preset topologies without spelling out roles.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::artifacts::Value;
use super::engine::ExecutionEngine;
use super::error_code::ErrorCode;
use super::errors::{EdgeDiagnostic, PipelineBuildError, PipelineError, PipelineNotBuiltError};
use super::observer::{NoopObserver, PipelineObserver};
use super::shape::ShapeDescriptor;
use super::spec::RuntimeSpec;
use super::topology::{StageSlot, Topology};
use super::traits::Step;
use super::validation::CompatibilityChecker;
use crate::types::{Embedding, StepRole};

// ============================================================================
// BuildState
// ============================================================================

/// Lifecycle state of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    /// Constructed (or reconfigured) but not yet checked.
    Unbuilt,
    /// The last `build()` succeeded; `embed()` is allowed.
    Built,
    /// The last `build()` failed.
    Invalid,
}

impl BuildState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unbuilt => "unbuilt",
            Self::Built => "built",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// NamedStep / Stage
// ============================================================================

/// A step together with its position label (e.g. `"word_embedding[1]"`).
#[derive(Clone)]
pub struct NamedStep {
    label: String,
    step: Arc<dyn Step>,
}

impl NamedStep {
    pub fn new(label: impl Into<String>, step: Arc<dyn Step>) -> Self {
        Self {
            label: label.into(),
            step,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn step(&self) -> &Arc<dyn Step> {
        &self.step
    }

    /// The step's model name.
    pub fn name(&self) -> &str {
        self.step.name()
    }

    pub fn input_shape(&self) -> ShapeDescriptor {
        self.step.input_shape()
    }

    pub fn output_shape(&self) -> ShapeDescriptor {
        self.step.output_shape()
    }
}

impl fmt::Debug for NamedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedStep")
            .field("label", &self.label)
            .field("model", &self.step.name())
            .field("input", &self.step.input_shape())
            .field("output", &self.step.output_shape())
            .finish()
    }
}

/// One topology slot filled with its step(s).
#[derive(Debug, Clone)]
pub struct Stage {
    slot: StageSlot,
    steps: Vec<NamedStep>,
}

impl Stage {
    /// Fill `slot` with `steps`, labelled after the slot's role. Parallel
    /// branches get an index suffix.
    ///
    /// A stage always holds at least one step; a single slot holds exactly
    /// one.
    pub fn new(slot: StageSlot, steps: Vec<Arc<dyn Step>>) -> Result<Self, PipelineBuildError> {
        let role = slot.role();
        match (slot, steps.len()) {
            (_, 0) => Err(PipelineBuildError::new(
                ErrorCode::MissingStep,
                format!("/steps/{role}"),
                format!("{role} needs at least one step"),
            )
            .with_hint(format!("Add a step for the {role} role"))),
            (StageSlot::Single(_), n) if n > 1 => Err(PipelineBuildError::new(
                ErrorCode::DuplicateStep,
                format!("/steps/{role}"),
                format!("{role} takes exactly one step, got {n}"),
            )
            .with_hint("Use a topology with a parallel stage for several branches")),
            _ => Ok(Self::labelled(slot, steps)),
        }
    }

    fn labelled(slot: StageSlot, steps: Vec<Arc<dyn Step>>) -> Self {
        let role = slot.role();
        let steps = match slot {
            StageSlot::Single(_) => steps
                .into_iter()
                .map(|step| NamedStep::new(role.as_str(), step))
                .collect(),
            StageSlot::Parallel(_) => steps
                .into_iter()
                .enumerate()
                .map(|(i, step)| NamedStep::new(format!("{role}[{i}]"), step))
                .collect(),
        };
        Self { slot, steps }
    }

    pub fn slot(&self) -> StageSlot {
        self.slot
    }

    pub fn role(&self) -> StepRole {
        self.slot.role()
    }

    pub fn is_parallel(&self) -> bool {
        self.slot.is_parallel()
    }

    /// `"<role>"` for a single stage, `"<role>[..]"` for a parallel one.
    pub fn label(&self) -> String {
        self.slot.to_string()
    }

    pub fn steps(&self) -> &[NamedStep] {
        &self.steps
    }

    /// The step of a single stage, or the first branch of a parallel one.
    pub fn first(&self) -> &NamedStep {
        &self.steps[0]
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// An ordered, role-checked chain of steps with a build state.
///
/// `embed*` take `&self` and may be called concurrently from several
/// threads once the pipeline is built; `build` and the `with_*`
/// reconfiguration methods need exclusive access.
#[derive(Debug)]
pub struct Pipeline {
    topology: Topology,
    stages: Vec<Stage>,
    runtime: RuntimeSpec,
    checker: CompatibilityChecker,
    state: BuildState,
    output_dim: Option<usize>,
    engine: Option<ExecutionEngine>,
    prepared: bool,
}

impl Pipeline {
    /// Match `steps` to the roles of `topology`.
    ///
    /// Every role needs a step; a single role takes exactly one, a parallel
    /// role one or more (kept in the order given). Steps for roles the
    /// topology does not have are rejected. Shapes are NOT checked here.
    pub fn new(
        topology: Topology,
        steps: impl IntoIterator<Item = (StepRole, Arc<dyn Step>)>,
    ) -> Result<Self, PipelineBuildError> {
        let mut by_role: FxHashMap<StepRole, Vec<Arc<dyn Step>>> = FxHashMap::default();
        let mut total = 0usize;

        for (role, step) in steps {
            if topology.position(role).is_none() {
                return Err(PipelineBuildError::new(
                    ErrorCode::UnexpectedStep,
                    format!("/steps/{role}"),
                    format!("topology {} has no {role} role", topology.name()),
                )
                .with_hint(format!("Topology roles: {topology}")));
            }
            by_role.entry(role).or_default().push(step);
            total += 1;
        }

        if total == 0 {
            return Err(PipelineBuildError::new(
                ErrorCode::EmptyPipeline,
                "/steps",
                "a pipeline needs at least one step",
            ));
        }

        let mut stages = Vec::with_capacity(topology.len());
        for slot in topology.slots() {
            let steps = by_role.remove(&slot.role()).unwrap_or_default();
            stages.push(Stage::new(*slot, steps)?);
        }

        Ok(Self::from_stages(topology, stages))
    }

    fn from_stages(topology: Topology, stages: Vec<Stage>) -> Self {
        Self {
            topology,
            stages,
            runtime: RuntimeSpec::default(),
            checker: CompatibilityChecker::new(),
            state: BuildState::Unbuilt,
            output_dim: None,
            engine: None,
            prepared: false,
        }
    }

    /// extraction → embedding → reduction.
    pub fn three_stage(
        extraction: impl Step + 'static,
        embedding: impl Step + 'static,
        reduction: impl Step + 'static,
    ) -> Self {
        let topology = Topology::three_stage();
        let steps: [Arc<dyn Step>; 3] = [
            Arc::new(extraction),
            Arc::new(embedding),
            Arc::new(reduction),
        ];
        let stages = topology
            .slots()
            .iter()
            .zip(steps)
            .map(|(slot, step)| Stage::labelled(*slot, vec![step]))
            .collect();
        Self::from_stages(topology, stages)
    }

    /// extraction → parallel embedders → multi-embedding reduction.
    ///
    /// Fails with `missing_step` when `embedders` is empty.
    pub fn merge_at_reduction(
        extraction: impl Step + 'static,
        embedders: impl IntoIterator<Item = Arc<dyn Step>>,
        merge: impl Step + 'static,
    ) -> Result<Self, PipelineBuildError> {
        let mut steps: Vec<(StepRole, Arc<dyn Step>)> =
            vec![(StepRole::KeywordExtraction, Arc::new(extraction) as Arc<dyn Step>)];
        steps.extend(
            embedders
                .into_iter()
                .map(|step| (StepRole::WordEmbedding, step)),
        );
        steps.push((StepRole::MultiEmbeddingReduction, Arc::new(merge) as Arc<dyn Step>));
        Self::new(Topology::merge_at_reduction(), steps)
    }

    /// Replace the runtime settings. The pipeline returns to `unbuilt`.
    pub fn with_runtime(mut self, runtime: RuntimeSpec) -> Self {
        self.runtime = runtime;
        self.reset();
        self
    }

    fn reset(&mut self) {
        self.dispose_steps();
        self.state = BuildState::Unbuilt;
        self.output_dim = None;
        self.engine = None;
    }

    /// Prepare every step in stage order. Steps prepared before a failure
    /// are disposed again.
    fn prepare_steps(&mut self) -> Result<(), PipelineBuildError> {
        if self.prepared {
            return Ok(());
        }
        let mut done: Vec<&NamedStep> = Vec::new();
        for (position, stage) in self.stages.iter().enumerate() {
            for named in stage.steps() {
                if let Err(err) = named.step().prepare() {
                    for step in done.iter().rev() {
                        step.step().dispose();
                    }
                    return Err(PipelineBuildError::new(
                        ErrorCode::ResourceUnavailable,
                        format!("/stages/{position}"),
                        format!("{} ({}) could not be prepared: {err}", named.label(), named.name()),
                    ));
                }
                done.push(named);
            }
        }
        self.prepared = true;
        Ok(())
    }

    /// Dispose every step in reverse stage order, once per preparation.
    fn dispose_steps(&mut self) {
        if !std::mem::take(&mut self.prepared) {
            return;
        }
        for named in self.stages.iter().rev().flat_map(|stage| stage.steps().iter().rev()) {
            named.step().dispose();
        }
        tracing::debug!(topology = self.topology.name(), "pipeline steps disposed");
    }

    /// Validate every edge, then prepare the steps; on success the pipeline
    /// becomes `built`.
    ///
    /// Idempotent: building an already-built, unchanged pipeline re-runs the
    /// checker and keeps the existing execution engine and prepared steps.
    /// On failure the state becomes `invalid`, prepared steps are disposed,
    /// and the first incompatible edge (or the step that could not be
    /// prepared) is reported.
    pub fn build(&mut self) -> Result<(), PipelineBuildError> {
        let checked = self.checker.check(&self.stages).and_then(|dim| {
            let engine = match self.engine.take() {
                Some(engine) => engine,
                None => self.runtime.engine()?,
            };
            Ok((dim, engine))
        });
        let checked = checked.and_then(|built| {
            self.prepare_steps()?;
            Ok(built)
        });

        match checked {
            Ok((dim, engine)) => {
                self.state = BuildState::Built;
                self.output_dim = Some(dim);
                self.engine = Some(engine);
                tracing::debug!(
                    topology = self.topology.name(),
                    stages = self.stages.len(),
                    output_dim = dim,
                    "pipeline built"
                );
                Ok(())
            }
            Err(err) => {
                self.reset();
                self.state = BuildState::Invalid;
                tracing::warn!(
                    topology = self.topology.name(),
                    code = %err.code,
                    path = %err.path,
                    "pipeline build failed: {}",
                    err.message
                );
                Err(err)
            }
        }
    }

    /// Embed one sentence.
    pub fn embed(&self, sentence: &str) -> Result<Embedding, PipelineError> {
        self.embed_with_observer(sentence, &mut NoopObserver)
    }

    /// Embed one sentence, reporting each stage to `observer`.
    pub fn embed_with_observer(
        &self,
        sentence: &str,
        observer: &mut impl PipelineObserver,
    ) -> Result<Embedding, PipelineError> {
        let (engine, dim) = self.ready()?;
        Ok(engine.execute(&self.stages, dim, Value::from(sentence), observer)?)
    }

    /// Embed many sentences. Sentences are processed in parallel unless the
    /// runtime is single-threaded; results keep input order and the first
    /// failure (in input order) is returned.
    pub fn embed_batch<S>(&self, sentences: &[S]) -> Result<Vec<Embedding>, PipelineError>
    where
        S: AsRef<str> + Sync,
    {
        let (engine, dim) = self.ready()?;
        let run_one = |sentence: &S| {
            engine.execute(&self.stages, dim, Value::from(sentence.as_ref()), &mut NoopObserver)
        };

        let results: Vec<_> = if engine.parallel_branches() {
            let run = || sentences.par_iter().map(run_one).collect::<Vec<_>>();
            match engine.pool() {
                Some(pool) => pool.install(run),
                None => run(),
            }
        } else {
            sentences.iter().map(run_one).collect()
        };

        results
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(PipelineError::from)
    }

    fn ready(&self) -> Result<(&ExecutionEngine, usize), PipelineNotBuiltError> {
        match (self.state, &self.engine, self.output_dim) {
            (BuildState::Built, Some(engine), Some(dim)) => Ok((engine, dim)),
            (state, _, _) => Err(PipelineNotBuiltError::new(state)),
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn is_built(&self) -> bool {
        self.state == BuildState::Built
    }

    /// Embedding dimensionality, known once built.
    pub fn output_dim(&self) -> Option<usize> {
        self.output_dim
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The stage filling `role`, if any.
    pub fn stage(&self, role: StepRole) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.role() == role)
    }

    pub fn runtime(&self) -> &RuntimeSpec {
        &self.runtime
    }

    /// Every declared edge, in the order the checker visits them.
    pub fn edges(&self) -> Vec<EdgeDiagnostic> {
        self.checker.edges(&self.stages)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.dispose_steps();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::errors::EmbeddingsError;
    use crate::models::{
        DummyDimensionalityReducer, DummyKeywordExtractor, DummyMultiEmbeddingReducer,
        DummyWordEmbedder,
    };
    use crate::pipeline::errors::ShapeViolation;
    use crate::pipeline::shape::Extent;

    fn extractor() -> DummyKeywordExtractor {
        DummyKeywordExtractor::new(" ").unwrap()
    }

    fn embedder(size: usize) -> DummyWordEmbedder {
        DummyWordEmbedder::new(size).unwrap()
    }

    fn reducer(size: usize) -> DummyDimensionalityReducer {
        DummyDimensionalityReducer::new(size).unwrap()
    }

    fn standard() -> Pipeline {
        Pipeline::three_stage(extractor(), embedder(256), reducer(16))
    }

    fn merge(branches: usize, accepted: Extent) -> Pipeline {
        let embedders: Vec<Arc<dyn Step>> = (0..branches)
            .map(|i| Arc::new(embedder(32).with_seed(i as u64)) as Arc<dyn Step>)
            .collect();
        let merger = DummyMultiEmbeddingReducer::new(8)
            .unwrap()
            .with_branches(accepted)
            .unwrap();
        Pipeline::merge_at_reduction(extractor(), embedders, merger).unwrap()
    }

    // ─── Construction ───────────────────────────────────────────────────

    #[test]
    fn test_new_starts_unbuilt() {
        let p = standard();
        assert_eq!(p.state(), BuildState::Unbuilt);
        assert_eq!(p.output_dim(), None);
        assert_eq!(p.stages().len(), 3);
        assert_eq!(p.stages()[1].steps()[0].label(), "word_embedding");
    }

    #[test]
    fn test_new_rejects_missing_role() {
        let err = Pipeline::new(
            Topology::three_stage(),
            vec![
                (StepRole::KeywordExtraction, Arc::new(extractor()) as Arc<dyn Step>),
                (StepRole::DimensionalityReduction, Arc::new(reducer(4)) as Arc<dyn Step>),
            ],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingStep);
        assert_eq!(err.path, "/steps/word_embedding");
    }

    #[test]
    fn test_new_rejects_unexpected_role() {
        let err = Pipeline::new(
            Topology::three_stage(),
            vec![(
                StepRole::MultiEmbeddingReduction,
                Arc::new(reducer(4)) as Arc<dyn Step>,
            )],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnexpectedStep);
    }

    #[test]
    fn test_new_rejects_duplicate_single_role() {
        let err = Pipeline::new(
            Topology::three_stage(),
            vec![
                (StepRole::KeywordExtraction, Arc::new(extractor()) as Arc<dyn Step>),
                (StepRole::WordEmbedding, Arc::new(embedder(8)) as Arc<dyn Step>),
                (StepRole::WordEmbedding, Arc::new(embedder(8)) as Arc<dyn Step>),
                (StepRole::DimensionalityReduction, Arc::new(reducer(4)) as Arc<dyn Step>),
            ],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateStep);
    }

    #[test]
    fn test_new_rejects_empty() {
        let err = Pipeline::new(Topology::three_stage(), Vec::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyPipeline);
    }

    #[test]
    fn test_stage_requires_a_step() {
        let err = Stage::new(StageSlot::Parallel(StepRole::WordEmbedding), Vec::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingStep);
        assert_eq!(err.path, "/steps/word_embedding");

        let err = Stage::new(
            StageSlot::Single(StepRole::WordEmbedding),
            vec![
                Arc::new(embedder(4)) as Arc<dyn Step>,
                Arc::new(embedder(4)) as Arc<dyn Step>,
            ],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateStep);

        let stage = Stage::new(
            StageSlot::Parallel(StepRole::WordEmbedding),
            vec![Arc::new(embedder(4)) as Arc<dyn Step>],
        )
        .unwrap();
        assert_eq!(stage.first().label(), "word_embedding[0]");
    }

    #[test]
    fn test_merge_without_embedders_fails() {
        let err = Pipeline::merge_at_reduction(
            extractor(),
            Vec::new(),
            DummyMultiEmbeddingReducer::new(4).unwrap(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingStep);
    }

    // ─── Build ──────────────────────────────────────────────────────────

    #[test]
    fn test_build_success_and_idempotence() {
        let mut p = standard();
        p.build().unwrap();
        assert_eq!(p.state(), BuildState::Built);
        assert_eq!(p.output_dim(), Some(16));

        p.build().unwrap();
        assert!(p.is_built());
        assert_eq!(p.output_dim(), Some(16));
    }

    #[test]
    fn test_build_failure_marks_invalid() {
        let mut p = Pipeline::three_stage(
            extractor(),
            embedder(128),
            reducer(16).with_input_size(256).unwrap(),
        );
        let err = p.build().unwrap_err();
        assert_eq!(err.code, ErrorCode::DimensionMismatch);
        assert_eq!(err.path, "/edges/2");
        assert_eq!(p.state(), BuildState::Invalid);
        assert_eq!(p.output_dim(), None);

        let err = p.embed("this is a sentence").unwrap_err();
        assert_eq!(err, PipelineError::NotBuilt(PipelineNotBuiltError::new(BuildState::Invalid)));
    }

    #[test]
    fn test_embed_before_build_fails() {
        let p = standard();
        let err = p.embed("this is a sentence").unwrap_err();
        assert!(err.is_not_built());
        assert_eq!(err.code(), ErrorCode::NotBuilt);
        assert!(p.embed_batch(&["a"]).unwrap_err().is_not_built());
    }

    #[test]
    fn test_with_runtime_resets_state() {
        let mut p = standard();
        p.build().unwrap();
        let mut p = p.with_runtime(RuntimeSpec::single_threaded());
        assert_eq!(p.state(), BuildState::Unbuilt);
        p.build().unwrap();
        assert!(p.is_built());
    }

    #[test]
    fn test_build_fails_on_bad_runtime() {
        let mut p = standard().with_runtime(RuntimeSpec::default().with_max_threads(0));
        let err = p.build().unwrap_err();
        assert_eq!(err.code, ErrorCode::LimitExceeded);
        assert_eq!(p.state(), BuildState::Invalid);
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────

    #[derive(Default)]
    struct Counters {
        prepared: AtomicUsize,
        disposed: AtomicUsize,
    }

    impl Counters {
        fn get(&self) -> (usize, usize) {
            (
                self.prepared.load(Ordering::SeqCst),
                self.disposed.load(Ordering::SeqCst),
            )
        }
    }

    /// Wraps a step and counts lifecycle calls; `missing` makes `prepare` fail.
    struct Tracked {
        inner: Arc<dyn Step>,
        counters: Arc<Counters>,
        missing: bool,
    }

    impl Tracked {
        fn new(inner: impl Step + 'static, counters: &Arc<Counters>) -> Self {
            Self {
                inner: Arc::new(inner),
                counters: Arc::clone(counters),
                missing: false,
            }
        }

        fn missing(mut self) -> Self {
            self.missing = true;
            self
        }
    }

    impl Step for Tracked {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn input_shape(&self) -> ShapeDescriptor {
            self.inner.input_shape()
        }

        fn output_shape(&self) -> ShapeDescriptor {
            self.inner.output_shape()
        }

        fn transform(&self, input: &Value) -> Result<Value, ShapeViolation> {
            self.inner.transform(input)
        }

        fn prepare(&self) -> crate::Result<()> {
            if self.missing {
                return Err(EmbeddingsError::invalid_config("model weights not found"));
            }
            self.counters.prepared.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn dispose(&self) {
            self.counters.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked(counters: &Arc<Counters>, embed: usize, reduce: usize) -> Pipeline {
        Pipeline::three_stage(
            Tracked::new(extractor(), counters),
            Tracked::new(embedder(embed), counters),
            Tracked::new(reducer(reduce), counters),
        )
    }

    #[test]
    fn test_build_prepares_and_drop_disposes() {
        let counters = Arc::new(Counters::default());
        let mut p = tracked(&counters, 32, 8);
        assert_eq!(counters.get(), (0, 0));

        p.build().unwrap();
        assert_eq!(counters.get(), (3, 0));
        assert_eq!(p.embed("prepared steps run").unwrap().len(), 8);

        // Rebuilding an unchanged pipeline keeps the prepared steps.
        p.build().unwrap();
        assert_eq!(counters.get(), (3, 0));

        let mut p = p.with_runtime(RuntimeSpec::single_threaded());
        assert_eq!(counters.get(), (3, 3));
        p.build().unwrap();
        assert_eq!(counters.get(), (6, 3));

        drop(p);
        assert_eq!(counters.get(), (6, 6));
    }

    #[test]
    fn test_incompatible_chain_is_never_prepared() {
        let counters = Arc::new(Counters::default());
        let mut p = tracked(&counters, 8, 16);
        assert_eq!(p.build().unwrap_err().code, ErrorCode::DimensionMismatch);
        drop(p);
        assert_eq!(counters.get(), (0, 0));
    }

    #[test]
    fn test_prepare_failure_disposes_prepared_steps() {
        let counters = Arc::new(Counters::default());
        let mut p = Pipeline::three_stage(
            Tracked::new(extractor(), &counters),
            Tracked::new(embedder(32), &counters),
            Tracked::new(reducer(8), &counters).missing(),
        );
        let err = p.build().unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceUnavailable);
        assert_eq!(err.path, "/stages/2");
        assert!(err.message.contains("model weights not found"));
        assert_eq!(p.state(), BuildState::Invalid);
        assert!(p.embed("never runs").unwrap_err().is_not_built());
        assert_eq!(counters.get(), (2, 2));

        drop(p);
        assert_eq!(counters.get(), (2, 2));
    }

    // ─── Embed ──────────────────────────────────────────────────────────

    #[test]
    fn test_embed_three_stage() {
        let mut p = standard();
        p.build().unwrap();
        let a = p.embed("this is a sentence").unwrap();
        let b = p.embed("this is a sentence").unwrap();
        assert_eq!(a.len(), 16);
        assert_eq!(a, b);

        let long = p
            .embed("this is a much longer sentence with nine words")
            .unwrap();
        assert_eq!(long.len(), 16);
        assert_ne!(a, long);
    }

    #[test]
    fn test_embed_merge() {
        let mut p = merge(3, Extent::Any);
        p.build().unwrap();
        assert_eq!(p.embed("fan out and merge").unwrap().len(), 8);
    }

    #[test]
    fn test_merge_fixed_branch_count() {
        assert!(merge(2, Extent::Fixed(2)).build().is_ok());
        let err = merge(3, Extent::Fixed(2)).build().unwrap_err();
        assert_eq!(err.code, ErrorCode::BranchCountMismatch);
    }

    #[test]
    fn test_runtime_failure_is_step_error() {
        let mut p = standard();
        p.build().unwrap();
        // No words → empty batch → reducer cannot pool.
        let err = p.embed("   ").unwrap_err();
        let PipelineError::Execution(err) = err else {
            panic!("expected a step execution error, got {err:?}");
        };
        assert_eq!(err.step, "dimensionality_reduction");
        assert_eq!(err.code, ErrorCode::ShapeViolation);
    }

    #[test]
    fn test_embed_batch_preserves_order() {
        let mut p = standard();
        p.build().unwrap();
        let sentences = ["first one", "second sentence here", "third"];
        let batch = p.embed_batch(&sentences).unwrap();
        assert_eq!(batch.len(), 3);
        for (sentence, embedding) in sentences.iter().zip(&batch) {
            assert_eq!(&p.embed(sentence).unwrap(), embedding);
        }
    }

    #[test]
    fn test_embed_batch_single_threaded() {
        let mut p = standard().with_runtime(RuntimeSpec::single_threaded());
        p.build().unwrap();
        let batch = p.embed_batch(&vec!["a b".to_string(), "c".to_string()]).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(p.embed_batch(&["ok", ""]).is_err());
    }

    #[test]
    fn test_concurrent_embed() {
        let mut p = standard();
        p.build().unwrap();
        let expected = p.embed("shared across threads").unwrap();
        thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| p.embed("shared across threads").unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn test_edges_and_stage_lookup() {
        let p = merge(2, Extent::Any);
        assert_eq!(p.edges().len(), 6);
        assert!(p.stage(StepRole::WordEmbedding).unwrap().is_parallel());
        assert!(p.stage(StepRole::DimensionalityReduction).is_none());
    }

    #[test]
    fn test_pipeline_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
    }
}
