//! Topology descriptors: which roles a pipeline has and how they are wired.
//!
//! A [`Topology`] is an ordered list of [`StageSlot`]s. A `Single` slot holds
//! exactly one step; a `Parallel` slot holds one or more branch steps that
//! all receive the previous stage's output (fan-out) and whose outputs are
//! collected for the next stage (fan-in). One generic pipeline engine runs
//! every topology.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::error_code::ErrorCode;
use super::errors::PipelineBuildError;
use crate::types::StepRole;

/// One position in a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "wiring", content = "role", rename_all = "snake_case")]
pub enum StageSlot {
    /// Exactly one step fills this role.
    Single(StepRole),
    /// One or more parallel branch steps fill this role.
    Parallel(StepRole),
}

impl StageSlot {
    pub fn role(&self) -> StepRole {
        match self {
            Self::Single(role) | Self::Parallel(role) => *role,
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel(_))
    }
}

impl fmt::Display for StageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(role) => write!(f, "{role}"),
            Self::Parallel(role) => write!(f, "{role}[..]"),
        }
    }
}

/// A named, validated sequence of stage slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    name: String,
    slots: Vec<StageSlot>,
}

impl Topology {
    pub const THREE_STAGE: &'static str = "three_stage";
    pub const MERGE_AT_REDUCTION: &'static str = "merge_at_reduction";

    /// Create a custom topology.
    ///
    /// Rejects an empty slot list, a role used twice, a parallel final slot
    /// (the pipeline must end in a single step), and two adjacent parallel
    /// slots (fan-in must go through a single merge step).
    pub fn new(
        name: impl Into<String>,
        slots: Vec<StageSlot>,
    ) -> Result<Self, PipelineBuildError> {
        let name = name.into();

        if slots.is_empty() {
            return Err(PipelineBuildError::new(
                ErrorCode::InvalidTopology,
                "/topology",
                format!("topology {name} has no stages"),
            )
            .with_hint("Declare at least one stage"));
        }

        let mut seen = FxHashSet::default();
        for (i, slot) in slots.iter().enumerate() {
            if !seen.insert(slot.role()) {
                return Err(PipelineBuildError::new(
                    ErrorCode::InvalidTopology,
                    format!("/topology/stages/{i}"),
                    format!("role {} appears more than once in topology {name}", slot.role()),
                )
                .with_hint("Use a parallel stage for several steps of the same role"));
            }
        }

        for (i, pair) in slots.windows(2).enumerate() {
            if pair[0].is_parallel() && pair[1].is_parallel() {
                return Err(PipelineBuildError::new(
                    ErrorCode::InvalidTopology,
                    format!("/topology/stages/{}", i + 1),
                    format!(
                        "parallel stage {} directly follows parallel stage {}",
                        pair[1], pair[0]
                    ),
                )
                .with_hint("Insert a single merge stage between parallel stages"));
            }
        }

        if let Some(last) = slots.last().filter(|s| s.is_parallel()) {
            return Err(PipelineBuildError::new(
                ErrorCode::InvalidTopology,
                format!("/topology/stages/{}", slots.len() - 1),
                format!("topology {name} ends in parallel stage {last}"),
            )
            .with_hint("End the topology with a single reduction stage"));
        }

        Ok(Self { name, slots })
    }

    /// Linear topology with one step per role, in order.
    pub fn linear(
        name: impl Into<String>,
        roles: impl IntoIterator<Item = StepRole>,
    ) -> Result<Self, PipelineBuildError> {
        Self::new(name, roles.into_iter().map(StageSlot::Single).collect())
    }

    /// extraction → embedding → reduction.
    pub fn three_stage() -> Self {
        Self {
            name: Self::THREE_STAGE.to_string(),
            slots: vec![
                StageSlot::Single(StepRole::KeywordExtraction),
                StageSlot::Single(StepRole::WordEmbedding),
                StageSlot::Single(StepRole::DimensionalityReduction),
            ],
        }
    }

    /// extraction → N parallel embeddings → multi-embedding reduction.
    pub fn merge_at_reduction() -> Self {
        Self {
            name: Self::MERGE_AT_REDUCTION.to_string(),
            slots: vec![
                StageSlot::Single(StepRole::KeywordExtraction),
                StageSlot::Parallel(StepRole::WordEmbedding),
                StageSlot::Single(StepRole::MultiEmbeddingReduction),
            ],
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            Self::THREE_STAGE => Some(Self::three_stage()),
            Self::MERGE_AT_REDUCTION => Some(Self::merge_at_reduction()),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slots(&self) -> &[StageSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot index for `role`, if the topology has it.
    pub fn position(&self, role: StepRole) -> Option<usize> {
        self.slots.iter().position(|slot| slot.role() == role)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<String> = self.slots.iter().map(ToString::to_string).collect();
        write!(f, "{} ({})", self.name, stages.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let t = Topology::three_stage();
        assert_eq!(t.len(), 3);
        assert!(t.slots().iter().all(|s| !s.is_parallel()));
        assert_eq!(t.position(StepRole::WordEmbedding), Some(1));
        assert_eq!(t.position(StepRole::MultiEmbeddingReduction), None);

        let m = Topology::merge_at_reduction();
        assert!(m.slots()[1].is_parallel());
        assert_eq!(
            m.to_string(),
            "merge_at_reduction (keyword_extraction -> word_embedding[..] -> multi_embedding_reduction)"
        );
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(Topology::preset("three_stage"), Some(Topology::three_stage()));
        assert_eq!(
            Topology::preset("merge_at_reduction"),
            Some(Topology::merge_at_reduction())
        );
        assert!(Topology::preset("four_stage").is_none());
    }

    #[test]
    fn test_presets_pass_their_own_validation() {
        for preset in [Topology::three_stage(), Topology::merge_at_reduction()] {
            let rebuilt = Topology::new(preset.name(), preset.slots().to_vec()).unwrap();
            assert_eq!(rebuilt, preset);
        }
    }

    #[test]
    fn test_empty_topology_rejected() {
        let err = Topology::new("empty", vec![]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTopology);
    }

    #[test]
    fn test_duplicate_role_rejected() {
        let err = Topology::linear(
            "dup",
            [StepRole::WordEmbedding, StepRole::WordEmbedding],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTopology);
        assert_eq!(err.path, "/topology/stages/1");
    }

    #[test]
    fn test_parallel_final_stage_rejected() {
        let err = Topology::new(
            "open",
            vec![
                StageSlot::Single(StepRole::KeywordExtraction),
                StageSlot::Parallel(StepRole::WordEmbedding),
            ],
        )
        .unwrap_err();
        assert!(err.message.contains("ends in parallel stage"));
    }

    #[test]
    fn test_adjacent_parallel_stages_rejected() {
        let err = Topology::new(
            "zip",
            vec![
                StageSlot::Parallel(StepRole::KeywordExtraction),
                StageSlot::Parallel(StepRole::WordEmbedding),
                StageSlot::Single(StepRole::MultiEmbeddingReduction),
            ],
        )
        .unwrap_err();
        assert_eq!(err.path, "/topology/stages/1");
    }

    #[test]
    fn test_leading_parallel_stage_allowed() {
        let t = Topology::new(
            "fan_from_input",
            vec![
                StageSlot::Parallel(StepRole::KeywordExtraction),
                StageSlot::Single(StepRole::MultiEmbeddingReduction),
            ],
        );
        assert!(t.is_ok());
    }
}
