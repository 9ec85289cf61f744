//! Spec-driven pipeline builder: maps a [`PipelineSpec`] to an unbuilt
//! [`Pipeline`] by resolving every model entry through a [`StepRegistry`].
//!
//! # Usage
//!
//! ```ignore
//! let spec = PipelineSpec::from_json(json)?;
//! let mut pipeline = SpecPipelineBuilder::new().build(&spec)?;
//! pipeline.build()?;
//! let embedding = pipeline.embed("this is a sentence")?;
//! ```
//!
//! The builder reports definition problems (version, unknown roles or
//! models, rejected options, runtime limits). Shape compatibility is left to
//! [`Pipeline::build`].

use std::str::FromStr;
use std::sync::Arc;

use super::error_code::ErrorCode;
use super::errors::PipelineBuildError;
use super::registry::StepRegistry;
use super::runner::Pipeline;
use super::spec::{PipelineSpec, TopologySpec, SPEC_VERSION};
use super::topology::{StageSlot, Topology};
use super::traits::Step;
use crate::types::StepRole;

/// Resolves chain definitions against a registry.
#[derive(Debug, Clone)]
pub struct SpecPipelineBuilder {
    registry: StepRegistry,
}

impl SpecPipelineBuilder {
    /// A builder over the bundled models.
    pub fn new() -> Self {
        Self {
            registry: StepRegistry::with_defaults(),
        }
    }

    /// Use a custom registry instead of the bundled one.
    pub fn with_registry(mut self, registry: StepRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Build an unbuilt [`Pipeline`] from `spec`.
    pub fn build(&self, spec: &PipelineSpec) -> Result<Pipeline, PipelineBuildError> {
        if spec.v != SPEC_VERSION {
            return Err(PipelineBuildError::new(
                ErrorCode::UnsupportedVersion,
                "/v",
                format!("unsupported definition version {}", spec.v),
            )
            .with_hint(format!("Set \"v\": {SPEC_VERSION}")));
        }

        spec.runtime.validate()?;
        let topology = resolve_topology(&spec.topology)?;

        let mut steps: Vec<(StepRole, Arc<dyn Step>)> = Vec::new();
        for (role_name, entries) in &spec.steps {
            let role = parse_role(role_name, &format!("/steps/{role_name}"))?;
            for (i, entry) in entries.as_slice().iter().enumerate() {
                let path = format!("/steps/{role_name}/{i}");
                let options = serde_json::Value::Object(entry.options.clone());
                let step = match self.registry.create(role, &entry.model, &options) {
                    None => {
                        let known = self.registry.models(role).join(", ");
                        return Err(PipelineBuildError::new(
                            ErrorCode::UnknownModel,
                            format!("{path}/type"),
                            format!("no {role} model named {:?}", entry.model),
                        )
                        .with_hint(format!("Registered {role} models: {known}")));
                    }
                    Some(Err(err)) => {
                        return Err(PipelineBuildError::new(
                            ErrorCode::InvalidValue,
                            path,
                            format!("{role} model {:?} rejected its options: {err}", entry.model),
                        ));
                    }
                    Some(Ok(step)) => step,
                };
                steps.push((role, step));
            }
        }

        tracing::debug!(
            topology = topology.name(),
            steps = steps.len(),
            "resolved pipeline definition"
        );

        Ok(Pipeline::new(topology, steps)?.with_runtime(spec.runtime.clone()))
    }
}

impl Default for SpecPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_role(name: &str, path: &str) -> Result<StepRole, PipelineBuildError> {
    StepRole::from_str(name).map_err(|_| {
        let known: Vec<&str> = StepRole::ALL.iter().map(StepRole::as_str).collect();
        PipelineBuildError::new(
            ErrorCode::UnknownRole,
            path,
            format!("unknown role {name:?}"),
        )
        .with_hint(format!("Valid roles: {}", known.join(", ")))
    })
}

fn resolve_topology(spec: &TopologySpec) -> Result<Topology, PipelineBuildError> {
    match spec {
        TopologySpec::Preset(name) => Topology::preset(name).ok_or_else(|| {
            PipelineBuildError::new(
                ErrorCode::InvalidTopology,
                "/topology",
                format!("unknown topology preset {name:?}"),
            )
            .with_hint(format!(
                "Use {:?}, {:?}, or an inline stage list",
                Topology::THREE_STAGE,
                Topology::MERGE_AT_REDUCTION
            ))
        }),
        TopologySpec::Custom(custom) => {
            let slots = custom
                .stages
                .iter()
                .enumerate()
                .map(|(i, stage)| {
                    let role = parse_role(&stage.role, &format!("/topology/stages/{i}/role"))?;
                    Ok(if stage.parallel {
                        StageSlot::Parallel(role)
                    } else {
                        StageSlot::Single(role)
                    })
                })
                .collect::<Result<Vec<_>, PipelineBuildError>>()?;
            Topology::new(custom.name.clone(), slots)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::runner::BuildState;
    use crate::pipeline::spec::{CustomTopologySpec, StageSpec, StepEntries, StepSpec};

    fn three_stage_json(embed: usize, reduce: usize) -> String {
        format!(
            r#"{{
                "v": 1,
                "steps": {{
                    "keyword_extraction": {{ "type": "dummy", "separator": " " }},
                    "word_embedding": {{ "type": "dummy", "embedding_size": {embed} }},
                    "dimensionality_reduction": {{ "type": "dummy", "reduced_embedding_size": {reduce} }}
                }}
            }}"#
        )
    }

    fn build(json: &str) -> Result<Pipeline, PipelineBuildError> {
        let spec = PipelineSpec::from_json(json).unwrap();
        SpecPipelineBuilder::new().build(&spec)
    }

    #[test]
    fn test_build_three_stage_from_json() {
        let mut pipeline = build(&three_stage_json(256, 16)).unwrap();
        assert_eq!(pipeline.state(), BuildState::Unbuilt);
        pipeline.build().unwrap();
        let embedding = pipeline.embed("this is a sentence").unwrap();
        assert_eq!(embedding.len(), 16);
    }

    #[test]
    fn test_unsupported_version() {
        let err = build(r#"{ "v": 2 }"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedVersion);
        assert_eq!(err.path, "/v");
    }

    #[test]
    fn test_unknown_role() {
        let err = build(r#"{ "v": 1, "steps": { "tokenizer": { "type": "dummy" } } }"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownRole);
        assert_eq!(err.path, "/steps/tokenizer");
    }

    #[test]
    fn test_unknown_model() {
        let err = build(
            r#"{ "v": 1, "steps": { "word_embedding": { "type": "word2vec" } } }"#,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownModel);
        assert_eq!(err.path, "/steps/word_embedding/0/type");
        assert!(err.hint.unwrap().contains("dummy"));
    }

    #[test]
    fn test_rejected_options() {
        let err = build(&three_stage_json(0, 16)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
        assert_eq!(err.path, "/steps/word_embedding/0");
        assert!(err.message.contains("embedding_size"));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = build(r#"{ "v": 1, "runtime": { "max_threads": 0 } }"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::LimitExceeded);
    }

    #[test]
    fn test_unknown_preset() {
        let err = build(r#"{ "v": 1, "topology": "five_stage" }"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTopology);
    }

    #[test]
    fn test_missing_role_entry() {
        let err = build(
            r#"{ "v": 1, "steps": { "keyword_extraction": { "type": "unicode" } } }"#,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingStep);
    }

    #[test]
    fn test_mismatch_surfaces_on_build_not_construction() {
        let mut pipeline = build(
            r#"{
                "v": 1,
                "steps": {
                    "keyword_extraction": { "type": "dummy" },
                    "word_embedding": { "type": "dummy", "embedding_size": 128 },
                    "dimensionality_reduction": {
                        "type": "dummy",
                        "reduced_embedding_size": 16,
                        "input_embedding_size": 256
                    }
                }
            }"#,
        )
        .unwrap();
        let err = pipeline.build().unwrap_err();
        assert_eq!(err.code, ErrorCode::DimensionMismatch);
        assert_eq!(pipeline.state(), BuildState::Invalid);
    }

    #[test]
    fn test_merge_from_typed_spec() {
        let mut spec = PipelineSpec::from_json(r#"{ "v": 1, "topology": "merge_at_reduction" }"#)
            .unwrap();
        spec.steps.insert(
            "keyword_extraction".into(),
            StepEntries::One(StepSpec::new("unicode").with_option("lowercase", true)),
        );
        spec.steps.insert(
            "word_embedding".into(),
            StepEntries::Many(vec![
                StepSpec::new("dummy").with_option("embedding_size", 32),
                StepSpec::new("dummy")
                    .with_option("embedding_size", 32)
                    .with_option("seed", 1),
            ]),
        );
        spec.steps.insert(
            "multi_embedding_reduction".into(),
            StepEntries::One(
                StepSpec::new("dummy")
                    .with_option("reduced_embedding_size", 8)
                    .with_option("branches", 2),
            ),
        );

        let mut pipeline = SpecPipelineBuilder::default().build(&spec).unwrap();
        pipeline.build().unwrap();
        assert_eq!(pipeline.output_dim(), Some(8));
        assert_eq!(pipeline.embed("Merge two embedders").unwrap().len(), 8);
    }

    #[test]
    fn test_custom_topology() {
        let mut spec = PipelineSpec::from_json(&three_stage_json(64, 4)).unwrap();
        spec.topology = TopologySpec::Custom(CustomTopologySpec {
            name: "linear".into(),
            stages: ["keyword_extraction", "word_embedding", "dimensionality_reduction"]
                .iter()
                .map(|role| StageSpec {
                    role: role.to_string(),
                    parallel: false,
                })
                .collect(),
        });
        let mut pipeline = SpecPipelineBuilder::new().build(&spec).unwrap();
        assert_eq!(pipeline.topology().name(), "linear");
        pipeline.build().unwrap();
        assert_eq!(pipeline.output_dim(), Some(4));

        spec.topology = TopologySpec::Custom(CustomTopologySpec {
            name: "bad".into(),
            stages: vec![StageSpec {
                role: "embedder".into(),
                parallel: false,
            }],
        });
        let err = SpecPipelineBuilder::new().build(&spec).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownRole);
        assert_eq!(err.path, "/topology/stages/0/role");
    }

    #[test]
    fn test_runtime_is_applied() {
        let json = three_stage_json(32, 4).replace(
            "\"v\": 1,",
            "\"v\": 1, \"runtime\": { \"single_thread\": true },",
        );
        let pipeline = build(&json).unwrap();
        assert_eq!(pipeline.runtime().effective_threads(), Some(1));
    }
}
