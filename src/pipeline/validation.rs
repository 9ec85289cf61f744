//! Compatibility checker: build-time validation of a pipeline's edges.
//!
//! The checker walks the declared topology left to right and compares, on
//! every edge, the producer's declared output shape with the consumer's
//! declared input shape. It never looks at data.
//!
//! Edge numbering:
//!
//! - edge `0` joins the pipeline input (`text`) to stage 0;
//! - edge `i` joins stage `i - 1` to stage `i`;
//! - edge `n` (for `n` stages) joins the final stage to the pipeline output,
//!   which must be a `vector[D]` with a fixed `D`.
//!
//! A fan-out edge (single stage → parallel stage) is checked once per branch.
//! A fan-in edge (parallel stage → merge step) is checked once per branch
//! against the merge step's declared item shape, then the branch count is
//! checked against the merge step's declared branch extent.
//!
//! Unlike a lint pass, the checker stops at the FIRST incompatible edge so
//! the diagnostic is unambiguous.
//!
//! # Quick start
//!
//! ```rust,ignore
//! let checker = CompatibilityChecker::new();
//! let output_dim = checker.check(pipeline.stages())?;
//! ```

use super::error_code::ErrorCode;
use super::errors::{EdgeDiagnostic, PipelineBuildError};
use super::runner::{NamedStep, Stage};
use super::shape::{Extent, Mismatch, ShapeDescriptor, ShapeKind};

/// Label used for the pipeline input on edge 0.
pub const INPUT_LABEL: &str = "input";
/// Label used for the pipeline output on the final edge.
pub const OUTPUT_LABEL: &str = "output";

/// Static validator for a chain of stages.
#[derive(Debug, Clone)]
pub struct CompatibilityChecker {
    input: ShapeDescriptor,
}

impl CompatibilityChecker {
    /// A checker for pipelines whose input is a sentence (`text`).
    pub fn new() -> Self {
        Self {
            input: ShapeDescriptor::Text,
        }
    }

    /// Override the shape fed into stage 0.
    pub fn with_input(mut self, input: ShapeDescriptor) -> Self {
        self.input = input;
        self
    }

    pub fn input(&self) -> &ShapeDescriptor {
        &self.input
    }

    /// Validate every edge and return the embedding dimensionality.
    pub fn check(&self, stages: &[Stage]) -> Result<usize, PipelineBuildError> {
        if stages.is_empty() {
            return Err(PipelineBuildError::new(
                ErrorCode::EmptyPipeline,
                "/stages",
                "pipeline has no stages",
            ));
        }

        let mut upstream: Option<&Stage> = None;

        for (position, stage) in stages.iter().enumerate() {
            match (upstream, stage.is_parallel()) {
                // Pipeline input into a single step or into every branch.
                (None, _) => {
                    for consumer in stage.steps() {
                        check_edge(
                            position,
                            INPUT_LABEL,
                            &self.input,
                            consumer.label(),
                            &consumer.input_shape(),
                        )?;
                    }
                }
                (Some(prev), _) if prev.is_parallel() && stage.is_parallel() => {
                    return Err(PipelineBuildError::new(
                        ErrorCode::InvalidTopology,
                        format!("/edges/{position}"),
                        format!(
                            "parallel stage {} cannot feed parallel stage {} directly",
                            prev.label(),
                            stage.label()
                        ),
                    ));
                }
                // Fan-in: every branch into one merge step.
                (Some(prev), false) if prev.is_parallel() => {
                    check_fan_in(position, prev, stage.first())?;
                }
                // Linear edge, or fan-out into every branch.
                (Some(prev), _) => {
                    let producer = prev.first();
                    let produced = producer.output_shape();
                    for consumer in stage.steps() {
                        check_edge(
                            position,
                            producer.label(),
                            &produced,
                            consumer.label(),
                            &consumer.input_shape(),
                        )?;
                    }
                }
            }
            upstream = Some(stage);
        }

        let last = &stages[stages.len() - 1];
        check_output(stages.len(), last)
    }

    /// List every declared edge in checking order, without validating.
    pub fn edges(&self, stages: &[Stage]) -> Vec<EdgeDiagnostic> {
        let mut out = Vec::new();
        let mut upstream: Option<&Stage> = None;

        for (position, stage) in stages.iter().enumerate() {
            match upstream {
                None => {
                    for consumer in stage.steps() {
                        out.push(edge(
                            position,
                            INPUT_LABEL,
                            &self.input,
                            consumer.label(),
                            &consumer.input_shape(),
                        ));
                    }
                }
                Some(prev) => {
                    for producer in prev.steps() {
                        for consumer in stage.steps() {
                            let declared = consumer.input_shape();
                            // Fan-in: each branch is held to the merge item.
                            let expected = match declared {
                                ShapeDescriptor::Merged { item, .. } if prev.is_parallel() => *item,
                                other => other,
                            };
                            out.push(edge(
                                position,
                                producer.label(),
                                &producer.output_shape(),
                                consumer.label(),
                                &expected,
                            ));
                        }
                    }
                }
            }
            upstream = Some(stage);
        }

        if let Some(last) = stages.last() {
            for producer in last.steps() {
                out.push(edge(
                    stages.len(),
                    producer.label(),
                    &producer.output_shape(),
                    OUTPUT_LABEL,
                    &ShapeDescriptor::Vector { dim: Extent::Any },
                ));
            }
        }

        out
    }
}

impl Default for CompatibilityChecker {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Edge checks ────────────────────────────────────────────────────────────

fn edge(
    position: usize,
    producer: &str,
    produced: &ShapeDescriptor,
    consumer: &str,
    expected: &ShapeDescriptor,
) -> EdgeDiagnostic {
    EdgeDiagnostic {
        position,
        producer: producer.to_string(),
        consumer: consumer.to_string(),
        produced: produced.clone(),
        expected: expected.clone(),
        reason: None,
    }
}

fn check_edge(
    position: usize,
    producer: &str,
    produced: &ShapeDescriptor,
    consumer: &str,
    expected: &ShapeDescriptor,
) -> Result<(), PipelineBuildError> {
    expected.accepts(produced).map_err(|mismatch| {
        mismatch_error(
            edge(position, producer, produced, consumer, expected),
            mismatch,
        )
    })
}

fn check_fan_in(
    position: usize,
    branches: &Stage,
    merge: &NamedStep,
) -> Result<(), PipelineBuildError> {
    let expected = merge.input_shape();
    let count = branches.steps().len();

    let ShapeDescriptor::Merged {
        branches: accepted,
        item,
    } = &expected
    else {
        let first = branches.first().output_shape();
        let produced = ShapeDescriptor::merged(Extent::Fixed(count), first);
        let mismatch = Mismatch::Kind {
            expected: expected.kind(),
            found: ShapeKind::Merged,
        };
        return Err(mismatch_error(
            edge(position, &branches.label(), &produced, merge.label(), &expected),
            mismatch,
        ));
    };

    for branch in branches.steps() {
        check_edge(
            position,
            branch.label(),
            &branch.output_shape(),
            merge.label(),
            item,
        )?;
    }

    if !accepted.admits(count) {
        let produced =
            ShapeDescriptor::merged(Extent::Fixed(count), branches.first().output_shape());
        let mismatch = Mismatch::BranchCount {
            expected: *accepted,
            found: Extent::Fixed(count),
        };
        return Err(mismatch_error(
            edge(position, &branches.label(), &produced, merge.label(), &expected),
            mismatch,
        ));
    }

    Ok(())
}

fn check_output(position: usize, last: &Stage) -> Result<usize, PipelineBuildError> {
    let producer = last.first();
    let produced = producer.output_shape();
    let expected = ShapeDescriptor::Vector { dim: Extent::Any };

    match &produced {
        ShapeDescriptor::Vector {
            dim: Extent::Fixed(dim),
        } => Ok(*dim),
        ShapeDescriptor::Vector { .. } => Err(PipelineBuildError::incompatible_edge(
            ErrorCode::UnboundedOutput,
            edge(position, producer.label(), &produced, OUTPUT_LABEL, &expected),
            "the final step must declare a fixed output dimensionality",
        )
        .with_hint("Configure the final step with an explicit output size")),
        other => {
            let mismatch = Mismatch::Kind {
                expected: ShapeKind::Vector,
                found: other.kind(),
            };
            Err(mismatch_error(
                edge(position, producer.label(), other, OUTPUT_LABEL, &expected),
                mismatch,
            ))
        }
    }
}

fn mismatch_error(mut edge: EdgeDiagnostic, mismatch: Mismatch) -> PipelineBuildError {
    let hint = match mismatch {
        Mismatch::Kind { expected, found } => format!(
            "{} must receive {expected} values; {} produces {found}",
            edge.consumer, edge.producer
        ),
        Mismatch::Dimension { .. } => {
            "Configure the producer's output dimensionality to match the consumer's input"
                .to_string()
        }
        Mismatch::Count { .. } => {
            "Declare a variable count on the consumer, or fix the producer's count".to_string()
        }
        Mismatch::BranchCount { expected, .. } => format!(
            "Supply {expected} parallel branches, or declare the merge step with a variable branch count"
        ),
    };
    edge.reason = Some(mismatch);
    PipelineBuildError::incompatible_edge(mismatch.code(), edge, mismatch.to_string())
        .with_hint(hint)
}
