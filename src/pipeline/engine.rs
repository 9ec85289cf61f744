//! Execution engine: threads a sentence through a built pipeline.
//!
//! Stages run in topological order. A single stage transforms the current
//! value; a parallel stage hands the same borrowed value to every branch,
//! waits for all of them, and passes their outputs on as
//! [`Value::Merged`] in branch order. Each call is independent: nothing is
//! cached between calls and a failing step aborts the whole run.

use std::sync::Arc;

use rayon::prelude::*;

use super::artifacts::Value;
use super::errors::{ShapeViolation, StepExecutionError};
use super::observer::{PipelineObserver, StageClock, StageReport};
use super::runner::{NamedStep, Stage};
use super::shape::ShapeDescriptor;
use crate::types::Embedding;

/// Runs stages; holds only execution settings, never per-call state.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    parallel_branches: bool,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl ExecutionEngine {
    /// Engine that evaluates parallel branches on the global rayon pool.
    pub fn new() -> Self {
        Self {
            parallel_branches: true,
            pool: None,
        }
    }

    /// Evaluate parallel branches one after another on the calling thread.
    pub fn sequential() -> Self {
        Self {
            parallel_branches: false,
            pool: None,
        }
    }

    /// Evaluate parallel branches inside a dedicated pool.
    pub fn with_pool(mut self, pool: Arc<rayon::ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn parallel_branches(&self) -> bool {
        self.parallel_branches
    }

    pub fn pool(&self) -> Option<&Arc<rayon::ThreadPool>> {
        self.pool.as_ref()
    }

    /// Run `stages` on `input` and return the final vector.
    ///
    /// `output_dim` is the dimensionality established at build time; the
    /// final value must be a vector of exactly that length.
    pub fn execute(
        &self,
        stages: &[Stage],
        output_dim: usize,
        input: Value,
        observer: &mut impl PipelineObserver,
    ) -> Result<Embedding, StepExecutionError> {
        let mut current = input;

        for (position, stage) in stages.iter().enumerate() {
            let label = stage.label();
            let _span = tracing::debug_span!("pipeline_stage", stage = %label, position).entered();

            observer.on_stage_start(&label);
            let clock = StageClock::start();

            let output = if stage.is_parallel() {
                Value::Merged(self.run_branches(position, stage.steps(), &current)?)
            } else {
                run_step(position, stage.first(), &current)?
            };

            let report = StageReport::new(clock.elapsed(), stage.steps().len(), &output);
            tracing::trace!(output = %report.output, elapsed_us = report.elapsed.as_micros() as u64, "stage complete");
            observer.on_stage_end(&label, &report);
            observer.on_value(&label, &output);

            current = output;
        }

        finish(stages, output_dim, current)
    }

    /// Run every branch on the same input. All branches complete before the
    /// first failure (in branch order) is returned.
    fn run_branches(
        &self,
        position: usize,
        branches: &[NamedStep],
        input: &Value,
    ) -> Result<Vec<Value>, StepExecutionError> {
        let run = || -> Vec<Result<Value, StepExecutionError>> {
            if self.parallel_branches {
                branches
                    .par_iter()
                    .map(|branch| run_step(position, branch, input))
                    .collect()
            } else {
                branches
                    .iter()
                    .map(|branch| run_step(position, branch, input))
                    .collect()
            }
        };

        let results = match (&self.pool, self.parallel_branches) {
            (Some(pool), true) => pool.install(run),
            _ => run(),
        };

        results.into_iter().collect()
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Transform `input` with one step and verify the output against the step's
/// declared output shape.
fn run_step(
    position: usize,
    named: &NamedStep,
    input: &Value,
) -> Result<Value, StepExecutionError> {
    let output = named.step().transform(input).map_err(|violation| {
        step_failed(position, named, violation)
            .with_hint("The step rejected its input; check the upstream step's output")
    })?;

    named.output_shape().conform(&output).map_err(|violation| {
        step_failed(position, named, violation)
            .with_hint("The step produced output that breaks its declared output shape")
    })?;

    Ok(output)
}

fn step_failed(position: usize, named: &NamedStep, violation: ShapeViolation) -> StepExecutionError {
    tracing::warn!(
        step = named.label(),
        model = named.name(),
        position,
        %violation,
        "step execution failed"
    );
    StepExecutionError::shape_violation(position, named.label(), named.name(), violation)
}

fn finish(
    stages: &[Stage],
    output_dim: usize,
    value: Value,
) -> Result<Embedding, StepExecutionError> {
    let expected = ShapeDescriptor::vector(output_dim);
    match value {
        Value::Vector(values) if values.len() == output_dim => Ok(Embedding::new(values)),
        other => {
            let position = stages.len().saturating_sub(1);
            let violation = ShapeViolation::new(expected, other.describe())
                .with_detail("final value does not match the built output dimensionality");
            match stages.last() {
                Some(stage) => Err(step_failed(position, stage.first(), violation)),
                None => Err(StepExecutionError::shape_violation(
                    position, "output", "none", violation,
                )),
            }
        }
    }
}
