//! Stage-boundary hooks for logging, profiling, and debugging.
//!
//! The execution engine calls a [`PipelineObserver`] before and after each
//! stage. Every method has an empty default, so [`NoopObserver`] costs
//! nothing. For a parallel stage the callbacks fire once for the whole stage,
//! after all branches have completed.

use std::time::{Duration, Instant};

use super::artifacts::Value;

/// Measurements for one completed stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    /// Wall-clock time spent in the stage (all branches).
    pub elapsed: Duration,
    /// Number of steps that ran (1 for a single stage).
    pub branches: usize,
    /// Actual shape of the stage's output (see [`Value::describe`]).
    pub output: String,
}

impl StageReport {
    pub fn new(elapsed: Duration, branches: usize, output: &Value) -> Self {
        Self {
            elapsed,
            branches,
            output: output.describe(),
        }
    }
}

/// Measures elapsed time for one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageClock {
    started: Instant,
}

impl StageClock {
    #[inline]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Callbacks invoked by the execution engine at stage boundaries.
pub trait PipelineObserver {
    /// A stage is about to run. `stage` is the stage label, e.g.
    /// `"word_embedding"` or `"word_embedding[..]"`.
    fn on_stage_start(&mut self, _stage: &str) {}

    /// A stage finished successfully.
    fn on_stage_end(&mut self, _stage: &str, _report: &StageReport) {}

    /// The value a stage produced, for debugging.
    fn on_value(&mut self, _stage: &str, _value: &Value) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Observer that records every completed stage, in execution order.
#[derive(Debug, Clone, Default)]
pub struct StageRecorder {
    pub started: Vec<String>,
    pub reports: Vec<(String, StageReport)>,
}

impl StageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total time across all recorded stages.
    pub fn total_elapsed(&self) -> Duration {
        self.reports.iter().map(|(_, r)| r.elapsed).sum()
    }

    /// Labels of completed stages, in order.
    pub fn completed(&self) -> Vec<&str> {
        self.reports.iter().map(|(label, _)| label.as_str()).collect()
    }
}

impl PipelineObserver for StageRecorder {
    fn on_stage_start(&mut self, stage: &str) {
        self.started.push(stage.to_string());
    }

    fn on_stage_end(&mut self, stage: &str, report: &StageReport) {
        self.reports.push((stage.to_string(), report.clone()));
    }
}
