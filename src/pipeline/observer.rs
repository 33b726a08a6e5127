//! Pipeline observer: hooks for logging, profiling, and debugging.
//!
//! Observers receive notifications at stage boundaries without coupling to
//! stage logic. [`TimingObserver`] records per-stage wall time and row
//! counts, which the runners attach to their reports.

use std::time::{Duration, Instant};

use serde::Serialize;

pub const STAGE_LOAD: &str = "load";
pub const STAGE_TOKENIZE: &str = "tokenize";
pub const STAGE_STOPWORDS: &str = "stopwords";
pub const STAGE_FREQUENCY: &str = "frequency";
pub const STAGE_TF_IDF: &str = "tf_idf";
pub const STAGE_SENTIMENT: &str = "sentiment";
pub const STAGE_KAPLAN_MEIER: &str = "kaplan_meier";
pub const STAGE_LOGRANK: &str = "logrank";
pub const STAGE_COX: &str = "cox";
pub const STAGE_PH_TEST: &str = "ph_test";

/// Wall-clock timer for one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageClock(Instant);

impl StageClock {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// What a stage produced
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StageReport {
    pub elapsed: Duration,
    /// Output rows, where the stage yields a table
    pub rows: Option<usize>,
}

impl StageReport {
    pub fn new(elapsed: Duration) -> Self {
        Self { elapsed, rows: None }
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }
}

pub trait PipelineObserver {
    fn on_stage_start(&mut self, _stage: &'static str) {}

    fn on_stage_end(&mut self, _stage: &'static str, _report: &StageReport) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Serializable timing of one stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: &'static str,
    pub millis: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
}

/// Records every finished stage in order.
#[derive(Debug, Clone, Default)]
pub struct TimingObserver {
    stages: Vec<StageTiming>,
}

impl TimingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> &[StageTiming] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<StageTiming> {
        self.stages
    }
}

impl PipelineObserver for TimingObserver {
    fn on_stage_end(&mut self, stage: &'static str, report: &StageReport) {
        tracing::debug!(
            stage,
            elapsed_ms = report.elapsed.as_secs_f64() * 1e3,
            rows = ?report.rows,
            "stage finished"
        );
        self.stages.push(StageTiming {
            stage,
            millis: report.elapsed.as_secs_f64() * 1e3,
            rows: report.rows,
        });
    }
}
