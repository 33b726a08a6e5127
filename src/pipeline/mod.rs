//! Analysis pipelines
//!
//! A JSON [`AnalysisSpec`] is validated by the [`ValidationEngine`] and then
//! executed stage by stage by [`TextPipeline`] and [`SurvivalPipeline`].

pub mod error_code;
pub mod errors;
pub mod observer;
pub mod runner;
pub mod spec;
pub mod validation;

pub use error_code::ErrorCode;
pub use errors::SpecError;
pub use observer::{NoopObserver, PipelineObserver, StageReport, StageTiming, TimingObserver};
pub use runner::{
    load_spec_file, run_spec, run_spec_file, AnalysisReport, SentimentReport, SurvivalPipeline,
    SurvivalReport, TextPipeline, TextReport,
};
pub use spec::{AnalysisSpec, LexiconSpec, SurvivalSpec, TextSpec, SPEC_VERSION};
pub use validation::{Severity, ValidationDiagnostic, ValidationEngine, ValidationReport, ValidationRule};
