//! # tidysurv
//!
//! Tidy text mining and survival analysis.
//!
//! The text side turns books into a one-token-per-row table
//! ([`nlp::tokenizer`]), removes stop words ([`nlp::stopwords`]), counts and
//! weighs words ([`text`]) and joins them against sentiment lexicons
//! ([`sentiment`]). The survival side fits Kaplan-Meier curves, compares
//! groups with the log-rank test and fits Cox proportional hazards models
//! ([`survival`]).
//!
//! Both sides can be driven from a JSON [`pipeline::AnalysisSpec`]:
//!
//! ```rust,ignore
//! use tidysurv::pipeline::run_spec_file;
//!
//! let report = run_spec_file("analysis.json")?;
//! if let Some(survival) = &report.survival {
//!     println!("{}", tidysurv::report::survival_summary(survival));
//! }
//! ```

pub mod error;
pub mod io;
pub mod nlp;
pub mod pipeline;
pub mod report;
pub mod sentiment;
pub mod stats;
pub mod survival;
pub mod text;
pub mod types;

pub use error::{AnalysisError, Result};
pub use nlp::stopwords::StopwordFilter;
pub use nlp::tokenizer::{unnest_tokens, TokenUnit, Tokenizer};
pub use survival::{CoxModel, CoxPh, KaplanMeier, LogRankTest, SurvivalCurve, SurvivalData};
pub use types::{Document, DocumentId, GroupKey, GroupValue, TokenRecord};
