//! Survival analysis
//!
//! Kaplan-Meier curves, log-rank group comparison, Cox proportional hazards
//! regression and its proportional-hazards diagnostic. Every estimator
//! takes a validated [`SurvivalData`].

pub mod concordance;
pub mod cox;
pub mod data;
pub mod kaplan_meier;
pub mod logrank;
pub mod ph_test;

pub use concordance::concordance_index;
pub use cox::{Coefficient, CoxModel, CoxPh, GlobalTest, Ties};
pub use data::{SurvivalData, SurvivalRecord};
pub use kaplan_meier::{KaplanMeier, SurvivalCurve, SurvivalPoint};
pub use logrank::{logrank_test, GroupSummary, LogRankResult, LogRankTest, Weighting, SIGNIFICANCE_LEVEL};
pub use ph_test::{
    proportional_hazard_test, schoenfeld_residuals, CovariateTest, PhTestResult, SchoenfeldResidual,
    TimeTransform,
};
