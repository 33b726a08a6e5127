//! Proportional-hazards diagnostic
//!
//! Under proportional hazards the scaled Schoenfeld residuals of each
//! covariate show no trend in time. The Grambsch-Therneau score statistic
//! for covariate `k` against a time transform `g` is
//!
//! ```text
//! T_k = (Σ (g_i − ḡ) r*_ik)² / (d · V_kk · Σ (g_i − ḡ)²),   r* = d · V · r
//! ```
//!
//! with `d` the number of events and `V` the coefficient covariance. The
//! global test uses the full `V` and has one degree of freedom per
//! covariate. A violation is reported, never corrected.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::cox::likelihood::{descending_order, event_times};
use super::cox::{CoxModel, GlobalTest};
use super::data::SurvivalData;
use super::kaplan_meier::KaplanMeier;
use crate::error::{AnalysisError, Result};
use crate::stats::chi_square_sf;
use crate::stats::linalg::quadratic_form;

/// Function of event time the residuals are correlated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeTransform {
    /// Rank of the event time
    #[default]
    Rank,
    Identity,
    Log,
    /// 1 − KM(t) of the pooled data
    Km,
}

impl TimeTransform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rank => "rank",
            Self::Identity => "identity",
            Self::Log => "log",
            Self::Km => "km",
        }
    }
}

/// Schoenfeld residual of one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchoenfeldResidual {
    pub subject: usize,
    pub time: f64,
    pub residual: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CovariateTest {
    pub name: String,
    pub statistic: f64,
    pub p_value: f64,
    /// `p_value < alpha`
    pub violated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhTestResult {
    pub transform: TimeTransform,
    pub alpha: f64,
    pub covariates: Vec<CovariateTest>,
    pub global: GlobalTest,
}

impl PhTestResult {
    /// Covariates that fail the assumption
    pub fn violations(&self) -> impl Iterator<Item = &CovariateTest> {
        self.covariates.iter().filter(|c| c.violated)
    }

    pub fn assumption_holds(&self) -> bool {
        self.violations().next().is_none() && self.global.p_value >= self.alpha
    }
}

fn check_model(model: &CoxModel, data: &SurvivalData) -> Result<()> {
    if data.n_covariates() != model.params().len() {
        return Err(AnalysisError::DimensionMismatch {
            expected: model.params().len(),
            actual: data.n_covariates(),
        });
    }
    Ok(())
}

/// Unscaled Schoenfeld residuals `x_i − x̄(t_i)`, one per event, in
/// ascending time order.
pub fn schoenfeld_residuals(model: &CoxModel, data: &SurvivalData) -> Result<Vec<SchoenfeldResidual>> {
    check_model(model, data)?;
    let x = data.covariates() - model.means();
    let order = descending_order(data.durations());
    let times = event_times(&x, data.durations(), data.events(), &order, model.params(), model.ties);

    let mut residuals = Vec::with_capacity(data.n_events());
    for et in times {
        for &subject in &et.subjects {
            let r = &x.row(subject) - &et.mean_covariates;
            residuals.push(SchoenfeldResidual {
                subject,
                time: et.time,
                residual: r.to_vec(),
            });
        }
    }
    Ok(residuals)
}

/// Test the proportional-hazards assumption of a fitted model on its
/// training data.
pub fn proportional_hazard_test(
    model: &CoxModel,
    data: &SurvivalData,
    transform: TimeTransform,
) -> Result<PhTestResult> {
    let residuals = schoenfeld_residuals(model, data)?;
    let d = residuals.len();
    let p = model.params().len();
    if d < 2 {
        return Err(AnalysisError::NoEvents);
    }

    let times: Vec<f64> = residuals.iter().map(|r| r.time).collect();
    let g = transform_times(&times, transform, data)?;
    let g_mean = g.iter().sum::<f64>() / d as f64;
    let centered: Vec<f64> = g.iter().map(|v| v - g_mean).collect();
    let ss: f64 = centered.iter().map(|v| v * v).sum();
    if ss <= 0.0 {
        return Err(AnalysisError::invalid_parameter(
            "transform",
            "transformed event times are constant",
        ));
    }

    let mut u = Array1::<f64>::zeros(p);
    for (r, c) in residuals.iter().zip(&centered) {
        for k in 0..p {
            u[k] += c * r.residual[k];
        }
    }

    let variance = model.variance_matrix();
    let scaled = variance.dot(&u) * d as f64;
    let covariates = model
        .covariate_names()
        .into_iter()
        .enumerate()
        .map(|(k, name)| {
            let vkk = variance[[k, k]];
            let statistic = if vkk > 0.0 {
                scaled[k] * scaled[k] / (d as f64 * vkk * ss)
            } else {
                0.0
            };
            let p_value = chi_square_sf(statistic, 1);
            CovariateTest {
                name: name.to_string(),
                statistic,
                p_value,
                violated: p_value < model.alpha,
            }
        })
        .collect::<Vec<_>>();

    let global_statistic = d as f64 * quadratic_form(&u, variance) / ss;
    let result = PhTestResult {
        transform,
        alpha: model.alpha,
        covariates,
        global: GlobalTest {
            statistic: global_statistic.max(0.0),
            df: p,
            p_value: chi_square_sf(global_statistic.max(0.0), p),
        },
    };

    for violation in result.violations() {
        tracing::warn!(
            covariate = violation.name.as_str(),
            p_value = violation.p_value,
            "proportional hazards assumption violated"
        );
    }
    Ok(result)
}

fn transform_times(times: &[f64], transform: TimeTransform, data: &SurvivalData) -> Result<Vec<f64>> {
    Ok(match transform {
        TimeTransform::Identity => times.to_vec(),
        TimeTransform::Log => {
            if times.iter().any(|&t| t <= 0.0) {
                return Err(AnalysisError::invalid_parameter(
                    "transform",
                    "log transform needs positive event times",
                ));
            }
            times.iter().map(|t| t.ln()).collect()
        }
        TimeTransform::Rank => average_ranks(times),
        TimeTransform::Km => {
            let curve = KaplanMeier::new().fit(data)?;
            times.iter().map(|&t| 1.0 - curve.survival_at(t)).collect()
        }
    })
}

/// 1-based ranks with ties sharing their average rank.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survival::cox::CoxPh;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn proportional_data() -> SurvivalData {
        // Treated subjects fail at a steady multiple of the control rate
        let durations = vec![
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0,
        ];
        let events = vec![
            true, true, false, true, true, true, false, true, true, true, true, false, true, true,
            true, true,
        ];
        let x = [1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        SurvivalData::new(durations, events)
            .unwrap()
            .with_covariates(vec!["x".into()], Array2::from_shape_vec((16, 1), x.to_vec()).unwrap())
            .unwrap()
    }

    #[test]
    fn test_residuals_sum_to_zero_at_mle() {
        let data = proportional_data();
        let model = CoxPh::new().fit(&data).unwrap();
        let residuals = schoenfeld_residuals(&model, &data).unwrap();
        assert_eq!(residuals.len(), data.n_events());
        let total: f64 = residuals.iter().map(|r| r.residual[0]).sum();
        assert_abs_diff_eq!(total, 0.0, epsilon = 1e-6);
        assert!(residuals.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn test_statistics_well_formed_for_every_transform() {
        let data = proportional_data();
        let model = CoxPh::new().fit(&data).unwrap();
        for transform in [
            TimeTransform::Rank,
            TimeTransform::Identity,
            TimeTransform::Log,
            TimeTransform::Km,
        ] {
            let result = proportional_hazard_test(&model, &data, transform).unwrap();
            assert_eq!(result.covariates.len(), 1);
            let test = &result.covariates[0];
            assert!(test.statistic >= 0.0);
            assert!((0.0..=1.0).contains(&test.p_value));
            // one covariate: the global test equals the covariate test
            assert_abs_diff_eq!(result.global.statistic, test.statistic, epsilon = 1e-9);
            assert_eq!(result.global.df, 1);
        }
    }

    #[test]
    fn test_crossing_hazards_detected() {
        // Group 1 dies early, group 0 only late: hazard ratio flips over time
        let mut durations = Vec::new();
        let mut events = Vec::new();
        let mut x = Vec::new();
        for i in 0..20 {
            durations.push(1.0 + i as f64 * 0.1);
            events.push(true);
            x.push(1.0);
        }
        for i in 0..20 {
            durations.push(1.05 + i as f64 * 0.1);
            events.push(i >= 10);
            x.push(0.0);
        }
        for i in 0..20 {
            durations.push(10.0 + i as f64);
            events.push(true);
            x.push(0.0);
        }
        for i in 0..5 {
            durations.push(10.5 + i as f64 * 4.0);
            events.push(false);
            x.push(1.0);
        }
        let n = durations.len();
        let data = SurvivalData::new(durations, events)
            .unwrap()
            .with_covariates(vec!["x".into()], Array2::from_shape_vec((n, 1), x).unwrap())
            .unwrap();
        let model = CoxPh::new().fit(&data).unwrap();
        let result = proportional_hazard_test(&model, &data, TimeTransform::Rank).unwrap();
        assert!(result.covariates[0].violated);
        assert!(!result.assumption_holds());
    }

    #[test]
    fn test_average_ranks() {
        assert_eq!(average_ranks(&[3.0, 1.0, 3.0, 2.0]), vec![3.5, 1.0, 3.5, 2.0]);
    }

    #[test]
    fn test_mismatched_data_rejected() {
        let data = proportional_data();
        let model = CoxPh::new().fit(&data).unwrap();
        let other = SurvivalData::new(vec![1.0, 2.0], vec![true, true]).unwrap();
        assert!(schoenfeld_residuals(&model, &other).is_err());
    }
}
