//! Cox proportional hazards regression
//!
//! Fits `h(t | x) = h₀(t) · exp(xβ)` by maximising the partial likelihood
//! with Newton-Raphson, without any parametric form for `h₀`.
//!
//! # Example
//!
//! ```rust,ignore
//! use tidysurv::survival::{CoxPh, SurvivalData};
//!
//! let model = CoxPh::new().fit(&data)?;
//! for c in &model.coefficients {
//!     println!("{}: HR {:.3} (p = {:.4})", c.name, c.hazard_ratio, c.p_value);
//! }
//! ```

pub mod likelihood;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Serialize;

pub use likelihood::Ties;

use super::concordance::concordance_index;
use super::data::SurvivalData;
use crate::error::{AnalysisError, Result};
use crate::stats::linalg::{invert, quadratic_form};
use crate::stats::{chi_square_sf, normal_quantile, normal_two_sided_p};

/// Step-halving attempts per Newton iteration
const MAX_STEP_HALVINGS: usize = 20;

/// Cox regression settings
#[derive(Debug, Clone)]
pub struct CoxPh {
    /// Tie handling (Efron by default)
    pub ties: Ties,
    /// L2 penalty `½·λ·‖β‖²` subtracted from the log partial likelihood
    pub penalizer: f64,
    /// Maximum Newton-Raphson iterations
    pub max_iterations: usize,
    /// Convergence threshold on the Newton step size
    pub tolerance: f64,
    /// Significance level for confidence intervals
    pub alpha: f64,
}

impl Default for CoxPh {
    fn default() -> Self {
        Self {
            ties: Ties::Efron,
            penalizer: 0.0,
            max_iterations: 50,
            tolerance: 1e-9,
            alpha: 0.05,
        }
    }
}

/// Per-covariate estimates
#[derive(Debug, Clone, Serialize)]
pub struct Coefficient {
    pub name: String,
    pub coef: f64,
    /// exp(coef)
    pub hazard_ratio: f64,
    pub se: f64,
    pub z: f64,
    pub p_value: f64,
    pub lower: f64,
    pub upper: f64,
    pub hazard_ratio_lower: f64,
    pub hazard_ratio_upper: f64,
}

/// A chi-square test of all coefficients at once
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GlobalTest {
    pub statistic: f64,
    pub df: usize,
    pub p_value: f64,
}

impl GlobalTest {
    fn new(statistic: f64, df: usize) -> Self {
        let statistic = statistic.max(0.0);
        Self {
            statistic,
            df,
            p_value: chi_square_sf(statistic, df),
        }
    }
}

/// A fitted Cox model. Read-only once produced by [`CoxPh::fit`].
#[derive(Debug, Clone, Serialize)]
pub struct CoxModel {
    pub ties: Ties,
    pub penalizer: f64,
    pub alpha: f64,
    pub n: usize,
    pub n_events: usize,
    pub coefficients: Vec<Coefficient>,
    pub log_likelihood: f64,
    pub null_log_likelihood: f64,
    pub likelihood_ratio_test: GlobalTest,
    pub wald_test: GlobalTest,
    pub score_test: GlobalTest,
    pub concordance: f64,
    /// −2·loglik + 2·p
    pub aic_partial: f64,
    pub iterations: usize,
    pub converged: bool,
    #[serde(skip)]
    pub(crate) beta: Array1<f64>,
    #[serde(skip)]
    pub(crate) variance: Array2<f64>,
    #[serde(skip)]
    pub(crate) means: Array1<f64>,
    /// Breslow cumulative baseline hazard at mean covariates: (time, H₀)
    #[serde(skip)]
    pub(crate) baseline: Vec<(f64, f64)>,
}

impl CoxPh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ties(mut self, ties: Ties) -> Self {
        self.ties = ties;
        self
    }

    pub fn with_penalizer(mut self, penalizer: f64) -> Self {
        self.penalizer = penalizer;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    fn validate(&self, data: &SurvivalData) -> Result<()> {
        if data.n_covariates() == 0 {
            return Err(AnalysisError::EmptyInput("covariates"));
        }
        if data.n_events() == 0 {
            return Err(AnalysisError::NoEvents);
        }
        if !(self.penalizer >= 0.0 && self.penalizer.is_finite()) {
            return Err(AnalysisError::invalid_parameter(
                "penalizer",
                format!("{} must be finite and non-negative", self.penalizer),
            ));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(AnalysisError::invalid_parameter(
                "alpha",
                format!("{} is outside (0, 1)", self.alpha),
            ));
        }
        if self.max_iterations == 0 {
            return Err(AnalysisError::invalid_parameter(
                "max_iterations",
                "at least one iteration is required",
            ));
        }
        Ok(())
    }

    /// Fit the model to every covariate in `data`.
    ///
    /// A run that hits `max_iterations` still returns a model, flagged with
    /// `converged = false`. A singular information matrix is an error.
    pub fn fit(&self, data: &SurvivalData) -> Result<CoxModel> {
        self.validate(data)?;
        let _span = tracing::info_span!("cox_fit", n = data.len(), p = data.n_covariates()).entered();

        let raw = data.covariates();
        let means = raw.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(raw.ncols()));
        let x = raw - &means;
        let durations = data.durations();
        let events = data.events();
        let order = likelihood::descending_order(durations);
        let p = x.ncols();

        let evaluate = |beta: &Array1<f64>| {
            likelihood::evaluate(&x, durations, events, &order, beta, self.ties, self.penalizer)
        };

        let null_eval = evaluate(&Array1::zeros(p));
        let mut beta = Array1::<f64>::zeros(p);
        let mut current = null_eval.clone();
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;
            let inverse = invert(&current.information)?;
            let delta = inverse.dot(&current.gradient);

            let mut step = 1.0;
            let mut candidate = &beta + &(&delta * step);
            let mut next = evaluate(&candidate);
            let mut halvings = 0;
            while (!next.log_likelihood.is_finite() || next.log_likelihood < current.log_likelihood)
                && halvings < MAX_STEP_HALVINGS
            {
                step *= 0.5;
                candidate = &beta + &(&delta * step);
                next = evaluate(&candidate);
                halvings += 1;
            }

            let step_size = delta.iter().fold(0.0f64, |m, v| m.max(v.abs())) * step;
            let improvement = (next.log_likelihood - current.log_likelihood).abs();
            tracing::debug!(
                iteration = iterations,
                log_likelihood = next.log_likelihood,
                step_size,
                halvings,
                "newton step"
            );

            beta = candidate;
            current = next;
            if step_size < self.tolerance || improvement < self.tolerance * 1e-3 {
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::warn!(
                iterations,
                "cox regression did not converge; check for separation or collinear covariates"
            );
        }

        let variance = invert(&current.information)?;
        let z_crit = normal_quantile(1.0 - self.alpha / 2.0);
        let coefficients: Vec<Coefficient> = data
            .covariate_names()
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let coef = beta[j];
                let se = variance[[j, j]].max(0.0).sqrt();
                let z = if se > 0.0 { coef / se } else { f64::NAN };
                let lower = coef - z_crit * se;
                let upper = coef + z_crit * se;
                Coefficient {
                    name: name.clone(),
                    coef,
                    hazard_ratio: coef.exp(),
                    se,
                    z,
                    p_value: normal_two_sided_p(z),
                    lower,
                    upper,
                    hazard_ratio_lower: lower.exp(),
                    hazard_ratio_upper: upper.exp(),
                }
            })
            .collect();

        let likelihood_ratio_test =
            GlobalTest::new(2.0 * (current.log_likelihood - null_eval.log_likelihood), p);
        let wald_test = GlobalTest::new(quadratic_form(&beta, &current.information), p);
        let score_test = GlobalTest::new(
            quadratic_form(&null_eval.gradient, &invert(&null_eval.information)?),
            p,
        );

        let risk: Vec<f64> = x.dot(&beta).to_vec();
        let concordance = concordance_index(durations, &risk, events);
        let baseline = breslow_baseline(&x, durations, events, &order, &beta);

        tracing::info!(
            log_likelihood = current.log_likelihood,
            concordance,
            iterations,
            converged,
            "fitted cox model"
        );

        Ok(CoxModel {
            ties: self.ties,
            penalizer: self.penalizer,
            alpha: self.alpha,
            n: data.len(),
            n_events: data.n_events(),
            coefficients,
            log_likelihood: current.log_likelihood,
            null_log_likelihood: null_eval.log_likelihood,
            likelihood_ratio_test,
            wald_test,
            score_test,
            concordance,
            aic_partial: -2.0 * current.log_likelihood + 2.0 * p as f64,
            iterations,
            converged,
            beta,
            variance,
            means,
            baseline,
        })
    }
}

/// Breslow estimate of the cumulative baseline hazard, ascending in time.
fn breslow_baseline(
    x: &Array2<f64>,
    durations: &[f64],
    events: &[bool],
    order: &[usize],
    beta: &Array1<f64>,
) -> Vec<(f64, f64)> {
    let mut cumulative = 0.0;
    likelihood::event_times(x, durations, events, order, beta, Ties::Breslow)
        .into_iter()
        .map(|et| {
            cumulative += et.deaths as f64 / et.risk_sum;
            (et.time, cumulative)
        })
        .collect()
}

impl CoxModel {
    /// Fitted coefficients in covariate order
    pub fn params(&self) -> &Array1<f64> {
        &self.beta
    }

    /// Covariance matrix of the coefficients
    pub fn variance_matrix(&self) -> &Array2<f64> {
        &self.variance
    }

    /// Covariate means used for centring
    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn covariate_names(&self) -> Vec<&str> {
        self.coefficients.iter().map(|c| c.name.as_str()).collect()
    }

    fn check_width(&self, x: &ArrayView1<f64>) -> Result<()> {
        if x.len() != self.beta.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.beta.len(),
                actual: x.len(),
            });
        }
        Ok(())
    }

    /// `(x − x̄)·β`
    pub fn predict_log_partial_hazard(&self, x: ArrayView1<f64>) -> Result<f64> {
        self.check_width(&x)?;
        Ok((&x - &self.means).dot(&self.beta))
    }

    /// `exp((x − x̄)·β)`, the hazard relative to an average subject
    pub fn predict_partial_hazard(&self, x: ArrayView1<f64>) -> Result<f64> {
        Ok(self.predict_log_partial_hazard(x)?.exp())
    }

    /// Cumulative baseline hazard (at mean covariates) as (time, H₀) steps
    pub fn baseline_cumulative_hazard(&self) -> &[(f64, f64)] {
        &self.baseline
    }

    /// Baseline survival exp(−H₀(t)) at the event times
    pub fn baseline_survival(&self) -> Vec<(f64, f64)> {
        self.baseline.iter().map(|&(t, h)| (t, (-h).exp())).collect()
    }

    /// Predicted survival curve `S(t | x) = exp(−H₀(t)·exp((x − x̄)β))`,
    /// starting at (0, 1).
    pub fn predict_survival(&self, x: ArrayView1<f64>) -> Result<Vec<(f64, f64)>> {
        let relative = self.predict_partial_hazard(x)?;
        let mut curve = Vec::with_capacity(self.baseline.len() + 1);
        if self.baseline.first().map(|&(t, _)| t > 0.0).unwrap_or(true) {
            curve.push((0.0, 1.0));
        }
        curve.extend(self.baseline.iter().map(|&(t, h)| (t, (-h * relative).exp())));
        Ok(curve)
    }

    /// Coefficients whose p-value is below the model's alpha
    pub fn significant(&self) -> impl Iterator<Item = &Coefficient> {
        self.coefficients.iter().filter(move |c| c.p_value < self.alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn single_covariate() -> SurvivalData {
        SurvivalData::new(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            vec![true, true, true, false, true, true, false, true],
        )
        .unwrap()
        .with_covariates(
            vec!["treated".into()],
            array![[1.0], [1.0], [0.0], [1.0], [0.0], [1.0], [0.0], [0.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_fit_converges_and_gradient_vanishes() {
        let data = single_covariate();
        let model = CoxPh::new().fit(&data).unwrap();
        assert!(model.converged);
        assert!(model.iterations < 20);

        let x = data.covariates() - &model.means;
        let order = likelihood::descending_order(data.durations());
        let eval = likelihood::evaluate(
            &x,
            data.durations(),
            data.events(),
            &order,
            &model.beta,
            Ties::Efron,
            0.0,
        );
        assert_abs_diff_eq!(eval.gradient[0], 0.0, epsilon = 1e-6);
        assert!(model.log_likelihood >= model.null_log_likelihood);
    }

    #[test]
    fn test_treated_fail_earlier() {
        let model = CoxPh::new().fit(&single_covariate()).unwrap();
        let c = &model.coefficients[0];
        assert_eq!(c.name, "treated");
        assert!(c.coef > 0.0);
        assert_abs_diff_eq!(c.hazard_ratio, c.coef.exp(), epsilon = 1e-12);
        assert!(c.lower < c.coef && c.coef < c.upper);
        assert!(c.se > 0.0);
        assert!((0.0..=1.0).contains(&c.p_value));
        assert!(model.concordance > 0.5 && model.concordance <= 1.0);
    }

    #[test]
    fn test_global_tests_agree_in_direction() {
        let model = CoxPh::new().fit(&single_covariate()).unwrap();
        for test in [model.likelihood_ratio_test, model.wald_test, model.score_test] {
            assert_eq!(test.df, 1);
            assert!(test.statistic >= 0.0);
            assert!((0.0..=1.0).contains(&test.p_value));
        }
        assert_abs_diff_eq!(
            model.aic_partial,
            -2.0 * model.log_likelihood + 2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_refit_is_deterministic() {
        let data = single_covariate();
        let a = CoxPh::new().fit(&data).unwrap();
        let b = CoxPh::new().fit(&data).unwrap();
        assert_eq!(a.beta, b.beta);
        assert_eq!(a.log_likelihood, b.log_likelihood);
    }

    #[test]
    fn test_breslow_ties() {
        let model = CoxPh::new().with_ties(Ties::Breslow).fit(&single_covariate()).unwrap();
        assert_eq!(model.ties, Ties::Breslow);
        assert!(model.converged);
    }

    #[test]
    fn test_penalizer_shrinks_coefficients() {
        let data = single_covariate();
        let plain = CoxPh::new().fit(&data).unwrap();
        let shrunk = CoxPh::new().with_penalizer(5.0).fit(&data).unwrap();
        assert!(shrunk.beta[0].abs() < plain.beta[0].abs());
    }

    #[test]
    fn test_tiny_unit_covariate_still_fits() {
        let plain_data = single_covariate();
        let tiny = plain_data.covariates() * 1e-7;
        let data = SurvivalData::new(plain_data.durations().to_vec(), plain_data.events().to_vec())
            .unwrap()
            .with_covariates(vec!["treated".into()], tiny)
            .unwrap();
        let plain = CoxPh::new().fit(&plain_data).unwrap();
        let scaled = CoxPh::new().fit(&data).unwrap();
        assert_abs_diff_eq!(scaled.beta[0] * 1e-7, plain.beta[0], epsilon = 1e-4);
        assert_abs_diff_eq!(scaled.log_likelihood, plain.log_likelihood, epsilon = 1e-6);
    }

    #[test]
    fn test_collinear_covariates_are_singular() {
        let data = SurvivalData::new(vec![1.0, 2.0, 3.0, 4.0], vec![true, true, false, true])
            .unwrap()
            .with_covariates(
                vec!["a".into(), "b".into()],
                array![[1.0, 2.0], [0.0, 0.0], [1.0, 2.0], [0.0, 0.0]],
            )
            .unwrap();
        assert!(matches!(CoxPh::new().fit(&data), Err(AnalysisError::SingularMatrix)));
    }

    #[test]
    fn test_no_covariates_rejected() {
        let data = SurvivalData::new(vec![1.0, 2.0], vec![true, true]).unwrap();
        assert!(CoxPh::new().fit(&data).is_err());
    }

    #[test]
    fn test_predictions() {
        let data = single_covariate();
        let model = CoxPh::new().fit(&data).unwrap();
        let treated = array![1.0];
        let control = array![0.0];
        let hr = model.predict_partial_hazard(treated.view()).unwrap()
            / model.predict_partial_hazard(control.view()).unwrap();
        assert_abs_diff_eq!(hr, model.coefficients[0].hazard_ratio, epsilon = 1e-9);

        let s_treated = model.predict_survival(treated.view()).unwrap();
        let s_control = model.predict_survival(control.view()).unwrap();
        assert_eq!(s_treated[0], (0.0, 1.0));
        for (a, b) in s_treated.iter().zip(&s_control) {
            assert!(a.1 <= b.1 + 1e-12);
        }
        assert!(s_treated.windows(2).all(|w| w[1].1 <= w[0].1));
        assert!(model.predict_partial_hazard(array![1.0, 2.0].view()).is_err());
    }

    #[test]
    fn test_baseline_hazard_increasing() {
        let model = CoxPh::new().fit(&single_covariate()).unwrap();
        let baseline = model.baseline_cumulative_hazard();
        assert_eq!(baseline.len(), 6);
        assert!(baseline.windows(2).all(|w| w[1].1 >= w[0].1));
        assert!(model.baseline_survival().iter().all(|&(_, s)| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_max_iterations_reports_non_convergence() {
        let model = CoxPh::new()
            .with_max_iterations(1)
            .with_tolerance(0.0)
            .fit(&single_covariate())
            .unwrap();
        assert_eq!(model.iterations, 1);
        assert!(!model.converged);
    }
}
