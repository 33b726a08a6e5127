//! Kaplan-Meier product-limit estimator
//!
//! ```text
//! S(t) = Π_{tᵢ ≤ t} (1 − dᵢ / nᵢ)
//! ```
//!
//! where `nᵢ` is the number still at risk just before `tᵢ` and `dᵢ` the
//! number of events at `tᵢ`. Censored subjects count in `nᵢ` up to and
//! including their censoring time but never cause a drop.
//!
//! Confidence bounds use Greenwood's variance on the log(−log) scale, which
//! keeps both bounds inside [0, 1].

use serde::Serialize;

use super::data::SurvivalData;
use crate::error::{AnalysisError, Result};
use crate::stats::normal_quantile;

/// Slack when comparing the running product against a survival level, so
/// rounding in Π (1 − d/n) does not skip an exact hit such as 12/24.
const LEVEL_TOLERANCE: f64 = 1e-12;

/// One step of the survival table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurvivalPoint {
    pub time: f64,
    /// Subjects at risk just before `time`
    pub at_risk: usize,
    pub events: usize,
    pub censored: usize,
    pub survival: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A fitted survival step function
#[derive(Debug, Clone, Serialize)]
pub struct SurvivalCurve {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub alpha: f64,
    pub n: usize,
    pub n_events: usize,
    pub median: Option<f64>,
    pub points: Vec<SurvivalPoint>,
}

impl SurvivalCurve {
    /// Survival estimate at `t` (right-continuous; 1 before the origin).
    pub fn survival_at(&self, t: f64) -> f64 {
        self.point_at(t).map(|p| p.survival).unwrap_or(1.0)
    }

    /// Confidence bounds at `t`.
    pub fn interval_at(&self, t: f64) -> (f64, f64) {
        self.point_at(t).map(|p| (p.lower, p.upper)).unwrap_or((1.0, 1.0))
    }

    fn point_at(&self, t: f64) -> Option<&SurvivalPoint> {
        let idx = self.points.partition_point(|p| p.time <= t);
        idx.checked_sub(1).map(|i| &self.points[i])
    }

    /// First time at which the estimate drops to or below `level`.
    pub fn time_at_survival(&self, level: f64) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.survival <= level + LEVEL_TOLERANCE)
            .map(|p| p.time)
    }

    /// Median survival time: first time with S(t) ≤ 0.5.
    pub fn median_survival(&self) -> Option<f64> {
        self.time_at_survival(0.5)
    }

    /// Time by which a fraction `p` of subjects have failed, i.e. the first
    /// time with S(t) ≤ 1 − p.
    pub fn quantile(&self, p: f64) -> Option<f64> {
        if !(0.0..=1.0).contains(&p) {
            return None;
        }
        self.time_at_survival(1.0 - p)
    }

    /// Restricted mean survival time, the area under S(t) on [0, horizon].
    pub fn restricted_mean(&self, horizon: f64) -> f64 {
        if horizon <= 0.0 {
            return 0.0;
        }
        let mut area = 0.0;
        let mut current_time = 0.0;
        let mut current_survival = 1.0;
        for point in &self.points {
            if point.time >= horizon {
                break;
            }
            area += current_survival * (point.time - current_time);
            current_time = point.time;
            current_survival = point.survival;
        }
        area + current_survival * (horizon - current_time)
    }

    /// Largest observed time
    pub fn last_time(&self) -> f64 {
        self.points.last().map(|p| p.time).unwrap_or(0.0)
    }
}

/// Kaplan-Meier estimator
#[derive(Debug, Clone)]
pub struct KaplanMeier {
    /// Significance level for the confidence band
    pub alpha: f64,
}

impl Default for KaplanMeier {
    fn default() -> Self {
        Self { alpha: 0.05 }
    }
}

impl KaplanMeier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the significance level (band covers `1 - alpha`)
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Fit the estimator to all subjects.
    pub fn fit(&self, data: &SurvivalData) -> Result<SurvivalCurve> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(AnalysisError::invalid_parameter(
                "alpha",
                format!("{} is outside (0, 1)", self.alpha),
            ));
        }
        Ok(self.fit_arrays(data.durations(), data.events(), None))
    }

    /// Fit one curve per group label, in label order.
    pub fn fit_groups(&self, data: &SurvivalData) -> Result<Vec<SurvivalCurve>> {
        data.split_by_group()?
            .into_iter()
            .map(|(label, part)| {
                let mut curve = self.fit(&part)?;
                curve.label = Some(label);
                Ok(curve)
            })
            .collect()
    }

    pub(crate) fn fit_arrays(&self, durations: &[f64], events: &[bool], label: Option<String>) -> SurvivalCurve {
        let z = normal_quantile(1.0 - self.alpha / 2.0);
        let mut order: Vec<usize> = (0..durations.len()).collect();
        order.sort_by(|&a, &b| durations[a].total_cmp(&durations[b]));

        let n = durations.len();
        let mut points = Vec::new();
        if order.first().map(|&i| durations[i] > 0.0).unwrap_or(true) {
            points.push(SurvivalPoint {
                time: 0.0,
                at_risk: n,
                events: 0,
                censored: 0,
                survival: 1.0,
                lower: 1.0,
                upper: 1.0,
            });
        }

        let mut at_risk = n;
        let mut survival = 1.0;
        let mut greenwood = 0.0;
        let mut i = 0;
        while i < order.len() {
            let time = durations[order[i]];
            let mut deaths = 0;
            let mut censored = 0;
            while i < order.len() && durations[order[i]] == time {
                if events[order[i]] {
                    deaths += 1;
                } else {
                    censored += 1;
                }
                i += 1;
            }

            if deaths > 0 {
                survival *= 1.0 - deaths as f64 / at_risk as f64;
                if at_risk > deaths {
                    greenwood += deaths as f64 / (at_risk as f64 * (at_risk - deaths) as f64);
                } else {
                    greenwood = f64::INFINITY;
                }
            }
            let (lower, upper) = log_log_bounds(survival, greenwood, z);

            points.push(SurvivalPoint {
                time,
                at_risk,
                events: deaths,
                censored,
                survival,
                lower,
                upper,
            });
            at_risk -= deaths + censored;
        }

        let mut curve = SurvivalCurve {
            label,
            alpha: self.alpha,
            n,
            n_events: events.iter().filter(|&&e| e).count(),
            median: None,
            points,
        };
        curve.median = curve.median_survival();
        tracing::debug!(
            n,
            events = curve.n_events,
            steps = curve.points.len(),
            median = ?curve.median,
            "fitted kaplan-meier"
        );
        curve
    }
}

/// Exponential Greenwood bounds: S^{exp(±z·se)}, se = √var / |ln S|.
fn log_log_bounds(survival: f64, greenwood: f64, z: f64) -> (f64, f64) {
    if survival >= 1.0 {
        return (1.0, 1.0);
    }
    if survival <= 0.0 || !greenwood.is_finite() {
        return (0.0, 0.0);
    }
    let log_s = survival.ln();
    let se = greenwood.sqrt() / log_s.abs();
    let lower = survival.powf((z * se).exp());
    let upper = survival.powf((-z * se).exp());
    (lower.clamp(0.0, 1.0), upper.clamp(0.0, 1.0))
}
