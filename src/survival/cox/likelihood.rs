//! Cox partial likelihood, its gradient and information matrix.
//!
//! Subjects are swept in descending time order so the risk-set sums
//! `S0 = Σ exp(xβ)`, `S1 = Σ exp(xβ)·x` and `S2 = Σ exp(xβ)·xxᵀ` only ever
//! grow. Tied event times are handled with Efron's or Breslow's
//! approximation.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Handling of tied event times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ties {
    #[default]
    Efron,
    Breslow,
}

impl Ties {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Efron => "efron",
            Self::Breslow => "breslow",
        }
    }

    /// Fraction of the tied events' weight removed from the risk set at the
    /// `l`-th of `d` tied events.
    fn phi(&self, l: usize, d: usize) -> f64 {
        match self {
            Self::Efron => l as f64 / d as f64,
            Self::Breslow => 0.0,
        }
    }
}

/// Log partial likelihood with first and (negated) second derivatives
#[derive(Debug, Clone)]
pub(crate) struct LikelihoodEval {
    pub log_likelihood: f64,
    pub gradient: Array1<f64>,
    pub information: Array2<f64>,
}

/// Per event-time quantities collected during one sweep.
#[derive(Debug, Clone)]
pub(crate) struct EventTime {
    pub time: f64,
    pub deaths: usize,
    /// Σ exp(xβ) over the risk set
    pub risk_sum: f64,
    /// Subjects failing at this time
    pub subjects: Vec<usize>,
    /// Weighted covariate mean of the risk set (Efron-averaged over the
    /// tied events)
    pub mean_covariates: Array1<f64>,
}

/// Indices sorted by descending duration.
pub(crate) fn descending_order(durations: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..durations.len()).collect();
    order.sort_by(|&a, &b| durations[b].total_cmp(&durations[a]));
    order
}

/// Evaluate the partial likelihood at `beta`.
///
/// `x` should be centred; the likelihood is invariant to centring but the
/// exponentials stay well scaled.
pub(crate) fn evaluate(
    x: &Array2<f64>,
    durations: &[f64],
    events: &[bool],
    order: &[usize],
    beta: &Array1<f64>,
    ties: Ties,
    penalizer: f64,
) -> LikelihoodEval {
    let p = x.ncols();
    let mut log_likelihood = 0.0;
    let mut gradient = Array1::<f64>::zeros(p);
    let mut information = Array2::<f64>::zeros((p, p));

    sweep(x, durations, events, order, beta, |sums| {
        let d = sums.deaths;
        log_likelihood += sums.event_linear_predictor;
        gradient += &sums.event_x;
        for l in 0..d {
            let phi = ties.phi(l, d);
            let s0 = sums.s0 - phi * sums.s0_d;
            let s1 = &sums.s1 - &(&sums.s1_d * phi);
            let s2 = &sums.s2 - &(&sums.s2_d * phi);
            let mean = &s1 / s0;
            log_likelihood -= s0.ln();
            gradient -= &mean;
            information += &(&s2 / s0);
            information -= &outer(mean.view(), mean.view());
        }
    });

    if penalizer > 0.0 {
        log_likelihood -= 0.5 * penalizer * beta.dot(beta);
        gradient.scaled_add(-penalizer, beta);
        for j in 0..p {
            information[[j, j]] += penalizer;
        }
    }

    LikelihoodEval {
        log_likelihood,
        gradient,
        information,
    }
}

/// Collect per event-time risk-set quantities at `beta`, in ascending time
/// order.
pub(crate) fn event_times(
    x: &Array2<f64>,
    durations: &[f64],
    events: &[bool],
    order: &[usize],
    beta: &Array1<f64>,
    ties: Ties,
) -> Vec<EventTime> {
    let p = x.ncols();
    let mut out = Vec::new();
    sweep(x, durations, events, order, beta, |sums| {
        let d = sums.deaths;
        let mut mean = Array1::<f64>::zeros(p);
        for l in 0..d {
            let phi = ties.phi(l, d);
            let s0 = sums.s0 - phi * sums.s0_d;
            let s1 = &sums.s1 - &(&sums.s1_d * phi);
            mean += &(&s1 / s0);
        }
        mean /= d as f64;
        out.push(EventTime {
            time: sums.time,
            deaths: d,
            risk_sum: sums.s0,
            subjects: sums.event_subjects.clone(),
            mean_covariates: mean,
        });
    });
    out.reverse();
    out
}

struct RiskSums {
    time: f64,
    deaths: usize,
    s0: f64,
    s1: Array1<f64>,
    s2: Array2<f64>,
    s0_d: f64,
    s1_d: Array1<f64>,
    s2_d: Array2<f64>,
    event_x: Array1<f64>,
    event_linear_predictor: f64,
    event_subjects: Vec<usize>,
}

/// Walk distinct times from latest to earliest, calling `on_event` for
/// every time with at least one event once the risk set is complete.
fn sweep<F>(
    x: &Array2<f64>,
    durations: &[f64],
    events: &[bool],
    order: &[usize],
    beta: &Array1<f64>,
    mut on_event: F,
) where
    F: FnMut(&RiskSums),
{
    let p = x.ncols();
    let mut sums = RiskSums {
        time: 0.0,
        deaths: 0,
        s0: 0.0,
        s1: Array1::zeros(p),
        s2: Array2::zeros((p, p)),
        s0_d: 0.0,
        s1_d: Array1::zeros(p),
        s2_d: Array2::zeros((p, p)),
        event_x: Array1::zeros(p),
        event_linear_predictor: 0.0,
        event_subjects: Vec::new(),
    };

    let mut i = 0;
    while i < order.len() {
        let time = durations[order[i]];
        sums.time = time;
        sums.deaths = 0;
        sums.s0_d = 0.0;
        sums.s1_d.fill(0.0);
        sums.s2_d.fill(0.0);
        sums.event_x.fill(0.0);
        sums.event_linear_predictor = 0.0;
        sums.event_subjects.clear();

        while i < order.len() && durations[order[i]] == time {
            let subject = order[i];
            let row = x.row(subject);
            let eta = row.dot(beta);
            let w = eta.exp();
            let wx = &row * w;
            let wxx = outer(row, row) * w;

            sums.s0 += w;
            sums.s1 += &wx;
            sums.s2 += &wxx;
            if events[subject] {
                sums.deaths += 1;
                sums.s0_d += w;
                sums.s1_d += &wx;
                sums.s2_d += &wxx;
                sums.event_x += &row;
                sums.event_linear_predictor += eta;
                sums.event_subjects.push(subject);
            }
            i += 1;
        }

        if sums.deaths > 0 {
            on_event(&sums);
        }
    }
}

fn outer(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Array2<f64> {
    let p = a.len();
    let mut out = Array2::<f64>::zeros((p, b.len()));
    for i in 0..p {
        for j in 0..b.len() {
            out[[i, j]] = a[i] * b[j];
        }
    }
    out
}
