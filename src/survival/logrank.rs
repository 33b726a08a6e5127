//! Log-rank test and its weighted relatives
//!
//! At every distinct event time the observed events in each group are
//! compared with the number expected if all groups shared one hazard:
//!
//! ```text
//! Z_j  = Σ_t w_t (d_jt − d_t n_jt / n_t)
//! V_jk = Σ_t w_t² d_t (n_t − d_t) / (n_t − 1) · n_jt / n_t (δ_jk − n_kt / n_t)
//! χ²   = Zᵀ V⁻¹ Z      over the first K − 1 groups, df = K − 1
//! ```

use serde::{Deserialize, Serialize};

use super::data::SurvivalData;
use crate::error::{AnalysisError, Result};
use crate::stats::chi_square_sf;
use crate::stats::linalg::{invert, quadratic_form};

/// Significance threshold used for the reported decision
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Weight applied at each event time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    /// w = 1
    #[default]
    LogRank,
    /// w = n (Gehan-Breslow)
    Wilcoxon,
    /// w = √n
    TaroneWare,
    /// w = Π (1 − d / (n + 1)), the Peto-Peto survival estimate
    Peto,
}

impl Weighting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LogRank => "log_rank",
            Self::Wilcoxon => "wilcoxon",
            Self::TaroneWare => "tarone_ware",
            Self::Peto => "peto",
        }
    }
}

/// Observed and expected events for one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub label: String,
    pub n: usize,
    pub observed: f64,
    pub expected: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogRankResult {
    pub weighting: Weighting,
    pub statistic: f64,
    pub df: usize,
    pub p_value: f64,
    pub alpha: f64,
    /// `p_value < alpha`
    pub significant: bool,
    pub groups: Vec<GroupSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct LogRankTest {
    weighting: Weighting,
}

impl LogRankTest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Compare the groups labelled in `data`.
    pub fn test(&self, data: &SurvivalData) -> Result<LogRankResult> {
        let groups = data.group_indices()?;
        let labels: Vec<String> = groups.keys().cloned().collect();
        let mut membership = vec![0usize; data.len()];
        for (g, indices) in groups.values().enumerate() {
            for &i in indices {
                membership[i] = g;
            }
        }
        self.test_membership(data.durations(), data.events(), &membership, labels)
    }

    /// Compare separately supplied samples, labelled in order.
    pub fn compare(&self, samples: &[(&str, &SurvivalData)]) -> Result<LogRankResult> {
        let mut durations = Vec::new();
        let mut events = Vec::new();
        let mut membership = Vec::new();
        for (g, (_, sample)) in samples.iter().enumerate() {
            durations.extend_from_slice(sample.durations());
            events.extend_from_slice(sample.events());
            membership.extend(std::iter::repeat(g).take(sample.len()));
        }
        let labels = samples.iter().map(|(l, _)| l.to_string()).collect();
        self.test_membership(&durations, &events, &membership, labels)
    }

    fn test_membership(
        &self,
        durations: &[f64],
        events: &[bool],
        membership: &[usize],
        labels: Vec<String>,
    ) -> Result<LogRankResult> {
        let k = labels.len();
        if k < 2 {
            return Err(AnalysisError::TooFewGroups(k));
        }
        if !events.iter().any(|&e| e) {
            return Err(AnalysisError::NoEvents);
        }

        let mut order: Vec<usize> = (0..durations.len()).collect();
        order.sort_by(|&a, &b| durations[a].total_cmp(&durations[b]));

        let mut at_risk = vec![0usize; k];
        for &g in membership {
            at_risk[g] += 1;
        }
        let sizes = at_risk.clone();

        let mut observed = vec![0.0; k];
        let mut expected = vec![0.0; k];
        let mut z = vec![0.0; k];
        let mut v = ndarray::Array2::<f64>::zeros((k, k));
        let mut peto_survival = 1.0;

        let mut i = 0;
        while i < order.len() {
            let time = durations[order[i]];
            let mut deaths = vec![0usize; k];
            let mut leaving = vec![0usize; k];
            while i < order.len() && durations[order[i]] == time {
                let subject = order[i];
                let g = membership[subject];
                leaving[g] += 1;
                if events[subject] {
                    deaths[g] += 1;
                }
                i += 1;
            }

            let d: usize = deaths.iter().sum();
            let n: usize = at_risk.iter().sum();
            if d > 0 && n > 0 {
                let (nf, df) = (n as f64, d as f64);
                if self.weighting == Weighting::Peto {
                    peto_survival *= 1.0 - df / (nf + 1.0);
                }
                let w = match self.weighting {
                    Weighting::LogRank => 1.0,
                    Weighting::Wilcoxon => nf,
                    Weighting::TaroneWare => nf.sqrt(),
                    Weighting::Peto => peto_survival,
                };

                for j in 0..k {
                    let share = at_risk[j] as f64 / nf;
                    let e = df * share;
                    observed[j] += deaths[j] as f64;
                    expected[j] += e;
                    z[j] += w * (deaths[j] as f64 - e);
                }
                if n > 1 {
                    let factor = w * w * df * (nf - df) / (nf - 1.0);
                    for j in 0..k {
                        let share_j = at_risk[j] as f64 / nf;
                        for l in 0..k {
                            let share_l = at_risk[l] as f64 / nf;
                            let delta = if j == l { 1.0 } else { 0.0 };
                            v[[j, l]] += factor * share_j * (delta - share_l);
                        }
                    }
                }
            }

            for g in 0..k {
                at_risk[g] -= leaving[g];
            }
        }

        // Groups never at risk at an event time carry no information.
        let active: Vec<usize> = (0..k).filter(|&j| expected[j] > 0.0).collect();
        if active.len() < 2 {
            return Err(AnalysisError::TooFewGroups(active.len()));
        }
        if active.len() < k {
            tracing::debug!(
                dropped = k - active.len(),
                "groups without expected events left out of the statistic"
            );
        }
        let kept = &active[..active.len() - 1];
        let reduced_v = ndarray::Array2::from_shape_fn((kept.len(), kept.len()), |(r, c)| v[[kept[r], kept[c]]]);
        let reduced_z = ndarray::Array1::from_iter(kept.iter().map(|&j| z[j]));
        let statistic = if reduced_z.iter().all(|&x| x.abs() < 1e-12) {
            0.0
        } else {
            quadratic_form(&reduced_z, &invert(&reduced_v)?).max(0.0)
        };
        let df = active.len() - 1;
        let p_value = chi_square_sf(statistic, df);

        tracing::debug!(
            weighting = self.weighting.as_str(),
            statistic,
            df,
            p_value,
            "log-rank test"
        );

        Ok(LogRankResult {
            weighting: self.weighting,
            statistic,
            df,
            p_value,
            alpha: SIGNIFICANCE_LEVEL,
            significant: p_value < SIGNIFICANCE_LEVEL,
            groups: labels
                .into_iter()
                .enumerate()
                .map(|(j, label)| GroupSummary {
                    label,
                    n: sizes[j],
                    observed: observed[j],
                    expected: expected[j],
                })
                .collect(),
        })
    }
}

/// Unweighted log-rank test over the groups labelled in `data`.
pub fn logrank_test(data: &SurvivalData) -> Result<LogRankResult> {
    LogRankTest::new().test(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn two_groups() -> SurvivalData {
        // Group a fails early, group b late
        SurvivalData::new(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 10.0, 11.0, 12.0, 13.0, 14.0],
            vec![true; 10],
        )
        .unwrap()
        .with_groups(
            ["a", "a", "a", "a", "a", "b", "b", "b", "b", "b"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_separated_groups_significant() {
        let result = logrank_test(&two_groups()).unwrap();
        assert_eq!(result.df, 1);
        assert!(result.significant);
        assert!(result.p_value < 0.01);
        assert_abs_diff_eq!(result.groups[0].observed, 5.0, epsilon = 1e-12);
        let total_expected: f64 = result.groups.iter().map(|g| g.expected).sum();
        assert_abs_diff_eq!(total_expected, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_hand_computed_statistic() {
        // a: 1 (event), 3 (event); b: 2 (event), 4 (censored)
        let data = SurvivalData::new(vec![1.0, 3.0, 2.0, 4.0], vec![true, true, true, false])
            .unwrap()
            .with_groups(vec!["a".into(), "a".into(), "b".into(), "b".into()])
            .unwrap();
        let result = logrank_test(&data).unwrap();
        // t=1: n=4 (2,2) d=1 -> E_a = .5, V = .25
        // t=2: n=3 (1,2) d=1 -> E_a = 1/3, V = 2/9
        // t=3: n=2 (1,1) d=1 -> E_a = .5, V = .25
        let e_a = 0.5 + 1.0 / 3.0 + 0.5;
        let var = 0.25 + 2.0 / 9.0 + 0.25;
        let expected_stat = (2.0 - e_a) * (2.0 - e_a) / var;
        assert_abs_diff_eq!(result.groups[0].expected, e_a, epsilon = 1e-12);
        assert_abs_diff_eq!(result.statistic, expected_stat, epsilon = 1e-12);
    }

    #[test]
    fn test_identical_groups_not_significant() {
        let durations = vec![1.0, 3.0, 4.0, 7.0, 9.0];
        let events = vec![true, false, true, true, false];
        let a = SurvivalData::new(durations.clone(), events.clone()).unwrap();
        let b = SurvivalData::new(durations, events).unwrap();
        let result = LogRankTest::new().compare(&[("a", &a), ("b", &b)]).unwrap();
        assert_abs_diff_eq!(result.statistic, 0.0, epsilon = 1e-12);
        assert!(result.p_value > 0.05);
        assert!(!result.significant);
    }

    #[test]
    fn test_three_groups_df() {
        let data = SurvivalData::new(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
            vec![true; 9],
        )
        .unwrap()
        .with_groups(
            ["x", "y", "z", "x", "y", "z", "x", "y", "z"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap();
        let result = logrank_test(&data).unwrap();
        assert_eq!(result.df, 2);
        assert!(result.statistic >= 0.0);
        assert!((0.0..=1.0).contains(&result.p_value));
    }

    #[test]
    fn test_weightings_all_detect_separation() {
        for weighting in [Weighting::Wilcoxon, Weighting::TaroneWare, Weighting::Peto] {
            let result = LogRankTest::new()
                .with_weighting(weighting)
                .test(&two_groups())
                .unwrap();
            assert!(result.significant, "{weighting:?}");
            assert_eq!(result.weighting, weighting);
        }
    }

    #[test]
    fn test_group_censored_before_first_event_is_left_out() {
        // c is censored at 0.5, before any event, so it is never at risk
        let mut durations: Vec<f64> = (1..=6).map(f64::from).collect();
        durations.extend((1..=6).map(|t| f64::from(t) + 0.5));
        durations.push(0.5);
        let mut events = vec![true; 12];
        events.push(false);
        let mut groups: Vec<String> = vec!["a".into(); 6];
        groups.extend(vec!["b".to_string(); 6]);
        groups.push("c".into());
        let data = SurvivalData::new(durations, events).unwrap().with_groups(groups).unwrap();

        let labelled_c_first = LogRankTest::new()
            .compare(&[
                ("c", &data.subset(&[12]).unwrap()),
                ("a", &data.subset(&[0, 1, 2, 3, 4, 5]).unwrap()),
                ("b", &data.subset(&[6, 7, 8, 9, 10, 11]).unwrap()),
            ])
            .unwrap();
        assert_eq!(labelled_c_first.df, 1);
        assert_eq!(labelled_c_first.groups.len(), 3);
        assert_abs_diff_eq!(labelled_c_first.groups[0].expected, 0.0);

        let by_label = logrank_test(&data).unwrap();
        assert_eq!(by_label.df, 1);
        assert_abs_diff_eq!(by_label.statistic, labelled_c_first.statistic, epsilon = 1e-9);
    }

    #[test]
    fn test_only_one_informative_group_rejected() {
        let data = SurvivalData::new(vec![0.5, 1.0, 2.0], vec![false, true, true])
            .unwrap()
            .with_groups(vec!["early".into(), "late".into(), "late".into()])
            .unwrap();
        assert!(matches!(logrank_test(&data), Err(AnalysisError::TooFewGroups(1))));
    }

    #[test]
    fn test_single_group_rejected() {
        let data = SurvivalData::new(vec![1.0, 2.0], vec![true, true])
            .unwrap()
            .with_groups(vec!["a".into(), "a".into()])
            .unwrap();
        assert!(matches!(logrank_test(&data), Err(AnalysisError::TooFewGroups(1))));
    }

    #[test]
    fn test_no_events_rejected() {
        let data = SurvivalData::new(vec![1.0, 2.0], vec![false, false])
            .unwrap()
            .with_groups(vec!["a".into(), "b".into()])
            .unwrap();
        assert!(matches!(logrank_test(&data), Err(AnalysisError::NoEvents)));
    }
}
