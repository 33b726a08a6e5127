//! Harrell's concordance index
//!
//! A pair (i, j) is comparable when subject i has an observed event and
//! either fails strictly before j, or at the same time as a censored j. It
//! is concordant when i, the earlier failure, carries the higher risk
//! score. Tied scores count one half.

/// Concordance between `risk_scores` (higher = riskier) and observed
/// survival. Returns 0.5 when no pair is comparable.
///
/// Runs in O(n log n): subjects are visited by descending time while a
/// Fenwick tree over score ranks holds everyone known to outlive the
/// current time.
pub fn concordance_index(durations: &[f64], risk_scores: &[f64], events: &[bool]) -> f64 {
    let n = durations.len().min(risk_scores.len()).min(events.len());
    let score = |i: usize| if risk_scores[i] == 0.0 { 0.0 } else { risk_scores[i] };

    let mut levels: Vec<f64> = (0..n).map(score).collect();
    levels.sort_by(f64::total_cmp);
    levels.dedup_by(|a, b| a.total_cmp(b).is_eq());
    let rank = |i: usize| {
        let s = score(i);
        levels.binary_search_by(|l| l.total_cmp(&s)).unwrap_or_else(|pos| pos)
    };

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| durations[b].total_cmp(&durations[a]));

    let mut at_risk = RankCounts::new(levels.len());
    let mut concordant = 0.0;
    let mut comparable = 0u64;
    let mut start = 0;
    while start < n {
        let t = durations[order[start]];
        let end = start + order[start..].iter().take_while(|&&i| durations[i] == t).count();
        let block = &order[start..end];

        // Censored subjects at t are still at risk for events at t
        for &j in block.iter().filter(|&&j| !events[j]) {
            at_risk.add(rank(j));
        }
        for &i in block.iter().filter(|&&i| events[i]) {
            let r = rank(i);
            let lower = at_risk.below(r);
            let tied = at_risk.below(r + 1) - lower;
            comparable += at_risk.total();
            concordant += lower as f64 + 0.5 * tied as f64;
        }
        for &i in block.iter().filter(|&&i| events[i]) {
            at_risk.add(rank(i));
        }
        start = end.max(start + 1);
    }

    if comparable == 0 {
        0.5
    } else {
        concordant / comparable as f64
    }
}

/// Fenwick tree of subject counts per score rank
struct RankCounts {
    tree: Vec<u64>,
    total: u64,
}

impl RankCounts {
    fn new(ranks: usize) -> Self {
        Self {
            tree: vec![0; ranks + 1],
            total: 0,
        }
    }

    fn add(&mut self, rank: usize) {
        let mut k = rank + 1;
        while k < self.tree.len() {
            self.tree[k] += 1;
            k += k & k.wrapping_neg();
        }
        self.total += 1;
    }

    /// Number of subjects with rank strictly below `rank`
    fn below(&self, rank: usize) -> u64 {
        let mut k = rank.min(self.tree.len() - 1);
        let mut sum = 0;
        while k > 0 {
            sum += self.tree[k];
            k -= k & k.wrapping_neg();
        }
        sum
    }

    fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_perfect_ordering() {
        let durations = [1.0, 2.0, 3.0, 4.0];
        let risk = [4.0, 3.0, 2.0, 1.0];
        let events = [true; 4];
        assert_abs_diff_eq!(concordance_index(&durations, &risk, &events), 1.0);
    }

    #[test]
    fn test_reversed_ordering() {
        let durations = [1.0, 2.0, 3.0, 4.0];
        let risk = [1.0, 2.0, 3.0, 4.0];
        let events = [true; 4];
        assert_abs_diff_eq!(concordance_index(&durations, &risk, &events), 0.0);
    }

    #[test]
    fn test_constant_scores_give_half() {
        let durations = [1.0, 2.0, 3.0];
        let risk = [0.0; 3];
        let events = [true, false, true];
        assert_abs_diff_eq!(concordance_index(&durations, &risk, &events), 0.5);
    }

    #[test]
    fn test_censored_first_not_comparable() {
        // Only pair (1, 2) is comparable: subject 0 is censored first
        let durations = [1.0, 2.0, 3.0];
        let risk = [0.0, 5.0, 1.0];
        let events = [false, true, true];
        assert_abs_diff_eq!(concordance_index(&durations, &risk, &events), 1.0);
    }

    #[test]
    fn test_tied_time_event_vs_censored() {
        // Censored subject listed first at the same time as the event
        let durations = [2.0, 2.0];
        let risk = [0.0, 1.0];
        let events = [false, true];
        assert_abs_diff_eq!(concordance_index(&durations, &risk, &events), 1.0);
    }

    fn pairwise(durations: &[f64], risk: &[f64], events: &[bool]) -> f64 {
        let mut concordant = 0.0;
        let mut comparable = 0.0;
        for i in 0..durations.len() {
            if !events[i] {
                continue;
            }
            for j in 0..durations.len() {
                let later = durations[j] > durations[i] || (durations[j] == durations[i] && !events[j]);
                if i == j || !later {
                    continue;
                }
                comparable += 1.0;
                if risk[i] > risk[j] {
                    concordant += 1.0;
                } else if risk[i] == risk[j] {
                    concordant += 0.5;
                }
            }
        }
        if comparable == 0.0 {
            0.5
        } else {
            concordant / comparable
        }
    }

    #[test]
    fn test_matches_pairwise_count_with_ties() {
        // Deterministic scramble with many tied times and tied scores
        let n = 200;
        let durations: Vec<f64> = (0..n).map(|i| ((i * 37) % 23) as f64).collect();
        let risk: Vec<f64> = (0..n).map(|i| ((i * 53) % 11) as f64 - 5.0).collect();
        let events: Vec<bool> = (0..n).map(|i| (i * 7) % 3 != 0).collect();
        assert_abs_diff_eq!(
            concordance_index(&durations, &risk, &events),
            pairwise(&durations, &risk, &events),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_large_input_is_fast() {
        let n = 50_000;
        let durations: Vec<f64> = (0..n).map(|i| ((i * 7919) % 1000) as f64).collect();
        let risk: Vec<f64> = durations.iter().map(|t| -t).collect();
        let events = vec![true; n];
        assert_abs_diff_eq!(concordance_index(&durations, &risk, &events), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_no_comparable_pairs() {
        let durations = [1.0, 2.0];
        let events = [false, false];
        assert_abs_diff_eq!(concordance_index(&durations, &[1.0, 2.0], &events), 0.5);
    }
}
