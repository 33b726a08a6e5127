//! Token frequency aggregation
//!
//! Counts are grouped by any combination of document-level keys and sorted
//! by descending count. Equal counts fall back to ascending group order so
//! the output is deterministic.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::types::{GroupKey, GroupValue, TokenRecord};

/// Number of rows in one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub group: GroupValue,
    pub n: usize,
}

/// Count rows grouped by `keys`.
///
/// With `keys = [Word]` this is the classic word frequency table; adding
/// `Book` gives per-book frequencies.
pub fn count_by(tokens: &[TokenRecord], keys: &[GroupKey]) -> Vec<GroupCount> {
    let mut counts: FxHashMap<GroupValue, usize> = FxHashMap::default();
    for row in tokens {
        *counts
            .entry(GroupValue::project(&row.id, &row.token, keys))
            .or_insert(0) += 1;
    }

    let mut out: Vec<GroupCount> = counts
        .into_iter()
        .map(|(group, n)| GroupCount { group, n })
        .collect();
    out.sort_by(|a, b| b.n.cmp(&a.n).then_with(|| a.group.cmp(&b.group)));
    out
}

/// The `n` largest groups of an already sorted count table
pub fn top_n(counts: &[GroupCount], n: usize) -> Vec<GroupCount> {
    counts.iter().take(n).cloned().collect()
}

/// A word's share of its group's tokens
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordProportion {
    pub group: GroupValue,
    pub word: String,
    pub n: usize,
    pub proportion: f64,
}

/// Per group, each word's count divided by the group's total token count.
///
/// Sorted by group, then descending proportion, then word.
pub fn word_proportions(tokens: &[TokenRecord], keys: &[GroupKey]) -> Vec<WordProportion> {
    let group_keys: Vec<GroupKey> = keys
        .iter()
        .copied()
        .filter(|k| *k != GroupKey::Word)
        .collect();

    let mut totals: FxHashMap<GroupValue, usize> = FxHashMap::default();
    let mut per_word: FxHashMap<(GroupValue, &str), usize> = FxHashMap::default();
    for row in tokens {
        let group = GroupValue::project(&row.id, &row.token, &group_keys);
        *totals.entry(group.clone()).or_insert(0) += 1;
        *per_word.entry((group, row.token.as_str())).or_insert(0) += 1;
    }

    let mut out: Vec<WordProportion> = per_word
        .into_iter()
        .map(|((group, word), n)| {
            let total = totals.get(&group).copied().unwrap_or(n).max(1);
            WordProportion {
                proportion: n as f64 / total as f64,
                group,
                word: word.to_string(),
                n,
            }
        })
        .collect();
    out.sort_by(|a, b| {
        a.group
            .cmp(&b.group)
            .then_with(|| b.proportion.total_cmp(&a.proportion))
            .then_with(|| a.word.cmp(&b.word))
    });
    out
}
