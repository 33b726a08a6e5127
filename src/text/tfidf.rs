//! Term frequency / inverse document frequency
//!
//! ```text
//! tf(t, d)  = n(t, d) / Σ_t' n(t', d)
//! idf(t)    = ln(|D| / |{d : n(t, d) > 0}|)
//! tf_idf    = tf · idf
//! ```
//!
//! A term present in every document has idf 0.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::types::{GroupKey, GroupValue, TokenRecord};

/// Statistics for one (document, term) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermStat {
    pub document: GroupValue,
    pub term: String,
    pub n: usize,
    pub tf: f64,
    pub idf: f64,
    pub tf_idf: f64,
}

/// Compute tf-idf for every term, treating each distinct value of
/// `document_keys` as one document.
///
/// Sorted by descending tf-idf, then document and term.
pub fn bind_tf_idf(tokens: &[TokenRecord], document_keys: &[GroupKey]) -> Vec<TermStat> {
    let keys: Vec<GroupKey> = document_keys
        .iter()
        .copied()
        .filter(|k| *k != GroupKey::Word)
        .collect();

    let mut counts: FxHashMap<(GroupValue, &str), usize> = FxHashMap::default();
    let mut doc_totals: FxHashMap<GroupValue, usize> = FxHashMap::default();
    for row in tokens {
        let doc = GroupValue::project(&row.id, &row.token, &keys);
        *doc_totals.entry(doc.clone()).or_insert(0) += 1;
        *counts.entry((doc, row.token.as_str())).or_insert(0) += 1;
    }

    let num_docs = doc_totals.len() as f64;
    let mut doc_freq: FxHashMap<&str, FxHashSet<&GroupValue>> = FxHashMap::default();
    for (doc, term) in counts.keys() {
        doc_freq.entry(*term).or_default().insert(doc);
    }

    let mut stats: Vec<TermStat> = counts
        .iter()
        .map(|((doc, term), &n)| {
            let total = doc_totals.get(doc).copied().unwrap_or(n).max(1);
            let df = doc_freq.get(term).map(|d| d.len()).unwrap_or(1).max(1);
            let tf = n as f64 / total as f64;
            let idf = (num_docs / df as f64).ln();
            TermStat {
                document: doc.clone(),
                term: term.to_string(),
                n,
                tf,
                idf,
                tf_idf: tf * idf,
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        b.tf_idf
            .total_cmp(&a.tf_idf)
            .then_with(|| a.document.cmp(&b.document))
            .then_with(|| a.term.cmp(&b.term))
    });
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentId;
    use approx::assert_abs_diff_eq;

    fn rows(book: &str, words: &[&str]) -> Vec<TokenRecord> {
        words
            .iter()
            .map(|w| TokenRecord::new(DocumentId::new(book, 0, 1), *w))
            .collect()
    }

    #[test]
    fn test_shared_terms_have_zero_idf() {
        let mut tokens = rows("a", &["the", "carriage", "the"]);
        tokens.extend(rows("b", &["the", "horse"]));
        let stats = bind_tf_idf(&tokens, &[GroupKey::Book]);

        let the_a = stats
            .iter()
            .find(|s| s.term == "the" && s.document.book.as_deref() == Some("a"))
            .unwrap();
        assert_eq!(the_a.n, 2);
        assert_abs_diff_eq!(the_a.tf, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(the_a.idf, 0.0, epsilon = 1e-12);

        let horse = stats.iter().find(|s| s.term == "horse").unwrap();
        assert_abs_diff_eq!(horse.tf, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(horse.idf, 2f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(horse.tf_idf, 0.5 * 2f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_sorted_descending() {
        let mut tokens = rows("a", &["x", "y", "y"]);
        tokens.extend(rows("b", &["x", "z"]));
        let stats = bind_tf_idf(&tokens, &[GroupKey::Book]);
        assert_eq!(stats[0].term, "y");
        assert!(stats.windows(2).all(|w| w[0].tf_idf >= w[1].tf_idf));
    }

    #[test]
    fn test_single_document_all_zero() {
        let stats = bind_tf_idf(&rows("a", &["x", "y"]), &[GroupKey::Book]);
        assert!(stats.iter().all(|s| s.tf_idf == 0.0));
    }
}
