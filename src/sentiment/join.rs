//! Lexicon joins and sentiment aggregation
//!
//! The join is an inner join on the token: words missing from the lexicon
//! are dropped without complaint, and a word with several labels yields one
//! row per label.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::Serialize;

use super::lexicon::{Lexicon, SentimentValue, NEGATIVE, POSITIVE};
use crate::types::{DocumentId, GroupKey, GroupValue, TokenRecord};

/// A token annotated with one sentiment value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentToken {
    pub id: DocumentId,
    pub word: String,
    pub sentiment: SentimentValue,
}

/// Inner join of the token table against a lexicon.
pub fn inner_join(tokens: &[TokenRecord], lexicon: &Lexicon) -> Vec<SentimentToken> {
    let mut joined = Vec::new();
    for row in tokens {
        for value in lexicon.lookup(&row.token) {
            joined.push(SentimentToken {
                id: row.id.clone(),
                word: row.token.clone(),
                sentiment: value.clone(),
            });
        }
    }
    tracing::debug!(
        lexicon = lexicon.name(),
        tokens = tokens.len(),
        joined = joined.len(),
        "joined lexicon"
    );
    joined
}

/// Keep only rows carrying the given category label.
pub fn filter_label(joined: &[SentimentToken], label: &str) -> Vec<SentimentToken> {
    joined
        .iter()
        .filter(|t| t.sentiment.category() == Some(label))
        .cloned()
        .collect()
}

/// Positive and negative counts for one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetSentiment {
    pub group: GroupValue,
    pub positive: usize,
    pub negative: usize,
    /// `positive - negative`
    pub net: i64,
}

/// Net sentiment per group, ordered by group.
///
/// Rows labelled neither positive nor negative are ignored.
pub fn net_sentiment(joined: &[SentimentToken], keys: &[GroupKey]) -> Vec<NetSentiment> {
    let mut groups: BTreeMap<GroupValue, (usize, usize)> = BTreeMap::new();
    for row in joined {
        let slot = match row.sentiment.category() {
            Some(POSITIVE) => 0,
            Some(NEGATIVE) => 1,
            _ => continue,
        };
        let entry = groups
            .entry(GroupValue::project(&row.id, &row.word, keys))
            .or_insert((0, 0));
        if slot == 0 {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    groups
        .into_iter()
        .map(|(group, (positive, negative))| NetSentiment {
            group,
            positive,
            negative,
            net: positive as i64 - negative as i64,
        })
        .collect()
}

/// Share of a group's joined rows carrying one label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentRate {
    pub group: GroupValue,
    pub matching: usize,
    pub total: usize,
    pub rate: f64,
}

/// Per group, the fraction of joined rows whose label is `label`.
pub fn sentiment_rate(joined: &[SentimentToken], keys: &[GroupKey], label: &str) -> Vec<SentimentRate> {
    let mut groups: BTreeMap<GroupValue, (usize, usize)> = BTreeMap::new();
    for row in joined {
        let entry = groups
            .entry(GroupValue::project(&row.id, &row.word, keys))
            .or_insert((0, 0));
        entry.1 += 1;
        if row.sentiment.category() == Some(label) {
            entry.0 += 1;
        }
    }

    groups
        .into_iter()
        .map(|(group, (matching, total))| SentimentRate {
            group,
            matching,
            total,
            rate: if total == 0 { 0.0 } else { matching as f64 / total as f64 },
        })
        .collect()
}

/// Sum and mean of numeric scores for one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub group: GroupValue,
    pub n: usize,
    pub sum: f64,
    pub mean: f64,
}

/// Per-group score totals. Category rows contribute their polarity
/// (+1/-1/0), so a binary lexicon can be summarized the same way.
pub fn mean_score(joined: &[SentimentToken], keys: &[GroupKey]) -> Vec<ScoreSummary> {
    let mut groups: BTreeMap<GroupValue, (usize, f64)> = BTreeMap::new();
    for row in joined {
        let entry = groups
            .entry(GroupValue::project(&row.id, &row.word, keys))
            .or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += row.sentiment.polarity();
    }

    groups
        .into_iter()
        .map(|(group, (n, sum))| ScoreSummary {
            group,
            n,
            sum,
            mean: if n == 0 { 0.0 } else { sum / n as f64 },
        })
        .collect()
}

/// How much one word contributes to a sentiment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordContribution {
    pub word: String,
    pub sentiment: String,
    pub n: usize,
    /// `n × polarity`
    pub contribution: f64,
}

/// Count each (word, sentiment) pair, most frequent first.
pub fn word_contributions(joined: &[SentimentToken]) -> Vec<WordContribution> {
    let mut counts: FxHashMap<(&str, String), (usize, f64)> = FxHashMap::default();
    for row in joined {
        let entry = counts
            .entry((row.word.as_str(), row.sentiment.label()))
            .or_insert((0, row.sentiment.polarity()));
        entry.0 += 1;
    }

    let mut out: Vec<WordContribution> = counts
        .into_iter()
        .map(|((word, sentiment), (n, polarity))| WordContribution {
            word: word.to_string(),
            sentiment,
            n,
            contribution: n as f64 * polarity,
        })
        .collect();
    out.sort_by(|a, b| {
        b.n.cmp(&a.n)
            .then_with(|| a.sentiment.cmp(&b.sentiment))
            .then_with(|| a.word.cmp(&b.word))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::lexicon::LexiconKind;

    fn tokens(lines: &[(u32, &str)]) -> Vec<TokenRecord> {
        lines
            .iter()
            .map(|(line, w)| TokenRecord::new(DocumentId::new("emma", 1, *line), *w))
            .collect()
    }

    #[test]
    fn test_unmatched_tokens_dropped() {
        let lex = Lexicon::bundled(LexiconKind::Binary).unwrap();
        let joined = inner_join(&tokens(&[(1, "happy"), (1, "carriage"), (2, "misery")]), &lex);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].word, "happy");
        assert_eq!(joined[1].id.line, 2);
    }

    #[test]
    fn test_multi_label_expands_rows() {
        let lex = Lexicon::bundled(LexiconKind::Emotion).unwrap();
        let joined = inner_join(&tokens(&[(1, "death")]), &lex);
        assert_eq!(joined.len(), lex.lookup("death").len());
        let fear = filter_label(&joined, "fear");
        assert_eq!(fear.len(), 1);
    }

    #[test]
    fn test_net_sentiment_by_block() {
        let lex = Lexicon::bundled(LexiconKind::Binary).unwrap();
        let rows = tokens(&[(1, "happy"), (2, "good"), (3, "sad"), (81, "misery"), (82, "pain")]);
        let joined = inner_join(&rows, &lex);
        let net = net_sentiment(&joined, &[GroupKey::LineBlock(80)]);
        assert_eq!(net.len(), 2);
        assert_eq!(net[0].group.block, Some(0));
        assert_eq!((net[0].positive, net[0].negative, net[0].net), (2, 1, 1));
        assert_eq!(net[1].net, -2);
    }

    #[test]
    fn test_sentiment_rate() {
        let lex = Lexicon::bundled(LexiconKind::Binary).unwrap();
        let joined = inner_join(&tokens(&[(1, "happy"), (1, "sad"), (1, "sorrow"), (1, "joy")]), &lex);
        let rates = sentiment_rate(&joined, &[GroupKey::Book], NEGATIVE);
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].matching, 2);
        assert_eq!(rates[0].total, 4);
        assert!((rates[0].rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_mean_score() {
        let lex = Lexicon::bundled(LexiconKind::Score).unwrap();
        let joined = inner_join(&tokens(&[(1, "superb"), (1, "worst"), (1, "carriage")]), &lex);
        let summary = mean_score(&joined, &[GroupKey::Book]);
        assert_eq!(summary[0].n, 2);
        assert!((summary[0].sum - 2.0).abs() < 1e-12);
        assert!((summary[0].mean - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_word_contributions_sorted() {
        let lex = Lexicon::bundled(LexiconKind::Binary).unwrap();
        let joined = inner_join(
            &tokens(&[(1, "miss"), (1, "happy"), (2, "happy"), (3, "poor"), (4, "happy")]),
            &lex,
        );
        let contributions = word_contributions(&joined);
        assert_eq!(contributions[0].word, "happy");
        assert_eq!(contributions[0].n, 3);
        assert_eq!(contributions[0].contribution, 3.0);
        assert_eq!(contributions[1].word, "poor");
        assert_eq!(contributions[1].contribution, -1.0);
    }
}
