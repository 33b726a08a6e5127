//! Sentiment analysis by lexicon join
//!
//! This module provides the bundled/loaded lexicons and the join and
//! aggregation functions built on them.

pub mod join;
pub mod lexicon;

pub use join::{
    filter_label, inner_join, mean_score, net_sentiment, sentiment_rate, word_contributions,
    NetSentiment, ScoreSummary, SentimentRate, SentimentToken, WordContribution,
};
pub use lexicon::{Lexicon, LexiconKind, SentimentValue};
