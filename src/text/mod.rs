//! Frequency and tf-idf aggregation over token tables.

pub mod frequency;
pub mod tfidf;

pub use frequency::{count_by, top_n, word_proportions, GroupCount, WordProportion};
pub use tfidf::{bind_tf_idf, TermStat};
