//! Stopword removal
//!
//! Stopword lists come from the `stop-words` crate; custom lists and
//! per-analysis additions (character names, archaic forms, ...) are layered
//! on top. Filtering is an anti-join: rows whose token is listed are dropped,
//! everything else passes through in its original order.

use rustc_hash::FxHashSet;
use stop_words::{get, LANGUAGE};

use crate::types::TokenRecord;

/// A set of words excluded from frequency analysis
#[derive(Debug, Clone)]
pub struct StopwordFilter {
    /// Lowercase stopwords
    stopwords: FxHashSet<String>,
    /// Language code the list was loaded for, if any
    language: Option<String>,
}

impl Default for StopwordFilter {
    fn default() -> Self {
        Self::new("en")
    }
}

impl StopwordFilter {
    /// Load the bundled list for a language.
    ///
    /// Unknown codes fall back to English.
    pub fn new(language: &str) -> Self {
        Self {
            stopwords: Self::load_stopwords(language),
            language: Some(language.to_lowercase()),
        }
    }

    /// A filter that removes nothing
    pub fn empty() -> Self {
        Self {
            stopwords: FxHashSet::default(),
            language: None,
        }
    }

    /// Build a filter from a custom list
    pub fn from_list<S: AsRef<str>>(words: &[S]) -> Self {
        Self {
            stopwords: words.iter().map(|w| w.as_ref().to_lowercase()).collect(),
            language: None,
        }
    }

    /// Add words to the list, returning the filter
    pub fn with_extra<S: AsRef<str>>(mut self, words: &[S]) -> Self {
        self.add_stopwords(words);
        self
    }

    pub fn add_stopwords<S: AsRef<str>>(&mut self, words: &[S]) {
        for word in words {
            self.stopwords.insert(word.as_ref().to_lowercase());
        }
    }

    pub fn remove_stopwords<S: AsRef<str>>(&mut self, words: &[S]) {
        for word in words {
            self.stopwords.remove(&word.as_ref().to_lowercase());
        }
    }

    /// Tokens are lowercase by the time they get here, so lookups are exact.
    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn len(&self) -> usize {
        self.stopwords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stopwords.is_empty()
    }

    /// Drop every row whose token is a stopword.
    pub fn anti_join(&self, tokens: &[TokenRecord]) -> Vec<TokenRecord> {
        let kept: Vec<TokenRecord> = tokens
            .iter()
            .filter(|t| !self.is_stopword(&t.token))
            .cloned()
            .collect();
        tracing::debug!(
            before = tokens.len(),
            after = kept.len(),
            "removed stopwords"
        );
        kept
    }

    fn load_stopwords(language: &str) -> FxHashSet<String> {
        let lang = match language.to_lowercase().as_str() {
            "en" | "english" => LANGUAGE::English,
            "de" | "german" => LANGUAGE::German,
            "fr" | "french" => LANGUAGE::French,
            "es" | "spanish" => LANGUAGE::Spanish,
            "it" | "italian" => LANGUAGE::Italian,
            "pt" | "portuguese" => LANGUAGE::Portuguese,
            "nl" | "dutch" => LANGUAGE::Dutch,
            "ru" | "russian" => LANGUAGE::Russian,
            "sv" | "swedish" => LANGUAGE::Swedish,
            "no" | "norwegian" => LANGUAGE::Norwegian,
            "da" | "danish" => LANGUAGE::Danish,
            "fi" | "finnish" => LANGUAGE::Finnish,
            other => {
                tracing::warn!(language = other, "no stopword list, using English");
                LANGUAGE::English
            }
        };

        get(lang).iter().map(|s| s.to_lowercase()).collect()
    }
}

/// Remove stopwords with the given filter.
pub fn anti_join(tokens: &[TokenRecord], filter: &StopwordFilter) -> Vec<TokenRecord> {
    filter.anti_join(tokens)
}
