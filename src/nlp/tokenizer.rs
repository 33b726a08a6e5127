//! Word, n-gram and character tokenization
//!
//! Tokens are case-normalized and stripped of punctuation. An apostrophe is
//! kept only when it sits between two word characters (`don't`), so
//! contractions still match stopword and lexicon entries.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::types::{Document, TokenRecord};

/// The unit text is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "unit", content = "n")]
pub enum TokenUnit {
    /// Single words (the default)
    #[default]
    Words,
    /// Runs of `n` consecutive words within one document, space-joined
    Ngrams(usize),
    /// Single alphanumeric characters
    Characters,
}

impl TokenUnit {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Ngrams(0) => Err(AnalysisError::invalid_parameter(
                "n",
                "n-gram size must be at least 1",
            )),
            _ => Ok(()),
        }
    }
}

/// Unicode-aware tokenizer
#[derive(Debug, Clone)]
pub struct Tokenizer {
    unit: TokenUnit,
    lowercase: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Create a word tokenizer that lowercases its output
    pub fn new() -> Self {
        Self {
            unit: TokenUnit::Words,
            lowercase: true,
        }
    }

    /// Set the token unit
    pub fn with_unit(mut self, unit: TokenUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Keep the original case (off by default)
    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn unit(&self) -> TokenUnit {
        self.unit
    }

    /// Split raw text into tokens of the configured unit.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        match self.unit {
            TokenUnit::Words => self.words(text),
            TokenUnit::Ngrams(n) => {
                let words = self.words(text);
                if n == 0 || words.len() < n {
                    return Vec::new();
                }
                words.windows(n).map(|w| w.join(" ")).collect()
            }
            TokenUnit::Characters => text
                .chars()
                .filter(|c| c.is_alphanumeric())
                .map(|c| self.normalize_char(c))
                .collect(),
        }
    }

    /// Tokenize every document, one output row per token in document order.
    pub fn unnest(&self, documents: &[Document]) -> Vec<TokenRecord> {
        let mut rows = Vec::with_capacity(documents.len() * 8);
        for doc in documents {
            for token in self.tokenize(&doc.text) {
                rows.push(TokenRecord::new(doc.id.clone(), token));
            }
        }
        tracing::debug!(
            documents = documents.len(),
            tokens = rows.len(),
            "unnested tokens"
        );
        rows
    }

    fn words(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().map(normalize_apostrophe).collect();
        let mut words = Vec::new();
        let mut current = String::new();

        for (i, &c) in chars.iter().enumerate() {
            if c.is_alphanumeric() {
                if self.lowercase {
                    // Some capitals lowercase to a letter plus a combining mark, as İ does
                    current.extend(c.to_lowercase().filter(|l| l.is_alphanumeric()));
                } else {
                    current.push(c);
                }
            } else if c == '\'' && is_inner_apostrophe(&chars, i) {
                current.push(c);
            } else if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            words.push(current);
        }
        words
    }

    fn normalize_char(&self, c: char) -> String {
        if self.lowercase {
            c.to_lowercase().collect()
        } else {
            c.to_string()
        }
    }
}

/// Tokenize documents into the given unit.
pub fn unnest_tokens(documents: &[Document], unit: TokenUnit) -> Result<Vec<TokenRecord>> {
    unit.validate()?;
    Ok(Tokenizer::new().with_unit(unit).unnest(documents))
}

fn normalize_apostrophe(c: char) -> char {
    match c {
        '\u{2019}' | '\u{2018}' | '\u{02BC}' => '\'',
        c => c,
    }
}

fn is_inner_apostrophe(chars: &[char], i: usize) -> bool {
    i > 0
        && chars[i - 1].is_alphanumeric()
        && chars.get(i + 1).is_some_and(|c| c.is_alphanumeric())
}

/// `true` if `token` is a well-formed word token: non-empty, lowercase, and
/// made only of alphanumerics plus inner apostrophes.
pub fn is_clean_word(token: &str) -> bool {
    let chars: Vec<char> = token.chars().collect();
    !chars.is_empty()
        && chars.iter().enumerate().all(|(i, &c)| {
            (c.is_alphanumeric() && !c.is_uppercase()) || (c == '\'' && is_inner_apostrophe(&chars, i))
        })
}
