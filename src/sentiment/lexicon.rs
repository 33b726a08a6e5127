//! Sentiment lexicons
//!
//! Three shapes are supported, matching the common published lexicons:
//!
//! | Kind | Value per word | Example |
//! |------|----------------|---------|
//! | [`LexiconKind::Binary`] | `positive` or `negative` | Bing |
//! | [`LexiconKind::Emotion`] | one or more labels | NRC |
//! | [`LexiconKind::Score`] | signed number | AFINN |
//!
//! Small versions of each are compiled into the crate; full lexicons load
//! from two-column delimited files with a header row.

use std::io::Read;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

const BUNDLED_BINARY: &str = include_str!("../../data/lexicons/binary.tsv");
const BUNDLED_EMOTION: &str = include_str!("../../data/lexicons/emotion.tsv");
const BUNDLED_SCORE: &str = include_str!("../../data/lexicons/score.tsv");

pub const POSITIVE: &str = "positive";
pub const NEGATIVE: &str = "negative";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LexiconKind {
    Binary,
    Emotion,
    Score,
}

impl LexiconKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Emotion => "emotion",
            Self::Score => "score",
        }
    }
}

/// The sentiment attached to a word
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SentimentValue {
    Category(String),
    Score(f64),
}

impl SentimentValue {
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Category(c) => Some(c),
            Self::Score(_) => None,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Score(s) => Some(*s),
            Self::Category(_) => None,
        }
    }

    /// Signed polarity: +1/-1 for positive/negative categories, the score
    /// itself for numeric values, 0 for other labels.
    pub fn polarity(&self) -> f64 {
        match self {
            Self::Category(c) if c == POSITIVE => 1.0,
            Self::Category(c) if c == NEGATIVE => -1.0,
            Self::Category(_) => 0.0,
            Self::Score(s) => *s,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Category(c) => c.clone(),
            Self::Score(s) => format!("{s}"),
        }
    }
}

/// A static word → sentiment mapping
#[derive(Debug, Clone)]
pub struct Lexicon {
    name: String,
    kind: LexiconKind,
    entries: FxHashMap<String, Vec<SentimentValue>>,
}

impl Lexicon {
    /// Load one of the lexicons compiled into the crate.
    pub fn bundled(kind: LexiconKind) -> Result<Self> {
        let source = match kind {
            LexiconKind::Binary => BUNDLED_BINARY,
            LexiconKind::Emotion => BUNDLED_EMOTION,
            LexiconKind::Score => BUNDLED_SCORE,
        };
        Self::from_reader(kind.as_str(), kind, source.as_bytes(), b'\t')
    }

    /// Load a lexicon file; `.tsv` files are tab-delimited, anything else is
    /// read as comma-separated.
    pub fn from_path(path: impl AsRef<Path>, kind: LexiconKind) -> Result<Self> {
        let path = path.as_ref();
        let delimiter = match path.extension().and_then(|e| e.to_str()) {
            Some("tsv") | Some("tab") => b'\t',
            _ => b',',
        };
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(kind.as_str())
            .to_string();
        let file = std::fs::File::open(path)?;
        Self::from_reader(&name, kind, file, delimiter)
    }

    /// Parse `word<delim>value` rows after a header line.
    pub fn from_reader<R: Read>(name: &str, kind: LexiconKind, reader: R, delimiter: u8) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut entries: FxHashMap<String, Vec<SentimentValue>> = FxHashMap::default();
        for (index, record) in csv.records().enumerate() {
            let record = record?;
            let word = record.get(0).unwrap_or("").trim().to_lowercase();
            let raw = record.get(1).unwrap_or("").trim();
            if word.is_empty() {
                continue;
            }
            let value = Self::parse_value(kind, raw).ok_or_else(|| AnalysisError::InvalidRecord {
                index,
                reason: format!("`{raw}` is not a valid {} sentiment for `{word}`", kind.as_str()),
            })?;

            let values = entries.entry(word).or_default();
            if !values.contains(&value) {
                values.push(value);
            }
        }

        if entries.is_empty() {
            return Err(AnalysisError::EmptyInput("lexicon"));
        }
        tracing::debug!(name, kind = kind.as_str(), words = entries.len(), "loaded lexicon");

        Ok(Self {
            name: name.to_string(),
            kind,
            entries,
        })
    }

    fn parse_value(kind: LexiconKind, raw: &str) -> Option<SentimentValue> {
        match kind {
            LexiconKind::Binary => {
                let label = raw.to_lowercase();
                (label == POSITIVE || label == NEGATIVE).then_some(SentimentValue::Category(label))
            }
            LexiconKind::Emotion => {
                let label = raw.to_lowercase();
                (!label.is_empty()).then_some(SentimentValue::Category(label))
            }
            LexiconKind::Score => raw
                .parse::<f64>()
                .ok()
                .filter(|s| s.is_finite())
                .map(SentimentValue::Score),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LexiconKind {
        self.kind
    }

    /// All sentiments attached to `word` (empty when unknown)
    pub fn lookup(&self, word: &str) -> &[SentimentValue] {
        self.entries.get(word).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, word: &str) -> bool {
        self.entries.contains_key(word)
    }

    /// Number of distinct words
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct category labels, sorted (empty for score lexicons)
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .entries
            .values()
            .flatten()
            .filter_map(|v| v.category().map(str::to_string))
            .collect();
        labels.sort();
        labels.dedup();
        labels
    }
}
