//! Analysis specification types.
//!
//! An [`AnalysisSpec`] names the inputs and settings of the text pipeline,
//! the survival pipeline, or both. These types are the input to the
//! [`super::validation::ValidationEngine`] and the pipeline runners.
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "v": 1,
//!   "text": {
//!     "inputs": ["books/emma.txt", "books/persuasion.txt"],
//!     "token_unit": { "unit": "words" },
//!     "stopwords": "en",
//!     "lexicon": { "kind": "binary" },
//!     "index_block": 80
//!   },
//!   "survival": {
//!     "input": "data/telco.csv",
//!     "duration": "tenure",
//!     "event": "Churn",
//!     "group": "Contract",
//!     "covariates": ["MonthlyCharges"],
//!     "ties": "efron"
//!   },
//!   "strict": false
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::nlp::tokenizer::TokenUnit;
use crate::sentiment::LexiconKind;
use crate::survival::{Ties, TimeTransform, Weighting};

/// Current spec version.
pub const SPEC_VERSION: u32 = 1;

/// Top-level analysis specification (v1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSpec {
    /// Spec version (currently `1`).
    pub v: u32,

    #[serde(default)]
    pub text: Option<TextSpec>,

    #[serde(default)]
    pub survival: Option<SurvivalSpec>,

    /// If `true`, unrecognized fields are errors; if `false`, warnings.
    #[serde(default)]
    pub strict: bool,

    /// Captures any fields not recognized by the schema.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl AnalysisSpec {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Rebase every relative input path onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(text) = &mut self.text {
            for input in &mut text.inputs {
                rebase(input, base);
            }
            if let Some(path) = text.lexicon.as_mut().and_then(|l| l.path.as_mut()) {
                rebase(path, base);
            }
        }
        if let Some(survival) = &mut self.survival {
            rebase(&mut survival.input, base);
        }
    }
}

fn rebase(path: &mut PathBuf, base: &Path) {
    if path.is_relative() && !path.as_os_str().is_empty() {
        *path = base.join(&*path);
    }
}

fn default_language() -> Option<String> {
    Some("en".to_string())
}

fn default_index_block() -> u32 {
    80
}

fn default_top_n() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// Text pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSpec {
    /// Plain-text files, one book each
    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    #[serde(default)]
    pub token_unit: TokenUnit,

    /// Stop-word language; `null` keeps every token.
    #[serde(default = "default_language")]
    pub stopwords: Option<String>,

    #[serde(default)]
    pub extra_stopwords: Vec<String>,

    /// Chapter heading regex (case-insensitive)
    #[serde(default)]
    pub chapter_pattern: Option<String>,

    #[serde(default)]
    pub lexicon: Option<LexiconSpec>,

    /// Lines per sentiment index block
    #[serde(default = "default_index_block")]
    pub index_block: u32,

    /// Rows kept in frequency and tf-idf tables
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_true")]
    pub tf_idf: bool,

    /// Emotion label whose rate is reported per book (emotion lexicons)
    #[serde(default)]
    pub emotion: Option<String>,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl Default for TextSpec {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            token_unit: TokenUnit::Words,
            stopwords: default_language(),
            extra_stopwords: Vec::new(),
            chapter_pattern: None,
            lexicon: None,
            index_block: default_index_block(),
            top_n: default_top_n(),
            tf_idf: true,
            emotion: None,
            unknown_fields: HashMap::new(),
        }
    }
}

/// Which lexicon to join against: bundled when `path` is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconSpec {
    pub kind: LexiconKind,

    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

fn default_alpha() -> f64 {
    0.05
}

/// Survival pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivalSpec {
    /// Delimited table
    #[serde(default)]
    pub input: PathBuf,

    #[serde(default)]
    pub duration: String,

    #[serde(default)]
    pub event: String,

    /// Column whose levels are compared by Kaplan-Meier and log-rank
    #[serde(default)]
    pub group: Option<String>,

    #[serde(default)]
    pub covariates: Vec<String>,

    /// Covariates one-hot encoded before the Cox fit
    #[serde(default)]
    pub categorical: Vec<String>,

    #[serde(default)]
    pub ties: Ties,

    #[serde(default)]
    pub penalizer: f64,

    #[serde(default = "default_alpha")]
    pub alpha: f64,

    #[serde(default)]
    pub weighting: Weighting,

    #[serde(default)]
    pub transform: TimeTransform,

    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl Default for SurvivalSpec {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            duration: String::new(),
            event: String::new(),
            group: None,
            covariates: Vec::new(),
            categorical: Vec::new(),
            ties: Ties::Efron,
            penalizer: 0.0,
            alpha: default_alpha(),
            weighting: Weighting::LogRank,
            transform: TimeTransform::Rank,
            unknown_fields: HashMap::new(),
        }
    }
}

impl SurvivalSpec {
    /// Whether a Cox model is fitted: at least one covariate is named.
    pub fn fits_cox(&self) -> bool {
        !self.covariates.is_empty() || !self.categorical.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_spec() {
        let spec = AnalysisSpec::from_json(r#"{ "v": 1 }"#).unwrap();
        assert_eq!(spec.v, 1);
        assert!(spec.text.is_none());
        assert!(spec.survival.is_none());
        assert!(!spec.strict);
    }

    #[test]
    fn test_text_defaults() {
        let spec = AnalysisSpec::from_json(r#"{ "v": 1, "text": { "inputs": ["a.txt"] } }"#).unwrap();
        let text = spec.text.unwrap();
        assert_eq!(text.token_unit, TokenUnit::Words);
        assert_eq!(text.stopwords.as_deref(), Some("en"));
        assert_eq!(text.index_block, 80);
        assert_eq!(text.top_n, 10);
        assert!(text.tf_idf);
    }

    #[test]
    fn test_deserialize_full_spec() {
        let json = r#"{
            "v": 1,
            "text": {
                "inputs": ["emma.txt"],
                "token_unit": { "unit": "ngrams", "n": 2 },
                "stopwords": null,
                "lexicon": { "kind": "emotion" },
                "emotion": "joy"
            },
            "survival": {
                "input": "telco.csv",
                "duration": "tenure",
                "event": "Churn",
                "group": "Contract",
                "covariates": ["MonthlyCharges"],
                "categorical": ["PaymentMethod"],
                "ties": "breslow",
                "weighting": "tarone_ware",
                "transform": "km"
            },
            "strict": true
        }"#;
        let spec = AnalysisSpec::from_json(json).unwrap();
        let text = spec.text.unwrap();
        assert_eq!(text.token_unit, TokenUnit::Ngrams(2));
        assert!(text.stopwords.is_none());
        assert_eq!(text.lexicon.unwrap().kind, LexiconKind::Emotion);
        let survival = spec.survival.unwrap();
        assert_eq!(survival.ties, Ties::Breslow);
        assert_eq!(survival.weighting, Weighting::TaroneWare);
        assert_eq!(survival.transform, TimeTransform::Km);
        assert_eq!(survival.alpha, 0.05);
        assert!(survival.fits_cox());
        assert!(spec.strict);
    }

    #[test]
    fn test_resolve_paths() {
        let json = r#"{
            "v": 1,
            "text": { "inputs": ["emma.txt", "/abs/persuasion.txt"], "lexicon": { "kind": "score", "path": "afinn.tsv" } },
            "survival": { "input": "telco.csv", "duration": "t", "event": "e" }
        }"#;
        let mut spec = AnalysisSpec::from_json(json).unwrap();
        spec.resolve_paths(Path::new("/data"));
        let text = spec.text.unwrap();
        assert_eq!(text.inputs[0], PathBuf::from("/data/emma.txt"));
        assert_eq!(text.inputs[1], PathBuf::from("/abs/persuasion.txt"));
        assert_eq!(text.lexicon.unwrap().path.unwrap(), PathBuf::from("/data/afinn.tsv"));
        assert_eq!(spec.survival.unwrap().input, PathBuf::from("/data/telco.csv"));
    }

    #[test]
    fn test_unknown_fields_captured() {
        let json = r#"{
            "v": 1,
            "bogus_top_level": 42,
            "survival": { "duration": "t", "event": "e", "bogus_column": "x" }
        }"#;
        let spec = AnalysisSpec::from_json(json).unwrap();
        assert!(spec.unknown_fields.contains_key("bogus_top_level"));
        assert!(spec.survival.unwrap().unknown_fields.contains_key("bogus_column"));
    }
}
