//! Subcommands and their arguments.
//!
//! Argument structs convert into the library's spec types, so the pipelines
//! never see clap types.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use tidysurv::nlp::tokenizer::TokenUnit;
use tidysurv::pipeline::{LexiconSpec, SurvivalSpec, TextSpec};
use tidysurv::sentiment::LexiconKind;
use tidysurv::survival::{Ties, TimeTransform, Weighting};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the one-token-per-row table of text files
    Tokens(TokensArgs),

    /// Count words after stop-word removal
    Words(TextArgs),

    /// Rank words by tf-idf across books
    Tfidf(TextArgs),

    /// Join words against a sentiment lexicon
    Sentiment(SentimentArgs),

    /// Kaplan-Meier survival curves
    Km(SurvivalArgs),

    /// Log-rank comparison of the groups in --group
    Logrank(SurvivalArgs),

    /// Cox proportional hazards regression with a PH assumption check
    Cox(SurvivalArgs),

    /// Run every analysis configured in a JSON spec
    Run(SpecArgs),

    /// Validate a JSON spec without running it
    Validate(SpecArgs),
}

#[derive(Args, Debug)]
pub struct TextArgs {
    /// Plain-text files, one book each
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Split into n-grams instead of single words
    #[arg(long, conflicts_with = "characters")]
    pub ngrams: Option<usize>,

    /// Split into single characters
    #[arg(long)]
    pub characters: bool,

    /// Stop-word language
    #[arg(long, default_value = "en")]
    pub stopwords: String,

    /// Keep every token
    #[arg(long)]
    pub no_stopwords: bool,

    /// Additional stop words, comma separated
    #[arg(long, value_delimiter = ',')]
    pub extra_stopwords: Vec<String>,

    /// Chapter heading regex, matched case-insensitively
    #[arg(long)]
    pub chapter_pattern: Option<String>,

    /// Rows kept per table
    #[arg(long, default_value_t = 10)]
    pub top_n: usize,
}

impl TextArgs {
    fn token_unit(&self) -> TokenUnit {
        match (self.ngrams, self.characters) {
            (Some(n), _) => TokenUnit::Ngrams(n),
            (None, true) => TokenUnit::Characters,
            (None, false) => TokenUnit::Words,
        }
    }
}

impl From<TextArgs> for TextSpec {
    fn from(a: TextArgs) -> Self {
        TextSpec {
            token_unit: a.token_unit(),
            inputs: a.files,
            stopwords: if a.no_stopwords { None } else { Some(a.stopwords) },
            extra_stopwords: a.extra_stopwords,
            chapter_pattern: a.chapter_pattern,
            top_n: a.top_n,
            ..TextSpec::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct TokensArgs {
    #[command(flatten)]
    pub text: TextArgs,

    /// Maximum rows printed
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LexiconArg {
    Binary,
    Emotion,
    Score,
}

impl From<LexiconArg> for LexiconKind {
    fn from(a: LexiconArg) -> Self {
        match a {
            LexiconArg::Binary => LexiconKind::Binary,
            LexiconArg::Emotion => LexiconKind::Emotion,
            LexiconArg::Score => LexiconKind::Score,
        }
    }
}

#[derive(Args, Debug)]
pub struct SentimentArgs {
    #[command(flatten)]
    pub text: TextArgs,

    #[arg(long, value_enum, default_value = "binary")]
    pub lexicon: LexiconArg,

    /// Two-column word/value table used instead of the bundled lexicon
    #[arg(long)]
    pub lexicon_file: Option<PathBuf>,

    /// Lines per narrative block
    #[arg(long, default_value_t = 80)]
    pub index_block: u32,

    /// Emotion label whose per-book rate is reported
    #[arg(long)]
    pub emotion: Option<String>,
}

impl From<SentimentArgs> for TextSpec {
    fn from(a: SentimentArgs) -> Self {
        let lexicon = LexiconSpec {
            kind: a.lexicon.into(),
            path: a.lexicon_file,
            unknown_fields: Default::default(),
        };
        TextSpec {
            lexicon: Some(lexicon),
            index_block: a.index_block,
            emotion: a.emotion,
            tf_idf: false,
            ..TextSpec::from(a.text)
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TiesArg {
    Efron,
    Breslow,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum WeightingArg {
    LogRank,
    Wilcoxon,
    TaroneWare,
    Peto,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TransformArg {
    Rank,
    Identity,
    Log,
    Km,
}

#[derive(Args, Debug)]
pub struct SurvivalArgs {
    /// Delimited table (.csv, or .tsv for tab separated)
    pub input: PathBuf,

    /// Duration column
    #[arg(long)]
    pub duration: String,

    /// Event indicator column (1/0, true/false, yes/no)
    #[arg(long)]
    pub event: String,

    /// Grouping column
    #[arg(long)]
    pub group: Option<String>,

    /// Numeric covariate columns, comma separated
    #[arg(long, value_delimiter = ',')]
    pub covariates: Vec<String>,

    /// Categorical covariate columns, one-hot encoded
    #[arg(long, value_delimiter = ',')]
    pub categorical: Vec<String>,

    #[arg(long, value_enum, default_value = "efron")]
    pub ties: TiesArg,

    /// L2 penalty on the Cox coefficients
    #[arg(long, default_value_t = 0.0)]
    pub penalizer: f64,

    /// Significance level for intervals and tests
    #[arg(long, default_value_t = 0.05)]
    pub alpha: f64,

    #[arg(long, value_enum, default_value = "log-rank")]
    pub weighting: WeightingArg,

    /// Time transform of the proportional hazards test
    #[arg(long, value_enum, default_value = "rank")]
    pub transform: TransformArg,

    /// Print the full survival table of each curve
    #[arg(long)]
    pub table: bool,
}

impl SurvivalArgs {
    pub fn to_spec(&self) -> SurvivalSpec {
        SurvivalSpec {
            input: self.input.clone(),
            duration: self.duration.clone(),
            event: self.event.clone(),
            group: self.group.clone(),
            covariates: self.covariates.clone(),
            categorical: self.categorical.clone(),
            ties: match self.ties {
                TiesArg::Efron => Ties::Efron,
                TiesArg::Breslow => Ties::Breslow,
            },
            penalizer: self.penalizer,
            alpha: self.alpha,
            weighting: match self.weighting {
                WeightingArg::LogRank => Weighting::LogRank,
                WeightingArg::Wilcoxon => Weighting::Wilcoxon,
                WeightingArg::TaroneWare => Weighting::TaroneWare,
                WeightingArg::Peto => Weighting::Peto,
            },
            transform: match self.transform {
                TransformArg::Rank => TimeTransform::Rank,
                TransformArg::Identity => TimeTransform::Identity,
                TransformArg::Log => TimeTransform::Log,
                TransformArg::Km => TimeTransform::Km,
            },
            ..SurvivalSpec::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct SpecArgs {
    /// JSON analysis spec; relative paths resolve against its directory
    pub spec: PathBuf,
}
