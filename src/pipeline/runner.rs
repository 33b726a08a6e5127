//! Pipeline runners: straight-line stage execution.
//!
//! [`TextPipeline`] and [`SurvivalPipeline`] execute their stages in order,
//! threading each stage's immutable output into the next and notifying a
//! [`PipelineObserver`] at every boundary. Each stage runs inside its own
//! tracing span. [`run_spec`] validates an [`AnalysisSpec`] and runs
//! whichever pipelines it configures.

use std::path::Path;

use serde::Serialize;

use super::observer::{
    PipelineObserver, StageClock, StageReport, StageTiming, TimingObserver, STAGE_COX,
    STAGE_FREQUENCY, STAGE_KAPLAN_MEIER, STAGE_LOAD, STAGE_LOGRANK, STAGE_PH_TEST, STAGE_SENTIMENT,
    STAGE_STOPWORDS, STAGE_TF_IDF, STAGE_TOKENIZE,
};
use super::spec::{AnalysisSpec, SurvivalSpec, TextSpec};
use super::validation::ValidationEngine;
use crate::error::{AnalysisError, Result};
use crate::io::{load_text_files, CsvLoader, LoadReport};
use crate::nlp::stopwords::StopwordFilter;
use crate::nlp::tokenizer::Tokenizer;
use crate::sentiment::{
    inner_join, mean_score, net_sentiment, sentiment_rate, word_contributions, Lexicon, LexiconKind,
    NetSentiment, ScoreSummary, SentimentRate, WordContribution,
};
use crate::survival::{
    proportional_hazard_test, CoxModel, CoxPh, KaplanMeier, LogRankResult, LogRankTest,
    PhTestResult, SurvivalCurve, SurvivalData,
};
use crate::text::{bind_tf_idf, count_by, top_n, word_proportions, GroupCount, TermStat, WordProportion};
use crate::types::{Document, GroupKey};

/// Enter a tracing span for a pipeline stage.
macro_rules! trace_stage {
    ($name:expr) => {
        let _span = tracing::info_span!("pipeline_stage", stage = $name).entered();
    };
}

// ============================================================================
// Text pipeline
// ============================================================================

/// Lexicon join results
#[derive(Debug, Clone, Serialize)]
pub struct SentimentReport {
    pub lexicon: String,
    pub kind: LexiconKind,
    /// Joined rows (tokens matched in the lexicon, once per label)
    pub matched: usize,
    /// Per book and line block
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub net: Vec<NetSentiment>,
    /// Per book and line block (score lexicons)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scores: Vec<ScoreSummary>,
    /// Per book (emotion lexicons with a selected label)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rates: Vec<SentimentRate>,
    pub contributions: Vec<WordContribution>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextReport {
    pub books: Vec<String>,
    pub lines: usize,
    pub tokens: usize,
    pub tokens_after_stopwords: usize,
    pub top_words: Vec<GroupCount>,
    /// Top words per book, when more than one book is loaded
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub book_words: Vec<GroupCount>,
    /// Each book's most frequent words as a share of its tokens
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proportions: Vec<WordProportion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tf_idf: Vec<TermStat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentReport>,
    pub stages: Vec<StageTiming>,
}

#[derive(Debug, Clone)]
pub struct TextPipeline {
    spec: TextSpec,
}

impl TextPipeline {
    pub fn new(spec: TextSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &TextSpec {
        &self.spec
    }

    /// Load the configured files and run every stage.
    pub fn run(&self, observer: &mut impl PipelineObserver) -> Result<TextReport> {
        let docs = {
            trace_stage!(STAGE_LOAD);
            observer.on_stage_start(STAGE_LOAD);
            let clock = StageClock::start();
            let docs = load_text_files(&self.spec.inputs, self.spec.chapter_pattern.as_deref())?;
            observer.on_stage_end(STAGE_LOAD, &StageReport::new(clock.elapsed()).with_rows(docs.len()));
            docs
        };
        self.run_documents(&docs, observer)
    }

    /// Run every stage on already-annotated documents.
    pub fn run_documents(&self, docs: &[Document], observer: &mut impl PipelineObserver) -> Result<TextReport> {
        let spec = &self.spec;
        let mut books: Vec<String> = Vec::new();
        for doc in docs {
            if !books.contains(&doc.id.book) {
                books.push(doc.id.book.clone());
            }
        }

        // Stage 1: tokenize
        let tokens = {
            trace_stage!(STAGE_TOKENIZE);
            observer.on_stage_start(STAGE_TOKENIZE);
            let clock = StageClock::start();
            spec.token_unit.validate()?;
            let tokens = Tokenizer::new().with_unit(spec.token_unit).unnest(docs);
            observer.on_stage_end(STAGE_TOKENIZE, &StageReport::new(clock.elapsed()).with_rows(tokens.len()));
            tokens
        };

        // Stage 2: stop-word anti-join
        let filtered = {
            trace_stage!(STAGE_STOPWORDS);
            observer.on_stage_start(STAGE_STOPWORDS);
            let clock = StageClock::start();
            let filter = match &spec.stopwords {
                Some(language) => StopwordFilter::new(language).with_extra(&spec.extra_stopwords),
                None => StopwordFilter::from_list(&spec.extra_stopwords),
            };
            let filtered = filter.anti_join(&tokens);
            observer.on_stage_end(STAGE_STOPWORDS, &StageReport::new(clock.elapsed()).with_rows(filtered.len()));
            filtered
        };

        // Stage 3: frequencies
        let (top_words, book_words, proportions) = {
            trace_stage!(STAGE_FREQUENCY);
            observer.on_stage_start(STAGE_FREQUENCY);
            let clock = StageClock::start();
            let top_words = top_n(&count_by(&filtered, &[GroupKey::Word]), spec.top_n);
            let (book_words, proportions) = if books.len() > 1 {
                let counts = top_per_book(count_by(&filtered, &[GroupKey::Book, GroupKey::Word]), spec.top_n, |c| {
                    c.group.book.clone()
                });
                let shares = top_per_book(word_proportions(&filtered, &[GroupKey::Book]), spec.top_n, |p| {
                    p.group.book.clone()
                });
                (counts, shares)
            } else {
                (Vec::new(), Vec::new())
            };
            observer.on_stage_end(
                STAGE_FREQUENCY,
                &StageReport::new(clock.elapsed()).with_rows(top_words.len() + book_words.len()),
            );
            (top_words, book_words, proportions)
        };

        // Stage 4: tf-idf across books
        let tf_idf = if spec.tf_idf && books.len() > 1 {
            trace_stage!(STAGE_TF_IDF);
            observer.on_stage_start(STAGE_TF_IDF);
            let clock = StageClock::start();
            let stats = top_per_book(bind_tf_idf(&tokens, &[GroupKey::Book]), spec.top_n, |s| {
                s.document.book.clone()
            });
            observer.on_stage_end(STAGE_TF_IDF, &StageReport::new(clock.elapsed()).with_rows(stats.len()));
            stats
        } else {
            if spec.tf_idf {
                tracing::info!("tf-idf needs more than one book; skipped");
            }
            Vec::new()
        };

        // Stage 5: sentiment
        let sentiment = match &spec.lexicon {
            Some(lexicon_spec) => {
                trace_stage!(STAGE_SENTIMENT);
                observer.on_stage_start(STAGE_SENTIMENT);
                let clock = StageClock::start();
                let lexicon = match &lexicon_spec.path {
                    Some(path) => Lexicon::from_path(path, lexicon_spec.kind)?,
                    None => Lexicon::bundled(lexicon_spec.kind)?,
                };
                let report = self.sentiment(&filtered, &lexicon);
                observer.on_stage_end(STAGE_SENTIMENT, &StageReport::new(clock.elapsed()).with_rows(report.matched));
                Some(report)
            }
            None => None,
        };

        tracing::info!(
            books = books.len(),
            tokens = tokens.len(),
            kept = filtered.len(),
            "text pipeline finished"
        );

        Ok(TextReport {
            books,
            lines: docs.len(),
            tokens: tokens.len(),
            tokens_after_stopwords: filtered.len(),
            top_words,
            book_words,
            proportions,
            tf_idf,
            sentiment,
            stages: Vec::new(),
        })
    }

    fn sentiment(&self, tokens: &[crate::types::TokenRecord], lexicon: &Lexicon) -> SentimentReport {
        let joined = inner_join(tokens, lexicon);
        let narrative = [GroupKey::Book, GroupKey::LineBlock(self.spec.index_block)];
        let (net, scores) = match lexicon.kind() {
            LexiconKind::Score => (Vec::new(), mean_score(&joined, &narrative)),
            LexiconKind::Binary | LexiconKind::Emotion => (net_sentiment(&joined, &narrative), Vec::new()),
        };
        let rates = match (&self.spec.emotion, lexicon.kind()) {
            (Some(label), LexiconKind::Emotion) => sentiment_rate(&joined, &[GroupKey::Book], label),
            _ => Vec::new(),
        };
        let mut contributions = word_contributions(&joined);
        contributions.truncate(self.spec.top_n);

        SentimentReport {
            lexicon: lexicon.name().to_string(),
            kind: lexicon.kind(),
            matched: joined.len(),
            net,
            scores,
            rates,
            contributions,
        }
    }
}

/// Keep the first `n` rows of each book, preserving the input order.
fn top_per_book<T, F>(rows: Vec<T>, n: usize, book: F) -> Vec<T>
where
    F: Fn(&T) -> Option<String>,
{
    let mut seen: Vec<(Option<String>, usize)> = Vec::new();
    rows.into_iter()
        .filter(|row| {
            let key = book(row);
            match seen.iter_mut().find(|(k, _)| *k == key) {
                Some((_, count)) if *count >= n => false,
                Some((_, count)) => {
                    *count += 1;
                    true
                }
                None => {
                    seen.push((key, 1));
                    n > 0
                }
            }
        })
        .collect()
}

// ============================================================================
// Survival pipeline
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SurvivalReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadReport>,
    pub overall: SurvivalCurve,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<SurvivalCurve>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logrank: Option<LogRankResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cox: Option<CoxModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ph_test: Option<PhTestResult>,
    pub stages: Vec<StageTiming>,
}

#[derive(Debug, Clone)]
pub struct SurvivalPipeline {
    spec: SurvivalSpec,
}

impl SurvivalPipeline {
    pub fn new(spec: SurvivalSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &SurvivalSpec {
        &self.spec
    }

    fn loader(&self) -> CsvLoader {
        let mut loader = CsvLoader::new(&self.spec.duration, &self.spec.event)
            .with_covariates(&self.spec.covariates)
            .with_categorical(&self.spec.categorical);
        if let Some(group) = &self.spec.group {
            loader = loader.with_group(group);
        }
        loader
    }

    /// Load the configured table and run every stage.
    pub fn run(&self, observer: &mut impl PipelineObserver) -> Result<SurvivalReport> {
        let loaded = {
            trace_stage!(STAGE_LOAD);
            observer.on_stage_start(STAGE_LOAD);
            let clock = StageClock::start();
            let loaded = self.loader().load(&self.spec.input)?;
            observer.on_stage_end(STAGE_LOAD, &StageReport::new(clock.elapsed()).with_rows(loaded.data.len()));
            loaded
        };
        let mut report = self.run_data(&loaded.data, observer)?;
        report.load = Some(loaded.report);
        Ok(report)
    }

    /// Run every stage on validated data.
    ///
    /// Log-rank needs group labels and Cox needs covariates; stages whose
    /// inputs are absent are skipped.
    pub fn run_data(&self, data: &SurvivalData, observer: &mut impl PipelineObserver) -> Result<SurvivalReport> {
        let spec = &self.spec;

        // Stage 1: Kaplan-Meier
        let (overall, groups) = {
            trace_stage!(STAGE_KAPLAN_MEIER);
            observer.on_stage_start(STAGE_KAPLAN_MEIER);
            let clock = StageClock::start();
            let km = KaplanMeier::new().with_alpha(spec.alpha);
            let overall = km.fit(data)?;
            let groups = if data.groups().is_some() {
                km.fit_groups(data)?
            } else {
                Vec::new()
            };
            observer.on_stage_end(
                STAGE_KAPLAN_MEIER,
                &StageReport::new(clock.elapsed()).with_rows(overall.points.len()),
            );
            (overall, groups)
        };

        // Stage 2: log-rank
        let logrank = if groups.len() >= 2 {
            trace_stage!(STAGE_LOGRANK);
            observer.on_stage_start(STAGE_LOGRANK);
            let clock = StageClock::start();
            let result = match LogRankTest::new().with_weighting(spec.weighting).test(data) {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!(error = %e, "log-rank test skipped");
                    None
                }
            };
            observer.on_stage_end(STAGE_LOGRANK, &StageReport::new(clock.elapsed()));
            result
        } else {
            if data.groups().is_some() {
                tracing::warn!(groups = groups.len(), "log-rank test needs two groups; skipped");
            }
            None
        };

        // Stage 3: Cox regression and its diagnostic
        let model = if data.n_covariates() > 0 {
            trace_stage!(STAGE_COX);
            observer.on_stage_start(STAGE_COX);
            let clock = StageClock::start();
            let fitted = CoxPh::new()
                .with_ties(spec.ties)
                .with_penalizer(spec.penalizer)
                .with_alpha(spec.alpha)
                .fit(data);
            let (model, report) = match fitted {
                Ok(model) => {
                    let rows = model.coefficients.len();
                    (Some(model), StageReport::new(clock.elapsed()).with_rows(rows))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cox regression skipped");
                    (None, StageReport::new(clock.elapsed()))
                }
            };
            observer.on_stage_end(STAGE_COX, &report);
            model
        } else {
            None
        };

        let (cox, ph_test) = if let Some(model) = model {
            let ph_test = {
                trace_stage!(STAGE_PH_TEST);
                observer.on_stage_start(STAGE_PH_TEST);
                let clock = StageClock::start();
                let result = match proportional_hazard_test(&model, data, spec.transform) {
                    Ok(result) => Some(result),
                    Err(e) => {
                        tracing::warn!(error = %e, "proportional hazards test skipped");
                        None
                    }
                };
                observer.on_stage_end(STAGE_PH_TEST, &StageReport::new(clock.elapsed()));
                result
            };
            (Some(model), ph_test)
        } else {
            (None, None)
        };

        tracing::info!(
            n = data.len(),
            events = data.n_events(),
            median = ?overall.median,
            "survival pipeline finished"
        );

        Ok(SurvivalReport {
            load: None,
            overall,
            groups,
            logrank,
            cox,
            ph_test,
            stages: Vec::new(),
        })
    }
}

// ============================================================================
// Whole-spec execution
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub survival: Option<SurvivalReport>,
}

/// Validate `spec`, then run the text and survival pipelines it configures.
///
/// Validation warnings are logged; any validation error aborts before
/// loading data.
pub fn run_spec(spec: &AnalysisSpec) -> Result<AnalysisReport> {
    let report = ValidationEngine::with_defaults().validate(spec);
    for warning in report.warnings() {
        tracing::warn!(%warning, "spec warning");
    }
    if report.has_errors() {
        let messages: Vec<String> = report.errors().map(|e| e.to_string()).collect();
        return Err(AnalysisError::InvalidSpec(messages.join("; ")));
    }

    let mut out = AnalysisReport::default();
    if let Some(text) = &spec.text {
        let mut observer = TimingObserver::new();
        let mut result = TextPipeline::new(text.clone()).run(&mut observer)?;
        result.stages = observer.into_stages();
        out.text = Some(result);
    }
    if let Some(survival) = &spec.survival {
        let mut observer = TimingObserver::new();
        let mut result = SurvivalPipeline::new(survival.clone()).run(&mut observer)?;
        result.stages = observer.into_stages();
        out.survival = Some(result);
    }
    Ok(out)
}

/// Read a JSON spec, resolve its relative paths against the spec's
/// directory, and run it.
pub fn run_spec_file(path: impl AsRef<Path>) -> Result<AnalysisReport> {
    let spec = load_spec_file(path)?;
    run_spec(&spec)
}

/// Read a JSON spec and resolve its relative paths against the spec's
/// directory.
pub fn load_spec_file(path: impl AsRef<Path>) -> Result<AnalysisSpec> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let mut spec = AnalysisSpec::from_json(&json)?;
    if let Some(base) = path.parent() {
        spec.resolve_paths(base);
    }
    Ok(spec)
}
