//! Validation engine for analysis specifications.
//!
//! The engine runs all registered [`ValidationRule`]s against an
//! [`AnalysisSpec`](super::spec::AnalysisSpec) and collects every diagnostic
//! into a [`ValidationReport`]. It never short-circuits on the first error,
//! so users see all problems at once.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use tidysurv::pipeline::validation::ValidationEngine;
//!
//! let engine = ValidationEngine::with_defaults();
//! let report = engine.validate(&spec);
//! if report.has_errors() {
//!     for err in report.errors() {
//!         eprintln!("{err}");
//!     }
//! }
//! ```

use std::collections::HashMap;

use regex::RegexBuilder;
use serde::Serialize;

use super::error_code::ErrorCode;
use super::errors::SpecError;
use super::spec::*;
use crate::nlp::tokenizer::TokenUnit;

// ─── Severity ───────────────────────────────────────────────────────────────

/// Whether a diagnostic is a hard error or a soft warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

// ─── Diagnostic ─────────────────────────────────────────────────────────────

/// A single validation finding: an error or warning attached to a
/// [`SpecError`] that carries the code, path, message, and hint.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub error: SpecError,
}

impl ValidationDiagnostic {
    pub fn error(err: SpecError) -> Self {
        Self {
            severity: Severity::Error,
            error: err,
        }
    }

    pub fn warning(err: SpecError) -> Self {
        Self {
            severity: Severity::Warning,
            error: err,
        }
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

/// Collected diagnostics from running all validation rules.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    /// Iterate over error-severity diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &SpecError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| &d.error)
    }

    /// Iterate over warning-severity diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &SpecError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| &d.error)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// `true` if there are no errors (warnings are acceptable).
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

// ─── Rule trait ─────────────────────────────────────────────────────────────

/// A single validation rule that inspects an [`AnalysisSpec`] and returns
/// zero or more diagnostics.
pub trait ValidationRule: Send + Sync {
    /// Short, stable identifier for this rule (e.g., `"survival_columns"`).
    fn name(&self) -> &str;

    fn validate(&self, spec: &AnalysisSpec) -> Vec<ValidationDiagnostic>;
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// Runs a set of [`ValidationRule`]s against an [`AnalysisSpec`] and collects
/// all diagnostics into a [`ValidationReport`].
pub struct ValidationEngine {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationEngine {
    /// Create an empty engine with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create an engine pre-loaded with the default rule set.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(VersionRule));
        engine.add_rule(Box::new(SectionsRule));
        engine.add_rule(Box::new(TextSettingsRule));
        engine.add_rule(Box::new(SurvivalColumnsRule));
        engine.add_rule(Box::new(SurvivalParametersRule));
        engine.add_rule(Box::new(UnknownFieldsRule));
        engine
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run all rules against `spec` and return the collected report.
    pub fn validate(&self, spec: &AnalysisSpec) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in &self.rules {
            let found = rule.validate(spec);
            if !found.is_empty() {
                tracing::debug!(rule = rule.name(), count = found.len(), "validation findings");
            }
            report.diagnostics.extend(found);
        }
        report
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Concrete rules
// ═══════════════════════════════════════════════════════════════════════════

// ─── 1. Supported version ───────────────────────────────────────────────────

struct VersionRule;

impl ValidationRule for VersionRule {
    fn name(&self) -> &str {
        "version"
    }

    fn validate(&self, spec: &AnalysisSpec) -> Vec<ValidationDiagnostic> {
        if spec.v == SPEC_VERSION {
            return vec![];
        }
        vec![ValidationDiagnostic::error(
            SpecError::new(
                ErrorCode::UnsupportedVersion,
                "/v",
                format!("spec version {} is not supported", spec.v),
            )
            .with_hint(format!("Set \"v\": {SPEC_VERSION}")),
        )]
    }
}

// ─── 2. At least one pipeline ───────────────────────────────────────────────

struct SectionsRule;

impl ValidationRule for SectionsRule {
    fn name(&self) -> &str {
        "sections"
    }

    fn validate(&self, spec: &AnalysisSpec) -> Vec<ValidationDiagnostic> {
        if spec.text.is_some() || spec.survival.is_some() {
            return vec![];
        }
        vec![ValidationDiagnostic::error(
            SpecError::new(ErrorCode::MissingSection, "", "nothing to run")
                .with_hint("Add a \"text\" section, a \"survival\" section, or both"),
        )]
    }
}

// ─── 3. Text settings ───────────────────────────────────────────────────────

struct TextSettingsRule;

impl ValidationRule for TextSettingsRule {
    fn name(&self) -> &str {
        "text_settings"
    }

    fn validate(&self, spec: &AnalysisSpec) -> Vec<ValidationDiagnostic> {
        let text = match &spec.text {
            Some(t) => t,
            None => return vec![],
        };
        let mut out = Vec::new();

        if text.inputs.is_empty() {
            out.push(ValidationDiagnostic::error(
                SpecError::new(ErrorCode::MissingField, "/text/inputs", "no input files")
                    .with_hint("List one plain-text file per book"),
            ));
        }

        if text.token_unit == TokenUnit::Ngrams(0) {
            out.push(ValidationDiagnostic::error(
                SpecError::new(
                    ErrorCode::InvalidValue,
                    "/text/token_unit/n",
                    "n-gram size must be at least 1",
                )
                .with_hint("Use { \"unit\": \"ngrams\", \"n\": 2 } for bigrams"),
            ));
        }

        if text.index_block == 0 {
            out.push(ValidationDiagnostic::error(
                SpecError::new(
                    ErrorCode::InvalidValue,
                    "/text/index_block",
                    "index_block must be greater than 0",
                )
                .with_hint("80 lines per block is the usual choice for novels"),
            ));
        }

        if text.top_n == 0 {
            out.push(ValidationDiagnostic::error(SpecError::new(
                ErrorCode::InvalidValue,
                "/text/top_n",
                "top_n must be greater than 0",
            )));
        }

        if let Some(pattern) = &text.chapter_pattern {
            if let Err(e) = RegexBuilder::new(pattern).case_insensitive(true).build() {
                out.push(ValidationDiagnostic::error(
                    SpecError::new(
                        ErrorCode::InvalidValue,
                        "/text/chapter_pattern",
                        format!("chapter pattern does not compile: {e}"),
                    )
                    .with_hint("Omit the field to use ^chapter [\\divxlc]"),
                ));
            }
        }

        if text.emotion.is_some() {
            let is_emotion = text
                .lexicon
                .as_ref()
                .map(|l| l.kind == crate::sentiment::LexiconKind::Emotion)
                .unwrap_or(false);
            if !is_emotion {
                out.push(ValidationDiagnostic::error(
                    SpecError::new(
                        ErrorCode::InvalidCombo,
                        "/text/emotion",
                        "emotion rates need an emotion lexicon",
                    )
                    .with_hint("Set lexicon to { \"kind\": \"emotion\" }"),
                ));
            }
        }

        out
    }
}

// ─── 4. Survival columns ────────────────────────────────────────────────────

struct SurvivalColumnsRule;

impl ValidationRule for SurvivalColumnsRule {
    fn name(&self) -> &str {
        "survival_columns"
    }

    fn validate(&self, spec: &AnalysisSpec) -> Vec<ValidationDiagnostic> {
        let survival = match &spec.survival {
            Some(s) => s,
            None => return vec![],
        };
        let mut out = Vec::new();

        if survival.input.as_os_str().is_empty() {
            out.push(ValidationDiagnostic::error(
                SpecError::new(ErrorCode::MissingField, "/survival/input", "no input table")
                    .with_hint("Point input at a CSV or TSV file"),
            ));
        }
        for (field, value) in [("duration", &survival.duration), ("event", &survival.event)] {
            if value.is_empty() {
                out.push(ValidationDiagnostic::error(SpecError::new(
                    ErrorCode::MissingField,
                    format!("/survival/{field}"),
                    format!("{field} column is required"),
                )));
            }
        }

        // A column may play one role only
        let mut roles: HashMap<&str, &str> = HashMap::new();
        let named = [("duration", survival.duration.as_str()), ("event", survival.event.as_str())]
            .into_iter()
            .chain(survival.group.as_deref().map(|g| ("group", g)))
            .chain(survival.covariates.iter().map(|c| ("covariates", c.as_str())))
            .chain(survival.categorical.iter().map(|c| ("categorical", c.as_str())));
        for (role, column) in named {
            if column.is_empty() {
                continue;
            }
            if let Some(previous) = roles.insert(column, role) {
                out.push(ValidationDiagnostic::error(
                    SpecError::new(
                        ErrorCode::InvalidCombo,
                        format!("/survival/{role}"),
                        format!("column \"{column}\" is already used as {previous}"),
                    )
                    .with_hint("Each column can play one role"),
                ));
            }
        }

        if !survival.fits_cox() {
            out.push(ValidationDiagnostic::warning(
                SpecError::new(
                    ErrorCode::MissingField,
                    "/survival/covariates",
                    "no covariates; Cox regression is skipped",
                )
                .with_hint("Name numeric covariates or categorical columns to fit a Cox model"),
            ));
        }
        if survival.group.is_none() {
            out.push(ValidationDiagnostic::warning(SpecError::new(
                ErrorCode::MissingField,
                "/survival/group",
                "no group column; the log-rank test is skipped",
            )));
        }

        out
    }
}

// ─── 5. Survival parameters ─────────────────────────────────────────────────

struct SurvivalParametersRule;

impl ValidationRule for SurvivalParametersRule {
    fn name(&self) -> &str {
        "survival_parameters"
    }

    fn validate(&self, spec: &AnalysisSpec) -> Vec<ValidationDiagnostic> {
        let survival = match &spec.survival {
            Some(s) => s,
            None => return vec![],
        };
        let mut out = Vec::new();
        if !(survival.alpha > 0.0 && survival.alpha < 1.0) {
            out.push(ValidationDiagnostic::error(
                SpecError::new(
                    ErrorCode::InvalidValue,
                    "/survival/alpha",
                    format!("alpha {} is outside (0, 1)", survival.alpha),
                )
                .with_hint("Use 0.05 for 95% intervals"),
            ));
        }
        if !(survival.penalizer >= 0.0 && survival.penalizer.is_finite()) {
            out.push(ValidationDiagnostic::error(SpecError::new(
                ErrorCode::InvalidValue,
                "/survival/penalizer",
                format!("penalizer {} must be finite and non-negative", survival.penalizer),
            )));
        }
        out
    }
}

// ─── 6. Unknown fields (strict → error, non-strict → warning) ──────────────

struct UnknownFieldsRule;

impl UnknownFieldsRule {
    /// Collect unknown-field diagnostics at the given JSON pointer `path`
    /// from a `HashMap` of extra fields captured by `#[serde(flatten)]`.
    fn check_unknowns(
        path: &str,
        unknowns: &HashMap<String, serde_json::Value>,
        strict: bool,
    ) -> Vec<ValidationDiagnostic> {
        let mut keys: Vec<&String> = unknowns.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| {
                let diag_fn = if strict {
                    ValidationDiagnostic::error
                } else {
                    ValidationDiagnostic::warning
                };
                diag_fn(
                    SpecError::new(
                        ErrorCode::UnknownField,
                        format!("{path}/{key}"),
                        format!("unrecognized field \"{key}\""),
                    )
                    .with_hint("Check spelling or remove this field"),
                )
            })
            .collect()
    }
}

impl ValidationRule for UnknownFieldsRule {
    fn name(&self) -> &str {
        "unknown_fields"
    }

    fn validate(&self, spec: &AnalysisSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();
        out.extend(Self::check_unknowns("", &spec.unknown_fields, spec.strict));
        if let Some(text) = &spec.text {
            out.extend(Self::check_unknowns("/text", &text.unknown_fields, spec.strict));
            if let Some(lexicon) = &text.lexicon {
                out.extend(Self::check_unknowns(
                    "/text/lexicon",
                    &lexicon.unknown_fields,
                    spec.strict,
                ));
            }
        }
        if let Some(survival) = &spec.survival {
            out.extend(Self::check_unknowns(
                "/survival",
                &survival.unknown_fields,
                spec.strict,
            ));
        }
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(json: &str) -> AnalysisSpec {
        serde_json::from_str(json).unwrap()
    }

    fn engine() -> ValidationEngine {
        ValidationEngine::with_defaults()
    }

    fn codes(report: &ValidationReport) -> Vec<ErrorCode> {
        report.errors().map(|e| e.code).collect()
    }

    // ─── Valid specs ────────────────────────────────────────────────────

    #[test]
    fn test_text_only_spec_is_valid() {
        let report = engine().validate(&spec(r#"{ "v": 1, "text": { "inputs": ["emma.txt"] } }"#));
        assert!(report.is_valid());
        assert!(report.is_empty());
    }

    #[test]
    fn test_full_survival_spec_is_valid() {
        let report = engine().validate(&spec(
            r#"{
                "v": 1,
                "survival": {
                    "input": "telco.csv",
                    "duration": "tenure",
                    "event": "Churn",
                    "group": "Contract",
                    "covariates": ["MonthlyCharges"]
                }
            }"#,
        ));
        assert!(report.is_valid());
        assert!(report.is_empty());
    }

    #[test]
    fn test_survival_without_covariates_warns() {
        let report = engine().validate(&spec(
            r#"{ "v": 1, "survival": { "input": "a.csv", "duration": "t", "event": "e" } }"#,
        ));
        assert!(report.is_valid());
        assert_eq!(report.warnings().count(), 2);
    }

    // ─── Structural rules ───────────────────────────────────────────────

    #[test]
    fn test_empty_spec_fails() {
        let report = engine().validate(&spec(r#"{ "v": 1 }"#));
        assert_eq!(codes(&report), vec![ErrorCode::MissingSection]);
    }

    #[test]
    fn test_wrong_version_fails() {
        let report = engine().validate(&spec(r#"{ "v": 2, "text": { "inputs": ["a.txt"] } }"#));
        let err = report.errors().next().unwrap();
        assert_eq!(err.code, ErrorCode::UnsupportedVersion);
        assert_eq!(err.path, "/v");
    }

    // ─── Text rules ─────────────────────────────────────────────────────

    #[test]
    fn test_text_errors_collected_together() {
        let report = engine().validate(&spec(
            r#"{
                "v": 1,
                "text": {
                    "inputs": [],
                    "token_unit": { "unit": "ngrams", "n": 0 },
                    "index_block": 0,
                    "chapter_pattern": "(unclosed"
                }
            }"#,
        ));
        let paths: Vec<&str> = report.errors().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/text/inputs",
                "/text/token_unit/n",
                "/text/index_block",
                "/text/chapter_pattern"
            ]
        );
    }

    #[test]
    fn test_emotion_needs_emotion_lexicon() {
        let report = engine().validate(&spec(
            r#"{ "v": 1, "text": { "inputs": ["a.txt"], "lexicon": { "kind": "binary" }, "emotion": "joy" } }"#,
        ));
        assert_eq!(codes(&report), vec![ErrorCode::InvalidCombo]);
    }

    // ─── Survival rules ─────────────────────────────────────────────────

    #[test]
    fn test_missing_columns_fail() {
        let report = engine().validate(&spec(r#"{ "v": 1, "survival": { "covariates": ["age"], "group": "g" } }"#));
        let paths: Vec<&str> = report.errors().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/survival/input", "/survival/duration", "/survival/event"]);
    }

    #[test]
    fn test_column_used_twice_fails() {
        let report = engine().validate(&spec(
            r#"{
                "v": 1,
                "survival": {
                    "input": "a.csv",
                    "duration": "t",
                    "event": "e",
                    "group": "arm",
                    "covariates": ["age", "arm"]
                }
            }"#,
        ));
        let err = report.errors().next().unwrap();
        assert_eq!(err.code, ErrorCode::InvalidCombo);
        assert!(err.message.contains("\"arm\""));
    }

    #[test]
    fn test_bad_parameters_fail() {
        let report = engine().validate(&spec(
            r#"{
                "v": 1,
                "survival": {
                    "input": "a.csv", "duration": "t", "event": "e",
                    "group": "g", "covariates": ["x"],
                    "alpha": 1.5, "penalizer": -1
                }
            }"#,
        ));
        let paths: Vec<&str> = report.errors().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/survival/alpha", "/survival/penalizer"]);
    }

    // ─── Unknown fields ─────────────────────────────────────────────────

    #[test]
    fn test_unknown_fields_warn_when_lenient() {
        let report = engine().validate(&spec(
            r#"{ "v": 1, "colour": "red", "text": { "inputs": ["a.txt"], "tokenz": 1 } }"#,
        ));
        assert!(report.is_valid());
        let paths: Vec<&str> = report.warnings().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/colour", "/text/tokenz"]);
    }

    #[test]
    fn test_unknown_fields_fail_when_strict() {
        let report = engine().validate(&spec(
            r#"{ "v": 1, "strict": true, "text": { "inputs": ["a.txt"], "tokenz": 1 } }"#,
        ));
        assert_eq!(codes(&report), vec![ErrorCode::UnknownField]);
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = engine().validate(&spec(r#"{ "v": 1 }"#));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["diagnostics"][0]["severity"], "error");
        assert_eq!(json["diagnostics"][0]["code"], "missing_section");
    }
}
