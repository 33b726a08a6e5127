//! Command-line front end.
//!
//! Every subcommand builds an [`AnalysisSpec`] section from its flags,
//! validates it with the same rules as a spec file, runs the matching
//! pipeline and prints either the text rendering or JSON.

pub mod commands;

use anyhow::{bail, Context, Result};
use clap::Parser;
use commands::{Commands, SentimentArgs, SpecArgs, SurvivalArgs, TextArgs, TokensArgs};

use tidysurv::io::load_text_files;
use tidysurv::nlp::stopwords::StopwordFilter;
use tidysurv::nlp::tokenizer::Tokenizer;
use tidysurv::pipeline::{
    load_spec_file, run_spec, AnalysisSpec, SurvivalPipeline, SurvivalReport, SurvivalSpec,
    Severity, TextPipeline, TextReport, TextSpec, TimingObserver, ValidationEngine, SPEC_VERSION,
};
use tidysurv::report;

#[derive(Parser, Debug)]
#[command(
    name = "tidysurv",
    version,
    about = "Tidy text mining and survival analysis from the command line."
)]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let json = self.json;
        match self.command {
            Commands::Tokens(args) => run_tokens(args, json),
            Commands::Words(args) => run_words(args, json),
            Commands::Tfidf(args) => run_tfidf(args, json),
            Commands::Sentiment(args) => run_sentiment(args, json),
            Commands::Km(args) => run_km(args, json),
            Commands::Logrank(args) => run_logrank(args, json),
            Commands::Cox(args) => run_cox(args, json),
            Commands::Run(args) => run_spec_command(args, json),
            Commands::Validate(args) => run_validate(args, json),
        }
    }
}

/// Validate a single-section spec the way a spec file would be.
fn check(text: Option<TextSpec>, survival: Option<SurvivalSpec>) -> Result<()> {
    let spec = AnalysisSpec {
        v: SPEC_VERSION,
        text,
        survival,
        strict: false,
        unknown_fields: Default::default(),
    };
    let report = ValidationEngine::with_defaults().validate(&spec);
    if report.has_errors() {
        let messages: Vec<String> = report.errors().map(|e| e.to_string()).collect();
        bail!("invalid arguments:\n  {}", messages.join("\n  "));
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", report::to_json(value)?);
    Ok(())
}

fn run_tokens(args: TokensArgs, json: bool) -> Result<()> {
    let spec = TextSpec::from(args.text);
    check(Some(spec.clone()), None)?;

    let docs = load_text_files(&spec.inputs, spec.chapter_pattern.as_deref())
        .context("failed to load text files")?;
    let tokens = Tokenizer::new().with_unit(spec.token_unit).unnest(&docs);
    let tokens = match &spec.stopwords {
        Some(language) => StopwordFilter::new(language)
            .with_extra(&spec.extra_stopwords)
            .anti_join(&tokens),
        None => tokens,
    };
    let shown = &tokens[..tokens.len().min(args.limit)];

    if json {
        return print_json(shown);
    }
    print!("{}", report::tokens_table(shown));
    if tokens.len() > shown.len() {
        println!("... {} more rows", tokens.len() - shown.len());
    }
    Ok(())
}

fn run_text(spec: TextSpec) -> Result<TextReport> {
    check(Some(spec.clone()), None)?;
    let mut observer = TimingObserver::new();
    let mut result = TextPipeline::new(spec)
        .run(&mut observer)
        .context("text pipeline failed")?;
    result.stages = observer.into_stages();
    Ok(result)
}

fn run_words(args: TextArgs, json: bool) -> Result<()> {
    let spec = TextSpec {
        tf_idf: false,
        ..TextSpec::from(args)
    };
    let result = run_text(spec)?;
    if json {
        return print_json(&result.top_words);
    }
    print!("{}", report::count_table(&result.top_words).with_title("Most common words"));
    println!();
    print!("{}", report::count_chart(&result.top_words, 40).render());
    if !result.book_words.is_empty() {
        println!();
        print!("{}", report::count_table(&result.book_words).with_title("Most common words by book"));
    }
    Ok(())
}

fn run_tfidf(args: TextArgs, json: bool) -> Result<()> {
    if args.files.len() < 2 {
        bail!("tf-idf compares books; pass at least two files");
    }
    let result = run_text(TextSpec::from(args))?;
    if json {
        return print_json(&result.tf_idf);
    }
    print!("{}", report::tf_idf_table(&result.tf_idf).with_title("Highest tf-idf by book"));
    Ok(())
}

fn run_sentiment(args: SentimentArgs, json: bool) -> Result<()> {
    let result = run_text(TextSpec::from(args))?;
    if json {
        return print_json(&result.sentiment);
    }
    print!("{}", report::text_summary(&result));
    Ok(())
}

fn run_survival(spec: SurvivalSpec) -> Result<SurvivalReport> {
    check(None, Some(spec.clone()))?;
    let mut observer = TimingObserver::new();
    let mut result = SurvivalPipeline::new(spec)
        .run(&mut observer)
        .context("survival pipeline failed")?;
    result.stages = observer.into_stages();
    Ok(result)
}

fn run_km(args: SurvivalArgs, json: bool) -> Result<()> {
    let spec = SurvivalSpec {
        covariates: Vec::new(),
        categorical: Vec::new(),
        ..args.to_spec()
    };
    let result = run_survival(spec)?;
    let curves = if result.groups.is_empty() {
        vec![result.overall.clone()]
    } else {
        result.groups.clone()
    };
    if json {
        return print_json(&curves);
    }
    print!("{}", report::curve_summary(&curves).with_title("Kaplan-Meier estimates"));
    println!();
    print!("{}", report::StepPlot::default().render(&curves));
    if args.table {
        for curve in &curves {
            println!();
            print!("{}", report::curve_table(curve));
        }
    }
    Ok(())
}

fn run_logrank(args: SurvivalArgs, json: bool) -> Result<()> {
    if args.group.is_none() {
        bail!("log-rank needs --group");
    }
    let spec = SurvivalSpec {
        covariates: Vec::new(),
        categorical: Vec::new(),
        ..args.to_spec()
    };
    let result = run_survival(spec)?;
    let Some(logrank) = result.logrank else {
        bail!("log-rank needs at least two groups in `{}`", args.group.unwrap_or_default());
    };
    if json {
        return print_json(&logrank);
    }
    print!("{}", report::logrank_report(&logrank));
    Ok(())
}

fn run_cox(args: SurvivalArgs, json: bool) -> Result<()> {
    let spec = args.to_spec();
    if !spec.fits_cox() {
        bail!("Cox regression needs --covariates or --categorical");
    }
    let result = run_survival(spec)?;
    if json {
        return print_json(&serde_json::json!({
            "cox": result.cox,
            "ph_test": result.ph_test,
        }));
    }
    if let Some(model) = &result.cox {
        print!("{}", report::cox_report(model));
    }
    if let Some(ph) = &result.ph_test {
        println!();
        print!("{}", report::ph_test_report(ph));
    }
    Ok(())
}

fn run_spec_command(args: SpecArgs, json: bool) -> Result<()> {
    let spec = load_spec_file(&args.spec)
        .with_context(|| format!("failed to read spec {}", args.spec.display()))?;
    let result = run_spec(&spec)?;
    if json {
        return print_json(&result);
    }
    if let Some(text) = &result.text {
        print!("{}", report::text_summary(text));
    }
    if let Some(survival) = &result.survival {
        print!("{}", report::survival_summary(survival));
    }
    Ok(())
}

fn run_validate(args: SpecArgs, json: bool) -> Result<()> {
    let spec = load_spec_file(&args.spec)
        .with_context(|| format!("failed to read spec {}", args.spec.display()))?;
    let result = ValidationEngine::with_defaults().validate(&spec);
    if json {
        print_json(&result)?;
    } else if result.is_empty() {
        println!("{}: ok", args.spec.display());
    } else {
        for diagnostic in &result.diagnostics {
            let level = match diagnostic.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            println!("{level}: {}", diagnostic.error);
            if let Some(hint) = &diagnostic.error.hint {
                println!("  hint: {hint}");
            }
        }
    }
    if result.has_errors() {
        bail!("{} has errors", args.spec.display());
    }
    Ok(())
}
