//! Plain-text rendering of whole pipeline reports.

use std::fmt::Write;

use super::{
    contribution_chart, count_chart, count_table, cox_report, curve_summary, logrank_report,
    net_sentiment_chart, ph_test_report, proportion_table, score_table, sentiment_rate_table, tf_idf_table, StepPlot,
};
use crate::pipeline::{SurvivalReport, TextReport};

const CHART_WIDTH: usize = 40;

pub fn text_summary(report: &TextReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} book(s), {} lines, {} tokens ({} after stop words)\n",
        report.books.len(),
        report.lines,
        report.tokens,
        report.tokens_after_stopwords
    );

    let _ = writeln!(out, "{}", count_table(&report.top_words).with_title("Most common words"));
    let _ = writeln!(out, "{}", count_chart(&report.top_words, CHART_WIDTH).render());
    if !report.book_words.is_empty() {
        let _ = writeln!(out, "{}", count_table(&report.book_words).with_title("Most common words by book"));
    }
    if !report.proportions.is_empty() {
        let _ = writeln!(out, "{}", proportion_table(&report.proportions).with_title("Word shares by book"));
    }
    if !report.tf_idf.is_empty() {
        let _ = writeln!(out, "{}", tf_idf_table(&report.tf_idf).with_title("Highest tf-idf by book"));
    }

    if let Some(sentiment) = &report.sentiment {
        let _ = writeln!(
            out,
            "Sentiment ({} lexicon, {} matched tokens)\n",
            sentiment.lexicon, sentiment.matched
        );
        if !sentiment.net.is_empty() {
            let chart = net_sentiment_chart(&sentiment.net, CHART_WIDTH).with_title("Net sentiment by line block");
            let _ = writeln!(out, "{}", chart.render());
        }
        if !sentiment.scores.is_empty() {
            let _ = writeln!(out, "{}", score_table(&sentiment.scores).with_title("Mean score by line block"));
        }
        if !sentiment.rates.is_empty() {
            let _ = writeln!(out, "{}", sentiment_rate_table(&sentiment.rates).with_title("Emotion rate by book"));
        }
        let chart = contribution_chart(&sentiment.contributions, CHART_WIDTH).with_title("Word contributions");
        let _ = writeln!(out, "{}", chart.render());
    }
    out
}

pub fn survival_summary(report: &SurvivalReport) -> String {
    let mut out = String::new();
    if let Some(load) = &report.load {
        let _ = writeln!(
            out,
            "{} rows read, {} kept, {} dropped\n",
            load.rows_read,
            load.rows_kept,
            load.n_dropped()
        );
    }

    let curves = if report.groups.is_empty() {
        vec![report.overall.clone()]
    } else {
        report.groups.clone()
    };
    let _ = writeln!(out, "{}", curve_summary(&curves).with_title("Kaplan-Meier estimates"));
    let _ = writeln!(out, "{}", StepPlot::default().render(&curves));

    if let Some(logrank) = &report.logrank {
        let _ = writeln!(out, "{}", logrank_report(logrank));
    }
    if let Some(cox) = &report.cox {
        let _ = writeln!(out, "{}", cox_report(cox));
    }
    if let Some(ph) = &report.ph_test {
        let _ = writeln!(out, "{}", ph_test_report(ph));
    }
    out
}
