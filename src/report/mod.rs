//! Rendering results as text tables, ASCII charts and JSON.
//!
//! Every result type of the text and survival pipelines has a table
//! builder here. The JSON form is the serde serialization of the result
//! itself, so downstream plotting sees the same field names.

pub mod chart;
pub mod summary;
pub mod table;

use serde::Serialize;

pub use chart::{BarChart, StepPlot};
pub use summary::{survival_summary, text_summary};
pub use table::{number, p_value, Table};

use crate::error::Result;
use crate::sentiment::{NetSentiment, ScoreSummary, SentimentRate, WordContribution};
use crate::survival::{CoxModel, LogRankResult, PhTestResult, SurvivalCurve};
use crate::text::{GroupCount, TermStat, WordProportion};
use crate::types::TokenRecord;

/// Pretty-printed JSON of any result.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn tokens_table(tokens: &[TokenRecord]) -> Table {
    let mut table = Table::new(&["book", "chapter", "line", "word"]);
    for t in tokens {
        table.push_row(vec![
            t.id.book.clone(),
            t.id.chapter.to_string(),
            t.id.line.to_string(),
            t.token.clone(),
        ]);
    }
    table
}

pub fn count_table(counts: &[GroupCount]) -> Table {
    let mut table = Table::new(&["group", "n"]);
    for c in counts {
        table.push_row(vec![c.group.label(), c.n.to_string()]);
    }
    table
}

pub fn count_chart(counts: &[GroupCount], width: usize) -> BarChart {
    let mut chart = BarChart::new(width);
    for c in counts {
        chart.push(c.group.label(), c.n as f64);
    }
    chart
}

pub fn proportion_table(proportions: &[WordProportion]) -> Table {
    let mut table = Table::new(&["group", "word", "n", "proportion"]);
    for p in proportions {
        table.push_row(vec![
            p.group.label(),
            p.word.clone(),
            p.n.to_string(),
            number(p.proportion, 5),
        ]);
    }
    table
}

pub fn tf_idf_table(stats: &[TermStat]) -> Table {
    let mut table = Table::new(&["document", "term", "n", "tf", "idf", "tf_idf"]);
    for s in stats {
        table.push_row(vec![
            s.document.label(),
            s.term.clone(),
            s.n.to_string(),
            number(s.tf, 5),
            number(s.idf, 4),
            number(s.tf_idf, 5),
        ]);
    }
    table
}

pub fn net_sentiment_table(rows: &[NetSentiment]) -> Table {
    let mut table = Table::new(&["group", "positive", "negative", "net"]);
    for r in rows {
        table.push_row(vec![
            r.group.label(),
            r.positive.to_string(),
            r.negative.to_string(),
            r.net.to_string(),
        ]);
    }
    table
}

pub fn net_sentiment_chart(rows: &[NetSentiment], width: usize) -> BarChart {
    let mut chart = BarChart::new(width).with_title("Net sentiment");
    for r in rows {
        chart.push(r.group.label(), r.net as f64);
    }
    chart
}

pub fn sentiment_rate_table(rows: &[SentimentRate]) -> Table {
    let mut table = Table::new(&["group", "matching", "total", "rate"]);
    for r in rows {
        table.push_row(vec![
            r.group.label(),
            r.matching.to_string(),
            r.total.to_string(),
            number(r.rate, 4),
        ]);
    }
    table
}

pub fn score_table(rows: &[ScoreSummary]) -> Table {
    let mut table = Table::new(&["group", "n", "sum", "mean"]);
    for r in rows {
        table.push_row(vec![r.group.label(), r.n.to_string(), number(r.sum, 2), number(r.mean, 4)]);
    }
    table
}

pub fn contribution_table(rows: &[WordContribution]) -> Table {
    let mut table = Table::new(&["word", "sentiment", "n", "contribution"]);
    for r in rows {
        table.push_row(vec![
            r.word.clone(),
            r.sentiment.clone(),
            r.n.to_string(),
            number(r.contribution, 1),
        ]);
    }
    table
}

pub fn contribution_chart(rows: &[WordContribution], width: usize) -> BarChart {
    let mut chart = BarChart::new(width).with_title("Contribution to sentiment");
    for r in rows {
        chart.push(format!("{} ({})", r.word, r.sentiment), r.contribution);
    }
    chart
}

pub fn curve_table(curve: &SurvivalCurve) -> Table {
    let title = match &curve.label {
        Some(label) => format!("Kaplan-Meier: {label}"),
        None => "Kaplan-Meier".to_string(),
    };
    let band = format!("{:.0}%", (1.0 - curve.alpha) * 100.0);
    let mut table = Table::new(&[
        "time".to_string(),
        "at_risk".to_string(),
        "events".to_string(),
        "censored".to_string(),
        "survival".to_string(),
        format!("lower {band}"),
        format!("upper {band}"),
    ])
    .with_title(title);
    for p in &curve.points {
        table.push_row(vec![
            number(p.time, 2),
            p.at_risk.to_string(),
            p.events.to_string(),
            p.censored.to_string(),
            number(p.survival, 4),
            number(p.lower, 4),
            number(p.upper, 4),
        ]);
    }
    table
}

/// One-line summary per curve: size, events, median.
pub fn curve_summary(curves: &[SurvivalCurve]) -> Table {
    let mut table = Table::new(&["group", "n", "events", "median"]);
    for c in curves {
        table.push_row(vec![
            c.label.clone().unwrap_or_else(|| "all".to_string()),
            c.n.to_string(),
            c.n_events.to_string(),
            c.median.map(|m| number(m, 2)).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

pub fn logrank_report(result: &LogRankResult) -> String {
    let mut table = Table::new(&["group", "n", "observed", "expected"])
        .with_title(format!("Log-rank test ({})", result.weighting.as_str()));
    for g in &result.groups {
        table.push_row(vec![
            g.label.clone(),
            g.n.to_string(),
            number(g.observed, 0),
            number(g.expected, 2),
        ]);
    }
    let verdict = if result.significant {
        "groups differ"
    } else {
        "no evidence of a difference"
    };
    format!(
        "{table}chi-square = {:.3} on {} df, p = {} ({verdict} at alpha = {})\n",
        result.statistic,
        result.df,
        p_value(result.p_value),
        result.alpha
    )
}

pub fn cox_report(model: &CoxModel) -> String {
    let level = format!("{:.0}%", (1.0 - model.alpha) * 100.0);
    let mut table = Table::new(&[
        "covariate".to_string(),
        "coef".to_string(),
        "exp(coef)".to_string(),
        "se".to_string(),
        "z".to_string(),
        "p".to_string(),
        format!("HR lower {level}"),
        format!("HR upper {level}"),
    ])
    .with_title(format!(
        "Cox proportional hazards (n = {}, events = {}, ties = {})",
        model.n,
        model.n_events,
        model.ties.as_str()
    ));
    for c in &model.coefficients {
        table.push_row(vec![
            c.name.clone(),
            number(c.coef, 4),
            number(c.hazard_ratio, 4),
            number(c.se, 4),
            number(c.z, 3),
            p_value(c.p_value),
            number(c.hazard_ratio_lower, 4),
            number(c.hazard_ratio_upper, 4),
        ]);
    }

    let mut out = table.to_string();
    out.push_str(&format!(
        "log-likelihood = {:.4} (null {:.4}), partial AIC = {:.3}\n",
        model.log_likelihood, model.null_log_likelihood, model.aic_partial
    ));
    out.push_str(&format!("concordance = {:.4}\n", model.concordance));
    for (name, test) in [
        ("likelihood ratio", &model.likelihood_ratio_test),
        ("wald", &model.wald_test),
        ("score (log-rank)", &model.score_test),
    ] {
        out.push_str(&format!(
            "{name:<17} test = {:.3} on {} df, p = {}\n",
            test.statistic,
            test.df,
            p_value(test.p_value)
        ));
    }
    if !model.converged {
        out.push_str(&format!(
            "warning: did not converge after {} iterations\n",
            model.iterations
        ));
    }
    out
}

pub fn ph_test_report(result: &PhTestResult) -> String {
    let mut table = Table::new(&["covariate", "statistic", "p", "violated"]).with_title(format!(
        "Proportional hazards test (transform = {})",
        result.transform.as_str()
    ));
    for c in &result.covariates {
        table.push_row(vec![
            c.name.clone(),
            number(c.statistic, 3),
            p_value(c.p_value),
            if c.violated { "yes" } else { "no" }.to_string(),
        ]);
    }
    format!(
        "{table}global: {:.3} on {} df, p = {}\n",
        result.global.statistic,
        result.global.df,
        p_value(result.global.p_value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survival::{CoxPh, KaplanMeier, LogRankTest, SurvivalData};
    use crate::text::count_by;
    use crate::types::{Document, GroupKey};
    use ndarray::array;

    fn data() -> SurvivalData {
        SurvivalData::new(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![true, true, false, true, true, true],
        )
        .unwrap()
        .with_covariates(vec!["age".into()], array![[70.0], [50.0], [65.0], [60.0], [45.0], [40.0]])
        .unwrap()
        .with_groups(["a", "a", "a", "b", "b", "b"].iter().map(|s| s.to_string()).collect())
        .unwrap()
    }

    #[test]
    fn test_count_table_rows() {
        let docs = Document::from_lines("poem", &["death death carriage"]);
        let tokens = crate::nlp::tokenizer::unnest_tokens(&docs, Default::default()).unwrap();
        let counts = count_by(&tokens, &[GroupKey::Word]);
        let out = count_table(&counts).to_string();
        assert!(out.lines().nth(2).unwrap().starts_with("death"));
        assert_eq!(count_chart(&counts, 10).render().lines().count(), 2);
    }

    #[test]
    fn test_survival_reports() {
        let data = data();
        let curve = KaplanMeier::new().fit(&data).unwrap();
        let table = curve_table(&curve);
        assert_eq!(table.len(), curve.points.len());
        assert!(table.to_string().contains("lower 95%"));

        let logrank = LogRankTest::new().test(&data).unwrap();
        let text = logrank_report(&logrank);
        assert!(text.contains("on 1 df"));

        let model = CoxPh::new().fit(&data).unwrap();
        let text = cox_report(&model);
        assert!(text.contains("age"));
        assert!(text.contains("concordance"));
    }

    #[test]
    fn test_json_report() {
        let curve = KaplanMeier::new().fit(&data()).unwrap();
        let json = to_json(&curve).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["n"], 6);
        assert!(value["points"].as_array().unwrap().len() > 1);
    }
}
