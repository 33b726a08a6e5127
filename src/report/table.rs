//! Aligned plain-text tables.

use std::fmt;

/// A table of pre-formatted cells. Columns whose cells are all numeric are
/// right-aligned, the rest left-aligned.
#[derive(Debug, Clone, Default)]
pub struct Table {
    title: Option<String>,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Self {
            title: None,
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append a row; short rows are padded with empty cells.
    pub fn push_row(&mut self, mut cells: Vec<String>) {
        cells.resize(self.headers.len().max(cells.len()), String::new());
        self.rows.push(cells);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let columns = self.rows.iter().map(Vec::len).chain([self.headers.len()]).max().unwrap_or(0);
        (0..columns)
            .map(|c| {
                self.rows
                    .iter()
                    .filter_map(|r| r.get(c))
                    .chain(self.headers.get(c))
                    .map(|s| s.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn numeric_columns(&self, columns: usize) -> Vec<bool> {
        (0..columns)
            .map(|c| {
                !self.rows.is_empty()
                    && self.rows.iter().all(|r| {
                        r.get(c)
                            .map(|cell| is_numeric(cell))
                            .unwrap_or(true)
                    })
            })
            .collect()
    }
}

fn is_numeric(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell == "-" || cell == "NaN" || cell.trim_end_matches('%').parse::<f64>().is_ok()
}

fn pad(cell: &str, width: usize, right: bool) -> String {
    let fill = width.saturating_sub(cell.chars().count());
    if right {
        format!("{}{}", " ".repeat(fill), cell)
    } else {
        format!("{}{}", cell, " ".repeat(fill))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        let numeric = self.numeric_columns(widths.len());
        let render = |cells: &[String]| {
            widths
                .iter()
                .enumerate()
                .map(|(c, &w)| pad(cells.get(c).map(String::as_str).unwrap_or(""), w, numeric[c]))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        if let Some(title) = &self.title {
            writeln!(f, "{title}")?;
        }
        writeln!(f, "{}", render(&self.headers))?;
        let rule: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        writeln!(f, "{}", "-".repeat(rule))?;
        for row in &self.rows {
            writeln!(f, "{}", render(row))?;
        }
        Ok(())
    }
}

/// Fixed-precision number, `-` for NaN or missing values.
pub fn number(value: f64, precision: usize) -> String {
    if value.is_finite() {
        format!("{value:.precision$}")
    } else if value.is_nan() {
        "-".to_string()
    } else {
        format!("{value}")
    }
}

/// p-values below display precision print as `<0.0001`.
pub fn p_value(p: f64) -> String {
    if p < 1e-4 {
        "<0.0001".to_string()
    } else {
        format!("{p:.4}")
    }
}
