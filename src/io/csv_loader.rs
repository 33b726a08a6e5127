//! Delimited survival tables
//!
//! The caller names the duration and event columns, the numeric and
//! categorical covariates, and an optional group column. Rows that fail to
//! parse are dropped with a warning and recorded in the [`LoadReport`];
//! a named column missing from the header is an error.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use ndarray::Array2;
use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::survival::SurvivalData;

/// Parse an event flag: `1/0`, `true/false`, `yes/no`, `y/n`
/// (case-insensitive).
pub fn parse_event(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "t" => Some(true),
        "0" | "false" | "no" | "n" | "f" => Some(false),
        _ => None,
    }
}

/// A row left out of the loaded data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRow {
    /// 1-based line in the file, header included
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub dropped: Vec<DroppedRow>,
}

impl LoadReport {
    pub fn n_dropped(&self) -> usize {
        self.dropped.len()
    }
}

#[derive(Debug, Clone)]
pub struct LoadedSurvival {
    pub data: SurvivalData,
    pub report: LoadReport,
}

/// Column mapping for a delimited survival table
#[derive(Debug, Clone)]
pub struct CsvLoader {
    duration: String,
    event: String,
    covariates: Vec<String>,
    categorical: Vec<String>,
    group: Option<String>,
    delimiter: u8,
}

struct Columns {
    duration: usize,
    event: usize,
    covariates: Vec<usize>,
    categorical: Vec<usize>,
    group: Option<usize>,
}

/// Parsed fields of one kept row
struct Row {
    duration: f64,
    event: bool,
    numeric: Vec<f64>,
    levels: Vec<String>,
    group: Option<String>,
}

impl CsvLoader {
    pub fn new(duration: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            duration: duration.into(),
            event: event.into(),
            covariates: Vec::new(),
            categorical: Vec::new(),
            group: None,
            delimiter: b',',
        }
    }

    /// Numeric covariate columns
    pub fn with_covariates<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.covariates = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Categorical covariate columns, one-hot encoded as `column=level`
    /// dummies with the first level (sorted) as reference.
    pub fn with_categorical<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.categorical = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn with_group(mut self, column: impl Into<String>) -> Self {
        self.group = Some(column.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load a file; `.tsv` and `.tab` files are read tab-delimited.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadedSurvival> {
        let path = path.as_ref();
        let loader = match path.extension().and_then(|e| e.to_str()) {
            Some("tsv") | Some("tab") => self.clone().with_delimiter(b'\t'),
            _ => self.clone(),
        };
        let _span = tracing::info_span!("load_table", path = %path.display()).entered();
        loader.from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(&self, reader: R) -> Result<LoadedSurvival> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let columns = self.resolve(&headers)?;

        let mut report = LoadReport::default();
        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            // Quoted newlines shift records off their index
            let position = match &record {
                Ok(record) => record.position(),
                Err(e) => e.position(),
            };
            let line = position.map_or(i + 2, |p| p.line() as usize);
            report.rows_read += 1;
            let parsed = record
                .map_err(|e| e.to_string())
                .and_then(|record| self.parse_row(&record, &columns));
            match parsed {
                Ok(row) => rows.push(row),
                Err(reason) => {
                    tracing::warn!(line, reason = reason.as_str(), "dropped malformed row");
                    report.dropped.push(DroppedRow { line, reason });
                }
            }
        }
        report.rows_kept = rows.len();
        if report.n_dropped() > 0 {
            tracing::warn!(
                dropped = report.n_dropped(),
                kept = report.rows_kept,
                "rows dropped while loading"
            );
        }

        let data = self.assemble(rows)?;
        tracing::info!(
            rows = data.len(),
            events = data.n_events(),
            covariates = data.n_covariates(),
            "loaded survival table"
        );
        Ok(LoadedSurvival { data, report })
    }

    fn resolve(&self, headers: &StringRecord) -> Result<Columns> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))
        };
        Ok(Columns {
            duration: find(&self.duration)?,
            event: find(&self.event)?,
            covariates: self.covariates.iter().map(|c| find(c)).collect::<Result<_>>()?,
            categorical: self.categorical.iter().map(|c| find(c)).collect::<Result<_>>()?,
            group: self.group.as_deref().map(find).transpose()?,
        })
    }

    fn parse_row(&self, record: &StringRecord, columns: &Columns) -> std::result::Result<Row, String> {
        let field = |index: usize, name: &str| {
            record
                .get(index)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| format!("`{name}` is empty"))
        };

        let raw = field(columns.duration, &self.duration)?;
        let duration: f64 = raw
            .parse()
            .map_err(|_| format!("`{}` value {raw:?} is not a number", self.duration))?;
        if !duration.is_finite() || duration < 0.0 {
            return Err(format!("`{}` value {duration} is negative or not finite", self.duration));
        }

        let raw = field(columns.event, &self.event)?;
        let event = parse_event(raw)
            .ok_or_else(|| format!("`{}` value {raw:?} is not an event flag", self.event))?;

        let mut numeric = Vec::with_capacity(columns.covariates.len());
        for (&index, name) in columns.covariates.iter().zip(&self.covariates) {
            let raw = field(index, name)?;
            let value: f64 = raw
                .parse()
                .map_err(|_| format!("`{name}` value {raw:?} is not a number"))?;
            if !value.is_finite() {
                return Err(format!("`{name}` value is not finite"));
            }
            numeric.push(value);
        }

        let levels = columns
            .categorical
            .iter()
            .zip(&self.categorical)
            .map(|(&index, name)| field(index, name).map(str::to_string))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let group = match (columns.group, self.group.as_deref()) {
            (Some(index), Some(name)) => Some(field(index, name)?.to_string()),
            _ => None,
        };

        Ok(Row {
            duration,
            event,
            numeric,
            levels,
            group,
        })
    }

    fn assemble(&self, rows: Vec<Row>) -> Result<SurvivalData> {
        // Sorted levels per categorical column; the first is the reference
        let dummy_levels: Vec<Vec<String>> = (0..self.categorical.len())
            .map(|c| {
                rows.iter()
                    .map(|r| r.levels[c].clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .skip(1)
                    .collect()
            })
            .collect();

        let mut names = self.covariates.clone();
        for (column, levels) in self.categorical.iter().zip(&dummy_levels) {
            names.extend(levels.iter().map(|level| format!("{column}={level}")));
        }

        let n = rows.len();
        let p = names.len();
        let mut flat = Vec::with_capacity(n * p);
        for row in &rows {
            flat.extend_from_slice(&row.numeric);
            for (value, levels) in row.levels.iter().zip(&dummy_levels) {
                flat.extend(levels.iter().map(|level| if level == value { 1.0 } else { 0.0 }));
            }
        }

        let durations = rows.iter().map(|r| r.duration).collect();
        let events = rows.iter().map(|r| r.event).collect();
        let groups: Option<Vec<String>> = rows.iter().map(|r| r.group.clone()).collect();

        let mut data = SurvivalData::new(durations, events)?;
        if p > 0 {
            let actual = flat.len();
            let matrix = Array2::from_shape_vec((n, p), flat)
                .map_err(|_| AnalysisError::DimensionMismatch { expected: n * p, actual })?;
            data = data.with_covariates(names, matrix)?;
        }
        if self.group.is_some() {
            if let Some(groups) = groups {
                data = data.with_groups(groups)?;
            }
        }
        Ok(data)
    }
}
