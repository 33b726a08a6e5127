//! Validated survival data
//!
//! Durations, event flags, an optional covariate matrix with named columns,
//! and an optional group label per subject. All estimators take a
//! `&SurvivalData`, so the checks here run once.

use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// One subject: observed duration, whether the event occurred, covariates
/// and an optional group label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalRecord {
    pub duration: f64,
    pub event: bool,
    #[serde(default)]
    pub covariates: Vec<f64>,
    #[serde(default)]
    pub group: Option<String>,
}

impl SurvivalRecord {
    pub fn new(duration: f64, event: bool) -> Self {
        Self {
            duration,
            event,
            covariates: Vec::new(),
            group: None,
        }
    }

    pub fn with_covariates(mut self, covariates: Vec<f64>) -> Self {
        self.covariates = covariates;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SurvivalData {
    durations: Vec<f64>,
    events: Vec<bool>,
    covariates: Array2<f64>,
    covariate_names: Vec<String>,
    groups: Option<Vec<String>>,
}

impl SurvivalData {
    /// Build from durations and event flags.
    ///
    /// Durations must be finite and non-negative; at least one subject is
    /// required.
    pub fn new(durations: Vec<f64>, events: Vec<bool>) -> Result<Self> {
        if durations.is_empty() {
            return Err(AnalysisError::EmptyInput("survival data"));
        }
        if durations.len() != events.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: durations.len(),
                actual: events.len(),
            });
        }
        if let Some(index) = durations.iter().position(|d| !d.is_finite() || *d < 0.0) {
            return Err(AnalysisError::InvalidRecord {
                index,
                reason: format!("duration {} must be finite and non-negative", durations[index]),
            });
        }

        let n = durations.len();
        Ok(Self {
            durations,
            events,
            covariates: Array2::zeros((n, 0)),
            covariate_names: Vec::new(),
            groups: None,
        })
    }

    /// Build from records. Covariate vectors must all have
    /// `covariate_names.len()` entries; group labels are kept only if every
    /// record has one.
    pub fn from_records(records: &[SurvivalRecord], covariate_names: &[&str]) -> Result<Self> {
        let durations = records.iter().map(|r| r.duration).collect();
        let events = records.iter().map(|r| r.event).collect();
        let mut data = Self::new(durations, events)?;

        let p = covariate_names.len();
        let mut flat = Vec::with_capacity(records.len() * p);
        for record in records {
            if record.covariates.len() != p {
                return Err(AnalysisError::DimensionMismatch {
                    expected: p,
                    actual: record.covariates.len(),
                });
            }
            flat.extend_from_slice(&record.covariates);
        }
        let matrix = Array2::from_shape_vec((records.len(), p), flat).map_err(|_| {
            AnalysisError::DimensionMismatch {
                expected: records.len() * p,
                actual: records.iter().map(|r| r.covariates.len()).sum(),
            }
        })?;
        data = data.with_covariates(covariate_names.iter().map(|s| s.to_string()).collect(), matrix)?;

        let groups: Option<Vec<String>> = records.iter().map(|r| r.group.clone()).collect();
        if let Some(groups) = groups {
            data = data.with_groups(groups)?;
        }
        Ok(data)
    }

    /// Attach a covariate matrix (one row per subject, one column per name).
    pub fn with_covariates(mut self, names: Vec<String>, covariates: Array2<f64>) -> Result<Self> {
        let (rows, cols) = covariates.dim();
        if rows != self.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.len(),
                actual: rows,
            });
        }
        if cols != names.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: names.len(),
                actual: cols,
            });
        }
        if let Some(((row, _), _)) = covariates.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(AnalysisError::InvalidRecord {
                index: row,
                reason: "covariate values must be finite".to_string(),
            });
        }
        self.covariates = covariates;
        self.covariate_names = names;
        Ok(self)
    }

    /// Attach one group label per subject.
    pub fn with_groups(mut self, groups: Vec<String>) -> Result<Self> {
        if groups.len() != self.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.len(),
                actual: groups.len(),
            });
        }
        self.groups = Some(groups);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn events(&self) -> &[bool] {
        &self.events
    }

    pub fn covariates(&self) -> &Array2<f64> {
        &self.covariates
    }

    pub fn covariate_names(&self) -> &[String] {
        &self.covariate_names
    }

    pub fn n_covariates(&self) -> usize {
        self.covariates.ncols()
    }

    pub fn groups(&self) -> Option<&[String]> {
        self.groups.as_deref()
    }

    pub fn n_events(&self) -> usize {
        self.events.iter().filter(|&&e| e).count()
    }

    /// Subset of subjects by index, keeping covariates and groups aligned.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        let durations = indices.iter().map(|&i| self.durations[i]).collect();
        let events = indices.iter().map(|&i| self.events[i]).collect();
        let mut data = Self::new(durations, events)?;
        let covariates = self.covariates.select(ndarray::Axis(0), indices);
        data = data.with_covariates(self.covariate_names.clone(), covariates)?;
        if let Some(groups) = &self.groups {
            data = data.with_groups(indices.iter().map(|&i| groups[i].clone()).collect())?;
        }
        Ok(data)
    }

    /// Subject indices per group label, in label order.
    pub fn group_indices(&self) -> Result<BTreeMap<String, Vec<usize>>> {
        let groups = self
            .groups
            .as_ref()
            .ok_or(AnalysisError::MissingColumn("group".to_string()))?;
        let mut out: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, g) in groups.iter().enumerate() {
            out.entry(g.clone()).or_default().push(i);
        }
        Ok(out)
    }

    /// Split into one dataset per group label, in label order.
    pub fn split_by_group(&self) -> Result<Vec<(String, SurvivalData)>> {
        self.group_indices()?
            .into_iter()
            .map(|(label, indices)| Ok((label, self.subset(&indices)?)))
            .collect()
    }
}
