//! ASCII charts: horizontal bars and survival step plots.

use crate::survival::SurvivalCurve;

/// Horizontal bar chart. Negative values draw with a lighter fill so net
/// sentiment reads at a glance.
#[derive(Debug, Clone)]
pub struct BarChart {
    title: Option<String>,
    bars: Vec<(String, f64)>,
    width: usize,
}

impl BarChart {
    pub fn new(width: usize) -> Self {
        Self {
            title: None,
            bars: Vec::new(),
            width: width.max(1),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn push(&mut self, label: impl Into<String>, value: f64) {
        self.bars.push((label.into(), value));
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(title) = &self.title {
            out.push_str(title);
            out.push('\n');
        }
        if self.bars.is_empty() {
            out.push_str("(no data)\n");
            return out;
        }

        let label_width = self.bars.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
        let max_abs = self
            .bars
            .iter()
            .map(|(_, v)| v.abs())
            .fold(0.0f64, f64::max);

        for (label, value) in &self.bars {
            let len = if max_abs > 0.0 {
                ((value.abs() / max_abs) * self.width as f64).round() as usize
            } else {
                0
            };
            let fill = if *value < 0.0 { "░" } else { "█" };
            let bar = fill.repeat(len);
            let value = if value.fract() == 0.0 {
                format!("{value:.0}")
            } else {
                format!("{value:.3}")
            };
            out.push_str(&format!(
                "{label:<label_width$}  {bar:<bar_width$}  {value}\n",
                bar_width = self.width
            ));
        }
        out
    }
}

const MARKERS: [char; 6] = ['*', '+', 'o', 'x', '#', '@'];

/// Step plot of one or more survival curves on a shared time axis.
#[derive(Debug, Clone)]
pub struct StepPlot {
    width: usize,
    height: usize,
}

impl Default for StepPlot {
    fn default() -> Self {
        Self {
            width: 60,
            height: 15,
        }
    }
}

impl StepPlot {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width: width.max(2),
            height: height.max(2),
        }
    }

    pub fn render(&self, curves: &[SurvivalCurve]) -> String {
        if curves.is_empty() {
            return "(no curves)\n".to_string();
        }
        let max_time = curves.iter().map(SurvivalCurve::last_time).fold(0.0f64, f64::max);
        let span = if max_time > 0.0 { max_time } else { 1.0 };

        let mut grid = vec![vec![' '; self.width]; self.height];
        for (k, curve) in curves.iter().enumerate() {
            let marker = MARKERS[k % MARKERS.len()];
            for col in 0..self.width {
                let t = span * col as f64 / (self.width - 1) as f64;
                let s = curve.survival_at(t);
                let row = ((1.0 - s) * (self.height - 1) as f64).round() as usize;
                grid[row.min(self.height - 1)][col] = marker;
            }
        }

        let mut out = String::new();
        for (r, row) in grid.iter().enumerate() {
            let label = if r == 0 {
                "1.0"
            } else if r == self.height - 1 {
                "0.0"
            } else if r == (self.height - 1) / 2 {
                "0.5"
            } else {
                ""
            };
            let line: String = row.iter().collect();
            out.push_str(&format!("{label:>4} |{}\n", line.trim_end()));
        }
        out.push_str(&format!("     +{}\n", "-".repeat(self.width)));
        let end = format!("{max_time:.1}");
        out.push_str(&format!(
            "      0{end:>pad$}\n",
            pad = self.width.saturating_sub(1)
        ));

        for (k, curve) in curves.iter().enumerate() {
            let label = curve.label.as_deref().unwrap_or("all");
            let median = curve
                .median
                .map(|m| format!("{m:.2}"))
                .unwrap_or_else(|| "not reached".to_string());
            out.push_str(&format!(
                "  {} {label} (n={}, events={}, median={median})\n",
                MARKERS[k % MARKERS.len()],
                curve.n,
                curve.n_events
            ));
        }
        out
    }
}
