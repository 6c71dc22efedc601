//! Threshold Reports
//!
//! One [`ThresholdReport`] per aggregated threshold, rendered either as CSV
//! rows under [`CSV_HEADER`] or as a JSON array.

use crate::aggregation::AggregationState;
use crate::tree::MeasurementTree;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CSV_HEADER: &str = "type,k,num,frac,num_tags,num_leaf_tags,len_part_msmts,num_part_msmts";

/// Output rendering for a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format {:?}", other)),
        }
    }
}

/// Utility numbers for one threshold over one tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub k: u64,
    pub num_attrs: usize,
    pub total: u64,
    pub full: u64,
    pub partial: u64,
    pub lost: u64,
    /// Resolved depth -> number of measurements, for every depth `1..=num_attrs`
    pub len_partial_counts: BTreeMap<usize, u64>,
    pub num_nodes: usize,
    pub num_tags: usize,
    pub num_leaf_tags: usize,
}

fn frac(a: u64, b: u64) -> f64 {
    if b == 0 {
        return 0.0;
    }
    a as f64 / b as f64
}

impl ThresholdReport {
    pub fn new(
        k: u64,
        num_attrs: usize,
        tree: &MeasurementTree,
        state: &AggregationState,
    ) -> Self {
        let total = tree.total_count();
        let full = state.full_count();
        let partial = state.partial_count();

        ThresholdReport {
            k,
            num_attrs,
            total,
            full,
            partial,
            lost: total.saturating_sub(full + partial),
            len_partial_counts: (1..=num_attrs)
                .map(|depth| (depth, state.len_partial(depth)))
                .collect(),
            num_nodes: tree.node_count(),
            num_tags: tree.tag_count(),
            num_leaf_tags: tree.leaf_tag_count(),
        }
    }

    pub fn frac_full(&self) -> f64 {
        frac(self.full, self.total)
    }

    pub fn frac_partial(&self) -> f64 {
        frac(self.partial, self.total)
    }

    pub fn frac_lost(&self) -> f64 {
        frac(self.lost, self.total)
    }

    /// Count for `depth`, zero outside `1..=num_attrs`
    pub fn len_partial(&self, depth: usize) -> u64 {
        self.len_partial_counts.get(&depth).copied().unwrap_or(0)
    }

    /// Human readable one-liner
    pub fn summary(&self) -> String {
        format!(
            "{} ({:.1}%) full, {} ({:.1}%) partial out of {}; {:.1}% lost",
            self.full,
            self.frac_full() * 100.0,
            self.partial,
            self.frac_partial() * 100.0,
            self.total,
            self.frac_lost() * 100.0
        )
    }

    /// Rows for this threshold, matching [`CSV_HEADER`].
    ///
    /// `LenPartMsmt` rows cover depths below `num_attrs`, each with its share
    /// of all revealed measurements.
    pub fn csv_rows(&self) -> Vec<String> {
        let revealed: u64 = self.len_partial_counts.values().sum();
        let mut rows = Vec::with_capacity(self.num_attrs + 1);

        for depth in 1..self.num_attrs {
            let num = self.len_partial(depth);
            rows.push(format!(
                "LenPartMsmt,{},{},{:.2},0,0,{},{}",
                self.k,
                num,
                frac(num, revealed),
                depth,
                num
            ));
        }
        rows.push(format!(
            "Full,{},{},{:.3},{},{},0,0",
            self.k,
            self.full,
            self.frac_full(),
            self.num_tags,
            self.num_leaf_tags
        ));
        rows.push(format!(
            "Partial,{},{},{:.3},{},{},0,0",
            self.k,
            self.partial,
            self.frac_partial(),
            self.num_tags,
            self.num_leaf_tags
        ));
        rows
    }
}

/// Header plus every report's rows, newline terminated
pub fn render_csv(reports: &[ThresholdReport]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for report in reports {
        for row in report.csv_rows() {
            out.push_str(&row);
            out.push('\n');
        }
    }
    out
}

pub fn render_json(reports: &[ThresholdReport]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(reports)
}

pub fn render(reports: &[ThresholdReport], format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Csv => Ok(render_csv(reports)),
        OutputFormat::Json => render_json(reports),
    }
}
