//! Aggregation and report output.
//!
//! - **Statistics**: tallies and totals via [`ScanStatistics::calculate`]
//! - **JSON**: the report file via [`json::write_json_report`]
//! - **CSV**: deprecated-runtime export via [`csv::export_deprecated_csv`]
//! - **Summary**: console text via [`summary::format_summary`]
//!
//! Every view decides "deprecated" through [`FunctionRecord::is_deprecated`].

pub mod csv;
pub mod json;
pub mod summary;

pub use self::csv::{export_deprecated_csv, write_functions_csv};
pub use json::{generate_timestamped_filename, write_json_report, ScanReport};
pub use summary::format_summary;

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::{ComplexityTier, FunctionRecord, SupportStatus};

/// Errors from writing report files.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error writing '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tallies over a set of function records.
///
/// Support and complexity tallies always carry every bucket, zero or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanStatistics {
    pub total_functions: usize,
    pub runtime_stats: BTreeMap<String, usize>,
    pub language_stats: BTreeMap<String, usize>,
    pub support_stats: BTreeMap<SupportStatus, usize>,
    pub complexity_stats: BTreeMap<ComplexityTier, usize>,
    pub total_code_size: u64,
    pub total_lines_of_code: u64,
}

impl Default for ScanStatistics {
    fn default() -> Self {
        Self {
            total_functions: 0,
            runtime_stats: BTreeMap::new(),
            language_stats: BTreeMap::new(),
            support_stats: SupportStatus::ALL.iter().map(|s| (*s, 0)).collect(),
            complexity_stats: ComplexityTier::ALL.iter().map(|c| (*c, 0)).collect(),
            total_code_size: 0,
            total_lines_of_code: 0,
        }
    }
}

impl ScanStatistics {
    pub fn calculate(functions: &[FunctionRecord]) -> Self {
        let mut stats = Self::default();
        for function in functions {
            stats.add(function);
        }
        stats
    }

    fn add(&mut self, function: &FunctionRecord) {
        self.total_functions += 1;
        *self.runtime_stats.entry(function.runtime.clone()).or_insert(0) += 1;
        *self
            .language_stats
            .entry(function.language_name.clone())
            .or_insert(0) += 1;
        *self.support_stats.entry(function.support_status).or_insert(0) += 1;
        *self
            .complexity_stats
            .entry(function.complexity_score)
            .or_insert(0) += 1;
        self.total_code_size += function.code_size;
        self.total_lines_of_code += function.lines_of_code;
    }

    /// Combines tallies of two disjoint record sets.
    pub fn merge(mut self, other: &ScanStatistics) -> Self {
        self.total_functions += other.total_functions;
        merge_counts(&mut self.runtime_stats, &other.runtime_stats);
        merge_counts(&mut self.language_stats, &other.language_stats);
        merge_counts(&mut self.support_stats, &other.support_stats);
        merge_counts(&mut self.complexity_stats, &other.complexity_stats);
        self.total_code_size += other.total_code_size;
        self.total_lines_of_code += other.total_lines_of_code;
        self
    }

    /// Mean code size in bytes; zero for an empty set.
    pub fn average_code_size(&self) -> f64 {
        average(self.total_code_size, self.total_functions)
    }

    /// Mean estimated lines of code; zero for an empty set.
    pub fn average_lines_of_code(&self) -> f64 {
        average(self.total_lines_of_code, self.total_functions)
    }

    /// Share of all functions, in percent.
    pub fn percentage(&self, count: usize) -> f64 {
        if self.total_functions == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.total_functions as f64
        }
    }

    pub fn support_count(&self, status: SupportStatus) -> usize {
        self.support_stats.get(&status).copied().unwrap_or(0)
    }
}

fn merge_counts<K: Ord + Clone>(into: &mut BTreeMap<K, usize>, from: &BTreeMap<K, usize>) {
    for (key, count) in from {
        *into.entry(key.clone()).or_insert(0) += count;
    }
}

fn average(total: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Records whose support status is exactly `deprecated`, in input order.
pub fn deprecated_functions(functions: &[FunctionRecord]) -> Vec<&FunctionRecord> {
    functions.iter().filter(|f| f.is_deprecated()).collect()
}

/// Up to `n` records with the most estimated lines of code.
///
/// Ties keep input order.
pub fn largest_functions(functions: &[FunctionRecord], n: usize) -> Vec<&FunctionRecord> {
    let mut sorted: Vec<&FunctionRecord> = functions.iter().collect();
    sorted.sort_by(|a, b| b.lines_of_code.cmp(&a.lines_of_code));
    sorted.truncate(n);
    sorted
}

// ============================================================================
// Tests
// ============================================================================
