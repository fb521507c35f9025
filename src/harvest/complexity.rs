//! Size-based code complexity estimate.
//!
//! This is a proxy, not static analysis: lines of code are guessed from the
//! deployment package size with a per-language bytes-per-line divisor, then
//! bucketed into a [`ComplexityTier`]. Dependencies bundled into the package
//! inflate the estimate; that is a known approximation.

use serde::Serialize;

use crate::model::ComplexityTier;

/// Runtime identifier prefix to average bytes per line of code.
const BYTES_PER_LINE: &[(&str, u64)] = &[("python", 50), ("ruby", 50), ("node", 40), ("java", 100)];

const DEFAULT_BYTES_PER_LINE: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplexityEstimate {
    pub lines_of_code: u64,
    pub complexity: ComplexityTier,
    pub code_location: Option<String>,
}

impl ComplexityEstimate {
    /// Value used when the code metadata could not be fetched.
    pub fn unknown() -> Self {
        Self {
            lines_of_code: 0,
            complexity: ComplexityTier::Unknown,
            code_location: None,
        }
    }
}

pub fn bytes_per_line(runtime: &str) -> u64 {
    BYTES_PER_LINE
        .iter()
        .find(|(prefix, _)| runtime.starts_with(prefix))
        .map(|(_, divisor)| *divisor)
        .unwrap_or(DEFAULT_BYTES_PER_LINE)
}

/// Estimates lines of code from a package size; never below one line.
pub fn estimate(code_size: u64, runtime: &str) -> ComplexityEstimate {
    let lines_of_code = (code_size / bytes_per_line(runtime)).max(1);
    ComplexityEstimate {
        lines_of_code,
        complexity: ComplexityTier::from_lines(lines_of_code),
        code_location: None,
    }
}
