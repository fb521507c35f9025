//! CSV output: deprecated-runtime export and full inventory.

use std::path::Path;
use tracing::info;

use super::{deprecated_functions, ReportError};
use crate::model::FunctionRecord;

const DEPRECATED_HEADER: &[&str] = &[
    "account_number",
    "region",
    "language",
    "language_version",
    "name",
    "ARN",
];

const DETAIL_HEADER: &[&str] = &["description", "tags"];

const INVENTORY_HEADER: &[&str] = &[
    "account_id",
    "account_name",
    "region",
    "function_name",
    "runtime",
    "language",
    "language_version",
    "support_status",
    "aws_supported",
    "deprecation_date",
    "memory_size",
    "timeout",
    "code_size",
    "lines_of_code",
    "complexity_score",
    "last_modified",
    "handler",
    "description",
    "tags",
];

/// Quotes a field when it contains a separator, quote or line break.
pub fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_escape(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn write_file(path: &Path, content: String) -> Result<(), ReportError> {
    std::fs::write(path, content).map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Writes one row per deprecated function and returns the row count.
///
/// No file is created when nothing is deprecated. `include_details` adds
/// the description and tags columns.
///
/// # Errors
///
/// Returns [`ReportError::Io`] if the file cannot be written.
pub fn export_deprecated_csv(
    functions: &[FunctionRecord],
    path: &Path,
    include_details: bool,
) -> Result<usize, ReportError> {
    let deprecated = deprecated_functions(functions);
    if deprecated.is_empty() {
        info!("No deprecated runtimes found; CSV file not created");
        return Ok(0);
    }

    let mut header: Vec<&str> = DEPRECATED_HEADER.to_vec();
    if include_details {
        header.extend_from_slice(DETAIL_HEADER);
    }

    let mut content = csv_line(&header);
    for function in &deprecated {
        let mut row = vec![
            function.account_id.clone().unwrap_or_else(|| "unknown".to_string()),
            function.region.clone(),
            function.language_name.clone(),
            function.language_version.clone(),
            function.function_name.clone(),
            function.arn(),
        ];
        if include_details {
            row.push(function.description.clone());
            row.push(function.tags_string());
        }
        content.push_str(&csv_line(&row));
    }

    write_file(path, content)?;
    info!(path = %path.display(), rows = deprecated.len(), "Exported deprecated runtimes to CSV");
    Ok(deprecated.len())
}

/// Writes every function as one CSV row and returns the row count.
///
/// # Errors
///
/// Returns [`ReportError::Io`] if the file cannot be written.
pub fn write_functions_csv(functions: &[FunctionRecord], path: &Path) -> Result<usize, ReportError> {
    let mut content = csv_line(INVENTORY_HEADER);
    for function in functions {
        let row = [
            function.account_id.clone().unwrap_or_default(),
            function.account_name.clone().unwrap_or_default(),
            function.region.clone(),
            function.function_name.clone(),
            function.runtime.clone(),
            function.language_name.clone(),
            function.language_version.clone(),
            function.support_status.to_string(),
            function.aws_supported.to_string(),
            function
                .deprecation_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            function.memory_size.to_string(),
            function.timeout.to_string(),
            function.code_size.to_string(),
            function.lines_of_code.to_string(),
            function.complexity_score.to_string(),
            function.last_modified.clone(),
            function.handler.clone(),
            function.description.clone(),
            function.tags_string(),
        ];
        content.push_str(&csv_line(&row));
    }

    write_file(path, content)?;
    info!(path = %path.display(), rows = functions.len(), "Results saved as CSV");
    Ok(functions.len())
}

// ============================================================================
// Tests
// ============================================================================
