//! JSON report file and timestamped output names.

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use super::ReportError;
use crate::model::{FunctionRecord, ScanResult};

const FILENAME_TIMESTAMP: &str = "%Y%m%d-%H%M%S";

/// Top-level report document.
#[derive(Debug, Serialize)]
pub struct ScanReport<'a> {
    /// ISO-8601 UTC
    pub scan_timestamp: String,
    pub total_functions: usize,
    pub regions_scanned: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts_scanned: Option<usize>,
    pub functions: &'a [FunctionRecord],
}

impl<'a> From<&'a ScanResult> for ScanReport<'a> {
    fn from(result: &'a ScanResult) -> Self {
        Self {
            scan_timestamp: result.scan_timestamp.to_rfc3339(),
            total_functions: result.functions.len(),
            regions_scanned: &result.regions_scanned,
            accounts_scanned: result.accounts_scanned(),
            functions: &result.functions,
        }
    }
}

/// Writes the pretty-printed report to `path`.
///
/// # Errors
///
/// Returns [`ReportError`] on serialization or write failure.
pub fn write_json_report(result: &ScanResult, path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(&ScanReport::from(result))?;
    std::fs::write(path, json).map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), functions = result.functions.len(), "Results saved");
    Ok(())
}

/// Prefixes the file name of `base` with the current local time and an
/// optional account id: `YYYYMMDD-HHMMSS[-account]_name`.
///
/// Directory components of `base` are kept as they are.
pub fn generate_timestamped_filename(base: &str, account_id: Option<&str>) -> String {
    generate_timestamped_filename_at(base, account_id, Local::now())
}

pub fn generate_timestamped_filename_at<Tz: TimeZone>(
    base: &str,
    account_id: Option<&str>,
    at: DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let timestamp = at.format(FILENAME_TIMESTAMP);
    let path = Path::new(base);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| base.to_string());

    let prefixed = match account_id {
        Some(id) if !id.is_empty() => format!("{}-{}_{}", timestamp, id, name),
        _ => format!("{}_{}", timestamp, name),
    };

    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            PathBuf::from(dir).join(prefixed).to_string_lossy().into_owned()
        }
        _ => prefixed,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_record;
    use crate::model::SupportStatus;
    use chrono::Utc;
    use regex::Regex;

    #[test]
    fn test_timestamped_filename_format() {
        let plain = Regex::new(r"^\d{8}-\d{6}_report\.json$").unwrap();
        assert!(plain.is_match(&generate_timestamped_filename("report.json", None)));

        let with_account = Regex::new(r"^\d{8}-\d{6}-123456789012_report\.json$").unwrap();
        assert!(with_account.is_match(&generate_timestamped_filename(
            "report.json",
            Some("123456789012")
        )));
    }

    #[test]
    fn test_timestamped_filename_keeps_directory() {
        let at = Utc.with_ymd_and_hms(2025, 9, 10, 14, 25, 30).unwrap();
        assert_eq!(
            generate_timestamped_filename_at("out/deprecated.csv", Some("111111111111"), at),
            "out/20250910-142530-111111111111_deprecated.csv"
        );
        assert_eq!(
            generate_timestamped_filename_at("report.json", Some(""), at),
            "20250910-142530_report.json"
        );
    }

    #[test]
    fn test_write_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let result = ScanResult {
            functions: vec![sample_record(
                "cron",
                "python3.7",
                "Python",
                SupportStatus::Deprecated,
                500,
                10,
            )],
            regions_scanned: vec!["us-east-1".to_string()],
            scan_timestamp: Utc::now(),
            account_id: Some("111111111111".to_string()),
            accounts: Vec::new(),
        };

        write_json_report(&result, &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(value["total_functions"], 1);
        assert_eq!(value["regions_scanned"][0], "us-east-1");
        assert!(value.get("accounts_scanned").is_none());
        assert_eq!(value["functions"][0]["support_status"], "deprecated");
        assert_eq!(value["functions"][0]["complexity_score"], "low");
        assert_eq!(value["functions"][0]["tags"], "");
    }
}
