//! Plain-text console summary.

use std::fmt::Write;

use super::{deprecated_functions, largest_functions, ScanStatistics};
use crate::model::{ComplexityTier, ScanResult, SupportStatus};

const RULE_WIDTH: usize = 80;
const LARGEST_SHOWN: usize = 3;

fn title_case(label: &str) -> String {
    label
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn with_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Renders the run summary shown after a scan.
pub fn format_summary(result: &ScanResult) -> String {
    let mut out = String::new();
    // fmt::Write into a String cannot fail
    let _ = write_summary(&mut out, result);
    out
}

fn write_summary(out: &mut String, result: &ScanResult) -> std::fmt::Result {
    let rule = "=".repeat(RULE_WIDTH);
    let total = result.functions.len();

    writeln!(out, "\n{}", rule)?;
    writeln!(out, "LAMBDA ASSESSMENT SUMMARY")?;
    writeln!(out, "{}", rule)?;

    writeln!(out, "\nSCAN OVERVIEW:")?;
    writeln!(out, "   - Total Functions Found: {}", total)?;
    writeln!(
        out,
        "   - Regions Scanned: {} ({})",
        result.regions_scanned.len(),
        result.regions_scanned.join(", ")
    )?;
    if let Some(scanned) = result.accounts_scanned() {
        writeln!(
            out,
            "   - Organization Accounts: {} of {} scanned",
            scanned,
            result.accounts.len()
        )?;
        for skipped in result.skipped_accounts() {
            writeln!(
                out,
                "     skipped {} ({}): {}",
                skipped.account_name,
                skipped.account_id,
                title_case(skipped.state.as_str())
            )?;
        }
    }

    if total == 0 {
        writeln!(out, "\n   No functions found in the specified regions.")?;
        return Ok(());
    }

    let stats = ScanStatistics::calculate(&result.functions);

    writeln!(out, "\nRUNTIME BREAKDOWN:")?;
    for (runtime, count) in &stats.runtime_stats {
        writeln!(
            out,
            "   - {}: {} functions ({:.1}%)",
            runtime,
            count,
            stats.percentage(*count)
        )?;
    }

    writeln!(out, "\nLANGUAGE BREAKDOWN:")?;
    for (language, count) in &stats.language_stats {
        writeln!(
            out,
            "   - {}: {} functions ({:.1}%)",
            language,
            count,
            stats.percentage(*count)
        )?;
    }

    writeln!(out, "\nSUPPORT STATUS:")?;
    for status in SupportStatus::ALL {
        let count = stats.support_count(status);
        if count > 0 {
            writeln!(
                out,
                "   - {}: {} functions ({:.1}%)",
                title_case(status.as_str()),
                count,
                stats.percentage(count)
            )?;
        }
    }

    writeln!(out, "\nCOMPLEXITY ANALYSIS:")?;
    for tier in ComplexityTier::ALL {
        let count = stats.complexity_stats.get(&tier).copied().unwrap_or(0);
        if count > 0 {
            writeln!(
                out,
                "   - {}: {} functions ({:.1}%)",
                title_case(tier.as_str()),
                count,
                stats.percentage(count)
            )?;
        }
    }

    writeln!(out, "\nSIZE METRICS:")?;
    writeln!(out, "   - Total Code Size: {} bytes", with_thousands(stats.total_code_size))?;
    writeln!(
        out,
        "   - Average Code Size: {} bytes",
        with_thousands(stats.average_code_size().round() as u64)
    )?;
    writeln!(
        out,
        "   - Total Lines of Code: {}",
        with_thousands(stats.total_lines_of_code)
    )?;
    writeln!(
        out,
        "   - Average Lines of Code: {:.0}",
        stats.average_lines_of_code()
    )?;

    let deprecated = deprecated_functions(&result.functions);
    if !deprecated.is_empty() {
        writeln!(out, "\nDEPRECATED RUNTIMES DETECTED:")?;
        for function in &deprecated {
            match &function.account_id {
                Some(account) if result.is_organization_scan() => writeln!(
                    out,
                    "   - {} ({}) in {} of {}",
                    function.function_name, function.runtime, function.region, account
                )?,
                _ => writeln!(
                    out,
                    "   - {} ({}) in {}",
                    function.function_name, function.runtime, function.region
                )?,
            }
        }
        writeln!(
            out,
            "   -> Consider upgrading these {} function(s) to supported runtimes",
            deprecated.len()
        )?;
    }

    writeln!(out, "\nLARGEST FUNCTIONS (by estimated LOC):")?;
    for (i, function) in largest_functions(&result.functions, LARGEST_SHOWN)
        .iter()
        .enumerate()
    {
        writeln!(
            out,
            "   {}. {}: {} lines ({} complexity)",
            i + 1,
            function.function_name,
            function.lines_of_code,
            function.complexity_score
        )?;
    }

    writeln!(out, "\n{}", rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_record;
    use crate::model::{AccountScan, AccountScanState};
    use chrono::Utc;

    fn result(accounts: Vec<AccountScan>) -> ScanResult {
        ScanResult {
            functions: vec![
                sample_record("ingest", "python3.9", "Python", SupportStatus::Supported, 1000, 20),
                sample_record("api", "nodejs18.x", "Node.js", SupportStatus::Supported, 2000, 1500),
                sample_record("cron", "python3.7", "Python", SupportStatus::Deprecated, 500, 10),
                sample_record("etl", "java21", "Java", SupportStatus::Supported, 90_000, 900),
            ],
            regions_scanned: vec!["us-east-1".to_string(), "eu-west-1".to_string()],
            scan_timestamp: Utc::now(),
            account_id: None,
            accounts,
        }
    }

    #[test]
    fn test_helpers() {
        assert_eq!(title_case("very_high"), "Very High");
        assert_eq!(title_case("deprecation_scheduled"), "Deprecation Scheduled");
        assert_eq!(with_thousands(0), "0");
        assert_eq!(with_thousands(999), "999");
        assert_eq!(with_thousands(93_500), "93,500");
        assert_eq!(with_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_summary_sections() {
        let summary = format_summary(&result(Vec::new()));

        assert!(summary.contains("Total Functions Found: 4"));
        assert!(summary.contains("Regions Scanned: 2 (us-east-1, eu-west-1)"));
        assert!(summary.contains("   - Python: 2 functions (50.0%)"));
        assert!(summary.contains("   - Supported: 3 functions (75.0%)"));
        assert!(summary.contains("   - Very High: 1 functions (25.0%)"));
        assert!(summary.contains("Total Code Size: 93,500 bytes"));
        assert!(summary.contains("   - cron (python3.7) in us-east-1\n"));
        assert!(summary.contains("   1. api: 1500 lines (very_high complexity)"));
        assert!(summary.contains("   3. ingest: 20 lines"));
        assert!(!summary.contains("Organization Accounts"));
    }

    #[test]
    fn test_summary_lists_skipped_accounts() {
        let accounts = vec![
            AccountScan {
                account_id: "111111111111".to_string(),
                account_name: "management".to_string(),
                state: AccountScanState::Scanned,
                functions_found: 4,
            },
            AccountScan {
                account_id: "222222222222".to_string(),
                account_name: "locked".to_string(),
                state: AccountScanState::AccessDenied,
                functions_found: 0,
            },
        ];
        let summary = format_summary(&result(accounts));

        assert!(summary.contains("Organization Accounts: 1 of 2 scanned"));
        assert!(summary.contains("skipped locked (222222222222): Access Denied"));
    }

    #[test]
    fn test_empty_summary() {
        let mut empty = result(Vec::new());
        empty.functions.clear();
        let summary = format_summary(&empty);

        assert!(summary.contains("Total Functions Found: 0"));
        assert!(summary.contains("No functions found"));
        assert!(!summary.contains("RUNTIME BREAKDOWN"));
    }
}
