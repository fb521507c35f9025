use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::runtime::RuntimeClassification;

/// ARN partition used when an ARN has to be synthesized.
pub const ARN_PARTITION: &str = "aws";

/// Derived support classification of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportStatus {
    Supported,
    DeprecationScheduled,
    Deprecated,
    Unknown,
}

impl SupportStatus {
    pub const ALL: [SupportStatus; 4] = [
        SupportStatus::Supported,
        SupportStatus::DeprecationScheduled,
        SupportStatus::Deprecated,
        SupportStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportStatus::Supported => "supported",
            SupportStatus::DeprecationScheduled => "deprecation_scheduled",
            SupportStatus::Deprecated => "deprecated",
            SupportStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SupportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse complexity bucket derived from estimated lines of code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Low,
    Medium,
    High,
    VeryHigh,
    Unknown,
}

impl ComplexityTier {
    pub const ALL: [ComplexityTier; 5] = [
        ComplexityTier::Low,
        ComplexityTier::Medium,
        ComplexityTier::High,
        ComplexityTier::VeryHigh,
        ComplexityTier::Unknown,
    ];

    /// Buckets an estimated line count.
    pub fn from_lines(lines_of_code: u64) -> Self {
        match lines_of_code {
            0..=99 => ComplexityTier::Low,
            100..=499 => ComplexityTier::Medium,
            500..=999 => ComplexityTier::High,
            _ => ComplexityTier::VeryHigh,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Low => "low",
            ComplexityTier::Medium => "medium",
            ComplexityTier::High => "high",
            ComplexityTier::VeryHigh => "very_high",
            ComplexityTier::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scanned function, flattened for export.
///
/// Built by the inspector, enriched once with the runtime classification and
/// tagged with its account by the executor. Nothing mutates it after that.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionRecord {
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    pub function_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_arn: Option<String>,

    pub runtime: String,
    pub version: String,
    pub code_size: u64,
    pub memory_size: u32,
    pub timeout: u32,
    pub last_modified: String,
    pub handler: String,
    pub description: String,

    /// Extended configuration, absent when the configuration fetch failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_letter_config: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_config: Option<bool>,

    #[serde(serialize_with = "serialize_tags")]
    pub tags: BTreeMap<String, String>,

    pub lines_of_code: u64,
    pub complexity_score: ComplexityTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_location: Option<String>,

    pub language_name: String,
    pub language_version: String,
    pub aws_supported: bool,
    pub support_status: SupportStatus,
    pub deprecation_date: Option<NaiveDate>,
    pub end_of_support: Option<NaiveDate>,
}

impl FunctionRecord {
    /// Merges a runtime classification into the record.
    pub fn enrich(&mut self, classification: &RuntimeClassification) {
        self.language_name = classification.language_name.clone();
        self.language_version = classification.language_version.clone();
        self.aws_supported = classification.aws_supported;
        self.support_status = classification.support_status;
        self.deprecation_date = classification.deprecation_date;
        self.end_of_support = classification.end_of_support;
    }

    /// The single predicate deciding whether a function runs on a deprecated runtime.
    pub fn is_deprecated(&self) -> bool {
        self.support_status == SupportStatus::Deprecated
    }

    /// Tags rendered as `key=value,...`.
    pub fn tags_string(&self) -> String {
        format_tags(&self.tags)
    }

    /// Provider ARN, synthesized from region/account/name when not listed.
    pub fn arn(&self) -> String {
        match &self.function_arn {
            Some(arn) if !arn.is_empty() => arn.clone(),
            _ => format!(
                "arn:{}:lambda:{}:{}:function:{}",
                ARN_PARTITION,
                self.region,
                self.account_id.as_deref().unwrap_or("unknown"),
                self.function_name
            ),
        }
    }
}

pub fn format_tags(tags: &BTreeMap<String, String>) -> String {
    tags.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

fn serialize_tags<S>(tags: &BTreeMap<String, String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_tags(tags))
}

// ============================================================================
// Organization scan state
// ============================================================================

/// Per-account progress through an organization scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountScanState {
    Pending,
    SessionEstablished,
    Scanned,
    /// Terminal: role assumption was refused
    AccessDenied,
    /// Terminal: no working session could be built
    SessionFailed,
}

impl AccountScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountScanState::Pending => "pending",
            AccountScanState::SessionEstablished => "session_established",
            AccountScanState::Scanned => "scanned",
            AccountScanState::AccessDenied => "access_denied",
            AccountScanState::SessionFailed => "session_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AccountScanState::Scanned
                | AccountScanState::AccessDenied
                | AccountScanState::SessionFailed
        )
    }

    /// Moves to `next` when the transition is legal.
    ///
    /// Legal paths are `pending -> session_established -> scanned`,
    /// `pending -> access_denied` and `pending -> session_failed`.
    pub fn advance(self, next: AccountScanState) -> Option<AccountScanState> {
        use AccountScanState::*;
        match (self, next) {
            (Pending, SessionEstablished)
            | (Pending, AccessDenied)
            | (Pending, SessionFailed)
            | (SessionEstablished, Scanned) => Some(next),
            _ => None,
        }
    }
}

/// Outcome for one organization member account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountScan {
    pub account_id: String,
    pub account_name: String,
    pub state: AccountScanState,
    pub functions_found: usize,
}

// ============================================================================
// Scan result
// ============================================================================

/// Aggregate of a whole run.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub functions: Vec<FunctionRecord>,
    pub regions_scanned: Vec<String>,
    pub scan_timestamp: DateTime<Utc>,
    /// Resolved caller account in single-scope mode
    pub account_id: Option<String>,
    /// Per-account outcomes, empty outside organization mode
    pub accounts: Vec<AccountScan>,
}

impl ScanResult {
    pub fn is_organization_scan(&self) -> bool {
        !self.accounts.is_empty()
    }

    /// Number of accounts that reached `scanned`, organization mode only.
    pub fn accounts_scanned(&self) -> Option<usize> {
        if self.is_organization_scan() {
            Some(
                self.accounts
                    .iter()
                    .filter(|a| a.state == AccountScanState::Scanned)
                    .count(),
            )
        } else {
            None
        }
    }

    pub fn skipped_accounts(&self) -> impl Iterator<Item = &AccountScan> {
        self.accounts.iter().filter(|a| {
            matches!(
                a.state,
                AccountScanState::AccessDenied | AccountScanState::SessionFailed
            )
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a classified record for tests across the crate.
    pub(crate) fn sample_record(
        name: &str,
        runtime: &str,
        language: &str,
        status: SupportStatus,
        code_size: u64,
        lines_of_code: u64,
    ) -> FunctionRecord {
        FunctionRecord {
            region: "us-east-1".to_string(),
            account_id: None,
            account_name: None,
            function_name: name.to_string(),
            function_arn: None,
            runtime: runtime.to_string(),
            version: "$LATEST".to_string(),
            code_size,
            memory_size: 128,
            timeout: 3,
            last_modified: "2024-01-01T00:00:00.000+0000".to_string(),
            handler: "index.handler".to_string(),
            description: String::new(),
            environment_variables: None,
            layers: None,
            dead_letter_config: None,
            vpc_config: None,
            tags: BTreeMap::new(),
            lines_of_code,
            complexity_score: ComplexityTier::from_lines(lines_of_code),
            code_location: None,
            language_name: language.to_string(),
            language_version: "Unknown".to_string(),
            aws_supported: status != SupportStatus::Deprecated,
            support_status: status,
            deprecation_date: None,
            end_of_support: None,
        }
    }

    #[test]
    fn test_complexity_thresholds() {
        assert_eq!(ComplexityTier::from_lines(1), ComplexityTier::Low);
        assert_eq!(ComplexityTier::from_lines(99), ComplexityTier::Low);
        assert_eq!(ComplexityTier::from_lines(100), ComplexityTier::Medium);
        assert_eq!(ComplexityTier::from_lines(499), ComplexityTier::Medium);
        assert_eq!(ComplexityTier::from_lines(500), ComplexityTier::High);
        assert_eq!(ComplexityTier::from_lines(999), ComplexityTier::High);
        assert_eq!(ComplexityTier::from_lines(1000), ComplexityTier::VeryHigh);
    }

    #[test]
    fn test_arn_synthesized_when_missing() {
        let mut record = sample_record("jobs", "python3.7", "Python", SupportStatus::Deprecated, 10, 1);
        assert_eq!(
            record.arn(),
            "arn:aws:lambda:us-east-1:unknown:function:jobs"
        );

        record.account_id = Some("123456789012".to_string());
        assert_eq!(
            record.arn(),
            "arn:aws:lambda:us-east-1:123456789012:function:jobs"
        );

        record.function_arn = Some("arn:aws:lambda:us-east-1:123456789012:function:jobs:live".to_string());
        assert!(record.arn().ends_with(":live"));
    }

    #[test]
    fn test_record_serializes_flat() {
        let mut record = sample_record("api", "nodejs20.x", "Node.js", SupportStatus::Supported, 4000, 100);
        record.tags.insert("team".to_string(), "payments".to_string());
        record.tags.insert("env".to_string(), "prod".to_string());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["tags"], "env=prod,team=payments");
        assert_eq!(value["support_status"], "supported");
        assert_eq!(value["complexity_score"], "medium");
        assert!(value.get("account_id").is_none());
        assert!(value.get("environment_variables").is_none());
    }

    #[test]
    fn test_account_state_transitions() {
        use AccountScanState::*;
        assert_eq!(Pending.advance(SessionEstablished), Some(SessionEstablished));
        assert_eq!(SessionEstablished.advance(Scanned), Some(Scanned));
        assert_eq!(Pending.advance(AccessDenied), Some(AccessDenied));
        assert_eq!(Pending.advance(SessionFailed), Some(SessionFailed));
        assert_eq!(Pending.advance(Scanned), None);
        assert_eq!(AccessDenied.advance(SessionEstablished), None);
        assert!(SessionFailed.is_terminal());
        assert!(!SessionEstablished.is_terminal());
    }
}
