//! Runtime support classification.
//!
//! Maps a free-form runtime identifier to language, version and support
//! status:
//! - exact lookup in a [`RuntimeTable`] handed in by the caller
//! - ordered [`PatternRule`] fallback for identifiers the table lacks
//! - best-effort table replacement from the documentation page via [`refresh`]
//!
//! Status is derived on every lookup so date transitions show up without a
//! table change.

pub mod patterns;
pub mod refresh;
pub mod table;

pub use patterns::{default_rules, parse_identifier, PatternRule};
pub use refresh::{RefreshError, RUNTIMES_DOC_URL};
pub use table::{RuntimeTable, TableError};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::model::SupportStatus;
use crate::traits::DocumentFetcher;

/// Known facts about one runtime identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeRecord {
    /// Table key; not repeated inside the persisted JSON object
    #[serde(skip)]
    pub identifier: String,
    pub language: String,
    pub version: String,
    pub supported: bool,
    #[serde(default)]
    pub deprecation_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_of_support: Option<NaiveDate>,
}

impl RuntimeRecord {
    /// Derives the support status as of `today`.
    ///
    /// An unsupported flag always wins. A deprecation date on or before
    /// `today` overrides a stale supported flag.
    pub fn support_status_on(&self, today: NaiveDate) -> SupportStatus {
        if !self.supported {
            return SupportStatus::Deprecated;
        }
        match self.deprecation_date {
            Some(date) if date <= today => SupportStatus::Deprecated,
            Some(_) => SupportStatus::DeprecationScheduled,
            None => SupportStatus::Supported,
        }
    }
}

/// Classification fields merged into a scanned function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeClassification {
    pub runtime_identifier: String,
    pub language_name: String,
    pub language_version: String,
    pub aws_supported: bool,
    pub support_status: SupportStatus,
    pub deprecation_date: Option<NaiveDate>,
    pub end_of_support: Option<NaiveDate>,
}

/// Tallies over a list of runtime identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LanguageSummary {
    pub total_runtimes: usize,
    pub supported_count: usize,
    /// Deprecated plus deprecation-scheduled
    pub deprecated_count: usize,
    pub languages: BTreeMap<String, usize>,
    pub support_status: BTreeMap<SupportStatus, usize>,
}

/// Lookup-with-default classifier over an explicit table and rule list.
#[derive(Debug, Clone)]
pub struct RuntimeClassifier {
    table: RuntimeTable,
    rules: Vec<PatternRule>,
}

impl Default for RuntimeClassifier {
    fn default() -> Self {
        Self::new(RuntimeTable::builtin())
    }
}

impl RuntimeClassifier {
    /// Creates a classifier over `table` with the default fallback rules.
    pub fn new(table: RuntimeTable) -> Self {
        Self::with_rules(table, default_rules())
    }

    pub fn with_rules(table: RuntimeTable, rules: Vec<PatternRule>) -> Self {
        Self { table, rules }
    }

    pub fn table(&self) -> &RuntimeTable {
        &self.table
    }

    /// Swaps in a new table wholesale.
    pub fn replace_table(&mut self, table: RuntimeTable) {
        self.table = table;
    }

    /// Table record for `identifier`, or a parsed unsupported record on a miss.
    pub fn lookup(&self, identifier: &str) -> RuntimeRecord {
        if let Some(record) = self.table.get(identifier) {
            return record.clone();
        }

        warn!(runtime = identifier, "Unknown runtime detected");
        let (language, version) = parse_identifier(&self.rules, identifier);
        RuntimeRecord {
            identifier: identifier.to_string(),
            language,
            version,
            supported: false,
            deprecation_date: None,
            end_of_support: None,
        }
    }

    /// Classifies `identifier` as of today's UTC date.
    pub fn classify(&self, identifier: &str) -> RuntimeClassification {
        self.classify_on(identifier, Utc::now().date_naive())
    }

    pub fn classify_on(&self, identifier: &str, today: NaiveDate) -> RuntimeClassification {
        let record = self.lookup(identifier);
        let support_status = record.support_status_on(today);
        RuntimeClassification {
            runtime_identifier: identifier.to_string(),
            language_name: record.language,
            language_version: record.version,
            aws_supported: record.supported,
            support_status,
            deprecation_date: record.deprecation_date,
            end_of_support: record.end_of_support,
        }
    }

    /// The provider's support flag for `identifier`; unknown runtimes are unsupported.
    pub fn is_supported(&self, identifier: &str) -> bool {
        self.lookup(identifier).supported
    }

    pub fn language_summary<S: AsRef<str>>(&self, runtimes: &[S]) -> LanguageSummary {
        let today = Utc::now().date_naive();
        let mut summary = LanguageSummary {
            total_runtimes: runtimes.len(),
            ..LanguageSummary::default()
        };

        for runtime in runtimes {
            let info = self.classify_on(runtime.as_ref(), today);
            match info.support_status {
                SupportStatus::Supported => summary.supported_count += 1,
                SupportStatus::Deprecated | SupportStatus::DeprecationScheduled => {
                    summary.deprecated_count += 1
                }
                SupportStatus::Unknown => {}
            }
            *summary.languages.entry(info.language_name).or_insert(0) += 1;
            *summary.support_status.entry(info.support_status).or_insert(0) += 1;
        }

        summary
    }

    /// Replaces the table with one scraped from `url`.
    ///
    /// Best-effort: on any error the current table stays in place.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError`] if the fetch fails or no runtime rows parse.
    pub async fn refresh(
        &mut self,
        fetcher: &dyn DocumentFetcher,
        url: &str,
    ) -> Result<usize, RefreshError> {
        let table = refresh::fetch_runtime_table(fetcher, url, Utc::now().date_naive()).await?;
        let count = table.len();
        self.table = table;
        info!(runtimes = count, "Runtime table refreshed from documentation");
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================
