//! Runtime lookup table.
//!
//! The built-in seed covers current runtimes plus a handful of retired ones.
//! A table loaded from disk or refreshed from the documentation page replaces
//! the seed wholesale.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use super::RuntimeRecord;

/// Errors from reading or writing a runtime table file.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("I/O error on runtime table '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid runtime table JSON: {0}")]
    Json(#[from] serde_json::Error),
}

type Ymd = (i32, u32, u32);

/// identifier, language, version, supported, deprecation date, end of support
type Seed = (&'static str, &'static str, &'static str, bool, Option<Ymd>, Option<Ymd>);

const BUILTIN_RUNTIMES: &[Seed] = &[
    // Python
    ("python3.13", "Python", "3.13", true, Some((2029, 10, 31)), Some((2029, 10, 31))),
    ("python3.12", "Python", "3.12", true, Some((2028, 10, 31)), Some((2028, 10, 31))),
    ("python3.11", "Python", "3.11", true, None, None),
    ("python3.10", "Python", "3.10", true, None, None),
    ("python3.9", "Python", "3.9", true, None, None),
    ("python3.8", "Python", "3.8", true, Some((2024, 10, 14)), Some((2024, 10, 14))),
    // Node.js
    ("nodejs22.x", "Node.js", "22.x", true, Some((2027, 4, 30)), Some((2027, 4, 30))),
    ("nodejs20.x", "Node.js", "20.x", true, Some((2026, 4, 30)), Some((2026, 4, 30))),
    ("nodejs18.x", "Node.js", "18.x", true, Some((2025, 4, 30)), Some((2025, 4, 30))),
    ("nodejs16.x", "Node.js", "16.x", true, Some((2024, 6, 12)), Some((2024, 6, 12))),
    // Java
    ("java21", "Java", "21", true, None, None),
    ("java17", "Java", "17", true, None, None),
    ("java11", "Java", "11", true, None, None),
    ("java8.al2", "Java", "8 (Amazon Linux 2)", true, None, None),
    // .NET
    ("dotnet8", ".NET", "8", true, None, None),
    ("dotnet6", ".NET", "6", true, None, None),
    // Go on the OS-only runtimes
    ("provided.al2023", "Go", "Custom Runtime (AL2023)", true, None, None),
    ("provided.al2", "Go", "Custom Runtime (AL2)", true, None, None),
    // Ruby
    ("ruby3.3", "Ruby", "3.3", true, Some((2027, 3, 31)), Some((2027, 3, 31))),
    ("ruby3.2", "Ruby", "3.2", true, None, None),
    // Custom
    ("provided", "Custom Runtime", "Amazon Linux", true, None, None),
    // Retired
    ("python3.7", "Python", "3.7", false, Some((2022, 11, 27)), Some((2022, 12, 5))),
    ("python3.6", "Python", "3.6", false, Some((2022, 7, 18)), Some((2022, 8, 29))),
    ("python2.7", "Python", "2.7", false, Some((2021, 5, 30)), Some((2021, 7, 15))),
    ("nodejs14.x", "Node.js", "14.x", false, Some((2023, 11, 27)), Some((2023, 12, 4))),
    ("nodejs12.x", "Node.js", "12.x", false, Some((2023, 3, 31)), Some((2023, 4, 30))),
    ("nodejs10.x", "Node.js", "10.x", false, Some((2021, 7, 30)), Some((2022, 2, 14))),
    ("java8", "Java", "8", false, Some((2024, 1, 8)), Some((2024, 2, 8))),
    ("go1.x", "Go", "1.x", false, Some((2024, 1, 8)), Some((2024, 2, 8))),
    ("dotnetcore3.1", ".NET", "Core 3.1", false, Some((2023, 4, 3)), Some((2023, 5, 3))),
    ("ruby2.7", "Ruby", "2.7", false, Some((2023, 12, 7)), Some((2024, 1, 9))),
];

fn ymd(date: Option<Ymd>) -> Option<NaiveDate> {
    date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
}

/// Immutable mapping from runtime identifier to [`RuntimeRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeTable {
    records: BTreeMap<String, RuntimeRecord>,
}

impl RuntimeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the runtimes known at build time.
    pub fn builtin() -> Self {
        BUILTIN_RUNTIMES
            .iter()
            .map(
                |&(identifier, language, version, supported, deprecation, end_of_support)| {
                    RuntimeRecord {
                        identifier: identifier.to_string(),
                        language: language.to_string(),
                        version: version.to_string(),
                        supported,
                        deprecation_date: ymd(deprecation),
                        end_of_support: ymd(end_of_support),
                    }
                },
            )
            .collect()
    }

    pub fn insert(&mut self, record: RuntimeRecord) {
        self.records.insert(record.identifier.clone(), record);
    }

    pub fn get(&self, identifier: &str) -> Option<&RuntimeRecord> {
        self.records.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuntimeRecord> {
        self.records.values()
    }

    /// Parses a JSON object keyed by runtime identifier.
    pub fn from_json_str(json: &str) -> Result<Self, TableError> {
        let raw: BTreeMap<String, RuntimeRecord> = serde_json::from_str(json)?;
        Ok(raw
            .into_iter()
            .map(|(identifier, mut record)| {
                record.identifier = identifier;
                record
            })
            .collect())
    }

    pub fn to_json_string(&self) -> Result<String, TableError> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }

    pub fn load_json(path: &Path) -> Result<Self, TableError> {
        let content = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::from_json_str(&content)?;
        info!(path = %path.display(), runtimes = table.len(), "Loaded runtime table");
        Ok(table)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), TableError> {
        let content = self.to_json_string()?;
        std::fs::write(path, content).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), runtimes = self.len(), "Runtime table saved");
        Ok(())
    }
}

impl FromIterator<RuntimeRecord> for RuntimeTable {
    fn from_iter<I: IntoIterator<Item = RuntimeRecord>>(iter: I) -> Self {
        let mut table = RuntimeTable::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_contents() {
        let table = RuntimeTable::builtin();
        assert_eq!(table.len(), BUILTIN_RUNTIMES.len());

        let python = table.get("python3.12").unwrap();
        assert_eq!(python.language, "Python");
        assert_eq!(python.deprecation_date, NaiveDate::from_ymd_opt(2028, 10, 31));

        let retired = table.get("python2.7").unwrap();
        assert!(!retired.supported);
        assert_eq!(retired.end_of_support, NaiveDate::from_ymd_opt(2021, 7, 15));

        assert!(table.get("cobol85").is_none());
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtimes.json");

        let table = RuntimeTable::builtin();
        table.save_json(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"python3.7\""));
        assert!(content.contains("\"deprecation_date\": \"2022-11-27\""));

        let loaded = RuntimeTable::load_json(&path).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.get("java21").unwrap().identifier, "java21");
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = RuntimeTable::load_json(Path::new("/nonexistent/runtimes.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/runtimes.json"));
    }
}
