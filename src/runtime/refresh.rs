//! Best-effort runtime table refresh from the provider documentation page.
//!
//! The page is plain markup with one or more tables whose header row names a
//! runtime, its identifier and its deprecation date. Every row that yields a
//! usable identifier becomes a [`RuntimeRecord`]. Nothing here is required for
//! scanning; the built-in table is always a valid fallback.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::patterns::UNKNOWN;
use super::{RuntimeRecord, RuntimeTable};
use crate::traits::{DocumentFetcher, ProviderError};

pub const RUNTIMES_DOC_URL: &str =
    "https://docs.aws.amazon.com/lambda/latest/dg/lambda-runtimes.html";

/// Errors that abort a refresh. The caller's table is never touched on error.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Failed to fetch runtime documentation: {0}")]
    Fetch(#[from] ProviderError),

    #[error("No runtime data found in documentation")]
    NoRuntimesFound,
}

static TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>").expect("valid table regex"));
static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("valid row regex"));
static CELL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<t([hd])\b[^>]*>(.*?)</t[hd]>").expect("valid cell regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid space regex"));

static VERSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(\d+\.?\d*\.?\d*)",
        r"(?i)(\d+\.x)",
        r"(?i)(al\d+)",
        r"(?i)(container only)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid version regex"))
    .collect()
});

const HEADER_KEYWORDS: &[&str] = &["name", "identifier", "runtime", "deprecation"];

/// Display-name keyword to language, checked in order.
const LANGUAGE_KEYWORDS: &[(&str, &str)] = &[
    ("node.js", "Node.js"),
    ("python", "Python"),
    ("java", "Java"),
    (".net", ".NET"),
    ("ruby", "Ruby"),
    ("go", "Go"),
    ("os-only", "Custom Runtime"),
];

/// Date layouts seen on the page, tried in order.
const DATE_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y", "%Y-%m-%d", "%m/%d/%Y"];

const NOT_SCHEDULED: &str = "not scheduled";

/// Fetches `url` and parses every runtime table on it.
///
/// # Errors
///
/// Returns [`RefreshError::Fetch`] when the document cannot be retrieved and
/// [`RefreshError::NoRuntimesFound`] when it contains no usable rows.
pub async fn fetch_runtime_table(
    fetcher: &dyn DocumentFetcher,
    url: &str,
    today: NaiveDate,
) -> Result<RuntimeTable, RefreshError> {
    info!(url, "Fetching runtime data from documentation");
    let document = fetcher.fetch(url).await?;

    let table = parse_runtime_tables(&document, today);
    if table.is_empty() {
        warn!(url, "No runtime data found in documentation");
        return Err(RefreshError::NoRuntimesFound);
    }
    Ok(table)
}

/// Parses all runtime-looking tables in `document`.
pub fn parse_runtime_tables(document: &str, today: NaiveDate) -> RuntimeTable {
    let mut runtimes = RuntimeTable::new();

    for (index, table) in TABLE_RE.captures_iter(document).enumerate() {
        let rows: Vec<Vec<String>> = ROW_RE
            .captures_iter(&table[1])
            .map(|row| {
                CELL_RE
                    .captures_iter(&row[1])
                    .map(|cell| cell_text(&cell[2]))
                    .collect()
            })
            .collect();

        let header_text = rows
            .iter()
            .flatten()
            .take(5)
            .map(|cell| cell.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        if !HEADER_KEYWORDS.iter().any(|k| header_text.contains(k)) || rows.len() < 2 {
            continue;
        }
        debug!(table = index, headers = %header_text, "Found runtime table");

        let columns = ColumnMap::from_header(&rows[0]);
        for cells in &rows[1..] {
            if let Some(record) = parse_row(cells, &columns, today) {
                debug!(runtime = %record.identifier, "Parsed runtime");
                runtimes.insert(record);
            }
        }
    }

    runtimes
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ColumnMap {
    name: Option<usize>,
    identifier: Option<usize>,
    deprecation: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &[String]) -> Self {
        let mut map = ColumnMap::default();
        for (idx, text) in header.iter().enumerate() {
            let text = text.to_lowercase();
            if text.contains("name") {
                map.name = Some(idx);
            } else if text.contains("identifier") {
                map.identifier = Some(idx);
            } else if text.contains("deprecation") {
                map.deprecation = Some(idx);
            }
        }
        map
    }
}

fn parse_row(cells: &[String], columns: &ColumnMap, today: NaiveDate) -> Option<RuntimeRecord> {
    if cells.len() < 3 {
        return None;
    }
    let name = cells.get(columns.name.unwrap_or(0))?;
    let identifier = cells.get(columns.identifier.unwrap_or(1))?;
    let deprecation = cells.get(columns.deprecation.unwrap_or(3))?;

    if !is_usable_identifier(identifier) {
        return None;
    }

    let (language, version) = extract_language_version(name, identifier);
    let deprecation_date = parse_date(deprecation);
    Some(RuntimeRecord {
        identifier: identifier.clone(),
        language,
        version,
        supported: is_supported_on(deprecation, today),
        deprecation_date,
        end_of_support: deprecation_date,
    })
}

fn is_usable_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && !identifier.eq_ignore_ascii_case("identifier")
        && !identifier.chars().any(char::is_whitespace)
}

fn cell_text(markup: &str) -> String {
    let stripped = TAG_RE.replace_all(markup, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    SPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}

/// A missing, unscheduled or unreadable date counts as supported.
pub fn is_supported_on(deprecation: &str, today: NaiveDate) -> bool {
    match parse_date(deprecation) {
        Some(date) => today < date,
        None => true,
    }
}

/// Parses a documentation date into a calendar date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() || text.to_lowercase().contains(NOT_SCHEDULED) {
        return None;
    }

    let parsed = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok());
    if parsed.is_none() {
        warn!(date = text, "Could not parse date string");
    }
    parsed
}

/// Derives `(language, version)` from a row's display name and identifier.
pub fn extract_language_version(name: &str, identifier: &str) -> (String, String) {
    let name_lower = name.to_lowercase();
    let language = LANGUAGE_KEYWORDS
        .iter()
        .find(|(keyword, _)| name_lower.contains(keyword))
        .map(|(_, language)| language.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let version = [name, identifier]
        .iter()
        .find_map(|source| {
            VERSION_PATTERNS
                .iter()
                .find_map(|pattern| pattern.captures(source))
                .map(|captures| captures[1].to_string())
        })
        .unwrap_or_else(|| UNKNOWN.to_string());

    (language, version)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    const RUNTIMES_PAGE: &str = r#"
        <html><body>
        <h2>Supported runtimes</h2>
        <table id="supported">
          <thead>
            <tr><th>Name</th><th>Identifier</th><th>Operating system</th><th>Deprecation date</th></tr>
          </thead>
          <tbody>
            <tr><td>Node.js 22</td><td><code class="code">nodejs22.x</code></td><td>Amazon Linux 2023</td><td>Apr 30, 2027</td></tr>
            <tr><td>Python 3.13</td><td><code>python3.13</code></td><td>Amazon Linux 2023</td><td>Jun 30, 2029</td></tr>
            <tr><td>Java 21</td><td><code>java21</code></td><td>Amazon Linux 2023</td><td>Not scheduled</td></tr>
            <tr><td>.NET&nbsp;8</td><td><code>dotnet8</code></td><td>Amazon Linux 2023</td><td>November 10, 2026</td></tr>
            <tr><td>OS-only Runtime</td><td><code>provided.al2023</code></td><td>Amazon Linux 2023</td><td>Jun 30, 2029</td></tr>
            <tr><td>Ruby 3.4</td><td><code>ruby3.4</code></td><td>Amazon Linux 2023</td><td>someday</td></tr>
            <tr><td>Broken row</td><td></td><td>Amazon Linux 2023</td><td>Jun 30, 2029</td></tr>
            <tr><td>Short row</td><td>go9.9</td></tr>
          </tbody>
        </table>
        <h2>Deprecated runtimes</h2>
        <table id="deprecated">
          <tr><th>Name</th><th>Identifier</th><th>Operating system</th><th>Deprecation date</th></tr>
          <tr><td>Python 3.8</td><td>python3.8</td><td>Amazon Linux 2</td><td>2024-10-14</td></tr>
          <tr><td>Node.js 16</td><td>nodejs16.x</td><td>Amazon Linux 2</td><td>06/12/2024</td></tr>
        </table>
        <table><tr><td>Region</td><td>Endpoint</td></tr><tr><td>us-east-1</td><td>x</td></tr></table>
        </body></html>
    "#;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    struct FixtureFetcher(Result<String, String>);

    #[async_trait]
    impl DocumentFetcher for FixtureFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, ProviderError> {
            self.0.clone().map_err(ProviderError::Service)
        }
    }

    #[test]
    fn test_parse_runtime_tables() {
        let table = parse_runtime_tables(RUNTIMES_PAGE, today());
        assert_eq!(table.len(), 8);

        let node = table.get("nodejs22.x").unwrap();
        assert_eq!(node.language, "Node.js");
        assert_eq!(node.version, "22");
        assert!(node.supported);
        assert_eq!(node.deprecation_date, NaiveDate::from_ymd_opt(2027, 4, 30));
        assert_eq!(node.end_of_support, node.deprecation_date);

        let java = table.get("java21").unwrap();
        assert!(java.supported);
        assert_eq!(java.deprecation_date, None);

        let dotnet = table.get("dotnet8").unwrap();
        assert_eq!(dotnet.language, ".NET");
        assert_eq!(dotnet.deprecation_date, NaiveDate::from_ymd_opt(2026, 11, 10));

        let custom = table.get("provided.al2023").unwrap();
        assert_eq!(custom.language, "Custom Runtime");
        assert_eq!(custom.version, "2023");

        // Unparseable date keeps the runtime available
        let ruby = table.get("ruby3.4").unwrap();
        assert!(ruby.supported);
        assert_eq!(ruby.deprecation_date, None);

        assert!(table.get("go9.9").is_none());
    }

    #[test]
    fn test_past_dates_mark_runtime_unsupported() {
        let table = parse_runtime_tables(RUNTIMES_PAGE, today());

        let python = table.get("python3.8").unwrap();
        assert!(!python.supported);
        assert_eq!(python.deprecation_date, NaiveDate::from_ymd_opt(2024, 10, 14));

        let node = table.get("nodejs16.x").unwrap();
        assert!(!node.supported);
        assert_eq!(node.deprecation_date, NaiveDate::from_ymd_opt(2024, 6, 12));
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 10, 14);
        assert_eq!(parse_date("Oct 14, 2024"), expected);
        assert_eq!(parse_date("October 14, 2024"), expected);
        assert_eq!(parse_date("2024-10-14"), expected);
        assert_eq!(parse_date("10/14/2024"), expected);
        assert_eq!(parse_date(" Not scheduled "), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("Q3 2026"), None);
    }

    #[test]
    fn test_support_check_is_strict_before_date() {
        let day = NaiveDate::from_ymd_opt(2024, 10, 14).unwrap();
        assert!(!is_supported_on("2024-10-14", day));
        assert!(is_supported_on("2024-10-15", day));
        assert!(is_supported_on("Not scheduled", day));
        assert!(is_supported_on("garbage", day));
    }

    #[test]
    fn test_extract_language_version_falls_back_to_identifier() {
        assert_eq!(
            extract_language_version("Python 3.12", "python3.12"),
            ("Python".to_string(), "3.12".to_string())
        );
        assert_eq!(
            extract_language_version("OS-only Runtime", "provided.al2"),
            ("Custom Runtime".to_string(), "2".to_string())
        );
        assert_eq!(
            extract_language_version("Mystery", "mystery"),
            ("Unknown".to_string(), "Unknown".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_runtime_table_success() {
        let fetcher = FixtureFetcher(Ok(RUNTIMES_PAGE.to_string()));
        let table = fetch_runtime_table(&fetcher, RUNTIMES_DOC_URL, today())
            .await
            .unwrap();
        assert!(table.get("python3.13").is_some());
    }

    #[tokio::test]
    async fn test_fetch_runtime_table_failures() {
        let fetcher = FixtureFetcher(Err("connection reset".to_string()));
        let err = fetch_runtime_table(&fetcher, RUNTIMES_DOC_URL, today())
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Fetch(_)));

        let fetcher = FixtureFetcher(Ok("<html><p>moved</p></html>".to_string()));
        let err = fetch_runtime_table(&fetcher, RUNTIMES_DOC_URL, today())
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::NoRuntimesFound));
    }

    #[tokio::test]
    async fn test_classifier_refresh_replaces_or_keeps_table() {
        use crate::runtime::RuntimeClassifier;

        let mut classifier = RuntimeClassifier::default();
        let builtin = classifier.table().clone();

        let broken = FixtureFetcher(Err("timeout".to_string()));
        assert!(classifier.refresh(&broken, RUNTIMES_DOC_URL).await.is_err());
        assert_eq!(classifier.table(), &builtin);

        let page = FixtureFetcher(Ok(RUNTIMES_PAGE.to_string()));
        let count = classifier.refresh(&page, RUNTIMES_DOC_URL).await.unwrap();
        assert_eq!(count, 8);
        assert_eq!(classifier.table().len(), 8);
        // Replaced, not merged
        assert!(classifier.table().get("python2.7").is_none());
    }
}
