//! Fallback parser for identifiers missing from the runtime table.

use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    (r"^python(\d+\.\d+)", "Python"),
    (r"^nodejs(\d+\.x)", "Node.js"),
    (r"^java(\d+)", "Java"),
    (r"^dotnet(\d+)", ".NET"),
    (r"^ruby(\d+\.\d+)", "Ruby"),
    (r"^go(\d+\.\d+)", "Go"),
    (r"^provided", "Custom Runtime"),
];

static DEFAULT_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    DEFAULT_PATTERNS
        .iter()
        .map(|(pattern, language)| {
            PatternRule::new(pattern, *language).expect("built-in runtime pattern is valid")
        })
        .collect()
});

pub const UNKNOWN: &str = "Unknown";

/// One `(regex, language)` rule. The first capture group, if any, is the version.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pattern: Regex,
    language: String,
}

impl PatternRule {
    pub fn new(pattern: &str, language: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            language: language.into(),
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Returns `(language, version)` when the rule matches.
    pub fn apply(&self, identifier: &str) -> Option<(String, String)> {
        let captures = self.pattern.captures(identifier)?;
        let version = captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());
        Some((self.language.clone(), version))
    }
}

/// The rule list used when none is supplied.
pub fn default_rules() -> Vec<PatternRule> {
    DEFAULT_RULES.clone()
}

/// Runs `rules` in order; the first match wins.
pub fn parse_identifier(rules: &[PatternRule], identifier: &str) -> (String, String) {
    rules
        .iter()
        .find_map(|rule| rule.apply(identifier))
        .unwrap_or_else(|| (UNKNOWN.to_string(), UNKNOWN.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_extract_versions() {
        let rules = default_rules();
        assert_eq!(
            parse_identifier(&rules, "python3.14"),
            ("Python".to_string(), "3.14".to_string())
        );
        assert_eq!(
            parse_identifier(&rules, "nodejs24.x"),
            ("Node.js".to_string(), "24.x".to_string())
        );
        assert_eq!(
            parse_identifier(&rules, "java25"),
            ("Java".to_string(), "25".to_string())
        );
        assert_eq!(
            parse_identifier(&rules, "provided.al2040"),
            ("Custom Runtime".to_string(), UNKNOWN.to_string())
        );
    }

    #[test]
    fn test_no_match_is_unknown() {
        let rules = default_rules();
        assert_eq!(
            parse_identifier(&rules, "unknown-runtime-1.0"),
            (UNKNOWN.to_string(), UNKNOWN.to_string())
        );
        assert_eq!(
            parse_identifier(&[], "python3.14"),
            (UNKNOWN.to_string(), UNKNOWN.to_string())
        );
    }

    #[test]
    fn test_first_rule_wins_on_overlap() {
        let rules = vec![
            PatternRule::new(r"^java(\d+)", "Java").unwrap(),
            PatternRule::new(r"^java(\d+)\.al2", "Java on AL2").unwrap(),
        ];
        assert_eq!(
            parse_identifier(&rules, "java8.al2"),
            ("Java".to_string(), "8".to_string())
        );

        let reversed = vec![
            PatternRule::new(r"^java(\d+)\.al2", "Java on AL2").unwrap(),
            PatternRule::new(r"^java(\d+)", "Java").unwrap(),
        ];
        assert_eq!(
            parse_identifier(&reversed, "java8.al2"),
            ("Java on AL2".to_string(), "8".to_string())
        );
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(PatternRule::new(r"^python(\d+", "Python").is_err());
    }
}
