//! Per-line structured filtering.

use regex::Regex;
use rustc_hash::FxHashSet;
use serde_json::Value;

/// One parsed dump record.
pub type Record = serde_json::Map<String, Value>;

/// How configured values are compared against the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Partial,
    Regex,
}

impl MatchMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Partial => "partial",
            Self::Regex => "regex",
        }
    }
}

/// Criterion construction failure. Fatal at startup, before any file runs.
#[derive(Debug)]
pub enum CriterionError {
    EmptyValues,
    InvalidPattern { pattern: String, source: regex::Error },
}

impl std::fmt::Display for CriterionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyValues => write!(f, "no filter values given"),
            Self::InvalidPattern { pattern, source } => {
                write!(f, "invalid regex pattern '{pattern}': {source}")
            }
        }
    }
}

impl std::error::Error for CriterionError {}

/// Matching strategy, resolved once at startup and never re-inspected.
#[derive(Debug)]
enum Matcher {
    /// Exact mode with one value compares directly, skipping the set.
    Single(String),
    Exact(FxHashSet<String>),
    Partial(Vec<String>),
    Patterns(Vec<Regex>),
}

/// Outcome of classifying one line.
#[derive(Debug)]
pub enum Classified {
    Matched(Record),
    NotMatched,
    /// Parse failure, missing field, or non-string field value.
    Error,
}

/// Field + mode + value set deciding what counts as a match.
#[derive(Debug)]
pub struct RecordFilter {
    field: String,
    mode: MatchMode,
    matcher: Matcher,
    value_count: usize,
}

impl RecordFilter {
    /// Build a filter. Exact and Partial values are lower-cased here; Regex
    /// patterns must all compile or construction fails.
    pub fn new(field: &str, values: &[String], mode: MatchMode) -> Result<Self, CriterionError> {
        if values.is_empty() {
            return Err(CriterionError::EmptyValues);
        }
        let matcher = match mode {
            MatchMode::Regex => {
                let mut patterns = Vec::with_capacity(values.len());
                for value in values {
                    match Regex::new(value) {
                        Ok(re) => patterns.push(re),
                        Err(source) => {
                            return Err(CriterionError::InvalidPattern {
                                pattern: value.clone(),
                                source,
                            })
                        }
                    }
                }
                Matcher::Patterns(patterns)
            }
            MatchMode::Partial => Matcher::Partial(values.iter().map(|v| v.to_lowercase()).collect()),
            MatchMode::Exact => {
                let set: FxHashSet<String> = values.iter().map(|v| v.to_lowercase()).collect();
                if set.len() == 1 {
                    let single = set.into_iter().next().ok_or(CriterionError::EmptyValues)?;
                    Matcher::Single(single)
                } else {
                    Matcher::Exact(set)
                }
            }
        };
        Ok(Self {
            field: field.to_string(),
            mode,
            matcher,
            value_count: values.len(),
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Parse one line and decide match / no-match / error. The field value is
    /// lower-cased before comparison; patterns are applied as given.
    pub fn classify(&self, line: &str) -> Classified {
        let parsed: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => return Classified::Error,
        };
        let Value::Object(record) = parsed else {
            return Classified::Error;
        };
        let Some(Value::String(raw)) = record.get(&self.field) else {
            return Classified::Error;
        };
        let observed = raw.to_lowercase();
        let matched = match &self.matcher {
            Matcher::Single(value) => observed == *value,
            Matcher::Exact(values) => values.contains(observed.as_str()),
            Matcher::Partial(values) => values.iter().any(|v| observed.contains(v.as_str())),
            Matcher::Patterns(patterns) => patterns.iter().any(|re| re.is_match(&observed)),
        };
        if matched {
            Classified::Matched(record)
        } else {
            Classified::NotMatched
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn filter(values: &[&str], mode: MatchMode) -> RecordFilter {
        RecordFilter::new("subreddit", &strings(values), mode).expect("valid criterion")
    }

    fn is_match(f: &RecordFilter, line: &str) -> bool {
        matches!(f.classify(line), Classified::Matched(_))
    }

    #[test]
    fn empty_values_rejected() {
        assert!(matches!(
            RecordFilter::new("subreddit", &[], MatchMode::Exact),
            Err(CriterionError::EmptyValues)
        ));
    }

    #[test]
    fn invalid_pattern_rejected() {
        let err = RecordFilter::new("subreddit", &strings(&["[unclosed"]), MatchMode::Regex)
            .expect_err("must fail");
        assert!(matches!(err, CriterionError::InvalidPattern { .. }));
    }

    #[test]
    fn exact_match_case_normalized() {
        let f = filter(&["Ukraine"], MatchMode::Exact);
        assert!(is_match(&f, r#"{"subreddit":"ukraine"}"#));
        assert!(is_match(&f, r#"{"subreddit":"UKRAINE"}"#));
        assert!(!is_match(&f, r#"{"subreddit":"ukrain"}"#));
    }

    #[test]
    fn single_value_fast_path_equals_set_membership() {
        // One filter takes the direct-compare path, the other forces the set
        // path with a duplicate spelling of the same value.
        let single = filter(&["Ukraine"], MatchMode::Exact);
        let set = filter(&["Ukraine", "worldnews"], MatchMode::Exact);
        for observed in [
            "ukraine", "Ukraine", "UKRAINE", "ukrainian", "", "worldnews x", "ukra", "Укра",
        ] {
            let line = format!(r#"{{"subreddit":{}}}"#, serde_json::json!(observed));
            assert_eq!(
                is_match(&single, &line),
                matches!(set.classify(&line), Classified::Matched(_)) && observed.to_lowercase() == "ukraine",
                "observed={observed:?}"
            );
        }
    }

    #[test]
    fn partial_is_reflexive() {
        let f = filter(&["news"], MatchMode::Partial);
        // Any value containing the needle as-is always matches.
        assert!(is_match(&f, r#"{"subreddit":"news"}"#));
        assert!(is_match(&f, r#"{"subreddit":"worldnews"}"#));
        assert!(is_match(&f, r#"{"subreddit":"NewsAndPolitics"}"#));
        assert!(!is_match(&f, r#"{"subreddit":"sports"}"#));
    }

    #[test]
    fn regex_is_or_of_patterns() {
        let combined = filter(&["^ukr", "news$"], MatchMode::Regex);
        let first = filter(&["^ukr"], MatchMode::Regex);
        let second = filter(&["news$"], MatchMode::Regex);
        for observed in ["ukraine", "worldnews", "ukrnews", "sports", "newsfeed"] {
            let line = format!(r#"{{"subreddit":"{observed}"}}"#);
            assert_eq!(
                is_match(&combined, &line),
                is_match(&first, &line) || is_match(&second, &line),
                "observed={observed}"
            );
        }
    }

    #[test]
    fn malformed_line_is_error() {
        let f = filter(&["ukraine"], MatchMode::Exact);
        assert!(matches!(f.classify("not json"), Classified::Error));
        assert!(matches!(f.classify(r#"["array"]"#), Classified::Error));
    }

    #[test]
    fn missing_field_is_error() {
        let f = filter(&["ukraine"], MatchMode::Exact);
        assert!(matches!(f.classify(r#"{"author":"x"}"#), Classified::Error));
    }

    #[test]
    fn non_string_field_is_error() {
        let f = filter(&["ukraine"], MatchMode::Exact);
        assert!(matches!(f.classify(r#"{"subreddit":42}"#), Classified::Error));
        assert!(matches!(f.classify(r#"{"subreddit":null}"#), Classified::Error));
    }

    #[test]
    fn matched_returns_whole_record() {
        let f = filter(&["ukraine"], MatchMode::Exact);
        match f.classify(r#"{"subreddit":"Ukraine","author":"someone","score":3}"#) {
            Classified::Matched(record) => {
                assert_eq!(record.len(), 3);
                assert_eq!(record["author"], serde_json::json!("someone"));
            }
            other => panic!("expected match, got {other:?}"),
        }
    }
}
