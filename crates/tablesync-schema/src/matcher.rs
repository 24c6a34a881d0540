//! Property matching: an ordered list of strategies, per the engine's
//! design notes ("fuzzy property matcher as a strategy list"). Strategy 1
//! (exact name) is PREFERRED and always short-circuits; later strategies
//! only exist to tolerate historical drift.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Which strategy resolved a match, recorded for the debug note on each diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategyKind {
    Exact,
    CaseInsensitive,
    Normalized,
    SingularPlural,
    Synonym,
}

impl MatchStrategyKind {
    pub fn is_preferred(self) -> bool {
        matches!(self, MatchStrategyKind::Exact)
    }
}

/// The column name a property resolved to, and which strategy found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub matched_name: String,
    pub strategy: MatchStrategyKind,
}

trait MatchStrategy {
    fn kind(&self) -> MatchStrategyKind;
    fn try_match(&self, expected: &str, candidates: &[String]) -> Option<String>;
}

struct ExactStrategy;
impl MatchStrategy for ExactStrategy {
    fn kind(&self) -> MatchStrategyKind {
        MatchStrategyKind::Exact
    }
    fn try_match(&self, expected: &str, candidates: &[String]) -> Option<String> {
        candidates.iter().find(|c| c.as_str() == expected).cloned()
    }
}

struct CaseInsensitiveStrategy;
impl MatchStrategy for CaseInsensitiveStrategy {
    fn kind(&self) -> MatchStrategyKind {
        MatchStrategyKind::CaseInsensitive
    }
    fn try_match(&self, expected: &str, candidates: &[String]) -> Option<String> {
        let expected_lower = expected.to_lowercase();
        candidates
            .iter()
            .find(|c| c.to_lowercase() == expected_lower)
            .cloned()
    }
}

struct NormalizedStrategy;

fn normalize(value: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]+").unwrap());
    re.replace_all(&value.to_lowercase(), "").into_owned()
}

impl MatchStrategy for NormalizedStrategy {
    fn kind(&self) -> MatchStrategyKind {
        MatchStrategyKind::Normalized
    }
    fn try_match(&self, expected: &str, candidates: &[String]) -> Option<String> {
        let normalized_expected = normalize(expected);
        candidates
            .iter()
            .find(|c| normalize(c) == normalized_expected)
            .cloned()
    }
}

struct SingularPluralStrategy;

fn singularize(value: &str) -> String {
    let lower = value.to_lowercase();
    lower
        .strip_suffix("ies")
        .map(|base| format!("{base}y"))
        .or_else(|| lower.strip_suffix('s').map(|base| base.to_string()))
        .unwrap_or(lower)
}

impl MatchStrategy for SingularPluralStrategy {
    fn kind(&self) -> MatchStrategyKind {
        MatchStrategyKind::SingularPlural
    }
    fn try_match(&self, expected: &str, candidates: &[String]) -> Option<String> {
        let singular_expected = singularize(expected);
        candidates
            .iter()
            .find(|c| singularize(c) == singular_expected)
            .cloned()
    }
}

struct SynonymStrategy {
    synonyms: HashMap<&'static str, &'static str>,
}

impl SynonymStrategy {
    fn new() -> Self {
        // Small registry of known synonyms. Each pair maps to
        // a shared canonical token so either spelling matches the other.
        let pairs: &[(&str, &str)] = &[
            ("title", "name"),
            ("status", "state"),
            ("priority", "importance"),
            ("assignee", "owner"),
            ("url", "link"),
            ("notes", "description"),
        ];
        let mut synonyms = HashMap::new();
        for (a, b) in pairs {
            synonyms.insert(*a, *a);
            synonyms.insert(*b, *a);
        }
        Self { synonyms }
    }

    fn canonical(&self, value: &str) -> String {
        let lower = value.to_lowercase();
        self.synonyms
            .get(lower.as_str())
            .map(|c| c.to_string())
            .unwrap_or(lower)
    }
}

impl MatchStrategy for SynonymStrategy {
    fn kind(&self) -> MatchStrategyKind {
        MatchStrategyKind::Synonym
    }
    fn try_match(&self, expected: &str, candidates: &[String]) -> Option<String> {
        let canonical_expected = self.canonical(expected);
        candidates
            .iter()
            .find(|c| self.canonical(c) == canonical_expected)
            .cloned()
    }
}

/// Resolves "column X on this side" to "column Y on the other side" by
/// trying strategies 1 through 5 in order and stopping at the first hit.
pub struct PropertyMatcher {
    strategies: Vec<Box<dyn MatchStrategy + Send + Sync>>,
}

impl Default for PropertyMatcher {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(ExactStrategy),
                Box::new(CaseInsensitiveStrategy),
                Box::new(NormalizedStrategy),
                Box::new(SingularPluralStrategy),
                Box::new(SynonymStrategy::new()),
            ],
        }
    }
}

impl PropertyMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to resolve `expected` against `candidates`, strategy by
    /// strategy. Returns `None` if nothing matches — the caller treats
    /// that as "no corresponding column on the other side".
    pub fn resolve(&self, expected: &str, candidates: &[String]) -> Option<MatchResult> {
        for strategy in &self.strategies {
            if let Some(matched_name) = strategy.try_match(expected, candidates) {
                return Some(MatchResult {
                    matched_name,
                    strategy: strategy.kind(),
                });
            }
        }
        None
    }
}
