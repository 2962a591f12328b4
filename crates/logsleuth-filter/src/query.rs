use regex::Regex;
use serde::{Deserialize, Serialize};

use logsleuth_sessions::DebugSession;

use crate::FilterError;

/// Literal marker that pulls an entry into the output when error inclusion
/// is on.
pub const ERROR_MARKER: &str = "[ERROR]";

/// What to look for in a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub pattern: String,
    pub is_regex: bool,
    pub case_insensitive: bool,
    /// Include any entry carrying [`ERROR_MARKER`], matched or not.
    pub always_include_errors: bool,
    /// Raw lines to append after each accepted entry.
    pub context_lines_after: usize,
}

impl MatchQuery {
    /// Case-sensitive substring query.
    pub fn literal(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            is_regex: false,
            case_insensitive: false,
            always_include_errors: true,
            context_lines_after: 0,
        }
    }

    /// Regular-expression query.
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            is_regex: true,
            ..Self::literal(pattern)
        }
    }

    /// Query selecting a session's base prefix and all of its sub-scoped
    /// prefixes, e.g. `[DEBUG-AUTH3F9A]` and `[DEBUG-AUTH3F9A-UI-FLOW]`.
    pub fn for_session(session: &DebugSession) -> Self {
        let stem = regex::escape(&format!("[DEBUG-{}", session.session_id));
        Self::regex(format!(r"{}[\]-]", stem))
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    pub fn include_errors(mut self, yes: bool) -> Self {
        self.always_include_errors = yes;
        self
    }

    pub fn context(mut self, lines: usize) -> Self {
        self.context_lines_after = lines;
        self
    }

    /// Validate and compile the pattern. Invalid regexes fail here, before
    /// any input is touched.
    pub fn compile(&self) -> Result<CompiledQuery, FilterError> {
        let matcher = if self.is_regex {
            let source = if self.case_insensitive {
                format!("(?i){}", self.pattern)
            } else {
                self.pattern.clone()
            };
            let regex = Regex::new(&source).map_err(|e| FilterError::InvalidPattern {
                pattern: self.pattern.clone(),
                source: e,
            })?;
            Matcher::Regex(regex)
        } else if self.case_insensitive {
            Matcher::LiteralFolded(self.pattern.to_lowercase())
        } else {
            Matcher::Literal(self.pattern.clone())
        };

        Ok(CompiledQuery {
            matcher,
            always_include_errors: self.always_include_errors,
            context_lines_after: self.context_lines_after,
        })
    }
}

#[derive(Clone, Debug)]
enum Matcher {
    Literal(String),
    /// Needle already lowercased.
    LiteralFolded(String),
    Regex(Regex),
}

/// A [`MatchQuery`] ready to be evaluated against lines.
#[derive(Clone, Debug)]
pub struct CompiledQuery {
    matcher: Matcher,
    always_include_errors: bool,
    context_lines_after: usize,
}

impl CompiledQuery {
    /// Whether the line satisfies the pattern alone.
    pub fn matches_pattern(&self, line: &str) -> bool {
        match &self.matcher {
            Matcher::Literal(needle) => line.contains(needle.as_str()),
            Matcher::LiteralFolded(needle) => line.to_lowercase().contains(needle.as_str()),
            Matcher::Regex(re) => re.is_match(line),
        }
    }

    /// Whether the line pulls its entry in via the error marker.
    pub fn flags_error(&self, line: &str) -> bool {
        self.always_include_errors && line.contains(ERROR_MARKER)
    }

    /// Decision for an entry header.
    pub fn header_matches(&self, line: &str) -> bool {
        self.matches_pattern(line) || self.flags_error(line)
    }

    pub fn context_lines_after(&self) -> usize {
        self.context_lines_after
    }
}
