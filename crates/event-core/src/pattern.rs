//! Regular expression patterns.
//!
//! A `Pattern` compiles its source twice: once anchored for whole-string
//! matching and once plain for substring search. Identity (equality,
//! ordering, hashing) is defined by the source text, since compiled regexes
//! carry no usable notion of equality.

use crate::Result;
use regex::Regex;
use std::hash::{Hash, Hasher};

/// A compiled regular expression.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    exact: Regex,
    search: Regex,
}

impl Pattern {
    /// Compile a pattern from a regex source string.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let exact = Regex::new(&format!("^(?:{source})$"))?;
        let search = Regex::new(&source)?;
        Ok(Self {
            source,
            exact,
            search,
        })
    }

    /// Compile a pattern from a glob expression, where `*` matches any
    /// sequence of characters and `?` matches a single character.
    pub fn glob(expr: &str) -> Result<Self> {
        let escaped = regex::escape(expr);
        let source = escaped.replace("\\*", ".*").replace("\\?", ".");
        Self::new(source)
    }

    /// Check whether the expression contains glob metacharacters.
    pub fn is_glob(expr: &str) -> bool {
        expr.contains('*') || expr.contains('?')
    }

    /// The pattern source text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match the pattern against the entire string.
    pub fn matches(&self, s: &str) -> bool {
        self.exact.is_match(s)
    }

    /// Search for the pattern anywhere within the string.
    pub fn search(&self, s: &str) -> bool {
        self.search.is_match(s)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl PartialOrd for Pattern {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pattern {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.source.cmp(&other.source)
    }
}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_is_anchored() {
        let p = Pattern::new("foo").unwrap();
        assert!(p.matches("foo"));
        assert!(!p.matches("foobar"));
        assert!(p.search("foobar"));
        assert!(!p.search("fo"));
    }

    #[test]
    fn test_glob() {
        assert!(Pattern::is_glob("b*r"));
        assert!(!Pattern::is_glob("bar"));

        let p = Pattern::glob("b*r?").unwrap();
        assert_eq!(p.as_str(), "b.*r.");
        assert!(p.matches("barz"));
        assert!(p.matches("bazaar!"));
        assert!(!p.matches("bar"));

        // Other regex metacharacters in the glob are taken literally.
        let p = Pattern::glob("a.b*").unwrap();
        assert!(p.matches("a.bc"));
        assert!(!p.matches("axbc"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Pattern::new("(").is_err());
    }

    #[test]
    fn test_identity_by_source() {
        let a = Pattern::new(".").unwrap();
        let b = Pattern::new(".").unwrap();
        let c = Pattern::new("..").unwrap();
        assert_eq!(a, b);
        assert!(a < c);
        assert_eq!(a.to_string(), "/./");
    }
}
