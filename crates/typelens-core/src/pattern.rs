//! FQN match patterns.
//!
//! Query patterns are fully qualified names with `*` wildcards, where `*`
//! matches any run of characters including dots. Patterns without a
//! wildcard take the exact-match fast path and never touch the regex
//! engine.

use regex::Regex;
use thiserror::Error;

/// Error type for pattern compilation.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The wildcard pattern could not be compiled.
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// A compiled FQN pattern.
#[derive(Debug, Clone)]
pub enum MatchPattern {
    /// No wildcard: plain string equality.
    Exact(String),
    /// At least one `*`: anchored regex over the whole FQN.
    Wildcard(WildcardPattern),
}

#[derive(Debug, Clone)]
pub struct WildcardPattern {
    /// Literal characters before the first `*`, used to narrow index scans.
    prefix: String,
    regex: Regex,
}

impl WildcardPattern {
    fn compile(template: &str) -> Result<Self, PatternError> {
        let prefix = template
            .split('*')
            .next()
            .unwrap_or_default()
            .to_string();
        let mut source = String::from("^");
        for (i, part) in template.split('*').enumerate() {
            if i > 0 {
                source.push_str(".*");
            }
            source.push_str(&regex::escape(part));
        }
        source.push('$');
        let regex = Regex::new(&source).map_err(|err| PatternError::InvalidPattern {
            pattern: template.to_string(),
            message: err.to_string(),
        })?;
        Ok(WildcardPattern { prefix, regex })
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// Literal prefix every match must start with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl MatchPattern {
    /// Compile a pattern string. Inputs without `*` become exact matches.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        if template.contains('*') {
            WildcardPattern::compile(template).map(MatchPattern::Wildcard)
        } else {
            Ok(MatchPattern::Exact(template.to_string()))
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            MatchPattern::Exact(fqn) => fqn == candidate,
            MatchPattern::Wildcard(pattern) => pattern.matches(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_itself() {
        let pattern = MatchPattern::compile("com.acme.Foo").unwrap();
        assert!(matches!(pattern, MatchPattern::Exact(_)));
        assert!(pattern.matches("com.acme.Foo"));
        assert!(!pattern.matches("com.acme.FooBar"));
    }

    #[test]
    fn trailing_wildcard_matches_package_subtree() {
        let pattern = MatchPattern::compile("com.acme.*").unwrap();
        assert!(pattern.matches("com.acme.Foo"));
        assert!(pattern.matches("com.acme.sub.Bar"));
        assert!(!pattern.matches("org.acme.Foo"));
    }

    #[test]
    fn inner_wildcard_matches_any_run() {
        let pattern = MatchPattern::compile("com.*.Foo").unwrap();
        assert!(pattern.matches("com.acme.Foo"));
        assert!(pattern.matches("com.acme.deep.Foo"));
        assert!(!pattern.matches("com.acme.Foo2"));
    }

    #[test]
    fn wildcard_only_matches_everything() {
        let pattern = MatchPattern::compile("*").unwrap();
        assert!(pattern.matches(""));
        assert!(pattern.matches("anything.at.All"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let pattern = MatchPattern::compile("com.acme.Foo$Inner*").unwrap();
        assert!(pattern.matches("com.acme.Foo$Inner1"));
        assert!(!pattern.matches("com.acme.FooXInner1"));
    }

    #[test]
    fn prefix_is_text_before_first_wildcard() {
        let MatchPattern::Wildcard(pattern) = MatchPattern::compile("com.acme.*Service").unwrap()
        else {
            panic!("expected a wildcard pattern");
        };
        assert_eq!(pattern.prefix(), "com.acme.");
    }
}
