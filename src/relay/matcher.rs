//! Stream name selection
//!
//! Rule grammar:
//! - `*` matches every stream
//! - otherwise a comma-separated list of terms, each trimmed:
//!   - `name` matches exactly
//!   - `*tail` matches names ending with `tail`
//!   - `head*` matches names starting with `head`
//!
//! Names that already end with the duplicate suffix are never selected, so a
//! duplicate published back into the source application is not duplicated
//! again.

/// Eligibility check for source stream names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatcher {
    rule: String,
    suffix: String,
}

impl NameMatcher {
    /// Create a matcher for a rule expression and duplicate suffix
    pub fn new(rule: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            suffix: suffix.into(),
        }
    }

    /// Rule expression
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// Check whether a stream should be duplicated
    pub fn matches(&self, stream_name: &str) -> bool {
        matches(&self.rule, &self.suffix, stream_name)
    }
}

/// Check a stream name against a rule expression
pub fn matches(rule: &str, suffix: &str, stream_name: &str) -> bool {
    if !suffix.is_empty() && stream_name.ends_with(suffix) {
        return false;
    }

    if rule == "*" || rule == stream_name {
        return true;
    }

    rule.split(',')
        .map(str::trim)
        .any(|term| term_matches(term, stream_name))
}

fn term_matches(term: &str, stream_name: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    if term == stream_name {
        return true;
    }
    if let Some(tail) = term.strip_prefix('*') {
        if stream_name.ends_with(tail) {
            return true;
        }
    }
    if let Some(head) = term.strip_suffix('*') {
        if stream_name.starts_with(head) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_everything() {
        for name in ["a", "cam1", "live stream", "x_y_z"] {
            assert!(matches("*", "_dest", name), "{name}");
        }
    }

    #[test]
    fn test_exact_term() {
        assert!(matches("cam1", "_dest", "cam1"));
        assert!(!matches("cam1", "_dest", "cam10"));
    }

    #[test]
    fn test_prefix_and_suffix_terms() {
        assert!(matches("cam*", "_dest", "cam1"));
        assert!(!matches("cam*", "_dest", "webcam"));
        assert!(matches("*_hd", "_dest", "studio_hd"));
        assert!(!matches("*_hd", "_dest", "studio_sd"));
    }

    #[test]
    fn test_list_is_trimmed_or() {
        let rule = " foo ,  cam* , *_hd";
        assert!(matches(rule, "_dest", "foo"));
        assert!(matches(rule, "_dest", "cam7"));
        assert!(matches(rule, "_dest", "x_hd"));
        assert!(!matches(rule, "_dest", "bar"));
    }

    #[test]
    fn test_empty_terms_never_match() {
        assert!(!matches("foo,,", "_dest", "bar"));
        assert!(!matches("", "_dest", "bar"));
    }

    #[test]
    fn test_suffix_rejected_before_rule() {
        assert!(!matches("*", "_dest", "cam1_dest"));
        assert!(!matches("cam1_dest", "_dest", "cam1_dest"));
    }

    #[test]
    fn test_empty_suffix_disables_check() {
        assert!(matches("*", "", "cam1_dest"));
    }

    #[test]
    fn test_no_glob_in_middle() {
        assert!(!matches("ca*1", "_dest", "cam1"));
    }

    #[test]
    fn test_matcher_struct() {
        let matcher = NameMatcher::new("cam*", "_dest");
        assert_eq!(matcher.rule(), "cam*");
        assert!(matcher.matches("cam1"));
        assert!(!matcher.matches("cam1_dest"));
    }
}
