//! Path pattern compilation and matching.

use std::collections::HashMap;

const CAPTURE_SIGIL: char = ':';

/// One compiled segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    /// Matches only an identical segment.
    Literal(String),
    /// Matches any single non-empty segment and records it under the name.
    Capture(String),
}

impl Component {
    fn parse(segment: &str) -> Self {
        match segment.strip_prefix(CAPTURE_SIGIL) {
            Some(name) if !name.is_empty() => Component::Capture(name.to_string()),
            _ => Component::Literal(segment.to_string()),
        }
    }

    pub fn matches(&self, segment: &str) -> bool {
        match self {
            Component::Literal(literal) => literal == segment,
            Component::Capture(_) => !segment.is_empty(),
        }
    }
}

/// An ordered sequence of component matchers compiled from a pattern such as
/// `/users/:id/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatcher {
    pattern: String,
    components: Vec<Component>,
}

impl PathMatcher {
    pub fn parse(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            components: split_path(pattern).into_iter().map(Component::parse).collect(),
        }
    }

    /// The pattern this matcher was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// True when the segment counts agree and every component accepts its segment.
    pub fn matches(&self, segments: &[&str]) -> bool {
        self.components.len() == segments.len()
            && self
                .components
                .iter()
                .zip(segments)
                .all(|(component, segment)| component.matches(segment))
    }

    /// Writes this matcher's captures into `params`.
    ///
    /// Returns false and leaves `params` untouched when the segments do not
    /// match. Applying twice yields the same map.
    pub fn apply_captures(&self, segments: &[&str], params: &mut HashMap<String, String>) -> bool {
        if !self.matches(segments) {
            return false;
        }

        for (component, segment) in self.components.iter().zip(segments) {
            if let Component::Capture(name) = component {
                params.insert(name.clone(), (*segment).to_string());
            }
        }
        true
    }
}

/// Splits a path into its non-empty `/`-separated segments.
///
/// ```
/// # use wayward::routing::matcher::split_path;
/// assert_eq!(split_path("/foo//bar/"), vec!["foo", "bar"]);
/// assert!(split_path("/").is_empty());
/// ```
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_sigil_is_a_literal() {
        let matcher = PathMatcher::parse("/:");
        assert_eq!(matcher.components(), &[Component::Literal(":".to_string())]);
        assert!(matcher.matches(&[":"]));
        assert!(!matcher.matches(&["x"]));
    }

    #[test]
    fn failed_match_leaves_params_alone() {
        let matcher = PathMatcher::parse("/foo/:id");
        let mut params = HashMap::new();

        assert!(!matcher.apply_captures(&["bar", "1"], &mut params));
        assert!(params.is_empty());
    }
}
