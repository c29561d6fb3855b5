//! Include paths: dotted field chains naming pointers to hydrate in query results.

use std::fmt;

/// One dotted path, e.g. `brand.owner`, split into its segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludePath(Vec<String>);

impl IncludePath {
    /// Parses a single dotted path. Empty segments are dropped; returns `None` if none remain.
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<String> = path
            .split('.')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        (!segments.is_empty()).then_some(Self(segments))
    }

    /// Parses a comma-separated list of dotted paths.
    pub fn parse_list(paths: &str) -> Vec<Self> {
        paths.split(',').filter_map(Self::parse).collect()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for IncludePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for IncludePath {
    fn from(path: &str) -> Self {
        Self::parse(path).unwrap_or(Self(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_dotted_paths() {
        let paths = IncludePath::parse_list("brand.owner, tags,,");

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].segments(), &["brand".to_string(), "owner".to_string()]);
        assert_eq!(paths[1].to_string(), "tags");
    }
}
