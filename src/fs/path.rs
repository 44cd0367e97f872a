//! Logical (plaintext) path handling.

use crate::error::{Error, Result};

/// A parsed logical path such as `/docs/a.txt`.
///
/// A leading separator is optional and empty segments are dropped, so
/// `docs/a.txt`, `/docs/a.txt` and `/docs//a.txt/` are the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalPath {
    components: Vec<String>,
}

impl LogicalPath {
    /// Parse a path string.
    pub fn parse(path: &str) -> Result<Self> {
        let components: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();

        for component in &components {
            validate_segment(component)?;
        }

        Ok(Self { components })
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Split into the parent components and the last segment.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.components
            .split_last()
            .map(|(last, parent)| (parent, last.as_str()))
    }

    /// Get the file/directory name (last component).
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }
}

impl std::fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.components.join("/"))
    }
}

/// Reject anything that is not a single usable name.
pub fn validate_segment(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidPath("empty name".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidPath(format!(
            "{} must be a single path segment",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidPath(format!(
            "Invalid path component: {}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root() {
        for root in ["", "/", "//"] {
            let path = LogicalPath::parse(root).unwrap();
            assert!(path.is_root());
            assert_eq!(path.to_string(), "/");
        }
    }

    #[test]
    fn test_parse_simple() {
        let path = LogicalPath::parse("/foo/bar").unwrap();
        assert!(!path.is_root());
        assert_eq!(path.components(), &["foo", "bar"]);
        assert_eq!(path.to_string(), "/foo/bar");
    }

    #[test]
    fn test_parse_relative_and_trailing() {
        let relative = LogicalPath::parse("foo/bar/").unwrap();
        let absolute = LogicalPath::parse("/foo//bar").unwrap();
        assert_eq!(relative, absolute);
    }

    #[test]
    fn test_parse_dot_segments_fail() {
        assert!(matches!(
            LogicalPath::parse("/foo/../bar"),
            Err(Error::InvalidPath(_))
        ));
        assert!(LogicalPath::parse("./foo").is_err());
    }

    #[test]
    fn test_split_last() {
        let path = LogicalPath::parse("/foo/bar/baz.txt").unwrap();
        let (parent, last) = path.split_last().unwrap();
        assert_eq!(parent, &["foo", "bar"]);
        assert_eq!(last, "baz.txt");
        assert_eq!(path.name(), Some("baz.txt"));

        assert!(LogicalPath::parse("/").unwrap().split_last().is_none());
    }

    #[test]
    fn test_validate_segment() {
        assert!(validate_segment("notes.txt").is_ok());
        assert!(validate_segment("a/b").is_err());
        assert!(validate_segment("").is_err());
        assert!(validate_segment("..").is_err());
    }
}
