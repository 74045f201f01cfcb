//! Prim paths in the output namespace.

use std::fmt;

use crate::util::{is_valid_identifier, Error, Result};

/// Absolute, slash separated prim path (`/root/geo/cube`).
///
/// The absolute root is `/`. An empty path is used as "no path".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SdfPath(String);

impl SdfPath {
    /// The absolute root path `/`.
    pub fn absolute_root() -> Self {
        Self("/".to_string())
    }

    /// The empty path.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Parse an absolute prim path, validating every component.
    pub fn new(path: &str) -> Result<Self> {
        if path == "/" {
            return Ok(Self::absolute_root());
        }
        if !path.starts_with('/') {
            return Err(Error::InvalidPath(path.to_string()));
        }
        let body = path.trim_end_matches('/');
        for comp in body[1..].split('/') {
            if !is_valid_identifier(comp) {
                return Err(Error::InvalidPath(path.to_string()));
            }
        }
        Ok(Self(body.to_string()))
    }

    /// Build a path from already sanitized components.
    pub fn from_components<I, S>(components: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = Self::absolute_root();
        for comp in components {
            path = path.append_child(comp.as_ref())?;
        }
        Ok(path)
    }

    /// Check for the empty path.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check for `/`.
    #[inline]
    pub fn is_absolute_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path components (`/a/b` -> `a`, `b`).
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    /// Number of components (`/` has 0).
    pub fn element_count(&self) -> usize {
        self.components().count()
    }

    /// Last component, empty for `/`.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => "",
        }
    }

    /// Parent path. The parent of `/` is the empty path.
    pub fn parent(&self) -> SdfPath {
        if self.is_empty() || self.is_absolute_root() {
            return Self::empty();
        }
        match self.0.rfind('/') {
            Some(0) => Self::absolute_root(),
            Some(i) => Self(self.0[..i].to_string()),
            None => Self::empty(),
        }
    }

    /// Append a child component.
    pub fn append_child(&self, name: &str) -> Result<SdfPath> {
        if !is_valid_identifier(name) || self.is_empty() {
            return Err(Error::InvalidPath(format!("{}/{}", self.0, name)));
        }
        if self.is_absolute_root() {
            Ok(Self(format!("/{}", name)))
        } else {
            Ok(Self(format!("{}/{}", self.0, name)))
        }
    }

    /// True if `prefix` is this path or one of its ancestors.
    pub fn has_prefix(&self, prefix: &SdfPath) -> bool {
        if prefix.is_empty() || self.is_empty() {
            return false;
        }
        if prefix.is_absolute_root() {
            return true;
        }
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
    }

    /// All prefixes from the top-level prim down to this path (`/a/b` -> `/a`, `/a/b`).
    pub fn prefixes(&self) -> Vec<SdfPath> {
        let mut out = Vec::new();
        let mut cur = String::new();
        for comp in self.components() {
            cur.push('/');
            cur.push_str(comp);
            out.push(Self(cur.clone()));
        }
        out
    }

    /// Top-level ancestor (`/a/b/c` -> `/a`), `None` for `/` and the empty path.
    pub fn root_prefix(&self) -> Option<SdfPath> {
        self.components().next().map(|c| Self(format!("/{}", c)))
    }

    /// Replace `old` prefix with `new`. Returns the path unchanged if `old` is not a prefix.
    pub fn replace_prefix(&self, old: &SdfPath, new: &SdfPath) -> SdfPath {
        if !self.has_prefix(old) {
            return self.clone();
        }
        let rest = &self.0[old.0.len()..];
        if new.is_absolute_root() {
            if rest.is_empty() {
                return Self::absolute_root();
            }
            return Self(rest.to_string());
        }
        Self(format!("{}{}", new.0, rest))
    }

    /// Components of this path below `prefix`, or `None` if not below it.
    pub fn relative_components(&self, prefix: &SdfPath) -> Option<Vec<&str>> {
        if !self.has_prefix(prefix) {
            return None;
        }
        let skip = prefix.element_count();
        Some(self.components().skip(skip).collect())
    }
}

impl fmt::Display for SdfPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SdfPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> SdfPath {
        SdfPath::new(s).unwrap()
    }

    #[test]
    fn test_parse() {
        assert!(SdfPath::new("/a/b").is_ok());
        assert!(SdfPath::new("a/b").is_err());
        assert!(SdfPath::new("/a/1b").is_err());
        assert_eq!(p("/a/b/").as_str(), "/a/b");
        assert!(p("/").is_absolute_root());
    }

    #[test]
    fn test_navigation() {
        let path = p("/root/geo/cube");
        assert_eq!(path.name(), "cube");
        assert_eq!(path.parent(), p("/root/geo"));
        assert_eq!(p("/root").parent(), SdfPath::absolute_root());
        assert!(SdfPath::absolute_root().parent().is_empty());
        assert_eq!(path.element_count(), 3);
        assert_eq!(path.prefixes(), vec![p("/root"), p("/root/geo"), path.clone()]);
        assert_eq!(path.root_prefix(), Some(p("/root")));
    }

    #[test]
    fn test_prefix() {
        let path = p("/root/geo");
        assert!(path.has_prefix(&p("/root")));
        assert!(path.has_prefix(&path));
        assert!(!p("/rootx/geo").has_prefix(&p("/root")));
        assert!(path.has_prefix(&SdfPath::absolute_root()));

        assert_eq!(
            p("/_BaseModel_/Geom/Cube").replace_prefix(&p("/_BaseModel_"), &p("/mayaRoot")),
            p("/mayaRoot/Geom/Cube")
        );
        assert_eq!(path.replace_prefix(&p("/other"), &p("/x")), path);
        assert_eq!(
            path.relative_components(&p("/root")),
            Some(vec!["geo"])
        );
    }
}
