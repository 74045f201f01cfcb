//! Source node paths and categories.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between node path components.
pub const NODE_SEPARATOR: char = '|';

/// Full path of a source node (`|group1|pCube1|pCubeShape1`).
///
/// The world (scene root) is the empty path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    /// The scene root.
    pub fn world() -> Self {
        Self(String::new())
    }

    /// Normalize a path: one leading separator, no trailing separator.
    pub fn new(path: &str) -> Self {
        let body = path.trim_matches(NODE_SEPARATOR);
        if body.is_empty() {
            return Self::world();
        }
        Self(format!("{}{}", NODE_SEPARATOR, body))
    }

    /// Check for the scene root.
    #[inline]
    pub fn is_world(&self) -> bool {
        self.0.is_empty()
    }

    /// Path as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path components, top-most first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(NODE_SEPARATOR).filter(|c| !c.is_empty())
    }

    /// Number of components; the world has 0.
    pub fn length(&self) -> usize {
        self.components().count()
    }

    /// Leaf name, empty for the world.
    pub fn name(&self) -> &str {
        match self.0.rfind(NODE_SEPARATOR) {
            Some(i) => &self.0[i + 1..],
            None => "",
        }
    }

    /// Parent path; the world is its own parent.
    pub fn parent(&self) -> NodePath {
        match self.0.rfind(NODE_SEPARATOR) {
            Some(0) | None => Self::world(),
            Some(i) => Self(self.0[..i].to_string()),
        }
    }

    /// Child path.
    pub fn child(&self, name: &str) -> NodePath {
        Self(format!("{}{}{}", self.0, NODE_SEPARATOR, name))
    }

    /// Strict ancestor test. The world is an ancestor of every other node.
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        if self.is_world() {
            return !other.is_world();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == NODE_SEPARATOR as u8
    }

    /// Ancestor-or-self test.
    pub fn is_ancestor_or_self(&self, other: &NodePath) -> bool {
        self == other || self.is_ancestor_of(other)
    }
}

impl From<String> for NodePath {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for NodePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<NodePath> for String {
    fn from(p: NodePath) -> Self {
        p.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exportable category of a node, derived from its type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Transform,
    Mesh,
    Camera,
    Light,
    /// Nested scene-description stage proxy.
    Stage,
    Other,
}

impl NodeCategory {
    /// Category of a node type name.
    pub fn from_type(node_type: &str) -> Self {
        match node_type {
            "transform" | "joint" => Self::Transform,
            "mesh" => Self::Mesh,
            "camera" => Self::Camera,
            "pointLight" | "directionalLight" | "spotLight" | "areaLight" | "ambientLight" => {
                Self::Light
            }
            "stage" | "proxyShape" => Self::Stage,
            _ => Self::Other,
        }
    }

    /// Shapes live below a transform and can merge into it.
    pub fn is_shape(&self) -> bool {
        matches!(self, Self::Mesh | Self::Camera | Self::Light | Self::Stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(NodePath::new("a|b|").as_str(), "|a|b");
        assert!(NodePath::new("|").is_world());
        assert_eq!(NodePath::new("|a|b").name(), "b");
        assert_eq!(NodePath::new("|a|b").parent(), NodePath::new("|a"));
        assert!(NodePath::new("|a").parent().is_world());
        assert_eq!(NodePath::world().child("a"), NodePath::new("|a"));
        assert_eq!(NodePath::new("|a|b").length(), 2);
    }

    #[test]
    fn test_ancestry() {
        let a = NodePath::new("|a");
        let ab = NodePath::new("|a|b");
        let ax = NodePath::new("|ax");
        assert!(a.is_ancestor_of(&ab));
        assert!(!ab.is_ancestor_of(&a));
        assert!(!a.is_ancestor_of(&ax));
        assert!(!a.is_ancestor_of(&a));
        assert!(a.is_ancestor_or_self(&a));
        assert!(NodePath::world().is_ancestor_of(&a));
    }

    #[test]
    fn test_serde() {
        let p: NodePath = serde_json::from_str("\"a|b\"").unwrap();
        assert_eq!(p, NodePath::new("|a|b"));
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"|a|b\"");
    }
}
