//! Prim path ownership and name clash detection.

use std::collections::HashMap;

use crate::scene::{NodePath, SceneGraph};
use crate::sdf::SdfPath;
use crate::util::{Error, Result};

/// Tracks which source node owns each prim path.
///
/// Clashes only happen when namespaces are stripped; otherwise node names
/// are unique by construction and nothing is recorded.
#[derive(Debug, Default)]
pub struct PathMapper {
    strip_namespaces: bool,
    merge_transform_and_shape: bool,
    owners: HashMap<SdfPath, NodePath>,
}

impl PathMapper {
    pub fn new(strip_namespaces: bool, merge_transform_and_shape: bool) -> Self {
        Self {
            strip_namespaces,
            merge_transform_and_shape,
            owners: HashMap::new(),
        }
    }

    /// Claim `path` for `node`.
    ///
    /// A path already owned by another node is accepted only when merging
    /// transforms and shapes and both nodes resolve to the same shape.
    pub fn check_name_clash(
        &mut self,
        path: &SdfPath,
        node: &NodePath,
        scene: &dyn SceneGraph,
    ) -> Result<()> {
        if !self.strip_namespaces {
            return Ok(());
        }
        let Some(owner) = self.owners.get(path) else {
            self.owners.insert(path.clone(), node.clone());
            return Ok(());
        };
        if self.merge_transform_and_shape && scene.extend_to_shape(owner) == scene.extend_to_shape(node) {
            return Ok(());
        }
        Err(Error::NameClash {
            path: path.to_string(),
            first: owner.to_string(),
            second: node.to_string(),
        })
    }

    /// Owner of a claimed path.
    pub fn owner(&self, path: &SdfPath) -> Option<&NodePath> {
        self.owners.get(path)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;

    fn scene() -> MemoryScene {
        let mut scene = MemoryScene::new();
        scene.add_node("|ns1:cube|ns1:cubeShape", "mesh");
        scene.add_node("|ns2:cube|ns2:cubeShape", "mesh");
        scene
    }

    #[test]
    fn test_clash_after_strip() {
        let scene = scene();
        let path = SdfPath::new("/cube").unwrap();
        let mut mapper = PathMapper::new(true, true);
        mapper
            .check_name_clash(&path, &NodePath::new("|ns1:cube"), &scene)
            .unwrap();
        let err = mapper
            .check_name_clash(&path, &NodePath::new("|ns2:cube"), &scene)
            .unwrap_err();
        assert!(matches!(err, Error::NameClash { .. }));
        assert!(err.to_string().contains("|ns1:cube"));
        assert!(err.to_string().contains("|ns2:cube"));
    }

    #[test]
    fn test_merged_shape_is_not_a_clash() {
        let scene = scene();
        let path = SdfPath::new("/cube").unwrap();
        let mut mapper = PathMapper::new(true, true);
        mapper
            .check_name_clash(&path, &NodePath::new("|ns1:cube"), &scene)
            .unwrap();
        mapper
            .check_name_clash(&path, &NodePath::new("|ns1:cube|ns1:cubeShape"), &scene)
            .unwrap();
        assert_eq!(mapper.owner(&path), Some(&NodePath::new("|ns1:cube")));

        let mut strict = PathMapper::new(true, false);
        strict
            .check_name_clash(&path, &NodePath::new("|ns1:cube"), &scene)
            .unwrap();
        assert!(strict
            .check_name_clash(&path, &NodePath::new("|ns1:cube|ns1:cubeShape"), &scene)
            .is_err());
    }

    #[test]
    fn test_no_tracking_without_strip() {
        let scene = scene();
        let path = SdfPath::new("/cube").unwrap();
        let mut mapper = PathMapper::new(false, false);
        mapper
            .check_name_clash(&path, &NodePath::new("|ns1:cube"), &scene)
            .unwrap();
        mapper
            .check_name_clash(&path, &NodePath::new("|ns2:cube"), &scene)
            .unwrap();
        assert!(mapper.is_empty());
    }
}
