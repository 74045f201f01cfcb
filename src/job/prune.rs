//! Removal of empty container prims.

use tracing::debug;

use crate::sdf::{schema, SdfPath, Stage};

/// Check for a container (`Xform`/`Scope`) with no children and no arcs.
pub fn is_empty_prim(stage: &Stage, path: &SdfPath) -> bool {
    let Some(prim) = stage.prim(path) else {
        return false;
    };
    schema::is_container(&prim.type_name)
        && prim.children.is_empty()
        && !prim.has_authored_payloads
        && !prim.has_authored_references
}

/// Remove empty containers until none are left. Returns the removed paths.
///
/// Removing a prim can empty its parent, so parents of removed prims are
/// checked again on the next pass. `protected` is never removed.
pub fn prune_empty_prims(stage: &mut Stage, protected: Option<&SdfPath>) -> Vec<SdfPath> {
    let keep = |path: &SdfPath| protected.is_some_and(|p| p == path);

    let mut to_remove: Vec<SdfPath> = stage
        .traverse()
        .into_iter()
        .map(|prim| prim.path)
        .filter(|path| !keep(path) && is_empty_prim(stage, path))
        .collect();

    let mut removed = Vec::new();
    while !to_remove.is_empty() {
        let mut recheck: Vec<SdfPath> = Vec::new();
        for path in to_remove.drain(..) {
            if stage.remove_prim(&path) {
                debug!("Pruned empty prim {}", path);
                removed.push(path.clone());
            }
            let parent = path.parent();
            if !parent.is_absolute_root() && !recheck.contains(&parent) {
                recheck.push(parent);
            }
        }
        to_remove = recheck
            .into_iter()
            .filter(|path| !keep(path) && is_empty_prim(stage, path))
            .collect();
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::{Reference, TimeCode, Value};

    fn p(s: &str) -> SdfPath {
        SdfPath::new(s).unwrap()
    }

    #[test]
    fn test_prune_to_fixed_point() {
        let mut stage = Stage::create_in_memory();
        stage.define_prim(&p("/root"), "Xform").unwrap();
        stage.define_prim(&p("/root/a"), "Xform").unwrap();
        stage.define_prim(&p("/root/a/b"), "Scope").unwrap();
        stage.define_prim(&p("/root/a/b/c"), "Xform").unwrap();
        stage.define_prim(&p("/root/mesh"), "Mesh").unwrap();
        stage.define_prim(&p("/lonely"), "Xform").unwrap();
        stage
            .set_attribute(&p("/lonely"), "xformOp:transform", Value::Double(1.0), TimeCode::Default)
            .unwrap();

        let removed = prune_empty_prims(&mut stage, None);
        assert_eq!(removed.len(), 4);
        assert!(stage.has_prim(&p("/root")));
        assert!(stage.has_prim(&p("/root/mesh")));
        assert!(!stage.has_prim(&p("/root/a")));
        assert!(!stage.has_prim(&p("/lonely")));

        // Nothing left to prune.
        assert!(prune_empty_prims(&mut stage, None).is_empty());
    }

    #[test]
    fn test_protected_and_referencing_prims_survive() {
        let mut stage = Stage::create_in_memory();
        stage.define_prim(&p("/asset"), "Xform").unwrap();
        stage.define_prim(&p("/ref"), "Xform").unwrap();
        stage
            .add_reference(
                &p("/ref"),
                Reference {
                    asset_path: "other.usda".into(),
                    prim_path: SdfPath::empty(),
                },
                false,
            )
            .unwrap();

        let removed = prune_empty_prims(&mut stage, Some(&p("/asset")));
        assert!(removed.is_empty());
        assert!(stage.has_prim(&p("/asset")));
        assert!(stage.has_prim(&p("/ref")));
    }
}
