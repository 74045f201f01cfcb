//! Render layers as modeling variants.
//!
//! The written hierarchy lives under the model root override (`/_BaseModel_`).
//! A variant root prim references it and carries one `modelingVariant`
//! per render layer; each variant deactivates the transformable prims that
//! are not members of its layer. Going through a reference is what lets the
//! variant opinions win over the local ones.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::args::MODELING_VARIANT_SET;
use crate::scene::{NodePath, SceneGraph};
use crate::sdf::{schema, SdfPath, Stage};
use crate::util::{make_valid_identifier, Result, NAMESPACE_DELIMITER};

/// Variant root: the root prim if one is configured, else the top-level
/// ancestor of the first written node.
pub fn variant_root_path(root_prim: Option<&SdfPath>, first_node: Option<&NodePath>) -> Result<SdfPath> {
    if let Some(root) = root_prim {
        return Ok(root.clone());
    }
    let name = first_node
        .and_then(|n| n.components().next())
        .map(|c| make_valid_identifier(&c.replace(NAMESPACE_DELIMITER, "_")))
        .unwrap_or_else(|| "_".to_string());
    SdfPath::absolute_root().append_child(&name)
}

/// Build the variant root over `usd_root_prim` and one variant per render
/// layer with members. Returns the name of the new default prim.
pub fn write_variants(
    stage: &mut Stage,
    scene: &dyn SceneGraph,
    usd_root_prim: &SdfPath,
    variant_root: &SdfPath,
    dag_to_usd: &BTreeMap<NodePath, SdfPath>,
) -> Result<String> {
    info!("Writing modeling variants under {}", variant_root);
    stage.define_prim(variant_root, "")?;
    stage.add_internal_reference(variant_root, usd_root_prim)?;
    stage.set_active(variant_root, true)?;
    stage.set_active(usd_root_prim, false)?;

    let default_layer = scene.default_render_layer();
    let mut added: Vec<String> = Vec::new();

    for layer in scene.render_layers() {
        scene.set_current_render_layer(&layer);

        let mut active_paths: Vec<SdfPath> = Vec::new();
        for member in scene.render_layer_members(&layer) {
            let shape = scene.extend_to_shape(&member);
            let Some(path) = dag_to_usd.get(&shape) else {
                continue;
            };
            let Some(base) = path.root_prefix() else {
                continue;
            };
            let path = path.replace_prefix(&base, variant_root);
            if !active_paths.contains(&path) {
                active_paths.push(path);
            }
        }
        if active_paths.is_empty() {
            debug!("Render layer {} has no written members", layer);
            continue;
        }

        stage.add_variant_set(variant_root, MODELING_VARIANT_SET)?;
        stage.add_variant(variant_root, MODELING_VARIANT_SET, &layer)?;
        stage.set_variant_selection(variant_root, MODELING_VARIANT_SET, &layer)?;
        added.push(layer.clone());

        let target = stage.variant_edit_target(variant_root, MODELING_VARIANT_SET, &layer);
        let mut edit = stage.edit_context(target);
        for path in inactive_prims(&edit, variant_root, &active_paths) {
            edit.set_active(&path, false)?;
        }
    }

    let default_variant = if added.contains(&default_layer) {
        Some(default_layer)
    } else {
        added.first().cloned()
    };
    if let Some(variant) = default_variant {
        stage.set_variant_selection(variant_root, MODELING_VARIANT_SET, &variant)?;
    }
    Ok(variant_root.name().to_string())
}

/// Transformable prims under `variant_root` unrelated to every active path.
/// Nothing below a returned prim is visited.
fn inactive_prims(stage: &Stage, variant_root: &SdfPath, active_paths: &[SdfPath]) -> Vec<SdfPath> {
    let mut out: Vec<SdfPath> = Vec::new();
    for prim in stage.traverse_all() {
        if !prim.path.has_prefix(variant_root) || out.iter().any(|p| prim.path.has_prefix(p)) {
            continue;
        }
        if !schema::is_xformable(&prim.type_name) {
            continue;
        }
        let active = active_paths
            .iter()
            .any(|a| prim.path.has_prefix(a) || a.has_prefix(&prim.path));
        if !active {
            out.push(prim.path);
        }
    }
    out
}
