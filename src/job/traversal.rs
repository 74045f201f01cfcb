//! Setup and scene traversal: everything up to the first frame.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::args::{Compatibility, RenderLayerMode, BASE_MODEL_ROOT};
use super::axis_units::AxisUnitsChanger;
use super::{NamedChaser, WriteJob};
use crate::chaser::ChaserContext;
use crate::scene::NodePath;
use crate::sdf::{extension, is_anonymous_identifier, SdfPath, TimeCode};
use crate::util::{root_name_to_prim_name, Error, Result};
use crate::writer::WriterContext;

/// Destination resolved from the requested output path.
#[derive(Debug, PartialEq)]
pub(super) struct Destination {
    /// Layer the stage writes to.
    pub file_name: PathBuf,
    /// Final package, when the destination is a `.usdz`.
    pub package_name: Option<PathBuf>,
}

/// Give `path` a known extension, falling back on the profile's default.
pub(super) fn with_layer_extension(path: &Path, compatibility: Compatibility) -> PathBuf {
    let identifier = path.to_string_lossy();
    let known = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(extension::is_known);
    if is_anonymous_identifier(&identifier) || known {
        return path.to_path_buf();
    }
    let fallback = match compatibility {
        Compatibility::AppleArKit => extension::PACKAGE,
        Compatibility::None => extension::DEFAULT,
    };
    PathBuf::from(format!("{}.{}", identifier, fallback))
}

/// Resolve where the stage is written. Packages go through a temporary
/// binary layer next to the package.
pub(super) fn resolve_destination(
    path: &Path,
    append: bool,
    compatibility: Compatibility,
) -> Result<Destination> {
    let file_name = with_layer_extension(path, compatibility);
    let is_package = file_name.extension().and_then(|e| e.to_str()) == Some(extension::PACKAGE);
    if !is_package {
        return Ok(Destination {
            file_name,
            package_name: None,
        });
    }
    if append {
        return Err(Error::AppendToPackage);
    }
    let dir = file_name
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let temp = dir.join(format!("tmp-{}.{}", Uuid::new_v4().simple(), extension::CRATE));
    if temp.exists() {
        return Err(Error::TempLayerExists(temp));
    }
    Ok(Destination {
        file_name: temp,
        package_name: Some(file_name),
    })
}

/// Reject node lists where one node is inside another.
pub(super) fn check_overlapping_roots(nodes: &[NodePath]) -> Result<()> {
    for (i, first) in nodes.iter().enumerate() {
        for second in &nodes[i + 1..] {
            if first.is_ancestor_or_self(second) || second.is_ancestor_of(first) {
                return Err(Error::OverlappingRoots {
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
        }
    }
    Ok(())
}

impl WriteJob<'_> {
    /// Nodes the traversal starts from.
    fn export_nodes(&self) -> Vec<NodePath> {
        let scene = self.ctx.scene;
        let mut nodes: Vec<NodePath> = if !self.ctx.args.dag_paths.is_empty() {
            self.ctx.args.dag_paths.clone()
        } else if self.ctx.args.export_selected {
            scene.selected_nodes()
        } else {
            scene.assemblies()
        };
        let mut seen = HashSet::new();
        nodes.retain(|n| seen.insert(n.clone()));
        nodes
    }

    /// Candidate names for the default prim, best first.
    pub(super) fn default_prim_candidates(&self) -> Vec<String> {
        let args = &self.ctx.args;
        if !args.root_prim.is_empty() {
            return vec![args.root_prim.clone()];
        }
        let roots: Vec<String> = args
            .export_roots
            .iter()
            .filter(|r| !r.is_empty())
            .cloned()
            .collect();
        if !roots.is_empty() {
            return roots;
        }

        let scene = self.ctx.scene;
        let mut tops: Vec<NodePath> = Vec::new();
        let sources = if args.export_selected {
            scene.selected_nodes()
        } else {
            scene.assemblies()
        };
        for node in sources {
            let top = node
                .components()
                .next()
                .map(|c| NodePath::world().child(c))
                .unwrap_or_default();
            if !top.is_world() && !tops.contains(&top) {
                tops.push(top);
            }
        }
        tops.into_iter()
            .filter(|top| self.has_exported_content(top))
            .map(|top| top.name().to_string())
            .collect()
    }

    /// A hierarchy is skipped only if it holds shapes and all of them are excluded.
    fn has_exported_content(&self, top: &NodePath) -> bool {
        let scene = self.ctx.scene;
        let mut stack = vec![top.clone()];
        let mut any_shape = false;
        while let Some(node) = stack.pop() {
            let category = scene.category(&node);
            if category.is_shape() {
                any_shape = true;
                if self.ctx.args.exports_category(category) {
                    return true;
                }
            }
            stack.extend(scene.children(&node));
        }
        !any_shape
    }

    /// Setup, traversal with default values, model kinds and chaser defaults.
    pub(super) fn begin_writing(&mut self, path: &Path, append: bool) -> Result<()> {
        let scene = self.ctx.scene;

        if !self.ctx.args.legacy_material_scope && self.ctx.args.default_prim.is_empty() {
            if let Some(first) = self.default_prim_candidates().into_iter().next() {
                self.ctx.args.default_prim = first;
            }
        }
        if !self.ctx.args.default_prim.is_empty() {
            self.ctx.args.default_prim =
                root_name_to_prim_name(&self.ctx.args.default_prim, self.ctx.args.strip_namespaces);
        }

        let export_nodes = self.export_nodes();
        check_overlapping_roots(&export_nodes)?;

        let destination = resolve_destination(path, append, self.ctx.args.compatibility)?;
        self.file_name = destination.file_name;
        self.package_name = destination.package_name;

        if self.ctx.args.render_layer_mode == RenderLayerMode::ModelingVariant {
            let layers = scene.render_layers();
            if layers.len() > 1 {
                if self.ctx.args.has_export_roots() {
                    return Err(Error::ExportRootsWithModelingVariant);
                }
                self.ctx.args.usd_model_root_override_path = Some(SdfPath::new(BASE_MODEL_ROOT)?);
            }
            self.render_layers = layers;
        }

        let file_name = self.file_name.clone();
        self.ctx.open_file(&file_name, append)?;

        let args = &self.ctx.args;
        let stage = self
            .ctx
            .stage
            .as_mut()
            .ok_or_else(|| Error::other("No stage is open"))?;
        if let (Some(&first), Some(&last)) = (args.time_samples.first(), args.time_samples.last()) {
            let metadata = &mut stage.layer_mut().metadata;
            metadata.start_time_code = Some(first);
            metadata.end_time_code = Some(last);
            metadata.time_codes_per_second = Some(scene.frames_per_second());
            metadata.frames_per_second = Some(scene.frames_per_second());
        }
        self.axis_units = Some(AxisUnitsChanger::new(stage, scene, args.up_axis, args.unit));
        if !args.custom_layer_data.is_empty() {
            stage.layer_mut().metadata.custom_layer_data = args.custom_layer_data.clone();
        }

        let current = scene.current_render_layer();
        let default_layer = scene.default_render_layer();
        if args.render_layer_mode != RenderLayerMode::CurrentLayer && current != default_layer {
            debug!("Switching to render layer {}", default_layer);
            scene.set_current_render_layer(&default_layer);
        }
        self.saved_render_layer = Some(current);

        self.traverse(&export_nodes)?;

        if self.ctx.args.has_export_roots() && self.dag_to_usd.is_empty() {
            return Err(Error::RootsDoNotIntersect);
        }

        let stage = self.ctx.stage_mut()?;
        self.callbacks.export_shading(stage, &self.dag_to_usd);
        self.callbacks.post_process(stage)?;
        self.model_kind.make_model_hierarchy(stage)?;

        self.create_chasers()?;
        Ok(())
    }

    /// Depth-first walk from the scene root.
    ///
    /// Ancestors of export nodes are visited without pulling in their other
    /// children; export nodes pull in their whole subtree.
    fn traverse(&mut self, export_nodes: &[NodePath]) -> Result<()> {
        let scene = self.ctx.scene;
        let leaves: HashSet<&NodePath> = export_nodes.iter().filter(|n| scene.is_valid(n)).collect();
        let mut ancestors: HashSet<NodePath> = HashSet::new();
        for node in &leaves {
            let mut cur = node.parent();
            while !cur.is_world() && ancestors.insert(cur.clone()) {
                cur = cur.parent();
            }
        }

        // (node, inside an export node's subtree)
        let mut stack: Vec<(NodePath, bool)> = scene
            .children(&NodePath::world())
            .into_iter()
            .rev()
            .map(|n| (n, false))
            .collect();

        while let Some((node, under_leaf)) = stack.pop() {
            let in_scope = if ancestors.contains(&node) {
                false
            } else if leaves.contains(&node) || under_leaf {
                true
            } else {
                continue;
            };
            if !self.ctx.need_to_traverse(&node) {
                continue;
            }

            let mut prune_children = false;
            if let Some(mut writer) = self.ctx.create_prim_writer(&node)? {
                let usd_path = writer.usd_path().clone();
                let stage = self
                    .ctx
                    .stage
                    .as_mut()
                    .ok_or_else(|| Error::other("No stage is open"))?;
                if stage.has_prim(&usd_path) {
                    self.path_mapper.check_name_clash(&usd_path, writer.node(), scene)?;
                    let mut wctx = WriterContext {
                        stage,
                        scene,
                        args: &self.ctx.args,
                    };
                    writer.write(TimeCode::Default, &mut wctx)?;
                    for (n, p) in writer.path_mapping() {
                        self.dag_to_usd.entry(n).or_insert(p);
                    }
                    self.model_kind.on_write_prim(&usd_path, writer.as_ref());
                }
                prune_children = writer.should_prune_children();
                self.ctx.writers.push(writer);
            }
            if !prune_children {
                for child in scene.children(&node).into_iter().rev() {
                    stack.push((child, in_scope));
                }
            }
        }
        info!("Wrote {} prims", self.dag_to_usd.len());
        Ok(())
    }

    /// Instantiate the configured chasers and run their default hooks.
    fn create_chasers(&mut self) -> Result<()> {
        let scene = self.ctx.scene;
        let args = &self.ctx.args;
        let stage = self
            .ctx
            .stage
            .as_mut()
            .ok_or_else(|| Error::other("No stage is open"))?;
        let mut cctx = ChaserContext {
            stage,
            scene,
            args,
            dag_to_usd: &self.dag_to_usd,
        };

        self.chasers.clear();
        for name in &args.chaser_names {
            let chaser_args = args.chaser_args.get(name).cloned().unwrap_or_default();
            match self.chaser_registry.create(name, &chaser_args, &cctx) {
                Ok(chaser) => self.chasers.push(NamedChaser {
                    name: name.clone(),
                    chaser,
                }),
                Err(e) => warn!("Failed to create chaser {}: {}", name, e),
            }
        }

        for named in &mut self.chasers {
            if let Err(e) = named.chaser.export_default(&mut cctx) {
                error!("Chaser {} failed to export defaults: {}", named.name, e);
                return Err(Error::ChaserFailed {
                    name: named.name.clone(),
                    hook: "export_default",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_fallback() {
        assert_eq!(
            with_layer_extension(Path::new("out/scene"), Compatibility::None),
            PathBuf::from("out/scene.usd")
        );
        assert_eq!(
            with_layer_extension(Path::new("out/scene"), Compatibility::AppleArKit),
            PathBuf::from("out/scene.usdz")
        );
        assert_eq!(
            with_layer_extension(Path::new("scene.usda"), Compatibility::AppleArKit),
            PathBuf::from("scene.usda")
        );
        assert_eq!(
            with_layer_extension(Path::new("scene.abc"), Compatibility::None),
            PathBuf::from("scene.abc.usd")
        );
        assert_eq!(
            with_layer_extension(Path::new("anon:scratch"), Compatibility::None),
            PathBuf::from("anon:scratch")
        );
    }

    #[test]
    fn test_package_destination() {
        let dest = resolve_destination(Path::new("dir/asset.usdz"), false, Compatibility::None).unwrap();
        assert_eq!(dest.package_name, Some(PathBuf::from("dir/asset.usdz")));
        let temp = dest.file_name.to_string_lossy().to_string();
        assert!(temp.starts_with("dir/tmp-"));
        assert!(temp.ends_with(".usdc"));

        assert!(matches!(
            resolve_destination(Path::new("asset.usdz"), true, Compatibility::None),
            Err(Error::AppendToPackage)
        ));
        let dest = resolve_destination(Path::new("asset.usda"), true, Compatibility::None).unwrap();
        assert_eq!(dest.package_name, None);
    }

    #[test]
    fn test_overlapping_roots() {
        let ok = [NodePath::new("|a|b"), NodePath::new("|a|c")];
        assert!(check_overlapping_roots(&ok).is_ok());
        let bad = [NodePath::new("|a|b|c"), NodePath::new("|x"), NodePath::new("|a|b")];
        let err = check_overlapping_roots(&bad).unwrap_err();
        assert!(matches!(err, Error::OverlappingRoots { .. }));
        assert!(err.to_string().contains("|a|b|c"));
    }
}
