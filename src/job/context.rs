//! Per-job state shared by traversal, frame writing and finalization.

use std::path::Path;

use tracing::{debug, info};

use super::args::JobExportArgs;
use crate::scene::{NodePath, SceneGraph};
use crate::sdf::{is_anonymous_identifier, Layer, SdfPath, Stage};
use crate::util::{node_name_to_prim_name, root_name_to_prim_name, Error, Result};
use crate::writer::{PrimWriter, WriterContext, WriterRegistry};

/// Arguments, open stage and writers of one export.
pub struct JobContext<'a> {
    pub args: JobExportArgs,
    pub scene: &'a dyn SceneGraph,
    pub stage: Option<Stage>,
    /// Writers in traversal order.
    pub writers: Vec<Box<dyn PrimWriter>>,
    registry: WriterRegistry,
    root_prim_path: Option<SdfPath>,
}

impl<'a> JobContext<'a> {
    pub fn new(args: JobExportArgs, scene: &'a dyn SceneGraph, registry: WriterRegistry) -> Self {
        Self {
            args,
            scene,
            stage: None,
            writers: Vec::new(),
            registry,
            root_prim_path: None,
        }
    }

    /// Path of the configured root prim, once the file is open.
    pub fn root_prim_path(&self) -> Option<&SdfPath> {
        self.root_prim_path.as_ref()
    }

    pub fn stage(&self) -> Result<&Stage> {
        self.stage.as_ref().ok_or_else(|| Error::other("No stage is open"))
    }

    pub fn stage_mut(&mut self) -> Result<&mut Stage> {
        self.stage.as_mut().ok_or_else(|| Error::other("No stage is open"))
    }

    pub fn set_writer_registry(&mut self, registry: WriterRegistry) {
        self.registry = registry;
    }

    /// Open (or create) the layer at `file_name` and wrap it in a stage.
    ///
    /// Append mode reopens an existing file; anonymous identifiers never
    /// touch disk. The root prim, if configured, is defined here unless the
    /// model root is overridden, in which case the variant builder defines it.
    pub fn open_file(&mut self, file_name: &Path, append: bool) -> Result<()> {
        let identifier = file_name.to_string_lossy();
        info!("Opening layer '{}' for writing", identifier);
        let layer = if is_anonymous_identifier(&identifier) {
            Layer::create_anonymous(&identifier[crate::sdf::ANONYMOUS_PREFIX.len()..])
        } else if append && file_name.exists() {
            Layer::open(file_name)?
        } else {
            Layer::create_new(file_name)?
        };
        let mut stage = Stage::new(layer);

        if !self.args.root_prim.is_empty() {
            let name = root_name_to_prim_name(&self.args.root_prim, self.args.strip_namespaces);
            let path = SdfPath::absolute_root().append_child(&name)?;
            if self.args.usd_model_root_override_path.is_none() {
                stage.define_prim(&path, self.args.root_prim_type.type_name())?;
            }
            self.root_prim_path = Some(path);
        }
        self.stage = Some(stage);
        Ok(())
    }

    /// Whether `node` and its subtree should be visited at all.
    pub fn need_to_traverse(&self, node: &NodePath) -> bool {
        if node.is_world() {
            return true;
        }
        if self.scene.is_intermediate(node) {
            return false;
        }
        if self.args.exclude_invisible && !self.scene.is_visible(node) {
            return false;
        }
        self.args.exports_category(self.scene.category(node))
    }

    /// Prim path for a node, or `None` if it falls outside every export root.
    ///
    /// Applies, in order: shape merging, export root re-rooting, name
    /// conversion, the root prim and the model root override.
    pub fn convert_node_path(&self, node: &NodePath) -> Result<Option<SdfPath>> {
        let mut node = node.clone();
        if self.args.merge_transform_and_shape && self.scene.category(&node).is_shape() {
            let parent = node.parent();
            if !parent.is_world() && self.scene.extend_to_shape(&parent) == node {
                node = parent;
            }
        }

        let skip = if self.args.has_export_roots() {
            let roots = self.args.export_root_nodes();
            match roots.iter().find(|r| r.is_ancestor_or_self(&node)) {
                Some(root) => root.length().saturating_sub(1),
                None => return Ok(None),
            }
        } else {
            0
        };

        let mut names: Vec<String> = Vec::new();
        if let Some(root) = &self.root_prim_path {
            names.push(root.name().to_string());
        }
        names.extend(
            node.components()
                .skip(skip)
                .map(|c| node_name_to_prim_name(c, self.args.strip_namespaces)),
        );
        if names.is_empty() {
            return Ok(None);
        }
        let mut path = SdfPath::from_components(names)?;

        if let Some(model_root) = &self.args.usd_model_root_override_path {
            if let Some(first) = path.root_prefix() {
                path = path.replace_prefix(&first, model_root);
            }
        }
        Ok(Some(path))
    }

    /// Ask the registry for a writer. The writer defines its prim.
    pub fn create_prim_writer(&mut self, node: &NodePath) -> Result<Option<Box<dyn PrimWriter>>> {
        let Some(usd_path) = self.convert_node_path(node)? else {
            return Ok(None);
        };
        let stage = self
            .stage
            .as_mut()
            .ok_or_else(|| Error::other("No stage is open"))?;
        let mut ctx = WriterContext {
            stage,
            scene: self.scene,
            args: &self.args,
        };
        let writer = self.registry.create(node, &usd_path, &mut ctx)?;
        if writer.is_some() {
            debug!("Created writer for {} at {}", node, usd_path);
        }
        Ok(writer)
    }
}
