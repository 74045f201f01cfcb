//! Name-keyed writer factories.

use std::collections::HashMap;

use super::shape::ShapeWriter;
use super::xform::XformWriter;
use super::{PrimWriter, WriterContext};
use crate::scene::NodePath;
use crate::sdf::SdfPath;
use crate::util::Result;

/// Creates a writer for a node at a prim path, or `None` to skip it.
pub type WriterFactory = Box<
    dyn Fn(&NodePath, &SdfPath, &mut WriterContext<'_>) -> Result<Option<Box<dyn PrimWriter>>>,
>;

/// Writer factories keyed by source node type.
#[derive(Default)]
pub struct WriterRegistry {
    factories: HashMap<String, WriterFactory>,
}

impl WriterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in transform and shape writers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("transform", |node, path, ctx| {
            Ok(Some(Box::new(XformWriter::new(node, path, ctx)?) as Box<dyn PrimWriter>))
        });
        for (node_type, schema) in [
            ("mesh", "Mesh"),
            ("camera", "Camera"),
            ("pointLight", "SphereLight"),
            ("spotLight", "SphereLight"),
            ("directionalLight", "DistantLight"),
            ("areaLight", "RectLight"),
        ] {
            registry.register(node_type, move |node, path, ctx| {
                Ok(Some(Box::new(ShapeWriter::new(node, path, schema, ctx)?) as Box<dyn PrimWriter>))
            });
        }
        for node_type in ["stage", "proxyShape"] {
            registry.register(node_type, |node, path, ctx| {
                if !ctx.args.export_stages_as_refs {
                    return Ok(None);
                }
                Ok(Some(Box::new(ShapeWriter::new_stage_reference(node, path, ctx)?) as Box<dyn PrimWriter>))
            });
        }
        registry
    }

    /// Register (or replace) the factory for a node type.
    pub fn register<F>(&mut self, node_type: &str, factory: F)
    where
        F: Fn(&NodePath, &SdfPath, &mut WriterContext<'_>) -> Result<Option<Box<dyn PrimWriter>>>
            + 'static,
    {
        self.factories.insert(node_type.to_string(), Box::new(factory));
    }

    /// Check for a factory.
    pub fn has_writer(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Create a writer for `node`, dispatching on its type.
    pub fn create(
        &self,
        node: &NodePath,
        usd_path: &SdfPath,
        ctx: &mut WriterContext<'_>,
    ) -> Result<Option<Box<dyn PrimWriter>>> {
        let Some(node_type) = ctx.scene.node_type(node) else {
            return Ok(None);
        };
        match self.factories.get(&node_type) {
            Some(factory) => factory(node, usd_path, ctx),
            None => Ok(None),
        }
    }
}
