//! Prim writers: per-node serializers driven by the export job.
//!
//! The job asks the [`WriterRegistry`] for a writer for every node it
//! visits. A writer defines its prim when created, writes default values
//! right after, then writes again once per exported frame.

mod registry;
mod shape;
mod xform;

pub use registry::{WriterFactory, WriterRegistry};
pub use shape::ShapeWriter;
pub use xform::XformWriter;

use crate::job::JobExportArgs;
use crate::scene::{NodePath, SceneGraph};
use crate::sdf::{SdfPath, Stage, TimeCode};
use crate::util::Result;

/// What a writer can reach while writing.
pub struct WriterContext<'a> {
    pub stage: &'a mut Stage,
    pub scene: &'a dyn SceneGraph,
    pub args: &'a JobExportArgs,
}

/// Serializer for one source node.
pub trait PrimWriter {
    /// Source node.
    fn node(&self) -> &NodePath;

    /// Prim this writer authors.
    fn usd_path(&self) -> &SdfPath;

    /// Author values at `time`. `TimeCode::Default` is called exactly once,
    /// before any time sample.
    fn write(&mut self, time: TimeCode, ctx: &mut WriterContext<'_>) -> Result<()>;

    /// Skip the node's children during traversal.
    fn should_prune_children(&self) -> bool {
        false
    }

    /// Node to prim mapping this writer contributes.
    fn path_mapping(&self) -> Vec<(NodePath, SdfPath)> {
        vec![(self.node().clone(), self.usd_path().clone())]
    }

    /// Whether the prim is renderable geometry.
    fn exports_gprims(&self) -> bool {
        false
    }

    /// Whether the prim references other assets.
    fn exports_references(&self) -> bool {
        false
    }

    /// Called once after all frames are written.
    fn post_export(&mut self, _ctx: &mut WriterContext<'_>) {}
}
