//! The export job.
//!
//! [`WriteJob::write`] runs the whole export: traversal and default values,
//! one pass per time sample, then finalization (variants, default prim,
//! chaser hooks, pruning, save and packaging).
//!
//! # Example
//!
//! ```ignore
//! use usd_export::{JobExportArgs, MemoryScene, WriteJob};
//!
//! let scene = MemoryScene::load("scene.json")?;
//! let args = JobExportArgs::default().with_time_samples(vec![1.0, 2.0, 3.0]);
//! let mut job = WriteJob::new(args, &scene);
//! job.write("out.usda", false)?;
//! ```

mod args;
mod axis_units;
mod callbacks;
mod context;
mod finish;
mod frame;
mod model_kind;
mod path_mapper;
mod prune;
mod traversal;
mod variants;

pub use args::{
    Compatibility, JobExportArgs, RenderLayerMode, RootPrimType, UnitsOption, UpAxisOption,
    BASE_MODEL_ROOT, DEFAULT_PRIM_NONE, MODELING_VARIANT_SET,
};
pub use axis_units::AxisUnitsChanger;
pub use callbacks::{ExportCallbacks, NoCallbacks};
pub use context::JobContext;
pub use model_kind::ModelKindProcessor;
pub use path_mapper::PathMapper;
pub use prune::{is_empty_prim, prune_empty_prims};
pub use variants::{variant_root_path, write_variants};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::error;

use crate::chaser::{ChaserRegistry, ExportChaser};
use crate::scene::{NodePath, SceneGraph};
use crate::sdf::{Layer, SdfPath};
use crate::util::Result;
use crate::writer::WriterRegistry;

/// A chaser instance and the name it was created under.
struct NamedChaser {
    name: String,
    chaser: Box<dyn ExportChaser>,
}

/// One export of a scene to a layer.
pub struct WriteJob<'a> {
    ctx: JobContext<'a>,
    chaser_registry: ChaserRegistry,
    callbacks: Box<dyn ExportCallbacks + 'a>,
    chasers: Vec<NamedChaser>,
    path_mapper: PathMapper,
    model_kind: ModelKindProcessor,
    dag_to_usd: BTreeMap<NodePath, SdfPath>,
    extra_prim_paths: Vec<SdfPath>,
    axis_units: Option<AxisUnitsChanger<'a>>,
    saved_render_layer: Option<String>,
    /// Render layers turned into variants; empty unless exporting modeling variants.
    render_layers: Vec<String>,
    file_name: PathBuf,
    package_name: Option<PathBuf>,
    frames_written: Vec<f64>,
    package_error: Option<String>,
    written_layer: Option<Layer>,
}

impl<'a> WriteJob<'a> {
    /// Job with the built-in writers and chasers and no callbacks.
    pub fn new(args: JobExportArgs, scene: &'a dyn SceneGraph) -> Self {
        let path_mapper = PathMapper::new(args.strip_namespaces, args.merge_transform_and_shape);
        let model_kind = ModelKindProcessor::new(&args.root_kind, args.disable_model_kind_processor);
        Self {
            ctx: JobContext::new(args, scene, WriterRegistry::with_builtins()),
            chaser_registry: ChaserRegistry::with_builtins(),
            callbacks: Box::new(NoCallbacks),
            chasers: Vec::new(),
            path_mapper,
            model_kind,
            dag_to_usd: BTreeMap::new(),
            extra_prim_paths: Vec::new(),
            axis_units: None,
            saved_render_layer: None,
            render_layers: Vec::new(),
            file_name: PathBuf::new(),
            package_name: None,
            frames_written: Vec::new(),
            package_error: None,
            written_layer: None,
        }
    }

    pub fn with_writer_registry(mut self, registry: WriterRegistry) -> Self {
        self.ctx.set_writer_registry(registry);
        self
    }

    pub fn with_chaser_registry(mut self, registry: ChaserRegistry) -> Self {
        self.chaser_registry = registry;
        self
    }

    pub fn with_callbacks(mut self, callbacks: impl ExportCallbacks + 'a) -> Self {
        self.callbacks = Box::new(callbacks);
        self
    }

    /// Arguments as resolved by the job (default prim, model root override).
    pub fn args(&self) -> &JobExportArgs {
        &self.ctx.args
    }

    /// Export to `path`. Append mode reopens an existing layer.
    ///
    /// On failure the host's render layer, time and axis correction are
    /// restored; files already written are left in place.
    pub fn write(&mut self, path: impl AsRef<Path>, append: bool) -> Result<()> {
        let result = self.run(path.as_ref(), append);
        if let Err(e) = &result {
            error!("Export to {} failed: {}", path.as_ref().display(), e);
            self.restore_host_state();
        }
        result
    }

    fn run(&mut self, path: &Path, append: bool) -> Result<()> {
        self.begin_writing(path, append)?;
        self.write_frames()?;
        self.finish_writing()
    }

    /// Prim written for a node, if any.
    pub fn map_node_to_usd_path(&self, node: &NodePath) -> Option<&SdfPath> {
        self.dag_to_usd.get(node)
    }

    /// Every written node and its prim.
    pub fn dag_to_usd_path_map(&self) -> &BTreeMap<NodePath, SdfPath> {
        &self.dag_to_usd
    }

    /// Prims reported by chasers. Valid once the export has finished.
    pub fn extra_prim_paths(&self) -> &[SdfPath] {
        &self.extra_prim_paths
    }

    /// Time samples actually written.
    pub fn frames_written(&self) -> &[f64] {
        &self.frames_written
    }

    /// Layer file the stage was written to (the temporary file for packages).
    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    /// Package path, for `.usdz` destinations.
    pub fn package_name(&self) -> Option<&Path> {
        self.package_name.as_deref()
    }

    /// Packaging failure, if packaging was attempted and failed.
    pub fn package_error(&self) -> Option<&str> {
        self.package_error.as_deref()
    }

    /// The layer as it was when the export finished.
    pub fn layer(&self) -> Option<&Layer> {
        self.written_layer.as_ref()
    }

    fn restore_host_state(&mut self) {
        // Dropping the changer restores the root correction.
        self.axis_units = None;
        if let Some(saved) = self.saved_render_layer.take() {
            let scene = self.ctx.scene;
            if scene.current_render_layer() != saved {
                scene.set_current_render_layer(&saved);
            }
        }
    }
}
