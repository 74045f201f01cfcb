//! # usd-export
//!
//! Scene export orchestration: walks a source scene graph, drives pluggable
//! prim writers and chasers, and produces a scene-description layer
//! (`.usda`, `.usd`/`.usdc` or a `.usdz` package).
//!
//! ## Modules
//!
//! - [`util`] - Errors and name sanitizing
//! - [`sdf`] - Output layers, paths, values, composition and packaging
//! - [`scene`] - Source scene contract and an in-memory host
//! - [`writer`] - Prim writer contract and built-in writers
//! - [`chaser`] - Export chaser contract and registry
//! - [`job`] - The export job: traversal, frames, variants, finalization
//!
//! ## Example
//!
//! ```ignore
//! use usd_export::{JobExportArgs, MemoryScene, WriteJob};
//!
//! let scene = MemoryScene::load("scene.json")?;
//! let args = JobExportArgs::default().with_time_samples(JobExportArgs::frame_range(1.0, 24.0, 1.0));
//! let mut job = WriteJob::new(args, &scene);
//! job.write("shot.usda", false)?;
//!
//! for (node, prim) in job.dag_to_usd_path_map() {
//!     println!("{} -> {}", node, prim);
//! }
//! ```

pub mod util;
pub mod sdf;
pub mod scene;
pub mod writer;
pub mod chaser;
pub mod job;

// Re-export commonly used types
pub use util::{Error, Result};
pub use sdf::{Layer, SdfPath, Stage, TimeCode, Value};
pub use scene::{MemoryScene, NodePath, SceneGraph};
pub use writer::{PrimWriter, WriterContext, WriterRegistry};
pub use chaser::{ChaserArgs, ChaserContext, ChaserRegistry, ExportChaser};
pub use job::{ExportCallbacks, JobExportArgs, WriteJob};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result};
    pub use crate::sdf::{Layer, SdfPath, Stage, TimeCode, Value};
    pub use crate::scene::{MemoryScene, NodeCategory, NodePath, SceneGraph};
    pub use crate::writer::{PrimWriter, WriterContext, WriterRegistry};
    pub use crate::chaser::{ChaserArgs, ChaserContext, ChaserRegistry, ExportChaser};
    pub use crate::job::{
        Compatibility, ExportCallbacks, JobExportArgs, RenderLayerMode, RootPrimType, UnitsOption,
        UpAxisOption, WriteJob,
    };
}
