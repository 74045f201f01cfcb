//! Source scene graph: the host side of an export.
//!
//! The exporter only talks to the host through [`SceneGraph`].
//! [`MemoryScene`] is a complete in-memory host used by the CLI and tests.

mod graph;
mod memory;
mod node;
mod units;

pub use graph::SceneGraph;
pub use memory::{MemoryScene, DEFAULT_RENDER_LAYER};
pub use node::{NodeCategory, NodePath, NODE_SEPARATOR};
pub use units::{Axis, DistanceUnit};
