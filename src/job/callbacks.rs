//! Hooks a host can plug into an export.

use std::collections::BTreeMap;

use crate::scene::NodePath;
use crate::sdf::{SdfPath, Stage};
use crate::util::Result;

/// Host hooks run at fixed points of the export.
///
/// All methods have no-op defaults.
pub trait ExportCallbacks {
    /// Export materials once every node has been written.
    fn export_shading(&mut self, _stage: &mut Stage, _dag_to_usd: &BTreeMap<NodePath, SdfPath>) {}

    /// Instancing and skeleton fixups. An error aborts the export.
    fn post_process(&mut self, _stage: &mut Stage) -> Result<()> {
        Ok(())
    }

    /// Called after each frame has been written.
    fn per_frame(&mut self, _time: f64) {}

    /// Called once after writers and chasers have finished.
    fn post_export(&mut self, _stage: &mut Stage) {}

    /// Polled after each frame; `true` ends the frame loop early.
    fn is_interrupt_requested(&self) -> bool {
        false
    }
}

/// Callbacks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCallbacks;

impl ExportCallbacks for NoCallbacks {}
