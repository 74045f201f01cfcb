//! Built-in `metadata` chaser.
//!
//! Stamps its arguments as custom data on every top-level prim that was
//! written. With a `prim` argument it also defines that prim and records
//! the exported frames on it as a `frames` attribute.

use std::collections::BTreeSet;

use super::{ChaserArgs, ChaserContext, ExportChaser};
use crate::sdf::{SdfPath, TimeCode, Value};
use crate::util::Result;

/// Argument naming the info prim.
pub const PRIM_ARG: &str = "prim";

pub struct MetadataChaser {
    entries: Vec<(String, String)>,
    info_prim: Option<String>,
    frames: Vec<f64>,
    extra: Vec<SdfPath>,
}

impl MetadataChaser {
    pub const NAME: &'static str = "metadata";

    pub fn new(args: &ChaserArgs) -> Self {
        Self {
            entries: args
                .iter()
                .filter(|(k, _)| k.as_str() != PRIM_ARG)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            info_prim: args.get(PRIM_ARG).filter(|p| !p.is_empty()).cloned(),
            frames: Vec::new(),
            extra: Vec::new(),
        }
    }
}

impl ExportChaser for MetadataChaser {
    fn export_frame(&mut self, time: f64, _ctx: &mut ChaserContext<'_>) -> Result<()> {
        self.frames.push(time);
        Ok(())
    }

    fn post_export(&mut self, ctx: &mut ChaserContext<'_>) -> Result<()> {
        let roots: BTreeSet<SdfPath> = ctx
            .dag_to_usd
            .values()
            .filter_map(SdfPath::root_prefix)
            .collect();
        for root in &roots {
            if !ctx.stage.has_prim(root) {
                continue;
            }
            for (key, value) in &self.entries {
                ctx.stage.set_metadata(root, key, value)?;
            }
        }

        if let Some(name) = &self.info_prim {
            let path = SdfPath::absolute_root().append_child(name)?;
            ctx.stage.define_prim(&path, "")?;
            ctx.stage.set_attribute(
                &path,
                "frames",
                Value::DoubleArray(self.frames.clone()),
                TimeCode::Default,
            )?;
            self.extra.push(path);
        }
        Ok(())
    }

    fn extra_prim_paths(&self) -> &[SdfPath] {
        &self.extra
    }
}
