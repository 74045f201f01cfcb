//! Export chasers: post-processors run after the primary writers.
//!
//! A chaser is created by name from the [`ChaserRegistry`] once the scene
//! has been traversed. It then gets a default-time hook, one hook per
//! exported frame and a final hook, each able to abort the export by
//! returning an error.

mod metadata;

pub use metadata::MetadataChaser;

use std::collections::{BTreeMap, HashMap};

use crate::job::JobExportArgs;
use crate::scene::{NodePath, SceneGraph};
use crate::sdf::{SdfPath, Stage};
use crate::util::{Error, Result};

/// Key/value arguments given to one chaser.
pub type ChaserArgs = BTreeMap<String, String>;

/// What a chaser can reach while running.
pub struct ChaserContext<'a> {
    pub stage: &'a mut Stage,
    pub scene: &'a dyn SceneGraph,
    pub args: &'a JobExportArgs,
    /// Every source node written so far and its prim.
    pub dag_to_usd: &'a BTreeMap<NodePath, SdfPath>,
}

/// Post-processor hooked into the export lifecycle.
pub trait ExportChaser {
    /// Runs once after traversal, before any frame.
    fn export_default(&mut self, _ctx: &mut ChaserContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Runs once per exported frame, after the writers.
    fn export_frame(&mut self, _time: f64, _ctx: &mut ChaserContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Runs once when the export is finishing.
    fn post_export(&mut self, _ctx: &mut ChaserContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Prims created by this chaser that the caller may want to know about.
    fn extra_prim_paths(&self) -> &[SdfPath] {
        &[]
    }
}

/// Creates a chaser from its arguments.
pub type ChaserFactory =
    Box<dyn Fn(&ChaserArgs, &ChaserContext<'_>) -> Result<Box<dyn ExportChaser>>>;

/// Chaser factories keyed by name.
#[derive(Default)]
pub struct ChaserRegistry {
    factories: HashMap<String, ChaserFactory>,
}

impl ChaserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in chasers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(MetadataChaser::NAME, |args, _ctx| {
            Ok(Box::new(MetadataChaser::new(args)) as Box<dyn ExportChaser>)
        });
        registry
    }

    /// Register (or replace) a chaser factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&ChaserArgs, &ChaserContext<'_>) -> Result<Box<dyn ExportChaser>> + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Check for a factory.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate a chaser. Unknown names are an error.
    pub fn create(
        &self,
        name: &str,
        args: &ChaserArgs,
        ctx: &ChaserContext<'_>,
    ) -> Result<Box<dyn ExportChaser>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::other(format!("no chaser registered as '{}'", name)))?;
        factory(args, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;

    struct Counter(usize);

    impl ExportChaser for Counter {
        fn export_frame(&mut self, _time: f64, _ctx: &mut ChaserContext<'_>) -> Result<()> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn test_registry() {
        let mut registry = ChaserRegistry::with_builtins();
        registry.register("counter", |_, _| Ok(Box::new(Counter(0)) as Box<dyn ExportChaser>));
        assert!(registry.contains("counter"));
        assert_eq!(registry.names(), vec!["counter", MetadataChaser::NAME]);

        let scene = MemoryScene::new();
        let args = JobExportArgs::default();
        let mapping = BTreeMap::new();
        let mut stage = Stage::create_in_memory();
        let mut ctx = ChaserContext {
            stage: &mut stage,
            scene: &scene,
            args: &args,
            dag_to_usd: &mapping,
        };
        let mut chaser = registry.create("counter", &ChaserArgs::new(), &ctx).unwrap();
        chaser.export_default(&mut ctx).unwrap();
        chaser.export_frame(1.0, &mut ctx).unwrap();
        assert!(chaser.extra_prim_paths().is_empty());
        assert!(registry.create("missing", &ChaserArgs::new(), &ctx).is_err());
    }
}
