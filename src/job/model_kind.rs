//! Model kind assignment over the written hierarchy.
//!
//! Root prims holding geometry become components. Root prims holding
//! references to other assets become assemblies, with every prim between
//! the root and a reference marked as a group so the model hierarchy stays
//! contiguous.

use tracing::{debug, warn};

use crate::sdf::{kind, SdfPath, Stage};
use crate::util::{Error, Result};
use crate::writer::PrimWriter;

#[derive(Debug, Default)]
pub struct ModelKindProcessor {
    root_kind: String,
    disabled: bool,
    roots: Vec<SdfPath>,
    gprim_paths: Vec<SdfPath>,
    reference_paths: Vec<SdfPath>,
}

impl ModelKindProcessor {
    /// `root_kind` is forced onto root prims without an authored kind.
    pub fn new(root_kind: &str, disabled: bool) -> Self {
        Self {
            root_kind: root_kind.to_string(),
            disabled,
            ..Self::default()
        }
    }

    /// Record what a freshly written prim contains.
    pub fn on_write_prim(&mut self, path: &SdfPath, writer: &dyn PrimWriter) {
        if let Some(root) = path.root_prefix() {
            if !self.roots.contains(&root) {
                self.roots.push(root);
            }
        }
        if writer.exports_gprims() {
            self.gprim_paths.push(path.clone());
        }
        if writer.exports_references() {
            self.reference_paths.push(path.clone());
        }
    }

    /// Author kinds on every recorded root prim.
    pub fn make_model_hierarchy(&self, stage: &mut Stage) -> Result<()> {
        if self.disabled {
            return Ok(());
        }
        if !self.root_kind.is_empty() && !kind::is_known(&self.root_kind) {
            return Err(Error::ModelHierarchy(format!(
                "Unknown kind '{}' for root prims",
                self.root_kind
            )));
        }

        for root in &self.roots {
            if !stage.has_prim(root) {
                continue;
            }
            let gprims: Vec<&SdfPath> = self.gprim_paths.iter().filter(|p| p.has_prefix(root)).collect();
            let refs: Vec<&SdfPath> = self
                .reference_paths
                .iter()
                .filter(|p| p.has_prefix(root))
                .collect();

            let authored = stage.kind(root).filter(|k| !k.is_empty());
            let root_kind = match authored {
                Some(k) => k,
                None if !self.root_kind.is_empty() => {
                    stage.set_kind(root, &self.root_kind)?;
                    self.root_kind.clone()
                }
                None if !refs.is_empty() && gprims.is_empty() => {
                    stage.set_kind(root, kind::ASSEMBLY)?;
                    kind::ASSEMBLY.to_string()
                }
                None if !gprims.is_empty() && refs.is_empty() => {
                    stage.set_kind(root, kind::COMPONENT)?;
                    kind::COMPONENT.to_string()
                }
                None => {
                    if !gprims.is_empty() {
                        warn!(
                            "<{}> contains both geometry and references; no kind authored",
                            root
                        );
                    }
                    continue;
                }
            };
            debug!("Root prim {} has kind '{}'", root, root_kind);

            if kind::is_a(&root_kind, kind::COMPONENT) && !refs.is_empty() {
                return Err(Error::ModelHierarchy(format!(
                    "<{}> has kind '{}' but contains exported references: {}",
                    root,
                    root_kind,
                    join(&refs)
                )));
            }
            if kind::is_a(&root_kind, kind::ASSEMBLY) && !gprims.is_empty() {
                return Err(Error::ModelHierarchy(format!(
                    "<{}> has kind '{}' which cannot contain gprims: {}",
                    root,
                    root_kind,
                    join(&gprims)
                )));
            }
            if kind::is_a(&root_kind, kind::GROUP) {
                self.author_groups(stage, root, &refs)?;
            }
        }
        Ok(())
    }

    /// Mark prims strictly between `root` and each reference as groups.
    fn author_groups(&self, stage: &mut Stage, root: &SdfPath, refs: &[&SdfPath]) -> Result<()> {
        for reference in refs {
            let mut cur = reference.parent();
            while cur != *root && cur.has_prefix(root) {
                if stage.kind(&cur).is_none() {
                    stage.set_kind(&cur, kind::GROUP)?;
                }
                cur = cur.parent();
            }
        }
        Ok(())
    }
}

fn join(paths: &[&SdfPath]) -> String {
    paths.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodePath;
    use crate::sdf::TimeCode;
    use crate::writer::WriterContext;

    struct Fake {
        node: NodePath,
        path: SdfPath,
        gprims: bool,
        refs: bool,
    }

    impl PrimWriter for Fake {
        fn node(&self) -> &NodePath {
            &self.node
        }
        fn usd_path(&self) -> &SdfPath {
            &self.path
        }
        fn write(&mut self, _time: TimeCode, _ctx: &mut WriterContext<'_>) -> Result<()> {
            Ok(())
        }
        fn exports_gprims(&self) -> bool {
            self.gprims
        }
        fn exports_references(&self) -> bool {
            self.refs
        }
    }

    fn record(proc: &mut ModelKindProcessor, stage: &mut Stage, path: &str, gprims: bool, refs: bool) {
        let path = SdfPath::new(path).unwrap();
        stage.define_prim(&path, "Xform").unwrap();
        let writer = Fake {
            node: NodePath::new("|x"),
            path: path.clone(),
            gprims,
            refs,
        };
        proc.on_write_prim(&path, &writer);
    }

    fn kind_of(stage: &Stage, path: &str) -> Option<String> {
        stage.kind(&SdfPath::new(path).unwrap())
    }

    #[test]
    fn test_component_and_assembly() {
        let mut stage = Stage::create_in_memory();
        let mut proc = ModelKindProcessor::new("", false);
        record(&mut proc, &mut stage, "/chair", false, false);
        record(&mut proc, &mut stage, "/chair/seat", true, false);
        record(&mut proc, &mut stage, "/set", false, false);
        record(&mut proc, &mut stage, "/set/props/table", false, true);
        proc.make_model_hierarchy(&mut stage).unwrap();

        assert_eq!(kind_of(&stage, "/chair").as_deref(), Some(kind::COMPONENT));
        assert_eq!(kind_of(&stage, "/set").as_deref(), Some(kind::ASSEMBLY));
        assert_eq!(kind_of(&stage, "/set/props").as_deref(), Some(kind::GROUP));
        assert_eq!(kind_of(&stage, "/set/props/table"), None);
    }

    #[test]
    fn test_invalid_root_kind() {
        let mut stage = Stage::create_in_memory();
        let mut proc = ModelKindProcessor::new("assembly", false);
        record(&mut proc, &mut stage, "/chair", true, false);
        assert!(matches!(
            proc.make_model_hierarchy(&mut stage),
            Err(Error::ModelHierarchy(_))
        ));

        let proc = ModelKindProcessor::new("widget", false);
        assert!(proc.make_model_hierarchy(&mut stage).is_err());

        let proc = ModelKindProcessor::new("widget", true);
        assert!(proc.make_model_hierarchy(&mut stage).is_ok());
    }
}
