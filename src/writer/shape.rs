//! Shape writer: meshes, cameras, lights and stage proxies.

use super::xform::{INVISIBLE, VISIBILITY};
use super::{PrimWriter, WriterContext};
use crate::scene::NodePath;
use crate::sdf::{schema, Reference, SdfPath, TimeCode, Value};
use crate::util::Result;

/// Stage proxy attribute naming the referenced file.
pub const FILE_PATH_ATTR: &str = "filePath";
/// Stage proxy attribute naming the referenced prim.
pub const PRIM_PATH_ATTR: &str = "primPath";

/// Writes a shape node's attributes onto a typed prim.
///
/// Static attributes are authored as defaults. Animated attributes are
/// authored per frame, or as defaults when the export has no frames.
pub struct ShapeWriter {
    node: NodePath,
    usd_path: SdfPath,
    type_name: String,
    proxy: bool,
    references: bool,
}

impl ShapeWriter {
    /// Define a prim of `type_name` at `usd_path`.
    pub fn new(
        node: &NodePath,
        usd_path: &SdfPath,
        type_name: &str,
        ctx: &mut WriterContext<'_>,
    ) -> Result<Self> {
        ctx.stage.define_prim(usd_path, type_name)?;
        Ok(Self {
            node: node.clone(),
            usd_path: usd_path.clone(),
            type_name: type_name.to_string(),
            proxy: false,
            references: false,
        })
    }

    /// Define an `Xform` referencing the file a stage proxy node points at.
    pub fn new_stage_reference(
        node: &NodePath,
        usd_path: &SdfPath,
        ctx: &mut WriterContext<'_>,
    ) -> Result<Self> {
        ctx.stage.define_prim(usd_path, "Xform")?;
        let asset = ctx
            .scene
            .attribute(node, FILE_PATH_ATTR, TimeCode::Default)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let references = !asset.is_empty();
        if references {
            let prim_path = match ctx
                .scene
                .attribute(node, PRIM_PATH_ATTR, TimeCode::Default)
                .and_then(|v| v.as_str().map(str::to_string))
            {
                Some(p) if !p.is_empty() => SdfPath::new(&p)?,
                _ => SdfPath::empty(),
            };
            let reference = Reference {
                asset_path: asset,
                prim_path,
            };
            ctx.stage.add_reference(usd_path, reference, false)?;
        }
        Ok(Self {
            node: node.clone(),
            usd_path: usd_path.clone(),
            type_name: "Xform".to_string(),
            proxy: true,
            references,
        })
    }
}

impl PrimWriter for ShapeWriter {
    fn node(&self) -> &NodePath {
        &self.node
    }

    fn usd_path(&self) -> &SdfPath {
        &self.usd_path
    }

    fn write(&mut self, time: TimeCode, ctx: &mut WriterContext<'_>) -> Result<()> {
        if self.proxy {
            return Ok(());
        }
        let no_frames = ctx.args.time_samples.is_empty();
        for name in ctx.scene.attribute_names(&self.node) {
            let animated = ctx.scene.is_attribute_animated(&self.node, &name);
            let author = match time {
                TimeCode::Default => !animated || no_frames,
                TimeCode::Time(_) => animated,
            };
            if !author {
                continue;
            }
            if let Some(value) = ctx.scene.attribute(&self.node, &name, time) {
                ctx.stage.set_attribute(&self.usd_path, &name, value, time)?;
            }
        }
        if time.is_default() && !ctx.scene.is_visible(&self.node) {
            ctx.stage.set_attribute(
                &self.usd_path,
                VISIBILITY,
                Value::Token(INVISIBLE.to_string()),
                TimeCode::Default,
            )?;
        }
        Ok(())
    }

    fn should_prune_children(&self) -> bool {
        self.proxy
    }

    fn exports_gprims(&self) -> bool {
        schema::is_gprim(&self.type_name)
    }

    fn exports_references(&self) -> bool {
        self.references
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobExportArgs;
    use crate::scene::MemoryScene;
    use crate::sdf::Stage;

    #[test]
    fn test_static_and_sampled_attributes() {
        let mut scene = MemoryScene::new();
        let mesh = scene.add_node("|cube|cubeShape", "mesh");
        scene.set_attribute(&mesh, "faceVertexCounts", Value::IntArray(vec![4; 6]));
        scene.set_attribute_sample(&mesh, "extent", 1.0, Value::DoubleArray(vec![1.0]));
        scene.set_attribute_sample(&mesh, "extent", 2.0, Value::DoubleArray(vec![2.0]));

        let args = JobExportArgs::default().with_time_samples(vec![1.0, 2.0]);
        let mut stage = Stage::create_in_memory();
        let path = SdfPath::new("/cube").unwrap();
        let mut ctx = WriterContext {
            stage: &mut stage,
            scene: &scene,
            args: &args,
        };
        let mut writer = ShapeWriter::new(&mesh, &path, "Mesh", &mut ctx).unwrap();
        for time in [TimeCode::Default, TimeCode::Time(1.0), TimeCode::Time(2.0)] {
            writer.write(time, &mut ctx).unwrap();
        }
        assert!(writer.exports_gprims());
        assert!(!writer.should_prune_children());

        let counts = stage.attribute(&path, "faceVertexCounts").unwrap();
        assert!(!counts.is_animated());
        let extent = stage.attribute(&path, "extent").unwrap();
        assert_eq!(extent.time_samples.len(), 2);
        assert!(extent.default.is_none());
    }

    #[test]
    fn test_stage_proxy_reference() {
        let mut scene = MemoryScene::new();
        let proxy = scene.add_node("|set|setShape", "stage");
        scene.set_attribute(&proxy, FILE_PATH_ATTR, Value::Asset("set.usda".into()));

        let args = JobExportArgs::default();
        let mut stage = Stage::create_in_memory();
        let path = SdfPath::new("/set").unwrap();
        let mut ctx = WriterContext {
            stage: &mut stage,
            scene: &scene,
            args: &args,
        };
        let writer = ShapeWriter::new_stage_reference(&proxy, &path, &mut ctx).unwrap();
        assert!(writer.exports_references());
        assert!(writer.should_prune_children());
        assert!(!writer.exports_gprims());
        assert!(stage.prim(&path).unwrap().has_authored_references);
    }
}
