//! Transform writer.

use glam::DMat4;

use super::{PrimWriter, WriterContext};
use crate::scene::NodePath;
use crate::sdf::{SdfPath, TimeCode, Value};
use crate::util::Result;

/// Attribute holding the full local matrix.
pub const TRANSFORM_OP: &str = "xformOp:transform";
/// Ordered list of transform ops.
pub const XFORM_OP_ORDER: &str = "xformOpOrder";
pub const VISIBILITY: &str = "visibility";
pub const INVISIBLE: &str = "invisible";

/// Writes a transform node as an `Xform` prim with a single matrix op.
pub struct XformWriter {
    node: NodePath,
    usd_path: SdfPath,
    animated: bool,
}

impl XformWriter {
    /// Define the prim at `usd_path`.
    pub fn new(node: &NodePath, usd_path: &SdfPath, ctx: &mut WriterContext<'_>) -> Result<Self> {
        ctx.stage.define_prim(usd_path, "Xform")?;
        Ok(Self {
            node: node.clone(),
            usd_path: usd_path.clone(),
            animated: ctx.scene.is_transform_animated(node),
        })
    }

    fn write_matrix(&self, matrix: DMat4, time: TimeCode, ctx: &mut WriterContext<'_>) -> Result<()> {
        ctx.stage
            .set_attribute(&self.usd_path, TRANSFORM_OP, Value::Matrix4d(matrix), time)
    }
}

impl PrimWriter for XformWriter {
    fn node(&self) -> &NodePath {
        &self.node
    }

    fn usd_path(&self) -> &SdfPath {
        &self.usd_path
    }

    fn write(&mut self, time: TimeCode, ctx: &mut WriterContext<'_>) -> Result<()> {
        let matrix = ctx.scene.export_transform(&self.node, time);
        match time {
            TimeCode::Default => {
                // Identity static transforms author no ops at all.
                if self.animated || matrix != DMat4::IDENTITY {
                    self.write_matrix(matrix, time, ctx)?;
                    ctx.stage.set_attribute(
                        &self.usd_path,
                        XFORM_OP_ORDER,
                        Value::TokenArray(vec![TRANSFORM_OP.to_string()]),
                        TimeCode::Default,
                    )?;
                }
                if !ctx.scene.is_visible(&self.node) {
                    ctx.stage.set_attribute(
                        &self.usd_path,
                        VISIBILITY,
                        Value::Token(INVISIBLE.to_string()),
                        TimeCode::Default,
                    )?;
                }
                Ok(())
            }
            TimeCode::Time(_) if self.animated => self.write_matrix(matrix, time, ctx),
            TimeCode::Time(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobExportArgs;
    use crate::scene::MemoryScene;
    use crate::sdf::Stage;
    use glam::DVec3;

    #[test]
    fn test_static_and_animated() {
        let mut scene = MemoryScene::new();
        let still = scene.add_node("|still", "transform");
        let moving = scene.add_node("|moving", "transform");
        scene.set_transform_sample(&moving, 1.0, DMat4::from_translation(DVec3::X));
        scene.set_transform_sample(&moving, 2.0, DMat4::from_translation(DVec3::Y));
        scene.set_visible(&still, false);

        let args = JobExportArgs::default();
        let mut stage = Stage::create_in_memory();
        let mut ctx = WriterContext {
            stage: &mut stage,
            scene: &scene,
            args: &args,
        };

        let still_path = SdfPath::new("/still").unwrap();
        let moving_path = SdfPath::new("/moving").unwrap();
        let mut a = XformWriter::new(&still, &still_path, &mut ctx).unwrap();
        let mut b = XformWriter::new(&moving, &moving_path, &mut ctx).unwrap();
        for time in [TimeCode::Default, TimeCode::Time(1.0), TimeCode::Time(2.0)] {
            a.write(time, &mut ctx).unwrap();
            b.write(time, &mut ctx).unwrap();
        }

        assert!(stage.attribute(&still_path, TRANSFORM_OP).is_none());
        assert_eq!(
            stage.attribute_value(&still_path, VISIBILITY, TimeCode::Default),
            Some(Value::Token(INVISIBLE.into()))
        );
        let op = stage.attribute(&moving_path, TRANSFORM_OP).unwrap();
        assert!(op.is_animated());
        assert_eq!(
            op.get(TimeCode::Time(2.0)).and_then(Value::as_matrix),
            Some(DMat4::from_translation(DVec3::Y))
        );
        assert_eq!(stage.prim(&moving_path).unwrap().type_name, "Xform");
    }
}
