//! Up axis and unit conversion for the duration of an export.

use glam::{DMat4, DVec3};
use tracing::{info, warn};

use super::args::{UnitsOption, UpAxisOption};
use crate::scene::{Axis, SceneGraph};
use crate::sdf::Stage;

/// Authors `upAxis`/`metersPerUnit` and applies a root correction to the
/// scene so top-level transforms come out in the requested axis and unit.
///
/// The previous correction is restored by [`AxisUnitsChanger::restore`] or on drop.
pub struct AxisUnitsChanger<'a> {
    scene: &'a dyn SceneGraph,
    previous: Option<DMat4>,
}

impl<'a> AxisUnitsChanger<'a> {
    pub fn new(
        stage: &mut Stage,
        scene: &'a dyn SceneGraph,
        up_axis: UpAxisOption,
        unit: UnitsOption,
    ) -> Self {
        let mut correction = DMat4::IDENTITY;

        let target_axis = match up_axis {
            UpAxisOption::None => None,
            UpAxisOption::SourcePrefs => Some(scene.up_axis()),
            UpAxisOption::Y => Some(Axis::Y),
            UpAxisOption::Z => Some(Axis::Z),
            UpAxisOption::X => {
                warn!("Up axis X is not supported; writing Y up");
                Some(Axis::Y)
            }
        };
        if let Some(axis) = target_axis {
            stage.layer_mut().metadata.up_axis = Some(axis.token().to_string());
            correction = rotation_between(scene.up_axis(), axis) * correction;
        }

        let target_unit = match unit {
            UnitsOption::None => None,
            UnitsOption::SourcePrefs => Some(scene.ui_unit()),
            UnitsOption::Unit(u) => Some(u),
        };
        if let Some(unit) = target_unit {
            stage.layer_mut().metadata.meters_per_unit = Some(unit.meters_per_unit());
            let internal = scene.internal_unit();
            if internal != unit {
                let factor = internal.meters_per_unit() / unit.meters_per_unit();
                info!("Scaling scene by {} ({} to {})", factor, internal, unit);
                correction = DMat4::from_scale(DVec3::splat(factor)) * correction;
            }
        }

        let previous = if correction != DMat4::IDENTITY {
            let previous = scene.root_correction();
            scene.set_root_correction(correction * previous);
            Some(previous)
        } else {
            None
        };
        Self { scene, previous }
    }

    /// Whether the scene is currently corrected.
    pub fn is_active(&self) -> bool {
        self.previous.is_some()
    }

    /// Put the scene back the way it was.
    pub fn restore(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.scene.set_root_correction(previous);
        }
    }
}

impl Drop for AxisUnitsChanger<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Rotation taking `from`-up data to `to`-up.
fn rotation_between(from: Axis, to: Axis) -> DMat4 {
    match (from, to) {
        (Axis::Y, Axis::Z) => DMat4::from_rotation_x(std::f64::consts::FRAC_PI_2),
        (Axis::Z, Axis::Y) => DMat4::from_rotation_x(-std::f64::consts::FRAC_PI_2),
        _ => DMat4::IDENTITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{DistanceUnit, MemoryScene, NodePath};
    use crate::sdf::TimeCode;

    #[test]
    fn test_source_prefs_is_identity() {
        let scene = MemoryScene::new();
        let mut stage = Stage::create_in_memory();
        let changer = AxisUnitsChanger::new(&mut stage, &scene, UpAxisOption::SourcePrefs, UnitsOption::SourcePrefs);
        assert!(!changer.is_active());
        assert_eq!(stage.layer().metadata.up_axis.as_deref(), Some("Y"));
        assert_eq!(stage.layer().metadata.meters_per_unit, Some(0.01));
    }

    #[test]
    fn test_x_up_falls_back_to_y() {
        let scene = MemoryScene::new();
        let mut stage = Stage::create_in_memory();
        let changer = AxisUnitsChanger::new(&mut stage, &scene, UpAxisOption::X, UnitsOption::None);
        assert!(!changer.is_active());
        assert_eq!(stage.layer().metadata.up_axis.as_deref(), Some("Y"));
        assert_eq!(stage.layer().metadata.meters_per_unit, None);
    }

    #[test]
    fn test_z_up_meters_and_restore() {
        let mut scene = MemoryScene::new();
        let node = scene.add_node("|cube", "transform");
        scene.set_transform(&node, DMat4::from_translation(DVec3::new(0.0, 100.0, 0.0)));
        let mut stage = Stage::create_in_memory();
        {
            let changer = AxisUnitsChanger::new(
                &mut stage,
                &scene,
                UpAxisOption::Z,
                UnitsOption::Unit(DistanceUnit::Meters),
            );
            assert!(changer.is_active());
            let moved = scene
                .export_transform(&NodePath::new("|cube"), TimeCode::Default)
                .transform_point3(DVec3::ZERO);
            assert!((moved - DVec3::new(0.0, 0.0, 1.0)).length() < 1e-9);
        }
        assert_eq!(scene.root_correction(), DMat4::IDENTITY);
        assert_eq!(stage.layer().metadata.up_axis.as_deref(), Some("Z"));
        assert_eq!(stage.layer().metadata.meters_per_unit, Some(1.0));
    }

    #[test]
    fn test_none_authors_nothing() {
        let scene = MemoryScene::new();
        let mut stage = Stage::create_in_memory();
        let _changer = AxisUnitsChanger::new(&mut stage, &scene, UpAxisOption::None, UnitsOption::None);
        assert!(stage.layer().metadata.up_axis.is_none());
        assert!(stage.layer().metadata.meters_per_unit.is_none());
    }
}
