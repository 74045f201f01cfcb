//! Finalization: variants, default prim, final hooks, pruning, save and packaging.

use std::fs;
use std::path::Path;

use tracing::{debug, error, info, warn};

use super::args::{Compatibility, DEFAULT_PRIM_NONE};
use super::prune::prune_empty_prims;
use super::variants::{variant_root_path, write_variants};
use super::WriteJob;
use crate::chaser::ChaserContext;
use crate::sdf::{create_package, PackageProfile, SdfPath};
use crate::util::{Error, Result};
use crate::writer::WriterContext;

/// Name of the root layer inside a package: the package stem with the
/// extension of the layer being packaged.
pub(super) fn first_layer_name(package: &Path, layer: &Path) -> String {
    let stem = package
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match layer.extension() {
        Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
        None => stem,
    }
}

fn same_unit(a: f64, b: f64) -> bool {
    (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs())
}

impl WriteJob<'_> {
    pub(super) fn finish_writing(&mut self) -> Result<()> {
        let scene = self.ctx.scene;
        let root_prim_path = self.ctx.root_prim_path().cloned();
        let stage = self
            .ctx
            .stage
            .as_mut()
            .ok_or_else(|| Error::other("No stage is open"))?;

        let usd_root_prim = stage
            .layer()
            .root_prim_names()
            .first()
            .map(|name| SdfPath::absolute_root().append_child(name))
            .transpose()?;
        let mut default_prim = usd_root_prim.as_ref().map(|p| p.name().to_string());

        if let Some(root) = &usd_root_prim {
            if self.render_layers.len() > 1 && self.ctx.args.usd_model_root_override_path.is_some() {
                let first_node = self.ctx.writers.first().map(|w| w.node());
                let variant_root = variant_root_path(root_prim_path.as_ref(), first_node)?;
                default_prim = Some(write_variants(stage, scene, root, &variant_root, &self.dag_to_usd)?);
            }
        }

        if let Some(saved) = self.saved_render_layer.take() {
            if scene.current_render_layer() != saved {
                debug!("Restoring render layer {}", saved);
                scene.set_current_render_layer(&saved);
            }
        }

        let args = &self.ctx.args;
        let internal = scene.internal_unit();
        if !same_unit(args.meters_per_unit, internal.meters_per_unit()) {
            warn!(
                "Distance unit conversion is limited; distances are written in {} \
                 except where conversion is supported and enabled",
                internal.token()
            );
        }
        if args.export_distance_unit {
            stage.layer_mut().metadata.meters_per_unit = Some(args.meters_per_unit);
        }

        if !args.default_prim.is_empty() {
            if args.default_prim != DEFAULT_PRIM_NONE {
                stage.set_default_prim(&args.default_prim);
            }
        } else if let Some(name) = &default_prim {
            stage.set_default_prim(name);
        }

        let mut wctx = WriterContext { stage, scene, args };
        for writer in &mut self.ctx.writers {
            writer.post_export(&mut wctx);
        }

        self.extra_prim_paths.clear();
        let mut cctx = ChaserContext {
            stage: wctx.stage,
            scene,
            args,
            dag_to_usd: &self.dag_to_usd,
        };
        for named in &mut self.chasers {
            if let Err(e) = named.chaser.post_export(&mut cctx) {
                error!("Chaser {} failed to finish: {}", named.name, e);
                return Err(Error::ChaserFailed {
                    name: named.name.clone(),
                    hook: "post_export",
                });
            }
            self.extra_prim_paths
                .extend(named.chaser.extra_prim_paths().iter().cloned());
        }

        let stage = cctx.stage;
        self.callbacks.post_export(stage);

        if !args.include_empty_transforms {
            let protected = match stage.default_prim() {
                None | Some("") => None,
                Some(name) if name.starts_with('/') => Some(SdfPath::new(name)?),
                Some(name) => Some(SdfPath::absolute_root().append_child(name)?),
            };
            let removed = prune_empty_prims(stage, protected.as_ref());
            if !removed.is_empty() {
                debug!("Pruned {} empty prims", removed.len());
            }
        }

        // Dropping the changer puts the host's axis and units back.
        self.axis_units = None;

        info!("Saving stage");
        if stage.layer().permission_to_save() {
            stage.save()?;
        }

        if let Some(package) = self.package_name.clone() {
            info!("Packaging USDZ file");
            let profile = match args.compatibility {
                Compatibility::AppleArKit => PackageProfile::AppleArKit,
                Compatibility::None => PackageProfile::Standard,
            };
            let name = first_layer_name(&package, &self.file_name);
            if let Err(e) = create_package(&self.file_name, &package, &name, profile) {
                let e = Error::Package {
                    package: package.clone(),
                    message: e.to_string(),
                };
                error!(
                    "{} (from temporary stage '{}')",
                    e,
                    self.file_name.display()
                );
                self.package_error = Some(e.to_string());
            }
        }

        // Writers and the stage go before the temporary file does.
        self.ctx.writers.clear();
        self.written_layer = self.ctx.stage.take().map(|s| s.into_layer());

        if self.package_name.is_some() {
            if let Err(e) = fs::remove_file(&self.file_name) {
                warn!(
                    "Could not delete temporary stage '{}': {}",
                    self.file_name.display(),
                    e
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_layer_name() {
        assert_eq!(
            first_layer_name(Path::new("out/asset.usdz"), Path::new("out/tmp-0a1b.usdc")),
            "asset.usdc"
        );
        assert_eq!(
            first_layer_name(Path::new("my.asset.usdz"), Path::new("tmp.usdc")),
            "my.asset.usdc"
        );
    }

    #[test]
    fn test_same_unit() {
        assert!(same_unit(0.01, 0.01));
        assert!(!same_unit(0.01, 1.0));
    }
}
