//! `.usdz` packages.
//!
//! A package is an uncompressed zip archive with 64-byte aligned entries.
//! The first entry is the root layer; the rest are the files referenced by
//! asset-valued attributes and by external reference or payload arcs.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::layer::{extension, FileFormat, Layer};
use super::spec::Specifier;
use super::stage::Stage;
use super::value::Value;
use crate::util::{Error, Result};

/// Entry alignment inside the archive.
pub const ALIGNMENT: u16 = 64;

/// Directory for assets that live outside the layer's directory.
pub const ASSET_DIR: &str = "assets";

/// Packaging constraints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PackageProfile {
    #[default]
    Standard,
    /// Flattened single layer, binary encoded.
    AppleArKit,
}

/// Flatten composition into a new layer.
///
/// Every active, defined prim becomes a `def` spec carrying its composed
/// type, metadata and attributes. References, payloads and variants are
/// baked in; inactive prims are dropped.
pub fn flatten(stage: &Stage) -> Layer {
    let mut out = Layer::create_anonymous("flattened");
    out.metadata = stage.layer().metadata.clone();
    for prim in stage.traverse() {
        let attributes = stage.attributes(&prim.path);
        let spec = out.ensure_prim(&prim.path, Specifier::Def);
        spec.specifier = Specifier::Def;
        spec.type_name = prim.type_name;
        spec.metadata = prim.metadata;
        spec.attributes = attributes;
    }
    out
}

/// Archive entry name for an asset, rewriting `asset` when the file lives
/// outside the layer's directory.
fn archive_name(asset: &mut String, base_dir: &Path) -> Option<(String, PathBuf)> {
    if asset.is_empty() {
        return None;
    }
    let rel = Path::new(asset.as_str());
    let source = if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        base_dir.join(rel)
    };
    if !source.is_file() {
        debug!("Skipping missing asset {}", source.display());
        return None;
    }
    let inside = !rel.is_absolute()
        && rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    let name = if inside {
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    } else {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "asset".to_string());
        let name = format!("{}/{}", ASSET_DIR, file_name);
        *asset = name.clone();
        name
    };
    Some((name, source))
}

/// Collect asset files referenced by `layer`, rewriting outside paths.
fn collect_assets(layer: &mut Layer, base_dir: &Path) -> Vec<(String, PathBuf)> {
    let mut assets: Vec<(String, PathBuf)> = Vec::new();
    let mut add = |asset: &mut String| {
        if let Some((name, source)) = archive_name(asset, base_dir) {
            if !assets.iter().any(|(n, _)| *n == name) {
                assets.push((name, source));
            }
        }
    };
    layer.pseudo_root.for_each_value_mut(&mut |value| {
        if let Value::Asset(asset) = value {
            add(asset);
        }
    });
    layer.pseudo_root.for_each_arc_mut(&mut |arc| add(&mut arc.asset_path));
    assets
}

/// Force a name onto the binary extension.
fn binary_name(name: &str) -> String {
    let path = Path::new(name);
    path.with_extension(extension::CRATE)
        .to_string_lossy()
        .to_string()
}

/// Bundle the layer at `layer_path` and its assets into `package_path`.
///
/// `first_layer_name` names the root layer entry; its extension picks the
/// encoding. The ARKit profile flattens first and always writes binary.
pub fn create_package(
    layer_path: &Path,
    package_path: &Path,
    first_layer_name: &str,
    profile: PackageProfile,
) -> Result<()> {
    info!(
        "Packaging {} into {}",
        layer_path.display(),
        package_path.display()
    );
    let layer = Layer::open(layer_path)?;
    let (mut root, first_layer_name) = match profile {
        PackageProfile::Standard => (layer, first_layer_name.to_string()),
        PackageProfile::AppleArKit => (flatten(&Stage::new(layer)), binary_name(first_layer_name)),
    };

    let base_dir = layer_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let assets = collect_assets(&mut root, &base_dir);
    let bytes = root.to_bytes(FileFormat::from_path(Path::new(&first_layer_name))?)?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .with_alignment(ALIGNMENT);
    let mut zip = ZipWriter::new(File::create(package_path)?);
    zip.start_file(first_layer_name.as_str(), options)?;
    zip.write_all(&bytes)?;
    for (name, source) in &assets {
        debug!("Adding {} as {}", source.display(), name);
        let data = fs::read(source)?;
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&data)?;
    }
    zip.finish()?;
    Ok(())
}

/// Entry names of a package in archive order.
pub fn package_entries(package_path: &Path) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(File::open(package_path)?)?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        names.push(archive.by_index(i)?.name().to_string());
    }
    Ok(names)
}

/// Read the root layer of a package. Returns its entry name and the layer.
pub fn open_package(package_path: &Path) -> Result<(String, Layer)> {
    let mut archive = ZipArchive::new(File::open(package_path)?)?;
    if archive.len() == 0 {
        return Err(Error::invalid(format!(
            "package {} has no entries",
            package_path.display()
        )));
    }
    let mut entry = archive.by_index(0)?;
    let name = entry.name().to_string();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    let layer = Layer::from_bytes(&bytes, FileFormat::from_path(Path::new(&name))?)?;
    Ok((name, layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::path::SdfPath;
    use crate::sdf::spec::Reference;
    use crate::sdf::value::TimeCode;

    fn p(s: &str) -> SdfPath {
        SdfPath::new(s).unwrap()
    }

    #[test]
    fn test_package_with_assets() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tex")).unwrap();
        fs::write(dir.path().join("tex/a.png"), b"png-a").unwrap();
        let far = outside.path().join("b.png");
        fs::write(&far, b"png-b").unwrap();

        let layer_path = dir.path().join("tmp-layer.usdc");
        let mut stage = Stage::new(Layer::create_new(&layer_path).unwrap());
        stage.define_prim(&p("/root"), "Xform").unwrap();
        stage
            .set_attribute(&p("/root"), "near", Value::Asset("tex/a.png".into()), TimeCode::Default)
            .unwrap();
        stage
            .set_attribute(
                &p("/root"),
                "far",
                Value::Asset(far.to_string_lossy().to_string()),
                TimeCode::Default,
            )
            .unwrap();
        stage.set_default_prim("root");
        stage.save().unwrap();

        let package = dir.path().join("scene.usdz");
        create_package(&layer_path, &package, "scene.usdc", PackageProfile::Standard).unwrap();

        let entries = package_entries(&package).unwrap();
        assert_eq!(entries[0], "scene.usdc");
        assert!(entries.contains(&"tex/a.png".to_string()));
        assert!(entries.contains(&"assets/b.png".to_string()));

        let (name, layer) = open_package(&package).unwrap();
        assert_eq!(name, "scene.usdc");
        assert_eq!(layer.metadata.default_prim.as_deref(), Some("root"));
        let stage = Stage::new(layer);
        assert_eq!(
            stage.attribute_value(&p("/root"), "far", TimeCode::Default),
            Some(Value::Asset("assets/b.png".into()))
        );
    }

    #[test]
    fn test_package_bundles_referenced_layers() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("set.usda"), b"#usda 1.0\n").unwrap();
        let far = outside.path().join("props.usda");
        fs::write(&far, b"#usda 1.0\n").unwrap();

        let layer_path = dir.path().join("tmp-layer.usdc");
        let mut stage = Stage::new(Layer::create_new(&layer_path).unwrap());
        stage.define_prim(&p("/asset/setShape"), "").unwrap();
        stage
            .add_reference(
                &p("/asset/setShape"),
                Reference { asset_path: "set.usda".into(), prim_path: SdfPath::empty() },
                false,
            )
            .unwrap();
        stage.define_prim(&p("/asset/props"), "").unwrap();
        stage
            .add_reference(
                &p("/asset/props"),
                Reference {
                    asset_path: far.to_string_lossy().to_string(),
                    prim_path: SdfPath::empty(),
                },
                true,
            )
            .unwrap();
        stage.save().unwrap();

        let package = dir.path().join("asset.usdz");
        create_package(&layer_path, &package, "asset.usdc", PackageProfile::Standard).unwrap();

        let entries = package_entries(&package).unwrap();
        assert_eq!(entries, vec!["asset.usdc", "set.usda", "assets/props.usda"]);

        let (_, layer) = open_package(&package).unwrap();
        let props = layer.prim_at_path(&p("/asset/props")).unwrap();
        assert_eq!(props.payloads[0].asset_path, "assets/props.usda");
        let set = layer.prim_at_path(&p("/asset/setShape")).unwrap();
        assert_eq!(set.references[0].asset_path, "set.usda");
        assert!(set.references[0].prim_path.is_empty());
    }

    #[test]
    fn test_arkit_flattens() {
        let dir = tempfile::tempdir().unwrap();
        let layer_path = dir.path().join("tmp.usda");
        let mut stage = Stage::new(Layer::create_new(&layer_path).unwrap());
        stage.define_prim(&p("/base/cube"), "Mesh").unwrap();
        stage.define_prim(&p("/model"), "Xform").unwrap();
        stage.add_internal_reference(&p("/model"), &p("/base")).unwrap();
        stage.set_active(&p("/base"), false).unwrap();
        stage.set_active(&p("/model"), true).unwrap();
        stage.save().unwrap();

        let package = dir.path().join("out.usdz");
        create_package(&layer_path, &package, "out.usda", PackageProfile::AppleArKit).unwrap();
        let (name, layer) = open_package(&package).unwrap();
        assert_eq!(name, "out.usdc");
        assert_eq!(layer.root_prim_names(), vec!["model".to_string()]);
        let cube = layer.prim_at_path(&p("/model/cube")).unwrap();
        assert_eq!(cube.type_name, "Mesh");
        assert!(layer.prim_at_path(&p("/model")).unwrap().references.is_empty());
    }
}
