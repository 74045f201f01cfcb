//! Layers: a tree of prim specs plus layer metadata, saved to disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::path::SdfPath;
use super::spec::{PrimSpec, Specifier};
use super::value::Value;
use super::{usda, usdc};
use crate::util::{Error, Result};

/// Prefix of anonymous layer identifiers.
pub const ANONYMOUS_PREFIX: &str = "anon:";

/// File extensions understood by the exporter.
pub mod extension {
    /// Default extension (binary).
    pub const DEFAULT: &str = "usd";
    /// Text encoding.
    pub const ASCII: &str = "usda";
    /// Binary encoding.
    pub const CRATE: &str = "usdc";
    /// Zip package.
    pub const PACKAGE: &str = "usdz";

    /// Check for any known scene-description extension.
    pub fn is_known(ext: &str) -> bool {
        matches!(ext, DEFAULT | ASCII | CRATE | PACKAGE)
    }
}

/// On-disk encoding of a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Text,
    Binary,
}

impl FileFormat {
    /// Pick the encoding from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(extension::ASCII) => Ok(Self::Text),
            Some(extension::DEFAULT) | Some(extension::CRATE) => Ok(Self::Binary),
            _ => Err(Error::other(format!(
                "Unsupported layer file format: {}",
                path.display()
            ))),
        }
    }
}

/// Check if an identifier names an anonymous (in-memory) layer.
pub fn is_anonymous_identifier(identifier: &str) -> bool {
    identifier.starts_with(ANONYMOUS_PREFIX)
}

/// Layer-level metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerMetadata {
    pub default_prim: Option<String>,
    pub up_axis: Option<String>,
    pub meters_per_unit: Option<f64>,
    pub start_time_code: Option<f64>,
    pub end_time_code: Option<f64>,
    pub time_codes_per_second: Option<f64>,
    pub frames_per_second: Option<f64>,
    pub custom_layer_data: BTreeMap<String, Value>,
}

/// A scene-description layer.
#[derive(Clone, Debug)]
pub struct Layer {
    identifier: String,
    read_only: bool,
    /// Layer metadata.
    pub metadata: LayerMetadata,
    /// Pseudo-root spec; its children are the root prims.
    pub pseudo_root: PrimSpec,
}

impl Layer {
    fn with_identifier(identifier: String) -> Self {
        Self {
            identifier,
            read_only: false,
            metadata: LayerMetadata::default(),
            pseudo_root: PrimSpec::new("", Specifier::Def),
        }
    }

    /// Create a new empty layer that saves to `path`.
    ///
    /// Nothing is written until [`Layer::save`].
    pub fn create_new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        FileFormat::from_path(path)?;
        Ok(Self::with_identifier(path.to_string_lossy().to_string()))
    }

    /// Create an in-memory layer that never saves.
    pub fn create_anonymous(tag: &str) -> Self {
        Self::with_identifier(format!("{}{}", ANONYMOUS_PREFIX, tag))
    }

    /// Open an existing layer file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let bytes = fs::read(path)?;
        let read_only = fs::metadata(path)
            .map(|m| m.permissions().readonly())
            .unwrap_or(false);
        let mut layer = Self::from_bytes(&bytes, format)?;
        layer.identifier = path.to_string_lossy().to_string();
        layer.read_only = read_only;
        Ok(layer)
    }

    /// Decode a layer from memory. The result is anonymous.
    pub fn from_bytes(bytes: &[u8], format: FileFormat) -> Result<Self> {
        let mut layer = Self::create_anonymous("decoded");
        match format {
            FileFormat::Text => usda::read_layer(std::str::from_utf8(bytes).map_err(|e| {
                Error::invalid(format!("text layer is not UTF-8: {}", e))
            })?, &mut layer)?,
            FileFormat::Binary => usdc::read_layer(bytes, &mut layer)?,
        }
        Ok(layer)
    }

    /// Encode the layer.
    pub fn to_bytes(&self, format: FileFormat) -> Result<Vec<u8>> {
        match format {
            FileFormat::Text => Ok(usda::write_layer(self).into_bytes()),
            FileFormat::Binary => usdc::write_layer(self),
        }
    }

    /// Layer identifier (file path or `anon:` tag).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// File path of a non-anonymous layer.
    pub fn real_path(&self) -> Option<PathBuf> {
        if self.is_anonymous() {
            None
        } else {
            Some(PathBuf::from(&self.identifier))
        }
    }

    /// Check for an in-memory layer.
    pub fn is_anonymous(&self) -> bool {
        is_anonymous_identifier(&self.identifier)
    }

    /// Whether [`Layer::save`] is allowed to write.
    pub fn permission_to_save(&self) -> bool {
        !self.is_anonymous() && !self.read_only
    }

    /// Mark the layer read-only (or writable again).
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Write the layer to its own path.
    pub fn save(&self) -> Result<()> {
        let path = self
            .real_path()
            .ok_or_else(|| Error::other("Cannot save an anonymous layer"))?;
        if self.read_only {
            return Err(Error::other(format!("Layer '{}' is read-only", path.display())));
        }
        self.export(&path)
    }

    /// Write the layer to another path, picking the encoding from its extension.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes(FileFormat::from_path(path)?)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Names of the root prims in order.
    pub fn root_prim_names(&self) -> Vec<String> {
        self.pseudo_root.children.iter().map(|c| c.name.clone()).collect()
    }

    /// Spec at a prim path.
    pub fn prim_at_path(&self, path: &SdfPath) -> Option<&PrimSpec> {
        let comps: Vec<&str> = path.components().collect();
        self.pseudo_root.descendant(&comps)
    }

    /// Spec at a prim path for editing.
    pub fn prim_at_path_mut(&mut self, path: &SdfPath) -> Option<&mut PrimSpec> {
        let comps: Vec<&str> = path.components().collect();
        self.pseudo_root.descendant_mut(&comps)
    }

    /// Find or create the spec at `path`; missing specs get `specifier`.
    pub fn ensure_prim(&mut self, path: &SdfPath, specifier: Specifier) -> &mut PrimSpec {
        let comps: Vec<&str> = path.components().collect();
        self.pseudo_root.ensure_descendant(&comps, specifier)
    }

    /// Remove the spec at `path` and everything below it.
    pub fn remove_prim(&mut self, path: &SdfPath) -> bool {
        let parent = path.parent();
        let name = path.name().to_string();
        if name.is_empty() {
            return false;
        }
        match self.prim_at_path_mut(&parent) {
            Some(spec) => spec.remove_child(&name),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(FileFormat::from_path(Path::new("a.usda")).unwrap(), FileFormat::Text);
        assert_eq!(FileFormat::from_path(Path::new("a.usd")).unwrap(), FileFormat::Binary);
        assert_eq!(FileFormat::from_path(Path::new("a.usdc")).unwrap(), FileFormat::Binary);
        assert!(FileFormat::from_path(Path::new("a.usdz")).is_err());
    }

    #[test]
    fn test_anonymous_cannot_save() {
        let layer = Layer::create_anonymous("test");
        assert!(layer.is_anonymous());
        assert!(!layer.permission_to_save());
        assert!(layer.save().is_err());
    }

    #[test]
    fn test_prim_edit() {
        let mut layer = Layer::create_anonymous("edit");
        let path = SdfPath::new("/a/b").unwrap();
        layer.ensure_prim(&path, Specifier::Def).type_name = "Xform".into();
        assert_eq!(layer.root_prim_names(), vec!["a".to_string()]);
        assert!(layer.prim_at_path(&path).is_some());
        assert!(layer.remove_prim(&path));
        assert!(layer.prim_at_path(&path).is_none());
        assert!(!layer.remove_prim(&SdfPath::absolute_root()));
    }
}
