//! Export job arguments.
//!
//! Loaded from JSON job files (camelCase keys, every field optional) or
//! built in code with the `with_*` methods. Option tokens use the same
//! spellings as the host's export dialog (`modelingVariant`, `mayaPrefs`, ...).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::scene::{DistanceUnit, NodeCategory, NodePath};
use crate::sdf::{SdfPath, Value};
use crate::util::{Error, Result};

/// Default-prim value that suppresses default prim authoring.
pub const DEFAULT_PRIM_NONE: &str = "None";

/// Model root used when render layers become modeling variants.
pub const BASE_MODEL_ROOT: &str = "/_BaseModel_";

/// Name of the variant set holding one variant per render layer.
pub const MODELING_VARIANT_SET: &str = "modelingVariant";

macro_rules! token_serde {
    ($ty:ty) => {
        impl TryFrom<String> for $ty {
            type Error = Error;

            fn try_from(s: String) -> Result<Self> {
                s.parse()
            }
        }

        impl From<$ty> for String {
            fn from(v: $ty) -> Self {
                v.to_string()
            }
        }
    };
}

/// How render layers are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum RenderLayerMode {
    /// Export whatever render layer is current.
    CurrentLayer,
    /// Switch to the default render layer for the export.
    #[default]
    DefaultLayer,
    /// Default layer, plus one modeling variant per render layer.
    ModelingVariant,
}

impl FromStr for RenderLayerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "currentLayer" => Ok(Self::CurrentLayer),
            "defaultLayer" => Ok(Self::DefaultLayer),
            "modelingVariant" => Ok(Self::ModelingVariant),
            _ => Err(Error::InvalidOption {
                option: "renderLayerMode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RenderLayerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CurrentLayer => "currentLayer",
            Self::DefaultLayer => "defaultLayer",
            Self::ModelingVariant => "modelingVariant",
        })
    }
}

token_serde!(RenderLayerMode);

/// Requested up axis of the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum UpAxisOption {
    /// Do not author an up axis.
    None,
    /// Use the host scene's up axis.
    #[default]
    SourcePrefs,
    X,
    Y,
    Z,
}

impl FromStr for UpAxisOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "mayaPrefs" | "sourcePrefs" => Ok(Self::SourcePrefs),
            "x" | "X" => Ok(Self::X),
            "y" | "Y" => Ok(Self::Y),
            "z" | "Z" => Ok(Self::Z),
            _ => Err(Error::InvalidOption {
                option: "upAxis",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for UpAxisOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::SourcePrefs => "mayaPrefs",
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        })
    }
}

token_serde!(UpAxisOption);

/// Requested linear unit of the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum UnitsOption {
    /// Do not author units.
    None,
    /// Use the host scene's UI unit.
    #[default]
    SourcePrefs,
    Unit(DistanceUnit),
}

impl FromStr for UnitsOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "mayaPrefs" | "sourcePrefs" => Ok(Self::SourcePrefs),
            other => other
                .parse::<DistanceUnit>()
                .map(Self::Unit)
                .map_err(|_| Error::InvalidOption {
                    option: "unit",
                    value: s.to_string(),
                }),
        }
    }
}

impl fmt::Display for UnitsOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::SourcePrefs => f.write_str("mayaPrefs"),
            Self::Unit(u) => write!(f, "{}", u),
        }
    }
}

token_serde!(UnitsOption);

/// Compatibility profile of the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Compatibility {
    #[default]
    None,
    /// Apple ARKit: `.usdz` by default, flattened packages.
    AppleArKit,
}

impl FromStr for Compatibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "appleArKit" | "arkit" => Ok(Self::AppleArKit),
            _ => Err(Error::InvalidOption {
                option: "compatibility",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::AppleArKit => "appleArKit",
        })
    }
}

token_serde!(Compatibility);

/// Prim type of the configured root prim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum RootPrimType {
    #[default]
    Scope,
    Xform,
}

impl RootPrimType {
    /// Schema type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scope => "Scope",
            Self::Xform => "Xform",
        }
    }
}

impl FromStr for RootPrimType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scope" | "Scope" => Ok(Self::Scope),
            "xform" | "Xform" => Ok(Self::Xform),
            _ => Err(Error::InvalidOption {
                option: "rootPrimType",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RootPrimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scope => "scope",
            Self::Xform => "xform",
        })
    }
}

token_serde!(RootPrimType);

/// Configuration of one export job.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobExportArgs {
    /// Nodes to export with everything below them. Empty means the selection
    /// (with `export_selected`) or the whole scene.
    pub dag_paths: Vec<NodePath>,
    pub export_selected: bool,
    /// Frames to sample animation at, in order. Empty exports default values only.
    pub time_samples: Vec<f64>,
    pub strip_namespaces: bool,
    /// Collapse a transform and its single shape into one prim.
    pub merge_transform_and_shape: bool,
    pub render_layer_mode: RenderLayerMode,
    /// Default prim name; empty picks one, [`DEFAULT_PRIM_NONE`] suppresses it.
    pub default_prim: String,
    /// Prim wrapping all output (`""` for none).
    pub root_prim: String,
    pub root_prim_type: RootPrimType,
    /// Nodes to re-root the output at.
    pub export_roots: Vec<String>,
    pub up_axis: UpAxisOption,
    pub unit: UnitsOption,
    /// Authored when `export_distance_unit` is set.
    pub meters_per_unit: f64,
    pub export_distance_unit: bool,
    pub compatibility: Compatibility,
    /// Chasers to run, in order.
    pub chaser_names: Vec<String>,
    /// Per-chaser key/value arguments.
    pub chaser_args: BTreeMap<String, BTreeMap<String, String>>,
    pub include_empty_transforms: bool,
    pub exclude_invisible: bool,
    pub export_meshes: bool,
    pub export_lights: bool,
    pub export_cameras: bool,
    pub export_stages_as_refs: bool,
    /// Kind forced onto root prims.
    pub root_kind: String,
    pub disable_model_kind_processor: bool,
    pub custom_layer_data: BTreeMap<String, Value>,
    /// Log each frame time as it is written.
    pub verbose: bool,
    /// Skip default prim discovery (materials go to a legacy scope).
    pub legacy_material_scope: bool,
    /// Prefix replacing the top-level prim of every written path. Set by the job.
    #[serde(skip)]
    pub usd_model_root_override_path: Option<SdfPath>,
}

impl Default for JobExportArgs {
    fn default() -> Self {
        Self {
            dag_paths: Vec::new(),
            export_selected: false,
            time_samples: Vec::new(),
            strip_namespaces: false,
            merge_transform_and_shape: true,
            render_layer_mode: RenderLayerMode::DefaultLayer,
            default_prim: String::new(),
            root_prim: String::new(),
            root_prim_type: RootPrimType::Scope,
            export_roots: Vec::new(),
            up_axis: UpAxisOption::SourcePrefs,
            unit: UnitsOption::SourcePrefs,
            meters_per_unit: DistanceUnit::Centimeters.meters_per_unit(),
            export_distance_unit: false,
            compatibility: Compatibility::None,
            chaser_names: Vec::new(),
            chaser_args: BTreeMap::new(),
            include_empty_transforms: true,
            exclude_invisible: false,
            export_meshes: true,
            export_lights: true,
            export_cameras: true,
            export_stages_as_refs: true,
            root_kind: String::new(),
            disable_model_kind_processor: false,
            custom_layer_data: BTreeMap::new(),
            verbose: false,
            legacy_material_scope: false,
            usd_model_root_override_path: None,
        }
    }
}

impl JobExportArgs {
    /// Parse a JSON job description.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Frames `start..=end` every `step`.
    pub fn frame_range(start: f64, end: f64, step: f64) -> Vec<f64> {
        if step <= 0.0 || end < start {
            return Vec::new();
        }
        let count = ((end - start) / step + 1e-9).floor() as usize;
        (0..=count).map(|i| start + i as f64 * step).collect()
    }

    /// Check if export roots were configured.
    pub fn has_export_roots(&self) -> bool {
        self.export_roots.iter().any(|r| !r.is_empty())
    }

    /// Check if nodes of `category` are exported.
    pub fn exports_category(&self, category: NodeCategory) -> bool {
        match category {
            NodeCategory::Mesh => self.export_meshes,
            NodeCategory::Light => self.export_lights,
            NodeCategory::Camera => self.export_cameras,
            NodeCategory::Stage => self.export_stages_as_refs,
            NodeCategory::Transform | NodeCategory::Other => true,
        }
    }

    /// Export root nodes, skipping empty entries.
    pub fn export_root_nodes(&self) -> Vec<NodePath> {
        self.export_roots
            .iter()
            .filter(|r| !r.is_empty())
            .map(|r| NodePath::new(r))
            .collect()
    }

    pub fn with_dag_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodePath>,
    {
        self.dag_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_time_samples(mut self, samples: Vec<f64>) -> Self {
        self.time_samples = samples;
        self
    }

    pub fn with_strip_namespaces(mut self, strip: bool) -> Self {
        self.strip_namespaces = strip;
        self
    }

    pub fn with_merge_transform_and_shape(mut self, merge: bool) -> Self {
        self.merge_transform_and_shape = merge;
        self
    }

    pub fn with_render_layer_mode(mut self, mode: RenderLayerMode) -> Self {
        self.render_layer_mode = mode;
        self
    }

    pub fn with_default_prim(mut self, name: &str) -> Self {
        self.default_prim = name.to_string();
        self
    }

    pub fn with_root_prim(mut self, name: &str, prim_type: RootPrimType) -> Self {
        self.root_prim = name.to_string();
        self.root_prim_type = prim_type;
        self
    }

    pub fn with_export_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.export_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_up_axis(mut self, axis: UpAxisOption) -> Self {
        self.up_axis = axis;
        self
    }

    pub fn with_unit(mut self, unit: UnitsOption) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_compatibility(mut self, compatibility: Compatibility) -> Self {
        self.compatibility = compatibility;
        self
    }

    pub fn with_chasers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chaser_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_include_empty_transforms(mut self, include: bool) -> Self {
        self.include_empty_transforms = include;
        self
    }

    pub fn with_exclude_invisible(mut self, exclude: bool) -> Self {
        self.exclude_invisible = exclude;
        self
    }
}
