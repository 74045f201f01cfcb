//! Output scene description: paths, values, layers and a composing stage.
//!
//! This is the persistence side of the exporter. Layers hold prim specs and
//! are saved as text (`.usda`) or binary (`.usd`, `.usdc`); `.usdz` packages
//! bundle a binary root layer with its assets.

mod layer;
mod metadata;
pub mod package;
mod path;
pub mod schema;
mod spec;
mod stage;
pub mod usda;
pub mod usdc;
mod value;

pub use layer::{extension, is_anonymous_identifier, FileFormat, Layer, LayerMetadata, ANONYMOUS_PREFIX};
pub use metadata::MetaData;
pub use package::{create_package, flatten, open_package, package_entries, PackageProfile};
pub use path::SdfPath;
pub use schema::kind;
pub use spec::{AttributeSpec, PrimSpec, Reference, Specifier, VariantSetSpec, VariantSpec};
pub use stage::{EditContext, EditTarget, Prim, Stage};
pub use value::{TimeCode, Value, ValueType};
