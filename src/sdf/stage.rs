//! Authoring and composed queries over one root layer.
//!
//! Edits go through the current [`EditTarget`]: either the root layer itself
//! or the opinions stored inside one variant of a variant set. Queries compose
//! the layer's specs with selected variants and internal references, strongest
//! opinion first.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use super::layer::Layer;
use super::metadata::MetaData;
use super::path::SdfPath;
use super::spec::{AttributeSpec, PrimSpec, Reference, Specifier};
use super::value::{TimeCode, Value};
use crate::util::{Error, Result};

/// Maximum nesting of reference/variant arcs followed while composing.
const MAX_COMPOSITION_DEPTH: usize = 256;

/// Where authoring calls write their opinions.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum EditTarget {
    /// Directly into the root layer.
    #[default]
    Root,
    /// Into a variant of `set` on `prim`. Only paths at or below `prim` are editable.
    Variant {
        prim: SdfPath,
        set: String,
        variant: String,
    },
}

/// Composed view of a prim.
#[derive(Clone, Debug, PartialEq)]
pub struct Prim {
    pub path: SdfPath,
    pub type_name: String,
    pub specifier: Specifier,
    pub active: bool,
    pub metadata: MetaData,
    pub has_authored_references: bool,
    pub has_authored_payloads: bool,
    /// Child names in composed order.
    pub children: Vec<String>,
}

impl Prim {
    /// Defined prims have at least one `def` opinion.
    pub fn is_defined(&self) -> bool {
        self.specifier == Specifier::Def
    }

    /// Model kind, if any.
    pub fn kind(&self) -> Option<&str> {
        self.metadata.kind()
    }
}

/// Stage over a single root layer.
#[derive(Debug)]
pub struct Stage {
    layer: Layer,
    edit_target: EditTarget,
}

impl Stage {
    /// Wrap a layer.
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            edit_target: EditTarget::Root,
        }
    }

    /// Stage over a fresh anonymous layer.
    pub fn create_in_memory() -> Self {
        Self::new(Layer::create_anonymous("stage"))
    }

    /// Root layer.
    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    /// Root layer for direct spec edits.
    pub fn layer_mut(&mut self) -> &mut Layer {
        &mut self.layer
    }

    /// Take the root layer.
    pub fn into_layer(self) -> Layer {
        self.layer
    }

    /// Current edit target.
    pub fn edit_target(&self) -> &EditTarget {
        &self.edit_target
    }

    /// Replace the edit target and return the previous one.
    pub fn set_edit_target(&mut self, target: EditTarget) -> EditTarget {
        std::mem::replace(&mut self.edit_target, target)
    }

    /// Edit target for a variant of `set` on `prim`.
    pub fn variant_edit_target(&self, prim: &SdfPath, set: &str, variant: &str) -> EditTarget {
        EditTarget::Variant {
            prim: prim.clone(),
            set: set.to_string(),
            variant: variant.to_string(),
        }
    }

    /// Switch the edit target until the returned guard drops.
    pub fn edit_context(&mut self, target: EditTarget) -> EditContext<'_> {
        let previous = self.set_edit_target(target);
        EditContext {
            stage: self,
            previous: Some(previous),
        }
    }

    /// Write the root layer to its own path.
    pub fn save(&self) -> Result<()> {
        self.layer.save()
    }

    // ------------------------------------------------------------------
    // Authoring
    // ------------------------------------------------------------------

    /// Spec for `path` in the current edit target, created as needed.
    fn edit_spec(&mut self, path: &SdfPath, specifier: Specifier) -> Result<&mut PrimSpec> {
        if path.is_empty() || path.is_absolute_root() {
            return Err(Error::InvalidPath(path.to_string()));
        }
        match &self.edit_target {
            EditTarget::Root => Ok(self.layer.ensure_prim(path, specifier)),
            EditTarget::Variant { prim, set, variant } => {
                let rel = path.relative_components(prim).ok_or_else(|| {
                    Error::EditTarget(format!(
                        "{} is not under variant prim {} ({}={})",
                        path, prim, set, variant
                    ))
                })?;
                let owner: Vec<&str> = prim.components().collect();
                let owner = self
                    .layer
                    .pseudo_root
                    .ensure_descendant(&owner, Specifier::Over);
                let variant = owner.ensure_variant_set(set).ensure_variant(variant);
                Ok(variant.prim.ensure_descendant(&rel, specifier))
            }
        }
    }

    /// Define a prim; missing ancestors are defined without a type.
    pub fn define_prim(&mut self, path: &SdfPath, type_name: &str) -> Result<()> {
        let spec = self.edit_spec(path, Specifier::Def)?;
        spec.specifier = Specifier::Def;
        if !type_name.is_empty() {
            spec.type_name = type_name.to_string();
        }
        Ok(())
    }

    /// Author an empty override.
    pub fn override_prim(&mut self, path: &SdfPath) -> Result<()> {
        self.edit_spec(path, Specifier::Over)?;
        Ok(())
    }

    /// Remove a prim spec and its subtree from the root layer.
    pub fn remove_prim(&mut self, path: &SdfPath) -> bool {
        self.layer.remove_prim(path)
    }

    /// Author the `active` opinion.
    pub fn set_active(&mut self, path: &SdfPath, active: bool) -> Result<()> {
        self.edit_spec(path, Specifier::Over)?.active = Some(active);
        Ok(())
    }

    /// Add a reference to another prim of this layer.
    pub fn add_internal_reference(&mut self, path: &SdfPath, target: &SdfPath) -> Result<()> {
        if target.is_empty() || target.is_absolute_root() {
            return Err(Error::InvalidPath(target.to_string()));
        }
        let reference = Reference::internal(target.clone());
        let spec = self.edit_spec(path, Specifier::Over)?;
        if !spec.references.contains(&reference) {
            spec.references.push(reference);
        }
        Ok(())
    }

    /// Add an arc to another asset. External assets are recorded, not composed.
    pub fn add_reference(&mut self, path: &SdfPath, reference: Reference, as_payload: bool) -> Result<()> {
        let spec = self.edit_spec(path, Specifier::Over)?;
        let arcs = if as_payload {
            &mut spec.payloads
        } else {
            &mut spec.references
        };
        if !arcs.contains(&reference) {
            arcs.push(reference);
        }
        Ok(())
    }

    /// Create (or reuse) a variant set.
    pub fn add_variant_set(&mut self, path: &SdfPath, set: &str) -> Result<()> {
        self.edit_spec(path, Specifier::Over)?.ensure_variant_set(set);
        Ok(())
    }

    /// Create (or reuse) a variant in a set.
    pub fn add_variant(&mut self, path: &SdfPath, set: &str, variant: &str) -> Result<()> {
        self.edit_spec(path, Specifier::Over)?
            .ensure_variant_set(set)
            .ensure_variant(variant);
        Ok(())
    }

    /// Select a variant.
    pub fn set_variant_selection(&mut self, path: &SdfPath, set: &str, variant: &str) -> Result<()> {
        self.edit_spec(path, Specifier::Over)?
            .variant_selections
            .insert(set.to_string(), variant.to_string());
        Ok(())
    }

    /// Variant names of a set, as authored in the root layer.
    pub fn variant_names(&self, path: &SdfPath, set: &str) -> Vec<String> {
        self.layer
            .prim_at_path(path)
            .and_then(|p| p.variant_set(set))
            .map(|v| v.variant_names())
            .unwrap_or_default()
    }

    /// Composed variant selection.
    pub fn variant_selection(&self, path: &SdfPath, set: &str) -> Option<String> {
        self.prim_index(path)
            .into_iter()
            .find_map(|s| s.variant_selections.get(set).cloned())
    }

    /// Author an attribute value.
    pub fn set_attribute(
        &mut self,
        path: &SdfPath,
        name: &str,
        value: Value,
        time: TimeCode,
    ) -> Result<()> {
        self.edit_spec(path, Specifier::Over)?
            .set_attribute(name, value, time);
        Ok(())
    }

    /// Author model kind metadata.
    pub fn set_kind(&mut self, path: &SdfPath, kind: &str) -> Result<()> {
        self.edit_spec(path, Specifier::Over)?
            .metadata
            .set(MetaData::KIND, kind);
        Ok(())
    }

    /// Author a custom metadata string.
    pub fn set_metadata(&mut self, path: &SdfPath, key: &str, value: &str) -> Result<()> {
        self.edit_spec(path, Specifier::Over)?.metadata.set(key, value);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Layer metadata
    // ------------------------------------------------------------------

    /// Default prim name.
    pub fn default_prim(&self) -> Option<&str> {
        self.layer.metadata.default_prim.as_deref()
    }

    /// Set the default prim name.
    pub fn set_default_prim(&mut self, name: &str) {
        self.layer.metadata.default_prim = Some(name.to_string());
    }

    /// Clear the default prim.
    pub fn clear_default_prim(&mut self) {
        self.layer.metadata.default_prim = None;
    }

    // ------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------

    /// Specs contributing to `path`, strongest first.
    pub fn prim_index(&self, path: &SdfPath) -> Vec<&PrimSpec> {
        self.compose(path, 0)
    }

    fn compose(&self, path: &SdfPath, depth: usize) -> Vec<&PrimSpec> {
        let mut out = Vec::new();
        if path.is_empty() || path.is_absolute_root() || depth > MAX_COMPOSITION_DEPTH {
            return out;
        }
        let parent = path.parent();
        let parents = if parent.is_absolute_root() {
            vec![&self.layer.pseudo_root]
        } else {
            self.compose(&parent, depth + 1)
        };
        let name = path.name();
        for spec in parents {
            if let Some(child) = spec.child(name) {
                self.expand(child, depth + 1, &mut out);
            }
        }
        out
    }

    /// Push `spec` followed by its selected variants and internal arcs.
    fn expand<'a>(&'a self, spec: &'a PrimSpec, depth: usize, out: &mut Vec<&'a PrimSpec>) {
        if depth > MAX_COMPOSITION_DEPTH {
            return;
        }
        out.push(spec);
        for vset in &spec.variant_sets {
            let selection = out
                .iter()
                .find_map(|s| s.variant_selections.get(&vset.name))
                .cloned();
            if let Some(variant) = selection.and_then(|sel| vset.variant(&sel)) {
                self.expand(&variant.prim, depth + 1, out);
            }
        }
        for arc in spec.references.iter().chain(spec.payloads.iter()) {
            if arc.is_internal() && !arc.prim_path.is_empty() {
                let target = self.compose(&arc.prim_path, depth + 1);
                out.extend(target);
            }
        }
    }

    fn compose_prim(&self, path: &SdfPath) -> Option<Prim> {
        let index = self.prim_index(path);
        if index.is_empty() {
            return None;
        }
        let specifier = if index.iter().any(|s| s.specifier == Specifier::Def) {
            Specifier::Def
        } else {
            index[0].specifier
        };
        let type_name = index
            .iter()
            .map(|s| s.type_name.as_str())
            .find(|t| !t.is_empty())
            .unwrap_or_default()
            .to_string();
        let active = index.iter().find_map(|s| s.active).unwrap_or(true);

        let metadata = MetaData::compose(index.iter().map(|s| &s.metadata));

        let mut children: Vec<String> = Vec::new();
        for spec in &index {
            for child in &spec.children {
                if !children.contains(&child.name) {
                    children.push(child.name.clone());
                }
            }
        }

        Some(Prim {
            path: path.clone(),
            type_name,
            specifier,
            active,
            metadata,
            has_authored_references: index.iter().any(|s| !s.references.is_empty()),
            has_authored_payloads: index.iter().any(|s| !s.payloads.is_empty()),
            children,
        })
    }

    /// Composed prim. `None` if nothing is authored or an ancestor is inactive.
    pub fn prim(&self, path: &SdfPath) -> Option<Prim> {
        let prim = self.compose_prim(path)?;
        for ancestor in path.parent().prefixes() {
            match self.compose_prim(&ancestor) {
                Some(a) if a.active => {}
                _ => return None,
            }
        }
        Some(prim)
    }

    /// Check for a composed prim.
    pub fn has_prim(&self, path: &SdfPath) -> bool {
        self.prim(path).is_some()
    }

    /// Composed model kind.
    pub fn kind(&self, path: &SdfPath) -> Option<String> {
        self.prim(path).and_then(|p| p.kind().map(str::to_string))
    }

    /// Child paths of a prim; inactive prims have none.
    pub fn children(&self, path: &SdfPath) -> Vec<SdfPath> {
        let names = if path.is_absolute_root() {
            self.layer.root_prim_names()
        } else {
            match self.prim(path) {
                Some(p) if p.active => p.children,
                _ => return Vec::new(),
            }
        };
        names
            .iter()
            .filter_map(|n| path.append_child(n).ok())
            .collect()
    }

    /// Active, defined prims in pre-order. Inactive or undefined prims prune their subtree.
    pub fn traverse(&self) -> Vec<Prim> {
        let mut out = Vec::new();
        self.walk(&SdfPath::absolute_root(), false, &mut out);
        out
    }

    /// Every composed prim in pre-order, including inactive ones (but not below them).
    pub fn traverse_all(&self) -> Vec<Prim> {
        let mut out = Vec::new();
        self.walk(&SdfPath::absolute_root(), true, &mut out);
        out
    }

    fn walk(&self, path: &SdfPath, include_all: bool, out: &mut Vec<Prim>) {
        let names = if path.is_absolute_root() {
            self.layer.root_prim_names()
        } else {
            match self.compose_prim(path) {
                Some(p) => p.children,
                None => return,
            }
        };
        for name in names {
            let Ok(child) = path.append_child(&name) else {
                continue;
            };
            let Some(prim) = self.compose_prim(&child) else {
                continue;
            };
            let visible = prim.active && prim.is_defined();
            if !include_all && !visible {
                continue;
            }
            let descend = prim.active;
            out.push(prim);
            if descend {
                self.walk(&child, include_all, out);
            }
        }
    }

    /// Strongest attribute opinion.
    pub fn attribute(&self, path: &SdfPath, name: &str) -> Option<&AttributeSpec> {
        self.prim_index(path)
            .into_iter()
            .find_map(|s| s.attributes.get(name))
    }

    /// Composed attribute value at `time`.
    pub fn attribute_value(&self, path: &SdfPath, name: &str, time: TimeCode) -> Option<Value> {
        self.attribute(path, name).and_then(|a| a.get(time)).cloned()
    }

    /// All composed attributes, strongest opinion per name.
    pub fn attributes(&self, path: &SdfPath) -> BTreeMap<String, AttributeSpec> {
        let mut out = BTreeMap::new();
        for spec in self.prim_index(path).into_iter().rev() {
            for (name, attr) in &spec.attributes {
                out.insert(name.clone(), attr.clone());
            }
        }
        out
    }
}

/// Scoped edit target switch; restores the previous target on drop.
pub struct EditContext<'a> {
    stage: &'a mut Stage,
    previous: Option<EditTarget>,
}

impl Deref for EditContext<'_> {
    type Target = Stage;

    fn deref(&self) -> &Stage {
        self.stage
    }
}

impl DerefMut for EditContext<'_> {
    fn deref_mut(&mut self) -> &mut Stage {
        self.stage
    }
}

impl Drop for EditContext<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.stage.edit_target = previous;
        }
    }
}
