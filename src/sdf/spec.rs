//! Layer specs: prims, attributes, references and variants.

use std::collections::BTreeMap;

use super::metadata::MetaData;
use super::path::SdfPath;
use super::value::{TimeCode, Value, ValueType};

/// How a prim spec contributes to the composed prim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

impl Specifier {
    /// Keyword in text layers.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Def => "def",
            Self::Over => "over",
            Self::Class => "class",
        }
    }

    /// Parse a text keyword.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "def" => Some(Self::Def),
            "over" => Some(Self::Over),
            "class" => Some(Self::Class),
            _ => None,
        }
    }

    /// Binary tag.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Def => 0,
            Self::Over => 1,
            Self::Class => 2,
        }
    }

    /// Specifier from a binary tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Def),
            1 => Some(Self::Over),
            2 => Some(Self::Class),
            _ => None,
        }
    }
}

/// Reference or payload arc. An empty asset path targets the same layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub asset_path: String,
    pub prim_path: SdfPath,
}

impl Reference {
    /// Reference to a prim in the same layer.
    pub fn internal(prim_path: SdfPath) -> Self {
        Self {
            asset_path: String::new(),
            prim_path,
        }
    }

    /// Check if the arc targets the same layer.
    #[inline]
    pub fn is_internal(&self) -> bool {
        self.asset_path.is_empty()
    }
}

/// Attribute opinion: default value plus time samples sorted by time.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeSpec {
    pub value_type: ValueType,
    pub default: Option<Value>,
    pub time_samples: Vec<(f64, Value)>,
}

impl AttributeSpec {
    /// Declare an attribute without values.
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            default: None,
            time_samples: Vec::new(),
        }
    }

    /// Author a value at the given time, replacing an existing sample.
    pub fn set(&mut self, value: Value, time: TimeCode) {
        match time {
            TimeCode::Default => self.default = Some(value),
            TimeCode::Time(t) => {
                match self
                    .time_samples
                    .binary_search_by(|(st, _)| st.total_cmp(&t))
                {
                    Ok(i) => self.time_samples[i].1 = value,
                    Err(i) => self.time_samples.insert(i, (t, value)),
                }
            }
        }
    }

    /// Value at a time: exact or held sample, falling back to the default.
    pub fn get(&self, time: TimeCode) -> Option<&Value> {
        match time {
            TimeCode::Default => self.default.as_ref(),
            TimeCode::Time(t) => {
                if self.time_samples.is_empty() {
                    return self.default.as_ref();
                }
                let idx = self.time_samples.partition_point(|(st, _)| *st <= t);
                let idx = idx.saturating_sub(1);
                self.time_samples.get(idx).map(|(_, v)| v)
            }
        }
    }

    /// Check if the attribute has time samples.
    #[inline]
    pub fn is_animated(&self) -> bool {
        !self.time_samples.is_empty()
    }
}

/// One alternative inside a variant set. Its prim spec holds the opinions.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantSpec {
    pub name: String,
    pub prim: PrimSpec,
}

/// Named set of variants on a prim.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantSetSpec {
    pub name: String,
    pub variants: Vec<VariantSpec>,
}

impl VariantSetSpec {
    /// Create an empty variant set.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variants: Vec::new(),
        }
    }

    /// Find a variant by name.
    pub fn variant(&self, name: &str) -> Option<&VariantSpec> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Find or create a variant.
    pub fn ensure_variant(&mut self, name: &str) -> &mut VariantSpec {
        let idx = match self.variants.iter().position(|v| v.name == name) {
            Some(i) => i,
            None => {
                self.variants.push(VariantSpec {
                    name: name.to_string(),
                    prim: PrimSpec::new(name, Specifier::Over),
                });
                self.variants.len() - 1
            }
        };
        &mut self.variants[idx]
    }

    /// Variant names in authoring order.
    pub fn variant_names(&self) -> Vec<String> {
        self.variants.iter().map(|v| v.name.clone()).collect()
    }
}

/// Prim opinion in a layer.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimSpec {
    pub name: String,
    pub specifier: Specifier,
    pub type_name: String,
    pub active: Option<bool>,
    pub metadata: MetaData,
    pub references: Vec<Reference>,
    pub payloads: Vec<Reference>,
    pub variant_selections: BTreeMap<String, String>,
    pub variant_sets: Vec<VariantSetSpec>,
    pub attributes: BTreeMap<String, AttributeSpec>,
    pub children: Vec<PrimSpec>,
}

impl PrimSpec {
    /// Create an empty prim spec.
    pub fn new(name: &str, specifier: Specifier) -> Self {
        Self {
            name: name.to_string(),
            specifier,
            type_name: String::new(),
            active: None,
            metadata: MetaData::new(),
            references: Vec::new(),
            payloads: Vec::new(),
            variant_selections: BTreeMap::new(),
            variant_sets: Vec::new(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Find a child spec.
    pub fn child(&self, name: &str) -> Option<&PrimSpec> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Find a child spec for editing.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut PrimSpec> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Find or create a child spec with the given specifier.
    pub fn ensure_child(&mut self, name: &str, specifier: Specifier) -> &mut PrimSpec {
        let idx = match self.children.iter().position(|c| c.name == name) {
            Some(i) => i,
            None => {
                self.children.push(PrimSpec::new(name, specifier));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    /// Remove a child spec and its subtree.
    pub fn remove_child(&mut self, name: &str) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c.name != name);
        before != self.children.len()
    }

    /// Walk down relative components, creating missing specs.
    pub fn ensure_descendant(&mut self, components: &[&str], specifier: Specifier) -> &mut PrimSpec {
        let mut cur = self;
        for name in components {
            cur = cur.ensure_child(name, specifier);
        }
        cur
    }

    /// Walk down relative components.
    pub fn descendant(&self, components: &[&str]) -> Option<&PrimSpec> {
        let mut cur = self;
        for name in components {
            cur = cur.child(name)?;
        }
        Some(cur)
    }

    /// Walk down relative components for editing.
    pub fn descendant_mut(&mut self, components: &[&str]) -> Option<&mut PrimSpec> {
        let mut cur = self;
        for name in components {
            cur = cur.child_mut(name)?;
        }
        Some(cur)
    }

    /// Find a variant set.
    pub fn variant_set(&self, name: &str) -> Option<&VariantSetSpec> {
        self.variant_sets.iter().find(|v| v.name == name)
    }

    /// Find a variant set for editing.
    pub fn variant_set_mut(&mut self, name: &str) -> Option<&mut VariantSetSpec> {
        self.variant_sets.iter_mut().find(|v| v.name == name)
    }

    /// Find or create a variant set.
    pub fn ensure_variant_set(&mut self, name: &str) -> &mut VariantSetSpec {
        let idx = match self.variant_sets.iter().position(|v| v.name == name) {
            Some(i) => i,
            None => {
                self.variant_sets.push(VariantSetSpec::new(name));
                self.variant_sets.len() - 1
            }
        };
        &mut self.variant_sets[idx]
    }

    /// Author an attribute value.
    pub fn set_attribute(&mut self, name: &str, value: Value, time: TimeCode) {
        let value_type = value.value_type();
        let attr = self
            .attributes
            .entry(name.to_string())
            .or_insert_with(|| AttributeSpec::new(value_type));
        attr.value_type = value_type;
        attr.set(value, time);
    }

    /// Visit every value authored in this spec and below, including variants.
    pub fn for_each_value_mut(&mut self, f: &mut dyn FnMut(&mut Value)) {
        for attr in self.attributes.values_mut() {
            if let Some(v) = attr.default.as_mut() {
                f(v);
            }
            for (_, v) in attr.time_samples.iter_mut() {
                f(v);
            }
        }
        for vset in self.variant_sets.iter_mut() {
            for variant in vset.variants.iter_mut() {
                variant.prim.for_each_value_mut(f);
            }
        }
        for child in self.children.iter_mut() {
            child.for_each_value_mut(f);
        }
    }

    /// Visit every reference and payload arc in this spec and below, including variants.
    pub fn for_each_arc_mut(&mut self, f: &mut dyn FnMut(&mut Reference)) {
        for arc in self.references.iter_mut().chain(self.payloads.iter_mut()) {
            f(arc);
        }
        for vset in self.variant_sets.iter_mut() {
            for variant in vset.variants.iter_mut() {
                variant.prim.for_each_arc_mut(f);
            }
        }
        for child in self.children.iter_mut() {
            child.for_each_arc_mut(f);
        }
    }
}
