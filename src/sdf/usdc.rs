//! Binary layer encoding (`.usd` / `.usdc`).
//!
//! Little-endian, length-prefixed records:
//!
//! ```text
//! magic "SDFLAYER" | u16 version | layer metadata | pseudo-root prim
//! ```
//!
//! Prims are written depth first. Every count is a u32, every string a u32
//! length followed by UTF-8 bytes.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{DMat4, DVec3};

use super::layer::{Layer, LayerMetadata};
use super::metadata::MetaData;
use super::path::SdfPath;
use super::spec::{AttributeSpec, PrimSpec, Reference, Specifier, VariantSetSpec, VariantSpec};
use super::value::{Value, ValueType};
use crate::util::{Error, Result};

/// File magic.
pub const MAGIC: &[u8; 8] = b"SDFLAYER";
/// Encoding version.
pub const VERSION: u16 = 1;

const MAX_DEPTH: usize = 512;

/// Encode a layer.
pub fn write_layer(layer: &Layer) -> Result<Vec<u8>> {
    let mut w = LayerWriter { buf: Vec::with_capacity(4096) };
    w.buf.extend_from_slice(MAGIC);
    w.buf.write_u16::<LittleEndian>(VERSION)?;
    w.write_metadata(&layer.metadata)?;
    w.write_prim(&layer.pseudo_root)?;
    Ok(w.buf)
}

/// Decode a layer into `layer`, replacing its content.
pub fn read_layer(bytes: &[u8], layer: &mut Layer) -> Result<()> {
    let mut r = LayerReader { cur: Cursor::new(bytes) };
    let mut magic = [0u8; 8];
    r.cur.read_exact(&mut magic).map_err(eof)?;
    if &magic != MAGIC {
        return Err(Error::invalid("bad magic"));
    }
    let version = r.cur.read_u16::<LittleEndian>().map_err(eof)?;
    if version != VERSION {
        return Err(Error::invalid(format!("unsupported version {}", version)));
    }
    layer.metadata = r.read_metadata()?;
    layer.pseudo_root = r.read_prim(0)?;
    Ok(())
}

fn eof(_: std::io::Error) -> Error {
    Error::invalid("unexpected end of data")
}

struct LayerWriter {
    buf: Vec<u8>,
}

impl LayerWriter {
    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.buf.write_u8(v)?;
        Ok(())
    }

    fn write_count(&mut self, n: usize) -> Result<()> {
        let n = u32::try_from(n).map_err(|_| Error::other("collection too large"))?;
        self.buf.write_u32::<LittleEndian>(n)?;
        Ok(())
    }

    fn write_f64(&mut self, v: f64) -> Result<()> {
        self.buf.write_f64::<LittleEndian>(v)?;
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_count(s.len())?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn write_opt_str(&mut self, s: &Option<String>) -> Result<()> {
        match s {
            Some(s) => {
                self.write_u8(1)?;
                self.write_str(s)
            }
            None => self.write_u8(0),
        }
    }

    fn write_opt_f64(&mut self, v: Option<f64>) -> Result<()> {
        match v {
            Some(v) => {
                self.write_u8(1)?;
                self.write_f64(v)
            }
            None => self.write_u8(0),
        }
    }

    fn write_vec3(&mut self, v: &DVec3) -> Result<()> {
        self.write_f64(v.x)?;
        self.write_f64(v.y)?;
        self.write_f64(v.z)
    }

    fn write_metadata(&mut self, md: &LayerMetadata) -> Result<()> {
        self.write_opt_str(&md.default_prim)?;
        self.write_opt_str(&md.up_axis)?;
        self.write_opt_f64(md.meters_per_unit)?;
        self.write_opt_f64(md.start_time_code)?;
        self.write_opt_f64(md.end_time_code)?;
        self.write_opt_f64(md.time_codes_per_second)?;
        self.write_opt_f64(md.frames_per_second)?;
        self.write_dictionary(&md.custom_layer_data)
    }

    fn write_dictionary(&mut self, dict: &BTreeMap<String, Value>) -> Result<()> {
        self.write_count(dict.len())?;
        for (k, v) in dict {
            self.write_str(k)?;
            self.write_value(v)?;
        }
        Ok(())
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        self.write_u8(value.value_type().tag())?;
        match value {
            Value::Bool(b) => self.write_u8(*b as u8),
            Value::Int(i) => {
                self.buf.write_i64::<LittleEndian>(*i)?;
                Ok(())
            }
            Value::Double(d) => self.write_f64(*d),
            Value::String(s) | Value::Token(s) | Value::Asset(s) => self.write_str(s),
            Value::Double3(v) => self.write_vec3(v),
            Value::Matrix4d(m) => {
                for f in m.to_cols_array() {
                    self.write_f64(f)?;
                }
                Ok(())
            }
            Value::IntArray(a) => {
                self.write_count(a.len())?;
                for i in a {
                    self.buf.write_i64::<LittleEndian>(*i)?;
                }
                Ok(())
            }
            Value::DoubleArray(a) => {
                self.write_count(a.len())?;
                for f in a {
                    self.write_f64(*f)?;
                }
                Ok(())
            }
            Value::Double3Array(a) => {
                self.write_count(a.len())?;
                for v in a {
                    self.write_vec3(v)?;
                }
                Ok(())
            }
            Value::TokenArray(a) => {
                self.write_count(a.len())?;
                for s in a {
                    self.write_str(s)?;
                }
                Ok(())
            }
            Value::Dictionary(d) => self.write_dictionary(d),
        }
    }

    fn write_references(&mut self, refs: &[Reference]) -> Result<()> {
        self.write_count(refs.len())?;
        for r in refs {
            self.write_str(&r.asset_path)?;
            self.write_str(r.prim_path.as_str())?;
        }
        Ok(())
    }

    fn write_prim(&mut self, prim: &PrimSpec) -> Result<()> {
        self.write_str(&prim.name)?;
        self.write_u8(prim.specifier.tag())?;
        self.write_str(&prim.type_name)?;
        self.write_u8(match prim.active {
            None => 0,
            Some(false) => 1,
            Some(true) => 2,
        })?;

        self.write_count(prim.metadata.len())?;
        for (k, v) in prim.metadata.iter() {
            self.write_str(k)?;
            self.write_str(v)?;
        }

        self.write_references(&prim.references)?;
        self.write_references(&prim.payloads)?;

        self.write_count(prim.variant_selections.len())?;
        for (set, sel) in &prim.variant_selections {
            self.write_str(set)?;
            self.write_str(sel)?;
        }

        self.write_count(prim.attributes.len())?;
        for (name, attr) in &prim.attributes {
            self.write_str(name)?;
            self.write_u8(attr.value_type.tag())?;
            match &attr.default {
                Some(v) => {
                    self.write_u8(1)?;
                    self.write_value(v)?;
                }
                None => self.write_u8(0)?,
            }
            self.write_count(attr.time_samples.len())?;
            for (t, v) in &attr.time_samples {
                self.write_f64(*t)?;
                self.write_value(v)?;
            }
        }

        self.write_count(prim.variant_sets.len())?;
        for vset in &prim.variant_sets {
            self.write_str(&vset.name)?;
            self.write_count(vset.variants.len())?;
            for variant in &vset.variants {
                self.write_str(&variant.name)?;
                self.write_prim(&variant.prim)?;
            }
        }

        self.write_count(prim.children.len())?;
        for child in &prim.children {
            self.write_prim(child)?;
        }
        Ok(())
    }
}

struct LayerReader<'a> {
    cur: Cursor<&'a [u8]>,
}

impl LayerReader<'_> {
    fn remaining(&self) -> usize {
        let len = self.cur.get_ref().len() as u64;
        len.saturating_sub(self.cur.position()) as usize
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.cur.read_u8().map_err(eof)
    }

    fn read_count(&mut self) -> Result<usize> {
        let n = self.cur.read_u32::<LittleEndian>().map_err(eof)? as usize;
        if n > self.remaining() {
            return Err(Error::invalid(format!("count {} exceeds remaining data", n)));
        }
        Ok(n)
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.cur.read_f64::<LittleEndian>().map_err(eof)
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.cur.read_i64::<LittleEndian>().map_err(eof)
    }

    fn read_str(&mut self) -> Result<String> {
        let len = self.read_count()?;
        let mut bytes = vec![0u8; len];
        self.cur.read_exact(&mut bytes).map_err(eof)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn read_opt_str(&mut self) -> Result<Option<String>> {
        match self.read_u8()? {
            0 => Ok(None),
            _ => Ok(Some(self.read_str()?)),
        }
    }

    fn read_opt_f64(&mut self) -> Result<Option<f64>> {
        match self.read_u8()? {
            0 => Ok(None),
            _ => Ok(Some(self.read_f64()?)),
        }
    }

    fn read_vec3(&mut self) -> Result<DVec3> {
        Ok(DVec3::new(self.read_f64()?, self.read_f64()?, self.read_f64()?))
    }

    fn read_metadata(&mut self) -> Result<LayerMetadata> {
        Ok(LayerMetadata {
            default_prim: self.read_opt_str()?,
            up_axis: self.read_opt_str()?,
            meters_per_unit: self.read_opt_f64()?,
            start_time_code: self.read_opt_f64()?,
            end_time_code: self.read_opt_f64()?,
            time_codes_per_second: self.read_opt_f64()?,
            frames_per_second: self.read_opt_f64()?,
            custom_layer_data: self.read_dictionary(0)?,
        })
    }

    fn read_dictionary(&mut self, depth: usize) -> Result<BTreeMap<String, Value>> {
        let n = self.read_count()?;
        let mut dict = BTreeMap::new();
        for _ in 0..n {
            let key = self.read_str()?;
            let value = self.read_value(depth + 1)?;
            dict.insert(key, value);
        }
        Ok(dict)
    }

    fn read_value(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(Error::invalid("value nesting too deep"));
        }
        let tag = self.read_u8()?;
        let value_type =
            ValueType::from_tag(tag).ok_or_else(|| Error::invalid(format!("bad value tag {}", tag)))?;
        Ok(match value_type {
            ValueType::Bool => Value::Bool(self.read_u8()? != 0),
            ValueType::Int => Value::Int(self.read_i64()?),
            ValueType::Double => Value::Double(self.read_f64()?),
            ValueType::String => Value::String(self.read_str()?),
            ValueType::Token => Value::Token(self.read_str()?),
            ValueType::Asset => Value::Asset(self.read_str()?),
            ValueType::Double3 => Value::Double3(self.read_vec3()?),
            ValueType::Matrix4d => {
                let mut cols = [0.0f64; 16];
                for f in cols.iter_mut() {
                    *f = self.read_f64()?;
                }
                Value::Matrix4d(DMat4::from_cols_array(&cols))
            }
            ValueType::IntArray => {
                let n = self.read_count()?;
                let mut a = Vec::with_capacity(n);
                for _ in 0..n {
                    a.push(self.read_i64()?);
                }
                Value::IntArray(a)
            }
            ValueType::DoubleArray => {
                let n = self.read_count()?;
                let mut a = Vec::with_capacity(n);
                for _ in 0..n {
                    a.push(self.read_f64()?);
                }
                Value::DoubleArray(a)
            }
            ValueType::Double3Array => {
                let n = self.read_count()?;
                let mut a = Vec::with_capacity(n);
                for _ in 0..n {
                    a.push(self.read_vec3()?);
                }
                Value::Double3Array(a)
            }
            ValueType::TokenArray => {
                let n = self.read_count()?;
                let mut a = Vec::with_capacity(n);
                for _ in 0..n {
                    a.push(self.read_str()?);
                }
                Value::TokenArray(a)
            }
            ValueType::Dictionary => Value::Dictionary(self.read_dictionary(depth)?),
        })
    }

    fn read_references(&mut self) -> Result<Vec<Reference>> {
        let n = self.read_count()?;
        let mut refs = Vec::with_capacity(n);
        for _ in 0..n {
            let asset_path = self.read_str()?;
            // External arcs without a target prim store an empty path.
            let target = self.read_str()?;
            let prim_path = if target.is_empty() {
                SdfPath::empty()
            } else {
                SdfPath::new(&target)?
            };
            refs.push(Reference { asset_path, prim_path });
        }
        Ok(refs)
    }

    fn read_prim(&mut self, depth: usize) -> Result<PrimSpec> {
        if depth > MAX_DEPTH {
            return Err(Error::invalid("prim nesting too deep"));
        }
        let name = self.read_str()?;
        let tag = self.read_u8()?;
        let specifier =
            Specifier::from_tag(tag).ok_or_else(|| Error::invalid(format!("bad specifier {}", tag)))?;
        let mut prim = PrimSpec::new(&name, specifier);
        prim.type_name = self.read_str()?;
        prim.active = match self.read_u8()? {
            0 => None,
            1 => Some(false),
            _ => Some(true),
        };

        let n = self.read_count()?;
        let mut metadata = MetaData::new();
        for _ in 0..n {
            let k = self.read_str()?;
            let v = self.read_str()?;
            metadata.set(k, v);
        }
        prim.metadata = metadata;

        prim.references = self.read_references()?;
        prim.payloads = self.read_references()?;

        let n = self.read_count()?;
        for _ in 0..n {
            let set = self.read_str()?;
            let sel = self.read_str()?;
            prim.variant_selections.insert(set, sel);
        }

        let n = self.read_count()?;
        for _ in 0..n {
            let name = self.read_str()?;
            let tag = self.read_u8()?;
            let value_type = ValueType::from_tag(tag)
                .ok_or_else(|| Error::invalid(format!("bad attribute type {}", tag)))?;
            let mut attr = AttributeSpec::new(value_type);
            if self.read_u8()? != 0 {
                attr.default = Some(self.read_value(0)?);
            }
            let samples = self.read_count()?;
            for _ in 0..samples {
                let t = self.read_f64()?;
                let v = self.read_value(0)?;
                attr.time_samples.push((t, v));
            }
            prim.attributes.insert(name, attr);
        }

        let n = self.read_count()?;
        for _ in 0..n {
            let mut vset = VariantSetSpec::new(&self.read_str()?);
            let variants = self.read_count()?;
            for _ in 0..variants {
                let name = self.read_str()?;
                let prim = self.read_prim(depth + 1)?;
                vset.variants.push(VariantSpec { name, prim });
            }
            prim.variant_sets.push(vset);
        }

        let n = self.read_count()?;
        for _ in 0..n {
            prim.children.push(self.read_prim(depth + 1)?);
        }
        Ok(prim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::value::TimeCode;

    #[test]
    fn test_binary_layer_roundtrip() {
        let mut layer = Layer::create_anonymous("bin");
        layer.metadata.default_prim = Some("root".into());
        layer.metadata.meters_per_unit = Some(0.01);
        layer
            .metadata
            .custom_layer_data
            .insert("exporter".into(), Value::String("usd-export".into()));

        let root = layer.ensure_prim(&SdfPath::new("/root").unwrap(), Specifier::Def);
        root.type_name = "Xform".into();
        root.metadata.set(MetaData::KIND, "component");
        root.references.push(Reference::internal(SdfPath::new("/base").unwrap()));
        root.set_attribute("xformOp:transform", Value::Matrix4d(DMat4::IDENTITY), TimeCode::Default);
        root.set_attribute("size", Value::Double(2.0), TimeCode::Time(1.0));
        let vset = root.ensure_variant_set("modelingVariant");
        vset.ensure_variant("a").prim.ensure_child("geo", Specifier::Over).active = Some(false);
        root.variant_selections.insert("modelingVariant".into(), "a".into());

        let bytes = write_layer(&layer).unwrap();
        let mut decoded = Layer::create_anonymous("out");
        read_layer(&bytes, &mut decoded).unwrap();

        assert_eq!(decoded.metadata, layer.metadata);
        assert_eq!(decoded.pseudo_root, layer.pseudo_root);
    }

    #[test]
    fn test_external_arcs_without_target_roundtrip() {
        let mut layer = Layer::create_anonymous("bin");
        let proxy = layer.ensure_prim(&SdfPath::new("/asset/setShape").unwrap(), Specifier::Def);
        proxy.references.push(Reference {
            asset_path: "set.usda".into(),
            prim_path: SdfPath::empty(),
        });
        proxy.payloads.push(Reference {
            asset_path: "heavy.usdc".into(),
            prim_path: SdfPath::empty(),
        });

        let bytes = write_layer(&layer).unwrap();
        let mut decoded = Layer::create_anonymous("out");
        read_layer(&bytes, &mut decoded).unwrap();

        assert_eq!(decoded.pseudo_root, layer.pseudo_root);
        let proxy = decoded.prim_at_path(&SdfPath::new("/asset/setShape").unwrap()).unwrap();
        assert!(proxy.references[0].prim_path.is_empty());
        assert_eq!(proxy.payloads[0].asset_path, "heavy.usdc");
    }

    #[test]
    fn test_truncated_data_rejected() {
        let layer = Layer::create_anonymous("bin");
        let bytes = write_layer(&layer).unwrap();
        let mut decoded = Layer::create_anonymous("out");
        assert!(read_layer(&bytes[..bytes.len() - 2], &mut decoded).is_err());
        assert!(read_layer(b"NOTALAYER", &mut decoded).is_err());
    }
}
