//! Text layer encoding (`.usda`).
//!
//! The writer emits a stable subset of the text syntax; the reader accepts
//! what the writer produces plus list-op prefixes and `uniform`/`custom`
//! qualifiers.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use glam::{DMat4, DVec3};

use super::layer::{Layer, LayerMetadata};
use super::metadata::MetaData;
use super::path::SdfPath;
use super::spec::{AttributeSpec, PrimSpec, Reference, Specifier, VariantSpec};
use super::value::{Value, ValueType};
use crate::util::{Error, Result};

/// First line of every text layer.
pub const HEADER: &str = "#usda 1.0";

const INDENT: &str = "    ";

// ============================================================================
// Writer
// ============================================================================

/// Encode a layer as text.
pub fn write_layer(layer: &Layer) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    write_layer_metadata(&layer.metadata, &mut out);
    for prim in &layer.pseudo_root.children {
        out.push('\n');
        write_prim(prim, 0, &mut out);
    }
    out
}

fn pad(depth: usize) -> String {
    INDENT.repeat(depth)
}

fn write_layer_metadata(md: &LayerMetadata, out: &mut String) {
    let mut lines = Vec::new();
    if !md.custom_layer_data.is_empty() {
        let mut s = String::from("customLayerData = ");
        write_dictionary(&md.custom_layer_data, 1, &mut s);
        lines.push(s);
    }
    if let Some(v) = &md.default_prim {
        lines.push(format!("defaultPrim = {}", quote(v)));
    }
    if let Some(v) = md.end_time_code {
        lines.push(format!("endTimeCode = {}", v));
    }
    if let Some(v) = md.frames_per_second {
        lines.push(format!("framesPerSecond = {}", v));
    }
    if let Some(v) = md.meters_per_unit {
        lines.push(format!("metersPerUnit = {}", v));
    }
    if let Some(v) = md.start_time_code {
        lines.push(format!("startTimeCode = {}", v));
    }
    if let Some(v) = md.time_codes_per_second {
        lines.push(format!("timeCodesPerSecond = {}", v));
    }
    if let Some(v) = &md.up_axis {
        lines.push(format!("upAxis = {}", quote(v)));
    }
    if lines.is_empty() {
        return;
    }
    out.push_str("(\n");
    for line in lines {
        out.push_str(INDENT);
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(")\n");
}

fn quote(s: &str) -> String {
    let mut q = String::with_capacity(s.len() + 2);
    q.push('"');
    for c in s.chars() {
        match c {
            '"' => q.push_str("\\\""),
            '\\' => q.push_str("\\\\"),
            '\n' => q.push_str("\\n"),
            '\t' => q.push_str("\\t"),
            _ => q.push(c),
        }
    }
    q.push('"');
    q
}

fn fmt_vec3(v: &DVec3) -> String {
    format!("({}, {}, {})", v.x, v.y, v.z)
}

fn fmt_reference(r: &Reference) -> String {
    let mut s = String::new();
    if !r.asset_path.is_empty() {
        let _ = write!(s, "@{}@", r.asset_path);
    }
    if !r.prim_path.is_empty() {
        let _ = write!(s, "<{}>", r.prim_path);
    }
    s
}

fn write_value(value: &Value, depth: usize, out: &mut String) {
    match value {
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => {
            let _ = write!(out, "{}", i);
        }
        Value::Double(d) => {
            let _ = write!(out, "{}", d);
        }
        Value::String(s) | Value::Token(s) => out.push_str(&quote(s)),
        Value::Asset(s) => {
            let _ = write!(out, "@{}@", s);
        }
        Value::Double3(v) => out.push_str(&fmt_vec3(v)),
        Value::Matrix4d(m) => {
            let cols: Vec<String> = m
                .to_cols_array_2d()
                .iter()
                .map(|c| format!("({}, {}, {}, {})", c[0], c[1], c[2], c[3]))
                .collect();
            let _ = write!(out, "( {} )", cols.join(", "));
        }
        Value::IntArray(a) => {
            let items: Vec<String> = a.iter().map(|i| i.to_string()).collect();
            let _ = write!(out, "[{}]", items.join(", "));
        }
        Value::DoubleArray(a) => {
            let items: Vec<String> = a.iter().map(|d| d.to_string()).collect();
            let _ = write!(out, "[{}]", items.join(", "));
        }
        Value::Double3Array(a) => {
            let items: Vec<String> = a.iter().map(fmt_vec3).collect();
            let _ = write!(out, "[{}]", items.join(", "));
        }
        Value::TokenArray(a) => {
            let items: Vec<String> = a.iter().map(|s| quote(s)).collect();
            let _ = write!(out, "[{}]", items.join(", "));
        }
        Value::Dictionary(d) => write_dictionary(d, depth, out),
    }
}

fn write_dictionary(dict: &BTreeMap<String, Value>, depth: usize, out: &mut String) {
    out.push_str("{\n");
    for (key, value) in dict {
        let _ = write!(out, "{}{} {} = ", pad(depth + 1), value.value_type().name(), key);
        write_value(value, depth + 1, out);
        out.push('\n');
    }
    out.push_str(&pad(depth));
    out.push('}');
}

fn write_prim_metadata(prim: &PrimSpec, depth: usize, out: &mut String) {
    let inner = pad(depth + 1);
    let mut lines: Vec<String> = Vec::new();
    if let Some(active) = prim.active {
        lines.push(format!("active = {}", active));
    }
    if let Some(kind) = prim.metadata.kind() {
        lines.push(format!("kind = {}", quote(kind)));
    }
    let custom: BTreeMap<String, Value> = prim
        .metadata
        .iter()
        .filter(|(k, _)| *k != MetaData::KIND)
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    if !custom.is_empty() {
        let mut s = String::from("customData = ");
        write_dictionary(&custom, depth + 1, &mut s);
        lines.push(s);
    }
    if !prim.references.is_empty() {
        let refs: Vec<String> = prim.references.iter().map(fmt_reference).collect();
        lines.push(format!("prepend references = [{}]", refs.join(", ")));
    }
    if !prim.payloads.is_empty() {
        let refs: Vec<String> = prim.payloads.iter().map(fmt_reference).collect();
        lines.push(format!("prepend payload = [{}]", refs.join(", ")));
    }
    if !prim.variant_selections.is_empty() {
        let mut s = String::from("variants = {\n");
        for (set, sel) in &prim.variant_selections {
            let _ = writeln!(s, "{}{}string {} = {}", inner, INDENT, set, quote(sel));
        }
        s.push_str(&inner);
        s.push('}');
        lines.push(s);
    }
    if !prim.variant_sets.is_empty() {
        let names: Vec<String> = prim.variant_sets.iter().map(|v| quote(&v.name)).collect();
        lines.push(format!("prepend variantSets = [{}]", names.join(", ")));
    }
    if lines.is_empty() {
        out.push('\n');
        return;
    }
    out.push_str(" (\n");
    for line in lines {
        out.push_str(&inner);
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(&pad(depth));
    out.push_str(")\n");
}

fn write_prim_body(prim: &PrimSpec, depth: usize, out: &mut String) {
    let indent = pad(depth);
    let inner = pad(depth + 1);
    out.push_str(&indent);
    out.push_str("{\n");

    for (name, attr) in &prim.attributes {
        let type_name = attr.value_type.name();
        match &attr.default {
            Some(v) => {
                let _ = write!(out, "{}{} {} = ", inner, type_name, name);
                write_value(v, depth + 1, out);
                out.push('\n');
            }
            None if attr.time_samples.is_empty() => {
                let _ = writeln!(out, "{}{} {}", inner, type_name, name);
            }
            None => {}
        }
        if !attr.time_samples.is_empty() {
            let _ = writeln!(out, "{}{} {}.timeSamples = {{", inner, type_name, name);
            for (t, v) in &attr.time_samples {
                let _ = write!(out, "{}{}{}: ", inner, INDENT, t);
                write_value(v, depth + 2, out);
                out.push_str(",\n");
            }
            let _ = writeln!(out, "{}}}", inner);
        }
    }

    for (i, child) in prim.children.iter().enumerate() {
        if i > 0 || !prim.attributes.is_empty() {
            out.push('\n');
        }
        write_prim(child, depth + 1, out);
    }

    for vset in &prim.variant_sets {
        out.push('\n');
        let _ = writeln!(out, "{}variantSet {} = {{", inner, quote(&vset.name));
        for variant in &vset.variants {
            let _ = write!(out, "{}{}{}", inner, INDENT, quote(&variant.name));
            write_prim_metadata(&variant.prim, depth + 2, out);
            write_prim_body(&variant.prim, depth + 2, out);
        }
        let _ = writeln!(out, "{}}}", inner);
    }

    out.push_str(&indent);
    out.push_str("}\n");
}

fn write_prim(prim: &PrimSpec, depth: usize, out: &mut String) {
    out.push_str(&pad(depth));
    out.push_str(prim.specifier.keyword());
    if !prim.type_name.is_empty() {
        out.push(' ');
        out.push_str(&prim.type_name);
    }
    out.push(' ');
    out.push_str(&quote(&prim.name));
    write_prim_metadata(prim, depth, out);
    write_prim_body(prim, depth, out);
}

// ============================================================================
// Reader
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Word(String),
    Str(String),
    Path(String),
    Asset(String),
    Punct(char),
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '-' | '+')
}

fn tokenize(text: &str) -> Result<Vec<(Tok, usize)>> {
    let mut toks = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    let mut line = 1;
    let err = |line: usize, msg: &str| Error::Parse {
        line,
        message: msg.to_string(),
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '"' => {
                i += 1;
                let mut s = String::new();
                loop {
                    let c = *chars.get(i).ok_or_else(|| err(line, "unterminated string"))?;
                    i += 1;
                    match c {
                        '"' => break,
                        '\\' => {
                            let e = *chars.get(i).ok_or_else(|| err(line, "bad escape"))?;
                            i += 1;
                            s.push(match e {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                        }
                        '\n' => return Err(err(line, "newline in string")),
                        _ => s.push(c),
                    }
                }
                toks.push((Tok::Str(s), line));
            }
            '<' | '@' => {
                let close = if c == '<' { '>' } else { '@' };
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != close {
                    if chars[i] == '\n' {
                        return Err(err(line, "unterminated path"));
                    }
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(err(line, "unterminated path"));
                }
                let s: String = chars[start..i].iter().collect();
                i += 1;
                toks.push((if c == '<' { Tok::Path(s) } else { Tok::Asset(s) }, line));
            }
            '(' | ')' | '{' | '}' | '[' | ']' | '=' | ',' => {
                toks.push((Tok::Punct(c), line));
                i += 1;
            }
            c if is_word_char(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                let mut w: String = chars[start..i].iter().collect();
                if chars.get(i) == Some(&'[') && chars.get(i + 1) == Some(&']') {
                    w.push_str("[]");
                    i += 2;
                }
                toks.push((Tok::Word(w), line));
            }
            _ => return Err(err(line, &format!("unexpected character '{}'", c))),
        }
    }
    Ok(toks)
}

struct Parser {
    toks: Vec<(Tok, usize)>,
    pos: usize,
}

impl Parser {
    /// Line of the last consumed token.
    fn line(&self) -> usize {
        self.toks
            .get(self.pos.saturating_sub(1))
            .or_else(|| self.toks.last())
            .map(|(_, l)| *l)
            .unwrap_or(0)
    }

    fn error(&self, msg: impl Into<String>) -> Error {
        Error::Parse {
            line: self.line(),
            message: msg.into(),
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|(t, _)| t)
    }

    fn at_punct(&self, c: char) -> bool {
        self.peek() == Some(&Tok::Punct(c))
    }

    fn next(&mut self) -> Result<Tok> {
        let tok = self
            .toks
            .get(self.pos)
            .map(|(t, _)| t.clone())
            .ok_or_else(|| self.error("unexpected end of layer"))?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        match self.next()? {
            Tok::Punct(p) if p == c => Ok(()),
            other => Err(self.error(format!("expected '{}', found {:?}", c, other))),
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.at_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self) -> Result<String> {
        match self.next()? {
            Tok::Word(w) => Ok(w),
            other => Err(self.error(format!("expected identifier, found {:?}", other))),
        }
    }

    fn expect_str(&mut self) -> Result<String> {
        match self.next()? {
            Tok::Str(s) => Ok(s),
            other => Err(self.error(format!("expected string, found {:?}", other))),
        }
    }

    fn expect_f64(&mut self) -> Result<f64> {
        let w = self.expect_word()?;
        w.parse::<f64>()
            .map_err(|_| self.error(format!("expected number, found '{}'", w)))
    }

    fn expect_i64(&mut self) -> Result<i64> {
        let w = self.expect_word()?;
        w.parse::<i64>()
            .map_err(|_| self.error(format!("expected integer, found '{}'", w)))
    }

    fn parse_bool(&mut self) -> Result<bool> {
        match self.expect_word()?.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(self.error(format!("expected bool, found '{}'", other))),
        }
    }

    fn parse_vec3(&mut self) -> Result<DVec3> {
        self.expect_punct('(')?;
        let x = self.expect_f64()?;
        self.expect_punct(',')?;
        let y = self.expect_f64()?;
        self.expect_punct(',')?;
        let z = self.expect_f64()?;
        self.expect_punct(')')?;
        Ok(DVec3::new(x, y, z))
    }

    fn parse_matrix(&mut self) -> Result<DMat4> {
        self.expect_punct('(')?;
        let mut cols = [[0.0f64; 4]; 4];
        for (ci, col) in cols.iter_mut().enumerate() {
            if ci > 0 {
                self.expect_punct(',')?;
            }
            self.expect_punct('(')?;
            for (ri, f) in col.iter_mut().enumerate() {
                if ri > 0 {
                    self.expect_punct(',')?;
                }
                *f = self.expect_f64()?;
            }
            self.expect_punct(')')?;
        }
        self.expect_punct(')')?;
        Ok(DMat4::from_cols_array_2d(&cols))
    }

    /// Parse `[a, b, ...]` with an item parser.
    fn parse_list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        self.expect_punct('[')?;
        let mut items = Vec::new();
        loop {
            if self.eat_punct(']') {
                break;
            }
            items.push(item(self)?);
            if !self.eat_punct(',') {
                self.expect_punct(']')?;
                break;
            }
        }
        Ok(items)
    }

    fn parse_value(&mut self, value_type: ValueType) -> Result<Value> {
        Ok(match value_type {
            ValueType::Bool => Value::Bool(self.parse_bool()?),
            ValueType::Int => Value::Int(self.expect_i64()?),
            ValueType::Double => Value::Double(self.expect_f64()?),
            ValueType::String => Value::String(self.expect_str()?),
            ValueType::Token => Value::Token(self.expect_str()?),
            ValueType::Asset => match self.next()? {
                Tok::Asset(a) => Value::Asset(a),
                other => return Err(self.error(format!("expected asset path, found {:?}", other))),
            },
            ValueType::Double3 => Value::Double3(self.parse_vec3()?),
            ValueType::Matrix4d => Value::Matrix4d(self.parse_matrix()?),
            ValueType::IntArray => Value::IntArray(self.parse_list(|p| p.expect_i64())?),
            ValueType::DoubleArray => Value::DoubleArray(self.parse_list(|p| p.expect_f64())?),
            ValueType::Double3Array => Value::Double3Array(self.parse_list(|p| p.parse_vec3())?),
            ValueType::TokenArray => Value::TokenArray(self.parse_list(|p| p.expect_str())?),
            ValueType::Dictionary => Value::Dictionary(self.parse_dictionary()?),
        })
    }

    fn parse_value_type(&mut self) -> Result<ValueType> {
        let w = self.expect_word()?;
        ValueType::from_name(&w).ok_or_else(|| self.error(format!("unknown value type '{}'", w)))
    }

    fn parse_dictionary(&mut self) -> Result<BTreeMap<String, Value>> {
        self.expect_punct('{')?;
        let mut dict = BTreeMap::new();
        while !self.eat_punct('}') {
            let value_type = self.parse_value_type()?;
            let key = match self.next()? {
                Tok::Word(w) | Tok::Str(w) => w,
                other => return Err(self.error(format!("expected key, found {:?}", other))),
            };
            self.expect_punct('=')?;
            let value = self.parse_value(value_type)?;
            dict.insert(key, value);
        }
        Ok(dict)
    }

    fn parse_reference(&mut self) -> Result<Reference> {
        let mut asset_path = String::new();
        let mut prim_path = SdfPath::empty();
        if matches!(self.peek(), Some(Tok::Asset(_))) {
            if let Tok::Asset(a) = self.next()? {
                asset_path = a;
            }
        }
        if matches!(self.peek(), Some(Tok::Path(_))) {
            if let Tok::Path(p) = self.next()? {
                prim_path = SdfPath::new(&p)?;
            }
        }
        if asset_path.is_empty() && prim_path.is_empty() {
            return Err(self.error("expected reference"));
        }
        Ok(Reference { asset_path, prim_path })
    }

    fn parse_references(&mut self) -> Result<Vec<Reference>> {
        if self.at_punct('[') {
            self.parse_list(|p| p.parse_reference())
        } else {
            Ok(vec![self.parse_reference()?])
        }
    }

    fn parse_layer_metadata(&mut self, md: &mut LayerMetadata) -> Result<()> {
        self.expect_punct('(')?;
        while !self.eat_punct(')') {
            let key = self.expect_word()?;
            self.expect_punct('=')?;
            match key.as_str() {
                "customLayerData" => md.custom_layer_data = self.parse_dictionary()?,
                "defaultPrim" => md.default_prim = Some(self.expect_str()?),
                "upAxis" => md.up_axis = Some(self.expect_str()?),
                "metersPerUnit" => md.meters_per_unit = Some(self.expect_f64()?),
                "startTimeCode" => md.start_time_code = Some(self.expect_f64()?),
                "endTimeCode" => md.end_time_code = Some(self.expect_f64()?),
                "timeCodesPerSecond" => md.time_codes_per_second = Some(self.expect_f64()?),
                "framesPerSecond" => md.frames_per_second = Some(self.expect_f64()?),
                other => return Err(self.error(format!("unknown layer metadata '{}'", other))),
            }
        }
        Ok(())
    }

    fn parse_prim_metadata(&mut self, prim: &mut PrimSpec) -> Result<()> {
        self.expect_punct('(')?;
        while !self.eat_punct(')') {
            let mut key = self.expect_word()?;
            if matches!(key.as_str(), "prepend" | "append" | "add" | "delete" | "reorder") {
                key = self.expect_word()?;
            }
            self.expect_punct('=')?;
            match key.as_str() {
                "active" => prim.active = Some(self.parse_bool()?),
                "kind" => {
                    let kind = self.expect_str()?;
                    prim.metadata.set(MetaData::KIND, kind);
                }
                "customData" => {
                    for (k, v) in self.parse_dictionary()? {
                        let text = match &v {
                            Value::String(s) | Value::Token(s) | Value::Asset(s) => s.clone(),
                            other => format!("{:?}", other),
                        };
                        prim.metadata.set(k, text);
                    }
                }
                "references" => prim.references = self.parse_references()?,
                "payload" => prim.payloads = self.parse_references()?,
                "variants" => {
                    self.expect_punct('{')?;
                    while !self.eat_punct('}') {
                        self.expect_word()?;
                        let set = self.expect_word()?;
                        self.expect_punct('=')?;
                        let sel = self.expect_str()?;
                        prim.variant_selections.insert(set, sel);
                    }
                }
                "variantSets" => {
                    let names = if self.at_punct('[') {
                        self.parse_list(|p| p.expect_str())?
                    } else {
                        vec![self.expect_str()?]
                    };
                    for name in names {
                        prim.ensure_variant_set(&name);
                    }
                }
                other => return Err(self.error(format!("unknown prim metadata '{}'", other))),
            }
        }
        Ok(())
    }

    fn parse_prim(&mut self) -> Result<PrimSpec> {
        let keyword = self.expect_word()?;
        let specifier = Specifier::from_keyword(&keyword)
            .ok_or_else(|| self.error(format!("expected prim specifier, found '{}'", keyword)))?;
        let mut type_name = String::new();
        let name = match self.next()? {
            Tok::Str(s) => s,
            Tok::Word(w) => {
                type_name = w;
                self.expect_str()?
            }
            other => return Err(self.error(format!("expected prim name, found {:?}", other))),
        };
        let mut prim = PrimSpec::new(&name, specifier);
        prim.type_name = type_name;
        if self.at_punct('(') {
            self.parse_prim_metadata(&mut prim)?;
        }
        self.parse_prim_body(&mut prim)?;
        Ok(prim)
    }

    fn parse_prim_body(&mut self, prim: &mut PrimSpec) -> Result<()> {
        self.expect_punct('{')?;
        loop {
            if self.eat_punct('}') {
                return Ok(());
            }
            let word = match self.peek() {
                Some(Tok::Word(w)) => w.clone(),
                _ => return Err(self.error("expected prim body statement")),
            };
            match word.as_str() {
                "def" | "over" | "class" => {
                    let child = self.parse_prim()?;
                    prim.children.push(child);
                }
                "variantSet" => {
                    self.pos += 1;
                    let set_name = self.expect_str()?;
                    self.expect_punct('=')?;
                    self.expect_punct('{')?;
                    while !self.eat_punct('}') {
                        let variant_name = self.expect_str()?;
                        let mut variant_prim = PrimSpec::new(&variant_name, Specifier::Over);
                        if self.at_punct('(') {
                            self.parse_prim_metadata(&mut variant_prim)?;
                        }
                        self.parse_prim_body(&mut variant_prim)?;
                        let vset = prim.ensure_variant_set(&set_name);
                        vset.variants.retain(|v| v.name != variant_name);
                        vset.variants.push(VariantSpec {
                            name: variant_name,
                            prim: variant_prim,
                        });
                    }
                }
                _ => self.parse_attribute(prim)?,
            }
        }
    }

    fn parse_attribute(&mut self, prim: &mut PrimSpec) -> Result<()> {
        let mut type_word = self.expect_word()?;
        while matches!(type_word.as_str(), "uniform" | "custom") {
            type_word = self.expect_word()?;
        }
        let value_type = ValueType::from_name(&type_word)
            .ok_or_else(|| self.error(format!("unknown value type '{}'", type_word)))?;
        let name = self.expect_word()?;

        if let Some(base) = name.strip_suffix(".timeSamples") {
            let attr = prim
                .attributes
                .entry(base.to_string())
                .or_insert_with(|| AttributeSpec::new(value_type));
            self.expect_punct('=')?;
            self.expect_punct('{')?;
            while !self.eat_punct('}') {
                let mut time_word = self.expect_word()?;
                if let Some(stripped) = time_word.strip_suffix(':') {
                    time_word = stripped.to_string();
                } else if self.peek() == Some(&Tok::Word(":".to_string())) {
                    self.pos += 1;
                }
                let t = time_word
                    .parse::<f64>()
                    .map_err(|_| self.error(format!("bad sample time '{}'", time_word)))?;
                let value = self.parse_value(value_type)?;
                attr.time_samples.push((t, value));
                self.eat_punct(',');
            }
            attr.time_samples.sort_by(|a, b| a.0.total_cmp(&b.0));
            return Ok(());
        }

        let default = if self.eat_punct('=') {
            Some(self.parse_value(value_type)?)
        } else {
            None
        };
        let attr = prim
            .attributes
            .entry(name)
            .or_insert_with(|| AttributeSpec::new(value_type));
        attr.value_type = value_type;
        if default.is_some() {
            attr.default = default;
        }
        Ok(())
    }
}

/// Decode a text layer into `layer`, replacing its content.
pub fn read_layer(text: &str, layer: &mut Layer) -> Result<()> {
    if !text.trim_start().starts_with("#usda") {
        return Err(Error::Parse {
            line: 1,
            message: "missing #usda header".to_string(),
        });
    }
    let mut parser = Parser {
        toks: tokenize(text)?,
        pos: 0,
    };
    let mut metadata = LayerMetadata::default();
    if parser.at_punct('(') {
        parser.parse_layer_metadata(&mut metadata)?;
    }
    let mut root = PrimSpec::new("", Specifier::Def);
    while parser.peek().is_some() {
        root.children.push(parser.parse_prim()?);
    }
    layer.metadata = metadata;
    layer.pseudo_root = root;
    Ok(())
}
