//! In-memory host scene, built in code or loaded from JSON.
//!
//! ```json
//! {
//!   "upAxis": "y",
//!   "unit": "cm",
//!   "framesPerSecond": 24,
//!   "nodes": [
//!     { "path": "|root", "type": "transform",
//!       "transformSamples": [[1, [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1]]] },
//!     { "path": "|root|cube|cubeShape", "type": "mesh",
//!       "attributes": { "size": { "type": "double", "value": 2.0 } } }
//!   ],
//!   "selection": ["|root"],
//!   "renderLayers": [{ "name": "hero", "members": ["|root|cube"] }]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use glam::DMat4;
use parking_lot::RwLock;
use serde::Deserialize;

use super::graph::SceneGraph;
use super::node::{NodeCategory, NodePath};
use super::units::{Axis, DistanceUnit};
use crate::sdf::{TimeCode, Value};
use crate::util::Result;

/// Name of the render layer every scene has.
pub const DEFAULT_RENDER_LAYER: &str = "defaultRenderLayer";

/// A value with optional time samples. Sampling holds the previous sample.
#[derive(Clone, Debug)]
struct Animated<T> {
    value: T,
    samples: Vec<(f64, T)>,
}

impl<T: Clone> Animated<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            samples: Vec::new(),
        }
    }

    fn set_sample(&mut self, time: f64, value: T) {
        match self.samples.binary_search_by(|(t, _)| t.total_cmp(&time)) {
            Ok(i) => self.samples[i].1 = value,
            Err(i) => self.samples.insert(i, (time, value)),
        }
    }

    fn at(&self, time: f64) -> T {
        if self.samples.is_empty() {
            return self.value.clone();
        }
        let idx = self
            .samples
            .partition_point(|(t, _)| *t <= time)
            .saturating_sub(1);
        self.samples[idx].1.clone()
    }

    fn is_animated(&self) -> bool {
        !self.samples.is_empty()
    }
}

#[derive(Clone, Debug)]
struct Node {
    node_type: String,
    children: Vec<String>,
    visible: bool,
    intermediate: bool,
    transform: Animated<DMat4>,
    attributes: BTreeMap<String, Animated<Value>>,
}

impl Node {
    fn new(node_type: &str) -> Self {
        Self {
            node_type: node_type.to_string(),
            children: Vec::new(),
            visible: true,
            intermediate: false,
            transform: Animated::new(DMat4::IDENTITY),
            attributes: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug)]
struct RenderLayer {
    name: String,
    members: Vec<NodePath>,
}

/// Host state an export may change and restore.
#[derive(Debug)]
struct HostState {
    current_time: f64,
    current_render_layer: String,
    root_correction: DMat4,
}

/// Scene graph held in memory.
#[derive(Debug)]
pub struct MemoryScene {
    nodes: BTreeMap<NodePath, Node>,
    roots: Vec<String>,
    selection: Vec<NodePath>,
    render_layers: Vec<RenderLayer>,
    default_render_layer: String,
    up_axis: Axis,
    internal_unit: DistanceUnit,
    ui_unit: DistanceUnit,
    frames_per_second: f64,
    state: RwLock<HostState>,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScene {
    /// Empty scene: Y up, centimeters, 24 fps, only the default render layer.
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            roots: Vec::new(),
            selection: Vec::new(),
            render_layers: vec![RenderLayer {
                name: DEFAULT_RENDER_LAYER.to_string(),
                members: Vec::new(),
            }],
            default_render_layer: DEFAULT_RENDER_LAYER.to_string(),
            up_axis: Axis::Y,
            internal_unit: DistanceUnit::Centimeters,
            ui_unit: DistanceUnit::Centimeters,
            frames_per_second: 24.0,
            state: RwLock::new(HostState {
                current_time: 1.0,
                current_render_layer: DEFAULT_RENDER_LAYER.to_string(),
                root_correction: DMat4::IDENTITY,
            }),
        }
    }

    /// Add a node, creating missing ancestors as transforms.
    ///
    /// Adding an existing node only updates its type.
    pub fn add_node(&mut self, path: impl Into<NodePath>, node_type: &str) -> NodePath {
        let path = path.into();
        if path.is_world() {
            return path;
        }
        if let Some(node) = self.nodes.get_mut(&path) {
            node.node_type = node_type.to_string();
            return path;
        }
        let parent = path.parent();
        if !parent.is_world() && !self.nodes.contains_key(&parent) {
            self.add_node(parent.clone(), "transform");
        }
        let name = path.name().to_string();
        match self.nodes.get_mut(&parent) {
            Some(p) => p.children.push(name),
            None => self.roots.push(name),
        }
        self.nodes.insert(path.clone(), Node::new(node_type));
        path
    }

    fn node_mut(&mut self, path: &NodePath) -> &mut Node {
        if !self.nodes.contains_key(path) {
            self.add_node(path.clone(), "transform");
        }
        self.nodes
            .entry(path.clone())
            .or_insert_with(|| Node::new("transform"))
    }

    /// Set a static attribute value.
    pub fn set_attribute(&mut self, node: &NodePath, name: &str, value: Value) -> &mut Self {
        let attrs = &mut self.node_mut(node).attributes;
        match attrs.get_mut(name) {
            Some(a) => a.value = value,
            None => {
                attrs.insert(name.to_string(), Animated::new(value));
            }
        }
        self
    }

    /// Add a time sample to an attribute.
    pub fn set_attribute_sample(&mut self, node: &NodePath, name: &str, time: f64, value: Value) -> &mut Self {
        self.node_mut(node)
            .attributes
            .entry(name.to_string())
            .or_insert_with(|| Animated::new(value.clone()))
            .set_sample(time, value);
        self
    }

    /// Set the static local transform.
    pub fn set_transform(&mut self, node: &NodePath, matrix: DMat4) -> &mut Self {
        self.node_mut(node).transform.value = matrix;
        self
    }

    /// Add a local transform time sample.
    pub fn set_transform_sample(&mut self, node: &NodePath, time: f64, matrix: DMat4) -> &mut Self {
        self.node_mut(node).transform.set_sample(time, matrix);
        self
    }

    pub fn set_visible(&mut self, node: &NodePath, visible: bool) -> &mut Self {
        self.node_mut(node).visible = visible;
        self
    }

    pub fn set_intermediate(&mut self, node: &NodePath, intermediate: bool) -> &mut Self {
        self.node_mut(node).intermediate = intermediate;
        self
    }

    /// Add a node to the selection.
    pub fn select(&mut self, node: &NodePath) -> &mut Self {
        if !self.selection.contains(node) {
            self.selection.push(node.clone());
        }
        self
    }

    /// Add (or replace the members of) a render layer.
    ///
    /// Members of the default render layer default to every top-level node.
    pub fn add_render_layer(&mut self, name: &str, members: Vec<NodePath>) -> &mut Self {
        match self.render_layers.iter_mut().find(|l| l.name == name) {
            Some(layer) => layer.members = members,
            None => self.render_layers.push(RenderLayer {
                name: name.to_string(),
                members,
            }),
        }
        self
    }

    /// Mark a render layer as the default one, adding it if missing.
    pub fn set_default_render_layer(&mut self, name: &str) -> &mut Self {
        if !self.render_layers.iter().any(|l| l.name == name) {
            self.add_render_layer(name, Vec::new());
        }
        self.default_render_layer = name.to_string();
        self
    }

    pub fn set_up_axis(&mut self, axis: Axis) -> &mut Self {
        self.up_axis = axis;
        self
    }

    /// Set the internal and UI units.
    pub fn set_units(&mut self, internal: DistanceUnit, ui: DistanceUnit) -> &mut Self {
        self.internal_unit = internal;
        self.ui_unit = ui;
        self
    }

    pub fn set_frames_per_second(&mut self, fps: f64) -> &mut Self {
        self.frames_per_second = fps;
        self
    }

    /// Parse a JSON scene description.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SceneFile = serde_json::from_str(json)?;
        Ok(file.build())
    }

    /// Load a JSON scene description from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn sample_time(&self, time: TimeCode) -> f64 {
        time.time().unwrap_or_else(|| self.state.read().current_time)
    }
}

impl SceneGraph for MemoryScene {
    fn is_valid(&self, node: &NodePath) -> bool {
        node.is_world() || self.nodes.contains_key(node)
    }

    fn children(&self, node: &NodePath) -> Vec<NodePath> {
        let names = if node.is_world() {
            &self.roots
        } else {
            match self.nodes.get(node) {
                Some(n) => &n.children,
                None => return Vec::new(),
            }
        };
        names.iter().map(|n| node.child(n)).collect()
    }

    fn node_type(&self, node: &NodePath) -> Option<String> {
        self.nodes.get(node).map(|n| n.node_type.clone())
    }

    fn partial_path_name(&self, node: &NodePath) -> String {
        let comps: Vec<&str> = node.components().collect();
        for len in 1..=comps.len() {
            let suffix = &comps[comps.len() - len..];
            let clashes = self
                .nodes
                .keys()
                .filter(|other| {
                    let oc: Vec<&str> = other.components().collect();
                    oc.len() >= len && oc[oc.len() - len..] == *suffix
                })
                .count();
            if clashes == 1 {
                return suffix.join("|");
            }
        }
        node.to_string()
    }

    fn is_visible(&self, node: &NodePath) -> bool {
        self.nodes.get(node).map(|n| n.visible).unwrap_or(true)
    }

    fn is_intermediate(&self, node: &NodePath) -> bool {
        self.nodes.get(node).map(|n| n.intermediate).unwrap_or(false)
    }

    fn selected_nodes(&self) -> Vec<NodePath> {
        self.selection.clone()
    }

    fn attribute_names(&self, node: &NodePath) -> Vec<String> {
        self.nodes
            .get(node)
            .map(|n| n.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn attribute(&self, node: &NodePath, name: &str, time: TimeCode) -> Option<Value> {
        let attr = self.nodes.get(node)?.attributes.get(name)?;
        Some(attr.at(self.sample_time(time)))
    }

    fn is_attribute_animated(&self, node: &NodePath, name: &str) -> bool {
        self.nodes
            .get(node)
            .and_then(|n| n.attributes.get(name))
            .map(|a| a.is_animated())
            .unwrap_or(false)
    }

    fn local_transform(&self, node: &NodePath, time: TimeCode) -> DMat4 {
        self.nodes
            .get(node)
            .map(|n| n.transform.at(self.sample_time(time)))
            .unwrap_or(DMat4::IDENTITY)
    }

    fn is_transform_animated(&self, node: &NodePath) -> bool {
        self.nodes
            .get(node)
            .map(|n| n.transform.is_animated())
            .unwrap_or(false)
    }

    fn root_correction(&self) -> DMat4 {
        self.state.read().root_correction
    }

    fn set_root_correction(&self, correction: DMat4) {
        self.state.write().root_correction = correction;
    }

    fn up_axis(&self) -> Axis {
        self.up_axis
    }

    fn internal_unit(&self) -> DistanceUnit {
        self.internal_unit
    }

    fn ui_unit(&self) -> DistanceUnit {
        self.ui_unit
    }

    fn frames_per_second(&self) -> f64 {
        self.frames_per_second
    }

    fn current_time(&self) -> f64 {
        self.state.read().current_time
    }

    fn set_current_time(&self, time: f64) {
        self.state.write().current_time = time;
    }

    fn render_layers(&self) -> Vec<String> {
        self.render_layers.iter().map(|l| l.name.clone()).collect()
    }

    fn default_render_layer(&self) -> String {
        self.default_render_layer.clone()
    }

    fn current_render_layer(&self) -> String {
        self.state.read().current_render_layer.clone()
    }

    fn set_current_render_layer(&self, layer: &str) {
        self.state.write().current_render_layer = layer.to_string();
    }

    fn render_layer_members(&self, layer: &str) -> Vec<NodePath> {
        match self.render_layers.iter().find(|l| l.name == layer) {
            Some(l) if l.name == self.default_render_layer && l.members.is_empty() => self.assemblies(),
            Some(l) => l.members.clone(),
            None => Vec::new(),
        }
    }
}

// ============================================================================
// JSON
// ============================================================================

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeFile {
    path: NodePath,
    #[serde(rename = "type", default = "NodeFile::default_type")]
    node_type: String,
    #[serde(default)]
    transform: Option<DMat4>,
    #[serde(default)]
    transform_samples: Vec<(f64, DMat4)>,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    #[serde(default)]
    attribute_samples: BTreeMap<String, Vec<(f64, Value)>>,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    intermediate: bool,
}

impl NodeFile {
    fn default_type() -> String {
        "transform".to_string()
    }
}

#[derive(Deserialize)]
struct RenderLayerFile {
    name: String,
    #[serde(default)]
    members: Vec<NodePath>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SceneFile {
    up_axis: Axis,
    unit: DistanceUnit,
    ui_unit: Option<DistanceUnit>,
    frames_per_second: f64,
    current_time: f64,
    nodes: Vec<NodeFile>,
    selection: Vec<NodePath>,
    render_layers: Vec<RenderLayerFile>,
    default_render_layer: Option<String>,
    current_render_layer: Option<String>,
}

impl Default for SceneFile {
    fn default() -> Self {
        Self {
            up_axis: Axis::Y,
            unit: DistanceUnit::Centimeters,
            ui_unit: None,
            frames_per_second: 24.0,
            current_time: 1.0,
            nodes: Vec::new(),
            selection: Vec::new(),
            render_layers: Vec::new(),
            default_render_layer: None,
            current_render_layer: None,
        }
    }
}

impl SceneFile {
    fn build(self) -> MemoryScene {
        let mut scene = MemoryScene::new();
        scene
            .set_up_axis(self.up_axis)
            .set_units(self.unit, self.ui_unit.unwrap_or(self.unit))
            .set_frames_per_second(self.frames_per_second);
        scene.set_current_time(self.current_time);

        for node in self.nodes {
            let path = scene.add_node(node.path, &node.node_type);
            if let Some(m) = node.transform {
                scene.set_transform(&path, m);
            }
            for (t, m) in node.transform_samples {
                scene.set_transform_sample(&path, t, m);
            }
            for (name, value) in node.attributes {
                scene.set_attribute(&path, &name, value);
            }
            for (name, samples) in node.attribute_samples {
                for (t, value) in samples {
                    scene.set_attribute_sample(&path, &name, t, value);
                }
            }
            scene
                .set_visible(&path, node.visible)
                .set_intermediate(&path, node.intermediate);
        }
        for node in &self.selection {
            scene.select(node);
        }
        for layer in self.render_layers {
            scene.add_render_layer(&layer.name, layer.members);
        }
        if let Some(layer) = self.default_render_layer {
            scene.set_default_render_layer(&layer);
        }
        if let Some(layer) = self.current_render_layer {
            scene.set_current_render_layer(&layer);
        }
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn n(s: &str) -> NodePath {
        NodePath::new(s)
    }

    #[test]
    fn test_build_hierarchy() {
        let mut scene = MemoryScene::new();
        scene.add_node("|grp|cube|cubeShape", "mesh");
        scene.add_node("|grp|cam|camShape", "camera");
        assert_eq!(scene.assemblies(), vec![n("|grp")]);
        assert_eq!(scene.children(&n("|grp")), vec![n("|grp|cube"), n("|grp|cam")]);
        assert_eq!(scene.category(&n("|grp|cube")), NodeCategory::Transform);
        assert_eq!(scene.extend_to_shape(&n("|grp|cube")), n("|grp|cube|cubeShape"));
        assert_eq!(scene.extend_to_shape(&n("|grp")), n("|grp"));

        scene.set_intermediate(&n("|grp|cube|cubeShape"), true);
        assert_eq!(scene.extend_to_shape(&n("|grp|cube")), n("|grp|cube"));
    }

    #[test]
    fn test_partial_names() {
        let mut scene = MemoryScene::new();
        scene.add_node("|a|shape", "mesh");
        scene.add_node("|b|shape", "mesh");
        scene.add_node("|b|unique", "mesh");
        assert_eq!(scene.partial_path_name(&n("|b|unique")), "unique");
        assert_eq!(scene.partial_path_name(&n("|a|shape")), "a|shape");
        assert_eq!(scene.partial_path_name(&n("|a")), "a");
    }

    #[test]
    fn test_sampling_holds_and_uses_current_time() {
        let mut scene = MemoryScene::new();
        let node = scene.add_node("|ball", "transform");
        scene
            .set_transform_sample(&node, 1.0, DMat4::from_translation(DVec3::X))
            .set_transform_sample(&node, 3.0, DMat4::from_translation(DVec3::Y));
        assert!(scene.is_transform_animated(&node));
        assert_eq!(
            scene.local_transform(&node, TimeCode::Time(2.0)),
            DMat4::from_translation(DVec3::X)
        );
        scene.set_current_time(3.0);
        assert_eq!(
            scene.local_transform(&node, TimeCode::Default),
            DMat4::from_translation(DVec3::Y)
        );
    }

    #[test]
    fn test_render_layers() {
        let mut scene = MemoryScene::new();
        scene.add_node("|a", "transform");
        scene.add_node("|b", "transform");
        scene.add_render_layer("hero", vec![n("|a")]);
        assert_eq!(scene.render_layers(), vec![DEFAULT_RENDER_LAYER.to_string(), "hero".to_string()]);
        assert_eq!(scene.render_layer_members(DEFAULT_RENDER_LAYER), vec![n("|a"), n("|b")]);
        assert_eq!(scene.render_layer_members("hero"), vec![n("|a")]);
        scene.set_current_render_layer("hero");
        assert_eq!(scene.current_render_layer(), "hero");

        scene.set_default_render_layer("hero");
        assert_eq!(scene.default_render_layer(), "hero");
        assert_eq!(scene.render_layer_members(DEFAULT_RENDER_LAYER), Vec::<NodePath>::new());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "upAxis": "z",
            "unit": "m",
            "framesPerSecond": 30,
            "nodes": [
                { "path": "|root", "visible": false },
                { "path": "|root|cube|cubeShape", "type": "mesh",
                  "attributes": { "size": { "type": "double", "value": 2.0 } },
                  "attributeSamples": { "size": [[1, { "type": "double", "value": 3.0 }]] } }
            ],
            "selection": ["|root|cube"],
            "renderLayers": [{ "name": "hero", "members": ["root|cube"] }]
        }"#;
        let scene = MemoryScene::from_json(json).unwrap();
        assert_eq!(scene.up_axis(), Axis::Z);
        assert_eq!(scene.internal_unit(), DistanceUnit::Meters);
        assert_eq!(scene.frames_per_second(), 30.0);
        assert!(!scene.is_visible(&n("|root")));
        assert_eq!(scene.selected_nodes(), vec![n("|root|cube")]);
        assert!(scene.is_attribute_animated(&n("|root|cube|cubeShape"), "size"));
        assert_eq!(
            scene.attribute(&n("|root|cube|cubeShape"), "size", TimeCode::Time(5.0)),
            Some(Value::Double(3.0))
        );
        assert_eq!(scene.render_layer_members("hero"), vec![n("|root|cube")]);
    }
}
