//! The source scene contract.

use glam::DMat4;

use super::node::{NodeCategory, NodePath};
use super::units::{Axis, DistanceUnit};
use crate::sdf::{TimeCode, Value};

/// Read access to the host scene, plus the few pieces of host state an
/// export temporarily changes (current time, render layer, root correction).
///
/// State changes go through `&self`; implementations use interior mutability.
/// `TimeCode::Default` evaluates at the current time.
pub trait SceneGraph {
    /// Check if a node exists.
    fn is_valid(&self, node: &NodePath) -> bool;

    /// Children in scene order. Children of the world are the top-level nodes.
    fn children(&self, node: &NodePath) -> Vec<NodePath>;

    /// Node type name (`transform`, `mesh`, ...). `None` for the world.
    fn node_type(&self, node: &NodePath) -> Option<String>;

    /// Exportable category.
    fn category(&self, node: &NodePath) -> NodeCategory {
        self.node_type(node)
            .map(|t| NodeCategory::from_type(&t))
            .unwrap_or(NodeCategory::Other)
    }

    /// Shortest unique name of a node, for messages.
    fn partial_path_name(&self, node: &NodePath) -> String {
        node.to_string()
    }

    fn is_visible(&self, _node: &NodePath) -> bool {
        true
    }

    /// Intermediate (construction history) shapes are never exported.
    fn is_intermediate(&self, _node: &NodePath) -> bool {
        false
    }

    fn selected_nodes(&self) -> Vec<NodePath> {
        Vec::new()
    }

    /// Names of the exportable attributes of a node.
    fn attribute_names(&self, node: &NodePath) -> Vec<String>;

    /// Attribute value at a time.
    fn attribute(&self, node: &NodePath, name: &str, time: TimeCode) -> Option<Value>;

    fn is_attribute_animated(&self, node: &NodePath, name: &str) -> bool;

    /// Local transform at a time.
    fn local_transform(&self, node: &NodePath, time: TimeCode) -> DMat4;

    fn is_transform_animated(&self, node: &NodePath) -> bool;

    /// Correction applied on top of every top-level node's transform.
    fn root_correction(&self) -> DMat4;

    fn set_root_correction(&self, correction: DMat4);

    /// Local transform with the root correction applied to top-level nodes.
    fn export_transform(&self, node: &NodePath, time: TimeCode) -> DMat4 {
        let local = self.local_transform(node, time);
        if node.parent().is_world() {
            self.root_correction() * local
        } else {
            local
        }
    }

    fn up_axis(&self) -> Axis;

    /// Unit scene data is stored in.
    fn internal_unit(&self) -> DistanceUnit;

    /// Unit shown to the user.
    fn ui_unit(&self) -> DistanceUnit {
        self.internal_unit()
    }

    fn frames_per_second(&self) -> f64;

    fn current_time(&self) -> f64;

    fn set_current_time(&self, time: f64);

    /// Render layers in scene order.
    fn render_layers(&self) -> Vec<String>;

    fn default_render_layer(&self) -> String;

    fn current_render_layer(&self) -> String;

    fn set_current_render_layer(&self, layer: &str);

    /// Nodes belonging to a render layer.
    fn render_layer_members(&self, layer: &str) -> Vec<NodePath>;

    /// Top-level nodes.
    fn assemblies(&self) -> Vec<NodePath> {
        self.children(&NodePath::world())
    }

    /// Resolve a transform with exactly one non-intermediate shape child to
    /// that shape. Any other node resolves to itself.
    fn extend_to_shape(&self, node: &NodePath) -> NodePath {
        if self.category(node) != NodeCategory::Transform {
            return node.clone();
        }
        let mut shapes = self
            .children(node)
            .into_iter()
            .filter(|c| self.category(c).is_shape() && !self.is_intermediate(c));
        match (shapes.next(), shapes.next()) {
            (Some(shape), None) => shape,
            _ => node.clone(),
        }
    }
}
