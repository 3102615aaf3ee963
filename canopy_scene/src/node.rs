// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The node entity and its builder.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;

use kurbo::{Affine, Point, Size, Vec2};

use crate::color::ColorState;
use crate::component::ComponentContainer;
use crate::extension::Extensions;
use crate::layout::{Layout, LayoutOptions};
use crate::lifecycle::NodeBehavior;
use crate::order::SiblingKey;
use crate::transform::{Geometry, TransformState};
use crate::types::{NodeFlags, NodeId};

/// A node in the scene tree.
///
/// Nodes are owned by a [`Tree`](crate::Tree) and addressed by [`NodeId`].
/// This type exposes read access; all mutation goes through the tree so that
/// caches, sibling order and lifecycle stay consistent.
pub struct Node {
    pub(crate) generation: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) geometry: Geometry,
    pub(crate) transform: TransformState,
    pub(crate) order: SiblingKey,
    pub(crate) vertex_z: f32,
    pub(crate) flags: NodeFlags,
    pub(crate) id: String,
    pub(crate) tag: i32,
    pub(crate) holds: u32,
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
    pub(crate) components: Option<Box<ComponentContainer>>,
    pub(crate) layout: Option<Box<dyn Layout>>,
    pub(crate) layout_options: Option<Box<dyn LayoutOptions>>,
    pub(crate) color: Option<ColorState>,
    pub(crate) user_data: Option<Box<dyn Any>>,
    pub(crate) extensions: Option<Box<Extensions>>,
}

impl core::fmt::Debug for Node {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .field("geometry", &self.geometry)
            .field("order", &self.order)
            .field("flags", &self.flags)
            .field("holds", &self.holds)
            .field("behavior", &self.behavior.is_some())
            .field("layout", &self.layout.is_some())
            .field("layout_options", &self.layout_options)
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

impl Node {
    pub(crate) fn new(generation: u32, child_capacity: usize) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::with_capacity(child_capacity),
            geometry: Geometry::default(),
            transform: TransformState::default(),
            order: SiblingKey::default(),
            vertex_z: 0.0,
            flags: NodeFlags::default(),
            id: String::new(),
            tag: -1,
            holds: 0,
            behavior: None,
            components: None,
            layout: None,
            layout_options: None,
            color: None,
            user_data: None,
            extensions: None,
        }
    }

    /// The owning parent, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in storage order.
    ///
    /// Storage order equals sibling order only when
    /// [`is_children_order_dirty`](Self::is_children_order_dirty) is false.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of children.
    pub fn children_count(&self) -> usize {
        self.children.len()
    }

    /// All geometry fields.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Position in parent space.
    pub fn position(&self) -> Point {
        self.geometry.position
    }

    /// Scale along X.
    pub fn scale_x(&self) -> f64 {
        self.geometry.scale.x
    }

    /// Scale along Y.
    pub fn scale_y(&self) -> f64 {
        self.geometry.scale.y
    }

    /// Uniform scale; `None` when X and Y differ.
    pub fn scale(&self) -> Option<f64> {
        let s = self.geometry.scale;
        (s.x == s.y).then_some(s.x)
    }

    /// Rotation of the X axis, in degrees.
    pub fn rotation_x(&self) -> f64 {
        self.geometry.rotation.x
    }

    /// Rotation of the Y axis, in degrees.
    pub fn rotation_y(&self) -> f64 {
        self.geometry.rotation.y
    }

    /// Uniform rotation; `None` when X and Y differ.
    pub fn rotation(&self) -> Option<f64> {
        let r = self.geometry.rotation;
        (r.x == r.y).then_some(r.x)
    }

    /// Skew along X, in degrees.
    pub fn skew_x(&self) -> f64 {
        self.geometry.skew.x
    }

    /// Skew along Y, in degrees.
    pub fn skew_y(&self) -> f64 {
        self.geometry.skew.y
    }

    /// Normalized anchor point.
    pub fn anchor_point(&self) -> Point {
        self.geometry.anchor_point
    }

    /// Anchor point in content-space units.
    pub fn anchor_point_in_points(&self) -> Vec2 {
        self.geometry.anchor_point_in_points()
    }

    /// Untransformed content size.
    pub fn content_size(&self) -> Size {
        self.geometry.content_size
    }

    /// Content size multiplied by scale.
    pub fn scaled_content_size(&self) -> Size {
        self.geometry.scaled_content_size()
    }

    /// Whether the anchor is ignored for positioning.
    pub fn is_ignore_anchor_point_for_position(&self) -> bool {
        self.geometry.ignore_anchor_point_for_position
    }

    /// Extra transform applied after the node's own.
    pub fn additional_transform(&self) -> Option<Affine> {
        self.geometry.additional_transform
    }

    /// Render depth. Independent from sibling order.
    pub fn vertex_z(&self) -> f32 {
        self.vertex_z
    }

    /// Explicit z-order among siblings.
    pub fn z_order(&self) -> i32 {
        self.order.z
    }

    /// Arrival stamp among siblings.
    pub fn order_of_arrival(&self) -> u64 {
        self.order.arrival
    }

    /// Full sibling sort key.
    pub fn sibling_key(&self) -> SiblingKey {
        self.order
    }

    /// State flags.
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Whether the node is visited when drawing.
    pub fn is_visible(&self) -> bool {
        self.flags.contains(NodeFlags::VISIBLE)
    }

    /// Whether the node has entered the running scene.
    pub fn is_running(&self) -> bool {
        self.flags.contains(NodeFlags::RUNNING)
    }

    /// Whether scheduled callbacks of this node are suspended.
    pub fn is_paused(&self) -> bool {
        self.flags.contains(NodeFlags::PAUSED)
    }

    /// Whether children need sorting before the next traversal.
    pub fn is_children_order_dirty(&self) -> bool {
        self.flags.contains(NodeFlags::ORDER_DIRTY)
    }

    /// String identifier. Empty by default.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Integer tag. `-1` by default.
    pub fn tag(&self) -> i32 {
        self.tag
    }

    /// Number of external holds from [`Tree::retain`](crate::Tree::retain).
    pub fn hold_count(&self) -> u32 {
        self.holds
    }

    /// Color state, if the node is color-capable.
    pub fn color(&self) -> Option<&ColorState> {
        self.color.as_ref()
    }

    /// Untyped user data slot.
    pub fn user_data(&self) -> Option<&dyn Any> {
        self.user_data.as_deref()
    }

    /// Attached lifecycle behavior.
    ///
    /// `None` while the behavior's own hook is running.
    pub fn behavior(&self) -> Option<&dyn NodeBehavior> {
        self.behavior.as_deref()
    }

    /// Attached behavior downcast to `T`.
    pub fn behavior_as<T: NodeBehavior>(&self) -> Option<&T> {
        let b: &dyn Any = self.behavior.as_deref()?;
        b.downcast_ref::<T>()
    }
}

/// Initial state for [`Tree::create_node_with`](crate::Tree::create_node_with).
pub struct NodeBuilder {
    pub(crate) geometry: Geometry,
    pub(crate) id: String,
    pub(crate) tag: i32,
    pub(crate) z_order: i32,
    pub(crate) vertex_z: f32,
    pub(crate) visible: bool,
    pub(crate) color: Option<ColorState>,
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            id: String::new(),
            tag: -1,
            z_order: 0,
            vertex_z: 0.0,
            visible: true,
            color: None,
            behavior: None,
        }
    }
}

impl core::fmt::Debug for NodeBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeBuilder")
            .field("geometry", &self.geometry)
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("z_order", &self.z_order)
            .field("vertex_z", &self.vertex_z)
            .field("visible", &self.visible)
            .field("color", &self.color)
            .field("behavior", &self.behavior.is_some())
            .finish()
    }
}

impl NodeBuilder {
    /// Start from default state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set all geometry at once.
    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Position in parent space.
    pub fn position(mut self, position: impl Into<Point>) -> Self {
        self.geometry.position = position.into();
        self
    }

    /// Uniform scale.
    pub fn scale(mut self, scale: f64) -> Self {
        self.geometry.scale = Vec2::new(scale, scale);
        self
    }

    /// Uniform rotation in degrees.
    pub fn rotation(mut self, degrees: f64) -> Self {
        self.geometry.rotation = Vec2::new(degrees, degrees);
        self
    }

    /// Normalized anchor point.
    pub fn anchor_point(mut self, anchor: impl Into<Point>) -> Self {
        self.geometry.anchor_point = anchor.into();
        self
    }

    /// Content size.
    pub fn content_size(mut self, size: impl Into<Size>) -> Self {
        self.geometry.content_size = size.into();
        self
    }

    /// String identifier.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Integer tag.
    pub fn tag(mut self, tag: i32) -> Self {
        self.tag = tag;
        self
    }

    /// Z-order used when the node is added without an explicit one.
    pub fn z_order(mut self, z: i32) -> Self {
        self.z_order = z;
        self
    }

    /// Render depth.
    pub fn vertex_z(mut self, z: f32) -> Self {
        self.vertex_z = z;
        self
    }

    /// Initial visibility.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Make the node color-capable with the given state.
    pub fn color(mut self, color: ColorState) -> Self {
        self.color = Some(color);
        self
    }

    /// Lifecycle behavior.
    pub fn behavior(mut self, behavior: impl NodeBehavior) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }
}
