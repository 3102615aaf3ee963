// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry setters.
//!
//! Every setter that affects the local matrix marks the node's transform
//! caches and the world caches of its subtree stale. Setters ignore stale
//! ids with a warning.

use kurbo::{Affine, Point, Rect, Size, Vec2};

use crate::node::Node;
use crate::transform::{DirtyFlags, Geometry, transform_rect_bbox};
use crate::tree::Tree;
use crate::types::{NodeFlags, NodeId};

impl Tree {
    fn edit_geometry(&mut self, id: NodeId, op: &str, f: impl FnOnce(&mut Geometry)) {
        self.edit_geometry_with(id, op, DirtyFlags::empty(), f);
    }

    fn edit_geometry_with(
        &mut self,
        id: NodeId,
        op: &str,
        extra: DirtyFlags,
        f: impl FnOnce(&mut Geometry),
    ) {
        let Some(n) = self.node_opt_mut(id) else {
            log::warn!("{op}: stale node {id:?}");
            return;
        };
        f(&mut n.geometry);
        self.mark_transform_dirty(id, extra);
    }

    /// Set the position in parent space.
    pub fn set_position(&mut self, id: NodeId, position: Point) {
        self.edit_geometry(id, "set_position", |g| g.position = position);
    }

    /// Set the X coordinate of the position.
    pub fn set_position_x(&mut self, id: NodeId, x: f64) {
        self.edit_geometry(id, "set_position_x", |g| g.position.x = x);
    }

    /// Set the Y coordinate of the position.
    pub fn set_position_y(&mut self, id: NodeId, y: f64) {
        self.edit_geometry(id, "set_position_y", |g| g.position.y = y);
    }

    /// Set a uniform scale.
    pub fn set_scale(&mut self, id: NodeId, scale: f64) {
        self.edit_geometry(id, "set_scale", |g| g.scale = Vec2::new(scale, scale));
    }

    /// Set the X and Y scale.
    pub fn set_scale_xy(&mut self, id: NodeId, x: f64, y: f64) {
        self.edit_geometry(id, "set_scale_xy", |g| g.scale = Vec2::new(x, y));
    }

    /// Set the X scale.
    pub fn set_scale_x(&mut self, id: NodeId, x: f64) {
        self.edit_geometry(id, "set_scale_x", |g| g.scale.x = x);
    }

    /// Set the Y scale.
    pub fn set_scale_y(&mut self, id: NodeId, y: f64) {
        self.edit_geometry(id, "set_scale_y", |g| g.scale.y = y);
    }

    /// Set a uniform rotation, in degrees.
    pub fn set_rotation(&mut self, id: NodeId, degrees: f64) {
        self.edit_geometry(id, "set_rotation", |g| {
            g.rotation = Vec2::new(degrees, degrees);
        });
    }

    /// Set the rotation of the X axis, in degrees.
    pub fn set_rotation_x(&mut self, id: NodeId, degrees: f64) {
        self.edit_geometry(id, "set_rotation_x", |g| g.rotation.x = degrees);
    }

    /// Set the rotation of the Y axis, in degrees.
    pub fn set_rotation_y(&mut self, id: NodeId, degrees: f64) {
        self.edit_geometry(id, "set_rotation_y", |g| g.rotation.y = degrees);
    }

    /// Set the X skew, in degrees.
    pub fn set_skew_x(&mut self, id: NodeId, degrees: f64) {
        self.edit_geometry(id, "set_skew_x", |g| g.skew.x = degrees);
    }

    /// Set the Y skew, in degrees.
    pub fn set_skew_y(&mut self, id: NodeId, degrees: f64) {
        self.edit_geometry(id, "set_skew_y", |g| g.skew.y = degrees);
    }

    /// Set the normalized anchor point.
    pub fn set_anchor_point(&mut self, id: NodeId, anchor: Point) {
        self.edit_geometry(id, "set_anchor_point", |g| g.anchor_point = anchor);
    }

    /// Set the untransformed content size.
    pub fn set_content_size(&mut self, id: NodeId, size: Size) {
        self.edit_geometry(id, "set_content_size", |g| g.content_size = size);
    }

    /// Set the content width.
    pub fn set_content_width(&mut self, id: NodeId, width: f64) {
        self.edit_geometry(id, "set_content_width", |g| g.content_size.width = width);
    }

    /// Set the content height.
    pub fn set_content_height(&mut self, id: NodeId, height: f64) {
        self.edit_geometry(id, "set_content_height", |g| {
            g.content_size.height = height;
        });
    }

    /// Set the content size so that, at the current scale, it covers `size`.
    ///
    /// An axis with zero scale keeps its content extent.
    pub fn set_scaled_content_size(&mut self, id: NodeId, size: Size) {
        self.edit_geometry(id, "set_scaled_content_size", |g| {
            if g.scale.x != 0.0 {
                g.content_size.width = size.width / g.scale.x;
            }
            if g.scale.y != 0.0 {
                g.content_size.height = size.height / g.scale.y;
            }
        });
    }

    /// Treat the anchor as the origin for positioning.
    pub fn ignore_anchor_point_for_position(&mut self, id: NodeId, ignore: bool) {
        self.edit_geometry(id, "ignore_anchor_point_for_position", |g| {
            g.ignore_anchor_point_for_position = ignore;
        });
    }

    /// Set or clear the transform applied after the node's own.
    pub fn set_additional_transform(&mut self, id: NodeId, extra: Option<Affine>) {
        self.edit_geometry_with(
            id,
            "set_additional_transform",
            DirtyFlags::ADDITIONAL,
            |g| g.additional_transform = extra,
        );
    }

    /// Set the render depth. Sibling order is unaffected.
    pub fn set_vertex_z(&mut self, id: NodeId, z: f32) {
        match self.node_opt_mut(id) {
            Some(n) => n.vertex_z = z,
            None => log::warn!("set_vertex_z: stale node {id:?}"),
        }
    }

    /// Show or hide a node and its subtree during traversal.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if !self.is_alive(id) {
            log::warn!("set_visible: stale node {id:?}");
            return;
        }
        self.set_flag(id, NodeFlags::VISIBLE, visible);
    }

    /// Content rect of `id` in its parent's space, as an axis-aligned box.
    pub fn bounding_box(&self, id: NodeId) -> Option<Rect> {
        let size = self.get(id).map(Node::content_size)?;
        let local = self.node_to_parent_transform(id);
        Some(transform_rect_bbox(local, Rect::from_origin_size(Point::ZERO, size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBuilder;

    fn close(a: Point, b: Point) -> bool {
        (a - b).hypot() < 1e-7
    }

    #[test]
    fn setters_dirty_node_and_subtree() {
        let mut tree = Tree::new();
        let parent = tree.create_node();
        let child = tree.create_node();
        tree.add_child(parent, child).unwrap();
        tree.node_to_world_transform(child);
        assert_eq!(tree.transform_dirty_flags(parent), Some(DirtyFlags::INVERSE));
        assert_eq!(tree.transform_dirty_flags(child), Some(DirtyFlags::INVERSE));

        tree.set_position(parent, Point::new(5.0, 0.0));
        let p = tree.transform_dirty_flags(parent).unwrap();
        assert!(p.contains(DirtyFlags::TRANSFORM | DirtyFlags::INVERSE | DirtyFlags::WORLD));
        assert!(!p.contains(DirtyFlags::ADDITIONAL));
        let c = tree.transform_dirty_flags(child).unwrap();
        assert!(c.contains(DirtyFlags::WORLD));
        assert!(!c.contains(DirtyFlags::TRANSFORM));

        tree.set_additional_transform(child, Some(Affine::scale(2.0)));
        assert!(
            tree.transform_dirty_flags(child)
                .unwrap()
                .contains(DirtyFlags::ADDITIONAL)
        );
        assert_eq!(
            tree.convert_to_world_space(child, Point::new(1.0, 1.0)),
            Point::new(7.0, 2.0)
        );
    }

    #[test]
    fn round_trip_conversions() {
        let cases = [
            (Point::new(0.0, 0.0), 1.0, 0.0, 0.0, Point::ZERO),
            (Point::new(10.0, -4.0), 2.0, 30.0, 0.0, Point::new(0.5, 0.5)),
            (Point::new(-3.0, 8.0), 0.5, -75.0, 12.0, Point::new(1.0, 0.0)),
            (Point::new(100.0, 20.0), 1.5, 180.0, -20.0, Point::new(0.25, 0.75)),
        ];
        for (pos, scale, rot, skew, anchor) in cases {
            let mut tree = Tree::new();
            let outer = tree.create_node_with(
                NodeBuilder::new()
                    .position(pos)
                    .scale(scale)
                    .rotation(rot)
                    .anchor_point(anchor)
                    .content_size((40.0, 20.0)),
            );
            let inner = tree.create_node_with(
                NodeBuilder::new()
                    .position((7.0, 3.0))
                    .rotation(-rot / 2.0)
                    .anchor_point(anchor)
                    .content_size((10.0, 30.0)),
            );
            tree.set_skew_x(inner, skew);
            tree.set_skew_y(outer, skew / 2.0);
            tree.set_scale_xy(inner, 1.0, scale);
            tree.add_child(outer, inner).unwrap();

            for p in [Point::ZERO, Point::new(3.0, -9.0), Point::new(250.0, 125.0)] {
                let world = tree.convert_to_world_space(inner, p);
                assert!(close(tree.convert_to_node_space(inner, world), p), "{p:?}");
                let world_ar = tree.convert_to_world_space_ar(inner, p);
                assert!(close(tree.convert_to_node_space_ar(inner, world_ar), p), "{p:?}");
            }
        }
    }

    #[test]
    fn anchor_relative_conversion_offsets_by_anchor() {
        let mut tree = Tree::new();
        let n = tree.create_node_with(
            NodeBuilder::new()
                .position((50.0, 50.0))
                .anchor_point((0.5, 0.5))
                .content_size((20.0, 10.0)),
        );
        assert!(close(tree.convert_to_world_space_ar(n, Point::ZERO), Point::new(50.0, 50.0)));
        assert!(close(tree.convert_to_node_space(n, Point::new(50.0, 50.0)), Point::new(10.0, 5.0)));
    }

    #[test]
    fn scaled_content_size_divides_by_scale() {
        let mut tree = Tree::new();
        let n = tree.create_node();
        tree.set_scale_xy(n, 2.0, 0.0);
        tree.set_content_size(n, Size::new(1.0, 7.0));
        tree.set_scaled_content_size(n, Size::new(10.0, 10.0));
        assert_eq!(tree.get(n).unwrap().content_size(), Size::new(5.0, 7.0));
        tree.set_content_width(n, 3.0);
        tree.set_content_height(n, 4.0);
        assert_eq!(tree.get(n).unwrap().scaled_content_size(), Size::new(6.0, 0.0));
    }

    #[test]
    fn bounding_box_of_rotated_content() {
        let mut tree = Tree::new();
        let n = tree.create_node_with(
            NodeBuilder::new()
                .position((10.0, 10.0))
                .content_size((4.0, 2.0)),
        );
        tree.set_rotation(n, 90.0);
        let bb = tree.bounding_box(n).unwrap();
        assert!((bb.width() - 2.0).abs() < 1e-9);
        assert!((bb.height() - 4.0).abs() < 1e-9);
        assert!(close(bb.origin(), Point::new(10.0, 6.0)), "{bb:?}");
    }

    #[test]
    fn stale_ids_are_ignored() {
        let mut tree = Tree::new();
        let n = tree.create_node();
        tree.destroy(n);
        tree.set_position(n, Point::new(1.0, 1.0));
        tree.set_visible(n, false);
        tree.set_vertex_z(n, 2.0);
        assert!(tree.bounding_box(n).is_none());
        assert_eq!(tree.transform_dirty_flags(n), None);
    }

    #[test]
    fn visibility_and_vertex_z_leave_transform_clean() {
        let mut tree = Tree::new();
        let n = tree.create_node();
        tree.node_to_world_transform(n);
        tree.set_visible(n, false);
        tree.set_vertex_z(n, -1.5);
        assert!(!tree.get(n).unwrap().is_visible());
        assert_eq!(tree.get(n).unwrap().vertex_z(), -1.5);
        assert_eq!(tree.transform_dirty_flags(n), Some(DirtyFlags::INVERSE));
    }
}
