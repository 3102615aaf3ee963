// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Local geometry, cached transforms, and coordinate conversion.
//!
//! ## Caches
//!
//! Every node keeps three cached matrices:
//!
//! - local: node space to parent space, computed from [`Geometry`];
//! - inverse: parent space to node space;
//! - world: node space to world space, refreshed by traversal.
//!
//! Geometry setters mark [`DirtyFlags::TRANSFORM`], [`DirtyFlags::INVERSE`] and
//! [`DirtyFlags::WORLD`] on the node and [`DirtyFlags::WORLD`] on every
//! descendant. Accessors recompute lazily and take `&Tree`, so the caches live
//! in [`Cell`]s.
//!
//! ## Fast paths
//!
//! [`Tree::node_to_parent_transform_fast`] and [`Tree::node_to_world_transform_fast`]
//! read caches without validating ancestors. They are only correct after
//! [`Tree::visit`](crate::Tree::visit) or
//! [`Tree::update_world_transforms`](crate::Tree::update_world_transforms) has run
//! since the last geometry change.

use core::cell::Cell;

use kurbo::{Affine, Point, Rect, Size, Vec2};

use crate::tree::Tree;
use crate::types::NodeId;

bitflags::bitflags! {
    /// Which cached matrices of a node are stale.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u8 {
        /// Local matrix must be recomputed from geometry.
        const TRANSFORM = 0b0001;
        /// Inverse of the local matrix must be recomputed.
        const INVERSE = 0b0010;
        /// Additional transform must be folded in again.
        const ADDITIONAL = 0b0100;
        /// Cached world matrix is stale.
        const WORLD = 0b1000;
    }
}

/// Source-of-truth geometry of a node.
///
/// Angles are in degrees. Rotation is clockwise for positive values, with
/// independent X and Y rotation as in classic 2D scene graphs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    /// Position in parent space.
    pub position: Point,
    /// Scale along X and Y.
    pub scale: Vec2,
    /// Rotation of the X and Y axes, in degrees.
    pub rotation: Vec2,
    /// Skew along X and Y, in degrees.
    pub skew: Vec2,
    /// Normalized anchor point: `(0, 0)` is the bottom-left of the content, `(1, 1)` the top-right.
    pub anchor_point: Point,
    /// Untransformed size of the node's content.
    pub content_size: Size,
    /// Treat the anchor as `(0, 0)` for positioning.
    pub ignore_anchor_point_for_position: bool,
    /// Extra transform applied after the node's own.
    pub additional_transform: Option<Affine>,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            scale: Vec2::new(1.0, 1.0),
            rotation: Vec2::ZERO,
            skew: Vec2::ZERO,
            anchor_point: Point::ZERO,
            content_size: Size::ZERO,
            ignore_anchor_point_for_position: false,
            additional_transform: None,
        }
    }
}

impl Geometry {
    /// Anchor point in content-space units.
    pub fn anchor_point_in_points(&self) -> Vec2 {
        Vec2::new(
            self.anchor_point.x * self.content_size.width,
            self.anchor_point.y * self.content_size.height,
        )
    }

    /// Content size multiplied by scale.
    pub fn scaled_content_size(&self) -> Size {
        Size::new(
            self.content_size.width * self.scale.x,
            self.content_size.height * self.scale.y,
        )
    }

    /// Node-to-parent matrix for this geometry.
    ///
    /// Translate, rotate, skew, scale about the anchor; then the additional
    /// transform, when present, is applied on top.
    pub fn local_transform(&self) -> Affine {
        let ap = self.anchor_point_in_points();
        let mut x = self.position.x;
        let mut y = self.position.y;
        if self.ignore_anchor_point_for_position {
            x += ap.x;
            y += ap.y;
        }

        let (sx, cx) = (-self.rotation.x.to_radians()).sin_cos();
        let (sy, cy) = (-self.rotation.y.to_radians()).sin_cos();
        let needs_skew = self.skew.x != 0.0 || self.skew.y != 0.0;
        let has_anchor = ap != Vec2::ZERO;

        if !needs_skew && has_anchor {
            x += cy * -ap.x * self.scale.x + -sx * -ap.y * self.scale.y;
            y += sy * -ap.x * self.scale.x + cx * -ap.y * self.scale.y;
        }

        let mut t = Affine::new([
            cy * self.scale.x,
            sy * self.scale.x,
            -sx * self.scale.y,
            cx * self.scale.y,
            x,
            y,
        ]);

        if needs_skew {
            let skew = Affine::new([
                1.0,
                self.skew.y.to_radians().tan(),
                self.skew.x.to_radians().tan(),
                1.0,
                0.0,
                0.0,
            ]);
            t *= skew;
            if has_anchor {
                t *= Affine::translate(-ap);
            }
        }

        match self.additional_transform {
            Some(extra) => extra * t,
            None => t,
        }
    }
}

/// Cached matrices of one node.
#[derive(Debug)]
pub(crate) struct TransformState {
    local: Cell<Affine>,
    inverse: Cell<Affine>,
    world: Cell<Affine>,
    dirty: Cell<DirtyFlags>,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            local: Cell::new(Affine::IDENTITY),
            inverse: Cell::new(Affine::IDENTITY),
            world: Cell::new(Affine::IDENTITY),
            dirty: Cell::new(DirtyFlags::all()),
        }
    }
}

impl TransformState {
    pub(crate) fn dirty(&self) -> DirtyFlags {
        self.dirty.get()
    }

    pub(crate) fn mark(&self, flags: DirtyFlags) {
        self.dirty.set(self.dirty.get() | flags);
    }

    fn clear(&self, flags: DirtyFlags) {
        self.dirty.set(self.dirty.get() - flags);
    }

    pub(crate) fn local(&self, geometry: &Geometry) -> Affine {
        if self
            .dirty
            .get()
            .intersects(DirtyFlags::TRANSFORM | DirtyFlags::ADDITIONAL)
        {
            self.local.set(geometry.local_transform());
            self.clear(DirtyFlags::TRANSFORM | DirtyFlags::ADDITIONAL);
            self.mark(DirtyFlags::INVERSE);
        }
        self.local.get()
    }

    pub(crate) fn inverse(&self, geometry: &Geometry) -> Affine {
        let local = self.local(geometry);
        if self.dirty.get().contains(DirtyFlags::INVERSE) {
            self.inverse.set(local.inverse());
            self.clear(DirtyFlags::INVERSE);
        }
        self.inverse.get()
    }

    pub(crate) fn cached_local(&self) -> Affine {
        self.local.get()
    }

    pub(crate) fn cached_world(&self) -> Affine {
        self.world.get()
    }

    pub(crate) fn set_world(&self, world: Affine) {
        self.world.set(world);
        self.clear(DirtyFlags::WORLD);
    }
}

/// Axis-aligned bounds of `rect` after `affine`.
pub(crate) fn transform_rect_bbox(affine: Affine, rect: Rect) -> Rect {
    let p0 = affine * Point::new(rect.x0, rect.y0);
    let p1 = affine * Point::new(rect.x1, rect.y0);
    let p2 = affine * Point::new(rect.x0, rect.y1);
    let p3 = affine * Point::new(rect.x1, rect.y1);
    let min_x = p0.x.min(p1.x).min(p2.x).min(p3.x);
    let min_y = p0.y.min(p1.y).min(p2.y).min(p3.y);
    let max_x = p0.x.max(p1.x).max(p2.x).max(p3.x);
    let max_y = p0.y.max(p1.y).max(p2.y).max(p3.y);
    Rect::new(min_x, min_y, max_x, max_y)
}

impl Tree {
    /// Node space to parent space. Identity for stale ids.
    pub fn node_to_parent_transform(&self, id: NodeId) -> Affine {
        self.get(id)
            .map_or(Affine::IDENTITY, |n| n.transform.local(&n.geometry))
    }

    /// Parent space to node space. Identity for stale ids.
    pub fn parent_to_node_transform(&self, id: NodeId) -> Affine {
        self.get(id)
            .map_or(Affine::IDENTITY, |n| n.transform.inverse(&n.geometry))
    }

    /// Node space to world space, validating every ancestor.
    ///
    /// Refreshes the cached world matrix of each node on the path.
    pub fn node_to_world_transform(&self, id: NodeId) -> Affine {
        let mut world = Affine::IDENTITY;
        for n in self.path_to_root(id) {
            let Some(node) = self.get(n) else {
                return Affine::IDENTITY;
            };
            world *= node.transform.local(&node.geometry);
            node.transform.set_world(world);
        }
        world
    }

    /// World space to node space.
    pub fn world_to_node_transform(&self, id: NodeId) -> Affine {
        self.node_to_world_transform(id).inverse()
    }

    /// Cached node-to-parent matrix, without checking dirty bits.
    pub fn node_to_parent_transform_fast(&self, id: NodeId) -> Affine {
        self.get(id)
            .map_or(Affine::IDENTITY, |n| n.transform.cached_local())
    }

    /// Parent's cached world matrix composed with this node's local matrix.
    ///
    /// Does not walk ancestors; the parent's cache must be current. The result
    /// is only cached when the parent's world matrix is clean.
    pub fn node_to_world_transform_fast(&self, id: NodeId) -> Affine {
        let Some(node) = self.get(id) else {
            return Affine::IDENTITY;
        };
        let parent = node.parent.and_then(|p| self.get(p));
        let parent_world = parent.map_or(Affine::IDENTITY, |p| p.transform.cached_world());
        let world = parent_world * node.transform.local(&node.geometry);
        if parent.is_none_or(|p| !p.transform.dirty().contains(DirtyFlags::WORLD)) {
            node.transform.set_world(world);
        }
        world
    }

    /// Last world matrix stored by a traversal or a world transform query.
    pub fn cached_world_transform(&self, id: NodeId) -> Option<Affine> {
        self.get(id).map(|n| n.transform.cached_world())
    }

    /// Dirty bits of a node's transform caches.
    pub fn transform_dirty_flags(&self, id: NodeId) -> Option<DirtyFlags> {
        self.get(id).map(|n| n.transform.dirty())
    }

    /// Convert a world-space point into node space.
    pub fn convert_to_node_space(&self, id: NodeId, world: Point) -> Point {
        self.world_to_node_transform(id) * world
    }

    /// Convert a node-space point into world space.
    pub fn convert_to_world_space(&self, id: NodeId, local: Point) -> Point {
        self.node_to_world_transform(id) * local
    }

    /// Convert a world-space point into node space, relative to the anchor.
    pub fn convert_to_node_space_ar(&self, id: NodeId, world: Point) -> Point {
        let ap = self.anchor_in_points(id);
        self.convert_to_node_space(id, world) - ap
    }

    /// Convert an anchor-relative node-space point into world space.
    pub fn convert_to_world_space_ar(&self, id: NodeId, local: Point) -> Point {
        let ap = self.anchor_in_points(id);
        self.convert_to_world_space(id, local + ap)
    }

    fn anchor_in_points(&self, id: NodeId) -> Vec2 {
        self.get(id)
            .map_or(Vec2::ZERO, |n| n.geometry.anchor_point_in_points())
    }

    /// Mark the local caches of `id` and the world caches of its subtree stale.
    pub(crate) fn mark_transform_dirty(&self, id: NodeId, extra: DirtyFlags) {
        let Some(node) = self.get(id) else {
            return;
        };
        node.transform
            .mark(DirtyFlags::TRANSFORM | DirtyFlags::INVERSE | extra);
        self.mark_world_dirty(id);
    }

    /// Mark the world cache of `id` and all descendants stale.
    ///
    /// A stale world cache implies stale caches below it, so subtrees that are
    /// already marked are skipped.
    pub(crate) fn mark_world_dirty(&self, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        node.transform.mark(DirtyFlags::WORLD);
        for &child in &node.children {
            let already = self
                .get(child)
                .is_none_or(|c| c.transform.dirty().contains(DirtyFlags::WORLD));
            if !already {
                self.mark_world_dirty(child);
            }
        }
    }
}
