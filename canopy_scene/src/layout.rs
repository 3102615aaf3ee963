// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layout strategies and per-child layout options.
//!
//! A node may carry one [`Layout`], which positions its children when
//! [`Tree::update_layout`] runs. Children carry [`LayoutOptions`] that the
//! parent's strategy reads. [`AnchorLayout`] is the built-in strategy: it
//! pins children with [`AnchorLayoutOptions`] to an [`Anchor`] of the
//! parent's content rect.

use alloc::boxed::Box;
use core::any::Any;
use core::fmt;

use kurbo::{Point, Size, Vec2};
use smallvec::SmallVec;

use crate::error::TreeError;
use crate::tree::Tree;
use crate::types::NodeId;

/// Positions the children of a node.
pub trait Layout: Any {
    /// Arrange `children` of `node`, whose content has size `content_size`.
    ///
    /// `children` is a snapshot in sibling order taken before the call.
    fn apply(&mut self, tree: &mut Tree, node: NodeId, children: &[NodeId], content_size: Size);

    /// Preferred content size of `node` under this layout.
    fn size_hint(&self, tree: &Tree, node: NodeId) -> Size {
        tree.get(node).map_or(Size::ZERO, |n| n.content_size())
    }
}

/// Per-child data read by the parent's [`Layout`].
pub trait LayoutOptions: Any + fmt::Debug {}

/// A named point of a rectangle. Y grows upward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Middle of the rectangle.
    #[default]
    Center,
    /// Top-left corner.
    TopLeft,
    /// Middle of the top edge.
    Top,
    /// Top-right corner.
    TopRight,
    /// Middle of the right edge.
    Right,
    /// Bottom-right corner.
    BottomRight,
    /// Middle of the bottom edge.
    Bottom,
    /// Bottom-left corner, the origin.
    BottomLeft,
    /// Middle of the left edge.
    Left,
}

impl Anchor {
    /// This anchor within a rectangle of `size` placed at the origin.
    pub fn position_in(self, size: Size) -> Point {
        let (w, h) = (size.width, size.height);
        match self {
            Self::Center => Point::new(w / 2.0, h / 2.0),
            Self::TopLeft => Point::new(0.0, h),
            Self::Top => Point::new(w / 2.0, h),
            Self::TopRight => Point::new(w, h),
            Self::Right => Point::new(w, h / 2.0),
            Self::BottomRight => Point::new(w, 0.0),
            Self::Bottom => Point::new(w / 2.0, 0.0),
            Self::BottomLeft => Point::ZERO,
            Self::Left => Point::new(0.0, h / 2.0),
        }
    }
}

/// Pins a child to an anchor of its parent, plus an offset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AnchorLayoutOptions {
    /// Anchor of the parent's content rect.
    pub anchor: Anchor,
    /// Offset from the anchor, in parent space.
    pub offset: Vec2,
}

impl LayoutOptions for AnchorLayoutOptions {}

impl AnchorLayoutOptions {
    /// Position of a child inside a parent with content of `size`.
    pub fn position_in(&self, size: Size) -> Point {
        self.anchor.position_in(size) + self.offset
    }
}

/// Moves every child carrying [`AnchorLayoutOptions`] to its anchor.
///
/// Children without those options are left where they are.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnchorLayout;

impl Layout for AnchorLayout {
    fn apply(&mut self, tree: &mut Tree, _node: NodeId, children: &[NodeId], content_size: Size) {
        for &child in children {
            let Some(options) = tree.layout_options_as::<AnchorLayoutOptions>(child) else {
                continue;
            };
            let target = options.position_in(content_size);
            tree.set_position(child, target);
        }
    }
}

impl Tree {
    /// Attach or remove the layout of `node`.
    ///
    /// With `respect_anchor`, a node that ignores its anchor for positioning
    /// stops doing so, and its children are moved so that they stay where
    /// they were on screen. With `apply`, the layout runs immediately.
    pub fn set_layout(
        &mut self,
        node: NodeId,
        layout: Option<Box<dyn Layout>>,
        apply: bool,
        respect_anchor: bool,
    ) {
        let Some(n) = self.get(node) else {
            log::warn!("set_layout: stale node {node:?}");
            return;
        };
        if respect_anchor && n.is_ignore_anchor_point_for_position() {
            let before = self.node_to_parent_transform(node);
            self.ignore_anchor_point_for_position(node, false);
            let after = self.node_to_parent_transform(node);
            let compensate = after.inverse() * before;
            let children: SmallVec<[NodeId; 8]> = self.children(node).iter().copied().collect();
            for child in children {
                let Some(c) = self.get(child) else {
                    continue;
                };
                let moved = compensate * c.position();
                self.set_position(child, moved);
            }
        }
        if let Some(n) = self.node_opt_mut(node) {
            n.layout = layout;
        }
        if apply {
            self.update_layout(node, true);
        }
    }

    /// The layout of `node`.
    ///
    /// `None` while the layout itself is running.
    pub fn layout(&self, node: NodeId) -> Option<&dyn Layout> {
        self.get(node)?.layout.as_deref()
    }

    /// The layout of `node`, downcast to `T`.
    pub fn layout_as<T: Layout>(&self, node: NodeId) -> Option<&T> {
        let l: &dyn Any = self.layout(node)?;
        l.downcast_ref::<T>()
    }

    /// Run the layout of `node` over its current children.
    ///
    /// Sorts the children first when `update_child_order` is set. Does nothing
    /// when no layout is attached.
    pub fn update_layout(&mut self, node: NodeId, update_child_order: bool) {
        if update_child_order {
            self.sort_all_children(node);
        }
        let Some(n) = self.node_opt_mut(node) else {
            return;
        };
        let Some(mut layout) = n.layout.take() else {
            return;
        };
        let size = n.content_size();
        let children: SmallVec<[NodeId; 8]> = n.children().iter().copied().collect();
        log::trace!("layout {node:?} over {} children", children.len());
        layout.apply(self, node, &children, size);
        if let Some(n) = self.node_opt_mut(node)
            && n.layout.is_none()
        {
            n.layout = Some(layout);
        }
    }

    /// Set the layout options of `node`.
    ///
    /// With `apply`, the parent's layout runs afterwards.
    pub fn set_layout_options(
        &mut self,
        node: NodeId,
        options: Option<Box<dyn LayoutOptions>>,
        apply: bool,
    ) {
        let Some(n) = self.node_opt_mut(node) else {
            log::warn!("set_layout_options: stale node {node:?}");
            return;
        };
        n.layout_options = options;
        if apply && let Some(parent) = n.parent() {
            self.update_layout(parent, true);
        }
    }

    /// The layout options of `node`.
    pub fn layout_options(&self, node: NodeId) -> Option<&dyn LayoutOptions> {
        self.get(node)?.layout_options.as_deref()
    }

    /// The layout options of `node`, downcast to `T`.
    pub fn layout_options_as<T: LayoutOptions>(&self, node: NodeId) -> Option<&T> {
        let o: &dyn Any = self.layout_options(node)?;
        o.downcast_ref::<T>()
    }

    /// Add `child` under `parent`, pinned to `anchor` plus `offset`.
    ///
    /// The child is placed at the anchor of the parent's content rect whatever
    /// layout the parent has; the parent's layout is not re-run.
    /// `node_anchor` replaces the child's anchor point when given. With
    /// `use_anchor_layout`, a parent without a layout gets an [`AnchorLayout`].
    pub fn add_child_at_position(
        &mut self,
        parent: NodeId,
        child: NodeId,
        anchor: Anchor,
        offset: Vec2,
        node_anchor: Option<Point>,
        use_anchor_layout: bool,
    ) -> Result<(), TreeError> {
        if let Err(err) = self.check_attach(parent, child) {
            log::error!("add_child_at_position rejected: {err}");
            return Err(err);
        }
        if use_anchor_layout && self.layout(parent).is_none() {
            self.set_layout(parent, Some(Box::new(AnchorLayout)), false, true);
        }
        if let Some(a) = node_anchor {
            self.set_anchor_point(child, a);
        }
        let options = AnchorLayoutOptions { anchor, offset };
        self.set_layout_options(child, Some(Box::new(options)), false);
        let size = self.get(parent).map_or(Size::ZERO, |p| p.content_size());
        self.set_position(child, options.position_in(size));
        self.add_child(parent, child)
    }

    /// Move an attached child to a new anchor and offset.
    ///
    /// Only children that already carry [`AnchorLayoutOptions`] are affected;
    /// returns false otherwise. The parent's layout is not re-run.
    pub fn update_anchored_position(
        &mut self,
        child: NodeId,
        anchor: Anchor,
        offset: Vec2,
        node_anchor: Option<Point>,
    ) -> bool {
        let Some(parent) = self.parent(child) else {
            return false;
        };
        if self.layout_options_as::<AnchorLayoutOptions>(child).is_none() {
            return false;
        }
        if let Some(a) = node_anchor {
            self.set_anchor_point(child, a);
        }
        let options = AnchorLayoutOptions { anchor, offset };
        self.set_layout_options(child, Some(Box::new(options)), false);
        let size = self.get(parent).map_or(Size::ZERO, |p| p.content_size());
        self.set_position(child, options.position_in(size));
        true
    }
}
