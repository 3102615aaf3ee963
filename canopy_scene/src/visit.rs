// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw-order traversal.
//!
//! A visit walks a subtree in draw order: children with negative z-order,
//! then the node itself, then the remaining children. Dirty child orders are
//! sorted and world caches refreshed along the way, so the `_fast` transform
//! accessors are valid for every visited node afterwards.

use kurbo::Affine;
use smallvec::SmallVec;

use crate::node::Node;
use crate::tree::Tree;
use crate::types::NodeId;

/// Receives nodes in draw order.
pub trait Renderer {
    /// Draw `node`, whose node-to-world matrix is `world`.
    fn draw(&mut self, tree: &Tree, node: NodeId, world: Affine);
}

impl<F> Renderer for F
where
    F: FnMut(&Tree, NodeId, Affine),
{
    fn draw(&mut self, tree: &Tree, node: NodeId, world: Affine) {
        self(tree, node, world);
    }
}

type Snapshot = SmallVec<[NodeId; 8]>;

impl Tree {
    /// Visit the subtree of `root` in draw order.
    ///
    /// Invisible nodes are skipped together with their subtree.
    pub fn visit(&mut self, root: NodeId, renderer: &mut impl Renderer) {
        let parent_world = self.parent_world(root);
        self.visit_from(root, parent_world, renderer);
    }

    /// Refresh the cached world matrix of every node under `root`, visible or not.
    pub fn update_world_transforms(&mut self, root: NodeId) {
        let parent_world = self.parent_world(root);
        self.refresh_from(root, parent_world);
    }

    fn parent_world(&self, id: NodeId) -> Affine {
        self.parent(id)
            .map_or(Affine::IDENTITY, |p| self.node_to_world_transform(p))
    }

    fn refresh_world(&self, id: NodeId, parent_world: Affine) -> Affine {
        let Some(n) = self.get(id) else {
            return parent_world;
        };
        let world = parent_world * n.transform.local(&n.geometry);
        n.transform.set_world(world);
        world
    }

    fn visit_from(&mut self, id: NodeId, parent_world: Affine, renderer: &mut impl Renderer) {
        if !self.get(id).is_some_and(Node::is_visible) {
            return;
        }
        self.sort_all_children(id);
        let world = self.refresh_world(id, parent_world);
        let children: Snapshot = self.children(id).iter().copied().collect();
        let split = children
            .iter()
            .position(|&c| self.get(c).map_or(0, Node::z_order) >= 0)
            .unwrap_or(children.len());
        log::trace!("visit {id:?}: {} children, {split} behind", children.len());
        for &child in &children[..split] {
            self.visit_from(child, world, renderer);
        }
        renderer.draw(self, id, world);
        for &child in &children[split..] {
            self.visit_from(child, world, renderer);
        }
    }

    fn refresh_from(&self, id: NodeId, parent_world: Affine) {
        let world = self.refresh_world(id, parent_world);
        for &child in self.children(id) {
            self.refresh_from(child, world);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBuilder;
    use crate::transform::DirtyFlags;
    use alloc::vec::Vec;
    use kurbo::Point;

    fn draw_order(tree: &mut Tree, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        tree.visit(root, &mut |_: &Tree, id: NodeId, _: Affine| out.push(id));
        out
    }

    #[test]
    fn negative_z_draws_behind_parent() {
        let mut tree = Tree::new();
        let root = tree.create_node();
        let b = tree.create_node();
        let c = tree.create_node();
        let d = tree.create_node();
        tree.add_child_with_z(root, b, 0).unwrap();
        tree.add_child_with_z(root, c, 0).unwrap();
        tree.add_child_with_z(root, d, -1).unwrap();
        assert!(tree.is_children_order_dirty(root));

        assert_eq!(draw_order(&mut tree, root), [d, root, b, c]);
        assert!(!tree.is_children_order_dirty(root));
        assert_eq!(tree.children(root), [d, b, c]);
    }

    #[test]
    fn invisible_subtrees_are_skipped() {
        let mut tree = Tree::new();
        let root = tree.create_node();
        let hidden = tree.create_node_with(NodeBuilder::new().visible(false));
        let under_hidden = tree.create_node();
        let shown = tree.create_node();
        tree.add_child(root, hidden).unwrap();
        tree.add_child(hidden, under_hidden).unwrap();
        tree.add_child(root, shown).unwrap();
        assert_eq!(draw_order(&mut tree, root), [root, shown]);

        tree.set_visible(root, false);
        assert!(draw_order(&mut tree, root).is_empty());
    }

    #[test]
    fn visit_refreshes_world_caches() {
        let mut tree = Tree::new();
        let root = tree.create_node_with(NodeBuilder::new().position((10.0, 0.0)));
        let child = tree.create_node_with(NodeBuilder::new().position((0.0, 5.0)).scale(2.0));
        let leaf = tree.create_node_with(NodeBuilder::new().position((1.0, 1.0)));
        tree.add_child(root, child).unwrap();
        tree.add_child(child, leaf).unwrap();

        let mut worlds = Vec::new();
        tree.visit(root, &mut |_: &Tree, id: NodeId, w: Affine| worlds.push((id, w)));
        let leaf_world = worlds.iter().find(|(id, _)| *id == leaf).unwrap().1;
        assert_eq!(leaf_world * Point::ZERO, Point::new(12.0, 7.0));
        assert_eq!(tree.node_to_world_transform_fast(leaf), leaf_world);
        assert!(!tree.transform_dirty_flags(leaf).unwrap().contains(DirtyFlags::WORLD));
    }

    #[test]
    fn visiting_a_subtree_uses_ancestor_transforms() {
        let mut tree = Tree::new();
        let root = tree.create_node_with(NodeBuilder::new().position((3.0, 4.0)));
        let mid = tree.create_node();
        tree.add_child(root, mid).unwrap();
        let mut seen = None;
        tree.visit(mid, &mut |_: &Tree, _: NodeId, w: Affine| seen = Some(w));
        assert_eq!(seen.map(|w| w * Point::ZERO), Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn update_world_transforms_includes_hidden_nodes() {
        let mut tree = Tree::new();
        let root = tree.create_node_with(NodeBuilder::new().position((1.0, 2.0)));
        let hidden = tree.create_node_with(NodeBuilder::new().visible(false));
        tree.add_child(root, hidden).unwrap();
        tree.update_world_transforms(root);
        assert_eq!(
            tree.cached_world_transform(hidden).map(|w| w * Point::ZERO),
            Some(Point::new(1.0, 2.0))
        );
    }

    struct Counter(usize);

    impl Renderer for Counter {
        fn draw(&mut self, tree: &Tree, node: NodeId, _world: Affine) {
            assert!(tree.is_alive(node));
            self.0 += 1;
        }
    }

    #[test]
    fn custom_renderer() {
        let mut tree = Tree::new();
        let root = tree.create_node();
        for _ in 0..3 {
            let c = tree.create_node();
            tree.add_child(root, c).unwrap();
        }
        let mut counter = Counter(0);
        tree.visit(root, &mut counter);
        assert_eq!(counter.0, 4);
    }
}
