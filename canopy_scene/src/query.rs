// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lookup by string identifier and a small selector language.
//!
//! A query is a list of ids separated by whitespace, meaning "descendant at
//! any depth", or by `>`, meaning "direct child". `"menu > play icon"` finds
//! `icon` anywhere below the `play` child of `menu`, where `menu` itself can
//! be anywhere below the query root. A leading `>` anchors the first id to the
//! root's direct children.

use alloc::vec::Vec;

use crate::tree::Tree;
use crate::types::NodeId;

/// How a query step relates to the previous match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    /// Any depth below.
    Descendant,
    /// Direct child.
    Child,
}

/// One id of a parsed query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step<'a> {
    /// Relation to the previous match, or to the query root for the first step.
    pub combinator: Combinator,
    /// Identifier to match.
    pub id: &'a str,
}

/// Split a query into steps.
///
/// Returns `None` for an empty query, a trailing `>` or two `>` in a row.
pub fn parse_query(query: &str) -> Option<Vec<Step<'_>>> {
    let mut steps = Vec::new();
    let mut child = false;
    let mut rest = query;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if let Some(after) = rest.strip_prefix('>') {
            if child {
                return None;
            }
            child = true;
            rest = after;
            continue;
        }
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>')
            .unwrap_or(rest.len());
        let (id, tail) = rest.split_at(end);
        steps.push(Step {
            combinator: if child {
                Combinator::Child
            } else {
                Combinator::Descendant
            },
            id,
        });
        child = false;
        rest = tail;
    }
    if child || steps.is_empty() {
        return None;
    }
    Some(steps)
}

impl Tree {
    /// First direct child of `parent` with the given id, in storage order.
    pub fn child_by_id(&self, parent: NodeId, id: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.get(c).is_some_and(|n| n.id() == id))
    }

    /// First descendant of `parent` with the given id, depth first, pre-order.
    pub fn child_by_id_recursive(&self, parent: NodeId, id: &str) -> Option<NodeId> {
        self.children(parent).iter().copied().find_map(|c| {
            if self.get(c).is_some_and(|n| n.id() == id) {
                Some(c)
            } else {
                self.child_by_id_recursive(c, id)
            }
        })
    }

    /// Remove the first direct child with the given id, cancelling its scheduled work.
    pub fn remove_child_by_id(&mut self, parent: NodeId, id: &str) -> bool {
        match self.child_by_id(parent, id) {
            Some(child) => self.remove_child(parent, child, true),
            None => false,
        }
    }

    /// Resolve a selector below `root`.
    ///
    /// Whitespace separates descendant steps and `>` child steps; a leading `>`
    /// restricts the first id to direct children of `root`. Malformed queries
    /// resolve to `None`.
    pub fn query_selector(&self, root: NodeId, query: &str) -> Option<NodeId> {
        let Some(steps) = parse_query(query) else {
            log::debug!("query_selector: malformed query {query:?}");
            return None;
        };
        steps.iter().try_fold(root, |at, step| match step.combinator {
            Combinator::Descendant => self.child_by_id_recursive(at, step.id),
            Combinator::Child => self.child_by_id(at, step.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBuilder;

    fn named(tree: &mut Tree, parent: NodeId, id: &str) -> NodeId {
        let n = tree.create_node_with(NodeBuilder::new().id(id));
        tree.add_child(parent, n).unwrap();
        n
    }

    #[test]
    fn parses_combinators() {
        let steps = parse_query("  a b>c  > d ").unwrap();
        let shape: Vec<_> = steps.iter().map(|s| (s.combinator, s.id)).collect();
        assert_eq!(
            shape,
            [
                (Combinator::Descendant, "a"),
                (Combinator::Descendant, "b"),
                (Combinator::Child, "c"),
                (Combinator::Child, "d"),
            ]
        );
        assert_eq!(parse_query("> a").unwrap()[0].combinator, Combinator::Child);
    }

    #[test]
    fn rejects_malformed_queries() {
        for q in ["", "   ", "a >", "a > > b", ">", "a >> b"] {
            assert!(parse_query(q).is_none(), "{q:?}");
        }
    }

    #[test]
    fn descendant_then_child() {
        // root
        // └ wrap
        //   └ a
        //     ├ x
        //     │ └ c   (not a direct child of b)
        //     └ b
        //       └ c   <- target
        let mut tree = Tree::new();
        let root = tree.create_node();
        let wrap = named(&mut tree, root, "wrap");
        let a = named(&mut tree, wrap, "a");
        let x = named(&mut tree, a, "x");
        let _decoy = named(&mut tree, x, "c");
        let b = named(&mut tree, a, "b");
        let target = named(&mut tree, b, "c");

        assert_eq!(tree.query_selector(root, "a b > c"), Some(target));
        assert_eq!(tree.query_selector(root, "a > b > c"), Some(target));
        assert_eq!(tree.query_selector(root, "> a"), None, "a is not a direct child");
        assert_eq!(tree.query_selector(root, "> wrap a"), Some(a));
        assert_eq!(tree.query_selector(root, "a > c"), None);
        assert_eq!(tree.query_selector(root, "a missing"), None);
        assert_eq!(tree.query_selector(root, "a b >"), None);
    }

    #[test]
    fn recursive_lookup_is_preorder() {
        let mut tree = Tree::new();
        let root = tree.create_node();
        let first = named(&mut tree, root, "first");
        let deep = named(&mut tree, first, "same");
        let _shallow = named(&mut tree, root, "same");
        assert_eq!(tree.child_by_id_recursive(root, "same"), Some(deep));
        assert_eq!(tree.child_by_id(root, "first"), Some(first));
    }

    #[test]
    fn remove_child_by_id_cleans_up() {
        use crate::schedule::Repeat;

        let mut tree = Tree::new();
        let root = tree.create_node();
        let victim = named(&mut tree, root, "victim");
        tree.retain(victim);
        tree.schedule(victim, "t", 1.0, Repeat::Forever, 0.0, |_, _, _| {});
        assert!(tree.is_scheduled(victim, "t"));
        assert!(tree.remove_child_by_id(root, "victim"));
        assert!(!tree.remove_child_by_id(root, "victim"));
        assert!(tree.is_alive(victim), "held node survives");
        assert!(!tree.is_scheduled(victim, "t"));
    }
}
