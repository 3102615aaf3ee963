// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural errors reported by [`Tree`](crate::Tree).

use crate::types::NodeId;

/// A rejected structural change.
///
/// Returned by operations that would break the tree's ownership invariants.
/// The tree is left untouched when one of these is returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The id does not refer to a live node.
    #[error("node {0:?} is not alive")]
    StaleNode(NodeId),
    /// The child already has a parent (or is the running scene).
    #[error("node {child:?} is already owned by {parent:?}")]
    AlreadyParented {
        /// The node that was being added.
        child: NodeId,
        /// Its current owner, or `None` for the running scene root.
        parent: Option<NodeId>,
    },
    /// A node cannot be its own child.
    #[error("node {0:?} cannot be added to itself")]
    SelfParent(NodeId),
    /// Adding `child` under `parent` would make `child` its own ancestor.
    #[error("adding {child:?} under {parent:?} would create a cycle")]
    Cycle {
        /// The node that was being added.
        child: NodeId,
        /// The would-be parent, a descendant of `child`.
        parent: NodeId,
    },
    /// The node is not a child of the given parent.
    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild {
        /// The node that was expected to be a child.
        child: NodeId,
        /// The parent it was looked up in.
        parent: NodeId,
    },
}
