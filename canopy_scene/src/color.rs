// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Color capability: own and displayed color and opacity, with optional
//! cascading into color-capable children.
//!
//! The displayed value of a node is its own value modulated by the displayed
//! value of its parent, when the parent cascades. Children that are not
//! color-capable are skipped, and so is their subtree.

use smallvec::SmallVec;

use crate::tree::Tree;
use crate::types::NodeId;

/// An opaque 8-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color3B {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Color3B {
    /// White, the neutral element for modulation.
    pub const WHITE: Self = Self::new(255, 255, 255);
    /// Black.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Create a color from channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channel-wise product, normalized to 255.
    pub fn modulate(self, other: Self) -> Self {
        Self::new(
            modulate(self.r, other.r),
            modulate(self.g, other.g),
            modulate(self.b, other.b),
        )
    }
}

impl Default for Color3B {
    fn default() -> Self {
        Self::WHITE
    }
}

fn modulate(a: u8, b: u8) -> u8 {
    u8::try_from(u16::from(a) * u16::from(b) / 255).unwrap_or(u8::MAX)
}

/// Color and opacity of a color-capable node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorState {
    /// The node's own color.
    pub color: Color3B,
    /// Color after modulation by cascading ancestors.
    pub displayed_color: Color3B,
    /// The node's own opacity.
    pub opacity: u8,
    /// Opacity after modulation by cascading ancestors.
    pub displayed_opacity: u8,
    /// Whether the displayed color is pushed into children.
    pub cascade_color: bool,
    /// Whether the displayed opacity is pushed into children.
    pub cascade_opacity: bool,
}

impl Default for ColorState {
    fn default() -> Self {
        Self {
            color: Color3B::WHITE,
            displayed_color: Color3B::WHITE,
            opacity: 255,
            displayed_opacity: 255,
            cascade_color: false,
            cascade_opacity: false,
        }
    }
}

impl Tree {
    /// Make `node` color-capable. Returns false if it already was, or is stale.
    pub fn enable_color(&mut self, node: NodeId) -> bool {
        match self.node_opt_mut(node) {
            Some(n) if n.color.is_none() => {
                n.color = Some(ColorState::default());
                true
            }
            _ => false,
        }
    }

    fn color_mut(&mut self, node: NodeId, op: &str) -> Option<&mut ColorState> {
        let state = self.node_opt_mut(node).and_then(|n| n.color.as_mut());
        if state.is_none() {
            log::warn!("{op}: {node:?} is not color-capable");
        }
        state
    }

    /// Displayed opacity that the parent of `node` pushes down, or 255.
    fn inherited_opacity(&self, node: NodeId) -> u8 {
        self.parent(node)
            .and_then(|p| self.get(p)?.color)
            .filter(|c| c.cascade_opacity)
            .map_or(255, |c| c.displayed_opacity)
    }

    /// Displayed color that the parent of `node` pushes down, or white.
    fn inherited_color(&self, node: NodeId) -> Color3B {
        self.parent(node)
            .and_then(|p| self.get(p)?.color)
            .filter(|c| c.cascade_color)
            .map_or(Color3B::WHITE, |c| c.displayed_color)
    }

    fn color_children(&self, node: NodeId) -> SmallVec<[NodeId; 8]> {
        self.children(node)
            .iter()
            .copied()
            .filter(|&c| self.get(c).is_some_and(|n| n.color.is_some()))
            .collect()
    }

    /// Set the own opacity of `node` and refresh displayed opacities.
    pub fn set_opacity(&mut self, node: NodeId, opacity: u8) {
        let Some(state) = self.color_mut(node, "set_opacity") else {
            return;
        };
        state.opacity = opacity;
        let inherited = self.inherited_opacity(node);
        self.update_displayed_opacity(node, inherited);
    }

    /// Set the own color of `node` and refresh displayed colors.
    pub fn set_color(&mut self, node: NodeId, color: Color3B) {
        let Some(state) = self.color_mut(node, "set_color") else {
            return;
        };
        state.color = color;
        let inherited = self.inherited_color(node);
        self.update_displayed_color(node, inherited);
    }

    /// Recompute the displayed opacity of `node` from `parent_opacity`,
    /// cascading into children when enabled.
    pub fn update_displayed_opacity(&mut self, node: NodeId, parent_opacity: u8) {
        let Some(state) = self.node_opt_mut(node).and_then(|n| n.color.as_mut()) else {
            return;
        };
        state.displayed_opacity = modulate(state.opacity, parent_opacity);
        let (displayed, cascade) = (state.displayed_opacity, state.cascade_opacity);
        if cascade {
            for child in self.color_children(node) {
                self.update_displayed_opacity(child, displayed);
            }
        }
    }

    /// Recompute the displayed color of `node` from `parent_color`,
    /// cascading into children when enabled.
    pub fn update_displayed_color(&mut self, node: NodeId, parent_color: Color3B) {
        let Some(state) = self.node_opt_mut(node).and_then(|n| n.color.as_mut()) else {
            return;
        };
        state.displayed_color = state.color.modulate(parent_color);
        let (displayed, cascade) = (state.displayed_color, state.cascade_color);
        if cascade {
            for child in self.color_children(node) {
                self.update_displayed_color(child, displayed);
            }
        }
    }

    /// Enable or disable opacity cascading from `node`.
    ///
    /// Children are refreshed: they inherit the displayed opacity when enabled
    /// and fall back to their own opacity when disabled.
    pub fn set_cascade_opacity_enabled(&mut self, node: NodeId, enabled: bool) {
        let Some(state) = self.color_mut(node, "set_cascade_opacity_enabled") else {
            return;
        };
        state.cascade_opacity = enabled;
        let pushed = if enabled { state.displayed_opacity } else { 255 };
        for child in self.color_children(node) {
            self.update_displayed_opacity(child, pushed);
        }
    }

    /// Enable or disable color cascading from `node`.
    pub fn set_cascade_color_enabled(&mut self, node: NodeId, enabled: bool) {
        let Some(state) = self.color_mut(node, "set_cascade_color_enabled") else {
            return;
        };
        state.cascade_color = enabled;
        let pushed = if enabled {
            state.displayed_color
        } else {
            Color3B::WHITE
        };
        for child in self.color_children(node) {
            self.update_displayed_color(child, pushed);
        }
    }
}
