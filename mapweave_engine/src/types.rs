// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Handles, picks, view state and option types shared across the engine boundary.

use alloc::vec::Vec;
use kurbo::Point;

/// Identifier of a visual primitive (a feature) owned by the engine.
///
/// A small, copyable generational handle: a slot index and a generation counter.
///
/// ## Semantics
///
/// - A fresh slot starts at generation `1`.
/// - Removing a feature frees its slot; every `FeatureId` pointing at it becomes stale.
/// - Reusing a freed slot increments its generation, so a recreated primitive never
///   compares equal to the one it replaced.
///
/// The runtime relies on the last point: a model whose primitive was recreated is detected
/// by comparing ids.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FeatureId(u32, u32);

impl FeatureId {
    /// Build a handle from a slot index and generation.
    pub const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    /// Slot index.
    pub const fn idx(self) -> usize {
        self.0 as usize
    }

    /// Generation of the slot when this handle was issued.
    pub const fn generation(self) -> u32 {
        self.1
    }
}

/// Identifier of an engine-level layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EngineLayerId(pub u32);

/// One result of an engine hit test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pick {
    /// A single primitive.
    Feature(FeatureId),
    /// A rendered cluster and the primitives it aggregates.
    ///
    /// Clusters of one member are reported as clusters too; callers decide whether to
    /// unwrap them.
    Cluster(Vec<FeatureId>),
}

impl Pick {
    /// Primitives covered by this pick.
    pub fn features(&self) -> &[FeatureId] {
        match self {
            Self::Feature(f) => core::slice::from_ref(f),
            Self::Cluster(members) => members,
        }
    }
}

/// Snapshot of the current view, handed to style functions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct View {
    /// Map coordinate at the center of the viewport.
    pub center: Point,
    /// Map units per pixel.
    pub resolution: f64,
    /// Zoom level; larger is closer.
    pub zoom: f64,
}

impl Default for View {
    fn default() -> Self {
        Self {
            center: Point::ORIGIN,
            resolution: 1.0,
            zoom: 0.0,
        }
    }
}

/// How to fit the view to an extent.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FitOptions {
    /// Padding in pixels: top, right, bottom, left.
    pub padding: [f64; 4],
    /// Animation duration; `None` jumps.
    pub duration_ms: Option<u32>,
    /// Never zoom in beyond this level.
    pub max_zoom: Option<f64>,
}

/// Clustering parameters for a clustered layer's cluster source.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClusterSettings {
    /// Pixel distance within which features are grouped.
    pub distance: f64,
    /// Minimum pixel distance between rendered clusters.
    pub min_distance: f64,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            distance: 40.0,
            min_distance: 0.0,
        }
    }
}

bitflags::bitflags! {
    /// Pointer listeners the runtime currently needs from the host.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Listeners: u8 {
        /// Pointer moves (hover, cursor, drags).
        const POINTER_MOVE = 0b0000_0001;
        /// Single clicks (select, click, clusters, click popups).
        const CLICK        = 0b0000_0010;
        /// Double clicks.
        const DOUBLE_CLICK = 0b0000_0100;
        /// Pointer presses (drag start).
        const POINTER_DOWN = 0b0000_1000;
        /// Pointer releases (drag end).
        const POINTER_UP   = 0b0001_0000;
        /// Everything a drag session needs.
        const DRAG = Self::POINTER_DOWN.bits() | Self::POINTER_MOVE.bits() | Self::POINTER_UP.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn generations_distinguish_reused_slots() {
        let a = FeatureId::new(3, 1);
        let b = FeatureId::new(3, 2);
        assert_ne!(a, b);
        assert_eq!(a.idx(), b.idx());
        assert!(b.generation() > a.generation());
    }

    #[test]
    fn pick_features() {
        let f = FeatureId::new(0, 1);
        assert_eq!(Pick::Feature(f).features(), &[f]);
        let members = vec![FeatureId::new(1, 1), FeatureId::new(2, 1)];
        assert_eq!(Pick::Cluster(members.clone()).features(), members.as_slice());
    }

    #[test]
    fn drag_listeners_cover_down_move_up() {
        assert!(Listeners::DRAG.contains(Listeners::POINTER_DOWN));
        assert!(Listeners::DRAG.contains(Listeners::POINTER_MOVE));
        assert!(Listeners::DRAG.contains(Listeners::POINTER_UP));
        assert!(!Listeners::DRAG.contains(Listeners::CLICK));
    }
}
