// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hover set helper: compute enter/leave transitions between two hit sets.

use alloc::vec::Vec;

/// The ids currently hovered on one layer.
///
/// Updating with the ids hit by a new pointer position yields every leave first (in the
/// order the ids were entered), then every enter (in hit order).
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct HoverSet<K> {
    current: Vec<K>,
}

/// A hover transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum HoverEvent<K> {
    /// The pointer entered the item.
    Enter(K),
    /// The pointer left the item.
    Leave(K),
}

impl<K: Clone + Eq> HoverSet<K> {
    pub(crate) fn new() -> Self {
        Self {
            current: Vec::new(),
        }
    }

    pub(crate) fn current(&self) -> &[K] {
        &self.current
    }

    /// Forget every id, returning the corresponding leaves.
    pub(crate) fn clear(&mut self) -> Vec<HoverEvent<K>> {
        self.update(&[])
    }

    /// Drop the ids `keep` rejects, without producing transitions.
    pub(crate) fn forget(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.current.retain(|k| keep(k));
    }

    /// Replace the hovered ids with `next` and return the transitions.
    pub(crate) fn update(&mut self, next: &[K]) -> Vec<HoverEvent<K>> {
        let mut out: Vec<HoverEvent<K>> = self
            .current
            .iter()
            .filter(|k| !next.contains(k))
            .cloned()
            .map(HoverEvent::Leave)
            .collect();
        out.extend(
            next.iter()
                .filter(|k| !self.current.contains(k))
                .cloned()
                .map(HoverEvent::Enter),
        );
        self.current.clear();
        self.current.extend_from_slice(next);
        out
    }
}
