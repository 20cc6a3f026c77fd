// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer visiting order for hit-testing passes.

use alloc::vec::Vec;
use core::cmp::Ordering;

/// Rank of a layer within one pass.
///
/// Higher z-index ranks first; equal z-indices keep declaration order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct LayerRank {
    pub(crate) z_index: i32,
    pub(crate) declared: usize,
}

impl Ord for LayerRank {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .z_index
            .cmp(&self.z_index)
            .then(self.declared.cmp(&other.declared))
    }
}

impl PartialOrd for LayerRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(Ord::cmp(self, other))
    }
}

/// Indices of `z_indices` (in declaration order) in visiting order.
pub(crate) fn visit_order(z_indices: impl IntoIterator<Item = i32>) -> Vec<usize> {
    let mut ranks: Vec<LayerRank> = z_indices
        .into_iter()
        .enumerate()
        .map(|(declared, z_index)| LayerRank { z_index, declared })
        .collect();
    ranks.sort();
    ranks.into_iter().map(|r| r.declared).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_z_first() {
        assert_eq!(visit_order([0, 10, 5]), [1, 2, 0]);
    }

    #[test]
    fn ties_keep_declaration_order() {
        assert_eq!(visit_order([3, 7, 3, 7]), [1, 3, 0, 2]);
    }

    #[test]
    fn rank_ordering() {
        let top = LayerRank { z_index: 2, declared: 5 };
        let low = LayerRank { z_index: 1, declared: 0 };
        assert!(top < low);
        let first = LayerRank { z_index: 1, declared: 0 };
        let second = LayerRank { z_index: 1, declared: 1 };
        assert!(first < second);
    }
}
