// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Feature state: transient labels on primitives.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use mapweave_engine::FeatureId;

/// Labels attached to each primitive, in activation order.
///
/// A label appears at most once per primitive. Primitives without labels are not stored.
#[derive(Clone, Debug, Default)]
pub(crate) struct FeatureStates {
    labels: BTreeMap<FeatureId, Vec<String>>,
}

impl FeatureStates {
    /// Active labels of `feature`.
    pub(crate) fn get(&self, feature: FeatureId) -> &[String] {
        self.labels.get(&feature).map_or(&[], Vec::as_slice)
    }

    /// Activate `label`. Returns `false` if it was already active.
    pub(crate) fn add(&mut self, feature: FeatureId, label: &str) -> bool {
        let labels = self.labels.entry(feature).or_default();
        if labels.iter().any(|l| l == label) {
            return false;
        }
        labels.push(String::from(label));
        true
    }

    /// Deactivate `label`. Returns `false` if it was not active.
    pub(crate) fn remove(&mut self, feature: FeatureId, label: &str) -> bool {
        let Some(labels) = self.labels.get_mut(&feature) else {
            return false;
        };
        let before = labels.len();
        labels.retain(|l| l != label);
        let removed = labels.len() != before;
        if labels.is_empty() {
            self.labels.remove(&feature);
        }
        removed
    }

    /// Replace every label of `feature`.
    pub(crate) fn set(&mut self, feature: FeatureId, labels: &[&str]) {
        self.labels.remove(&feature);
        for label in labels {
            self.add(feature, label);
        }
    }

    /// Drop every label of `feature`. Returns whether it had any.
    pub(crate) fn clear(&mut self, feature: FeatureId) -> bool {
        self.labels.remove(&feature).is_some()
    }

    /// Drop every label of every primitive. Returns whether anything was active.
    pub(crate) fn clear_all(&mut self) -> bool {
        let had = !self.labels.is_empty();
        self.labels.clear();
        had
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const F: FeatureId = FeatureId::new(0, 1);

    #[test]
    fn labels_keep_activation_order() {
        let mut s = FeatureStates::default();
        assert!(s.add(F, "selected"));
        assert!(s.add(F, "hovered"));
        assert!(!s.add(F, "selected"));
        assert_eq!(s.get(F), ["selected", "hovered"]);
    }

    #[test]
    fn removing_last_label_forgets_feature() {
        let mut s = FeatureStates::default();
        s.add(F, "hovered");
        assert!(s.remove(F, "hovered"));
        assert!(!s.remove(F, "hovered"));
        assert!(s.is_empty());
    }

    #[test]
    fn set_replaces_and_dedups() {
        let mut s = FeatureStates::default();
        s.add(F, "hovered");
        s.set(F, &["a", "b", "a"]);
        assert_eq!(s.get(F), ["a", "b"]);
        assert!(s.clear(F));
        assert!(!s.clear_all());
    }
}
