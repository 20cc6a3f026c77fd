// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bidirectional id, model and primitive lookup for one layer.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use core::fmt;

use mapweave_engine::FeatureId;

use crate::model::Model;

struct Entry<M> {
    model: Rc<M>,
    feature: FeatureId,
}

/// Maps model ids to their current model and primitive, and primitives back to ids.
///
/// The reverse table is a plain side table: the engine owns the primitives, the registry
/// only remembers which id each one belongs to. An id appears at most once; removing it
/// drops both directions. The registry never talks to the engine.
pub struct Registry<M: Model> {
    entries: BTreeMap<M::Id, Entry<M>>,
    by_feature: BTreeMap<FeatureId, M::Id>,
}

impl<M: Model> fmt::Debug for Registry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("ids", &self.entries.keys().collect::<alloc::vec::Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<M: Model> Default for Registry<M> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_feature: BTreeMap::new(),
        }
    }
}

impl<M: Model> Registry<M> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `id` to `model` and `feature`, replacing any previous binding of `id`.
    pub fn set(&mut self, id: M::Id, model: Rc<M>, feature: FeatureId) {
        if let Some(old) = self.entries.insert(id.clone(), Entry { model, feature }) {
            if old.feature != feature {
                self.by_feature.remove(&old.feature);
            }
        }
        self.by_feature.insert(feature, id);
    }

    /// Replace the model bound to `id`, keeping its primitive. No-op if `id` is absent.
    pub fn update_model(&mut self, id: &M::Id, model: Rc<M>) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.model = model;
                true
            }
            None => false,
        }
    }

    /// Model bound to `id`.
    pub fn model(&self, id: &M::Id) -> Option<&Rc<M>> {
        self.entries.get(id).map(|e| &e.model)
    }

    /// Primitive bound to `id`.
    pub fn feature(&self, id: &M::Id) -> Option<FeatureId> {
        self.entries.get(id).map(|e| e.feature)
    }

    /// Id bound to `feature`.
    pub fn id_by_feature(&self, feature: FeatureId) -> Option<&M::Id> {
        self.by_feature.get(&feature)
    }

    /// Model bound to `feature`.
    pub fn model_by_feature(&self, feature: FeatureId) -> Option<&Rc<M>> {
        self.model(self.by_feature.get(&feature)?)
    }

    /// Unbind `id`, returning the primitive it was bound to.
    pub fn remove(&mut self, id: &M::Id) -> Option<FeatureId> {
        let entry = self.entries.remove(id)?;
        self.by_feature.remove(&entry.feature);
        Some(entry.feature)
    }

    /// Whether `id` is bound.
    pub fn contains(&self, id: &M::Id) -> bool {
        self.entries.contains_key(id)
    }

    /// Bound ids, in id order.
    pub fn ids(&self) -> impl Iterator<Item = &M::Id> {
        self.entries.keys()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[derive(Debug)]
    struct Pin(u32);

    impl Model for Pin {
        type Id = u32;
        fn id(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn forward_and_reverse_lookup() {
        let mut reg = Registry::new();
        let f = FeatureId::new(0, 1);
        reg.set(7, Rc::new(Pin(7)), f);
        assert_eq!(reg.feature(&7), Some(f));
        assert_eq!(reg.id_by_feature(f), Some(&7));
        assert_eq!(reg.model_by_feature(f).map(|m| m.0), Some(7));
    }

    #[test]
    fn remove_drops_both_directions() {
        let mut reg = Registry::new();
        let f = FeatureId::new(0, 1);
        reg.set(7, Rc::new(Pin(7)), f);
        assert_eq!(reg.remove(&7), Some(f));
        assert_eq!(reg.remove(&7), None);
        assert!(reg.id_by_feature(f).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn update_model_keeps_feature() {
        let mut reg = Registry::new();
        let f = FeatureId::new(2, 1);
        reg.set(1, Rc::new(Pin(1)), f);
        let next = Rc::new(Pin(1));
        assert!(reg.update_model(&1, next.clone()));
        assert!(Rc::ptr_eq(reg.model(&1).unwrap(), &next));
        assert_eq!(reg.feature(&1), Some(f));
        assert!(!reg.update_model(&9, Rc::new(Pin(9))));
        assert!(!reg.contains(&9));
    }

    #[test]
    fn rebinding_clears_stale_reverse_entry() {
        let mut reg = Registry::new();
        let old = FeatureId::new(0, 1);
        let new = FeatureId::new(0, 2);
        reg.set(1, Rc::new(Pin(1)), old);
        reg.set(1, Rc::new(Pin(1)), new);
        assert!(reg.id_by_feature(old).is_none());
        assert_eq!(reg.id_by_feature(new), Some(&1));
        assert_eq!(reg.ids().copied().collect::<Vec<_>>(), [1]);
    }
}
