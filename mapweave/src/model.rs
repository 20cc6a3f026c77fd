// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Application models and hit items.

use alloc::rc::Rc;
use core::fmt;

use mapweave_engine::FeatureId;

/// An application value presented by a layer.
///
/// Models are immutable by convention and shared as `Rc<M>`: every change produces a new
/// value, and handing back the same `Rc` means "unchanged".
pub trait Model: 'static {
    /// Stable identity of the model. Unique within one layer.
    type Id: Clone + Ord + fmt::Debug + fmt::Display + 'static;

    /// This model's id.
    fn id(&self) -> Self::Id;
}

/// A model together with the primitive that drew it, produced by one hit test.
pub struct HitItem<M> {
    /// The model.
    pub model: Rc<M>,
    /// The primitive bound to it.
    pub feature: FeatureId,
}

impl<M: Model> HitItem<M> {
    /// Id of the model.
    pub fn id(&self) -> M::Id {
        self.model.id()
    }
}

impl<M> Clone for HitItem<M> {
    fn clone(&self) -> Self {
        Self {
            model: Rc::clone(&self.model),
            feature: self.feature,
        }
    }
}

impl<M: fmt::Debug> fmt::Debug for HitItem<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HitItem")
            .field("model", &self.model)
            .field("feature", &self.feature)
            .finish()
    }
}
