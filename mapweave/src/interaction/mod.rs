// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pointer interactions: declarations, per-layer state and the dispatcher.
//!
//! Layers declare what they react to with an [`Interactions`] value. The
//! [`InteractionManager`] turns raw pointer events into hover, select, click, double click
//! and drag callbacks. It walks layers by descending z-index and honours each
//! declaration's [`Propagation`].

mod binding;
mod decl;
mod hover;
mod manager;
mod order;
mod session;

pub(crate) use binding::Binding;
pub use decl::{
    Click, ClusterClick, DoubleClick, Drag, Enabled, Hover, Interactions, LayerPopup, Modify,
    Propagation, Select, Translate,
};
pub use manager::InteractionManager;
