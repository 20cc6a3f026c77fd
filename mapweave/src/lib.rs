// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mapweave: a declarative interaction and styling runtime for 2D map engines.
//!
//! ## Overview
//!
//! Applications describe each map layer declaratively:
//!
//! - a [`GeometryAdapter`] from domain models to engine geometry, and back for edits;
//! - a [`Style`] computing drawable styles from a model, its active feature states and the
//!   view;
//! - [`Interactions`]: hover, select, click, double click, translate, modify and cluster
//!   expansion, each with its own handlers, state label, cursor and propagation.
//!
//! A [`LayerManager`] turns those declarations into live [`Layer`]s on one
//! [`Engine`](engine::Engine). Layers keep exactly one engine primitive per model, keyed by
//! model id, and publish change events. Pointer events forwarded to the manager are
//! hit-tested layer by layer, top-down, and drive the interaction state machines. Repaints
//! are coalesced through the [flush scheduler](schedule::FlushScheduler), and popup entries
//! from all layers are merged by the [popup host](popup::PopupHost).
//!
//! ## Example
//!
//! ```
//! use std::{cell::RefCell, rc::Rc};
//!
//! use mapweave::engine::headless::HeadlessEngine;
//! use mapweave::engine::kurbo::{Point, Size};
//! use mapweave::engine::{Geometry, MapHandle};
//! use mapweave::schedule::FlushQueue;
//! use mapweave::{HitItem, Interactions, LayerManager, LayerSpec, Model, RuntimeOptions, Select};
//!
//! struct Poi { id: u32, at: Point }
//! impl Model for Poi {
//!     type Id = u32;
//!     fn id(&self) -> u32 { self.id }
//! }
//!
//! let map = MapHandle::new(HeadlessEngine::new(Size::new(400.0, 300.0)));
//! let queue = FlushQueue::new();
//! let manager: LayerManager<HeadlessEngine> =
//!     LayerManager::new(map, &RuntimeOptions::default(), Box::new(queue.clone()));
//!
//! let picked = Rc::new(RefCell::new(Vec::new()));
//! let sink = picked.clone();
//! let pois = manager
//!     .add_layer::<Poi, ()>(
//!         LayerSpec::new("pois", |p: &Poi| Geometry::Point(p.at)).interactions(
//!             Interactions::new().select(
//!                 Select::new()
//!                     .state("selected")
//!                     .on_select(move |items: &[HitItem<Poi>]| {
//!                         sink.borrow_mut().extend(items.iter().map(|i| i.model.id));
//!                         true
//!                     }),
//!             ),
//!         ),
//!     )
//!     .unwrap();
//! pois.set_models([
//!     Rc::new(Poi { id: 1, at: Point::new(10.0, 10.0) }),
//!     Rc::new(Poi { id: 2, at: Point::new(200.0, 100.0) }),
//! ])
//! .unwrap();
//!
//! manager.click(Point::new(201.0, 99.0));
//! assert_eq!(*picked.borrow(), [2]);
//! assert_eq!(pois.feature_states(&2), ["selected"]);
//!
//! // Loading and selecting cost one repaint.
//! assert_eq!(queue.run_all(manager.scheduler()), 1);
//! assert_eq!(manager.map().borrow().render_requests(pois.engine_layer()), 1);
//! ```
//!
//! ## Features
//!
//! - `std` (default): use Kurbo's `std` float math and enable the headless engine.
//! - `libm`: use Kurbo's `libm` backend for `no_std` builds.
//! - `serde`: serialize and deserialize [`RuntimeOptions`] and the option types it holds.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod error;
mod events;
mod interaction;
mod layer;
mod manager;
mod model;
mod options;
mod registry;
mod state;
mod style;

pub use mapweave_engine as engine;
pub use mapweave_popup as popup;
pub use mapweave_schedule as schedule;

pub use error::Error;
pub use events::{
    CollectionReason, ModelChange, ModelsCollectionEvent, MutationReason, Subscription,
};
pub use interaction::{
    Click, ClusterClick, DoubleClick, Drag, Enabled, Hover, InteractionManager, Interactions,
    LayerPopup, Modify, Propagation, Select, Translate,
};
pub use layer::{GeometryAdapter, Layer, MutateOptions};
pub use manager::{LayerManager, LayerSpec};
pub use model::{HitItem, Model};
pub use options::RuntimeOptions;
pub use registry::Registry;
pub use style::Style;

#[cfg(test)]
mod fixtures;
