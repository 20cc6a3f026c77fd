// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mapweave Engine: the boundary between the mapweave runtime and a map-rendering engine.
//!
//! ## Overview
//!
//! The runtime never draws anything itself. It drives an [`Engine`] that owns layers and
//! visual primitives, answers hit tests, and controls the view. This crate defines that
//! contract together with the vocabulary shared across it:
//!
//! - [`Geometry`]: planar feature geometry in map coordinates, with vertex editing and
//!   distance queries.
//! - [`FeatureId`] and [`EngineLayerId`]: handles to engine-owned primitives and layers.
//! - [`Pick`]: a hit-test result, either one primitive or a rendered cluster.
//! - [`View`], [`FitOptions`], [`ClusterSettings`] and [`Listeners`].
//! - [`MapHandle`]: the shared, single-threaded handle the runtime keeps to the engine.
//!
//! With the `std` feature (default), [`headless::HeadlessEngine`] provides an in-memory
//! engine for tests and tools.
//!
//! ## Example
//!
//! ```
//! use mapweave_engine::headless::HeadlessEngine;
//! use mapweave_engine::kurbo::{Point, Size};
//! use mapweave_engine::{Engine, Geometry, Pick};
//!
//! let mut engine = HeadlessEngine::new(Size::new(256.0, 256.0));
//! let layer = engine.create_layer(0);
//! let pin = engine.create_feature(layer, Geometry::Point(Point::new(32.0, 32.0)));
//!
//! assert_eq!(engine.hit_test(layer, Point::new(33.0, 32.0), 4.0), vec![Pick::Feature(pin)]);
//! ```
//!
//! ## Features
//!
//! - `std` (default): use Kurbo's `std` float math and enable the headless engine.
//! - `libm`: use Kurbo's `libm` backend for `no_std` builds.
//! - `serde`: serialize [`FitOptions`] and [`ClusterSettings`].
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod engine;
mod geometry;
mod types;

#[cfg(feature = "std")]
pub mod headless;

pub use kurbo;

pub use engine::{Engine, MapHandle};
pub use geometry::{Geometry, VertexRef, union_extent};
pub use types::{ClusterSettings, EngineLayerId, FeatureId, FitOptions, Listeners, Pick, View};
