// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The rendering-engine contract and the shared map handle.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell, RefMut};

use kurbo::{Point, Rect};

use crate::geometry::Geometry;
use crate::types::{ClusterSettings, EngineLayerId, FeatureId, FitOptions, Listeners, Pick, View};

/// Operations the runtime consumes from a 2D map-rendering engine.
///
/// The engine owns every visual primitive; the runtime only holds [`FeatureId`] handles.
/// Pixel coordinates are viewport pixels, map coordinates are in the view's projection.
pub trait Engine {
    /// Create an engine layer rendered at `z_index`.
    fn create_layer(&mut self, z_index: i32) -> EngineLayerId;

    /// Remove an engine layer and every primitive on it.
    fn remove_layer(&mut self, layer: EngineLayerId);

    /// Create a primitive on `layer`.
    fn create_feature(&mut self, layer: EngineLayerId, geometry: Geometry) -> FeatureId;

    /// Remove a primitive. Stale ids are ignored.
    fn remove_feature(&mut self, feature: FeatureId);

    /// Live geometry of a primitive.
    fn geometry(&self, feature: FeatureId) -> Option<&Geometry>;

    /// Replace a primitive's geometry in place. Stale ids are ignored.
    fn set_geometry(&mut self, feature: FeatureId, geometry: Geometry);

    /// Primitives (or clusters) on `layer` within `tolerance` pixels of `pixel`, topmost
    /// first.
    fn hit_test(&self, layer: EngineLayerId, pixel: Point, tolerance: f64) -> Vec<Pick>;

    /// Map coordinate under a viewport pixel.
    fn pixel_to_coordinate(&self, pixel: Point) -> Point;

    /// Current view.
    fn view(&self) -> View;

    /// Fit the view to `extent`.
    fn fit(&mut self, extent: Rect, options: &FitOptions);

    /// Zoom by `delta` levels, keeping `anchor` (a map coordinate) fixed when given.
    fn zoom_by(&mut self, delta: f64, anchor: Option<Point>);

    /// Enable or disable the engine's own drag-to-pan gesture.
    fn set_pan_enabled(&mut self, enabled: bool);

    /// Set the CSS-style cursor of the map's root element; `None` restores the default.
    fn set_cursor(&mut self, cursor: Option<&str>);

    /// Show or hide a layer.
    fn set_layer_visible(&mut self, layer: EngineLayerId, visible: bool);

    /// Set a layer's opacity in `0.0..=1.0`.
    fn set_layer_opacity(&mut self, layer: EngineLayerId, opacity: f64);

    /// Set a layer's stacking order.
    fn set_layer_z_index(&mut self, layer: EngineLayerId, z_index: i32);

    /// Render `layer` from its cluster source (`Some`) or its plain source (`None`).
    fn set_layer_clustering(&mut self, layer: EngineLayerId, clustering: Option<&ClusterSettings>);

    /// Ask for `layer` to be repainted; styles are resolved again during that paint.
    fn request_render(&mut self, layer: EngineLayerId);

    /// Pointer listeners the runtime needs delivered from now on.
    fn set_listeners(&mut self, listeners: Listeners);
}

/// Shared, single-threaded handle to the map engine.
///
/// Layers and the interaction manager each keep a clone, usually type-erased through
/// [`MapHandle::erase`]. Borrows are short and never held across calls into application
/// code.
pub struct MapHandle<E: ?Sized> {
    inner: Rc<RefCell<E>>,
}

impl<E: ?Sized> core::fmt::Debug for MapHandle<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MapHandle")
            .field("handles", &Rc::strong_count(&self.inner))
            .finish_non_exhaustive()
    }
}

impl<E: ?Sized> Clone for MapHandle<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> MapHandle<E> {
    /// Wrap an engine.
    pub fn new(engine: E) -> Self {
        Self {
            inner: Rc::new(RefCell::new(engine)),
        }
    }
}

impl<E: Engine + 'static> MapHandle<E> {
    /// A handle to the same engine, usable without knowing its concrete type.
    pub fn erase(&self) -> MapHandle<dyn Engine> {
        let inner: Rc<RefCell<dyn Engine>> = self.inner.clone();
        MapHandle { inner }
    }
}

impl<E: ?Sized> MapHandle<E> {
    /// Borrow the engine.
    pub fn borrow(&self) -> Ref<'_, E> {
        self.inner.borrow()
    }

    /// Borrow the engine mutably.
    pub fn borrow_mut(&self) -> RefMut<'_, E> {
        self.inner.borrow_mut()
    }

    /// Whether two handles refer to the same engine.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
