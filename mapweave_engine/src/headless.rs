// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An in-memory [`Engine`] with no rendering.
//!
//! The headless engine keeps primitives, layers and a simple orthographic view, answers
//! hit tests with real geometry, clusters point-like features greedily in pixel space, and
//! records every side effect the runtime asks for (cursor, pan, fits, render requests) so
//! tests and tools can inspect them.
//!
//! Pixels map to coordinates as `coordinate = origin + pixel * resolution`, with `y`
//! growing downwards in both spaces.

use alloc::string::String;
use alloc::vec::Vec;

use kurbo::{Point, Rect, Size};

use crate::engine::Engine;
use crate::geometry::Geometry;
use crate::types::{ClusterSettings, EngineLayerId, FeatureId, FitOptions, Listeners, Pick, View};

#[derive(Clone, Debug)]
struct LayerSlot {
    z_index: i32,
    visible: bool,
    opacity: f64,
    clustering: Option<ClusterSettings>,
    features: Vec<FeatureId>,
    render_requests: usize,
}

#[derive(Clone, Debug)]
struct FeatureSlot {
    generation: u32,
    data: Option<(EngineLayerId, Geometry)>,
}

/// A headless map engine.
#[derive(Clone, Debug)]
pub struct HeadlessEngine {
    layers: Vec<Option<LayerSlot>>,
    features: Vec<FeatureSlot>,
    free_list: Vec<usize>,
    origin: Point,
    resolution: f64,
    base_resolution: f64,
    viewport: Size,
    pan_enabled: bool,
    cursor: Option<String>,
    listeners: Listeners,
    fits: Vec<(Rect, FitOptions)>,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new(Size::new(800.0, 600.0))
    }
}

impl HeadlessEngine {
    /// Create an engine with a `viewport`-sized view at the origin, one unit per pixel.
    pub fn new(viewport: Size) -> Self {
        Self {
            layers: Vec::new(),
            features: Vec::new(),
            free_list: Vec::new(),
            origin: Point::ORIGIN,
            resolution: 1.0,
            base_resolution: 1.0,
            viewport,
            pan_enabled: true,
            cursor: None,
            listeners: Listeners::empty(),
            fits: Vec::new(),
        }
    }

    /// Place the top-left pixel at `origin` with `resolution` map units per pixel.
    pub fn set_view(&mut self, origin: Point, resolution: f64) {
        self.origin = origin;
        self.resolution = resolution;
    }

    /// Viewport pixel of a map coordinate.
    pub fn coordinate_to_pixel(&self, coordinate: Point) -> Point {
        Point::ORIGIN + (coordinate - self.origin) / self.resolution
    }

    /// Current cursor.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Whether drag-to-pan is enabled.
    pub fn pan_enabled(&self) -> bool {
        self.pan_enabled
    }

    /// Listener set last requested by the runtime.
    pub fn listeners(&self) -> Listeners {
        self.listeners
    }

    /// Every fit requested so far.
    pub fn fits(&self) -> &[(Rect, FitOptions)] {
        &self.fits
    }

    /// Render requests received for `layer`.
    pub fn render_requests(&self, layer: EngineLayerId) -> usize {
        self.layer(layer).map_or(0, |l| l.render_requests)
    }

    /// Live primitives on `layer`, in creation order.
    pub fn layer_features(&self, layer: EngineLayerId) -> &[FeatureId] {
        self.layer(layer).map_or(&[], |l| l.features.as_slice())
    }

    /// Whether `layer` exists and is visible.
    pub fn layer_visible(&self, layer: EngineLayerId) -> bool {
        self.layer(layer).is_some_and(|l| l.visible)
    }

    /// Opacity of `layer`.
    pub fn layer_opacity(&self, layer: EngineLayerId) -> Option<f64> {
        self.layer(layer).map(|l| l.opacity)
    }

    /// Z-index of `layer`.
    pub fn layer_z_index(&self, layer: EngineLayerId) -> Option<i32> {
        self.layer(layer).map(|l| l.z_index)
    }

    /// Clustering settings `layer` currently renders with.
    pub fn layer_clustering(&self, layer: EngineLayerId) -> Option<ClusterSettings> {
        self.layer(layer).and_then(|l| l.clustering)
    }

    /// Whether `layer` exists.
    pub fn has_layer(&self, layer: EngineLayerId) -> bool {
        self.layer(layer).is_some()
    }

    /// Whether `feature` refers to a live primitive.
    pub fn is_alive(&self, feature: FeatureId) -> bool {
        self.slot(feature).is_some()
    }

    fn layer(&self, layer: EngineLayerId) -> Option<&LayerSlot> {
        self.layers.get(layer.0 as usize)?.as_ref()
    }

    fn layer_mut(&mut self, layer: EngineLayerId) -> Option<&mut LayerSlot> {
        self.layers.get_mut(layer.0 as usize)?.as_mut()
    }

    fn slot(&self, feature: FeatureId) -> Option<&(EngineLayerId, Geometry)> {
        let slot = self.features.get(feature.idx())?;
        if slot.generation != feature.generation() {
            return None;
        }
        slot.data.as_ref()
    }

    fn zoom(&self) -> f64 {
        (self.base_resolution / self.resolution).log2()
    }

    fn clusters(
        &self,
        layer: &LayerSlot,
        settings: &ClusterSettings,
    ) -> Vec<(Point, Vec<FeatureId>)> {
        let reach = settings.distance.max(settings.min_distance);
        let mut clusters: Vec<(Point, Vec<FeatureId>)> = Vec::new();
        for &id in &layer.features {
            let Some(anchor) = self.slot(id).and_then(|(_, g)| g.anchor()) else {
                continue;
            };
            let px = self.coordinate_to_pixel(anchor);
            match clusters
                .iter_mut()
                .find(|(center, _)| center.distance(px) <= reach)
            {
                Some((_, members)) => members.push(id),
                None => clusters.push((px, alloc::vec![id])),
            }
        }
        clusters
    }
}

impl Engine for HeadlessEngine {
    fn create_layer(&mut self, z_index: i32) -> EngineLayerId {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Layer ids are 32-bit; a map never holds that many layers."
        )]
        let id = EngineLayerId(self.layers.len() as u32);
        self.layers.push(Some(LayerSlot {
            z_index,
            visible: true,
            opacity: 1.0,
            clustering: None,
            features: Vec::new(),
            render_requests: 0,
        }));
        id
    }

    fn remove_layer(&mut self, layer: EngineLayerId) {
        let Some(slot) = self.layers.get_mut(layer.0 as usize).and_then(Option::take) else {
            return;
        };
        for feature in slot.features {
            self.remove_feature(feature);
        }
    }

    fn create_feature(&mut self, layer: EngineLayerId, geometry: Geometry) -> FeatureId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.features[idx];
            slot.generation += 1;
            slot.data = Some((layer, geometry));
            idx
        } else {
            self.features.push(FeatureSlot {
                generation: 1,
                data: Some((layer, geometry)),
            });
            self.features.len() - 1
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "FeatureId uses 32-bit indices."
        )]
        let id = FeatureId::new(idx as u32, self.features[idx].generation);
        if let Some(l) = self.layer_mut(layer) {
            l.features.push(id);
        }
        id
    }

    fn remove_feature(&mut self, feature: FeatureId) {
        let Some((layer, _)) = self.slot(feature).cloned() else {
            return;
        };
        self.features[feature.idx()].data = None;
        self.free_list.push(feature.idx());
        if let Some(l) = self.layer_mut(layer) {
            l.features.retain(|f| *f != feature);
        }
    }

    fn geometry(&self, feature: FeatureId) -> Option<&Geometry> {
        self.slot(feature).map(|(_, g)| g)
    }

    fn set_geometry(&mut self, feature: FeatureId, geometry: Geometry) {
        if self.slot(feature).is_none() {
            return;
        }
        if let Some((_, g)) = self.features[feature.idx()].data.as_mut() {
            *g = geometry;
        }
    }

    fn hit_test(&self, layer: EngineLayerId, pixel: Point, tolerance: f64) -> Vec<Pick> {
        let Some(slot) = self.layer(layer).filter(|l| l.visible) else {
            return Vec::new();
        };
        if let Some(settings) = &slot.clustering {
            let limit = tolerance.max(0.5);
            return self
                .clusters(slot, settings)
                .into_iter()
                .rev()
                .filter(|(center, _)| center.distance(pixel) <= limit)
                .map(|(_, members)| Pick::Cluster(members))
                .collect();
        }
        let coordinate = self.pixel_to_coordinate(pixel);
        let reach = tolerance.max(0.5) * self.resolution;
        let reach_sq = reach * reach;
        slot.features
            .iter()
            .rev()
            .filter(|f| {
                self.geometry(**f)
                    .is_some_and(|g| g.distance_sq(coordinate) <= reach_sq)
            })
            .map(|f| Pick::Feature(*f))
            .collect()
    }

    fn pixel_to_coordinate(&self, pixel: Point) -> Point {
        self.origin + pixel.to_vec2() * self.resolution
    }

    fn view(&self) -> View {
        View {
            center: self.pixel_to_coordinate(Point::ORIGIN + self.viewport.to_vec2() / 2.0),
            resolution: self.resolution,
            zoom: self.zoom(),
        }
    }

    fn fit(&mut self, extent: Rect, options: &FitOptions) {
        self.fits.push((extent, options.clone()));
        let [top, right, bottom, left] = options.padding;
        let avail = Size::new(
            (self.viewport.width - left - right).max(1.0),
            (self.viewport.height - top - bottom).max(1.0),
        );
        let mut resolution = (extent.width() / avail.width).max(extent.height() / avail.height);
        if let Some(max_zoom) = options.max_zoom {
            resolution = resolution.max(self.base_resolution / max_zoom.exp2());
        }
        if resolution <= 0.0 || !resolution.is_finite() {
            resolution = self.resolution;
        }
        self.resolution = resolution;
        let padded_center = Point::new(left + avail.width / 2.0, top + avail.height / 2.0);
        self.origin = extent.center() - padded_center.to_vec2() * resolution;
    }

    fn zoom_by(&mut self, delta: f64, anchor: Option<Point>) {
        let anchor = anchor.unwrap_or_else(|| self.view().center);
        let pixel = self.coordinate_to_pixel(anchor);
        self.resolution /= delta.exp2();
        self.origin = anchor - pixel.to_vec2() * self.resolution;
    }

    fn set_pan_enabled(&mut self, enabled: bool) {
        self.pan_enabled = enabled;
    }

    fn set_cursor(&mut self, cursor: Option<&str>) {
        self.cursor = cursor.map(String::from);
    }

    fn set_layer_visible(&mut self, layer: EngineLayerId, visible: bool) {
        if let Some(l) = self.layer_mut(layer) {
            l.visible = visible;
        }
    }

    fn set_layer_opacity(&mut self, layer: EngineLayerId, opacity: f64) {
        if let Some(l) = self.layer_mut(layer) {
            l.opacity = opacity;
        }
    }

    fn set_layer_z_index(&mut self, layer: EngineLayerId, z_index: i32) {
        if let Some(l) = self.layer_mut(layer) {
            l.z_index = z_index;
        }
    }

    fn set_layer_clustering(&mut self, layer: EngineLayerId, clustering: Option<&ClusterSettings>) {
        if let Some(l) = self.layer_mut(layer) {
            l.clustering = clustering.copied();
        }
    }

    fn request_render(&mut self, layer: EngineLayerId) {
        if let Some(l) = self.layer_mut(layer) {
            l.render_requests += 1;
        }
    }

    fn set_listeners(&mut self, listeners: Listeners) {
        self.listeners = listeners;
    }
}
