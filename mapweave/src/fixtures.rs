// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Models, adapters and a headless harness shared by the unit tests.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell};

use kurbo::{Point, Size};
use mapweave_engine::headless::HeadlessEngine;
use mapweave_engine::{Geometry, MapHandle};
use mapweave_schedule::FlushQueue;

use crate::{GeometryAdapter, HitItem, Layer, LayerManager, LayerSpec, Model, RuntimeOptions};

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Poi {
    pub(crate) id: u32,
    pub(crate) at: Point,
}

impl Model for Poi {
    type Id = u32;
    fn id(&self) -> u32 {
        self.id
    }
}

pub(crate) fn poi(id: u32, x: f64, y: f64) -> Rc<Poi> {
    Rc::new(Poi {
        id,
        at: Point::new(x, y),
    })
}

/// Points whose edits follow the primitive's anchor.
pub(crate) struct PoiAdapter;

impl GeometryAdapter<Poi> for PoiAdapter {
    fn to_geometry(&self, model: &Poi) -> Geometry {
        Geometry::Point(model.at)
    }

    fn apply_geometry(&self, model: &Rc<Poi>, geometry: &Geometry) -> Rc<Poi> {
        match geometry.anchor() {
            Some(at) => Rc::new(Poi { id: model.id, at }),
            None => Rc::clone(model),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Area {
    pub(crate) id: u32,
    pub(crate) ring: Vec<Point>,
}

impl Model for Area {
    type Id = u32;
    fn id(&self) -> u32 {
        self.id
    }
}

/// An axis-aligned square with its lower corner at `(x, y)`.
pub(crate) fn square(id: u32, x: f64, y: f64, side: f64) -> Rc<Area> {
    Rc::new(Area {
        id,
        ring: vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ],
    })
}

pub(crate) struct AreaAdapter;

impl GeometryAdapter<Area> for AreaAdapter {
    fn to_geometry(&self, model: &Area) -> Geometry {
        Geometry::Polygon(vec![model.ring.clone()])
    }

    fn apply_geometry(&self, model: &Rc<Area>, geometry: &Geometry) -> Rc<Area> {
        match geometry {
            Geometry::Polygon(rings) if !rings.is_empty() => Rc::new(Area {
                id: model.id,
                ring: rings[0].clone(),
            }),
            _ => Rc::clone(model),
        }
    }
}

/// Records handler calls in order.
pub(crate) type Log = Rc<RefCell<Vec<String>>>;

pub(crate) fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub(crate) fn record(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

/// Ids of `items` joined with commas.
pub(crate) fn ids<M: Model>(items: &[HitItem<M>]) -> String {
    items
        .iter()
        .map(|i| i.id().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn poi_layer(id: &str) -> LayerSpec<Poi, (), String> {
    LayerSpec::new(id, PoiAdapter)
}

/// A manager over an 800x600 headless engine where pixels equal map coordinates.
pub(crate) struct Harness {
    pub(crate) manager: LayerManager<HeadlessEngine, String>,
    pub(crate) queue: FlushQueue,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_options(&RuntimeOptions::default())
    }

    pub(crate) fn with_options(options: &RuntimeOptions) -> Self {
        let map = MapHandle::new(HeadlessEngine::new(Size::new(800.0, 600.0)));
        let queue = FlushQueue::new();
        let manager = LayerManager::new(map, options, Box::new(queue.clone()));
        Self { manager, queue }
    }

    pub(crate) fn engine(&self) -> Ref<'_, HeadlessEngine> {
        self.manager.map().borrow()
    }

    /// Run every pending flush; returns how many ran.
    pub(crate) fn flush(&self) -> usize {
        self.queue.run_all(self.manager.scheduler())
    }

    pub(crate) fn pois(&self, spec: LayerSpec<Poi, (), String>) -> Layer<Poi> {
        self.manager.add_layer(spec).unwrap()
    }
}
