// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Translate and modify sessions on an editable polygon layer.
//!
//! Dragging near a vertex moves that vertex; dragging inside the polygon moves all of it.
//! Each committed edit replaces the model and is reported through the change stream.
//!
//! Run:
//! - `cargo run -p mapweave_demos --example drag_edit`

use std::rc::Rc;

use kurbo::{Point, Size};
use mapweave::engine::headless::HeadlessEngine;
use mapweave::engine::{Geometry, MapHandle};
use mapweave::schedule::FlushQueue;
use mapweave::{Drag, GeometryAdapter, Interactions, LayerManager, LayerSpec, Model};
use mapweave::{MutationReason, RuntimeOptions};

#[derive(Debug)]
struct Parcel {
    id: u32,
    outline: Vec<Point>,
}

impl Model for Parcel {
    type Id = u32;
    fn id(&self) -> u32 {
        self.id
    }
}

struct ParcelAdapter;

impl GeometryAdapter<Parcel> for ParcelAdapter {
    fn to_geometry(&self, parcel: &Parcel) -> Geometry {
        Geometry::Polygon(vec![parcel.outline.clone()])
    }

    fn apply_geometry(&self, parcel: &Rc<Parcel>, geometry: &Geometry) -> Rc<Parcel> {
        match geometry {
            Geometry::Polygon(rings) if !rings.is_empty() => Rc::new(Parcel {
                id: parcel.id,
                outline: rings[0].clone(),
            }),
            _ => Rc::clone(parcel),
        }
    }
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let map = MapHandle::new(HeadlessEngine::new(Size::new(800.0, 600.0)));
    let queue = FlushQueue::new();
    let manager: LayerManager<HeadlessEngine> =
        LayerManager::new(map, &RuntimeOptions::default(), Box::new(queue.clone()));

    let parcels = manager
        .add_layer::<_, ()>(
            LayerSpec::new("parcels", ParcelAdapter).interactions(
                Interactions::new()
                    .modify(
                        Drag::<Parcel>::new()
                            .state("editing")
                            .drag_cursor("crosshair")
                            .on_end(|item| log::info!("vertex edit on parcel {}", item.id())),
                    )
                    .translate(
                        Drag::<Parcel>::new()
                            .state("moving")
                            .drag_cursor("grabbing")
                            .move_throttle_ms(16)
                            .on_end(|item| log::info!("parcel {} moved", item.id())),
                    ),
            ),
        )
        .expect("fresh layer id");

    let changes = parcels.on_models_changed(|changes| {
        for change in changes {
            let verb = match change.reason {
                MutationReason::Translate => "translated",
                MutationReason::Modify => "reshaped",
                _ => "updated",
            };
            println!(
                "parcel {} {verb}: {:?} -> {:?}",
                change.next.id, change.prev.outline[0], change.next.outline[0]
            );
        }
    });

    parcels
        .add_model(Rc::new(Parcel {
            id: 7,
            outline: vec![
                Point::new(100.0, 100.0),
                Point::new(300.0, 100.0),
                Point::new(300.0, 250.0),
                Point::new(100.0, 250.0),
            ],
        }))
        .expect("unique id");
    queue.run_all(manager.scheduler());

    // Grab the interior and drag it right.
    manager.pointer_down(Point::new(200.0, 170.0));
    println!("pan while dragging: {}", manager.map().borrow().pan_enabled());
    for (t, x) in [(0, 210.0), (8, 220.0), (20, 240.0)] {
        manager.pointer_move(Point::new(x, 170.0), t);
    }
    manager.pointer_up(Point::new(240.0, 170.0));

    // Grab the top-left corner, now at (140, 100), and pull it outwards.
    manager.pointer_down(Point::new(141.0, 101.0));
    manager.pointer_move(Point::new(120.0, 80.0), 100);
    manager.pointer_up(Point::new(120.0, 80.0));

    println!("final: {:?}", parcels.model_by_id(&7));
    println!(
        "pan restored: {}, repaints: {}",
        manager.map().borrow().pan_enabled(),
        queue.run_all(manager.scheduler())
    );
    changes.unsubscribe();
}
