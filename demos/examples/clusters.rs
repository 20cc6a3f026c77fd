// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A clustered layer: cluster styles, cluster popups and click-to-expand.
//!
//! Run:
//! - `cargo run -p mapweave_demos --example clusters`

use std::rc::Rc;

use kurbo::{Point, Size};
use mapweave::engine::headless::HeadlessEngine;
use mapweave::engine::{ClusterSettings, FitOptions, Geometry, MapHandle, View};
use mapweave::popup::{PopupMode, PopupOptions};
use mapweave::schedule::FlushQueue;
use mapweave::{ClusterClick, Interactions, LayerManager, LayerPopup, LayerSpec, Model};
use mapweave::{HitItem, RuntimeOptions, Style};

struct Tree {
    id: u32,
    at: Point,
}

impl Model for Tree {
    type Id = u32;
    fn id(&self) -> u32 {
        self.id
    }
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let options = RuntimeOptions {
        popup: Some(PopupOptions {
            mode: PopupMode::Click,
            ..PopupOptions::default()
        }),
        ..RuntimeOptions::default()
    };
    let map = MapHandle::new(HeadlessEngine::new(Size::new(800.0, 600.0)));
    let queue = FlushQueue::new();
    let manager: LayerManager<HeadlessEngine, String> =
        LayerManager::new(map, &options, Box::new(queue.clone()));

    let trees = manager
        .add_layer::<Tree, String>(
            LayerSpec::new("trees", |t: &Tree| Geometry::Point(t.at))
                .style(Style::new(
                    |_: &Tree, view: &View| view.zoom,
                    |zoom: &f64, _: &View| vec![format!("dot@z{zoom:.1}")],
                ))
                .cluster_style(|members, _| vec![format!("bubble({})", members.len())])
                .clustering(ClusterSettings {
                    distance: 30.0,
                    min_distance: 0.0,
                })
                .interactions(
                    Interactions::new().cluster(
                        ClusterClick::new()
                            .fit(FitOptions {
                                padding: [20.0; 4],
                                ..FitOptions::default()
                            })
                            .on_expand(|members| println!("expanded {} trees", members.len())),
                    ),
                )
                .popup(
                    LayerPopup::new(|item: &HitItem<Tree>| {
                        Some(format!("tree #{}", item.model.id))
                    })
                    .cluster(|members| Some(format!("{} trees", members.len()))),
                ),
        )
        .expect("fresh layer id");

    trees
        .set_models((0..5).map(|i| {
            Rc::new(Tree {
                id: i,
                at: Point::new(200.0 + f64::from(i) * 5.0, 200.0),
            })
        }))
        .expect("unique ids");
    trees
        .add_model(Rc::new(Tree {
            id: 99,
            at: Point::new(600.0, 450.0),
        }))
        .expect("unique id");
    queue.run_all(manager.scheduler());

    println!("clustered: {}", trees.is_clustered());
    println!("style of 99: {:?}", trees.style_of(&99));

    manager.click(Point::new(201.0, 200.0));
    println!("view after expand: {:?}", manager.map().borrow().fits());
    if let Some(popup) = manager.popup() {
        let popup = popup.borrow();
        let shown: Vec<&str> = popup.items().iter().map(|i| i.content.as_str()).collect();
        println!("popups: {shown:?}");
    }

    trees.set_clustering_enabled(false);
    println!("clustered: {}", trees.is_clustered());
    manager.dispose();
}
