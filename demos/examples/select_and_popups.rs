// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hover, select and click popups on a layer of points.
//!
//! Options are read from the TOML file given as the first argument, falling back to
//! built-in settings. Set `RUST_LOG=debug` to watch flushes and popup updates.
//!
//! Run:
//! - `cargo run -p mapweave_demos --example select_and_popups`
//! - `cargo run -p mapweave_demos --example select_and_popups -- options.toml`

use std::path::Path;
use std::rc::Rc;

use kurbo::{Point, Size};
use mapweave::engine::headless::HeadlessEngine;
use mapweave::engine::{Geometry, MapHandle, View};
use mapweave::popup::{PopupItem, PopupRenderer};
use mapweave::schedule::FlushQueue;
use mapweave::{Hover, Interactions, LayerManager, LayerPopup, LayerSpec, Model, RuntimeOptions};
use mapweave::{HitItem, Select, Style};

const DEFAULT_OPTIONS: &str = r#"
hit_tolerance = 6.0
flush_policy = "frame"

[popup]
mode = "click"
max_items = 3
"#;

struct Station {
    id: u32,
    name: &'static str,
    at: Point,
}

impl Model for Station {
    type Id = u32;
    fn id(&self) -> u32 {
        self.id
    }
}

#[derive(Clone)]
struct Marker {
    radius: f64,
    fill: &'static str,
}

struct PrintRenderer;

impl PopupRenderer<String> for PrintRenderer {
    fn render(&mut self, items: &[PopupItem<String>]) {
        let shown: Vec<&str> = items.iter().map(|i| i.content.as_str()).collect();
        println!("popups: {shown:?}");
    }
}

fn load_options(path: Option<&Path>) -> RuntimeOptions {
    let Some(path) = path else {
        return toml::from_str(DEFAULT_OPTIONS).unwrap_or_default();
    };
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(options) => {
                log::info!("options loaded from {}", path.display());
                options
            }
            Err(e) => {
                log::warn!("invalid options file, using defaults: {e}");
                RuntimeOptions::default()
            }
        },
        Err(e) => {
            log::warn!("cannot read {}: {e}", path.display());
            RuntimeOptions::default()
        }
    }
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let arg = std::env::args().nth(1);
    let options = load_options(arg.as_deref().map(Path::new));
    log::info!("{options:?}");

    let map = MapHandle::new(HeadlessEngine::new(Size::new(640.0, 480.0)));
    let queue = FlushQueue::new();
    let manager: LayerManager<HeadlessEngine, String> = LayerManager::with_popup_renderer(
        map,
        &options,
        Box::new(queue.clone()),
        Box::new(PrintRenderer),
    );

    let style = Style::new(
        |_: &Station, _: &View| Marker {
            radius: 4.0,
            fill: "gray",
        },
        |m: &Marker, _: &View| vec![format!("circle r={} fill={}", m.radius, m.fill)],
    )
    .state("hovered", |m, _, _| m.radius = 6.0)
    .state("selected", |m, _, _| m.fill = "orange")
    .cache_key(|m, _| format!("{}:{}", m.radius, m.fill));

    let stations = manager
        .add_layer::<Station, String>(
            LayerSpec::new("stations", |s: &Station| Geometry::Point(s.at))
                .style(style)
                .interactions(
                    Interactions::new()
                        .hover(
                            Hover::<Station>::new()
                                .state("hovered")
                                .cursor("pointer")
                                .on_enter(|items| println!("enter {}", items[0].model.name)),
                        )
                        .select(Select::new().state("selected").on_clear(|| {
                            println!("selection cleared");
                        })),
                )
                .popup(LayerPopup::new(|item: &HitItem<Station>| {
                    Some(format!("{} (#{})", item.model.name, item.model.id))
                })),
        )
        .expect("fresh layer id");

    stations
        .set_models([
            Rc::new(Station {
                id: 1,
                name: "Harbor",
                at: Point::new(100.0, 120.0),
            }),
            Rc::new(Station {
                id: 2,
                name: "Market",
                at: Point::new(300.0, 200.0),
            }),
            Rc::new(Station {
                id: 3,
                name: "Depot",
                at: Point::new(304.0, 203.0),
            }),
        ])
        .expect("unique ids");
    println!("flushed {} task(s)", queue.run_all(manager.scheduler()));

    manager.pointer_move(Point::new(101.0, 119.0), 0);
    println!("cursor: {:?}", manager.cursor());

    manager.click(Point::new(302.0, 201.0));
    for id in [1, 2, 3] {
        println!(
            "station {id}: states {:?}, style {:?}",
            stations.feature_states(&id),
            stations.style_of(&id)
        );
    }

    manager.click(Point::new(600.0, 400.0));
    println!("flushed {} task(s)", queue.run_all(manager.scheduler()));
    manager.dispose();
}
