// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::rc::Rc;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Size};
use mapweave::engine::headless::HeadlessEngine;
use mapweave::engine::{Geometry, MapHandle};
use mapweave::schedule::FlushQueue;
use mapweave::{Hover, Interactions, Layer, LayerManager, LayerSpec, Model, RuntimeOptions};

#[derive(Clone)]
struct Stop {
    id: u32,
    at: Point,
}

impl Model for Stop {
    type Id = u32;
    fn id(&self) -> u32 {
        self.id
    }
}

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn gen_stops(count: u32, seed: u64) -> Vec<Rc<Stop>> {
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|id| {
            Rc::new(Stop {
                id,
                at: Point::new(rng.next_f64() * 1000.0, rng.next_f64() * 1000.0),
            })
        })
        .collect()
}

fn setup(hover: bool) -> (LayerManager<HeadlessEngine>, FlushQueue, Layer<Stop>) {
    let map = MapHandle::new(HeadlessEngine::new(Size::new(1000.0, 1000.0)));
    let queue = FlushQueue::new();
    let manager = LayerManager::new(map, &RuntimeOptions::default(), Box::new(queue.clone()));
    let mut spec = LayerSpec::new("stops", |s: &Stop| Geometry::Point(s.at));
    if hover {
        spec = spec.interactions(Interactions::new().hover(Hover::new().state("hovered")));
    }
    let layer = manager.add_layer::<Stop, ()>(spec).unwrap();
    (manager, queue, layer)
}

fn bench_set_models(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_models");
    for &count in &[1_000_u32, 10_000] {
        let first = gen_stops(count, 0xCAFE_F00D_DEAD_BEEF);
        // Same ids, half of them moved.
        let second: Vec<_> = first
            .iter()
            .map(|s| {
                if s.id % 2 == 0 {
                    Rc::new(Stop {
                        id: s.id,
                        at: s.at + kurbo::Vec2::new(1.0, 1.0),
                    })
                } else {
                    Rc::clone(s)
                }
            })
            .collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("load_{count}"), |b| {
            b.iter_batched(
                || setup(false),
                |(manager, queue, layer)| {
                    layer.set_models(first.iter().cloned()).unwrap();
                    black_box(queue.run_all(manager.scheduler()));
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("resync_{count}"), |b| {
            b.iter_batched(
                || {
                    let (manager, queue, layer) = setup(false);
                    layer.set_models(first.iter().cloned()).unwrap();
                    queue.run_all(manager.scheduler());
                    (manager, queue, layer)
                },
                |(manager, queue, layer)| {
                    layer.set_models(second.iter().cloned()).unwrap();
                    black_box(queue.run_all(manager.scheduler()));
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_hover_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("hover_sweep");
    let (manager, queue, layer) = setup(true);
    layer
        .set_models(gen_stops(5_000, 0x1234_5678_9ABC_DEF0))
        .unwrap();
    queue.run_all(manager.scheduler());
    let path: Vec<Point> = (0..100)
        .map(|i| Point::new(i as f64 * 10.0, i as f64 * 10.0))
        .collect();
    group.throughput(Throughput::Elements(path.len() as u64));
    group.bench_function("diagonal_5000", |b| {
        b.iter(|| {
            for (t, p) in path.iter().enumerate() {
                manager.pointer_move(*p, t as u64);
            }
            black_box(queue.run_all(manager.scheduler()));
        });
    });
    group.finish();
}

criterion_group!(benches, bench_set_models, bench_hover_sweep);
criterion_main!(benches);
