// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use mapweave::Style;
use mapweave::engine::View;
use mapweave_popup::{NoopRenderer, PopupHost, PopupItem, PopupOptions};

#[derive(Clone)]
struct Stroke {
    width: f64,
    color: u32,
}

fn stroke_style() -> Style<u32, Stroke, (f64, u32)> {
    Style::new(
        |kind: &u32, _: &View| Stroke {
            width: 1.0,
            color: *kind % 8,
        },
        |o: &Stroke, _: &View| vec![(o.width, o.color)],
    )
    .state("hovered", |o, _, _| o.width = 2.0)
    .state("selected", |o, _, _| o.color = 0xff)
    .state_priority(["selected"])
}

fn bench_style_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("style_resolve");
    let view = View::default();
    let states = vec!["hovered".to_string(), "selected".to_string()];

    let plain = stroke_style();
    group.bench_function("uncached", |b| {
        b.iter(|| {
            for kind in 0..1_000_u32 {
                black_box(plain.resolve(&kind, &states, &view));
            }
        });
    });

    let cached = stroke_style().cache_key(|o, _| format!("{}:{}", o.width, o.color));
    group.bench_function("cached", |b| {
        b.iter(|| {
            for kind in 0..1_000_u32 {
                black_box(cached.resolve(&kind, &states, &view));
            }
        });
    });
    group.finish();
}

fn bench_popup_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("popup_merge");
    let options = PopupOptions {
        max_items: Some(10),
        ..PopupOptions::default()
    };
    // Overlapping batches: every other key repeats.
    let batches: Vec<Vec<PopupItem<u32>>> = (0..20_u32)
        .map(|batch| {
            (0..50_u32)
                .map(|i| {
                    let id = batch * 25 + i;
                    PopupItem::new(id)
                        .with_model_id(id.to_string())
                        .with_priority((id % 7) as i32)
                })
                .collect()
        })
        .collect();
    group.bench_function("push_20x50", |b| {
        b.iter_batched(
            || PopupHost::<u32>::new(&options, Box::new(NoopRenderer)),
            |mut host| {
                for batch in &batches {
                    host.push(batch.iter().cloned());
                }
                black_box(host.items().len());
            },
            BatchSize::SmallInput,
        );
    });
    group.bench_function("set_20x50", |b| {
        b.iter_batched(
            || PopupHost::<u32>::new(&options, Box::new(NoopRenderer)),
            |mut host| {
                for batch in &batches {
                    host.set(batch.iter().cloned());
                }
                black_box(host.items().len());
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_style_resolve, bench_popup_merge);
criterion_main!(benches);
