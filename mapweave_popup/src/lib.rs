// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mapweave Popup: aggregation of popup entries contributed by map layers.
//!
//! ## Overview
//!
//! Several layers may want to describe what sits under the pointer. [`PopupHost`] collects
//! their [`PopupItem`]s into one ordered list:
//!
//! - duplicates collapse by [key](PopupItem::key) (explicit dedup key, else model id),
//!   keeping the first slot and the latest content;
//! - the list is sorted by descending priority (or a custom comparator), stably;
//! - the list is truncated to `max_items` after sorting;
//! - the result is handed to a [`PopupRenderer`].
//!
//! ```
//! use mapweave_popup::{NoopRenderer, PopupHost, PopupItem, PopupOptions};
//!
//! let mut host = PopupHost::new(&PopupOptions::default(), Box::new(NoopRenderer));
//! host.push([PopupItem::new("first").with_model_id("1")]);
//! host.push([PopupItem::new("second").with_model_id("1")]);
//! assert_eq!(host.items().len(), 1);
//! assert_eq!(host.items()[0].content, "second");
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod host;
mod item;

pub use host::{NoopRenderer, PopupHost, PopupRenderer};
pub use item::{PopupItem, PopupMode, PopupOptions, PopupSource};
