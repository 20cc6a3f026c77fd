// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mapweave Schedule: a coalescing, `no_std` flush scheduler.
//!
//! ## Overview
//!
//! Interactive layers invalidate often: a drag may mutate a model dozens of times between
//! two repaints, and a bulk edit may touch thousands of models at once. This crate turns
//! those invalidations into a single deferred flush.
//!
//! - Work is queued as keyed tasks. Scheduling the same key twice before a flush keeps only
//!   the latest task.
//! - Each flush request carries a [`FlushPolicy`]: run on the next microtask turn, or
//!   aligned to the next repaint. Requests only ever escalate.
//! - [`FlushScheduler::batch`] groups synchronous work so that one flush is requested when
//!   the outermost batch returns.
//! - Every request is tagged with a monotonically increasing [`FlushToken`]; callbacks
//!   carrying a superseded token are ignored.
//!
//! The scheduler does not own an event loop. A [`FlushDriver`] supplied by the host receives
//! each request and later calls [`FlushScheduler::fire`]. [`FlushQueue`] is a ready-made
//! in-memory driver.
//!
//! ## Example
//!
//! ```
//! use mapweave_schedule::{FlushPolicy, FlushQueue, FlushScheduler};
//!
//! let queue = FlushQueue::new();
//! let scheduler = FlushScheduler::new(FlushPolicy::Microtask, Box::new(queue.clone()));
//!
//! scheduler.batch(Some(FlushPolicy::Frame), || {
//!     scheduler.schedule("layer:roads", || {});
//!     scheduler.schedule("layer:roads", || {});
//!     scheduler.schedule("layer:pois", || {});
//! });
//!
//! // One request, at the batch's policy.
//! assert_eq!(queue.requests(), 1);
//! assert_eq!(queue.frame_len(), 1);
//! assert_eq!(queue.run_frame(&scheduler), 1);
//! assert!(scheduler.is_empty());
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod driver;
mod policy;
mod scheduler;

pub use driver::{FlushDriver, FlushQueue};
pub use policy::{FlushPolicy, FlushToken};
pub use scheduler::FlushScheduler;
