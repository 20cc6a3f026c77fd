// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host integration: how flush requests reach the event loop.
//!
//! The scheduler never waits on anything itself. Each time it needs a flush it hands a
//! `(policy, token)` pair to a [`FlushDriver`]; the host later calls
//! [`FlushScheduler::fire`](crate::FlushScheduler::fire) with that token from its microtask
//! or repaint callback.
//!
//! [`FlushQueue`] is an in-memory driver for headless hosts and tests.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use core::cell::RefCell;

use crate::policy::{FlushPolicy, FlushToken};
use crate::scheduler::FlushScheduler;

/// Receives flush requests from a [`FlushScheduler`].
pub trait FlushDriver {
    /// Arrange for [`FlushScheduler::fire`] to be called with `token` according to `policy`.
    fn request(&mut self, policy: FlushPolicy, token: FlushToken);
}

#[derive(Debug, Default)]
struct QueueState {
    microtasks: VecDeque<FlushToken>,
    frames: VecDeque<FlushToken>,
    requests: usize,
}

/// An in-memory microtask/frame queue.
///
/// Cloning yields another handle to the same queue, so one clone can be boxed into the
/// scheduler as its driver while another is used to pump it.
///
/// ```
/// use mapweave_schedule::{FlushPolicy, FlushQueue, FlushScheduler};
/// use std::{cell::Cell, rc::Rc};
///
/// let queue = FlushQueue::new();
/// let scheduler = FlushScheduler::new(FlushPolicy::Microtask, Box::new(queue.clone()));
/// let runs = Rc::new(Cell::new(0));
/// for _ in 0..3 {
///     let runs = runs.clone();
///     scheduler.schedule("render", move || runs.set(runs.get() + 1));
/// }
/// assert_eq!(queue.run_microtasks(&scheduler), 1);
/// assert_eq!(runs.get(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct FlushQueue {
    inner: Rc<RefCell<QueueState>>,
}

impl FlushQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued microtask callbacks.
    pub fn microtask_len(&self) -> usize {
        self.inner.borrow().microtasks.len()
    }

    /// Number of queued frame callbacks.
    pub fn frame_len(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    /// Total number of requests ever received.
    pub fn requests(&self) -> usize {
        self.inner.borrow().requests
    }

    /// Drain the microtask queue, including microtasks queued while draining.
    ///
    /// Returns how many callbacks actually flushed (stale tokens do not count).
    pub fn run_microtasks(&self, scheduler: &FlushScheduler) -> usize {
        let mut flushed = 0;
        loop {
            let next = self.inner.borrow_mut().microtasks.pop_front();
            let Some(token) = next else {
                break;
            };
            if scheduler.fire(token) {
                flushed += 1;
            }
        }
        flushed
    }

    /// Run one repaint: every frame callback queued before this call.
    ///
    /// Frame callbacks requested while running are left for the next frame. Microtasks
    /// queued by the flushed tasks run afterwards, as a host would.
    pub fn run_frame(&self, scheduler: &FlushScheduler) -> usize {
        let frame: VecDeque<FlushToken> = core::mem::take(&mut self.inner.borrow_mut().frames);
        let mut flushed = 0;
        for token in frame {
            if scheduler.fire(token) {
                flushed += 1;
            }
        }
        flushed + self.run_microtasks(scheduler)
    }

    /// Drain microtasks, then run frames until both queues are empty.
    pub fn run_all(&self, scheduler: &FlushScheduler) -> usize {
        let mut flushed = self.run_microtasks(scheduler);
        while self.frame_len() > 0 {
            flushed += self.run_frame(scheduler);
        }
        flushed
    }
}

impl FlushDriver for FlushQueue {
    fn request(&mut self, policy: FlushPolicy, token: FlushToken) {
        let mut state = self.inner.borrow_mut();
        state.requests += 1;
        match policy {
            FlushPolicy::Microtask => state.microtasks.push_back(token),
            FlushPolicy::Frame => state.frames.push_back(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use core::cell::Cell;

    #[test]
    fn frame_requests_wait_for_run_frame() {
        let queue = FlushQueue::new();
        let scheduler = FlushScheduler::new(FlushPolicy::Frame, Box::new(queue.clone()));
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        scheduler.schedule("a", move || r.set(true));
        assert_eq!(queue.run_microtasks(&scheduler), 0);
        assert!(!ran.get());
        assert_eq!(queue.frame_len(), 1);
        assert_eq!(queue.run_frame(&scheduler), 1);
        assert!(ran.get());
    }

    #[test]
    fn frame_requested_during_frame_runs_next_frame() {
        let queue = FlushQueue::new();
        let scheduler = Rc::new(FlushScheduler::new(
            FlushPolicy::Frame,
            Box::new(queue.clone()),
        ));
        let count = Rc::new(Cell::new(0));
        let (s, c) = (scheduler.clone(), count.clone());
        scheduler.schedule("outer", move || {
            c.set(c.get() + 1);
            let c2 = c.clone();
            s.schedule("inner", move || c2.set(c2.get() + 1));
        });
        assert_eq!(queue.run_frame(&scheduler), 1);
        assert_eq!(count.get(), 1);
        assert_eq!(queue.run_frame(&scheduler), 1);
        assert_eq!(count.get(), 2);
    }
}
