// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drag-session plumbing: pan suppression and move throttling.

use kurbo::Point;
use log::debug;
use mapweave_engine::Engine;

/// Reference-counted suppression of the engine's own drag-to-pan.
///
/// Panning is disabled by the first holder and restored when the last one releases.
#[derive(Debug, Default)]
pub(crate) struct PanLock {
    holders: usize,
}

impl PanLock {
    pub(crate) fn acquire(&mut self, engine: &mut dyn Engine) {
        if self.holders == 0 {
            debug!("drag pan disabled");
            engine.set_pan_enabled(false);
        }
        self.holders += 1;
    }

    pub(crate) fn release(&mut self, engine: &mut dyn Engine) {
        if self.holders == 0 {
            return;
        }
        self.holders -= 1;
        if self.holders == 0 {
            debug!("drag pan restored");
            engine.set_pan_enabled(true);
        }
    }

    /// Drop every hold at once.
    pub(crate) fn reset(&mut self, engine: &mut dyn Engine) {
        if self.holders > 0 {
            self.holders = 0;
            engine.set_pan_enabled(true);
        }
    }

    pub(crate) fn holders(&self) -> usize {
        self.holders
    }
}

/// Leading-edge throttle for pointer moves.
///
/// The first move of a window applies immediately. Later moves in the same window are
/// buffered, keeping only the latest, until the window elapses or the buffer is taken.
#[derive(Clone, Debug)]
pub(crate) struct Throttle {
    window_ms: u64,
    window_start: Option<u64>,
    pending: Option<Point>,
}

impl Throttle {
    pub(crate) fn new(window_ms: u32) -> Self {
        Self {
            window_ms: u64::from(window_ms),
            window_start: None,
            pending: None,
        }
    }

    /// Offer a move at `now_ms`. Returns the position to apply now, if any.
    pub(crate) fn offer(&mut self, position: Point, now_ms: u64) -> Option<Point> {
        if self.window_ms == 0 {
            return Some(position);
        }
        let open = self
            .window_start
            .is_none_or(|start| now_ms >= start.saturating_add(self.window_ms));
        if open {
            self.window_start = Some(now_ms);
            self.pending = None;
            Some(position)
        } else {
            self.pending = Some(position);
            None
        }
    }

    /// The buffered move, if its window has elapsed by `now_ms`. Starts a new window.
    pub(crate) fn due(&mut self, now_ms: u64) -> Option<Point> {
        let deadline = self.deadline()?;
        if now_ms < deadline {
            return None;
        }
        self.window_start = Some(now_ms);
        self.pending.take()
    }

    /// The buffered move, regardless of the window.
    pub(crate) fn take_pending(&mut self) -> Option<Point> {
        self.pending.take()
    }

    /// When the buffered move becomes due.
    pub(crate) fn deadline(&self) -> Option<u64> {
        self.pending?;
        let start = self.window_start?;
        Some(start.saturating_add(self.window_ms))
    }
}
