// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interaction manager: ordered dispatch of pointer events across layers.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use kurbo::Point;
use log::{debug, trace};
use mapweave_engine::{Engine, Listeners, MapHandle};
use mapweave_popup::{PopupHost, PopupItem, PopupMode, PopupSource};

use crate::interaction::binding::LayerBinding;
use crate::interaction::order::visit_order;
use crate::interaction::session::PanLock;

/// Routes pointer events to layer interactions.
///
/// Every pass visits visible layers by descending z-index, ties in declaration order. Each
/// layer sees only its own hits. A layer whose handled interaction stops propagation hides
/// the event from every layer below it.
///
/// Dispatch methods return after every handler has run. Handlers may use layers and the
/// scheduler freely but must not dispatch events themselves.
pub struct InteractionManager<C> {
    map: MapHandle<dyn Engine>,
    bindings: Vec<Box<dyn LayerBinding<C>>>,
    hit_tolerance: f64,
    popup: Option<Rc<RefCell<PopupHost<C>>>>,
    popup_mode: PopupMode,
    active: Option<usize>,
    pan: PanLock,
    cursor: Option<String>,
    listeners: Listeners,
}

impl<C> fmt::Debug for InteractionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layers: Vec<&str> = self.bindings.iter().map(|b| b.id()).collect();
        f.debug_struct("InteractionManager")
            .field("layers", &layers)
            .field("hit_tolerance", &self.hit_tolerance)
            .field("popup_mode", &self.popup_mode)
            .field("dragging", &self.active.is_some())
            .field("pan_holders", &self.pan.holders())
            .field("cursor", &self.cursor)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl<C> InteractionManager<C> {
    pub(crate) fn new(
        map: MapHandle<dyn Engine>,
        hit_tolerance: f64,
        popup: Option<Rc<RefCell<PopupHost<C>>>>,
        popup_mode: PopupMode,
    ) -> Self {
        Self {
            map,
            bindings: Vec::new(),
            hit_tolerance,
            popup,
            popup_mode,
            active: None,
            pan: PanLock::default(),
            cursor: None,
            listeners: Listeners::empty(),
        }
    }

    pub(crate) fn add_binding(&mut self, binding: Box<dyn LayerBinding<C>>) {
        self.bindings.push(binding);
        self.refresh_listeners();
    }

    pub(crate) fn remove_binding(&mut self, id: &str) -> bool {
        let Some(index) = self.bindings.iter().position(|b| b.id() == id) else {
            return false;
        };
        if self.active == Some(index) {
            self.cancel_session();
        }
        self.bindings.remove(index);
        if let Some(active) = self.active.as_mut() {
            if *active > index {
                *active -= 1;
            }
        }
        self.refresh_listeners();
        true
    }

    /// Default hit tolerance in pixels.
    pub fn hit_tolerance(&self) -> f64 {
        self.hit_tolerance
    }

    /// Automatic popup collection mode.
    pub fn popup_mode(&self) -> PopupMode {
        self.popup_mode
    }

    /// Change the automatic popup collection mode.
    pub fn set_popup_mode(&mut self, mode: PopupMode) {
        self.popup_mode = mode;
        self.refresh_listeners();
    }

    /// Pointer listeners currently requested from the engine.
    pub fn listeners(&self) -> Listeners {
        self.listeners
    }

    /// Cursor currently applied.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Whether a translate or modify session is active.
    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    /// Recompute the listener set from the declared interactions and their current
    /// enabled state, telling the engine only when it changed.
    pub fn refresh_listeners(&mut self) {
        let mut listeners = self
            .bindings
            .iter()
            .fold(Listeners::empty(), |acc, b| acc | b.listeners());
        if self.active.is_some() {
            listeners |= Listeners::DRAG;
        }
        if self.popup_enabled() {
            match self.popup_mode {
                PopupMode::Off => {}
                PopupMode::Click => listeners |= Listeners::CLICK,
                PopupMode::Hover => listeners |= Listeners::POINTER_MOVE,
            }
        }
        if listeners != self.listeners {
            debug!("listeners {:?} -> {listeners:?}", self.listeners);
            self.listeners = listeners;
            self.map.borrow_mut().set_listeners(listeners);
        }
    }

    fn popup_enabled(&self) -> bool {
        self.popup.as_ref().is_some_and(|p| p.borrow().is_enabled())
    }

    fn order(&self) -> Vec<usize> {
        visit_order(self.bindings.iter().map(|b| b.z_index()))
    }

    fn set_cursor(&mut self, cursor: Option<String>) {
        if cursor != self.cursor {
            self.map.borrow_mut().set_cursor(cursor.as_deref());
            self.cursor = cursor;
        }
    }

    /// Pointer moved to `pixel`.
    ///
    /// While a session is active the move drives it; otherwise layers update hover state
    /// and the cursor.
    pub fn pointer_move(&mut self, pixel: Point, now_ms: u64) {
        self.refresh_listeners();
        if let Some(index) = self.active {
            if !self.bindings[index].drag_enabled() {
                self.cancel_session();
            } else if !self.bindings[index].drag_to(pixel, now_ms) {
                self.finish_session();
            }
            return;
        }
        if !self.listeners.contains(Listeners::POINTER_MOVE) {
            return;
        }
        self.hover_pass(pixel);
    }

    fn hover_pass(&mut self, pixel: Point) {
        let collect = self.popup_mode == PopupMode::Hover && self.popup_enabled();
        let mut blocked = false;
        let mut cursor = None;
        let mut popups = Vec::new();
        for index in self.order() {
            let out = self.bindings[index].hover(pixel, self.hit_tolerance, blocked, collect);
            if cursor.is_none() {
                cursor = out.cursor;
            }
            popups.extend(out.popups);
            if out.stop {
                trace!("hover stopped at `{}`", self.bindings[index].id());
                blocked = true;
            }
        }
        self.set_cursor(cursor);
        if collect {
            self.show_popups(popups, true);
        }
    }

    /// Single click at `pixel`.
    pub fn click(&mut self, pixel: Point) {
        self.refresh_listeners();
        if self.active.is_some() || !self.listeners.contains(Listeners::CLICK) {
            return;
        }
        let collect = self.popup_mode == PopupMode::Click && self.popup_enabled();
        let mut popups = Vec::new();
        for index in self.order() {
            let out = self.bindings[index].click(pixel, self.hit_tolerance, collect);
            popups.extend(out.popups);
            if out.stop {
                trace!(
                    "click stopped at `{}` (handled: {})",
                    self.bindings[index].id(),
                    out.handled
                );
                break;
            }
        }
        self.show_popups(popups, collect);
    }

    /// Double click at `pixel`.
    pub fn double_click(&mut self, pixel: Point) {
        self.refresh_listeners();
        if self.active.is_some() || !self.listeners.contains(Listeners::DOUBLE_CLICK) {
            return;
        }
        for index in self.order() {
            let out = self.bindings[index].double_click(pixel, self.hit_tolerance);
            if out.stop {
                trace!("double click stopped at `{}`", self.bindings[index].id());
                break;
            }
        }
    }

    /// `replace` sets the host's entries; otherwise only cluster entries are pushed.
    fn show_popups(&self, popups: Vec<PopupItem<C>>, replace: bool) {
        let Some(host) = &self.popup else {
            return;
        };
        if replace {
            host.borrow_mut().set(popups);
        } else {
            let clusters: Vec<PopupItem<C>> = popups
                .into_iter()
                .filter(|p| p.source == PopupSource::Cluster)
                .collect();
            if !clusters.is_empty() {
                host.borrow_mut().push(clusters);
            }
        }
    }

    /// Pointer pressed at `pixel`: start a translate or modify session on the first layer
    /// that accepts one.
    pub fn pointer_down(&mut self, pixel: Point) {
        self.refresh_listeners();
        if self.active.is_some() || !self.listeners.contains(Listeners::POINTER_DOWN) {
            return;
        }
        for index in self.order() {
            if let Some(cursor) = self.bindings[index].begin_drag(pixel, self.hit_tolerance) {
                self.active = Some(index);
                self.pan.acquire(&mut *self.map.borrow_mut());
                self.set_cursor(cursor);
                self.refresh_listeners();
                return;
            }
        }
    }

    /// Pointer released at `pixel`: apply any buffered move, end the session and refresh
    /// hover.
    pub fn pointer_up(&mut self, pixel: Point) {
        let Some(index) = self.active else {
            return;
        };
        if self.bindings[index].drag_enabled() {
            self.bindings[index].end_drag();
            self.finish_session();
        } else {
            self.cancel_session();
        }
        if self.listeners.contains(Listeners::POINTER_MOVE) {
            self.hover_pass(pixel);
        }
    }

    /// Apply buffered throttled moves that are due at `now_ms`.
    pub fn poll(&mut self, now_ms: u64) {
        let Some(index) = self.active else {
            return;
        };
        if !self.bindings[index].drag_enabled() {
            self.cancel_session();
        } else if !self.bindings[index].poll(now_ms) {
            self.finish_session();
        }
    }

    /// When [`poll`](Self::poll) next has work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        self.bindings[self.active?].next_deadline()
    }

    /// End the active session without calling its end handler.
    pub fn cancel_session(&mut self) {
        if let Some(index) = self.active {
            self.bindings[index].cancel_drag();
            self.finish_session();
        }
    }

    fn finish_session(&mut self) {
        if self.active.take().is_some() {
            self.pan.release(&mut *self.map.borrow_mut());
            self.set_cursor(None);
            self.refresh_listeners();
        }
    }

    /// Detach from the engine: end any session, forget hover and selection, drop every
    /// listener, reset cursor and pan.
    pub(crate) fn dispose(&mut self) {
        self.cancel_session();
        for binding in &mut self.bindings {
            binding.reset();
        }
        self.bindings.clear();
        self.pan.reset(&mut *self.map.borrow_mut());
        self.set_cursor(None);
        self.refresh_listeners();
    }
}
