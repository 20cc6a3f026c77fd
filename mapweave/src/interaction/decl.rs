// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interaction declarations: what a layer reacts to and how.
//!
//! Each declaration is a plain struct of optional handlers built with chained setters.
//! Handlers that can consume an event return `true` for *handled*; what happens next is
//! decided by the declaration's [`Propagation`].

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::Cell;
use core::fmt;

use mapweave_engine::FitOptions;

use crate::model::HitItem;

type ItemsFn<M> = Box<dyn Fn(&[HitItem<M>])>;
type HandledFn<M> = Box<dyn Fn(&[HitItem<M>]) -> bool>;
type ItemFn<M> = Box<dyn Fn(&HitItem<M>)>;
type PickFn<M> = Box<dyn Fn(&[HitItem<M>]) -> Option<HitItem<M>>>;
type ContentFn<M, C> = Box<dyn Fn(&HitItem<M>) -> Option<C>>;
type ClusterContentFn<M, C> = Box<dyn Fn(&[HitItem<M>]) -> Option<C>>;
type KeyFn<M> = Box<dyn Fn(&HitItem<M>) -> String>;

/// Whether an interaction is currently active.
///
/// Dynamic variants are re-evaluated at the start of every dispatch.
#[derive(Default)]
pub enum Enabled {
    /// Always active.
    #[default]
    Always,
    /// Never active.
    Never,
    /// Active while the shared flag is set.
    Flag(Rc<Cell<bool>>),
    /// Active while the predicate returns `true`.
    When(Box<dyn Fn() -> bool>),
}

impl Enabled {
    /// Evaluate now.
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Flag(flag) => flag.get(),
            Self::When(predicate) => predicate(),
        }
    }
}

impl From<bool> for Enabled {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Always } else { Self::Never }
    }
}

impl From<Rc<Cell<bool>>> for Enabled {
    fn from(flag: Rc<Cell<bool>>) -> Self {
        Self::Flag(flag)
    }
}

impl fmt::Debug for Enabled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Never => f.write_str("Never"),
            Self::Flag(flag) => f.debug_tuple("Flag").field(&flag.get()).finish(),
            Self::When(_) => f.write_str("When(..)"),
        }
    }
}

/// What a handled event does to the layers below.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Propagation {
    /// Stop once handled.
    #[default]
    Auto,
    /// Stop once handled.
    Stop,
    /// Always continue to lower layers.
    Continue,
}

impl Propagation {
    /// Whether an event with this outcome stops at the current layer.
    pub fn stops(self, handled: bool) -> bool {
        match self {
            Self::Auto | Self::Stop => handled,
            Self::Continue => false,
        }
    }
}

macro_rules! gate_setters {
    () => {
        /// Set when the interaction is active.
        pub fn enabled(mut self, enabled: impl Into<Enabled>) -> Self {
            self.enabled = enabled.into();
            self
        }

        /// Cursor shown while the pointer is over this layer's items.
        pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
            self.cursor = Some(cursor.into());
            self
        }
    };
}

macro_rules! propagation_setter {
    () => {
        /// Set how a handled event propagates to lower layers.
        pub fn propagation(mut self, propagation: Propagation) -> Self {
            self.propagation = propagation;
            self
        }
    };
}

/// Hover: enter and leave notifications plus an optional state label.
pub struct Hover<M> {
    pub(crate) on_enter: Option<ItemsFn<M>>,
    pub(crate) on_leave: Option<ItemsFn<M>>,
    pub(crate) state: Option<String>,
    pub(crate) cursor: Option<String>,
    pub(crate) enabled: Enabled,
    pub(crate) propagation: Propagation,
}

impl<M> Default for Hover<M> {
    fn default() -> Self {
        Self {
            on_enter: None,
            on_leave: None,
            state: None,
            cursor: None,
            enabled: Enabled::Always,
            propagation: Propagation::Auto,
        }
    }
}

impl<M> Hover<M> {
    /// An empty hover declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the items the pointer just entered.
    pub fn on_enter(mut self, f: impl Fn(&[HitItem<M>]) + 'static) -> Self {
        self.on_enter = Some(Box::new(f));
        self
    }

    /// Called with the items the pointer just left.
    pub fn on_leave(mut self, f: impl Fn(&[HitItem<M>]) + 'static) -> Self {
        self.on_leave = Some(Box::new(f));
        self
    }

    /// Feature state held by hovered items.
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    gate_setters!();
    propagation_setter!();
}

/// Select: a persistent selection replaced on every click.
pub struct Select<M> {
    pub(crate) on_select: Option<HandledFn<M>>,
    pub(crate) on_clear: Option<Box<dyn Fn()>>,
    pub(crate) state: Option<String>,
    pub(crate) cursor: Option<String>,
    pub(crate) enabled: Enabled,
    pub(crate) propagation: Propagation,
}

impl<M> Default for Select<M> {
    fn default() -> Self {
        Self {
            on_select: None,
            on_clear: None,
            state: None,
            cursor: None,
            enabled: Enabled::Always,
            propagation: Propagation::Auto,
        }
    }
}

impl<M> Select<M> {
    /// An empty select declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the new selection; returns whether the click was handled.
    pub fn on_select(mut self, f: impl Fn(&[HitItem<M>]) -> bool + 'static) -> Self {
        self.on_select = Some(Box::new(f));
        self
    }

    /// Called when a click hits nothing on this layer.
    pub fn on_clear(mut self, f: impl Fn() + 'static) -> Self {
        self.on_clear = Some(Box::new(f));
        self
    }

    /// Feature state held by selected items.
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    gate_setters!();
    propagation_setter!();
}

/// Click or double-click: a single-shot handler.
pub struct Click<M> {
    pub(crate) handler: HandledFn<M>,
    pub(crate) cursor: Option<String>,
    pub(crate) enabled: Enabled,
    pub(crate) propagation: Propagation,
}

/// Double-click uses the same declaration as click.
pub type DoubleClick<M> = Click<M>;

impl<M> Click<M> {
    /// Call `handler` with the clicked items; it returns whether the click was handled.
    ///
    /// The handler is not called when nothing on the layer was hit.
    pub fn new(handler: impl Fn(&[HitItem<M>]) -> bool + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            cursor: None,
            enabled: Enabled::Always,
            propagation: Propagation::Auto,
        }
    }

    gate_setters!();
    propagation_setter!();
}

/// Drag sessions: translate (move whole models) or modify (move one vertex).
///
/// A session is pinned to the id of the model it started on and re-resolves that id on
/// every pointer move; if the model is gone or its primitive was recreated, the session
/// ends silently.
pub struct Drag<M> {
    pub(crate) pick_target: Option<PickFn<M>>,
    pub(crate) on_start: Option<ItemFn<M>>,
    pub(crate) on_change: Option<ItemFn<M>>,
    pub(crate) on_end: Option<ItemFn<M>>,
    pub(crate) state: Option<String>,
    pub(crate) cursor: Option<String>,
    pub(crate) drag_cursor: Option<String>,
    pub(crate) move_throttle_ms: u32,
    pub(crate) enabled: Enabled,
}

/// Declaration for dragging whole models.
pub type Translate<M> = Drag<M>;

/// Declaration for dragging single vertices.
pub type Modify<M> = Drag<M>;

impl<M> Default for Drag<M> {
    fn default() -> Self {
        Self {
            pick_target: None,
            on_start: None,
            on_change: None,
            on_end: None,
            state: None,
            cursor: None,
            drag_cursor: None,
            move_throttle_ms: 0,
            enabled: Enabled::Always,
        }
    }
}

impl<M> Drag<M> {
    /// An empty drag declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose the target among the candidates under the pointer; `None` does not start.
    ///
    /// Without it, the topmost candidate is the target.
    pub fn pick_target(
        mut self,
        f: impl Fn(&[HitItem<M>]) -> Option<HitItem<M>> + 'static,
    ) -> Self {
        self.pick_target = Some(Box::new(f));
        self
    }

    /// Called once the session starts.
    pub fn on_start(mut self, f: impl Fn(&HitItem<M>) + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    /// Called after each applied move, with the updated model.
    pub fn on_change(mut self, f: impl Fn(&HitItem<M>) + 'static) -> Self {
        self.on_change = Some(Box::new(f));
        self
    }

    /// Called on pointer-up if the target still resolves.
    pub fn on_end(mut self, f: impl Fn(&HitItem<M>) + 'static) -> Self {
        self.on_end = Some(Box::new(f));
        self
    }

    /// Feature state held by the target while the session lasts.
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Cursor shown while the session lasts. Falls back to [`cursor`](Self::cursor).
    pub fn drag_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.drag_cursor = Some(cursor.into());
        self
    }

    /// Apply at most one move per window of `ms` milliseconds; `0` applies every move.
    pub fn move_throttle_ms(mut self, ms: u32) -> Self {
        self.move_throttle_ms = ms;
        self
    }

    gate_setters!();

    pub(crate) fn session_cursor(&self) -> Option<String> {
        self.drag_cursor.clone().or_else(|| self.cursor.clone())
    }
}

/// Clicks on clusters of two or more members.
pub struct ClusterClick<M> {
    pub(crate) expand_on_click: bool,
    pub(crate) fit: FitOptions,
    pub(crate) zoom_step: f64,
    pub(crate) on_expand: Option<ItemsFn<M>>,
    pub(crate) cursor: Option<String>,
    pub(crate) enabled: Enabled,
}

impl<M> Default for ClusterClick<M> {
    fn default() -> Self {
        Self {
            expand_on_click: true,
            fit: FitOptions::default(),
            zoom_step: 1.0,
            on_expand: None,
            cursor: None,
            enabled: Enabled::Always,
        }
    }
}

impl<M> ClusterClick<M> {
    /// Expand on click, fitting to the members with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a click zooms into the cluster.
    pub fn expand_on_click(mut self, expand: bool) -> Self {
        self.expand_on_click = expand;
        self
    }

    /// Fit options used when expanding.
    pub fn fit(mut self, fit: FitOptions) -> Self {
        self.fit = fit;
        self
    }

    /// Zoom levels to step in when the members share one position.
    pub fn zoom_step(mut self, step: f64) -> Self {
        self.zoom_step = step;
        self
    }

    /// Called with the members after expanding.
    pub fn on_expand(mut self, f: impl Fn(&[HitItem<M>]) + 'static) -> Self {
        self.on_expand = Some(Box::new(f));
        self
    }

    gate_setters!();
}

/// Popup content a layer contributes for its items.
pub struct LayerPopup<M, C> {
    pub(crate) build: ContentFn<M, C>,
    pub(crate) dedup_key: Option<KeyFn<M>>,
    pub(crate) cluster: Option<ClusterContentFn<M, C>>,
    pub(crate) priority: i32,
    pub(crate) enabled: Enabled,
}

impl<M, C> LayerPopup<M, C> {
    /// Build content for one item; `None` contributes nothing.
    pub fn new(build: impl Fn(&HitItem<M>) -> Option<C> + 'static) -> Self {
        Self {
            build: Box::new(build),
            dedup_key: None,
            cluster: None,
            priority: 0,
            enabled: Enabled::Always,
        }
    }

    /// Dedup items by this key instead of the model id.
    pub fn dedup_key(mut self, f: impl Fn(&HitItem<M>) -> String + 'static) -> Self {
        self.dedup_key = Some(Box::new(f));
        self
    }

    /// Build content for a clicked cluster of two or more members.
    pub fn cluster(mut self, f: impl Fn(&[HitItem<M>]) -> Option<C> + 'static) -> Self {
        self.cluster = Some(Box::new(f));
        self
    }

    /// Priority of this layer's entries.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set when the layer contributes entries.
    pub fn enabled(mut self, enabled: impl Into<Enabled>) -> Self {
        self.enabled = enabled.into();
        self
    }
}

/// Every interaction declared on one layer.
pub struct Interactions<M> {
    pub(crate) hover: Option<Hover<M>>,
    pub(crate) select: Option<Select<M>>,
    pub(crate) click: Option<Click<M>>,
    pub(crate) double_click: Option<DoubleClick<M>>,
    pub(crate) translate: Option<Translate<M>>,
    pub(crate) modify: Option<Modify<M>>,
    pub(crate) cluster: Option<ClusterClick<M>>,
}

impl<M> Default for Interactions<M> {
    fn default() -> Self {
        Self {
            hover: None,
            select: None,
            click: None,
            double_click: None,
            translate: None,
            modify: None,
            cluster: None,
        }
    }
}

impl<M> Interactions<M> {
    /// No interactions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare hover.
    pub fn hover(mut self, hover: Hover<M>) -> Self {
        self.hover = Some(hover);
        self
    }

    /// Declare select.
    pub fn select(mut self, select: Select<M>) -> Self {
        self.select = Some(select);
        self
    }

    /// Declare click.
    pub fn click(mut self, click: Click<M>) -> Self {
        self.click = Some(click);
        self
    }

    /// Declare double-click.
    pub fn double_click(mut self, double_click: DoubleClick<M>) -> Self {
        self.double_click = Some(double_click);
        self
    }

    /// Declare translate.
    pub fn translate(mut self, translate: Translate<M>) -> Self {
        self.translate = Some(translate);
        self
    }

    /// Declare modify. When both apply, modify is tried before translate.
    pub fn modify(mut self, modify: Modify<M>) -> Self {
        self.modify = Some(modify);
        self
    }

    /// Declare cluster clicks.
    pub fn cluster(mut self, cluster: ClusterClick<M>) -> Self {
        self.cluster = Some(cluster);
        self
    }
}

macro_rules! opaque_debug {
    ($($ty:ident<$($g:ident),+>),+ $(,)?) => {
        $(
            impl<$($g),+> fmt::Debug for $ty<$($g),+> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_struct(stringify!($ty)).finish_non_exhaustive()
                }
            }
        )+
    };
}

opaque_debug!(
    Hover<M>,
    Select<M>,
    Click<M>,
    Drag<M>,
    ClusterClick<M>,
    LayerPopup<M, C>,
    Interactions<M>,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_propagation_stops_only_when_handled() {
        assert!(Propagation::Auto.stops(true));
        assert!(!Propagation::Auto.stops(false));
        assert!(Propagation::Stop.stops(true));
        assert!(!Propagation::Continue.stops(true));
    }

    #[test]
    fn enabled_flag_is_live() {
        let flag = Rc::new(Cell::new(true));
        let enabled = Enabled::from(flag.clone());
        assert!(enabled.is_enabled());
        flag.set(false);
        assert!(!enabled.is_enabled());
        assert!(!Enabled::from(false).is_enabled());
    }

    #[test]
    fn drag_cursor_falls_back() {
        let d: Drag<()> = Drag::new().cursor("grab");
        assert_eq!(d.session_cursor().as_deref(), Some("grab"));
        let d: Drag<()> = Drag::new().cursor("grab").drag_cursor("grabbing");
        assert_eq!(d.session_cursor().as_deref(), Some("grabbing"));
    }
}
