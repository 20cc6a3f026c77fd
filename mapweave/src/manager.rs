// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The layer manager: layers, interactions, scheduler and popups against one map.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::any::Any;
use core::cell::{Ref, RefCell};
use core::fmt;

use kurbo::Point;
use log::{debug, warn};
use mapweave_engine::{ClusterSettings, Engine, Listeners, MapHandle, View};
use mapweave_popup::{NoopRenderer, PopupHost, PopupMode, PopupRenderer};
use mapweave_schedule::{FlushDriver, FlushPolicy, FlushScheduler};

use crate::error::Error;
use crate::interaction::{Binding, InteractionManager, Interactions, LayerPopup};
use crate::layer::{GeometryAdapter, Layer, LayerConfig};
use crate::model::Model;
use crate::options::RuntimeOptions;
use crate::style::Style;

/// Everything needed to create a layer.
///
/// ```
/// use mapweave::{LayerSpec, Model, engine::{ClusterSettings, Geometry, kurbo::Point}};
///
/// struct Stop { id: u32, at: Point }
/// impl Model for Stop {
///     type Id = u32;
///     fn id(&self) -> u32 { self.id }
/// }
///
/// let spec: LayerSpec<Stop> = LayerSpec::new("stops", |s: &Stop| Geometry::Point(s.at))
///     .z_index(10)
///     .clustering(ClusterSettings::default())
///     .hit_tolerance(8.0);
/// # let _ = spec;
/// ```
pub struct LayerSpec<M: Model, S = (), C = ()> {
    config: LayerConfig<M, S>,
    interactions: Interactions<M>,
    popup: Option<LayerPopup<M, C>>,
}

impl<M: Model, S, C> fmt::Debug for LayerSpec<M, S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerSpec")
            .field("id", &self.config.id)
            .field("z_index", &self.config.z_index)
            .field("visible", &self.config.visible)
            .field("clustering", &self.config.clustering)
            .field("has_popup", &self.popup.is_some())
            .finish_non_exhaustive()
    }
}

impl<M: Model, S: 'static, C> LayerSpec<M, S, C> {
    /// A visible, unstyled layer with no interactions.
    pub fn new(id: impl Into<String>, adapter: impl GeometryAdapter<M> + 'static) -> Self {
        Self {
            config: LayerConfig {
                id: id.into(),
                z_index: 0,
                visible: true,
                opacity: 1.0,
                adapter: Box::new(adapter),
                style: None,
                cluster_style: None,
                clustering: None,
                clustering_enabled: false,
                hit_tolerance: None,
            },
            interactions: Interactions::new(),
            popup: None,
        }
    }

    /// Per-feature style.
    pub fn style<O: 'static>(mut self, style: Style<M, O, S>) -> Self {
        self.config.style = Some(Box::new(style));
        self
    }

    /// Style for clusters of more than one member.
    pub fn cluster_style(mut self, f: impl Fn(&[Rc<M>], &View) -> Vec<S> + 'static) -> Self {
        self.config.cluster_style = Some(Box::new(f));
        self
    }

    /// Make this a clustered layer, with clustering initially enabled.
    pub fn clustering(mut self, settings: ClusterSettings) -> Self {
        self.config.clustering = Some(settings);
        self.config.clustering_enabled = true;
        self
    }

    /// Initial clustering state of a clustered layer.
    pub fn clustering_enabled(mut self, enabled: bool) -> Self {
        self.config.clustering_enabled = enabled;
        self
    }

    /// Stacking order; higher is drawn above and hit first.
    pub fn z_index(mut self, z_index: i32) -> Self {
        self.config.z_index = z_index;
        self
    }

    /// Initial visibility.
    pub fn visible(mut self, visible: bool) -> Self {
        self.config.visible = visible;
        self
    }

    /// Initial opacity, clamped to `0..=1`.
    pub fn opacity(mut self, opacity: f64) -> Self {
        self.config.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Hit tolerance in pixels, overriding the manager's default.
    pub fn hit_tolerance(mut self, tolerance: f64) -> Self {
        self.config.hit_tolerance = Some(tolerance);
        self
    }

    /// Pointer interactions.
    pub fn interactions(mut self, interactions: Interactions<M>) -> Self {
        self.interactions = interactions;
        self
    }

    /// Popup contribution.
    pub fn popup(mut self, popup: LayerPopup<M, C>) -> Self {
        self.popup = Some(popup);
        self
    }
}

struct LayerEntry {
    id: String,
    handle: Box<dyn Any>,
    dispose: Box<dyn Fn()>,
}

/// A running set of layers against one map.
///
/// The manager owns the flush scheduler, the interaction manager and the optional popup
/// host. Layers are added from [`LayerSpec`]s and looked up again by id with their model
/// and style types.
///
/// Event methods forward host pointer events to the [`InteractionManager`]. They must not
/// be called from inside an interaction handler; such calls are ignored with a warning.
/// The same holds for [`add_layer`](Self::add_layer) and
/// [`remove_layer`](Self::remove_layer).
pub struct LayerManager<E, C = ()> {
    map: MapHandle<E>,
    scheduler: Rc<FlushScheduler>,
    layers: RefCell<Vec<LayerEntry>>,
    interactions: RefCell<InteractionManager<C>>,
    popup: Option<Rc<RefCell<PopupHost<C>>>>,
}

impl<E, C> fmt::Debug for LayerManager<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layers: Vec<String> = self.layers.borrow().iter().map(|e| e.id.clone()).collect();
        f.debug_struct("LayerManager")
            .field("layers", &layers)
            .field("scheduler", &self.scheduler)
            .field("interactions", &self.interactions)
            .field("popup", &self.popup)
            .finish_non_exhaustive()
    }
}

impl<E: Engine + 'static, C: 'static> LayerManager<E, C> {
    /// Create a manager for `map`. Flush requests go to `driver`.
    ///
    /// A popup host is created when `options.popup` is set; it renders nothing until
    /// [`with_popup_renderer`](Self::with_popup_renderer) is used instead.
    pub fn new(map: MapHandle<E>, options: &RuntimeOptions, driver: Box<dyn FlushDriver>) -> Self {
        Self::with_popup_renderer(map, options, driver, Box::new(NoopRenderer))
    }

    /// Like [`new`](Self::new), rendering popups through `renderer`.
    pub fn with_popup_renderer(
        map: MapHandle<E>,
        options: &RuntimeOptions,
        driver: Box<dyn FlushDriver>,
        renderer: Box<dyn PopupRenderer<C>>,
    ) -> Self {
        let scheduler = Rc::new(FlushScheduler::new(options.flush_policy, driver));
        let popup = options
            .popup
            .as_ref()
            .map(|popup| Rc::new(RefCell::new(PopupHost::new(popup, renderer))));
        let mode = options.popup.as_ref().map_or(PopupMode::Off, |p| p.mode);
        let interactions =
            InteractionManager::new(map.erase(), options.hit_tolerance, popup.clone(), mode);
        Self {
            map,
            scheduler,
            layers: RefCell::new(Vec::new()),
            interactions: RefCell::new(interactions),
            popup,
        }
    }

    /// The map this manager drives.
    pub fn map(&self) -> &MapHandle<E> {
        &self.map
    }

    /// The flush scheduler shared by all layers.
    pub fn scheduler(&self) -> &Rc<FlushScheduler> {
        &self.scheduler
    }

    /// The popup host, if configured.
    pub fn popup(&self) -> Option<&Rc<RefCell<PopupHost<C>>>> {
        self.popup.as_ref()
    }

    /// Run `f` as one batch: mutations apply immediately, repaints flush once afterwards.
    pub fn batch<R>(&self, policy: Option<FlushPolicy>, f: impl FnOnce() -> R) -> R {
        self.scheduler.batch(policy, f)
    }

    /// Create a layer from `spec` and attach its interactions.
    pub fn add_layer<M: Model, S: 'static>(
        &self,
        spec: LayerSpec<M, S, C>,
    ) -> Result<Layer<M, S>, Error> {
        let LayerSpec {
            config,
            interactions,
            popup,
        } = spec;
        if self.layers.borrow().iter().any(|e| e.id == config.id) {
            return Err(Error::DuplicateLayer { layer: config.id });
        }
        let Ok(mut manager) = self.interactions.try_borrow_mut() else {
            warn!("layer `{}` not added during dispatch", config.id);
            return Err(Error::Busy);
        };
        let layer = Layer::new(config, self.map.erase(), Rc::clone(&self.scheduler));
        manager.add_binding(Box::new(Binding::new(layer.clone(), interactions, popup)));
        let disposer = layer.clone();
        self.layers.borrow_mut().push(LayerEntry {
            id: layer.id().to_string(),
            handle: Box::new(layer.clone()),
            dispose: Box::new(move || disposer.dispose()),
        });
        Ok(layer)
    }

    /// The layer `id`, if it exists with model type `M` and style type `S`.
    pub fn layer<M: Model, S: 'static>(&self, id: &str) -> Option<Layer<M, S>> {
        self.layers
            .borrow()
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.handle.downcast_ref::<Layer<M, S>>())
            .cloned()
    }

    /// Ids of all layers, in declaration order.
    pub fn layer_ids(&self) -> Vec<String> {
        self.layers.borrow().iter().map(|e| e.id.clone()).collect()
    }

    /// Detach and remove layer `id`. Ends a session on it without calling its end handler.
    pub fn remove_layer(&self, id: &str) -> bool {
        let Ok(mut manager) = self.interactions.try_borrow_mut() else {
            warn!("layer `{id}` not removed during dispatch");
            return false;
        };
        let entry = {
            let mut layers = self.layers.borrow_mut();
            let Some(index) = layers.iter().position(|e| e.id == id) else {
                return false;
            };
            layers.remove(index)
        };
        manager.remove_binding(id);
        (entry.dispose)();
        true
    }

    /// The interaction manager, for inspection.
    pub fn interactions(&self) -> Ref<'_, InteractionManager<C>> {
        self.interactions.borrow()
    }

    fn dispatch(&self, event: &str, f: impl FnOnce(&mut InteractionManager<C>)) {
        match self.interactions.try_borrow_mut() {
            Ok(mut manager) => f(&mut manager),
            Err(_) => warn!("re-entrant {event} ignored"),
        }
    }

    /// Forward a pointer move.
    pub fn pointer_move(&self, pixel: Point, now_ms: u64) {
        self.dispatch("pointer move", |m| m.pointer_move(pixel, now_ms));
    }

    /// Forward a single click.
    pub fn click(&self, pixel: Point) {
        self.dispatch("click", |m| m.click(pixel));
    }

    /// Forward a double click.
    pub fn double_click(&self, pixel: Point) {
        self.dispatch("double click", |m| m.double_click(pixel));
    }

    /// Forward a pointer press.
    pub fn pointer_down(&self, pixel: Point) {
        self.dispatch("pointer down", |m| m.pointer_down(pixel));
    }

    /// Forward a pointer release.
    pub fn pointer_up(&self, pixel: Point) {
        self.dispatch("pointer up", |m| m.pointer_up(pixel));
    }

    /// Apply buffered throttled moves due at `now_ms`.
    pub fn poll(&self, now_ms: u64) {
        self.dispatch("poll", |m| m.poll(now_ms));
    }

    /// When [`poll`](Self::poll) next has work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        self.interactions.try_borrow().ok()?.next_deadline()
    }

    /// End the active translate or modify session without calling its end handler.
    pub fn cancel_session(&self) {
        self.dispatch("cancel", InteractionManager::cancel_session);
    }

    /// Recompute pointer listeners, e.g. after toggling a dynamic `enabled` flag.
    pub fn refresh_listeners(&self) {
        self.dispatch("listener refresh", InteractionManager::refresh_listeners);
    }

    /// Change the automatic popup collection mode.
    pub fn set_popup_mode(&self, mode: PopupMode) {
        self.dispatch("popup mode change", |m| m.set_popup_mode(mode));
    }

    /// Pointer listeners currently requested from the engine.
    pub fn listeners(&self) -> Listeners {
        self.interactions.borrow().listeners()
    }

    /// Whether a translate or modify session is active.
    pub fn is_dragging(&self) -> bool {
        self.interactions.borrow().is_dragging()
    }

    /// Cursor currently applied.
    pub fn cursor(&self) -> Option<String> {
        self.interactions.borrow().cursor().map(ToString::to_string)
    }

    /// Tear everything down: end any session, detach listeners, reset cursor and pan,
    /// remove every engine layer, unmount popups and run pending flush tasks.
    pub fn dispose(&self) {
        self.dispatch("dispose", InteractionManager::dispose);
        let layers = core::mem::take(&mut *self.layers.borrow_mut());
        for entry in &layers {
            (entry.dispose)();
        }
        if let Some(popup) = &self.popup {
            popup.borrow_mut().set_enabled(false);
        }
        let flushed = self.scheduler.flush_now();
        debug!("manager disposed: {} layers, {flushed} pending tasks", layers.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use core::cell::Cell;

    use mapweave_popup::{PopupItem, PopupOptions};

    use crate::fixtures::{Harness, Poi, log, poi, poi_layer, record};
    use crate::interaction::{Click, Drag, Hover};

    #[test]
    fn layer_ids_are_unique() {
        let h = Harness::new();
        h.pois(poi_layer("a"));
        h.pois(poi_layer("b"));
        let err = h.manager.add_layer(poi_layer("a")).unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateLayer {
                layer: "a".into()
            }
        );
        assert_eq!(h.manager.layer_ids(), ["a", "b"]);
    }

    #[test]
    fn lookup_is_typed() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois"));
        layer.set_models([poi(1, 0.0, 0.0)]).unwrap();

        let found = h.manager.layer::<Poi, ()>("pois").unwrap();
        assert!(found.has_model(&1));
        assert!(h.manager.layer::<Poi, String>("pois").is_none());
        assert!(h.manager.layer::<Poi, ()>("nope").is_none());
    }

    #[test]
    fn remove_layer_drops_engine_state() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois"));
        layer.set_models([poi(1, 0.0, 0.0)]).unwrap();

        assert!(h.manager.remove_layer("pois"));
        assert!(!h.manager.remove_layer("pois"));
        assert!(!h.engine().has_layer(layer.engine_layer()));
        assert!(h.manager.layer_ids().is_empty());
        assert!(!h.manager.scheduler().is_scheduled("layer:pois"));
    }

    #[test]
    fn batch_defers_until_the_outermost_block() {
        let h = Harness::new();
        let a = h.pois(poi_layer("a"));
        let b = h.pois(poi_layer("b"));
        h.manager.batch(None, || {
            a.set_models([poi(1, 0.0, 0.0)]).unwrap();
            h.manager.batch(Some(FlushPolicy::Frame), || {
                b.set_models([poi(2, 0.0, 0.0)]).unwrap();
            });
            assert_eq!(h.queue.requests(), 0);
        });
        assert_eq!(h.queue.requests(), 1);
        assert_eq!(h.queue.frame_len(), 1);
        assert_eq!(h.flush(), 1);
        assert_eq!(h.engine().render_requests(a.engine_layer()), 1);
        assert_eq!(h.engine().render_requests(b.engine_layer()), 1);
    }

    #[test]
    fn dispatch_from_a_handler_is_ignored() {
        let h = Rc::new(Harness::new());
        let events = log();
        let (sink, inner) = (events.clone(), Rc::downgrade(&h));
        let layer = h.pois(poi_layer("pois").interactions(Interactions::new().click(
            Click::new(move |_| {
                record(&sink, "click");
                if let Some(h) = inner.upgrade() {
                    h.manager.click(Point::new(0.0, 0.0));
                    let extra = h.manager.add_layer(poi_layer("late"));
                    record(&sink, format!("{extra:?}"));
                }
                true
            }),
        )));
        layer.set_models([poi(1, 0.0, 0.0)]).unwrap();

        h.manager.click(Point::new(0.0, 0.0));
        assert_eq!(*events.borrow(), ["click", "Err(Busy)"]);
        assert_eq!(h.manager.layer_ids(), ["pois"]);
    }

    #[test]
    fn dispose_detaches_everything() {
        let h = Harness::with_options(&RuntimeOptions {
            popup: Some(PopupOptions::default()),
            ..RuntimeOptions::default()
        });
        let ended = Rc::new(Cell::new(false));
        let flag = ended.clone();
        let layer = h.pois(
            poi_layer("pois").interactions(
                Interactions::new()
                    .hover(Hover::new().cursor("pointer"))
                    .translate(Drag::new().on_end(move |_| flag.set(true))),
            ),
        );
        let other = h.pois(poi_layer("other"));
        layer.set_models([poi(1, 0.0, 0.0)]).unwrap();
        other.set_models([poi(2, 50.0, 0.0)]).unwrap();
        h.manager
            .popup()
            .unwrap()
            .borrow_mut()
            .push([PopupItem::new("note".to_string())]);
        h.manager.pointer_down(Point::new(0.0, 0.0));
        assert!(h.manager.is_dragging());

        h.manager.dispose();

        let engine = h.engine();
        assert!(!engine.has_layer(layer.engine_layer()));
        assert!(!engine.has_layer(other.engine_layer()));
        assert_eq!(engine.listeners(), Listeners::empty());
        assert_eq!(engine.cursor(), None);
        assert!(engine.pan_enabled());
        drop(engine);
        assert!(!ended.get());
        assert!(h.manager.layer_ids().is_empty());
        assert!(h.manager.scheduler().is_empty());
        let popup = h.manager.popup().unwrap().borrow();
        assert!(!popup.is_mounted());
        assert!(popup.items().is_empty());
    }
}
