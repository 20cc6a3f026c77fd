// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer interaction state machines.
//!
//! A [`Binding`] ties one typed [`Layer`] to its declarations and to the state those
//! declarations keep between events: the hovered ids, the current selection and the active
//! drag session. The interaction manager drives bindings through the object-safe
//! [`LayerBinding`] trait, so layers of different model types share one dispatch loop.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use kurbo::Point;
use log::debug;
use mapweave_engine::{FeatureId, Listeners, VertexRef, union_extent};
use mapweave_popup::{PopupItem, PopupSource};

use crate::events::MutationReason;
use crate::interaction::decl::{Drag, Enabled, Interactions, LayerPopup, Propagation};
use crate::interaction::hover::{HoverEvent, HoverSet};
use crate::interaction::session::Throttle;
use crate::layer::{Layer, LayerHit, MutateOptions};
use crate::model::{HitItem, Model};

/// Result of offering one event to one layer.
pub(crate) struct Outcome<C> {
    /// An interaction consumed the event.
    pub(crate) handled: bool,
    /// Lower layers must not see the event.
    pub(crate) stop: bool,
    /// Cursor this layer asks for.
    pub(crate) cursor: Option<String>,
    /// Popup entries contributed by this layer.
    pub(crate) popups: Vec<PopupItem<C>>,
}

impl<C> Default for Outcome<C> {
    fn default() -> Self {
        Self {
            handled: false,
            stop: false,
            cursor: None,
            popups: Vec::new(),
        }
    }
}

/// Object-safe face of a [`Binding`].
pub(crate) trait LayerBinding<C> {
    fn id(&self) -> &str;
    fn z_index(&self) -> i32;
    fn listeners(&self) -> Listeners;
    fn tolerance(&self, default: f64) -> f64;

    /// Pointer move. `blocked` layers update their hover state as if nothing was hit.
    fn hover(&mut self, pixel: Point, tolerance: f64, blocked: bool, collect: bool) -> Outcome<C>;
    fn click(&mut self, pixel: Point, tolerance: f64, collect: bool) -> Outcome<C>;
    fn double_click(&mut self, pixel: Point, tolerance: f64) -> Outcome<C>;

    /// Try to start a drag session; returns the session cursor on success.
    fn begin_drag(&mut self, pixel: Point, tolerance: f64) -> Option<Option<String>>;
    /// Returns `false` once the session has ended.
    fn drag_to(&mut self, pixel: Point, now_ms: u64) -> bool;
    /// Apply a buffered move whose window elapsed. Returns `false` once the session ended.
    fn poll(&mut self, now_ms: u64) -> bool;
    fn next_deadline(&self) -> Option<u64>;
    fn end_drag(&mut self);
    fn cancel_drag(&mut self);
    fn drag_enabled(&self) -> bool;

    /// Drop hover and selection state without callbacks.
    fn reset(&mut self);
}

/// Result of trying one drag declaration at pointer-down.
enum Start {
    /// A session started with this cursor.
    Started(Option<String>),
    /// The declaration applied but its target picker declined; nothing starts.
    Declined,
    /// The declaration does not apply here; the next one may.
    Skipped,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DragKind {
    Translate,
    Modify(VertexRef),
}

struct Session<I> {
    kind: DragKind,
    key: I,
    feature: FeatureId,
    last: Point,
    throttle: Throttle,
}

/// One layer with its declarations and interaction state.
pub(crate) struct Binding<M: Model, S, C> {
    layer: Layer<M, S>,
    interactions: Interactions<M>,
    popup: Option<LayerPopup<M, C>>,
    hovered: HoverSet<M::Id>,
    hover_items: BTreeMap<M::Id, HitItem<M>>,
    selected: Vec<HitItem<M>>,
    session: Option<Session<M::Id>>,
}

impl<M: Model, S: 'static, C> Binding<M, S, C> {
    pub(crate) fn new(
        layer: Layer<M, S>,
        interactions: Interactions<M>,
        popup: Option<LayerPopup<M, C>>,
    ) -> Self {
        Self {
            layer,
            interactions,
            popup,
            hovered: HoverSet::new(),
            hover_items: BTreeMap::new(),
            selected: Vec::new(),
            session: None,
        }
    }

    fn items(hits: &[LayerHit<M>]) -> Vec<HitItem<M>> {
        hits.iter()
            .filter_map(|hit| match hit {
                LayerHit::Item(item) => Some(item.clone()),
                LayerHit::Cluster(_) => None,
            })
            .collect()
    }

    fn popup_items(&self, items: &[HitItem<M>], source: PopupSource) -> Vec<PopupItem<C>> {
        let Some(popup) = self.popup.as_ref().filter(|p| p.enabled.is_enabled()) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let content = (popup.build)(item)?;
                let mut entry = PopupItem::new(content)
                    .with_model_id(item.id().to_string())
                    .with_priority(popup.priority)
                    .with_source(source);
                if let Some(key) = &popup.dedup_key {
                    entry = entry.with_dedup_key(key(item));
                }
                Some(entry)
            })
            .collect()
    }

    /// Cursor declared by the first enabled interaction that applies to `hits`.
    fn hover_cursor(&self, hits: &[LayerHit<M>]) -> Option<String> {
        if hits.is_empty() {
            return None;
        }
        let i = &self.interactions;
        if hits.iter().any(|h| matches!(h, LayerHit::Cluster(_))) {
            if let Some(c) = i.cluster.as_ref().filter(|c| c.enabled.is_enabled()) {
                if c.cursor.is_some() {
                    return c.cursor.clone();
                }
            }
        }
        let declared = [
            i.hover.as_ref().map(|d| (&d.enabled, &d.cursor)),
            i.select.as_ref().map(|d| (&d.enabled, &d.cursor)),
            i.click.as_ref().map(|d| (&d.enabled, &d.cursor)),
            i.double_click.as_ref().map(|d| (&d.enabled, &d.cursor)),
            i.modify.as_ref().map(|d| (&d.enabled, &d.cursor)),
            i.translate.as_ref().map(|d| (&d.enabled, &d.cursor)),
        ];
        declared
            .into_iter()
            .flatten()
            .find(|(enabled, cursor)| cursor.is_some() && enabled.is_enabled())
            .and_then(|(_, cursor)| cursor.clone())
    }

    fn update_hover(&mut self, items: Vec<HitItem<M>>) {
        // Ids whose primitive was replaced since the last pass are entered afresh.
        let layer = &self.layer;
        let stale: Vec<M::Id> = self
            .hover_items
            .iter()
            .filter(|(id, item)| layer.resolve_pinned(id, item.feature).is_none())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            self.hover_items.remove(id);
        }
        self.hovered.forget(|id| !stale.contains(id));

        let ids: Vec<M::Id> = items.iter().map(HitItem::id).collect();
        let events = self.hovered.update(&ids);
        if events.is_empty() {
            return;
        }
        let mut left = Vec::new();
        let mut entered = Vec::new();
        for event in events {
            match event {
                HoverEvent::Leave(id) => left.extend(self.hover_items.remove(&id)),
                HoverEvent::Enter(id) => {
                    if let Some(item) = items.iter().find(|i| i.id() == id) {
                        entered.push(item.clone());
                    }
                }
            }
        }
        for item in &items {
            self.hover_items.insert(item.id(), item.clone());
        }

        let Some(hover) = &self.interactions.hover else {
            return;
        };
        if let Some(state) = &hover.state {
            for item in &left {
                self.layer.remove_state_on(item.feature, state);
            }
            for item in &entered {
                self.layer.add_state_on(item.feature, state);
            }
        }
        if !left.is_empty() {
            if let Some(on_leave) = &hover.on_leave {
                on_leave(&left);
            }
        }
        if !entered.is_empty() {
            if let Some(on_enter) = &hover.on_enter {
                on_enter(&entered);
            }
        }
    }

    fn clear_selection(&mut self) {
        let previous = core::mem::take(&mut self.selected);
        let Some(select) = &self.interactions.select else {
            return;
        };
        if let Some(state) = &select.state {
            for item in &previous {
                self.layer.remove_state_on(item.feature, state);
            }
        }
    }

    fn replace_selection(&mut self, items: Vec<HitItem<M>>) {
        let previous = core::mem::replace(&mut self.selected, items);
        let Some(state) = self.interactions.select.as_ref().and_then(|s| s.state.as_ref()) else {
            return;
        };
        for item in &previous {
            if !self.selected.iter().any(|s| s.id() == item.id()) {
                self.layer.remove_state_on(item.feature, state);
            }
        }
        for item in &self.selected {
            self.layer.add_state_on(item.feature, state);
        }
    }

    fn click_cluster(&self, members: &[HitItem<M>]) -> Outcome<C> {
        let mut out = Outcome {
            handled: true,
            stop: true,
            ..Outcome::default()
        };
        if let Some(cluster) = self
            .interactions
            .cluster
            .as_ref()
            .filter(|c| c.enabled.is_enabled())
        {
            if cluster.expand_on_click {
                let map = self.layer.map().clone();
                let mut engine = map.borrow_mut();
                let extent =
                    union_extent(members.iter().filter_map(|m| engine.geometry(m.feature)));
                if let Some(extent) = extent {
                    if extent.width() > 0.0 || extent.height() > 0.0 {
                        engine.fit(extent, &cluster.fit);
                    } else {
                        engine.zoom_by(cluster.zoom_step, Some(extent.center()));
                    }
                }
                drop(engine);
                if let Some(on_expand) = &cluster.on_expand {
                    on_expand(members);
                }
            }
        }
        if let Some(popup) = self.popup.as_ref().filter(|p| p.enabled.is_enabled()) {
            if let Some(content) = popup.cluster.as_ref().and_then(|build| build(members)) {
                out.popups.push(
                    PopupItem::new(content)
                        .with_dedup_key(cluster_key(members))
                        .with_priority(popup.priority)
                        .with_source(PopupSource::Cluster),
                );
            }
        }
        out
    }

    fn drag_decl(&self, kind: DragKind) -> Option<&Drag<M>> {
        match kind {
            DragKind::Translate => self.interactions.translate.as_ref(),
            DragKind::Modify(_) => self.interactions.modify.as_ref(),
        }
    }

    /// Try one drag declaration on `candidates`.
    fn try_start(
        &mut self,
        modify: bool,
        candidates: &[HitItem<M>],
        coordinate: Point,
        tolerance: f64,
    ) -> Start {
        let decl = if modify {
            self.interactions.modify.as_ref()
        } else {
            self.interactions.translate.as_ref()
        };
        let Some(decl) = decl.filter(|d| d.enabled.is_enabled()) else {
            return Start::Skipped;
        };
        let target = match &decl.pick_target {
            Some(pick) => pick(candidates),
            None => candidates.first().cloned(),
        };
        let Some(target) = target else {
            return Start::Declined;
        };
        let kind = if modify {
            let engine = self.layer.map().borrow();
            let reach = tolerance * engine.view().resolution;
            let vertex = engine
                .geometry(target.feature)
                .and_then(|g| g.nearest_vertex(coordinate, reach));
            match vertex {
                Some(vertex) => DragKind::Modify(vertex),
                None => return Start::Skipped,
            }
        } else {
            DragKind::Translate
        };
        if let Some(state) = &decl.state {
            self.layer.add_state_on(target.feature, state);
        }
        let cursor = decl.session_cursor();
        self.session = Some(Session {
            kind,
            key: target.id(),
            feature: target.feature,
            last: coordinate,
            throttle: Throttle::new(decl.move_throttle_ms),
        });
        debug!(
            "layer `{}`: {kind:?} session started on `{}`",
            self.layer.id(),
            target.id()
        );
        if let Some(on_start) = &decl.on_start {
            on_start(&target);
        }
        Start::Started(cursor)
    }

    /// Apply one move to the session. Returns `false` if the session aborted.
    fn apply_move(&mut self, coordinate: Point) -> bool {
        let Some((kind, key, feature, last)) = self
            .session
            .as_ref()
            .map(|s| (s.kind, s.key.clone(), s.feature, s.last))
        else {
            return false;
        };
        let Some(item) = self.layer.resolve_pinned(&key, feature) else {
            self.abort("target is gone");
            return false;
        };
        let live = self.layer.map().borrow().geometry(feature).cloned();
        let Some(mut geometry) = live else {
            self.abort("primitive is gone");
            return false;
        };
        let reason = match kind {
            DragKind::Translate => {
                geometry.translate(coordinate - last);
                MutationReason::Translate
            }
            DragKind::Modify(vertex) => {
                geometry.set_vertex(vertex, coordinate);
                MutationReason::Modify
            }
        };
        // The mutation resyncs the primitive from the next model, so a read-only adapter
        // leaves both where they were.
        let next = self.layer.adapter().apply_geometry(&item.model, &geometry);
        self.layer
            .mutate_with(&key, |_| next, MutateOptions::reason(reason));
        if let Some(session) = &mut self.session {
            session.last = coordinate;
        }
        let current = self.layer.resolve_pinned(&key, feature).unwrap_or(item);
        if let Some(on_change) = self.drag_decl(kind).and_then(|d| d.on_change.as_ref()) {
            on_change(&current);
        }
        true
    }

    /// End the session without callbacks, clearing its state.
    fn abort(&mut self, why: &str) {
        let Some(session) = self.session.take() else {
            return;
        };
        debug!(
            "layer `{}`: session on `{}` aborted, {why}",
            self.layer.id(),
            session.key
        );
        if let Some(state) = self.drag_decl(session.kind).and_then(|d| d.state.as_ref()) {
            self.layer.remove_state_on(session.feature, state);
        }
    }
}

/// Dedup key of a cluster popup: member ids sorted as text, then joined.
pub(crate) fn cluster_key<M: Model>(members: &[HitItem<M>]) -> String {
    let mut ids: Vec<String> = members.iter().map(|m| m.id().to_string()).collect();
    ids.sort();
    let mut key = String::from("cluster:");
    key.push_str(&ids.join(","));
    key
}

impl<M: Model, S: 'static, C> LayerBinding<C> for Binding<M, S, C> {
    fn id(&self) -> &str {
        self.layer.id()
    }

    fn z_index(&self) -> i32 {
        self.layer.z_index()
    }

    fn listeners(&self) -> Listeners {
        let i = &self.interactions;
        let on = |enabled: Option<&Enabled>| enabled.is_some_and(Enabled::is_enabled);
        let mut listeners = Listeners::empty();
        if on(i.hover.as_ref().map(|d| &d.enabled)) || self.has_cursor() {
            listeners |= Listeners::POINTER_MOVE;
        }
        let cluster_popup = self.layer.is_clustered()
            && self
                .popup
                .as_ref()
                .is_some_and(|p| p.cluster.is_some() && p.enabled.is_enabled());
        if on(i.select.as_ref().map(|d| &d.enabled))
            || on(i.click.as_ref().map(|d| &d.enabled))
            || (self.layer.is_clustered() && on(i.cluster.as_ref().map(|d| &d.enabled)))
            || cluster_popup
        {
            listeners |= Listeners::CLICK;
        }
        if on(i.double_click.as_ref().map(|d| &d.enabled)) {
            listeners |= Listeners::DOUBLE_CLICK;
        }
        if on(i.translate.as_ref().map(|d| &d.enabled))
            || on(i.modify.as_ref().map(|d| &d.enabled))
        {
            listeners |= Listeners::DRAG;
        }
        listeners
    }

    fn tolerance(&self, default: f64) -> f64 {
        self.layer.hit_tolerance().unwrap_or(default)
    }

    fn hover(
        &mut self,
        pixel: Point,
        tolerance: f64,
        blocked: bool,
        collect: bool,
    ) -> Outcome<C> {
        let hits = if blocked {
            Vec::new()
        } else {
            self.layer.hits(pixel, self.tolerance(tolerance))
        };
        let items = Self::items(&hits);
        let active = self
            .interactions
            .hover
            .as_ref()
            .is_some_and(|h| h.enabled.is_enabled());
        self.update_hover(if active { items.clone() } else { Vec::new() });

        let mut out = Outcome {
            cursor: self.hover_cursor(&hits),
            ..Outcome::default()
        };
        if active && !items.is_empty() {
            out.handled = true;
            out.stop = self
                .interactions
                .hover
                .as_ref()
                .is_some_and(|h| h.propagation.stops(true));
        }
        if collect {
            out.popups = self.popup_items(&items, PopupSource::Hover);
        }
        out
    }

    fn click(&mut self, pixel: Point, tolerance: f64, collect: bool) -> Outcome<C> {
        let hits = self.layer.hits(pixel, self.tolerance(tolerance));
        if let Some(LayerHit::Cluster(members)) = hits.first() {
            return self.click_cluster(members);
        }
        let items = Self::items(&hits);
        let mut out = Outcome::default();
        let mut skip_click = false;

        let select_on = self
            .interactions
            .select
            .as_ref()
            .is_some_and(|s| s.enabled.is_enabled());
        if select_on {
            if items.is_empty() {
                self.clear_selection();
                let select = self.interactions.select.as_ref();
                if let Some(on_clear) = select.and_then(|s| s.on_clear.as_ref()) {
                    on_clear();
                }
            } else {
                self.replace_selection(items.clone());
                if let Some(select) = &self.interactions.select {
                    let handled = select.on_select.as_ref().is_some_and(|f| f(&items));
                    if handled {
                        out.handled = true;
                        out.stop |= select.propagation.stops(true);
                        skip_click = select.propagation != Propagation::Continue;
                    }
                }
            }
        }

        if !skip_click && !items.is_empty() {
            if let Some(click) = self
                .interactions
                .click
                .as_ref()
                .filter(|c| c.enabled.is_enabled())
            {
                if (click.handler)(&items) {
                    out.handled = true;
                    out.stop |= click.propagation.stops(true);
                }
            }
        }

        if collect {
            out.popups = self.popup_items(&items, PopupSource::Click);
        }
        out
    }

    fn double_click(&mut self, pixel: Point, tolerance: f64) -> Outcome<C> {
        let mut out = Outcome::default();
        let Some(decl) = self
            .interactions
            .double_click
            .as_ref()
            .filter(|d| d.enabled.is_enabled())
        else {
            return out;
        };
        let items = Self::items(&self.layer.hits(pixel, self.tolerance(tolerance)));
        if !items.is_empty() && (decl.handler)(&items) {
            out.handled = true;
            out.stop = decl.propagation.stops(true);
        }
        out
    }

    fn begin_drag(&mut self, pixel: Point, tolerance: f64) -> Option<Option<String>> {
        if self.session.is_some() {
            return None;
        }
        if self.interactions.translate.is_none() && self.interactions.modify.is_none() {
            return None;
        }
        let tolerance = self.tolerance(tolerance);
        let candidates = Self::items(&self.layer.hits(pixel, tolerance));
        if candidates.is_empty() {
            return None;
        }
        let coordinate = self.layer.map().borrow().pixel_to_coordinate(pixel);
        match self.try_start(true, &candidates, coordinate, tolerance) {
            Start::Started(cursor) => return Some(cursor),
            Start::Declined => return None,
            Start::Skipped => {}
        }
        match self.try_start(false, &candidates, coordinate, tolerance) {
            Start::Started(cursor) => Some(cursor),
            Start::Declined | Start::Skipped => None,
        }
    }

    fn drag_to(&mut self, pixel: Point, now_ms: u64) -> bool {
        let coordinate = self.layer.map().borrow().pixel_to_coordinate(pixel);
        let Some(session) = &mut self.session else {
            return false;
        };
        match session.throttle.offer(coordinate, now_ms) {
            Some(position) => self.apply_move(position),
            None => true,
        }
    }

    fn poll(&mut self, now_ms: u64) -> bool {
        let Some(session) = &mut self.session else {
            return false;
        };
        match session.throttle.due(now_ms) {
            Some(position) => self.apply_move(position),
            None => true,
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        self.session.as_ref()?.throttle.deadline()
    }

    fn end_drag(&mut self) {
        let pending = self
            .session
            .as_mut()
            .and_then(|s| s.throttle.take_pending());
        if let Some(position) = pending {
            if !self.apply_move(position) {
                return;
            }
        }
        let Some(session) = self.session.take() else {
            return;
        };
        let resolved = self.layer.resolve_pinned(&session.key, session.feature);
        let decl = self.drag_decl(session.kind);
        if let Some(state) = decl.and_then(|d| d.state.as_ref()) {
            self.layer.remove_state_on(session.feature, state);
        }
        debug!(
            "layer `{}`: session on `{}` ended",
            self.layer.id(),
            session.key
        );
        if let (Some(item), Some(on_end)) = (resolved, decl.and_then(|d| d.on_end.as_ref())) {
            on_end(&item);
        }
    }

    fn cancel_drag(&mut self) {
        self.abort("cancelled");
    }

    fn drag_enabled(&self) -> bool {
        self.session
            .as_ref()
            .and_then(|s| self.drag_decl(s.kind))
            .is_some_and(|d| d.enabled.is_enabled())
    }

    fn reset(&mut self) {
        self.hovered = HoverSet::new();
        self.hover_items.clear();
        self.selected.clear();
    }
}

impl<M: Model, S: 'static, C> Binding<M, S, C> {
    fn has_cursor(&self) -> bool {
        let i = &self.interactions;
        i.hover.as_ref().is_some_and(|d| d.cursor.is_some())
            || i.select.as_ref().is_some_and(|d| d.cursor.is_some())
            || i.click.as_ref().is_some_and(|d| d.cursor.is_some())
            || i.double_click.as_ref().is_some_and(|d| d.cursor.is_some())
            || i.translate.as_ref().is_some_and(|d| d.cursor.is_some())
            || i.modify.as_ref().is_some_and(|d| d.cursor.is_some())
            || i.cluster.as_ref().is_some_and(|d| d.cursor.is_some())
    }
}
