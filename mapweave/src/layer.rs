// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The layer runtime: one layer's models, primitives, styles and public API.
//!
//! A [`Layer`] owns an ordered collection of models and keeps exactly one engine primitive
//! per model. Primitives are keyed by model id: replacing a model with a new value under
//! the same id updates the existing primitive in place, so its [`FeatureId`] never changes.
//!
//! All changes apply immediately to the collection and registry. Repaints go through the
//! flush scheduler under the key `layer:<id>`, so any number of changes between two
//! flushes costs one render request.

use alloc::boxed::Box;
use alloc::collections::BTreeSet;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use kurbo::Point;
use log::{debug, warn};
use mapweave_engine::{
    ClusterSettings, Engine, EngineLayerId, FeatureId, FitOptions, Geometry, MapHandle, Pick,
    View, union_extent,
};
use mapweave_schedule::FlushScheduler;

use crate::error::Error;
use crate::events::{
    CollectionReason, Emitter, ModelChange, ModelsCollectionEvent, MutationReason, Subscription,
};
use crate::model::{HitItem, Model};
use crate::registry::Registry;
use crate::state::FeatureStates;
use crate::style::ResolveStyle;

/// Converts models to engine geometry and back.
///
/// Any `Fn(&M) -> Geometry` closure is a read-only adapter.
pub trait GeometryAdapter<M> {
    /// Geometry drawn for `model`.
    fn to_geometry(&self, model: &M) -> Geometry;

    /// The model after its primitive was moved or edited to `geometry`.
    ///
    /// Returning `model` itself means the edit does not change the model. That is the
    /// default, which makes a layer read-only for translate and modify interactions.
    fn apply_geometry(&self, model: &Rc<M>, geometry: &Geometry) -> Rc<M> {
        let _ = geometry;
        Rc::clone(model)
    }
}

impl<M, F: Fn(&M) -> Geometry> GeometryAdapter<M> for F {
    fn to_geometry(&self, model: &M) -> Geometry {
        self(model)
    }
}

/// Options for [`Layer::mutate_with`] and [`Layer::mutate_many`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MutateOptions {
    /// Reason reported to change listeners.
    pub reason: MutationReason,
    /// Apply the change without notifying change listeners.
    pub silent: bool,
}

impl Default for MutateOptions {
    fn default() -> Self {
        Self {
            reason: MutationReason::Update,
            silent: false,
        }
    }
}

impl MutateOptions {
    /// Non-silent options with `reason`.
    pub fn reason(reason: MutationReason) -> Self {
        Self {
            reason,
            silent: false,
        }
    }
}

/// A hit on one layer, before routing.
pub(crate) enum LayerHit<M> {
    Item(HitItem<M>),
    /// A rendered cluster of two or more members.
    Cluster(Vec<HitItem<M>>),
}

type ClusterStyleFn<M, S> = Box<dyn Fn(&[Rc<M>], &View) -> Vec<S>>;

pub(crate) struct LayerConfig<M, S> {
    pub(crate) id: String,
    pub(crate) z_index: i32,
    pub(crate) visible: bool,
    pub(crate) opacity: f64,
    pub(crate) adapter: Box<dyn GeometryAdapter<M>>,
    pub(crate) style: Option<Box<dyn ResolveStyle<M, S>>>,
    pub(crate) cluster_style: Option<ClusterStyleFn<M, S>>,
    pub(crate) clustering: Option<ClusterSettings>,
    pub(crate) clustering_enabled: bool,
    pub(crate) hit_tolerance: Option<f64>,
}

struct Contents<M: Model> {
    models: Rc<[Rc<M>]>,
    registry: Registry<M>,
    states: FeatureStates,
}

struct Inner<M: Model, S> {
    id: String,
    map: MapHandle<dyn Engine>,
    engine_layer: EngineLayerId,
    scheduler: Rc<FlushScheduler>,
    adapter: Box<dyn GeometryAdapter<M>>,
    style: Option<Box<dyn ResolveStyle<M, S>>>,
    cluster_style: Option<ClusterStyleFn<M, S>>,
    clustering: Option<ClusterSettings>,
    hit_tolerance: Option<f64>,
    contents: RefCell<Contents<M>>,
    visible: Cell<bool>,
    opacity: Cell<f64>,
    z_index: Cell<i32>,
    clustering_enabled: Cell<bool>,
    changed: Emitter<[ModelChange<M>]>,
    collection_changed: Emitter<ModelsCollectionEvent<M>>,
}

/// Handle to one layer. Clones share the same layer.
pub struct Layer<M: Model, S = ()> {
    inner: Rc<Inner<M, S>>,
}

impl<M: Model, S> Clone for Layer<M, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M: Model, S> fmt::Debug for Layer<M, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.inner.id)
            .field("engine_layer", &self.inner.engine_layer)
            .field("models", &self.inner.contents.borrow().models.len())
            .field("visible", &self.inner.visible.get())
            .field("z_index", &self.inner.z_index.get())
            .finish_non_exhaustive()
    }
}

impl<M: Model, S: 'static> Layer<M, S> {
    pub(crate) fn new(
        config: LayerConfig<M, S>,
        map: MapHandle<dyn Engine>,
        scheduler: Rc<FlushScheduler>,
    ) -> Self {
        let engine_layer = {
            let mut engine = map.borrow_mut();
            let layer = engine.create_layer(config.z_index);
            engine.set_layer_visible(layer, config.visible);
            engine.set_layer_opacity(layer, config.opacity);
            let enabled = config.clustering_enabled && config.clustering.is_some();
            engine.set_layer_clustering(layer, config.clustering.as_ref().filter(|_| enabled));
            layer
        };
        debug!("layer `{}` created as {engine_layer:?}", config.id);
        Self {
            inner: Rc::new(Inner {
                id: config.id,
                map,
                engine_layer,
                scheduler,
                adapter: config.adapter,
                style: config.style,
                cluster_style: config.cluster_style,
                hit_tolerance: config.hit_tolerance,
                contents: RefCell::new(Contents {
                    models: Rc::from(Vec::new()),
                    registry: Registry::new(),
                    states: FeatureStates::default(),
                }),
                visible: Cell::new(config.visible),
                opacity: Cell::new(config.opacity),
                z_index: Cell::new(config.z_index),
                clustering_enabled: Cell::new(
                    config.clustering_enabled && config.clustering.is_some(),
                ),
                clustering: config.clustering,
                changed: Emitter::new(),
                collection_changed: Emitter::new(),
            }),
        }
    }

    /// Layer id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The engine layer this layer draws into.
    pub fn engine_layer(&self) -> EngineLayerId {
        self.inner.engine_layer
    }

    /// Per-layer hit tolerance in pixels, if overridden.
    pub fn hit_tolerance(&self) -> Option<f64> {
        self.inner.hit_tolerance
    }

    fn duplicate(&self, id: &M::Id) -> Error {
        Error::DuplicateId {
            id: id.to_string(),
            layer: self.inner.id.clone(),
        }
    }

    // --- Collection ---------------------------------------------------------------------

    /// Replace the collection with `models`, in order.
    ///
    /// Ids present before and after keep their primitive; new ids get a new primitive and
    /// ids no longer present lose theirs. Fails without any change if two of `models`
    /// share an id.
    pub fn set_models(&self, models: impl IntoIterator<Item = Rc<M>>) -> Result<(), Error> {
        let models: Vec<Rc<M>> = models.into_iter().collect();
        let mut seen = BTreeSet::new();
        for m in &models {
            let id = m.id();
            if seen.contains(&id) {
                return Err(self.duplicate(&id));
            }
            seen.insert(id);
        }

        let (prev, next, added, removed) = {
            let mut contents = self.inner.contents.borrow_mut();
            let mut engine = self.inner.map.borrow_mut();
            let prev = Rc::clone(&contents.models);
            let mut removed = Vec::new();
            for old in prev.iter() {
                let id = old.id();
                if !seen.contains(&id) {
                    if let Some(feature) = contents.registry.remove(&id) {
                        engine.remove_feature(feature);
                        contents.states.clear(feature);
                    }
                    removed.push(Rc::clone(old));
                }
            }
            let mut added = Vec::new();
            for m in &models {
                let id = m.id();
                let geometry = self.inner.adapter.to_geometry(m);
                if let Some(feature) = contents.registry.feature(&id) {
                    engine.set_geometry(feature, geometry);
                    contents.registry.update_model(&id, Rc::clone(m));
                } else {
                    let feature = engine.create_feature(self.inner.engine_layer, geometry);
                    contents.registry.set(id, Rc::clone(m), feature);
                    added.push(Rc::clone(m));
                }
            }
            let next: Rc<[Rc<M>]> = Rc::from(models);
            contents.models = Rc::clone(&next);
            (prev, next, added, removed)
        };

        self.invalidate();
        self.inner.collection_changed.emit(&ModelsCollectionEvent {
            prev,
            next,
            reason: CollectionReason::Set,
            added,
            removed,
        });
        Ok(())
    }

    /// Append one model. Fails if its id is already present.
    pub fn add_model(&self, model: Rc<M>) -> Result<(), Error> {
        self.add_models([model])
    }

    /// Append `models`. Fails without any change if an id is already present or repeated.
    pub fn add_models(&self, models: impl IntoIterator<Item = Rc<M>>) -> Result<(), Error> {
        let models: Vec<Rc<M>> = models.into_iter().collect();
        if models.is_empty() {
            return Ok(());
        }
        {
            let contents = self.inner.contents.borrow();
            let mut seen = BTreeSet::new();
            for m in &models {
                let id = m.id();
                if contents.registry.contains(&id) || seen.contains(&id) {
                    return Err(self.duplicate(&id));
                }
                seen.insert(id);
            }
        }

        let (prev, next) = {
            let mut contents = self.inner.contents.borrow_mut();
            let mut engine = self.inner.map.borrow_mut();
            for m in &models {
                let geometry = self.inner.adapter.to_geometry(m);
                let feature = engine.create_feature(self.inner.engine_layer, geometry);
                contents.registry.set(m.id(), Rc::clone(m), feature);
            }
            let prev = Rc::clone(&contents.models);
            let next: Rc<[Rc<M>]> = prev.iter().chain(models.iter()).cloned().collect();
            contents.models = Rc::clone(&next);
            (prev, next)
        };

        self.invalidate();
        self.inner.collection_changed.emit(&ModelsCollectionEvent {
            prev,
            next,
            reason: CollectionReason::Add,
            added: models,
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Remove the models with the given ids. Unknown ids are ignored. Returns how many
    /// were removed.
    pub fn remove_models_by_id<'a>(&self, ids: impl IntoIterator<Item = &'a M::Id>) -> usize {
        let targets: BTreeSet<&M::Id> = ids.into_iter().collect();
        self.remove_where(CollectionReason::Remove, |id| targets.contains(id))
    }

    /// Remove every model.
    pub fn clear(&self) {
        self.remove_where(CollectionReason::Clear, |_| true);
    }

    fn remove_where(&self, reason: CollectionReason, matches: impl Fn(&M::Id) -> bool) -> usize {
        let (prev, next, removed) = {
            let mut contents = self.inner.contents.borrow_mut();
            let prev = Rc::clone(&contents.models);
            let (removed, kept): (Vec<Rc<M>>, Vec<Rc<M>>) =
                prev.iter().cloned().partition(|m| matches(&m.id()));
            if removed.is_empty() {
                return 0;
            }
            let mut engine = self.inner.map.borrow_mut();
            for m in &removed {
                if let Some(feature) = contents.registry.remove(&m.id()) {
                    engine.remove_feature(feature);
                    contents.states.clear(feature);
                }
            }
            let next: Rc<[Rc<M>]> = Rc::from(kept);
            contents.models = Rc::clone(&next);
            (prev, next, removed)
        };
        let count = removed.len();
        self.invalidate();
        self.inner.collection_changed.emit(&ModelsCollectionEvent {
            prev,
            next,
            reason,
            added: Vec::new(),
            removed,
        });
        count
    }

    // --- Mutation -----------------------------------------------------------------------

    /// Replace the model `id` with `f(current)`. See [`mutate_with`](Self::mutate_with).
    pub fn mutate(&self, id: &M::Id, f: impl FnOnce(&Rc<M>) -> Rc<M>) -> bool {
        self.mutate_with(id, f, MutateOptions::default())
    }

    /// Replace the model `id` with `f(current)`.
    ///
    /// Nothing happens when `id` is unknown or when `f` hands back the same `Rc`.
    /// Otherwise the registry and collection are updated in place, the primitive's
    /// geometry is resynchronized, a repaint is scheduled and, unless silent, listeners
    /// receive a one-element change batch. The new model must keep the same id.
    ///
    /// Returns whether the model was replaced.
    pub fn mutate_with(
        &self,
        id: &M::Id,
        f: impl FnOnce(&Rc<M>) -> Rc<M>,
        options: MutateOptions,
    ) -> bool {
        let Some(change) = self.apply_mutation(id, f, options.reason) else {
            return false;
        };
        self.invalidate();
        if !options.silent {
            self.inner.changed.emit(&[change]);
        }
        true
    }

    /// Apply `f` to each of `ids`, then notify listeners once with every change.
    ///
    /// Returns how many models were replaced.
    pub fn mutate_many<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a M::Id>,
        mut f: impl FnMut(&Rc<M>) -> Rc<M>,
        options: MutateOptions,
    ) -> usize {
        let changes: Vec<ModelChange<M>> = ids
            .into_iter()
            .filter_map(|id| self.apply_mutation(id, &mut f, options.reason))
            .collect();
        if changes.is_empty() {
            return 0;
        }
        self.invalidate();
        if !options.silent {
            self.inner.changed.emit(&changes);
        }
        changes.len()
    }

    fn apply_mutation(
        &self,
        id: &M::Id,
        f: impl FnOnce(&Rc<M>) -> Rc<M>,
        reason: MutationReason,
    ) -> Option<ModelChange<M>> {
        // The update function is application code; no borrow is held while it runs.
        let prev = self.model_by_id(id)?;
        let next = f(&prev);
        if Rc::ptr_eq(&prev, &next) {
            return None;
        }
        if next.id() != *id {
            warn!(
                "layer `{}`: mutation of `{id}` produced id `{}`, ignored",
                self.inner.id,
                next.id()
            );
            return None;
        }
        let geometry = self.inner.adapter.to_geometry(&next);
        let mut contents = self.inner.contents.borrow_mut();
        contents.registry.update_model(id, Rc::clone(&next));
        let models: Rc<[Rc<M>]> = contents
            .models
            .iter()
            .map(|m| {
                if Rc::ptr_eq(m, &prev) {
                    Rc::clone(&next)
                } else {
                    Rc::clone(m)
                }
            })
            .collect();
        contents.models = models;
        if let Some(feature) = contents.registry.feature(id) {
            self.inner.map.borrow_mut().set_geometry(feature, geometry);
        }
        Some(ModelChange { prev, next, reason })
    }

    /// Schedule a repaint of this layer.
    pub fn invalidate(&self) {
        let map = self.inner.map.clone();
        let layer = self.inner.engine_layer;
        self.inner
            .scheduler
            .schedule(format!("layer:{}", self.inner.id), move || {
                map.borrow_mut().request_render(layer);
            });
    }

    // --- Queries ------------------------------------------------------------------------

    /// The model with `id`.
    pub fn model_by_id(&self, id: &M::Id) -> Option<Rc<M>> {
        self.inner.contents.borrow().registry.model(id).cloned()
    }

    /// Whether a model with `id` is present.
    pub fn has_model(&self, id: &M::Id) -> bool {
        self.inner.contents.borrow().registry.contains(id)
    }

    /// Snapshot of the collection, in order.
    pub fn all_models(&self) -> Rc<[Rc<M>]> {
        Rc::clone(&self.inner.contents.borrow().models)
    }

    /// Ids of the collection, in order.
    pub fn all_model_ids(&self) -> Vec<M::Id> {
        self.inner
            .contents
            .borrow()
            .models
            .iter()
            .map(|m| m.id())
            .collect()
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.inner.contents.borrow().models.len()
    }

    /// Whether the layer presents no models.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Primitive bound to `id`.
    pub fn feature_of(&self, id: &M::Id) -> Option<FeatureId> {
        self.inner.contents.borrow().registry.feature(id)
    }

    /// Model bound to `feature`.
    pub fn model_by_feature(&self, feature: FeatureId) -> Option<Rc<M>> {
        self.inner
            .contents
            .borrow()
            .registry
            .model_by_feature(feature)
            .cloned()
    }

    /// Current geometry of the primitive bound to `id`, read from the engine.
    pub fn geometry_of(&self, id: &M::Id) -> Option<Geometry> {
        let feature = self.feature_of(id)?;
        self.inner.map.borrow().geometry(feature).cloned()
    }

    // --- Subscriptions ------------------------------------------------------------------

    /// Listen for model replacements.
    pub fn on_models_changed(&self, f: impl Fn(&[ModelChange<M>]) + 'static) -> Subscription {
        self.inner.changed.subscribe(f)
    }

    /// Listen for collection changes.
    pub fn on_models_collection_changed(
        &self,
        f: impl Fn(&ModelsCollectionEvent<M>) + 'static,
    ) -> Subscription {
        self.inner.collection_changed.subscribe(f)
    }

    // --- View ---------------------------------------------------------------------------

    /// Fit the view to every model. Returns `false` when there is nothing to fit.
    pub fn center_on_all_models(&self, options: &FitOptions) -> bool {
        let features: Vec<FeatureId> = {
            let contents = self.inner.contents.borrow();
            contents
                .models
                .iter()
                .filter_map(|m| contents.registry.feature(&m.id()))
                .collect()
        };
        self.fit_features(&features, options)
    }

    /// Fit the view to the model `id`. Returns `false` if it is unknown.
    pub fn center_on_model(&self, id: &M::Id, options: &FitOptions) -> bool {
        self.center_on_models([id], options)
    }

    /// Fit the view to the given models. Unknown ids are skipped.
    pub fn center_on_models<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a M::Id>,
        options: &FitOptions,
    ) -> bool {
        let features: Vec<FeatureId> = {
            let contents = self.inner.contents.borrow();
            ids.into_iter()
                .filter_map(|id| contents.registry.feature(id))
                .collect()
        };
        self.fit_features(&features, options)
    }

    fn fit_features(&self, features: &[FeatureId], options: &FitOptions) -> bool {
        let mut engine = self.inner.map.borrow_mut();
        let extent = union_extent(features.iter().filter_map(|f| engine.geometry(*f)));
        match extent {
            Some(extent) => {
                engine.fit(extent, options);
                true
            }
            None => false,
        }
    }

    // --- Presentation -------------------------------------------------------------------

    /// Show or hide the layer. Hidden layers are skipped by hit testing.
    pub fn set_visible(&self, visible: bool) {
        self.inner.visible.set(visible);
        self.inner
            .map
            .borrow_mut()
            .set_layer_visible(self.inner.engine_layer, visible);
    }

    /// Whether the layer is shown.
    pub fn is_visible(&self) -> bool {
        self.inner.visible.get()
    }

    /// Set the opacity, clamped to `0.0..=1.0`.
    pub fn set_opacity(&self, opacity: f64) {
        let opacity = opacity.clamp(0.0, 1.0);
        self.inner.opacity.set(opacity);
        self.inner
            .map
            .borrow_mut()
            .set_layer_opacity(self.inner.engine_layer, opacity);
    }

    /// Current opacity.
    pub fn opacity(&self) -> f64 {
        self.inner.opacity.get()
    }

    /// Set the stacking order. Higher layers are drawn and hit-tested first.
    pub fn set_z_index(&self, z_index: i32) {
        self.inner.z_index.set(z_index);
        self.inner
            .map
            .borrow_mut()
            .set_layer_z_index(self.inner.engine_layer, z_index);
    }

    /// Current stacking order.
    pub fn z_index(&self) -> i32 {
        self.inner.z_index.get()
    }

    // --- Feature state ------------------------------------------------------------------

    /// Replace the states of each model in `ids` with `states`.
    pub fn set_feature_states<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a M::Id>,
        states: &[&str],
    ) {
        let changed = {
            let mut contents = self.inner.contents.borrow_mut();
            let features: Vec<FeatureId> = ids
                .into_iter()
                .filter_map(|id| contents.registry.feature(id))
                .collect();
            for feature in &features {
                contents.states.set(*feature, states);
            }
            !features.is_empty()
        };
        if changed {
            self.invalidate();
        }
    }

    /// Remove every state from every model.
    pub fn clear_feature_states(&self) {
        if self.inner.contents.borrow_mut().states.clear_all() {
            self.invalidate();
        }
    }

    /// Activate `state` on the model `id`. Returns whether it changed.
    pub fn add_feature_state(&self, id: &M::Id, state: &str) -> bool {
        self.feature_of(id)
            .is_some_and(|f| self.add_state_on(f, state))
    }

    /// Deactivate `state` on the model `id`. Returns whether it changed.
    pub fn remove_feature_state(&self, id: &M::Id, state: &str) -> bool {
        self.feature_of(id)
            .is_some_and(|f| self.remove_state_on(f, state))
    }

    /// Active states of the model `id`, in activation order.
    pub fn feature_states(&self, id: &M::Id) -> Vec<String> {
        let contents = self.inner.contents.borrow();
        contents
            .registry
            .feature(id)
            .map(|f| contents.states.get(f).to_vec())
            .unwrap_or_default()
    }

    pub(crate) fn add_state_on(&self, feature: FeatureId, state: &str) -> bool {
        let changed = self.inner.contents.borrow_mut().states.add(feature, state);
        if changed {
            self.invalidate();
        }
        changed
    }

    pub(crate) fn remove_state_on(&self, feature: FeatureId, state: &str) -> bool {
        let changed = self
            .inner
            .contents
            .borrow_mut()
            .states
            .remove(feature, state);
        if changed {
            self.invalidate();
        }
        changed
    }

    // --- Clustering ---------------------------------------------------------------------

    /// Whether this layer was declared with clustering settings.
    pub fn is_clustered(&self) -> bool {
        self.inner.clustering.is_some()
    }

    /// Switch between the cluster source and the plain source.
    ///
    /// Repeating the current value does nothing. An actual switch clears every feature
    /// state and schedules one repaint. Returns whether the source changed; always `false`
    /// on layers without clustering settings.
    pub fn set_clustering_enabled(&self, enabled: bool) -> bool {
        let Some(settings) = self.inner.clustering else {
            return false;
        };
        if self.inner.clustering_enabled.get() == enabled {
            return false;
        }
        self.inner.clustering_enabled.set(enabled);
        self.inner.contents.borrow_mut().states.clear_all();
        self.inner
            .map
            .borrow_mut()
            .set_layer_clustering(self.inner.engine_layer, enabled.then_some(&settings));
        debug!(
            "layer `{}`: clustering {}",
            self.inner.id,
            if enabled { "enabled" } else { "disabled" }
        );
        self.invalidate();
        true
    }

    /// Whether the layer currently renders from its cluster source.
    pub fn is_clustering_enabled(&self) -> bool {
        self.inner.clustering_enabled.get()
    }

    // --- Styles -------------------------------------------------------------------------

    /// Styles to draw `pick` with, resolved against the current view.
    ///
    /// Features and single-member clusters go through the layer's style with their active
    /// states; larger clusters go through the cluster style only.
    pub fn resolve_styles(&self, pick: &Pick) -> Rc<[S]> {
        let view = self.inner.map.borrow().view();
        match pick {
            Pick::Feature(feature) => self.feature_styles(*feature, &view),
            Pick::Cluster(members) if members.len() == 1 => {
                self.feature_styles(members[0], &view)
            }
            Pick::Cluster(members) => {
                let Some(cluster_style) = &self.inner.cluster_style else {
                    return Rc::from(Vec::new());
                };
                let models: Vec<Rc<M>> = {
                    let contents = self.inner.contents.borrow();
                    members
                        .iter()
                        .filter_map(|f| contents.registry.model_by_feature(*f).cloned())
                        .collect()
                };
                Rc::from(cluster_style(&models, &view))
            }
        }
    }

    /// Styles of the model `id`.
    pub fn style_of(&self, id: &M::Id) -> Option<Rc<[S]>> {
        let feature = self.feature_of(id)?;
        Some(self.resolve_styles(&Pick::Feature(feature)))
    }

    fn feature_styles(&self, feature: FeatureId, view: &View) -> Rc<[S]> {
        let (model, states) = {
            let contents = self.inner.contents.borrow();
            let Some(model) = contents.registry.model_by_feature(feature).cloned() else {
                return Rc::from(Vec::new());
            };
            (model, contents.states.get(feature).to_vec())
        };
        match &self.inner.style {
            Some(style) => style.resolve(&model, &states, view),
            None => Rc::from(Vec::new()),
        }
    }

    /// Drop every cached style render.
    pub fn clear_style_cache(&self) {
        if let Some(style) = &self.inner.style {
            style.clear_cache();
        }
    }

    // --- Runtime internals --------------------------------------------------------------

    /// Hits at `pixel`, topmost first. Single-member clusters are unwrapped; picks whose
    /// primitives are no longer registered are dropped.
    pub(crate) fn hits(&self, pixel: Point, tolerance: f64) -> Vec<LayerHit<M>> {
        if !self.is_visible() {
            return Vec::new();
        }
        let picks = self
            .inner
            .map
            .borrow()
            .hit_test(self.inner.engine_layer, pixel, tolerance);
        let contents = self.inner.contents.borrow();
        let item = |feature: FeatureId| {
            contents
                .registry
                .model_by_feature(feature)
                .map(|model| HitItem {
                    model: Rc::clone(model),
                    feature,
                })
        };
        picks
            .iter()
            .filter_map(|pick| match pick {
                Pick::Feature(f) => item(*f).map(LayerHit::Item),
                Pick::Cluster(members) => {
                    let items: Vec<HitItem<M>> = members.iter().filter_map(|f| item(*f)).collect();
                    match items.len() {
                        0 => None,
                        1 => items.into_iter().next().map(LayerHit::Item),
                        _ => Some(LayerHit::Cluster(items)),
                    }
                }
            })
            .collect()
    }

    /// The model `id` if it is still bound to `feature`.
    pub(crate) fn resolve_pinned(&self, id: &M::Id, feature: FeatureId) -> Option<HitItem<M>> {
        let contents = self.inner.contents.borrow();
        if contents.registry.feature(id)? != feature {
            return None;
        }
        let model = Rc::clone(contents.registry.model(id)?);
        Some(HitItem { model, feature })
    }

    pub(crate) fn map(&self) -> &MapHandle<dyn Engine> {
        &self.inner.map
    }

    pub(crate) fn adapter(&self) -> &dyn GeometryAdapter<M> {
        &*self.inner.adapter
    }

    /// Remove the engine layer and every primitive. The handle stays usable but empty.
    pub(crate) fn dispose(&self) {
        {
            let mut contents = self.inner.contents.borrow_mut();
            contents.models = Rc::from(Vec::new());
            contents.registry = Registry::new();
            contents.states.clear_all();
        }
        self.inner.scheduler.cancel(&format!("layer:{}", self.inner.id));
        self.inner
            .map
            .borrow_mut()
            .remove_layer(self.inner.engine_layer);
        debug!("layer `{}` disposed", self.inner.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use core::cell::Cell;

    use kurbo::Rect;
    use mapweave_schedule::FlushPolicy;

    use crate::fixtures::{Harness, PoiAdapter, log, poi, poi_layer, record};
    use crate::{LayerSpec, Style};

    fn ids_of(models: &[Rc<crate::fixtures::Poi>]) -> String {
        models
            .iter()
            .map(|m| m.id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    #[test]
    fn duplicate_ids_leave_everything_untouched() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois"));
        layer.set_models([poi(1, 0.0, 0.0), poi(2, 10.0, 0.0)]).unwrap();
        let events = log();
        let sink = events.clone();
        let _sub =
            layer.on_models_collection_changed(move |e| record(&sink, format!("{:?}", e.reason)));

        let err = layer
            .set_models([poi(3, 0.0, 0.0), poi(4, 0.0, 0.0), poi(3, 5.0, 5.0)])
            .unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateId {
                id: "3".into(),
                layer: "pois".into()
            }
        );
        assert!(layer.add_model(poi(2, 0.0, 0.0)).is_err());
        assert!(layer.add_models([poi(5, 0.0, 0.0), poi(5, 1.0, 1.0)]).is_err());

        assert_eq!(layer.all_model_ids(), [1, 2]);
        assert_eq!(h.engine().layer_features(layer.engine_layer()).len(), 2);
        assert!(!layer.has_model(&3));
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn identity_mutation_is_a_no_op() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois"));
        layer.set_models([poi(1, 0.0, 0.0)]).unwrap();
        h.flush();
        let changes = log();
        let sink = changes.clone();
        let _sub = layer.on_models_changed(move |c| record(&sink, format!("{}", c.len())));

        assert!(!layer.mutate(&1, Rc::clone));
        assert!(!layer.mutate(&9, |_| poi(9, 1.0, 1.0)));
        assert!(h.manager.scheduler().is_empty());
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn mutation_replaces_in_place_and_resyncs_geometry() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois"));
        layer
            .set_models([poi(1, 0.0, 0.0), poi(2, 10.0, 0.0), poi(3, 20.0, 0.0)])
            .unwrap();
        h.flush();
        let feature = layer.feature_of(&2);
        let changes = log();
        let sink = changes.clone();
        let _sub = layer.on_models_changed(move |batch| {
            for c in batch {
                record(&sink, format!("{:?}:{}->{}", c.reason, c.prev.at.x, c.next.at.x));
            }
        });

        assert!(layer.mutate(&2, |m| poi(m.id, 50.0, 0.0)));
        assert_eq!(layer.all_model_ids(), [1, 2, 3]);
        assert_eq!(layer.feature_of(&2), feature);
        assert_eq!(
            layer.geometry_of(&2),
            Some(Geometry::Point(Point::new(50.0, 0.0)))
        );
        assert_eq!(*changes.borrow(), ["Update:10->50"]);
        assert!(h.manager.scheduler().is_scheduled("layer:pois"));

        // An id change is refused.
        assert!(!layer.mutate(&3, |_| poi(4, 0.0, 0.0)));
        assert!(layer.has_model(&3));
    }

    #[test]
    fn mutate_many_notifies_once() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois"));
        layer.set_models([poi(1, 0.0, 0.0), poi(2, 10.0, 0.0)]).unwrap();
        let batches = log();
        let sink = batches.clone();
        let _sub = layer.on_models_changed(move |batch| {
            let reasons: Vec<String> = batch.iter().map(|c| format!("{:?}", c.reason)).collect();
            record(&sink, reasons.join("+"));
        });

        let nudge = MutateOptions::reason(MutationReason::Custom("nudge"));
        let n = layer.mutate_many([&1, &2, &9], |m| poi(m.id, m.at.x + 1.0, 0.0), nudge);
        assert_eq!(n, 2);
        assert_eq!(*batches.borrow(), [r#"Custom("nudge")+Custom("nudge")"#]);

        let silent = MutateOptions {
            silent: true,
            ..MutateOptions::default()
        };
        assert!(layer.mutate_with(&1, |m| poi(m.id, 0.0, 7.0), silent));
        assert_eq!(batches.borrow().len(), 1);
        assert_eq!(layer.model_by_id(&1).map(|m| m.at.y), Some(7.0));
    }

    #[test]
    fn persisting_ids_keep_their_primitive() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois"));
        layer.set_models([poi(1, 0.0, 0.0), poi(2, 10.0, 0.0)]).unwrap();
        let f1 = layer.feature_of(&1).unwrap();
        let f2 = layer.feature_of(&2).unwrap();
        let events = log();
        let sink = events.clone();
        let _sub = layer.on_models_collection_changed(move |e| {
            record(
                &sink,
                format!("{:?} +{} -{}", e.reason, ids_of(&e.added), ids_of(&e.removed)),
            );
        });

        layer.set_models([poi(2, 5.0, 5.0), poi(3, 30.0, 0.0)]).unwrap();
        assert_eq!(layer.feature_of(&2), Some(f2));
        assert!(!h.engine().is_alive(f1));
        assert_eq!(layer.model_by_feature(f2).map(|m| m.at), Some(Point::new(5.0, 5.0)));
        assert_eq!(
            layer.geometry_of(&2),
            Some(Geometry::Point(Point::new(5.0, 5.0)))
        );
        assert_eq!(*events.borrow(), ["Set +3 -1"]);
    }

    #[test]
    fn removals_notify_only_on_change() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois"));
        layer
            .set_models([poi(1, 0.0, 0.0), poi(2, 10.0, 0.0), poi(3, 20.0, 0.0)])
            .unwrap();
        let before = layer.all_models();
        let events = log();
        let sink = events.clone();
        let _sub = layer.on_models_collection_changed(move |e| {
            record(&sink, format!("{:?} -{}", e.reason, ids_of(&e.removed)));
        });

        assert_eq!(layer.remove_models_by_id([&9]), 0);
        assert_eq!(layer.remove_models_by_id([&1, &3]), 2);
        assert_eq!(layer.all_model_ids(), [2]);
        layer.add_model(poi(4, 40.0, 0.0)).unwrap();
        layer.clear();
        layer.clear();

        assert_eq!(*events.borrow(), ["Remove -1,3", "Add -", "Clear -2,4"]);
        assert!(layer.is_empty());
        assert!(h.engine().layer_features(layer.engine_layer()).is_empty());
        // Earlier snapshots are unaffected.
        assert_eq!(ids_of(&before), "1,2,3");
    }

    #[test]
    fn changes_between_flushes_cost_one_render() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois"));
        layer.set_models([poi(1, 0.0, 0.0)]).unwrap();
        layer.mutate(&1, |m| poi(m.id, 1.0, 1.0));
        layer.add_model(poi(2, 5.0, 5.0)).unwrap();
        layer.set_feature_states([&1, &2], &["selected"]);
        assert_eq!(h.flush(), 1);
        assert_eq!(h.engine().render_requests(layer.engine_layer()), 1);

        h.manager.batch(Some(FlushPolicy::Frame), || {
            layer.mutate(&1, |m| poi(m.id, 2.0, 2.0));
            layer.invalidate();
            assert_eq!(h.queue.frame_len(), 0);
        });
        assert_eq!(h.queue.frame_len(), 1);
        assert_eq!(h.flush(), 1);
        assert_eq!(h.engine().render_requests(layer.engine_layer()), 2);
    }

    #[test]
    fn feature_states_follow_the_model() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois"));
        layer.set_models([poi(1, 0.0, 0.0), poi(2, 10.0, 0.0)]).unwrap();

        layer.set_feature_states([&1, &2], &["hovered", "selected"]);
        assert_eq!(layer.feature_states(&1), ["hovered", "selected"]);
        assert!(!layer.add_feature_state(&1, "hovered"));
        assert!(layer.remove_feature_state(&1, "hovered"));
        assert_eq!(layer.feature_states(&1), ["selected"]);
        assert!(!layer.add_feature_state(&9, "hovered"));

        // A removed model takes its states with it.
        layer.remove_models_by_id([&2]);
        layer.add_model(poi(2, 10.0, 0.0)).unwrap();
        assert!(layer.feature_states(&2).is_empty());

        layer.clear_feature_states();
        assert!(layer.feature_states(&1).is_empty());
    }

    #[test]
    fn centering_fits_the_union_extent() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois"));
        let options = FitOptions::default();
        assert!(!layer.center_on_all_models(&options));

        layer.set_models([poi(1, 0.0, 0.0), poi(2, 100.0, 50.0)]).unwrap();
        assert!(layer.center_on_all_models(&options));
        assert_eq!(
            h.engine().fits().last().map(|f| f.0),
            Some(Rect::new(0.0, 0.0, 100.0, 50.0))
        );

        assert!(layer.center_on_model(&2, &options));
        assert_eq!(
            h.engine().fits().last().map(|f| f.0),
            Some(Rect::new(100.0, 50.0, 100.0, 50.0))
        );
        assert!(!layer.center_on_models([&9], &options));
        assert_eq!(h.engine().fits().len(), 2);
    }

    #[test]
    fn presentation_reaches_the_engine() {
        let h = Harness::new();
        let layer = h.pois(poi_layer("pois").z_index(3).opacity(0.5));
        let engine_layer = layer.engine_layer();
        assert_eq!(h.engine().layer_z_index(engine_layer), Some(3));
        assert_eq!(h.engine().layer_opacity(engine_layer), Some(0.5));

        layer.set_visible(false);
        layer.set_opacity(3.0);
        layer.set_z_index(-1);
        assert!(!layer.is_visible());
        assert_eq!(layer.opacity(), 1.0);
        assert_eq!(layer.z_index(), -1);
        assert!(!h.engine().layer_visible(engine_layer));
        assert_eq!(h.engine().layer_opacity(engine_layer), Some(1.0));
        assert_eq!(h.engine().layer_z_index(engine_layer), Some(-1));
    }

    #[test]
    fn styles_apply_states_and_cache_renders() {
        let h = Harness::new();
        let renders = Rc::new(Cell::new(0));
        let count = renders.clone();
        let style = Style::new(
            |_: &crate::fixtures::Poi, _: &View| "gray",
            move |o: &&'static str, _: &View| {
                count.set(count.get() + 1);
                vec![*o]
            },
        )
        .state("selected", |o, _, _| *o = "red")
        .cache_key(|o, _| o.to_string());
        let layer = h
            .manager
            .add_layer(LayerSpec::new("pois", PoiAdapter).style(style))
            .unwrap();
        layer.set_models([poi(1, 0.0, 0.0), poi(2, 10.0, 0.0)]).unwrap();

        assert_eq!(layer.style_of(&1).as_deref(), Some(&["gray"][..]));
        layer.add_feature_state(&2, "selected");
        assert_eq!(layer.style_of(&2).as_deref(), Some(&["red"][..]));
        assert_eq!(layer.style_of(&2).as_deref(), Some(&["red"][..]));
        assert_eq!(renders.get(), 2);

        layer.clear_style_cache();
        layer.style_of(&1);
        assert_eq!(renders.get(), 3);
        assert!(layer.style_of(&9).is_none());
    }

    fn clustered(h: &Harness) -> Layer<crate::fixtures::Poi, String> {
        let style = Style::new(
            |m: &crate::fixtures::Poi, _: &View| m.id,
            |id: &u32, _: &View| vec![format!("poi {id}")],
        );
        h.manager
            .add_layer(
                LayerSpec::new("stops", PoiAdapter)
                    .style(style)
                    .cluster_style(|members, _| vec![format!("cluster of {}", members.len())])
                    .clustering(ClusterSettings::default()),
            )
            .unwrap()
    }

    #[test]
    fn clustering_toggle_is_idempotent() {
        let h = Harness::new();
        let layer = clustered(&h);
        let engine_layer = layer.engine_layer();
        layer
            .set_models([poi(1, 0.0, 0.0), poi(2, 10.0, 0.0), poi(3, 300.0, 0.0)])
            .unwrap();
        layer.set_feature_states([&1], &["selected"]);
        h.flush();
        assert!(layer.is_clustered());
        assert_eq!(
            h.engine().layer_clustering(engine_layer),
            Some(ClusterSettings::default())
        );

        assert!(!layer.set_clustering_enabled(true));
        assert!(h.manager.scheduler().is_empty());

        assert!(layer.set_clustering_enabled(false));
        assert!(!layer.set_clustering_enabled(false));
        assert!(!layer.is_clustering_enabled());
        assert!(layer.feature_states(&1).is_empty());
        assert_eq!(h.engine().layer_clustering(engine_layer), None);
        assert_eq!(h.flush(), 1);
        assert_eq!(h.engine().render_requests(engine_layer), 2);

        let plain = h.pois(poi_layer("plain"));
        assert!(!plain.set_clustering_enabled(true));
        assert!(!plain.is_clustering_enabled());
    }

    #[test]
    fn cluster_styles_depend_on_size() {
        let h = Harness::new();
        let layer = clustered(&h);
        layer
            .set_models([poi(1, 0.0, 0.0), poi(2, 10.0, 0.0), poi(3, 300.0, 0.0)])
            .unwrap();
        let f = |id| layer.feature_of(&id).unwrap();

        let pair = layer.resolve_styles(&Pick::Cluster(vec![f(1), f(2)]));
        assert_eq!(&*pair, ["cluster of 2".to_string()]);
        let single = layer.resolve_styles(&Pick::Cluster(vec![f(3)]));
        assert_eq!(&*single, ["poi 3".to_string()]);
        let feature = layer.resolve_styles(&Pick::Feature(f(1)));
        assert_eq!(&*feature, ["poi 1".to_string()]);
    }

    #[test]
    fn hits_unwrap_single_member_clusters_and_skip_hidden_layers() {
        let h = Harness::new();
        let layer = clustered(&h);
        layer
            .set_models([poi(1, 0.0, 0.0), poi(2, 10.0, 0.0), poi(3, 300.0, 0.0)])
            .unwrap();

        let hits = layer.hits(Point::new(300.0, 0.0), 5.0);
        assert!(matches!(hits.as_slice(), [LayerHit::Item(item)] if item.id() == 3));
        let hits = layer.hits(Point::new(5.0, 0.0), 5.0);
        assert!(matches!(hits.as_slice(), [LayerHit::Cluster(members)] if members.len() == 2));

        layer.set_visible(false);
        assert!(layer.hits(Point::new(300.0, 0.0), 5.0).is_empty());
    }
}
