// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The style pipeline: base options, state patches, render, cache.
//!
//! For every primitive the pipeline computes `base(model, view)`, applies the patch of each
//! active feature state, and hands the merged options to `render`. When a cache key is
//! declared, renders are memoized per layer by that key.
//!
//! ## Patch order
//!
//! Active states are applied in activation order, except that states named in
//! [`Style::state_priority`] go first, in priority-list order. Later patches overwrite
//! earlier ones.
//!
//! ```
//! use mapweave::Style;
//! use mapweave::engine::View;
//!
//! #[derive(Clone)]
//! struct Opts { width: f64, color: &'static str }
//!
//! let style = Style::new(
//!     |_: &(), _: &View| Opts { width: 1.0, color: "gray" },
//!     |o: &Opts, _: &View| vec![(o.width, o.color)],
//! )
//! .state("hovered", |o, _, _| { o.width = 2.0; o.color = "blue"; })
//! .state("selected", |o, _, _| o.color = "red")
//! .state_priority(["selected"]);
//!
//! let states = ["hovered".to_string(), "selected".to_string()];
//! // `selected` is applied first, then `hovered` overwrites the color.
//! assert_eq!(&*style.resolve(&(), &states, &View::default()), &[(2.0, "blue")]);
//! ```

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use log::trace;
use mapweave_engine::View;

type BaseFn<M, O> = Box<dyn Fn(&M, &View) -> O>;
type PatchFn<M, O> = Box<dyn Fn(&mut O, &M, &View)>;
type RenderFn<O, S> = Box<dyn Fn(&O, &View) -> Vec<S>>;
type KeyFn<O> = Box<dyn Fn(&O, &View) -> String>;

/// Style declaration for one layer.
///
/// `M` is the model type, `O` the intermediate options type the patches edit, and `S` the
/// drawable style the engine consumes.
pub struct Style<M, O, S> {
    base: BaseFn<M, O>,
    patches: Vec<(String, PatchFn<M, O>)>,
    priority: Vec<String>,
    render: RenderFn<O, S>,
    cache_key: Option<KeyFn<O>>,
    capacity: Option<usize>,
    cache: RefCell<BTreeMap<String, Rc<[S]>>>,
}

impl<M, O, S> fmt::Debug for Style<M, O, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let states: Vec<&str> = self.patches.iter().map(|(l, _)| l.as_str()).collect();
        f.debug_struct("Style")
            .field("states", &states)
            .field("priority", &self.priority)
            .field("cached", &self.cache_key.is_some())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<M, O, S> Style<M, O, S> {
    /// A style from a base function and a render function.
    pub fn new(
        base: impl Fn(&M, &View) -> O + 'static,
        render: impl Fn(&O, &View) -> Vec<S> + 'static,
    ) -> Self {
        Self {
            base: Box::new(base),
            patches: Vec::new(),
            priority: Vec::new(),
            render: Box::new(render),
            cache_key: None,
            capacity: None,
            cache: RefCell::new(BTreeMap::new()),
        }
    }

    /// Declare the patch applied while `label` is active. Replaces an earlier patch for
    /// the same label.
    pub fn state(
        mut self,
        label: impl Into<String>,
        patch: impl Fn(&mut O, &M, &View) + 'static,
    ) -> Self {
        let label = label.into();
        self.patches.retain(|(l, _)| *l != label);
        self.patches.push((label, Box::new(patch)));
        self
    }

    /// States applied before all others, in this order.
    pub fn state_priority<L: Into<String>>(mut self, labels: impl IntoIterator<Item = L>) -> Self {
        self.priority = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Memoize renders by `key(merged_options, view)`.
    pub fn cache_key(mut self, key: impl Fn(&O, &View) -> String + 'static) -> Self {
        self.cache_key = Some(Box::new(key));
        self
    }

    /// Bound the cache. When full, it is emptied before the next insert.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Merged options for `model` with `states` active.
    pub fn options(&self, model: &M, states: &[String], view: &View) -> O {
        let mut options = (self.base)(model, view);
        for label in apply_order(states, &self.priority) {
            if let Some((_, patch)) = self.patches.iter().find(|(l, _)| l == label) {
                patch(&mut options, model, view);
            }
        }
        options
    }

    /// Drawable styles for `model` with `states` active.
    pub fn resolve(&self, model: &M, states: &[String], view: &View) -> Rc<[S]> {
        let options = self.options(model, states, view);
        let Some(key_fn) = &self.cache_key else {
            return Rc::from((self.render)(&options, view));
        };
        let key = key_fn(&options, view);
        if let Some(hit) = self.cache.borrow().get(&key) {
            return Rc::clone(hit);
        }
        trace!("style cache miss for `{key}`");
        let rendered: Rc<[S]> = Rc::from((self.render)(&options, view));
        let mut cache = self.cache.borrow_mut();
        if self.capacity.is_some_and(|cap| cache.len() >= cap) {
            cache.clear();
        }
        cache.insert(key, Rc::clone(&rendered));
        rendered
    }

    /// Drop every cached render.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Number of cached renders.
    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

/// Priority-listed active states first (in list order), then the rest in activation order.
fn apply_order<'a>(states: &'a [String], priority: &'a [String]) -> Vec<&'a str> {
    let mut out: Vec<&str> = priority
        .iter()
        .filter(|p| states.contains(p))
        .map(String::as_str)
        .collect();
    out.extend(
        states
            .iter()
            .filter(|s| !priority.contains(s))
            .map(String::as_str),
    );
    out
}

/// Object-safe view of a [`Style`] with its options type erased.
pub(crate) trait ResolveStyle<M, S> {
    fn resolve(&self, model: &M, states: &[String], view: &View) -> Rc<[S]>;
    fn clear_cache(&self);
}

impl<M, O, S> ResolveStyle<M, S> for Style<M, O, S> {
    fn resolve(&self, model: &M, states: &[String], view: &View) -> Rc<[S]> {
        Self::resolve(self, model, states, view)
    }

    fn clear_cache(&self) {
        Self::clear_cache(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;
    use core::cell::Cell;

    #[derive(Clone, Debug, PartialEq)]
    struct Opts {
        width: u32,
        color: &'static str,
    }

    fn states(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn style() -> Style<u32, Opts, Opts> {
        Style::new(
            |m: &u32, _: &View| Opts {
                width: *m,
                color: "gray",
            },
            |o: &Opts, _: &View| vec![o.clone()],
        )
        .state("hovered", |o, _, _| {
            o.width += 1;
            o.color = "blue";
        })
        .state("selected", |o, _, _| o.color = "red")
    }

    #[test]
    fn later_states_win() {
        let s = style();
        let view = View::default();
        let o = s.options(&1, &states(&["selected", "hovered"]), &view);
        assert_eq!(o, Opts { width: 2, color: "blue" });
        let o = s.options(&1, &states(&["hovered", "selected"]), &view);
        assert_eq!(o, Opts { width: 2, color: "red" });
    }

    #[test]
    fn priority_states_apply_first() {
        let s = style().state_priority(["hovered"]);
        let o = s.options(&1, &states(&["selected", "hovered"]), &View::default());
        // `hovered` runs first, so `selected` decides the color.
        assert_eq!(o.color, "red");
    }

    #[test]
    fn unknown_states_are_ignored() {
        let s = style();
        let o = s.options(&3, &states(&["dragging"]), &View::default());
        assert_eq!(o, Opts { width: 3, color: "gray" });
    }

    #[test]
    fn cache_skips_render_on_hit() {
        let renders = Rc::new(Cell::new(0));
        let r = renders.clone();
        let s = Style::new(
            |m: &u32, _: &View| *m,
            move |o: &u32, _: &View| {
                r.set(r.get() + 1);
                vec![*o]
            },
        )
        .cache_key(|o, _| o.to_string());
        let view = View::default();
        let a = s.resolve(&5, &[], &view);
        let b = s.resolve(&5, &[], &view);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(renders.get(), 1);
        s.resolve(&6, &[], &view);
        assert_eq!(renders.get(), 2);
        assert_eq!(s.cache_len(), 2);
        s.clear_cache();
        assert_eq!(s.cache_len(), 0);
    }

    #[test]
    fn bounded_cache_clears_when_full() {
        let s = Style::new(|m: &u32, _: &View| *m, |o: &u32, _: &View| vec![*o])
            .cache_key(|o, _| o.to_string())
            .cache_capacity(2);
        let view = View::default();
        s.resolve(&1, &[], &view);
        s.resolve(&2, &[], &view);
        assert_eq!(s.cache_len(), 2);
        s.resolve(&3, &[], &view);
        assert_eq!(s.cache_len(), 1);
    }

    #[test]
    fn uncached_renders_every_time() {
        let renders = Rc::new(Cell::new(0));
        let r = renders.clone();
        let s = Style::new(
            |m: &u32, _: &View| *m,
            move |o: &u32, _: &View| {
                r.set(r.get() + 1);
                vec![*o]
            },
        );
        s.resolve(&1, &[], &View::default());
        s.resolve(&1, &[], &View::default());
        assert_eq!(renders.get(), 2);
        assert_eq!(s.cache_len(), 0);
    }
}
