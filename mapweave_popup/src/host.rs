// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The popup host: merge, sort, limit, render.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;

use log::debug;

use crate::item::{PopupItem, PopupOptions};

/// Displays the host's entries.
pub trait PopupRenderer<C> {
    /// Attach to the mount point.
    fn mount(&mut self) {}
    /// Detach from the mount point.
    fn unmount(&mut self) {}
    /// Show exactly `items`, replacing whatever was shown before.
    fn render(&mut self, items: &[PopupItem<C>]);
}

/// A renderer that shows nothing; useful when only [`PopupHost::items`] is consumed.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopRenderer;

impl<C> PopupRenderer<C> for NoopRenderer {
    fn render(&mut self, _items: &[PopupItem<C>]) {}
}

type Comparator<C> = Box<dyn Fn(&PopupItem<C>, &PopupItem<C>) -> Ordering>;

/// Aggregates popup entries contributed by layers and application code.
///
/// Every update runs the same pipeline:
///
/// 1. Merge with the prior entries (empty for [`set`](Self::set)). Entries sharing a
///    [key](PopupItem::key) collapse: the later entry's content lands in the first
///    entry's slot. Keyless entries are always kept.
/// 2. Stable sort with the comparator, or by descending priority.
/// 3. Truncate to `max_items`.
/// 4. Render.
///
/// While disabled the host holds no entries and stays unmounted.
pub struct PopupHost<C> {
    items: Vec<PopupItem<C>>,
    renderer: Box<dyn PopupRenderer<C>>,
    comparator: Option<Comparator<C>>,
    max_items: Option<usize>,
    enabled: bool,
    enabled_when: Option<Box<dyn Fn() -> bool>>,
    mounted: bool,
}

impl<C> core::fmt::Debug for PopupHost<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PopupHost")
            .field("items", &self.items.len())
            .field("max_items", &self.max_items)
            .field("enabled", &self.enabled)
            .field("mounted", &self.mounted)
            .finish_non_exhaustive()
    }
}

impl<C> PopupHost<C> {
    /// Create a host rendering through `renderer`. Mounts immediately when enabled.
    pub fn new(options: &PopupOptions, renderer: Box<dyn PopupRenderer<C>>) -> Self {
        let mut host = Self {
            items: Vec::new(),
            renderer,
            comparator: None,
            max_items: options.max_items,
            enabled: options.enabled,
            enabled_when: None,
            mounted: false,
        };
        host.sync_enabled();
        host
    }

    /// Replace the default priority ordering.
    pub fn with_comparator(
        mut self,
        comparator: impl Fn(&PopupItem<C>, &PopupItem<C>) -> Ordering + 'static,
    ) -> Self {
        self.comparator = Some(Box::new(comparator));
        self
    }

    /// Gate the host on a dynamic predicate, in addition to the static flag.
    ///
    /// The predicate is re-evaluated by [`sync_enabled`](Self::sync_enabled), which every
    /// update calls first.
    pub fn enabled_when(mut self, predicate: impl Fn() -> bool + 'static) -> Self {
        self.enabled_when = Some(Box::new(predicate));
        self.sync_enabled();
        self
    }

    /// Current entries, in display order.
    pub fn items(&self) -> &[PopupItem<C>] {
        &self.items
    }

    /// Whether the host is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.enabled_when.as_ref().is_none_or(|f| f())
    }

    /// Whether the renderer is mounted.
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Set the static enabled flag.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.sync_enabled();
    }

    /// Set the entry limit and re-apply it.
    pub fn set_max_items(&mut self, max_items: Option<usize>) {
        self.max_items = max_items;
        if self.sync_enabled() {
            let items = core::mem::take(&mut self.items);
            self.apply(Vec::new(), items);
        }
    }

    /// Re-evaluate the enabled state, mounting or unmounting as needed.
    ///
    /// Disabling drops every entry; enabling starts empty.
    pub fn sync_enabled(&mut self) -> bool {
        let enabled = self.is_enabled();
        if enabled && !self.mounted {
            debug!("popup host mounted");
            self.items.clear();
            self.renderer.mount();
            self.mounted = true;
            self.renderer.render(&self.items);
        } else if !enabled && self.mounted {
            debug!("popup host unmounted");
            self.items.clear();
            self.renderer.render(&self.items);
            self.renderer.unmount();
            self.mounted = false;
        } else if !enabled {
            self.items.clear();
        }
        enabled
    }

    /// Merge `items` into the current entries.
    pub fn push(&mut self, items: impl IntoIterator<Item = PopupItem<C>>) {
        if !self.sync_enabled() {
            return;
        }
        let prior = core::mem::take(&mut self.items);
        self.apply(prior, items.into_iter().collect());
    }

    /// Replace the current entries with `items`.
    pub fn set(&mut self, items: impl IntoIterator<Item = PopupItem<C>>) {
        if !self.sync_enabled() {
            return;
        }
        self.items.clear();
        self.apply(Vec::new(), items.into_iter().collect());
    }

    /// Remove entries whose key equals `key`. Returns how many were removed.
    pub fn remove(&mut self, key: &str) -> usize {
        self.remove_where(|item| item.key() == Some(key))
    }

    /// Remove entries matching `pred`. Returns how many were removed.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&PopupItem<C>) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !pred(item));
        let removed = before - self.items.len();
        if removed > 0 && self.mounted {
            self.renderer.render(&self.items);
        }
        removed
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.items.clear();
        if self.mounted {
            self.renderer.render(&self.items);
        }
    }

    fn apply(&mut self, prior: Vec<PopupItem<C>>, incoming: Vec<PopupItem<C>>) {
        let mut merged = merge(prior, incoming);
        match &self.comparator {
            Some(cmp) => merged.sort_by(|a, b| cmp(a, b)),
            None => merged.sort_by(|a, b| b.priority.cmp(&a.priority)),
        }
        if let Some(max) = self.max_items {
            merged.truncate(max);
        }
        self.items = merged;
        self.renderer.render(&self.items);
    }
}

/// Merge two sequences, collapsing duplicate keys into the first slot with the last content.
fn merge<C>(prior: Vec<PopupItem<C>>, incoming: Vec<PopupItem<C>>) -> Vec<PopupItem<C>> {
    let mut out: Vec<PopupItem<C>> = Vec::with_capacity(prior.len() + incoming.len());
    let mut slots: BTreeMap<String, usize> = BTreeMap::new();
    for item in prior.into_iter().chain(incoming) {
        let slot = item.key().and_then(|k| slots.get(k).copied());
        match slot {
            Some(i) => out[i] = item,
            None => {
                if let Some(k) = item.key() {
                    slots.insert(String::from(k), out.len());
                }
                out.push(item);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::PopupSource;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::{Cell, RefCell};

    #[derive(Default)]
    struct Log {
        mounted: bool,
        renders: usize,
        shown: Vec<&'static str>,
    }

    struct Recorder(Rc<RefCell<Log>>);

    impl PopupRenderer<&'static str> for Recorder {
        fn mount(&mut self) {
            self.0.borrow_mut().mounted = true;
        }
        fn unmount(&mut self) {
            self.0.borrow_mut().mounted = false;
        }
        fn render(&mut self, items: &[PopupItem<&'static str>]) {
            let mut log = self.0.borrow_mut();
            log.renders += 1;
            log.shown = items.iter().map(|i| i.content).collect();
        }
    }

    fn host(options: PopupOptions) -> (PopupHost<&'static str>, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let host = PopupHost::new(&options, Box::new(Recorder(log.clone())));
        (host, log)
    }

    fn item(id: &str, content: &'static str) -> PopupItem<&'static str> {
        PopupItem::new(content).with_model_id(id)
    }

    #[test]
    fn push_dedups_last_write_wins() {
        let (mut host, log) = host(PopupOptions::default());
        host.push([item("1", "first")]);
        host.push([item("1", "second")]);
        assert_eq!(host.items().len(), 1);
        assert_eq!(host.items()[0].content, "second");
        assert_eq!(log.borrow().shown, vec!["second"]);
    }

    #[test]
    fn duplicate_keeps_first_slot() {
        let (mut host, _log) = host(PopupOptions::default());
        host.push([item("a", "a1"), item("b", "b1"), item("a", "a2")]);
        let shown: Vec<_> = host.items().iter().map(|i| i.content).collect();
        assert_eq!(shown, vec!["a2", "b1"]);
    }

    #[test]
    fn keyless_items_are_never_deduplicated() {
        let (mut host, _log) = host(PopupOptions::default());
        host.push([PopupItem::new("x"), PopupItem::new("x")]);
        host.push([PopupItem::new("x")]);
        assert_eq!(host.items().len(), 3);
    }

    #[test]
    fn sorts_by_priority_then_truncates() {
        let (mut host, _log) = host(PopupOptions {
            max_items: Some(2),
            ..PopupOptions::default()
        });
        host.set([
            item("1", "low").with_priority(1),
            item("2", "high").with_priority(10),
            item("3", "mid-a").with_priority(5),
            item("4", "mid-b").with_priority(5),
        ]);
        let shown: Vec<_> = host.items().iter().map(|i| i.content).collect();
        // Truncation happens after sorting, so the highest two survive.
        assert_eq!(shown, vec!["high", "mid-a"]);
    }

    #[test]
    fn ties_keep_relative_order() {
        let (mut host, _log) = host(PopupOptions::default());
        host.set([item("1", "a"), item("2", "b"), item("3", "c")]);
        let shown: Vec<_> = host.items().iter().map(|i| i.content).collect();
        assert_eq!(shown, vec!["a", "b", "c"]);
    }

    #[test]
    fn set_replaces() {
        let (mut host, _log) = host(PopupOptions::default());
        host.push([item("1", "a"), item("2", "b")]);
        host.set([item("3", "c")]);
        let shown: Vec<_> = host.items().iter().map(|i| i.content).collect();
        assert_eq!(shown, vec!["c"]);
    }

    #[test]
    fn custom_comparator() {
        let (host, _log) = host(PopupOptions::default());
        let mut host = host.with_comparator(|a, b| a.content.cmp(b.content));
        host.set([item("1", "b"), item("2", "c"), item("3", "a")]);
        let shown: Vec<_> = host.items().iter().map(|i| i.content).collect();
        assert_eq!(shown, vec!["a", "b", "c"]);
    }

    #[test]
    fn disabling_clears_and_unmounts() {
        let (mut host, log) = host(PopupOptions::default());
        assert!(log.borrow().mounted);
        host.push([item("1", "a")]);
        host.set_enabled(false);
        assert!(host.items().is_empty());
        assert!(!log.borrow().mounted);
        host.push([item("2", "b")]);
        assert!(host.items().is_empty());
        host.set_enabled(true);
        assert!(log.borrow().mounted);
        assert!(host.items().is_empty());
    }

    #[test]
    fn dynamic_enabled_is_rechecked() {
        let flag = Rc::new(Cell::new(true));
        let f = flag.clone();
        let (host, log) = host(PopupOptions::default());
        let mut host = host.enabled_when(move || f.get());
        host.push([item("1", "a")]);
        assert_eq!(host.items().len(), 1);
        flag.set(false);
        host.push([item("2", "b")]);
        assert!(host.items().is_empty());
        assert!(!log.borrow().mounted);
    }

    #[test]
    fn remove_by_key() {
        let (mut host, _log) = host(PopupOptions::default());
        host.push([
            item("1", "a"),
            PopupItem::new("c")
                .with_dedup_key("cluster:1,2")
                .with_source(PopupSource::Cluster),
        ]);
        assert_eq!(host.remove("cluster:1,2"), 1);
        assert_eq!(host.remove("missing"), 0);
        assert_eq!(host.items().len(), 1);
    }

    #[test]
    fn starts_unmounted_when_disabled() {
        let (host, log) = host(PopupOptions {
            enabled: false,
            ..PopupOptions::default()
        });
        assert!(!host.is_mounted());
        assert!(!log.borrow().mounted);
        assert_eq!(log.borrow().renders, 0);
    }
}
