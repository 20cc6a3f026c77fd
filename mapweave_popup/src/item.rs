// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Popup entries and configuration.

use alloc::string::String;

/// Where a popup entry came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PopupSource {
    /// Collected automatically on click.
    Click,
    /// Collected automatically on hover.
    Hover,
    /// Built for a multi-member cluster.
    Cluster,
    /// Pushed by application code.
    Api,
}

/// One popup entry.
#[derive(Clone, Debug, PartialEq)]
pub struct PopupItem<C> {
    /// Id of the model this entry describes, formatted as text.
    pub model_id: Option<String>,
    /// Application-defined content.
    pub content: C,
    /// Explicit deduplication key; takes precedence over `model_id`.
    pub dedup_key: Option<String>,
    /// Higher sorts first under the default ordering.
    pub priority: i32,
    /// Origin of the entry.
    pub source: PopupSource,
}

impl<C> PopupItem<C> {
    /// An API-sourced entry with no model, no dedup key and priority `0`.
    pub fn new(content: C) -> Self {
        Self {
            model_id: None,
            content,
            dedup_key: None,
            priority: 0,
            source: PopupSource::Api,
        }
    }

    /// Set the model id.
    pub fn with_model_id(mut self, id: impl Into<String>) -> Self {
        self.model_id = Some(id.into());
        self
    }

    /// Set an explicit dedup key.
    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the source.
    pub fn with_source(mut self, source: PopupSource) -> Self {
        self.source = source;
        self
    }

    /// Key used for deduplication: the explicit key, else the model id.
    ///
    /// `None` means the entry is never deduplicated.
    pub fn key(&self) -> Option<&str> {
        self.dedup_key.as_deref().or(self.model_id.as_deref())
    }
}

/// Which pointer events feed the popup host automatically.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PopupMode {
    /// Entries only arrive through explicit pushes.
    #[default]
    Off,
    /// Replace entries with those of the clicked items on every click.
    Click,
    /// Replace entries with those of the hovered items on every pointer move.
    Hover,
}

/// Popup host configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PopupOptions {
    /// Keep at most this many entries after sorting.
    pub max_items: Option<usize>,
    /// Automatic collection mode.
    pub mode: PopupMode,
    /// Initial enabled state.
    pub enabled: bool,
}

impl Default for PopupOptions {
    fn default() -> Self {
        Self {
            max_items: None,
            mode: PopupMode::Off,
            enabled: true,
        }
    }
}
