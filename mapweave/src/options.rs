// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime configuration.

use mapweave_popup::PopupOptions;
use mapweave_schedule::FlushPolicy;

/// Options for a [`LayerManager`](crate::LayerManager).
///
/// With the `serde` feature, every field is optional when deserializing:
///
/// ```toml
/// hit_tolerance = 8.0
/// flush_policy = "frame"
///
/// [popup]
/// mode = "click"
/// max_items = 3
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RuntimeOptions {
    /// Default hit-test tolerance in pixels, for layers without their own.
    pub hit_tolerance: f64,
    /// Policy for flush requests made outside any batch.
    pub flush_policy: FlushPolicy,
    /// Popup host settings. `None` runs without a popup host.
    pub popup: Option<PopupOptions>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            hit_tolerance: 5.0,
            flush_policy: FlushPolicy::Microtask,
            popup: None,
        }
    }
}
