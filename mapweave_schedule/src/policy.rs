// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flush policies and tokens.

/// When a requested flush should run.
///
/// Policies are ordered by strength: [`Frame`](FlushPolicy::Frame) is stronger than
/// [`Microtask`](FlushPolicy::Microtask). A pending flush is only ever re-requested at a
/// stronger policy, never downgraded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FlushPolicy {
    /// Flush on the next turn of the host's microtask queue.
    #[default]
    Microtask,
    /// Flush aligned to the host's next repaint callback.
    #[cfg_attr(feature = "serde", serde(alias = "raf"))]
    Frame,
}

/// Identifies one flush request handed to a [`FlushDriver`](crate::FlushDriver).
///
/// Tokens increase monotonically. Only the token of the currently pending request is
/// honored by [`FlushScheduler::fire`](crate::FlushScheduler::fire); callbacks carrying an
/// older token are stale and ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlushToken(pub(crate) u64);

impl FlushToken {
    /// Raw counter value, useful for logging.
    pub const fn get(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_stronger_than_microtask() {
        assert!(FlushPolicy::Frame > FlushPolicy::Microtask);
        assert_eq!(
            FlushPolicy::Microtask.max(FlushPolicy::Frame),
            FlushPolicy::Frame
        );
    }

    #[test]
    fn default_policy_is_microtask() {
        assert_eq!(FlushPolicy::default(), FlushPolicy::Microtask);
    }
}
