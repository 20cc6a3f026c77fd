// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised by layer and layer-manager operations.

use alloc::string::String;

/// Failure of a layer or layer-manager operation.
///
/// Every variant is raised before any state changes: the collection, the registry and
/// subscribers are exactly as they were before the call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The operation would put two models with the same id into one layer.
    #[error("duplicate model id `{id}` in layer `{layer}`")]
    DuplicateId {
        /// The offending model id.
        id: String,
        /// Id of the layer the operation targeted.
        layer: String,
    },
    /// A layer with this id is already registered.
    #[error("duplicate layer id `{layer}`")]
    DuplicateLayer {
        /// The offending layer id.
        layer: String,
    },
    /// Layers cannot be added while the manager is dispatching a pointer event.
    #[error("layer manager is busy dispatching an event")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn messages_name_the_offenders() {
        let err = Error::DuplicateId {
            id: "7".into(),
            layer: "pois".into(),
        };
        assert_eq!(err.to_string(), "duplicate model id `7` in layer `pois`");
        let err = Error::DuplicateLayer {
            layer: "pois".into(),
        };
        assert_eq!(err.to_string(), "duplicate layer id `pois`");
    }
}
