//! Projection implementations (read model builders).
//!
//! Projections consume committed events and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: reconstructed from the event store at startup
//! - **Idempotent**: cursor-checked per stream, safe to feed twice

pub mod cursor;
pub mod offers;
pub mod orders;
pub mod products;
pub mod replay;

use serde_json::Value as JsonValue;
use thiserror::Error;

use dealspark_events::EventEnvelope;

use crate::event_store::EventStoreError;

pub use cursor::StreamCursors;
pub use offers::{OfferProjection, OfferReadModel};
pub use orders::{OrderProjection, OrderReadModel};
pub use products::{ProductProjection, ProductReadModel};
pub use replay::{catch_up, rebuild};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("event does not belong to its stream: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("projection lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Store(#[from] EventStoreError),
}

/// A read model fed from one aggregate type's event streams.
pub trait Projection: Send + Sync {
    /// Stream type this projection consumes; other envelopes are ignored.
    fn aggregate_type(&self) -> &'static str;

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Forget all state (before a rebuild).
    fn reset(&self);
}

pub(crate) fn decode<E: serde::de::DeserializeOwned>(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))
}
