//! Feeding projections from the event store.
//!
//! `rebuild` replays every stream of a projection's aggregate type from
//! scratch (startup). `catch_up` brings one stream up to date after a command
//! commits, so reads that follow a write observe it.

use dealspark_core::AggregateId;

use super::{Projection, ProjectionError};
use crate::event_store::EventStore;

/// Clear the projection and replay all of its streams. Returns the number of
/// events applied.
pub fn rebuild<S, P>(store: &S, projection: &P) -> Result<usize, ProjectionError>
where
    S: EventStore + ?Sized,
    P: Projection + ?Sized,
{
    projection.reset();

    let events = store.load_by_type(projection.aggregate_type())?;
    for stored in &events {
        projection.apply_envelope(&stored.to_envelope())?;
    }

    tracing::info!(
        aggregate_type = projection.aggregate_type(),
        events = events.len(),
        "projection rebuilt"
    );
    Ok(events.len())
}

/// Apply any events of one stream the projection has not seen yet.
pub fn catch_up<S, P>(store: &S, projection: &P, aggregate_id: AggregateId) -> Result<(), ProjectionError>
where
    S: EventStore + ?Sized,
    P: Projection + ?Sized,
{
    for stored in store.load_stream(aggregate_id)? {
        if stored.aggregate_type != projection.aggregate_type() {
            return Err(ProjectionError::StreamMismatch(format!(
                "stream {aggregate_id} has type '{}', projection expects '{}'",
                stored.aggregate_type,
                projection.aggregate_type()
            )));
        }
        projection.apply_envelope(&stored.to_envelope())?;
    }
    Ok(())
}
