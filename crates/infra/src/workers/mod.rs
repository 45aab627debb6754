//! Background workers fed from the event bus.

pub mod event_worker;

pub use event_worker::{EventWorker, WorkerHandle};
