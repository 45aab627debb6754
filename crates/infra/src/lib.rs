//! Infrastructure layer: event store, dispatch, read models, and the
//! application services built on them.

pub mod active_index;
pub mod catalog;
pub mod command_dispatcher;
pub mod engine;
pub mod event_store;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod projections;
pub mod read_model;
pub mod workers;

pub use active_index::ActiveOfferIndex;
pub use catalog::{CatalogEntry, CatalogService, CatalogStore, NewProduct};
pub use engine::{EngineError, NegotiationEngine};
pub use notifications::{
    LogNotificationSink, Notification, NotificationSink, NotificationWorker, NotifyError,
    RecordingNotificationSink, describe,
};
pub use orders::{NewOrder, OrderService};
pub use payments::{FakePaymentGateway, PaymentError, PaymentGateway, PaymentIntent};
