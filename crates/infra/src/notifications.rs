//! Offer notifications.
//!
//! Notifications are a side effect of committed offer events: a worker thread
//! subscribes to the bus, turns each offer event into messages for the
//! parties and hands them to a [`NotificationSink`]. Delivery failures are
//! logged and dropped; they never reach the request that caused the event.

use std::io;
use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;
use thiserror::Error;

use dealspark_core::UserId;
use dealspark_events::{EventBus, EventEnvelope};
use dealspark_negotiation::{AGGREGATE_TYPE, OfferEvent};

use crate::catalog::CatalogStore;
use crate::workers::{EventWorker, WorkerHandle};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("undecodable offer event: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: UserId,
    pub subject: String,
    pub body: String,
}

/// Outbound channel for notifications (email in production).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, recipient: UserId, subject: &str, body: &str) -> Result<(), NotifyError>;
}

impl<T> NotificationSink for Arc<T>
where
    T: NotificationSink + ?Sized,
{
    fn notify(&self, recipient: UserId, subject: &str, body: &str) -> Result<(), NotifyError> {
        (**self).notify(recipient, subject, body)
    }
}

/// Messages to send for one offer event. Seen markers and removals are silent.
pub fn describe(event: &OfferEvent, product_name: &str) -> Vec<Notification> {
    let note = |recipient, subject: &str, body: String| Notification {
        recipient,
        subject: subject.to_string(),
        body,
    };

    match event {
        OfferEvent::OfferCreated(e) => vec![
            note(
                e.owner_id,
                "New Offer Received",
                format!(
                    "A new offer of ₹{} has been made on your product: {product_name}",
                    e.offered_price
                ),
            ),
            note(
                e.buyer_id,
                "Offer Submitted",
                format!(
                    "Your offer of ₹{} for {product_name} has been submitted and is pending approval.",
                    e.offered_price
                ),
            ),
        ],
        OfferEvent::OfferAccepted(e) => vec![note(
            e.recipient,
            "Offer Accepted",
            format!("The offer for {product_name} has been accepted at ₹{}.", e.price),
        )],
        OfferEvent::OfferRejected(e) => vec![note(
            e.recipient,
            "Offer Rejected",
            format!("The offer for {product_name} has been rejected."),
        )],
        OfferEvent::OfferCountered(e) => vec![note(
            e.recipient,
            "New Counter Offer",
            format!("A counter offer of ₹{} has been made on {product_name}.", e.price),
        )],
        OfferEvent::OfferSeen(_) | OfferEvent::OfferRemoved(_) => vec![],
    }
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, recipient: UserId, subject: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(recipient = %recipient, subject, body, "notification");
        Ok(())
    }
}

/// Keeps every notification in memory (tests).
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn notify(&self, recipient: UserId, subject: &str, body: &str) -> Result<(), NotifyError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| NotifyError::Delivery("recording sink poisoned".to_string()))?;
        sent.push(Notification {
            recipient,
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Bus subscriber that delivers offer notifications.
#[derive(Debug)]
pub struct NotificationWorker;

impl NotificationWorker {
    pub fn spawn<B>(
        bus: &B,
        catalog: Arc<dyn CatalogStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> io::Result<WorkerHandle>
    where
        B: EventBus<EventEnvelope<JsonValue>> + ?Sized,
    {
        EventWorker::spawn("offer-notifications", bus, move |envelope: EventEnvelope<JsonValue>| {
            deliver(&envelope, catalog.as_ref(), sink.as_ref())
        })
    }
}

fn deliver(
    envelope: &EventEnvelope<JsonValue>,
    catalog: &dyn CatalogStore,
    sink: &dyn NotificationSink,
) -> Result<(), NotifyError> {
    if envelope.aggregate_type() != AGGREGATE_TYPE {
        return Ok(());
    }

    let event: OfferEvent = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| NotifyError::Decode(e.to_string()))?;
    let product_name = product_id_of(&event)
        .and_then(|id| catalog.get_product(id))
        .map(|p| p.name)
        .unwrap_or_else(|| "your product".to_string());

    for n in describe(&event, &product_name) {
        if let Err(e) = sink.notify(n.recipient, &n.subject, &n.body) {
            tracing::warn!(
                offer_id = %event.offer_id(),
                recipient = %n.recipient,
                subject = %n.subject,
                "notification dropped: {e}"
            );
        }
    }
    Ok(())
}

fn product_id_of(event: &OfferEvent) -> Option<dealspark_catalog::ProductId> {
    match event {
        OfferEvent::OfferCreated(e) => Some(e.product_id),
        OfferEvent::OfferAccepted(e) => Some(e.product_id),
        OfferEvent::OfferRejected(e) => Some(e.product_id),
        OfferEvent::OfferCountered(e) => Some(e.product_id),
        OfferEvent::OfferRemoved(e) => Some(e.product_id),
        OfferEvent::OfferSeen(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use chrono::Utc;
    use dealspark_catalog::ProductId;
    use dealspark_core::Money;
    use dealspark_events::InMemoryEventBus;
    use dealspark_negotiation::{OfferCountered, OfferCreated, OfferId, OfferSeen, Party};
    use uuid::Uuid;

    use super::*;
    use crate::catalog::CatalogEntry;

    struct OneProduct(ProductId, CatalogEntry);

    impl CatalogStore for OneProduct {
        fn get_product(&self, product_id: ProductId) -> Option<CatalogEntry> {
            (product_id == self.0).then(|| self.1.clone())
        }
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn notify(&self, _: UserId, _: &str, _: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("smtp down".to_string()))
        }
    }

    fn created(product_id: ProductId, buyer: UserId, owner: UserId) -> OfferEvent {
        OfferEvent::OfferCreated(OfferCreated {
            offer_id: OfferId::generate(),
            product_id,
            buyer_id: buyer,
            owner_id: owner,
            offered_price: Money::new(950),
            occurred_at: Utc::now(),
        })
    }

    fn envelope(ev: &OfferEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            ev.offer_id().aggregate_id(),
            AGGREGATE_TYPE,
            1,
            serde_json::to_value(ev).unwrap(),
        )
    }

    #[test]
    fn creation_notifies_both_parties() {
        let (buyer, owner) = (UserId::new(), UserId::new());
        let out = describe(&created(ProductId::generate(), buyer, owner), "Camera");

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].recipient, owner);
        assert_eq!(out[0].subject, "New Offer Received");
        assert_eq!(out[0].body, "A new offer of ₹950 has been made on your product: Camera");
        assert_eq!(out[1].recipient, buyer);
        assert_eq!(out[1].subject, "Offer Submitted");
    }

    #[test]
    fn counter_notifies_recipient_only_and_seen_is_silent() {
        let recipient = UserId::new();
        let counter = OfferEvent::OfferCountered(OfferCountered {
            offer_id: OfferId::generate(),
            product_id: ProductId::generate(),
            by: Party::Owner,
            recipient,
            price: Money::new(990),
            occurred_at: Utc::now(),
        });
        let out = describe(&counter, "Camera");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient, recipient);
        assert_eq!(out[0].subject, "New Counter Offer");
        assert_eq!(out[0].body, "A counter offer of ₹990 has been made on Camera.");

        let seen = OfferEvent::OfferSeen(OfferSeen {
            offer_id: OfferId::generate(),
            by: Party::Buyer,
            occurred_at: Utc::now(),
        });
        assert!(describe(&seen, "Camera").is_empty());
    }

    #[test]
    fn sink_failures_are_swallowed() {
        let ev = created(ProductId::generate(), UserId::new(), UserId::new());
        let catalog = OneProduct(
            ProductId::generate(),
            CatalogEntry {
                owner_id: UserId::new(),
                name: "x".to_string(),
                deal_price: Money::new(1),
            },
        );
        deliver(&envelope(&ev), &catalog, &FailingSink).unwrap();
    }

    #[test]
    fn worker_delivers_from_the_bus() {
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let sink = Arc::new(RecordingNotificationSink::new());
        let product_id = ProductId::generate();
        let owner = UserId::new();
        let catalog = Arc::new(OneProduct(
            product_id,
            CatalogEntry {
                owner_id: owner,
                name: "Camera".to_string(),
                deal_price: Money::new(1000),
            },
        ));

        let handle = NotificationWorker::spawn(&bus, catalog, sink.clone()).unwrap();
        bus.publish(envelope(&created(product_id, UserId::new(), owner))).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while sink.sent().len() < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        handle.shutdown();

        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].body.ends_with("Camera"));
    }
}
