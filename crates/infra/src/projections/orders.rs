use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use dealspark_core::{Money, UserId};
use dealspark_events::EventEnvelope;
use dealspark_orders::{OrderEvent, OrderId, OrderItem, OrderStatus, ShippingAddress};

use super::{Projection, ProjectionError, StreamCursors, decode};
use crate::read_model::KeyedStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub shipping_address: ShippingAddress,
    pub payment_intent_id: String,
    pub delivery_date: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct OrderProjection<S>
where
    S: KeyedStore<OrderId, OrderReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> OrderProjection<S>
where
    S: KeyedStore<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(order_id)
    }

    /// A buyer's orders, newest first.
    pub fn list_for_buyer(&self, buyer: UserId) -> Vec<OrderReadModel> {
        let mut orders: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|o| o.buyer_id == buyer)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.order_id.cmp(&a.order_id)));
        orders
    }
}

impl<S> Projection for OrderProjection<S>
where
    S: KeyedStore<OrderId, OrderReadModel>,
{
    fn aggregate_type(&self) -> &'static str {
        dealspark_orders::AGGREGATE_TYPE
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != self.aggregate_type() {
            return Ok(());
        }

        self.cursors
            .apply_next(envelope.aggregate_id(), envelope.sequence_number(), || {
                let ev: OrderEvent = decode(envelope)?;
                if ev.order_id().aggregate_id() != envelope.aggregate_id() {
                    return Err(ProjectionError::StreamMismatch(
                        "event order_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                match ev {
                    OrderEvent::OrderPlaced(e) => {
                        self.store.upsert(
                            e.order_id,
                            OrderReadModel {
                                order_id: e.order_id,
                                buyer_id: e.buyer_id,
                                items: e.items,
                                total_amount: e.total_amount,
                                shipping_address: e.shipping_address,
                                payment_intent_id: e.payment_intent_id,
                                delivery_date: e.delivery_date,
                                status: OrderStatus::Processing,
                                created_at: e.occurred_at,
                            },
                        );
                    }
                    OrderEvent::OrderRemoved(e) => {
                        self.store.remove(&e.order_id);
                    }
                }
                Ok(())
            })
            .map(|_| ())
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
