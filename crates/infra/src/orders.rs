//! Order ledger application service.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use dealspark_core::{Money, UserId};
use dealspark_orders::{
    AGGREGATE_TYPE, Order, OrderCommand, OrderId, OrderItem, PlaceOrder, RemoveOrder,
    ShippingAddress,
};

use crate::command_dispatcher::SharedDispatcher;
use crate::engine::EngineError;
use crate::projections::{OrderProjection, OrderReadModel, catch_up, rebuild};
use crate::read_model::InMemoryKeyedStore;

/// Input for [`OrderService::place`].
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub shipping_address: ShippingAddress,
    pub payment_intent_id: String,
    pub delivery_date: Option<DateTime<Utc>>,
}

type OrderStore = Arc<InMemoryKeyedStore<OrderId, OrderReadModel>>;

#[derive(Debug)]
pub struct OrderService {
    dispatcher: Arc<SharedDispatcher>,
    orders: OrderProjection<OrderStore>,
}

impl OrderService {
    pub fn new(dispatcher: Arc<SharedDispatcher>) -> Self {
        Self {
            dispatcher,
            orders: OrderProjection::new(Arc::new(InMemoryKeyedStore::new())),
        }
    }

    pub fn rebuild(&self) -> Result<usize, EngineError> {
        Ok(rebuild(self.dispatcher.store(), &self.orders)?)
    }

    pub fn place(&self, buyer: UserId, input: NewOrder) -> Result<OrderReadModel, EngineError> {
        let order_id = OrderId::generate();
        let cmd = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            buyer_id: buyer,
            items: input.items,
            total_amount: input.total_amount,
            shipping_address: input.shipping_address,
            payment_intent_id: input.payment_intent_id,
            delivery_date: input.delivery_date,
            occurred_at: Utc::now(),
        });
        self.dispatch(order_id, cmd)?;
        self.orders
            .get(&order_id)
            .ok_or_else(|| EngineError::NotFound("order not found".to_string()))
    }

    pub fn list_mine(&self, buyer: UserId) -> Vec<OrderReadModel> {
        self.orders.list_for_buyer(buyer)
    }

    /// Only the buyer may read an order.
    pub fn get(&self, order_id: OrderId, viewer: UserId) -> Result<OrderReadModel, EngineError> {
        let order = self
            .orders
            .get(&order_id)
            .ok_or_else(|| EngineError::NotFound("order not found".to_string()))?;
        if order.buyer_id != viewer {
            return Err(EngineError::Unauthorized("not your order".to_string()));
        }
        Ok(order)
    }

    pub fn remove(&self, order_id: OrderId, actor: UserId) -> Result<(), EngineError> {
        let cmd = OrderCommand::RemoveOrder(RemoveOrder {
            order_id,
            actor,
            occurred_at: Utc::now(),
        });
        self.dispatch(order_id, cmd)
    }

    fn dispatch(&self, order_id: OrderId, cmd: OrderCommand) -> Result<(), EngineError> {
        self.dispatcher
            .dispatch(order_id.aggregate_id(), AGGREGATE_TYPE, cmd, |id| {
                Order::empty(OrderId::new(id))
            })?;
        catch_up(self.dispatcher.store(), &self.orders, order_id.aggregate_id())?;
        Ok(())
    }
}
