use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dealspark_catalog::ProductId;
use dealspark_core::{Aggregate, AggregateRoot, DomainError, Money, UserId, aggregate_newtype};
use dealspark_events::Event;

/// Stream type for order aggregates.
pub const AGGREGATE_TYPE: &str = "orders.order";

aggregate_newtype!(
    /// Order identifier.
    OrderId
);

/// Order status lifecycle. Fulfilment is handled outside this system, so every
/// order stays `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Processing,
}

/// Order item: product, quantity, unit price paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
    pub phone: String,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    buyer_id: Option<UserId>,
    items: Vec<OrderItem>,
    total_amount: Money,
    shipping_address: ShippingAddress,
    payment_intent_id: String,
    delivery_date: Option<DateTime<Utc>>,
    status: OrderStatus,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
    removed: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            buyer_id: None,
            items: Vec::new(),
            total_amount: Money::ZERO,
            shipping_address: ShippingAddress::default(),
            payment_intent_id: String::new(),
            delivery_date: None,
            status: OrderStatus::Processing,
            created_at: None,
            version: 0,
            created: false,
            removed: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn payment_intent_id(&self) -> &str {
        &self.payment_intent_id
    }

    pub fn delivery_date(&self) -> Option<DateTime<Utc>> {
        self.delivery_date
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn exists(&self) -> bool {
        self.created && !self.removed
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub shipping_address: ShippingAddress,
    pub payment_intent_id: String,
    pub delivery_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveOrder (buyer only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOrder {
    pub order_id: OrderId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    RemoveOrder(RemoveOrder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub shipping_address: ShippingAddress,
    pub payment_intent_id: String,
    pub delivery_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRemoved {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderRemoved(OrderRemoved),
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::OrderPlaced(e) => e.order_id,
            OrderEvent::OrderRemoved(e) => e.order_id,
        }
    }
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::OrderRemoved(_) => "orders.order.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.buyer_id = Some(e.buyer_id);
                self.items = e.items.clone();
                self.total_amount = e.total_amount;
                self.shipping_address = e.shipping_address.clone();
                self.payment_intent_id = e.payment_intent_id.clone();
                self.delivery_date = e.delivery_date;
                self.status = OrderStatus::Processing;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::OrderRemoved(_) => {
                self.removed = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::RemoveOrder(cmd) => self.handle_remove(cmd),
        }
    }
}

/// Sum of `quantity * price` over all items; `None` on overflow.
pub fn items_total(items: &[OrderItem]) -> Option<Money> {
    items.iter().try_fold(Money::ZERO, |acc, item| {
        item.price
            .checked_mul(u64::from(item.quantity))
            .and_then(|line| acc.checked_add(line))
    })
}

impl Order {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::validation("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        self.ensure_order_id(cmd.order_id)?;

        if cmd.items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        if cmd.items.iter().any(|item| item.quantity == 0) {
            return Err(DomainError::validation("item quantity must be positive"));
        }
        if cmd.payment_intent_id.trim().is_empty() {
            return Err(DomainError::validation("payment_intent_id is required"));
        }

        let computed = items_total(&cmd.items)
            .ok_or_else(|| DomainError::validation("order total overflows"))?;
        if computed != cmd.total_amount {
            return Err(DomainError::validation(format!(
                "total_amount {} does not match items total {computed}",
                cmd.total_amount
            )));
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            buyer_id: cmd.buyer_id,
            items: cmd.items.clone(),
            total_amount: cmd.total_amount,
            shipping_address: cmd.shipping_address.clone(),
            payment_intent_id: cmd.payment_intent_id.trim().to_string(),
            delivery_date: cmd.delivery_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        if self.buyer_id != Some(cmd.actor) {
            return Err(DomainError::unauthorized("not authorized to delete this order"));
        }

        Ok(vec![OrderEvent::OrderRemoved(OrderRemoved {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
