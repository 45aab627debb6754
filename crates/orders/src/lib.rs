//! Orders domain module (event-sourced).
//!
//! Finalized purchases: a buyer checks out a basket of products after paying.
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod order;

pub use order::{
    AGGREGATE_TYPE, Order, OrderCommand, OrderEvent, OrderId, OrderItem, OrderPlaced,
    OrderRemoved, OrderStatus, PlaceOrder, RemoveOrder, ShippingAddress, items_total,
};
