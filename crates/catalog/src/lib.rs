//! Catalog domain module (event-sourced).
//!
//! Products are listed by owners and carry the deal price that offers are
//! negotiated against. Pure domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{
    AGGREGATE_TYPE, CreateProduct, DealPriceChanged, Product, ProductCommand, ProductCreated,
    ProductEvent, ProductId, UpdateDealPrice,
};
