use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use dealspark_catalog::{ProductEvent, ProductId};
use dealspark_core::{Money, UserId};
use dealspark_events::EventEnvelope;

use super::{Projection, ProjectionError, StreamCursors, decode};
use crate::read_model::KeyedStore;

/// Queryable product read model (catalog).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub deal_price: Money,
    pub original_price: Option<Money>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ProductProjection<S>
where
    S: KeyedStore<ProductId, ProductReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ProductProjection<S>
where
    S: KeyedStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(product_id)
    }

    /// Newest first, optionally restricted to one category (case-insensitive).
    pub fn list(&self, category: Option<&str>) -> Vec<ProductReadModel> {
        let mut products: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|p| category.is_none_or(|c| p.category.eq_ignore_ascii_case(c)))
            .collect();
        sort_newest_first(&mut products);
        products
    }

    /// Case-insensitive substring match over name, category and description,
    /// newest first. A blank keyword matches everything.
    pub fn search(&self, keyword: &str) -> Vec<ProductReadModel> {
        let needle = keyword.trim().to_lowercase();
        let mut products: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|p| {
                needle.is_empty()
                    || [&p.name, &p.category, &p.description]
                        .into_iter()
                        .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect();
        sort_newest_first(&mut products);
        products
    }

    pub fn latest(&self, limit: usize) -> Vec<ProductReadModel> {
        let mut products = self.list(None);
        products.truncate(limit);
        products
    }

    pub fn list_by_owner(&self, owner: UserId) -> Vec<ProductReadModel> {
        let mut products: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|p| p.owner_id == owner)
            .collect();
        sort_newest_first(&mut products);
        products
    }
}

fn sort_newest_first(products: &mut [ProductReadModel]) {
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.product_id.cmp(&a.product_id)));
}

impl<S> Projection for ProductProjection<S>
where
    S: KeyedStore<ProductId, ProductReadModel>,
{
    fn aggregate_type(&self) -> &'static str {
        dealspark_catalog::AGGREGATE_TYPE
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != self.aggregate_type() {
            return Ok(());
        }

        self.cursors
            .apply_next(envelope.aggregate_id(), envelope.sequence_number(), || {
                let ev: ProductEvent = decode(envelope)?;
                if ev.product_id().aggregate_id() != envelope.aggregate_id() {
                    return Err(ProjectionError::StreamMismatch(
                        "event product_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                match ev {
                    ProductEvent::ProductCreated(e) => {
                        self.store.upsert(
                            e.product_id,
                            ProductReadModel {
                                product_id: e.product_id,
                                owner_id: e.owner_id,
                                name: e.name,
                                description: e.description,
                                category: e.category,
                                deal_price: e.deal_price,
                                original_price: e.original_price,
                                created_at: e.occurred_at,
                            },
                        );
                    }
                    ProductEvent::DealPriceChanged(e) => {
                        let Some(mut rm) = self.store.get(&e.product_id) else {
                            return Err(ProjectionError::StreamMismatch(format!(
                                "price change for unknown product {}",
                                e.product_id
                            )));
                        };
                        rm.deal_price = e.deal_price;
                        self.store.upsert(e.product_id, rm);
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
