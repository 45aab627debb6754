//! Catalog application service and the narrow port the negotiation engine
//! reads products through.

use std::sync::Arc;

use chrono::Utc;

use dealspark_catalog::{
    AGGREGATE_TYPE, CreateProduct, Product, ProductCommand, ProductId, UpdateDealPrice,
};
use dealspark_core::{Money, UserId};

use crate::command_dispatcher::SharedDispatcher;
use crate::engine::EngineError;
use crate::projections::{ProductProjection, ProductReadModel, catch_up, rebuild};
use crate::read_model::InMemoryKeyedStore;

/// What an offer needs to know about a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub owner_id: UserId,
    pub name: String,
    pub deal_price: Money,
}

pub trait CatalogStore: Send + Sync {
    fn get_product(&self, product_id: ProductId) -> Option<CatalogEntry>;
}

impl<T> CatalogStore for Arc<T>
where
    T: CatalogStore + ?Sized,
{
    fn get_product(&self, product_id: ProductId) -> Option<CatalogEntry> {
        (**self).get_product(product_id)
    }
}

/// Input for [`CatalogService::create_product`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category: String,
    pub deal_price: Money,
    pub original_price: Option<Money>,
}

/// How many products `latest_deals` returns.
pub const LATEST_DEALS: usize = 3;

type ProductStore = Arc<InMemoryKeyedStore<ProductId, ProductReadModel>>;

#[derive(Debug)]
pub struct CatalogService {
    dispatcher: Arc<SharedDispatcher>,
    products: ProductProjection<ProductStore>,
}

impl CatalogService {
    pub fn new(dispatcher: Arc<SharedDispatcher>) -> Self {
        Self {
            dispatcher,
            products: ProductProjection::new(Arc::new(InMemoryKeyedStore::new())),
        }
    }

    /// Replay every product stream into the read model.
    pub fn rebuild(&self) -> Result<usize, EngineError> {
        Ok(rebuild(self.dispatcher.store(), &self.products)?)
    }

    pub fn create_product(&self, owner: UserId, input: NewProduct) -> Result<ProductReadModel, EngineError> {
        let product_id = ProductId::generate();
        let cmd = ProductCommand::CreateProduct(CreateProduct {
            product_id,
            owner_id: owner,
            name: input.name,
            description: input.description,
            category: input.category,
            deal_price: input.deal_price,
            original_price: input.original_price,
            occurred_at: Utc::now(),
        });
        self.dispatch(product_id, cmd)
    }

    pub fn update_deal_price(
        &self,
        product_id: ProductId,
        actor: UserId,
        deal_price: Money,
    ) -> Result<ProductReadModel, EngineError> {
        let cmd = ProductCommand::UpdateDealPrice(UpdateDealPrice {
            product_id,
            actor,
            deal_price,
            occurred_at: Utc::now(),
        });
        self.dispatch(product_id, cmd)
    }

    pub fn get(&self, product_id: ProductId) -> Option<ProductReadModel> {
        self.products.get(&product_id)
    }

    pub fn list(&self, category: Option<&str>) -> Vec<ProductReadModel> {
        self.products.list(category)
    }

    pub fn list_by_owner(&self, owner: UserId) -> Vec<ProductReadModel> {
        self.products.list_by_owner(owner)
    }

    /// Keyword search over name, category and description.
    pub fn search(&self, keyword: &str) -> Vec<ProductReadModel> {
        self.products.search(keyword)
    }

    /// The most recently listed products.
    pub fn latest_deals(&self) -> Vec<ProductReadModel> {
        self.products.latest(LATEST_DEALS)
    }

    fn dispatch(&self, product_id: ProductId, cmd: ProductCommand) -> Result<ProductReadModel, EngineError> {
        self.dispatcher
            .dispatch(product_id.aggregate_id(), AGGREGATE_TYPE, cmd, |id| {
                Product::empty(ProductId::new(id))
            })?;
        catch_up(self.dispatcher.store(), &self.products, product_id.aggregate_id())?;
        self.products
            .get(&product_id)
            .ok_or_else(|| EngineError::NotFound("product not found".to_string()))
    }
}

impl CatalogStore for CatalogService {
    fn get_product(&self, product_id: ProductId) -> Option<CatalogEntry> {
        self.products.get(&product_id).map(|p| CatalogEntry {
            owner_id: p.owner_id,
            name: p.name,
            deal_price: p.deal_price,
        })
    }
}
