use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dealspark_core::{Aggregate, AggregateRoot, DomainError, Money, UserId, aggregate_newtype};
use dealspark_events::Event;

/// Stream type for product aggregates.
pub const AGGREGATE_TYPE: &str = "catalog.product";

aggregate_newtype!(
    /// Product identifier.
    ProductId
);

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    owner_id: Option<UserId>,
    name: String,
    description: String,
    category: String,
    deal_price: Money,
    original_price: Option<Money>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            owner_id: None,
            name: String::new(),
            description: String::new(),
            category: String::new(),
            deal_price: Money::ZERO,
            original_price: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn owner_id(&self) -> Option<UserId> {
        self.owner_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn deal_price(&self) -> Money {
        self.deal_price
    }

    pub fn original_price(&self) -> Option<Money> {
        self.original_price
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub deal_price: Money,
    pub original_price: Option<Money>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDealPrice (owner only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDealPrice {
    pub product_id: ProductId,
    pub actor: UserId,
    pub deal_price: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateDealPrice(UpdateDealPrice),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub deal_price: Money,
    pub original_price: Option<Money>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DealPriceChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealPriceChanged {
    pub product_id: ProductId,
    pub previous: Money,
    pub deal_price: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    DealPriceChanged(DealPriceChanged),
}

impl ProductEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::DealPriceChanged(e) => e.product_id,
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::DealPriceChanged(_) => "catalog.product.deal_price_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::DealPriceChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.owner_id = Some(e.owner_id);
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.category = e.category.clone();
                self.deal_price = e.deal_price;
                self.original_price = e.original_price;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ProductEvent::DealPriceChanged(e) => {
                self.deal_price = e.deal_price;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateDealPrice(cmd) => self.handle_update_price(cmd),
        }
    }
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::validation("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_prices(deal_price: Money, original_price: Option<Money>) -> Result<(), DomainError> {
        if deal_price.is_zero() {
            return Err(DomainError::validation("deal price must be positive"));
        }
        if let Some(original) = original_price {
            if original < deal_price {
                return Err(DomainError::validation(
                    "original price cannot be lower than the deal price",
                ));
            }
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        self.ensure_product_id(cmd.product_id)?;

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Self::ensure_prices(cmd.deal_price, cmd.original_price)?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            owner_id: cmd.owner_id,
            name: cmd.name.trim().to_string(),
            description: cmd.description.clone(),
            category: cmd.category.trim().to_string(),
            deal_price: cmd.deal_price,
            original_price: cmd.original_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_price(&self, cmd: &UpdateDealPrice) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if self.owner_id != Some(cmd.actor) {
            return Err(DomainError::unauthorized("only the product owner may change its price"));
        }
        Self::ensure_prices(cmd.deal_price, self.original_price)?;

        if cmd.deal_price == self.deal_price {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::DealPriceChanged(DealPriceChanged {
            product_id: cmd.product_id,
            previous: self.deal_price,
            deal_price: cmd.deal_price,
            occurred_at: cmd.occurred_at,
        })])
    }
}
