use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use dealspark_core::Money;
use dealspark_infra::projections::{OfferReadModel, OrderReadModel, ProductReadModel};
use dealspark_negotiation::OfferAction;
use dealspark_orders::{OrderStatus, ShippingAddress};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferRequest {
    pub product_id: String,
    pub offered_price: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOfferRequest {
    pub status: String,
    pub counter_price: Option<u64>,
}

impl UpdateOfferRequest {
    /// The requested action and, for counters only, its price.
    pub fn action(&self) -> Option<(OfferAction, Option<Money>)> {
        match self.status.as_str() {
            "accepted" => Some((OfferAction::Accept, None)),
            "rejected" => Some((OfferAction::Reject, None)),
            "countered" => Some((OfferAction::Counter, self.counter_price.map(Money::new))),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub deal_price: u64,
    pub original_price: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDealPriceRequest {
    pub deal_price: u64,
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
    pub price: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShippingAddressRequest {
    pub street: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
    pub phone: String,
}

impl From<ShippingAddressRequest> for ShippingAddress {
    fn from(a: ShippingAddressRequest) -> Self {
        ShippingAddress {
            street: a.street,
            city: a.city,
            state: a.state,
            pincode: a.pincode,
            country: a.country,
            phone: a.phone,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub total_amount: u64,
    #[serde(default)]
    pub shipping_address: ShippingAddressRequest,
    pub payment_intent_id: String,
    pub delivery_date: Option<DateTime<Utc>>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn offer_to_json(o: OfferReadModel, product: Option<ProductReadModel>) -> JsonValue {
    let history = o
        .history
        .iter()
        .map(|h| {
            json!({
                "by": h.by.as_str(),
                "price": h.price.map(Money::amount),
                "note": h.note,
                "timestamp": h.timestamp.to_rfc3339(),
            })
        })
        .collect::<Vec<_>>();

    json!({
        "id": o.offer_id.to_string(),
        "productId": o.product_id.to_string(),
        "buyerId": o.buyer_id.to_string(),
        "ownerId": o.owner_id.to_string(),
        "offeredPrice": o.offered_price.amount(),
        "counterPrice": o.counter_price.map(Money::amount),
        "status": o.status.as_str(),
        "history": history,
        "seenByOwner": o.seen_by_owner,
        "seenByBuyer": o.seen_by_buyer,
        "createdAt": o.created_at.to_rfc3339(),
        "updatedAt": o.updated_at.to_rfc3339(),
        "product": product.map(|p| json!({
            "name": p.name,
            "dealPrice": p.deal_price.amount(),
        })),
    })
}

pub fn product_to_json(p: ProductReadModel) -> JsonValue {
    json!({
        "id": p.product_id.to_string(),
        "ownerId": p.owner_id.to_string(),
        "name": p.name,
        "description": p.description,
        "category": p.category,
        "dealPrice": p.deal_price.amount(),
        "originalPrice": p.original_price.map(Money::amount),
        "createdAt": p.created_at.to_rfc3339(),
    })
}

pub fn order_to_json(o: OrderReadModel) -> JsonValue {
    let items = o
        .items
        .iter()
        .map(|i| {
            json!({
                "productId": i.product_id.to_string(),
                "quantity": i.quantity,
                "price": i.price.amount(),
            })
        })
        .collect::<Vec<_>>();
    let a = &o.shipping_address;

    json!({
        "id": o.order_id.to_string(),
        "buyerId": o.buyer_id.to_string(),
        "items": items,
        "totalAmount": o.total_amount.amount(),
        "shippingAddress": {
            "street": a.street,
            "city": a.city,
            "state": a.state,
            "pincode": a.pincode,
            "country": a.country,
            "phone": a.phone,
        },
        "paymentIntentId": o.payment_intent_id,
        "deliveryDate": o.delivery_date.map(|d| d.to_rfc3339()),
        "status": match o.status {
            OrderStatus::Processing => "processing",
        },
        "createdAt": o.created_at.to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_maps_to_action() {
        let req = |status: &str, price| UpdateOfferRequest {
            status: status.to_string(),
            counter_price: price,
        };
        assert_eq!(req("accepted", Some(5)).action(), Some((OfferAction::Accept, None)));
        assert_eq!(req("rejected", None).action(), Some((OfferAction::Reject, None)));
        assert_eq!(
            req("countered", Some(990)).action(),
            Some((OfferAction::Counter, Some(Money::new(990))))
        );
        assert_eq!(req("countered", None).action(), Some((OfferAction::Counter, None)));
        assert_eq!(req("pending", None).action(), None);
    }
}
