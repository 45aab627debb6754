use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use dealspark_catalog::ProductId;
use dealspark_core::Money;
use dealspark_infra::NewOrder;
use dealspark_orders::{OrderId, OrderItem};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/:id", get(get_order).delete(delete_order))
}

pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<dto::PlaceOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let mut items = Vec::with_capacity(body.items.len());
    for item in body.items {
        let product_id: ProductId = match errors::parse_id(&item.product_id, "product") {
            Ok(v) => v,
            Err(res) => return res,
        };
        items.push(OrderItem {
            product_id,
            quantity: item.quantity,
            price: Money::new(item.price),
        });
    }

    let input = NewOrder {
        items,
        total_amount: Money::new(body.total_amount),
        shipping_address: body.shipping_address.into(),
        payment_intent_id: body.payment_intent_id,
        delivery_date: body.delivery_date,
    };
    match services.orders.place(principal.user_id(), input) {
        Ok(order) => (StatusCode::CREATED, Json(dto::order_to_json(order))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let orders = services
        .orders
        .list_mine(principal.user_id())
        .into_iter()
        .map(dto::order_to_json)
        .collect::<Vec<_>>();
    Json(orders)
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.orders.get(order_id, principal.user_id()) {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(order))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.orders.remove(order_id, principal.user_id()) {
        Ok(()) => (StatusCode::OK, Json(json!({ "message": "Order removed" }))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
