use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};

use dealspark_catalog::ProductId;
use dealspark_core::Money;
use dealspark_infra::NewProduct;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

/// Browsing needs no account.
pub fn public_router() -> Router {
    Router::new()
        .route("/", get(list_products))
        .route("/search", get(search_products))
        .route("/deals", get(latest_deals))
        .route("/:id", get(get_product))
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product))
        .route("/mine", get(list_my_products))
        .route("/:id/price", patch(update_deal_price))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ProductQuery>,
) -> impl IntoResponse {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    let items = services
        .catalog
        .list(category)
        .into_iter()
        .map(dto::product_to_json)
        .collect::<Vec<_>>();
    Json(items)
}

pub async fn search_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::SearchQuery>,
) -> impl IntoResponse {
    let items = services
        .catalog
        .search(&query.q)
        .into_iter()
        .map(dto::product_to_json)
        .collect::<Vec<_>>();
    Json(items)
}

pub async fn latest_deals(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let items = services
        .catalog
        .latest_deals()
        .into_iter()
        .map(dto::product_to_json)
        .collect::<Vec<_>>();
    Json(items)
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.catalog.get(product_id) {
        Some(p) => (StatusCode::OK, Json(dto::product_to_json(p))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    if let Err(res) = authz::require_owner(&principal) {
        return res;
    }

    let input = NewProduct {
        name: body.name,
        description: body.description,
        category: body.category,
        deal_price: Money::new(body.deal_price),
        original_price: body.original_price.map(Money::new),
    };
    match services.catalog.create_product(principal.user_id(), input) {
        Ok(p) => (StatusCode::CREATED, Json(dto::product_to_json(p))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_my_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let items = services
        .catalog
        .list_by_owner(principal.user_id())
        .into_iter()
        .map(dto::product_to_json)
        .collect::<Vec<_>>();
    Json(items)
}

pub async fn update_deal_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::UpdateDealPriceRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services
        .catalog
        .update_deal_price(product_id, principal.user_id(), Money::new(body.deal_price))
    {
        Ok(p) => (StatusCode::OK, Json(dto::product_to_json(p))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
