use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde_json::json;

use dealspark_catalog::ProductId;
use dealspark_core::Money;
use dealspark_infra::projections::OfferReadModel;
use dealspark_negotiation::{OfferId, Party};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_offer))
        .route("/my-offer/:product_id", get(my_offer))
        .route("/buyer", get(list_buyer_offers))
        .route("/owner", get(list_owner_offers))
        .route("/buyer/count", get(count_buyer_offers))
        .route("/owner/count", get(count_owner_offers))
        .route("/buyer/mark-seen", post(mark_seen_buyer))
        .route("/owner/mark-seen", post(mark_seen_owner))
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/:id", patch(update_offer).delete(delete_offer))
}

fn render(services: &AppServices, offer: OfferReadModel) -> serde_json::Value {
    let product = services.catalog.get(offer.product_id);
    dto::offer_to_json(offer, product)
}

pub async fn create_offer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<dto::CreateOfferRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let product_id: ProductId = match errors::parse_id(&body.product_id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .engine
        .create_offer(product_id, principal.user_id(), Money::new(body.offered_price))
    {
        Ok(offer) => (StatusCode::OK, Json(render(&services, offer))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// The caller's offer on one product, or `null`.
pub async fn my_offer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&product_id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let offer = services
        .engine
        .offer_for_product(principal.user_id(), product_id)
        .map(|o| render(&services, o));
    (StatusCode::OK, Json(offer)).into_response()
}

fn list_offers(services: &AppServices, principal: &PrincipalContext, party: Party) -> axum::response::Response {
    let offers = services
        .engine
        .offers_for(principal.user_id(), party)
        .into_iter()
        .map(|o| render(services, o))
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(offers)).into_response()
}

pub async fn list_buyer_offers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    list_offers(&services, &principal, Party::Buyer)
}

pub async fn list_owner_offers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    list_offers(&services, &principal, Party::Owner)
}

pub async fn count_buyer_offers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let count = services.engine.count_active(principal.user_id(), Party::Buyer);
    Json(json!({ "count": count }))
}

pub async fn count_owner_offers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let count = services.engine.count_active(principal.user_id(), Party::Owner);
    Json(json!({ "count": count }))
}

fn mark_seen(services: &AppServices, principal: &PrincipalContext, party: Party) -> axum::response::Response {
    match services.engine.mark_seen(principal.user_id(), party) {
        Ok(updated) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Offers marked as seen",
                "updated": updated,
            })),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn mark_seen_buyer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    mark_seen(&services, &principal, Party::Buyer)
}

pub async fn mark_seen_owner(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    mark_seen(&services, &principal, Party::Owner)
}

pub async fn update_offer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::UpdateOfferRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let offer_id: OfferId = match errors::parse_id(&id, "offer") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let Some((action, price)) = body.action() else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "status must be one of: accepted, rejected, countered",
        );
    };

    match services
        .engine
        .transition(offer_id, principal.user_id(), action, price)
    {
        Ok(offer) => (StatusCode::OK, Json(render(&services, offer))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn delete_offer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let offer_id: OfferId = match errors::parse_id(&id, "offer") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.engine.delete_offer(offer_id, principal.user_id()) {
        Ok(()) => (StatusCode::OK, Json(json!({ "message": "Offer removed" }))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn create_payment_intent(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::PaymentIntentRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    match services.payments.create_intent(Money::new(body.amount)).await {
        Ok(intent) => (
            StatusCode::OK,
            Json(json!({
                "clientSecret": intent.client_secret,
                "paymentIntentId": intent.id,
            })),
        )
            .into_response(),
        Err(e) => errors::payment_error_to_response(e),
    }
}
