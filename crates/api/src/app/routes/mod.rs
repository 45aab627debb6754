use axum::{Router, routing::get};

pub mod offers;
pub mod orders;
pub mod products;
pub mod system;

/// Router for endpoints that need no token.
pub fn public_router() -> Router {
    Router::new().nest("/products", products::public_router())
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/offers", offers::router())
        .nest("/orders", orders::router())
        .nest("/products", products::router())
}
