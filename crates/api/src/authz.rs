//! Role checks at the HTTP boundary.
//!
//! Offer authorization (buyer vs owner of a particular offer) belongs to the
//! negotiation domain; the only account-level rule is that listing products
//! is reserved to owner accounts.

use axum::http::StatusCode;
use axum::response::Response;

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

pub fn require_owner(principal: &PrincipalContext) -> Result<(), Response> {
    if principal.role().is_owner() {
        Ok(())
    } else {
        Err(json_error(
            StatusCode::FORBIDDEN,
            "unauthorized",
            "only owner accounts can do this",
        ))
    }
}
