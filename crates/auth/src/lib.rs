//! `dealspark-auth`: authentication boundary.
//!
//! Decodes bearer tokens into [`JwtClaims`] and validates their time window.
//! Decoupled from HTTP and storage.

pub mod claims;
pub mod jwt;
pub mod roles;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use roles::AccountRole;
