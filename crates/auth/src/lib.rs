//! `seasons-auth`: authentication/authorization boundary.
//!
//! Identity itself is issued elsewhere; this crate verifies bearer tokens and
//! answers "may this principal do that". Decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod roles;

pub use authorize::{AuthzError, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::{Permission, permissions_for_roles};
pub use roles::Role;
