//! API-side authorization guard.
//!
//! Checked in each handler before any service call, keeping the services
//! and the domain auth-agnostic.

use axum::http::StatusCode;
use axum::response::Response;

use seasons_auth::{Permission, authorize};

use crate::app::errors;
use crate::context::PrincipalContext;

/// `Err` carries the ready 403 response.
pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), Response> {
    authorize(&principal.principal(), permission)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}
