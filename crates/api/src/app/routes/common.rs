//! Small helpers shared by the handlers.

use std::str::FromStr;

use axum::response::Response;

use seasons_core::{DomainError, ProductSlug, Sku};

use crate::app::errors;

pub fn parse_slug(raw: &str) -> Result<ProductSlug, Response> {
    ProductSlug::parse(raw).map_err(errors::domain_error_to_response)
}

pub fn parse_sku(raw: &str) -> Result<Sku, Response> {
    Sku::parse(raw).map_err(errors::domain_error_to_response)
}

/// Ids, states and statuses all parse through `FromStr<Err = DomainError>`.
pub fn parse<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(errors::domain_error_to_response)
}

/// `"a, b,,c"` -> `[a, b, c]`; blank entries are skipped.
pub fn parse_slug_list(raw: &str) -> Result<Vec<ProductSlug>, Response> {
    let slugs = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_slug)
        .collect::<Result<Vec<_>, _>>()?;

    if slugs.is_empty() {
        return Err(errors::domain_error_to_response(DomainError::validation(
            "at least one product slug is required",
        )));
    }
    Ok(slugs)
}
