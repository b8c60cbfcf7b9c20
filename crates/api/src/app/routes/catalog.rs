//! Public catalogue endpoints (no token required).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use seasons_infra::Store;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router<S: Store>() -> Router {
    Router::new().route("/availability", get(availability::<S>))
}

/// Eligible stock per product; unknown products report zero.
pub async fn availability<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(query): Query<dto::AvailabilityQuery>,
) -> axum::response::Response {
    let slugs = match common::parse_slug_list(&query.slugs) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match services.rental.ledger.availability(&slugs).await {
        Ok(counts) => {
            let availability = counts
                .into_iter()
                .map(|(slug, count)| (slug.to_string(), count))
                .collect();
            (StatusCode::OK, Json(dto::AvailabilityResponse { availability })).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
