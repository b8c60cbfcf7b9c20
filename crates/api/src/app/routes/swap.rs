//! Next-cycle selection for the caller's live subscription.
//!
//! Every handler resolves the subscription first; a caller without one gets
//! `no_subscription`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};

use seasons_auth::Permission;
use seasons_core::SubscriptionId;
use seasons_infra::Store;
use seasons_subscriptions::BasketKey;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router<S: Store>() -> Router {
    Router::new()
        .route("/", get(list::<S>).delete(clear::<S>))
        .route("/count", get(count::<S>))
        .route("/items", post(add_item::<S>))
        .route("/items/:slug", delete(remove_item::<S>))
        .route("/confirm", post(confirm::<S>))
}

async fn live_subscription<S: Store>(
    services: &AppServices<S>,
    principal: &PrincipalContext,
) -> Result<SubscriptionId, Response> {
    crate::authz::require(principal, &Permission::RENTAL_SELF_SERVICE)?;
    services
        .rental
        .cycles
        .live_subscription_for_user(principal.user_id())
        .await
        .map(|sub| sub.id_typed())
        .map_err(errors::service_error_to_response)
}

async fn swap_key<S: Store>(
    services: &AppServices<S>,
    principal: &PrincipalContext,
) -> Result<BasketKey, Response> {
    live_subscription(services, principal).await.map(BasketKey::Swap)
}

pub async fn add_item<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::AddItemRequest>,
) -> axum::response::Response {
    let key = match swap_key(&services, &principal).await {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let slug = match common::parse_slug(&body.product_slug) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match services.rental.baskets.add(key, slug).await {
        Ok(basket) => (
            StatusCode::CREATED,
            Json(dto::BasketResponse::from_basket(&basket, services.box_size)),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_item<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(slug): Path<String>,
) -> axum::response::Response {
    let key = match swap_key(&services, &principal).await {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let slug = match common::parse_slug(&slug) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match services.rental.baskets.remove(key, &slug).await {
        Ok(removed) => (StatusCode::OK, Json(dto::RemovedResponse { removed })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn count<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let key = match swap_key(&services, &principal).await {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services.rental.baskets.count(key).await {
        Ok(count) => (StatusCode::OK, Json(dto::CountResponse { count })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let key = match swap_key(&services, &principal).await {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services.rental.baskets.list(key).await {
        Ok(basket) => (
            StatusCode::OK,
            Json(dto::BasketResponse::from_basket(&basket, services.box_size)),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn clear<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let key = match swap_key(&services, &principal).await {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services.rental.baskets.clear(key).await {
        Ok(cleared) => (StatusCode::OK, Json(dto::ClearedResponse { cleared })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Turn the swap selection into next cycle's box.
///
/// The box currently with the customer must be `active` (delivered); a box
/// still `confirmed` or `shipped` yields 422 `invalid_transition` and nothing
/// changes. An incomplete selection is 422 `incomplete_selection`.
pub async fn confirm<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let subscription_id = match live_subscription(&services, &principal).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.rental.cycles.confirm_swap(subscription_id).await {
        Ok(receipt) => (StatusCode::CREATED, Json(dto::SwapResponse::from(&receipt))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
