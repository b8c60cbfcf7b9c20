//! Pre-subscription cart of the calling user.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use seasons_auth::Permission;
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
}

pub async fn add_item<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::AddItemRequest>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::RENTAL_SELF_SERVICE) {
        return resp;
    }
    let slug = match common::parse_slug(&body.product_slug) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let key = BasketKey::Cart(principal.user_id());
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
    if let Err(resp) = crate::authz::require(&principal, &Permission::RENTAL_SELF_SERVICE) {
        return resp;
    }
    let slug = match common::parse_slug(&slug) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let key = BasketKey::Cart(principal.user_id());
    match services.rental.baskets.remove(key, &slug).await {
        Ok(removed) => (StatusCode::OK, Json(dto::RemovedResponse { removed })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn count<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::RENTAL_SELF_SERVICE) {
        return resp;
    }

    let key = BasketKey::Cart(principal.user_id());
    match services.rental.baskets.count(key).await {
        Ok(count) => (StatusCode::OK, Json(dto::CountResponse { count })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::RENTAL_SELF_SERVICE) {
        return resp;
    }

    let key = BasketKey::Cart(principal.user_id());
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
    if let Err(resp) = crate::authz::require(&principal, &Permission::RENTAL_SELF_SERVICE) {
        return resp;
    }

    let key = BasketKey::Cart(principal.user_id());
    match services.rental.baskets.clear(key).await {
        Ok(cleared) => (StatusCode::OK, Json(dto::ClearedResponse { cleared })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
