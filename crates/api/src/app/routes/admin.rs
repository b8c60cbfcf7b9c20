//! Operator endpoints: fleet intake and maintenance, box fulfilment,
//! subscription overview.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use seasons_auth::Permission;
use seasons_core::{BoxId, InventoryItemId};
use seasons_infra::{NewItem, Store};
use seasons_inventory::InventoryState;
use seasons_subscriptions::BoxStatus;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router<S: Store>() -> Router {
    Router::new()
        .route("/inventory/items", post(create_item::<S>).get(list_items::<S>))
        .route("/inventory/items/batch", post(create_batch::<S>))
        .route("/inventory/items/:id", get(get_item::<S>))
        .route("/inventory/items/:id/state", post(update_state::<S>))
        .route("/inventory/items/:id/retire", post(retire_item::<S>))
        .route("/inventory/stats", get(stats::<S>))
        .route("/subscriptions", get(list_subscriptions::<S>))
        .route("/boxes/:id/status", post(advance_box::<S>))
        .route("/boxes/:id/return", post(receive_return::<S>))
        .route("/boxes/:id/return-label", post(return_label::<S>))
}

fn new_item(body: dto::CreateItemRequest) -> Result<NewItem, Response> {
    Ok(NewItem {
        product: common::parse_slug(&body.product_slug)?,
        sku: common::parse_sku(&body.sku)?,
        condition_notes: body.condition_notes,
    })
}

fn item_response<S: Store>(
    services: &AppServices<S>,
    status: StatusCode,
    item: &seasons_inventory::InventoryItem,
) -> Response {
    let body = dto::InventoryItemResponse::from_item(item, services.clock.today());
    (status, Json(body)).into_response()
}

pub async fn create_item<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateItemRequest>,
) -> Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::INVENTORY_WRITE) {
        return resp;
    }
    let item = match new_item(body) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    match services.rental.ledger.register_item(item).await {
        Ok(item) => item_response(&services, StatusCode::CREATED, &item),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// All-or-nothing intake of several garments.
pub async fn create_batch<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateBatchRequest>,
) -> Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::INVENTORY_WRITE) {
        return resp;
    }
    let items = match body.items.into_iter().map(new_item).collect::<Result<Vec<_>, _>>() {
        Ok(items) => items,
        Err(resp) => return resp,
    };

    match services.rental.ledger.register_batch(items).await {
        Ok(items) => {
            let today = services.clock.today();
            let body: Vec<_> = items
                .iter()
                .map(|i| dto::InventoryItemResponse::from_item(i, today))
                .collect();
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_items<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ListItemsQuery>,
) -> Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    let product = match query.product.as_deref().map(common::parse_slug).transpose() {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match services.rental.ledger.list_items(product.as_ref()).await {
        Ok(items) => {
            let today = services.clock.today();
            let body: Vec<_> = items
                .iter()
                .map(|i| dto::InventoryItemResponse::from_item(i, today))
                .collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_item<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    let id: InventoryItemId = match common::parse(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.rental.ledger.get_item(id).await {
        Ok(item) => item_response(&services, StatusCode::OK, &item),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_state<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateStateRequest>,
) -> Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::INVENTORY_WRITE) {
        return resp;
    }
    let id: InventoryItemId = match common::parse(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let to: InventoryState = match common::parse(&body.state) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match services.rental.ledger.transition_state(id, to, body.notes).await {
        Ok(item) => item_response(&services, StatusCode::OK, &item),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn retire_item<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RetireRequest>,
) -> Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::INVENTORY_WRITE) {
        return resp;
    }
    let id: InventoryItemId = match common::parse(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.rental.ledger.retire(id, body.reason).await {
        Ok(item) => item_response(&services, StatusCode::OK, &item),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn stats<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }

    match services.rental.ledger.stats().await {
        Ok(stats) => {
            let body = serde_json::json!({
                "stats": stats,
                "allocatable": stats.allocatable(),
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_subscriptions<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::SUBSCRIPTIONS_READ) {
        return resp;
    }

    match services.rental.cycles.list_subscriptions().await {
        Ok(subs) => {
            let policy = services.rental.cycles.policy();
            let today = services.clock.today();
            let body: Vec<_> = subs
                .iter()
                .map(|s| dto::SubscriptionResponse::from_subscription(s, &policy, today))
                .collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn advance_box<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdvanceBoxRequest>,
) -> Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::FULFILMENT_WRITE) {
        return resp;
    }
    let id: BoxId = match common::parse(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let to: BoxStatus = match common::parse(&body.status) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match services.rental.cycles.advance_box(id, to).await {
        Ok(b) => (StatusCode::OK, Json(dto::BoxResponse::from_box(&b))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Garments are back at the warehouse: box `returned`, items quarantined.
pub async fn receive_return<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::FULFILMENT_WRITE) {
        return resp;
    }
    let id: BoxId = match common::parse(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.rental.cycles.receive_return(id).await {
        Ok(receipt) => (StatusCode::OK, Json(dto::ReturnResponse::from(&receipt))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn return_label<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReturnLabelRequest>,
) -> Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::FULFILMENT_WRITE) {
        return resp;
    }
    let id: BoxId = match common::parse(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.rental.cycles.record_return_label(id, body.url).await {
        Ok(b) => (StatusCode::OK, Json(dto::BoxResponse::from_box(&b))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
