//! The caller's boxes: the one currently open and the full history.

use std::sync::Arc;

use axum::{Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::get};

use seasons_auth::Permission;
use seasons_infra::Store;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router<S: Store>() -> Router {
    Router::new()
        .route("/current", get(current::<S>))
        .route("/history", get(history::<S>))
}

pub async fn current<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::RENTAL_SELF_SERVICE) {
        return resp;
    }

    let cycles = &services.rental.cycles;
    let sub = match cycles.subscription_for_user(principal.user_id()).await {
        Ok(s) => s,
        Err(e) => return errors::service_error_to_response(e),
    };

    match cycles.current_box(sub.id_typed()).await {
        Ok(view) => {
            let body = dto::CurrentBoxResponse {
                current: view.as_ref().map(dto::BoxResponse::from_view),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn history<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::RENTAL_SELF_SERVICE) {
        return resp;
    }

    let cycles = &services.rental.cycles;
    let sub = match cycles.subscription_for_user(principal.user_id()).await {
        Ok(s) => s,
        Err(e) => return errors::service_error_to_response(e),
    };

    match cycles.box_history(sub.id_typed()).await {
        Ok(views) => {
            let body: Vec<_> = views.iter().map(dto::BoxResponse::from_view).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
