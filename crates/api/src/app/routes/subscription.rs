//! Checkout and plan management for the calling user.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use seasons_auth::Permission;
use seasons_infra::{ServiceResult, Store};
use seasons_subscriptions::{ShippingDetails, Subscription};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router<S: Store>() -> Router {
    Router::new()
        .route("/", post(checkout::<S>).get(current::<S>))
        .route("/pause", post(pause::<S>))
        .route("/resume", post(resume::<S>))
        .route("/cancel", post(cancel::<S>))
}

/// Create the subscription and box #1 from a full cart.
pub async fn checkout<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CheckoutRequest>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::RENTAL_SELF_SERVICE) {
        return resp;
    }
    let shipping = match ShippingDetails::new(body.shipping_address, body.phone) {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .rental
        .cycles
        .create_subscription_from_basket(principal.user_id(), shipping)
        .await
    {
        Ok(receipt) => {
            let policy = services.rental.cycles.policy();
            let body = dto::CheckoutResponse::from_receipt(&receipt, &policy, services.clock.today());
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn current<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, &Permission::RENTAL_SELF_SERVICE) {
        return resp;
    }

    let result = services
        .rental
        .cycles
        .subscription_for_user(principal.user_id())
        .await;
    subscription_response(&services, result)
}

pub async fn pause<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    change_status(&services, &principal, Transition::Pause).await
}

pub async fn resume<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    change_status(&services, &principal, Transition::Resume).await
}

pub async fn cancel<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    change_status(&services, &principal, Transition::Cancel).await
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Pause,
    Resume,
    Cancel,
}

async fn change_status<S: Store>(
    services: &AppServices<S>,
    principal: &PrincipalContext,
    transition: Transition,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(principal, &Permission::RENTAL_SELF_SERVICE) {
        return resp;
    }

    let cycles = &services.rental.cycles;
    let id = match cycles.live_subscription_for_user(principal.user_id()).await {
        Ok(sub) => sub.id_typed(),
        Err(e) => return errors::service_error_to_response(e),
    };

    let result = match transition {
        Transition::Pause => cycles.pause(id).await,
        Transition::Resume => cycles.resume(id).await,
        Transition::Cancel => cycles.cancel(id).await,
    };
    subscription_response(services, result)
}

fn subscription_response<S: Store>(
    services: &AppServices<S>,
    result: ServiceResult<Subscription>,
) -> axum::response::Response {
    match result {
        Ok(sub) => {
            let policy = services.rental.cycles.policy();
            let body = dto::SubscriptionResponse::from_subscription(&sub, &policy, services.clock.today());
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
