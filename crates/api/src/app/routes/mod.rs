use axum::{Router, routing::get};

use seasons_infra::Store;

pub mod admin;
pub mod basket;
pub mod boxes;
pub mod catalog;
pub mod common;
pub mod subscription;
pub mod swap;
pub mod system;

/// Routes behind the bearer-token middleware.
pub fn router<S: Store>() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/basket", basket::router::<S>())
        .nest("/subscription", subscription::router::<S>())
        .nest("/swap", swap::router::<S>())
        .nest("/boxes", boxes::router::<S>())
        .nest("/admin", admin::router::<S>())
}
