//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, bus and rental service wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use anyhow::Context;
use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use seasons_auth::Hs256JwtValidator;
use seasons_infra::{InMemoryStore, PostgresStore, RentalConfig, Store};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Uses Postgres when `DATABASE_URL` is configured, the in-memory store
/// otherwise.
pub async fn build_app(config: &RentalConfig) -> anyhow::Result<Router> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.db_max_connections)
                .await
                .context("connecting to postgres")?;
            store.migrate().await.context("applying schema")?;
            tracing::info!("using postgres store");
            Ok(router_for(store, config))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; state is kept in memory");
            Ok(router_for(InMemoryStore::new(), config))
        }
    }
}

/// Router over an already constructed store.
pub fn router_for<S: Store>(store: S, config: &RentalConfig) -> Router {
    let services = Arc::new(services::AppServices::new(store, config));
    with_services(services, config)
}

pub fn with_services<S: Store>(services: Arc<services::AppServices<S>>, config: &RentalConfig) -> Router {
    let jwt = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::router::<S>().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/catalog", routes::catalog::router::<S>())
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
