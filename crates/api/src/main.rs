use anyhow::Context;

use seasons_infra::RentalConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the environment.
    let _ = dotenvy::dotenv();
    seasons_observability::init();

    let config = RentalConfig::from_env().context("loading configuration")?;
    tracing::info!(?config, "configuration loaded");

    let app = seasons_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
