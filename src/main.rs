use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curriculum::api::router;
use curriculum::config::AppConfig;
use curriculum::db::{self, SqliteCurriculum};
use curriculum::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new_from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "curriculum=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::connect(&config.database_url).await?;
    let catalog = config.load_catalog()?;
    info!("loaded catalog with {} departments", catalog.departments().len());

    let state = AppState {
        db: pool.clone(),
        curriculum: Arc::new(SqliteCurriculum::new(pool)),
        catalog: Arc::new(catalog),
    };

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
