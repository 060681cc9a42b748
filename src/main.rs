mod config;
mod database;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod store;
mod utils;

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
};

use config::Config;
use database::{create_database_pool, run_migrations};
use handlers::AppState;
use services::SaleService;
use store::{PgSaleStore, SaleStore};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let db = create_database_pool(&config).await
        .context("failed to connect to database")?;

    if config.run_migrations {
        run_migrations(&db).await
            .context("failed to run database migrations")?;
    }

    let store: Arc<dyn SaleStore> = Arc::new(PgSaleStore::new(db));
    let state = AppState::new(SaleService::new(store), &config.jwt_secret);

    // Build the application router
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Vet clinic sales server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))

        // Medicine sales
        .route("/api/medicine-sales", get(handlers::sales::list_sales))
        .route("/api/medicine-sales/summary", get(handlers::sales::sales_summary))
        .route("/api/medicine-sales/from-prescription", post(handlers::sales::create_sale_from_prescription))
        .route("/api/medicine-sales/direct", post(handlers::sales::create_direct_sale))
        .route("/api/medicine-sales/:id", get(handlers::sales::get_sale))
        .route("/api/medicine-sales/:id/cancel", put(handlers::sales::cancel_sale))

        // Inventory
        .route("/api/medicines/low-stock", get(handlers::medicines::low_stock))

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
        )
        .with_state(state)
}
