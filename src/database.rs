use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::config::Config;

pub type Database = Pool<Postgres>;

pub async fn create_database_pool(config: &Config) -> Result<Database, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await?;

    log::info!("Connected to database successfully");
    Ok(pool)
}

pub async fn run_migrations(pool: &Database) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    log::info!("Database migrations are up to date");
    Ok(())
}
