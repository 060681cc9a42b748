pub mod medicines;
pub mod sales;

use axum::response::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::services::SaleService;

#[derive(Clone)]
pub struct AppState {
    pub sales: Arc<SaleService>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(sales: SaleService, jwt_secret: &str) -> Self {
        Self {
            sales: Arc::new(sales),
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
