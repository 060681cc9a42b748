use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub current_stock: i32,
    pub minimum_stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.minimum_stock
    }
}
