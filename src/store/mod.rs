//! Data access for the sales workflow.
//!
//! [`SaleStore`] is injected into the sale service as a trait object. Every
//! write method is a single atomic unit: either all of its rows change or none
//! do.

pub mod postgres;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    DateRange, Medicine, Pagination, Prescription, PrescriptionPurchase, Sale, SaleDetail,
    SaleFilter, SalesSummary, User,
};

pub use postgres::PgSaleStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("sale is already cancelled")]
    AlreadyCancelled,

    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i32, requested: i32 },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct RecordedSale {
    pub sale: SaleDetail,
    /// Stock left after the decrement, `None` when no clinic stock was used.
    pub stock_after_sale: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CancelledSale {
    pub sale: SaleDetail,
    pub restored_stock: i32,
}

#[async_trait]
pub trait SaleStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_medicine(&self, id: Uuid) -> Result<Option<Medicine>, StoreError>;

    async fn find_prescription(&self, id: Uuid) -> Result<Option<Prescription>, StoreError>;

    async fn find_sale(&self, id: Uuid) -> Result<Option<SaleDetail>, StoreError>;

    /// Inserts `sale`, takes `sale.quantity_in_clinic` units out of stock only if
    /// that many are still available, and applies `purchase` to its prescription.
    async fn record_sale(
        &self,
        sale: &Sale,
        purchase: Option<&PrescriptionPurchase>,
    ) -> Result<RecordedSale, StoreError>;

    /// Marks the sale cancelled, gives back [`Sale::stock_to_restore`] units and
    /// resets the linked prescription to not purchased.
    async fn cancel_sale(&self, id: Uuid, cancelled_by: Uuid) -> Result<CancelledSale, StoreError>;

    /// Matching sales, newest first, plus the total count before pagination.
    async fn list_sales(
        &self,
        filter: &SaleFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<SaleDetail>, i64), StoreError>;

    async fn sales_summary(&self, range: &DateRange) -> Result<SalesSummary, StoreError>;

    async fn low_stock_medicines(&self) -> Result<Vec<Medicine>, StoreError>;
}
