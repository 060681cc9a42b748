pub mod medicine;
pub mod prescription;
pub mod role;
pub mod sale;
pub mod user;

use thiserror::Error;

pub use medicine::Medicine;
pub use prescription::{Prescription, PrescriptionPurchase, PurchaseStatus};
pub use role::Role;
pub use sale::{
    Allocation, AllocationError, DateRange, DirectSaleRequest, LocationTotals, Pagination,
    PrescriptionSaleRequest, PurchaseLocation, Sale, SaleDetail, SaleFilter, SalePricing,
    SaleStatus, SalesSummary, SplitDetails, TopMedicine,
};
pub use user::User;

// Enum columns are stored as text; a value outside the known set is a decode error.
#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
