use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use super::{ParseEnumError, PurchaseStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseLocation {
    InClinic,
    External,
    Split,
}

impl PurchaseLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseLocation::InClinic => "in_clinic",
            PurchaseLocation::External => "external",
            PurchaseLocation::Split => "split",
        }
    }

    /// Status recorded on the prescription once a sale at this location commits.
    pub fn prescription_status(&self) -> PurchaseStatus {
        match self {
            PurchaseLocation::InClinic | PurchaseLocation::Split => PurchaseStatus::PurchasedInClinic,
            PurchaseLocation::External => PurchaseStatus::PurchasedExternal,
        }
    }
}

impl FromStr for PurchaseLocation {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_clinic" => Ok(PurchaseLocation::InClinic),
            "external" => Ok(PurchaseLocation::External),
            "split" => Ok(PurchaseLocation::Split),
            other => Err(ParseEnumError::new("purchase location", other)),
        }
    }
}

impl TryFrom<String> for PurchaseLocation {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
            SaleStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for SaleStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SaleStatus::Pending),
            "completed" => Ok(SaleStatus::Completed),
            "cancelled" => Ok(SaleStatus::Cancelled),
            "refunded" => Ok(SaleStatus::Refunded),
            other => Err(ParseEnumError::new("sale status", other)),
        }
    }
}

impl TryFrom<String> for SaleStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub prescription_id: Option<Uuid>,
    pub medicine_id: Uuid,
    pub client_id: Uuid,
    pub pet_id: Option<Uuid>,
    pub quantity: i32,
    pub quantity_in_clinic: i32,
    pub quantity_external: i32,
    pub unit_price: Decimal,
    pub discount_percentage: Decimal,
    pub total_price: Decimal,
    pub discount_amount: Decimal,
    pub final_price: Decimal,
    #[sqlx(try_from = "String")]
    pub purchase_location: PurchaseLocation,
    #[sqlx(try_from = "String")]
    pub status: SaleStatus,
    pub external_pharmacy: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// True when clinic stock was actually consumed by this sale.
    pub fn affects_inventory(&self) -> bool {
        self.status == SaleStatus::Completed && self.quantity_in_clinic > 0
    }

    /// Units handed back to clinic stock if this sale is cancelled.
    pub fn stock_to_restore(&self) -> i32 {
        if self.affects_inventory() {
            self.quantity_in_clinic
        } else {
            0
        }
    }
}

/// A sale with the names of its medicine and client joined in.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub sale: Sale,
    pub medicine_name: String,
    pub client_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(i32),
    #[error("Split purchases require both quantityInClinic and quantityExternal")]
    MissingSplitQuantities,
    #[error("Split quantities cannot be negative")]
    NegativeSplitQuantity,
    #[error("Split amounts do not match: {in_clinic} in clinic + {external} external must equal the total quantity of {quantity}")]
    SplitMismatch { in_clinic: i32, external: i32, quantity: i32 },
    #[error("{}", insufficient_stock_message(.available, .requested))]
    InsufficientStock { available: i32, requested: i32 },
    #[error("Insufficient stock for the in-clinic portion: current stock is {available}, {in_clinic} requested in clinic. Suggested split: {available} in clinic, {} external", remainder(.quantity, .available))]
    InsufficientStockForSplit { available: i32, in_clinic: i32, quantity: i32 },
}

fn remainder(quantity: &i32, available: &i32) -> i32 {
    quantity - available
}

fn insufficient_stock_message(available: &i32, requested: &i32) -> String {
    let (available, requested) = (*available, *requested);
    if available > 0 {
        format!(
            "Insufficient stock: {} available, {} requested. Suggested split purchase: {} in clinic, {} external",
            available,
            requested,
            available,
            requested - available
        )
    } else {
        format!(
            "Insufficient stock: none available, {} requested. Suggested: purchase all {} externally",
            requested, requested
        )
    }
}

/// How a requested quantity is divided between clinic stock and an outside pharmacy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub location: PurchaseLocation,
    pub quantity: i32,
    pub in_clinic: i32,
    pub external: i32,
}

impl Allocation {
    /// Resolves the in-clinic and external portions for a purchase location and
    /// checks the in-clinic portion against `current_stock`.
    pub fn resolve(
        location: PurchaseLocation,
        quantity: i32,
        split: Option<(i32, i32)>,
        current_stock: i32,
    ) -> Result<Self, AllocationError> {
        if quantity < 1 {
            return Err(AllocationError::InvalidQuantity(quantity));
        }

        let (in_clinic, external) = match location {
            PurchaseLocation::InClinic => {
                if quantity > current_stock {
                    return Err(AllocationError::InsufficientStock {
                        available: current_stock.max(0),
                        requested: quantity,
                    });
                }
                (quantity, 0)
            }
            PurchaseLocation::External => (0, quantity),
            PurchaseLocation::Split => {
                let (in_clinic, external) = split.ok_or(AllocationError::MissingSplitQuantities)?;
                if in_clinic < 0 || external < 0 {
                    return Err(AllocationError::NegativeSplitQuantity);
                }
                if in_clinic.checked_add(external) != Some(quantity) {
                    return Err(AllocationError::SplitMismatch { in_clinic, external, quantity });
                }
                if in_clinic > current_stock {
                    return Err(AllocationError::InsufficientStockForSplit {
                        available: current_stock.max(0),
                        in_clinic,
                        quantity,
                    });
                }
                (in_clinic, external)
            }
        };

        Ok(Self { location, quantity, in_clinic, external })
    }
}

/// Prices for the in-clinic portion of a sale. External units are never charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalePricing {
    pub unit_price: Decimal,
    pub discount_percentage: Decimal,
    pub total_price: Decimal,
    pub discount_amount: Decimal,
    pub final_price: Decimal,
}

impl SalePricing {
    pub fn compute(unit_price: Decimal, quantity_in_clinic: i32, discount_percentage: Decimal) -> Self {
        let total_price = unit_price * Decimal::from(quantity_in_clinic);
        let discount_percentage = if quantity_in_clinic == 0 {
            Decimal::ZERO
        } else {
            discount_percentage
        };
        let discount_amount = total_price * discount_percentage / Decimal::ONE_HUNDRED;

        Self {
            unit_price,
            discount_percentage,
            total_price,
            discount_amount,
            final_price: total_price - discount_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitDetails {
    pub quantity_in_clinic: i32,
    pub quantity_external: i32,
    pub total_in_clinic_price: Decimal,
    pub external_pharmacy: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionSaleRequest {
    pub prescription_id: Uuid,
    pub purchase_location: PurchaseLocation,
    pub quantity: Option<i32>,
    pub quantity_in_clinic: Option<i32>,
    pub quantity_external: Option<i32>,
    pub discount_percentage: Option<Decimal>,
    pub notes: Option<String>,
    pub external_pharmacy: Option<String>,
}

impl PrescriptionSaleRequest {
    pub fn split_quantities(&self) -> Option<(i32, i32)> {
        match (self.quantity_in_clinic, self.quantity_external) {
            (Some(in_clinic), Some(external)) => Some((in_clinic, external)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectSaleRequest {
    pub medicine_id: Uuid,
    pub client_id: Uuid,
    pub pet_id: Option<Uuid>,
    pub quantity: i32,
    pub discount_percentage: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub client_id: Option<Uuid>,
    pub pet_id: Option<Uuid>,
    pub medicine_id: Option<Uuid>,
    pub purchase_location: Option<PurchaseLocation>,
    pub status: Option<SaleStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl SaleFilter {
    pub fn for_range(range: &DateRange) -> Self {
        Self {
            date_from: range.date_from,
            date_to: range.date_to,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        let limit = i64::from(self.limit);
        (total + limit - 1) / limit
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LocationTotals {
    #[sqlx(try_from = "String")]
    pub purchase_location: PurchaseLocation,
    pub count: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopMedicine {
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

pub const TOP_MEDICINES_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub total_sales: i64,
    pub total_revenue: Decimal,
    pub sales_by_location: Vec<LocationTotals>,
    pub top_medicines: Vec<TopMedicine>,
}
