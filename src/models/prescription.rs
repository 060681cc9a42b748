use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::str::FromStr;

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    PurchasedInClinic,
    PurchasedExternal,
    NotPurchased,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::PurchasedInClinic => "purchased_in_clinic",
            PurchaseStatus::PurchasedExternal => "purchased_external",
            PurchaseStatus::NotPurchased => "not_purchased",
        }
    }
}

impl FromStr for PurchaseStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PurchaseStatus::Pending),
            "purchased_in_clinic" => Ok(PurchaseStatus::PurchasedInClinic),
            "purchased_external" => Ok(PurchaseStatus::PurchasedExternal),
            "not_purchased" => Ok(PurchaseStatus::NotPurchased),
            other => Err(ParseEnumError::new("purchase status", other)),
        }
    }
}

impl TryFrom<String> for PurchaseStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: Uuid,
    pub medicine_id: Option<Uuid>,
    // Owner of the treated pet; the sale is billed to them.
    pub client_id: Uuid,
    pub pet_id: Option<Uuid>,
    pub quantity: i32,
    #[sqlx(try_from = "String")]
    pub purchase_status: PurchaseStatus,
    pub purchase_date: Option<DateTime<Utc>>,
    pub external_pharmacy: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Purchase outcome written back to a prescription when its sale commits.
#[derive(Debug, Clone)]
pub struct PrescriptionPurchase {
    pub prescription_id: Uuid,
    pub status: PurchaseStatus,
    pub external_pharmacy: Option<String>,
}
