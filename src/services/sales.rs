use chrono::Utc;
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        Allocation, AllocationError, DateRange, DirectSaleRequest, Medicine, Pagination,
        PrescriptionPurchase, PrescriptionSaleRequest, PurchaseLocation, Sale, SaleDetail,
        SaleFilter, SalePricing, SaleStatus, SalesSummary, SplitDetails,
    },
    store::{SaleStore, StoreError},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionSaleOutcome {
    pub sale: SaleDetail,
    pub stock_after_sale: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_details: Option<SplitDetails>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectSaleOutcome {
    pub sale: SaleDetail,
    pub stock_after_sale: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalePage {
    pub sales: Vec<SaleDetail>,
    pub total: i64,
    pub page: u32,
    pub total_pages: i64,
}

/// Everything needed to build a completed sale row.
struct SaleDraft<'a> {
    medicine: &'a Medicine,
    allocation: Allocation,
    pricing: SalePricing,
    prescription_id: Option<Uuid>,
    client_id: Uuid,
    pet_id: Option<Uuid>,
    external_pharmacy: Option<String>,
    notes: Option<String>,
    seller_id: Uuid,
}

impl SaleDraft<'_> {
    fn into_sale(self) -> Sale {
        let now = Utc::now();
        Sale {
            id: Uuid::new_v4(),
            prescription_id: self.prescription_id,
            medicine_id: self.medicine.id,
            client_id: self.client_id,
            pet_id: self.pet_id,
            quantity: self.allocation.quantity,
            quantity_in_clinic: self.allocation.in_clinic,
            quantity_external: self.allocation.external,
            unit_price: self.pricing.unit_price,
            discount_percentage: self.pricing.discount_percentage,
            total_price: self.pricing.total_price,
            discount_amount: self.pricing.discount_amount,
            final_price: self.pricing.final_price,
            purchase_location: self.allocation.location,
            status: SaleStatus::Completed,
            external_pharmacy: self.external_pharmacy,
            notes: self.notes,
            created_by: Some(self.seller_id),
            updated_by: Some(self.seller_id),
            created_at: now,
            updated_at: now,
        }
    }
}

fn validate_discount(discount: Option<Decimal>) -> Result<Decimal, AppError> {
    let discount = discount.unwrap_or(Decimal::ZERO);
    if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
        return Err(AppError::BadRequest(format!(
            "Discount percentage must be between 0 and 100, got {}",
            discount
        )));
    }
    Ok(discount)
}

fn rejected(medicine: &Medicine, err: AllocationError) -> AppError {
    warn!("Sale of {} rejected: {}", medicine.name, err);
    err.into()
}

fn warn_if_low_stock(mut medicine: Medicine, stock_after_sale: Option<i32>) {
    if let Some(stock) = stock_after_sale {
        medicine.current_stock = stock;
        if medicine.is_low_stock() {
            warn!(
                "{} is low on stock: {} left, minimum {}",
                medicine.name, medicine.current_stock, medicine.minimum_stock
            );
        }
    }
}

pub struct SaleService {
    store: Arc<dyn SaleStore>,
}

impl SaleService {
    pub fn new(store: Arc<dyn SaleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn SaleStore {
        self.store.as_ref()
    }

    /// Sells the medicine of a prescription from clinic stock, an outside
    /// pharmacy, or both.
    pub async fn sell_from_prescription(
        &self,
        request: PrescriptionSaleRequest,
        seller_id: Uuid,
    ) -> Result<PrescriptionSaleOutcome, AppError> {
        let prescription = self
            .store
            .find_prescription(request.prescription_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Prescription not found".to_string()))?;

        let medicine_id = prescription
            .medicine_id
            .ok_or_else(|| AppError::NotFound("Prescription has no associated medicine".to_string()))?;
        let medicine = self
            .store
            .find_medicine(medicine_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Medicine not found".to_string()))?;

        let discount = validate_discount(request.discount_percentage)?;
        let quantity = request.quantity.unwrap_or(prescription.quantity);
        let allocation = Allocation::resolve(
            request.purchase_location,
            quantity,
            request.split_quantities(),
            medicine.current_stock,
        )
        .map_err(|e| rejected(&medicine, e))?;
        let pricing = SalePricing::compute(medicine.unit_price, allocation.in_clinic, discount);

        let sale = SaleDraft {
            medicine: &medicine,
            allocation,
            pricing,
            prescription_id: Some(prescription.id),
            client_id: prescription.client_id,
            pet_id: prescription.pet_id,
            external_pharmacy: request.external_pharmacy.clone(),
            notes: request.notes,
            seller_id,
        }
        .into_sale();

        let purchase = PrescriptionPurchase {
            prescription_id: prescription.id,
            status: request.purchase_location.prescription_status(),
            external_pharmacy: request.external_pharmacy.clone(),
        };

        let recorded = self.store.record_sale(&sale, Some(&purchase)).await?;
        warn_if_low_stock(medicine, recorded.stock_after_sale);

        info!(
            "Sale {} completed for prescription {}: {} in clinic, {} external, final price {}",
            sale.id, prescription.id, allocation.in_clinic, allocation.external, pricing.final_price
        );

        let split_details = (allocation.location == PurchaseLocation::Split).then(|| SplitDetails {
            quantity_in_clinic: allocation.in_clinic,
            quantity_external: allocation.external,
            total_in_clinic_price: pricing.final_price,
            external_pharmacy: request.external_pharmacy,
        });

        Ok(PrescriptionSaleOutcome {
            sale: recorded.sale,
            stock_after_sale: recorded.stock_after_sale,
            split_details,
        })
    }

    /// Over-the-counter sale, always fulfilled entirely from clinic stock.
    pub async fn sell_direct(
        &self,
        request: DirectSaleRequest,
        seller_id: Uuid,
    ) -> Result<DirectSaleOutcome, AppError> {
        let medicine = self
            .store
            .find_medicine(request.medicine_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Medicine not found".to_string()))?;

        self.store
            .find_user(request.client_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;

        let discount = validate_discount(request.discount_percentage)?;
        let allocation = Allocation::resolve(
            PurchaseLocation::InClinic,
            request.quantity,
            None,
            medicine.current_stock,
        )
        .map_err(|e| rejected(&medicine, e))?;
        let pricing = SalePricing::compute(medicine.unit_price, allocation.in_clinic, discount);

        let sale = SaleDraft {
            medicine: &medicine,
            allocation,
            pricing,
            prescription_id: None,
            client_id: request.client_id,
            pet_id: request.pet_id,
            external_pharmacy: None,
            notes: request.notes,
            seller_id,
        }
        .into_sale();

        let recorded = self.store.record_sale(&sale, None).await?;

        info!(
            "Direct sale {} completed: {} x {}, final price {}",
            sale.id, allocation.quantity, medicine.name, pricing.final_price
        );
        warn_if_low_stock(medicine, recorded.stock_after_sale);

        Ok(DirectSaleOutcome {
            sale: recorded.sale,
            stock_after_sale: recorded.stock_after_sale,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<SaleDetail, AppError> {
        self.store
            .find_sale(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale not found".to_string()))
    }

    pub async fn list(&self, filter: &SaleFilter, pagination: Pagination) -> Result<SalePage, AppError> {
        let (sales, total) = self.store.list_sales(filter, &pagination).await?;
        Ok(SalePage {
            sales,
            total,
            page: pagination.page,
            total_pages: pagination.total_pages(total),
        })
    }

    pub async fn summary(&self, range: &DateRange) -> Result<SalesSummary, AppError> {
        Ok(self.store.sales_summary(range).await?)
    }

    pub async fn cancel(&self, id: Uuid, cancelled_by: Uuid) -> Result<SaleDetail, AppError> {
        let cancelled = self.store.cancel_sale(id, cancelled_by).await.map_err(|e| match e {
            StoreError::NotFound(_) => AppError::NotFound("Sale not found".to_string()),
            other => other.into(),
        })?;

        info!(
            "Sale {} cancelled by {}, {} units returned to stock",
            id, cancelled_by, cancelled.restored_stock
        );

        Ok(cancelled.sale)
    }

    pub async fn low_stock(&self) -> Result<Vec<Medicine>, AppError> {
        Ok(self.store.low_stock_medicines().await?)
    }
}
