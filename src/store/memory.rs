use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{
    sale::TOP_MEDICINES_LIMIT, DateRange, LocationTotals, Medicine, Pagination, Prescription,
    PrescriptionPurchase, PurchaseStatus, Sale, SaleDetail, SaleFilter, SaleStatus, SalesSummary,
    TopMedicine, User,
};

use super::{CancelledSale, RecordedSale, SaleStore, StoreError};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    medicines: HashMap<Uuid, Medicine>,
    prescriptions: HashMap<Uuid, Prescription>,
    sales: Vec<Sale>,
}

impl State {
    fn detail(&self, sale: &Sale) -> Option<SaleDetail> {
        let medicine = self.medicines.get(&sale.medicine_id)?;
        let client = self.users.get(&sale.client_id)?;
        Some(SaleDetail {
            sale: sale.clone(),
            medicine_name: medicine.name.clone(),
            client_name: client.full_name(),
        })
    }
}

fn matches(filter: &SaleFilter, sale: &Sale) -> bool {
    let day = sale.created_at.date_naive();
    filter.client_id.map_or(true, |id| sale.client_id == id)
        && filter.pet_id.map_or(true, |id| sale.pet_id == Some(id))
        && filter.medicine_id.map_or(true, |id| sale.medicine_id == id)
        && filter.purchase_location.map_or(true, |l| sale.purchase_location == l)
        && filter.status.map_or(true, |s| sale.status == s)
        && filter.date_from.map_or(true, |from| day >= from)
        && filter.date_to.map_or(true, |to| day <= to)
}

/// Store backed by process memory. One mutex guards everything, so each
/// operation is atomic.
#[derive(Default)]
pub struct InMemorySaleStore {
    state: Mutex<State>,
}

impl InMemorySaleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_user(&self, user: User) {
        self.lock().users.insert(user.id, user);
    }

    pub fn insert_medicine(&self, medicine: Medicine) {
        self.lock().medicines.insert(medicine.id, medicine);
    }

    pub fn insert_prescription(&self, prescription: Prescription) {
        self.lock().prescriptions.insert(prescription.id, prescription);
    }

    pub fn medicine(&self, id: Uuid) -> Option<Medicine> {
        self.lock().medicines.get(&id).cloned()
    }

    pub fn prescription(&self, id: Uuid) -> Option<Prescription> {
        self.lock().prescriptions.get(&id).cloned()
    }

    pub fn sale_count(&self) -> usize {
        self.lock().sales.len()
    }
}

#[async_trait]
impl SaleStore for InMemorySaleStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_medicine(&self, id: Uuid) -> Result<Option<Medicine>, StoreError> {
        Ok(self.medicine(id))
    }

    async fn find_prescription(&self, id: Uuid) -> Result<Option<Prescription>, StoreError> {
        Ok(self.prescription(id))
    }

    async fn find_sale(&self, id: Uuid) -> Result<Option<SaleDetail>, StoreError> {
        let state = self.lock();
        Ok(state
            .sales
            .iter()
            .find(|sale| sale.id == id)
            .and_then(|sale| state.detail(sale)))
    }

    async fn record_sale(
        &self,
        sale: &Sale,
        purchase: Option<&PrescriptionPurchase>,
    ) -> Result<RecordedSale, StoreError> {
        let mut state = self.lock();

        // Validate everything before mutating anything.
        let medicine = state
            .medicines
            .get(&sale.medicine_id)
            .ok_or(StoreError::NotFound("Medicine"))?;
        if !state.users.contains_key(&sale.client_id) {
            return Err(StoreError::NotFound("Client"));
        }
        if sale.quantity_in_clinic > medicine.current_stock {
            return Err(StoreError::InsufficientStock {
                available: medicine.current_stock,
                requested: sale.quantity_in_clinic,
            });
        }
        if let Some(purchase) = purchase {
            if !state.prescriptions.contains_key(&purchase.prescription_id) {
                return Err(StoreError::NotFound("Prescription"));
            }
        }

        let now = Utc::now();
        state.sales.push(sale.clone());

        let stock_after_sale = if sale.quantity_in_clinic > 0 {
            state.medicines.get_mut(&sale.medicine_id).map(|medicine| {
                medicine.current_stock -= sale.quantity_in_clinic;
                medicine.updated_at = now;
                medicine.current_stock
            })
        } else {
            None
        };

        if let Some(purchase) = purchase {
            if let Some(prescription) = state.prescriptions.get_mut(&purchase.prescription_id) {
                prescription.purchase_status = purchase.status;
                prescription.purchase_date = Some(now);
                prescription.external_pharmacy = purchase.external_pharmacy.clone();
                prescription.updated_at = now;
            }
        }

        let detail = state.detail(sale).ok_or(StoreError::NotFound("Sale"))?;
        Ok(RecordedSale {
            sale: detail,
            stock_after_sale,
        })
    }

    async fn cancel_sale(&self, id: Uuid, cancelled_by: Uuid) -> Result<CancelledSale, StoreError> {
        let mut state = self.lock();
        let now = Utc::now();

        let index = state
            .sales
            .iter()
            .position(|sale| sale.id == id)
            .ok_or(StoreError::NotFound("Sale"))?;
        if state.sales[index].status == SaleStatus::Cancelled {
            return Err(StoreError::AlreadyCancelled);
        }

        let restored_stock = state.sales[index].stock_to_restore();
        let medicine_id = state.sales[index].medicine_id;
        let prescription_id = state.sales[index].prescription_id;

        if restored_stock > 0 {
            if let Some(medicine) = state.medicines.get_mut(&medicine_id) {
                medicine.current_stock += restored_stock;
                medicine.updated_at = now;
            }
        }

        {
            let sale = &mut state.sales[index];
            sale.status = SaleStatus::Cancelled;
            sale.updated_by = Some(cancelled_by);
            sale.updated_at = now;
        }

        if let Some(prescription_id) = prescription_id {
            if let Some(prescription) = state.prescriptions.get_mut(&prescription_id) {
                prescription.purchase_status = PurchaseStatus::NotPurchased;
                prescription.purchase_date = None;
                prescription.updated_at = now;
            }
        }

        let detail = state
            .detail(&state.sales[index])
            .ok_or(StoreError::NotFound("Sale"))?;
        Ok(CancelledSale {
            sale: detail,
            restored_stock,
        })
    }

    async fn list_sales(
        &self,
        filter: &SaleFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<SaleDetail>, i64), StoreError> {
        let state = self.lock();

        let mut matching: Vec<&Sale> = state.sales.iter().filter(|sale| matches(filter, sale)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let sales = matching
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit as usize)
            .filter_map(|sale| state.detail(sale))
            .collect();

        Ok((sales, total))
    }

    async fn sales_summary(&self, range: &DateRange) -> Result<SalesSummary, StoreError> {
        let state = self.lock();
        let filter = SaleFilter::for_range(range);

        let in_range: Vec<&Sale> = state.sales.iter().filter(|sale| matches(&filter, sale)).collect();
        let completed: Vec<&Sale> = in_range
            .iter()
            .copied()
            .filter(|sale| sale.status == SaleStatus::Completed)
            .collect();

        let total_revenue = completed.iter().map(|sale| sale.final_price).sum::<Decimal>();

        let mut by_location: Vec<LocationTotals> = Vec::new();
        for sale in &completed {
            match by_location
                .iter_mut()
                .find(|totals| totals.purchase_location == sale.purchase_location)
            {
                Some(totals) => {
                    totals.count += 1;
                    totals.revenue += sale.final_price;
                }
                None => by_location.push(LocationTotals {
                    purchase_location: sale.purchase_location,
                    count: 1,
                    revenue: sale.final_price,
                }),
            }
        }
        by_location.sort_by_key(|totals| totals.purchase_location.as_str());

        let mut top: HashMap<Uuid, TopMedicine> = HashMap::new();
        for sale in &completed {
            let entry = top.entry(sale.medicine_id).or_insert_with(|| TopMedicine {
                medicine_id: sale.medicine_id,
                medicine_name: state
                    .medicines
                    .get(&sale.medicine_id)
                    .map(|m| m.name.clone())
                    .unwrap_or_default(),
                quantity: 0,
                revenue: Decimal::ZERO,
            });
            entry.quantity += i64::from(sale.quantity);
            entry.revenue += sale.final_price;
        }
        let mut top_medicines: Vec<TopMedicine> = top.into_values().collect();
        top_medicines.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then_with(|| a.medicine_name.cmp(&b.medicine_name))
        });
        top_medicines.truncate(TOP_MEDICINES_LIMIT);

        Ok(SalesSummary {
            total_sales: in_range.len() as i64,
            total_revenue,
            sales_by_location: by_location,
            top_medicines,
        })
    }

    async fn low_stock_medicines(&self) -> Result<Vec<Medicine>, StoreError> {
        let mut medicines: Vec<Medicine> = self
            .lock()
            .medicines
            .values()
            .filter(|m| m.is_low_stock())
            .cloned()
            .collect();
        medicines.sort_by(|a, b| {
            a.current_stock
                .cmp(&b.current_stock)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(medicines)
    }
}
