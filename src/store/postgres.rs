use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    database::Database,
    models::{
        DateRange, LocationTotals, Medicine, Pagination, Prescription, PrescriptionPurchase,
        PurchaseStatus, Sale, SaleDetail, SaleFilter, SaleStatus, SalesSummary, TopMedicine, User,
    },
};

use super::{CancelledSale, RecordedSale, SaleStore, StoreError};

const SALE_DETAIL_SELECT: &str = r#"
    SELECT
        s.*,
        m.name AS medicine_name,
        CONCAT(u.first_name, ' ', u.last_name) AS client_name
    FROM medicine_sales s
    JOIN medicines m ON m.id = s.medicine_id
    JOIN users u ON u.id = s.client_id
"#;

#[derive(Clone)]
pub struct PgSaleStore {
    db: Database,
}

impl PgSaleStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

async fn fetch_sale_detail<'e, E>(executor: E, id: Uuid) -> Result<Option<SaleDetail>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, SaleDetail>(&format!("{} WHERE s.id = $1", SALE_DETAIL_SELECT))
        .bind(id)
        .fetch_optional(executor)
        .await
}

// Appends " AND ..." conditions; the query must already have a WHERE clause.
fn push_sale_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &SaleFilter) {
    if let Some(id) = filter.client_id {
        query.push(" AND s.client_id = ").push_bind(id);
    }
    if let Some(id) = filter.pet_id {
        query.push(" AND s.pet_id = ").push_bind(id);
    }
    if let Some(id) = filter.medicine_id {
        query.push(" AND s.medicine_id = ").push_bind(id);
    }
    if let Some(location) = filter.purchase_location {
        query.push(" AND s.purchase_location = ").push_bind(location.as_str());
    }
    if let Some(status) = filter.status {
        query.push(" AND s.status = ").push_bind(status.as_str());
    }
    if let Some(date) = filter.date_from {
        query.push(" AND s.created_at::date >= ").push_bind(date);
    }
    if let Some(date) = filter.date_to {
        query.push(" AND s.created_at::date <= ").push_bind(date);
    }
}

#[async_trait]
impl SaleStore for PgSaleStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_medicine(&self, id: Uuid) -> Result<Option<Medicine>, StoreError> {
        let medicine = sqlx::query_as::<_, Medicine>("SELECT * FROM medicines WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(medicine)
    }

    async fn find_prescription(&self, id: Uuid) -> Result<Option<Prescription>, StoreError> {
        let prescription = sqlx::query_as::<_, Prescription>("SELECT * FROM prescriptions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(prescription)
    }

    async fn find_sale(&self, id: Uuid) -> Result<Option<SaleDetail>, StoreError> {
        Ok(fetch_sale_detail(&self.db, id).await?)
    }

    async fn record_sale(
        &self,
        sale: &Sale,
        purchase: Option<&PrescriptionPurchase>,
    ) -> Result<RecordedSale, StoreError> {
        // Dropping `tx` on an early return rolls everything back.
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO medicine_sales (
                id, prescription_id, medicine_id, client_id, pet_id, quantity, quantity_in_clinic,
                quantity_external, unit_price, discount_percentage, total_price, discount_amount,
                final_price, purchase_location, status, external_pharmacy, notes, created_by,
                updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(sale.id)
        .bind(sale.prescription_id)
        .bind(sale.medicine_id)
        .bind(sale.client_id)
        .bind(sale.pet_id)
        .bind(sale.quantity)
        .bind(sale.quantity_in_clinic)
        .bind(sale.quantity_external)
        .bind(sale.unit_price)
        .bind(sale.discount_percentage)
        .bind(sale.total_price)
        .bind(sale.discount_amount)
        .bind(sale.final_price)
        .bind(sale.purchase_location.as_str())
        .bind(sale.status.as_str())
        .bind(&sale.external_pharmacy)
        .bind(&sale.notes)
        .bind(sale.created_by)
        .bind(sale.updated_by)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await?;

        let stock_after_sale = if sale.quantity_in_clinic > 0 {
            let remaining = sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE medicines
                SET current_stock = current_stock - $1, updated_at = NOW()
                WHERE id = $2 AND current_stock >= $1
                RETURNING current_stock
                "#,
            )
            .bind(sale.quantity_in_clinic)
            .bind(sale.medicine_id)
            .fetch_optional(&mut *tx)
            .await?;

            match remaining {
                Some(stock) => Some(stock),
                None => {
                    let available = sqlx::query_scalar::<_, i32>(
                        "SELECT current_stock FROM medicines WHERE id = $1",
                    )
                    .bind(sale.medicine_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or(StoreError::NotFound("Medicine"))?;

                    tx.rollback().await?;
                    return Err(StoreError::InsufficientStock {
                        available,
                        requested: sale.quantity_in_clinic,
                    });
                }
            }
        } else {
            None
        };

        if let Some(purchase) = purchase {
            sqlx::query(
                r#"
                UPDATE prescriptions
                SET purchase_status = $1, purchase_date = NOW(), external_pharmacy = $2, updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(purchase.status.as_str())
            .bind(&purchase.external_pharmacy)
            .bind(purchase.prescription_id)
            .execute(&mut *tx)
            .await?;
        }

        let detail = fetch_sale_detail(&mut *tx, sale.id)
            .await?
            .ok_or(StoreError::NotFound("Sale"))?;

        tx.commit().await?;

        Ok(RecordedSale {
            sale: detail,
            stock_after_sale,
        })
    }

    async fn cancel_sale(&self, id: Uuid, cancelled_by: Uuid) -> Result<CancelledSale, StoreError> {
        let mut tx = self.db.begin().await?;

        // The row lock keeps a concurrent cancel from restoring stock twice.
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM medicine_sales WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound("Sale"))?;

        if sale.status == SaleStatus::Cancelled {
            return Err(StoreError::AlreadyCancelled);
        }

        let restored_stock = sale.stock_to_restore();
        if restored_stock > 0 {
            sqlx::query(
                "UPDATE medicines SET current_stock = current_stock + $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(restored_stock)
            .bind(sale.medicine_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE medicine_sales SET status = $1, updated_by = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(SaleStatus::Cancelled.as_str())
        .bind(cancelled_by)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(prescription_id) = sale.prescription_id {
            sqlx::query(
                r#"
                UPDATE prescriptions
                SET purchase_status = $1, purchase_date = NULL, updated_at = NOW()
                WHERE id = $2
                "#,
            )
            .bind(PurchaseStatus::NotPurchased.as_str())
            .bind(prescription_id)
            .execute(&mut *tx)
            .await?;
        }

        let detail = fetch_sale_detail(&mut *tx, id)
            .await?
            .ok_or(StoreError::NotFound("Sale"))?;

        tx.commit().await?;

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
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM medicine_sales s WHERE 1 = 1");
        push_sale_filters(&mut count_query, filter);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(SALE_DETAIL_SELECT);
        query.push(" WHERE 1 = 1");
        push_sale_filters(&mut query, filter);
        query
            .push(" ORDER BY s.created_at DESC LIMIT ")
            .push_bind(i64::from(pagination.limit))
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let sales = query
            .build_query_as::<SaleDetail>()
            .fetch_all(&self.db)
            .await?;

        Ok((sales, total))
    }

    async fn sales_summary(&self, range: &DateRange) -> Result<SalesSummary, StoreError> {
        let filter = SaleFilter::for_range(range);

        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM medicine_sales s WHERE 1 = 1");
        push_sale_filters(&mut query, &filter);
        let total_sales = query.build_query_scalar::<i64>().fetch_one(&self.db).await?;

        let completed = SaleFilter {
            status: Some(SaleStatus::Completed),
            ..filter
        };

        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT COALESCE(SUM(s.final_price), 0) FROM medicine_sales s WHERE 1 = 1",
        );
        push_sale_filters(&mut query, &completed);
        let total_revenue = query.build_query_scalar::<Decimal>().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT
                s.purchase_location,
                COUNT(*) AS count,
                COALESCE(SUM(s.final_price), 0) AS revenue
            FROM medicine_sales s
            WHERE 1 = 1
            "#,
        );
        push_sale_filters(&mut query, &completed);
        query.push(" GROUP BY s.purchase_location ORDER BY s.purchase_location");
        let sales_by_location = query
            .build_query_as::<LocationTotals>()
            .fetch_all(&self.db)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT
                s.medicine_id,
                m.name AS medicine_name,
                SUM(s.quantity)::BIGINT AS quantity,
                COALESCE(SUM(s.final_price), 0) AS revenue
            FROM medicine_sales s
            JOIN medicines m ON m.id = s.medicine_id
            WHERE 1 = 1
            "#,
        );
        push_sale_filters(&mut query, &completed);
        query
            .push(" GROUP BY s.medicine_id, m.name ORDER BY quantity DESC, m.name LIMIT ")
            .push_bind(crate::models::sale::TOP_MEDICINES_LIMIT as i64);
        let top_medicines = query
            .build_query_as::<TopMedicine>()
            .fetch_all(&self.db)
            .await?;

        Ok(SalesSummary {
            total_sales,
            total_revenue,
            sales_by_location,
            top_medicines,
        })
    }

    async fn low_stock_medicines(&self) -> Result<Vec<Medicine>, StoreError> {
        let medicines = sqlx::query_as::<_, Medicine>(
            "SELECT * FROM medicines WHERE current_stock <= minimum_stock ORDER BY current_stock, name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(medicines)
    }
}
