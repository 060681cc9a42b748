use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::AppState,
    middleware::{get_current_user, CurrentUser},
    models::{
        DateRange, DirectSaleRequest, Pagination, PrescriptionSaleRequest, PurchaseLocation,
        SaleDetail, SaleFilter, SaleStatus,
    },
    services::sales::{DirectSaleOutcome, PrescriptionSaleOutcome, SalePage},
};

#[derive(Serialize)]
pub struct WithMessage<T: Serialize> {
    message: &'static str,
    #[serde(flatten)]
    body: T,
}

// Query strings arrive as raw text so that empty form fields mean "no filter".
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleListQuery {
    client_id: Option<String>,
    pet_id: Option<String>,
    medicine_id: Option<String>,
    purchase_location: Option<String>,
    status: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    date_from: Option<String>,
    date_to: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_param<T: FromStr>(name: &str, value: &Option<String>) -> Result<Option<T>, AppError> {
    non_empty(value)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| AppError::BadRequest(format!("Invalid {}: {}", name, raw)))
        })
        .transpose()
}

fn parse_date(name: &str, value: &Option<String>) -> Result<Option<NaiveDate>, AppError> {
    non_empty(value)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| AppError::BadRequest(format!("Invalid {}: expected YYYY-MM-DD, got {}", name, raw)))
        })
        .transpose()
}

impl SaleListQuery {
    fn filter(&self) -> Result<SaleFilter, AppError> {
        Ok(SaleFilter {
            client_id: parse_param::<Uuid>("clientId", &self.client_id)?,
            pet_id: parse_param::<Uuid>("petId", &self.pet_id)?,
            medicine_id: parse_param::<Uuid>("medicineId", &self.medicine_id)?,
            purchase_location: parse_param::<PurchaseLocation>("purchaseLocation", &self.purchase_location)?,
            status: parse_param::<SaleStatus>("status", &self.status)?,
            date_from: parse_date("dateFrom", &self.date_from)?,
            date_to: parse_date("dateTo", &self.date_to)?,
        })
    }

    fn pagination(&self) -> Result<Pagination, AppError> {
        Ok(Pagination::new(
            parse_param::<u32>("page", &self.page)?,
            parse_param::<u32>("limit", &self.limit)?,
        ))
    }
}

async fn authorize(
    headers: &HeaderMap,
    cookies: &Cookies,
    state: &AppState,
    allowed: fn(&CurrentUser) -> bool,
) -> Result<CurrentUser, AppError> {
    let current_user = get_current_user(headers, cookies, state).await?
        .ok_or(AppError::Unauthorized)?;

    if !allowed(&current_user) {
        return Err(AppError::Forbidden);
    }
    Ok(current_user)
}

// Body errors are reported only once the caller is known to be allowed in.
fn request_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(request)| request)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn seller(user: &CurrentUser) -> bool {
    user.role.can_sell()
}

fn manager(user: &CurrentUser) -> bool {
    user.role.can_manage_sales()
}

pub async fn create_sale_from_prescription(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
    body: Result<Json<PrescriptionSaleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WithMessage<PrescriptionSaleOutcome>>), AppError> {
    let current_user = authorize(&headers, &cookies, &state, seller).await?;
    let request = request_body(body)?;

    let outcome = state.sales.sell_from_prescription(request, current_user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(WithMessage {
            message: "Sale created successfully",
            body: outcome,
        }),
    ))
}

pub async fn create_direct_sale(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
    body: Result<Json<DirectSaleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WithMessage<DirectSaleOutcome>>), AppError> {
    let current_user = authorize(&headers, &cookies, &state, seller).await?;
    let request = request_body(body)?;

    let outcome = state.sales.sell_direct(request, current_user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(WithMessage {
            message: "Direct sale created successfully",
            body: outcome,
        }),
    ))
}

pub async fn list_sales(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
    Query(query): Query<SaleListQuery>,
) -> Result<Json<SalePage>, AppError> {
    authorize(&headers, &cookies, &state, seller).await?;

    let page = state.sales.list(&query.filter()?, query.pagination()?).await?;
    Ok(Json(page))
}

pub async fn sales_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&headers, &cookies, &state, manager).await?;

    let range = DateRange {
        date_from: parse_date("dateFrom", &query.date_from)?,
        date_to: parse_date("dateTo", &query.date_to)?,
    };
    let summary = state.sales.summary(&range).await?;

    Ok(Json(json!({ "summary": summary })))
}

pub async fn get_sale(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<SaleDetail>, AppError> {
    authorize(&headers, &cookies, &state, seller).await?;

    let sale = state.sales.get(sale_id).await?;
    Ok(Json(sale))
}

pub async fn cancel_sale(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let current_user = authorize(&headers, &cookies, &state, manager).await?;

    let sale = state.sales.cancel(sale_id, current_user.id).await?;

    Ok(Json(json!({
        "message": "Sale cancelled successfully",
        "sale": sale,
    })))
}
