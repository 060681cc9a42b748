use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
};
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    handlers::AppState,
    middleware::get_current_user,
    models::Medicine,
};

// Medicines at or below their minimum stock, emptiest first.
pub async fn low_stock(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
) -> Result<Json<Vec<Medicine>>, AppError> {
    let current_user = get_current_user(&headers, &cookies, &state).await?
        .ok_or(AppError::Unauthorized)?;

    if !current_user.role.can_sell() {
        return Err(AppError::Forbidden);
    }

    let medicines = state.sales.low_stock().await?;
    Ok(Json(medicines))
}
