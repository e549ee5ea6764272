//! Pharmacy stock routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::StockItem;

/// `GET /api/stock`.
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<StockItem>>> {
    Ok(Json(state.db.list_stock()?))
}

/// `POST /api/stock`.
pub async fn add(
    State(state): State<AppState>,
    Json(item): Json<StockItem>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if item.medicine_id.trim().is_empty() || item.name.trim().is_empty() {
        return Err(ApiError::Validation(
            "medicineId and name are required".to_string(),
        ));
    }
    state.db.add_stock(&item)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Stock item added successfully" })),
    ))
}

/// `PUT /api/stock` — updates the item identified by `medicineId`.
pub async fn update(
    State(state): State<AppState>,
    Json(item): Json<StockItem>,
) -> ApiResult<Json<Value>> {
    state.db.update_stock(&item)?;
    Ok(Json(json!({ "message": "Stock updated successfully" })))
}

/// `DELETE /api/stock/{medicineId}`.
pub async fn delete(
    State(state): State<AppState>,
    Path(medicine_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.db.delete_stock(&medicine_id)?;
    Ok(Json(json!({ "message": "Stock item deleted successfully" })))
}
