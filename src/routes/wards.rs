//! Ward/bed occupancy route.

use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::error::ApiResult;
use crate::occupancy::{compute_occupancy, WardView};

/// `GET /api/wards/occupancy` — the full occupancy grid, recomputed from
/// the current active-admission snapshot on every request.
pub async fn occupancy(State(state): State<AppState>) -> ApiResult<Json<Vec<WardView>>> {
    let wards = state.db.list_wards()?;
    let admissions = state.db.active_admissions()?;
    let db = state.db.clone();
    let grid = compute_occupancy(&wards, &admissions, |id| {
        db.doctor_name(id).ok().flatten()
    });
    Ok(Json(grid))
}
