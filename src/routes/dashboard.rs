//! Dashboard statistics route.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::error::ApiResult;
use crate::models::{PatientStatus, Role};
use crate::occupancy::bed_occupancy_percent;

/// `GET /api/dashboard/stats` — aggregate counters for the admin
/// dashboard.
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let db = &state.db;

    let patients = db.count_patients()?;
    let admitted = db.count_patients_with_status(PatientStatus::Admitted)?;
    let discharged = db.count_patients_with_status(PatientStatus::Discharged)?;

    let staff = db.count_staff()?;
    let doctors = db.count_staff_with_role(Role::Doctor)?;
    let nurses = db.count_staff_with_role(Role::Nurse)?;

    let total_beds = db.total_beds()?;
    let occupied_beds = db.active_admission_count()?;
    let occupancy = bed_occupancy_percent(occupied_beds as u64, total_beds as u64);

    let inventory_items = db.stock_item_count()?;
    let low_stock = db.low_stock_count()?;

    let alerts = db.emergency_active_count()?;
    let critical_alerts = db.emergency_critical_count()?;

    Ok(Json(json!({
        "patients": patients,
        "admitted": admitted,
        "discharged": discharged,
        "staff": staff,
        "doctors": doctors,
        "nurses": nurses,
        "bedOccupancyPercent": occupancy,
        "totalBeds": total_beds,
        "occupiedBeds": occupied_beds,
        "inventoryItems": inventory_items,
        "lowStock": low_stock,
        "alerts": alerts,
        "criticalAlerts": critical_alerts,
    })))
}
