//! Emergency case routes.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::db::{EmergencyCaseView, NewEmergencyCase};
use crate::error::{ApiError, ApiResult};
use crate::models::{flex, CasePriority};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmergencyRequest {
    patient_name: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_i64")]
    age: Option<i64>,
    gender: Option<String>,
    condition: Option<String>,
    priority: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default, deserialize_with = "flex::opt_i64")]
    ward: Option<i64>,
    #[serde(default, deserialize_with = "flex::opt_i64")]
    bed_number: Option<i64>,
    assigned_doctor: Option<String>,
}

/// `POST /api/emergency` — opens an emergency case. A matching patient
/// admission is materialized in the same transaction; the requested bed
/// must be free and the assigned doctor must exist.
pub async fn create_case(
    State(state): State<AppState>,
    Json(body): Json<CreateEmergencyRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let patient_name = require_field(body.patient_name, "patientName")?;
    let age = match body.age {
        Some(age) => age,
        None => return Err(missing_field("age")),
    };
    let gender = require_field(body.gender, "gender")?;
    let condition = require_field(body.condition, "condition")?;

    let priority = match body.priority.as_deref() {
        None | Some("") => CasePriority::Medium,
        Some(raw) => CasePriority::parse(raw)
            .ok_or_else(|| ApiError::Validation(format!("Invalid priority: {raw}")))?,
    };
    let assigned_doctor = super::parse_doctor_ref(body.assigned_doctor.as_deref())?;

    let created = state.db.create_emergency_case(&NewEmergencyCase {
        patient_name,
        age: Some(age),
        gender: Some(gender),
        condition,
        priority,
        description: body.description,
        ward_number: body.ward,
        bed_number: body.bed_number,
        assigned_doctor,
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Emergency case created successfully",
            "emergencyId": created.emergency_id.to_string(),
            "patientId": created.patient_id,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CaseQuery {
    status: Option<String>,
}

/// `GET /api/emergency?status=...` — emergency cases, newest first, with
/// the doctor resolved and the derived admission's state.
pub async fn list_cases(
    State(state): State<AppState>,
    Query(query): Query<CaseQuery>,
) -> ApiResult<Json<Vec<EmergencyCaseView>>> {
    Ok(Json(state.db.list_emergency_cases(query.status.as_deref())?))
}

fn require_field(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| missing_field(field))
}

fn missing_field(field: &str) -> ApiError {
    ApiError::Validation(format!("Missing required field: {field}"))
}
