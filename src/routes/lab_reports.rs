//! Lab-report routes. The report file itself lives in an external blob
//! store; these routes only carry its opaque reference.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::LabReportEntry;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLabReportRequest {
    patient_id: Option<String>,
    date: Option<String>,
    test_name: Option<String>,
    results: Option<String>,
    file: Option<String>,
}

/// `POST /api/lab-reports` — appends a report entry to the patient's
/// sequence.
pub async fn add(
    State(state): State<AppState>,
    Json(body): Json<AddLabReportRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (patient_id, date, test_name, results, file) =
        match (body.patient_id, body.date, body.test_name, body.results, body.file) {
            (Some(patient_id), Some(date), Some(test_name), Some(results), Some(file))
                if !patient_id.is_empty()
                    && !date.is_empty()
                    && !test_name.is_empty()
                    && !results.is_empty()
                    && !file.is_empty() =>
            {
                (patient_id, date, test_name, results, file)
            }
            _ => return Err(ApiError::Validation("All fields are required".to_string())),
        };

    let entry = state
        .db
        .add_lab_report(&patient_id, &date, &test_name, &results, &file)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Lab report added", "labReport": entry })),
    ))
}

/// `GET /api/patients/{patientId}/lab-reports`.
pub async fn list_for_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Vec<LabReportEntry>>> {
    Ok(Json(state.db.lab_reports_for_patient(&patient_id)?))
}
