//! Prescription routes: per-patient append/list plus the pharmacy-wide
//! listing.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::{Medicine, PrescriptionEntry};

#[derive(Debug, Deserialize)]
pub struct AddPrescriptionRequest {
    date: Option<String>,
    medicines: Option<Vec<Medicine>>,
}

/// `POST /api/patients/{patientId}/prescriptions` — appends an entry to
/// the patient's prescription sequence.
pub async fn add(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    Json(body): Json<AddPrescriptionRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (date, medicines) = match (body.date, body.medicines) {
        (Some(date), Some(medicines)) if !date.is_empty() && !medicines.is_empty() => {
            (date, medicines)
        }
        _ => {
            return Err(ApiError::Validation(
                "Date and medicines are required".to_string(),
            ))
        }
    };

    let entry = state.db.add_prescription(&patient_id, &date, &medicines)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Prescription added", "prescription": entry })),
    ))
}

/// `GET /api/patients/{patientId}/prescriptions`.
pub async fn list_for_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Vec<PrescriptionEntry>>> {
    Ok(Json(state.db.prescriptions_for_patient(&patient_id)?))
}

/// `GET /api/prescriptions` — every prescription across all patients, as
/// the pharmacy sees them: formatted medicine lines and a total price from
/// the stock list.
pub async fn list_all(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let rows = state.db.all_prescriptions()?;
    let out: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            let medicines: Vec<String> = row.medicines.iter().map(format_medicine).collect();
            json!({
                "patientId": row.patient_id,
                "patientName": row.patient_name,
                "doctorName": row.doctor_name.unwrap_or_else(|| "Unknown".to_string()),
                "prescriptionNumber": row.prescription_number,
                "date": row.date,
                "medicines": medicines,
                "totalPrice": row.total_price,
            })
        })
        .collect();
    Ok(Json(Value::Array(out)))
}

fn format_medicine(medicine: &Medicine) -> String {
    format!(
        "{} - {} • {}",
        medicine.name,
        medicine.dosage.as_deref().unwrap_or("-"),
        medicine.time.as_deref().unwrap_or("-")
    )
}
