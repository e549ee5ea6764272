//! Appointment booking and state-machine routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::db::{AppointmentWithDoctor, NewAppointment};
use crate::error::{ApiError, ApiResult};
use crate::models::{Appointment, AppointmentStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    patient_id: Option<String>,
    doctor_id: Option<String>,
    date: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    notes: String,
}

/// `POST /api/appointments` — books a pending appointment. The doctor
/// reference must parse and resolve to an existing doctor.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateAppointmentRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (patient_id, doctor_id, date) = match (body.patient_id, body.doctor_id, body.date) {
        (Some(patient), Some(doctor), Some(date))
            if !patient.is_empty() && !doctor.is_empty() && !date.is_empty() =>
        {
            (patient, doctor, date)
        }
        _ => {
            return Err(ApiError::Validation(
                "Patient, Doctor, and Date are required".to_string(),
            ))
        }
    };
    let doctor_id = super::parse_doctor_ref(Some(doctor_id.as_str()))?
        .ok_or_else(|| ApiError::Validation("Invalid doctor ID".to_string()))?;

    let appointment = state.db.create_appointment(&NewAppointment {
        patient_id,
        doctor_id,
        date,
        description: body.description,
        notes: body.notes,
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Appointment created",
            "appointmentId": appointment.id.to_string(),
        })),
    ))
}

/// `GET /api/appointments/mine/{patientId}` — a patient's appointments
/// with the doctor reference resolved.
pub async fn for_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Vec<AppointmentWithDoctor>>> {
    Ok(Json(state.db.appointments_for_patient(&patient_id)?))
}

/// `GET /api/appointments/doctor/{doctorId}`.
pub async fn for_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
) -> ApiResult<Json<Vec<Appointment>>> {
    let doctor_id = super::parse_id(&doctor_id, "doctor")?;
    Ok(Json(state.db.appointments_for_doctor(doctor_id)?))
}

#[derive(Debug, Deserialize)]
pub struct AppointmentStatusRequest {
    status: Option<String>,
}

/// `PUT /api/appointments/{id}/status` — advances the appointment through
/// its state machine; transitions outside it are rejected.
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AppointmentStatusRequest>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "appointment")?;
    let status = body
        .status
        .as_deref()
        .and_then(AppointmentStatus::parse)
        .ok_or_else(|| ApiError::Validation("Invalid status".to_string()))?;

    let updated = state.db.update_appointment_status(id, status)?;
    Ok(Json(json!({
        "message": "Appointment status updated",
        "status": updated.status,
    })))
}
