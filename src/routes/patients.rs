//! Patient registration, listing and status routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::db::NewPatient;
use crate::error::{ApiError, ApiResult};
use crate::models::{flex, AdmissionType, Contact, Insurance, PatientStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
    name: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_i64")]
    age: Option<i64>,
    gender: Option<String>,
    blood_group: Option<String>,
    #[serde(rename = "type")]
    kind: Option<AdmissionType>,
    medical_specialty: Option<String>,
    description: Option<String>,
    password: Option<String>,
    #[serde(default)]
    contact: Contact,
    #[serde(default)]
    insurance: Insurance,
    assigned_doctor: Option<String>,
    #[serde(default, deserialize_with = "flex::opt_i64")]
    ward_number: Option<i64>,
    #[serde(default, deserialize_with = "flex::opt_i64")]
    bed_number: Option<i64>,
}

/// `POST /api/patients` — registers a patient. IPD patients with a ward and
/// bed are admitted atomically; an occupied slot yields 409.
pub async fn create_patient(
    State(state): State<AppState>,
    Json(body): Json<CreatePatientRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let name = body
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Missing required fields".to_string()))?;
    let assigned_doctor = super::parse_doctor_ref(body.assigned_doctor.as_deref())?;

    let created = state.db.create_patient(&NewPatient {
        name,
        age: body.age,
        gender: body.gender,
        blood_group: body.blood_group,
        kind: body.kind.unwrap_or(AdmissionType::Opd),
        medical_specialty: body.medical_specialty,
        description: body.description,
        contact: body.contact,
        insurance: body.insurance,
        assigned_doctor,
        ward_number: body.ward_number,
        bed_number: body.bed_number,
        password: body.password,
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Patient added successfully",
            "patientId": created.patient_id,
            "_id": created.id.to_string(),
        })),
    ))
}

/// `GET /api/patients` — all patients with the assigned doctor resolved to
/// a display name.
pub async fn list_patients(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut out = Vec::new();
    for (patient, doctor_name) in state.db.list_patients()? {
        let mut value = serde_json::to_value(&patient).map_err(|e| ApiError::Internal(e.into()))?;
        value["assignedDoctorName"] = json!(doctor_name);
        out.push(value);
    }
    Ok(Json(Value::Array(out)))
}

/// `GET /api/patients/{patientId}` — full patient view including the active
/// admission, the resolved doctor and the owned record sequences.
pub async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let patient = state
        .db
        .get_patient(&patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".to_string()))?;

    let doctor = match patient.assigned_doctor {
        Some(id) => state.db.get_doctor(id)?,
        None => None,
    };
    let admission = state.db.active_admission_for_patient(patient.id)?;
    let prescriptions = state.db.prescriptions_for_patient(&patient.patient_id)?;
    let lab_reports = state.db.lab_reports_for_patient(&patient.patient_id)?;
    let appointments = state.db.appointments_for_patient(&patient.patient_id)?;

    Ok(Json(json!({
        "patientId": patient.patient_id,
        "name": patient.name,
        "age": patient.age,
        "gender": patient.gender,
        "type": patient.kind,
        "medicalSpecialty": patient.medical_specialty,
        "contact": patient.contact,
        "insurance": patient.insurance,
        "wardNumber": admission.as_ref().map(|a| a.ward_number),
        "bedNumber": admission.as_ref().map(|a| a.bed_number),
        "admissionDate": admission.as_ref().map(|a| a.admitted_at.clone()),
        "status": patient.status,
        "assignedDoctor": doctor.map(|d| json!({
            "name": d.name,
            "department": d.department,
            "specialization": d.specialization,
            "email": d.email,
        })),
        "appointments": appointments,
        "prescriptions": prescriptions,
        "labReports": lab_reports,
    })))
}

/// `GET /api/patients/by-doctor/{doctorId}` — the patients assigned to a
/// doctor, with their owned record sequences embedded.
pub async fn patients_by_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let doctor_id = super::parse_id(&doctor_id, "doctor")?;
    let mut out = Vec::new();
    for patient in state.db.patients_by_doctor(doctor_id)? {
        let prescriptions = state.db.prescriptions_for_patient(&patient.patient_id)?;
        let lab_reports = state.db.lab_reports_for_patient(&patient.patient_id)?;
        let mut value = serde_json::to_value(&patient).map_err(|e| ApiError::Internal(e.into()))?;
        value["prescriptions"] = serde_json::to_value(&prescriptions)
            .map_err(|e| ApiError::Internal(e.into()))?;
        value["labReports"] =
            serde_json::to_value(&lab_reports).map_err(|e| ApiError::Internal(e.into()))?;
        out.push(value);
    }
    Ok(Json(Value::Array(out)))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    status: Option<String>,
}

/// `PUT /api/patients/{patientId}/status` — updates the lifecycle status.
/// Discharging closes the active admission and any linked emergency case.
pub async fn set_patient_status(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> ApiResult<Json<Value>> {
    let status = body
        .status
        .as_deref()
        .and_then(PatientStatus::parse)
        .ok_or_else(|| ApiError::Validation("Invalid status".to_string()))?;
    state.db.set_patient_status(&patient_id, status)?;
    Ok(Json(json!({
        "message": "Status updated",
        "status": status,
    })))
}
