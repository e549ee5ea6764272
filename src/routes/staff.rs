//! Staff directory routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::db::{NewStaff, StaffUpdate};
use crate::error::{ApiError, ApiResult};
use crate::models::{Role, StaffMember, StaffStatus};

#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    name: Option<String>,
    role: Option<String>,
    department: Option<String>,
    specialization: Option<String>,
    qualifications: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    password: Option<String>,
}

/// `POST /api/staff` — adds a doctor or nurse to the directory.
pub async fn create_staff(
    State(state): State<AppState>,
    Json(body): Json<CreateStaffRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (name, role) = match (body.name, body.role) {
        (Some(name), Some(role)) if !name.trim().is_empty() => (name, role),
        _ => return Err(ApiError::Validation("Missing required fields".to_string())),
    };
    let role = match Role::parse(&role) {
        Some(role @ (Role::Doctor | Role::Nurse)) => role,
        _ => return Err(ApiError::Validation("Invalid staff role".to_string())),
    };

    state.db.create_staff(&NewStaff {
        name,
        role,
        department: body.department,
        specialization: body.specialization,
        qualifications: body.qualifications,
        email: body.email,
        phone: body.phone,
        password: body.password,
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Staff added successfully" })),
    ))
}

/// `GET /api/staff` — the full staff directory.
pub async fn list_staff(State(state): State<AppState>) -> ApiResult<Json<Vec<StaffMember>>> {
    Ok(Json(state.db.list_staff()?))
}

/// `GET /api/staff/{id}`.
pub async fn get_staff(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StaffMember>> {
    let id = super::parse_id(&id, "staff")?;
    Ok(Json(state.db.get_staff(id)?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStaffRequest {
    name: Option<String>,
    department: Option<String>,
    specialization: Option<String>,
    qualifications: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    status: Option<String>,
    password: Option<String>,
}

/// `PUT /api/staff/{id}` — partial update; a provided password is
/// re-hashed before storage.
pub async fn update_staff(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStaffRequest>,
) -> ApiResult<Json<StaffMember>> {
    let id = super::parse_id(&id, "staff")?;
    let status = match body.status.as_deref() {
        Some(raw) => Some(
            StaffStatus::parse(raw)
                .ok_or_else(|| ApiError::Validation("Invalid status".to_string()))?,
        ),
        None => None,
    };
    let updated = state.db.update_staff(
        id,
        &StaffUpdate {
            name: body.name,
            department: body.department,
            specialization: body.specialization,
            qualifications: body.qualifications,
            email: body.email,
            phone: body.phone,
            status,
            password: body.password,
        },
    )?;
    Ok(Json(updated))
}

/// `DELETE /api/staff/{id}`.
pub async fn delete_staff(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "staff")?;
    state.db.delete_staff(id)?;
    Ok(Json(json!({ "message": "Staff deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct StaffStatusRequest {
    status: Option<String>,
}

/// `PUT /api/staff/{id}/status` — availability toggle; only `active` and
/// `inactive` can be set directly (`unavailable` is an admission side
/// effect).
pub async fn set_staff_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StaffStatusRequest>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "staff")?;
    let status = match body.status.as_deref().and_then(StaffStatus::parse) {
        Some(status @ (StaffStatus::Active | StaffStatus::Inactive)) => status,
        _ => return Err(ApiError::Validation("Invalid status".to_string())),
    };
    state.db.set_staff_status(id, status)?;
    Ok(Json(json!({ "message": "Status updated", "status": status })))
}

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    specialty: Option<String>,
}

/// `GET /api/staff/available?specialty=...` — active doctors, optionally
/// filtered by department.
pub async fn available_doctors(
    State(state): State<AppState>,
    Query(query): Query<AvailableQuery>,
) -> ApiResult<Json<Vec<StaffMember>>> {
    Ok(Json(state.db.available_doctors(query.specialty.as_deref())?))
}

/// `GET /api/departments` — distinct staff departments.
pub async fn departments(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.db.departments()?))
}
