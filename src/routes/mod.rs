//! HTTP surface for Medora.
//!
//! One router per capability, assembled here. Login and health are public;
//! everything else sits behind the bearer-token middleware, which verifies
//! the token's signature and expiry and then re-confirms that the subject
//! still exists before the handler runs.

pub mod appointments;
pub mod dashboard;
pub mod emergency;
pub mod lab_reports;
pub mod login;
pub mod patients;
pub mod prescriptions;
pub mod staff;
pub mod stock;
pub mod wards;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::AuthService;
use crate::db::Database;
use crate::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<AuthService>,
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .route("/staff", get(staff::list_staff).post(staff::create_staff))
        .route("/staff/available", get(staff::available_doctors))
        .route(
            "/staff/:id",
            get(staff::get_staff)
                .put(staff::update_staff)
                .delete(staff::delete_staff),
        )
        .route("/staff/:id/status", put(staff::set_staff_status))
        .route("/departments", get(staff::departments))
        .route(
            "/patients",
            get(patients::list_patients).post(patients::create_patient),
        )
        .route("/patients/by-doctor/:doctor_id", get(patients::patients_by_doctor))
        .route("/patients/:patient_id", get(patients::get_patient))
        .route("/patients/:patient_id/status", put(patients::set_patient_status))
        .route(
            "/patients/:patient_id/prescriptions",
            get(prescriptions::list_for_patient).post(prescriptions::add),
        )
        .route(
            "/patients/:patient_id/lab-reports",
            get(lab_reports::list_for_patient),
        )
        .route("/prescriptions", get(prescriptions::list_all))
        .route("/lab-reports", post(lab_reports::add))
        .route("/appointments", post(appointments::create))
        .route("/appointments/mine/:patient_id", get(appointments::for_patient))
        .route("/appointments/doctor/:doctor_id", get(appointments::for_doctor))
        .route("/appointments/:id/status", put(appointments::set_status))
        .route(
            "/emergency",
            get(emergency::list_cases).post(emergency::create_case),
        )
        .route("/wards/occupancy", get(wards::occupancy))
        .route("/dashboard/stats", get(dashboard::stats))
        .route(
            "/stock",
            get(stock::list).post(stock::add).put(stock::update),
        )
        .route("/stock/:medicine_id", delete(stock::delete))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .route("/login", post(login::login))
        .route("/health", get(health))
        .merge(protected);

    Router::new().nest("/api", api).layer(cors).with_state(state)
}

/// Bearer-token gate for protected routes.
async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::InvalidCredential("Token is missing!".to_string()))?;

    let user = state.auth.verify_token(token)?;
    state.auth.confirm_subject(&user)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "Server is running",
        "time": OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    }))
}

/// Parses an optional doctor reference arriving as an opaque string.
pub(crate) fn parse_doctor_ref(raw: Option<&str>) -> ApiResult<Option<i64>> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ApiError::Validation("Invalid doctor ID".to_string())),
    }
}

/// Parses a required identifier path segment.
pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::Validation(format!("Invalid {what} ID")))
}
