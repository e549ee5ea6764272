//! Login endpoint.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::Role;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

/// `POST /api/login` — authenticates a user against the role-partitioned
/// record sets and returns a signed session token with the profile.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let (email, password, role) = match (body.email, body.password, body.role) {
        (Some(email), Some(password), Some(role))
            if !email.is_empty() && !password.is_empty() && !role.is_empty() =>
        {
            (email, password, role)
        }
        _ => {
            return Err(ApiError::Validation(
                "Email, password and role are required!".to_string(),
            ))
        }
    };

    let role = Role::parse(&role)
        .ok_or_else(|| ApiError::Validation(format!("Unknown role: {role}")))?;

    let outcome = state.auth.authenticate(&email, &password, role)?;
    let redirect = format!("/{}/dashboard", outcome.user.role);

    Ok(Json(json!({
        "token": outcome.token,
        "profile": outcome.user,
        "redirect": redirect,
        "message": "Login successful",
    })))
}
