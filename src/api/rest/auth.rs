use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::api::rest::extract::{
    AuthUser, ValidatedJson, normalized_email, parsed_label, trimmed, trimmed_opt,
};
use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::models::driver::{DEFAULT_RATING, Driver, DriverSummary, VehicleType};
use crate::models::user::{Role, User, UserSummary};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/driver/register", post(register_driver))
        .route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 2, message = "First name must be at least 2 characters"))]
    pub first_name: String,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 2, message = "Last name must be at least 2 characters"))]
    pub last_name: String,

    #[serde(default, deserialize_with = "normalized_email")]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 10, message = "Phone must be at least 10 characters"))]
    pub phone: String,

    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[serde(default)]
    #[validate(custom(function = "validate_role"))]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "normalized_email")]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDriverRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 2, message = "First name must be at least 2 characters"))]
    pub first_name: String,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 2, message = "Last name must be at least 2 characters"))]
    pub last_name: String,

    #[serde(default, deserialize_with = "normalized_email")]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 10, message = "Phone must be at least 10 characters"))]
    pub phone: String,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 5, message = "License number must be at least 5 characters"))]
    pub license_number: String,

    #[serde(default, deserialize_with = "parsed_label")]
    #[validate(required(message = "Invalid vehicle type"))]
    pub vehicle_type: Option<VehicleType>,

    #[serde(default, deserialize_with = "trimmed_opt")]
    pub vehicle_model: Option<String>,

    #[serde(default, deserialize_with = "trimmed_opt")]
    pub license_plate: Option<String>,

    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

fn validate_role(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<Role>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("role").with_message("Invalid role".into()))
}


#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: &'static str,
    pub token: String,
    pub user: UserSummary,
}

#[derive(Serialize)]
pub struct DriverAuthResponse {
    pub success: bool,
    pub message: &'static str,
    pub token: String,
    pub driver: DriverSummary,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserSummary,
}

async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let role = match payload.role.as_deref() {
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|_| AppError::field("role", "Invalid role"))?,
        None => Role::Customer,
    };

    // Re-checked under the registration lock by insert_user.
    if state.store.user_by_email(&payload.email).is_some() {
        return Err(AppError::Conflict(
            "User already exists with this email".to_string(),
        ));
    }

    let user = User {
        id: Uuid::new_v4(),
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        phone: payload.phone,
        password_hash: hash_password(payload.password).await?,
        role,
        is_verified: false,
        created_at: Utc::now(),
    };

    state.store.insert_user(user.clone())?;
    let token = state.tokens.issue(&user)?;

    state
        .metrics
        .registrations_total
        .with_label_values(&[role.as_str()])
        .inc();
    info!(user_id = %user.id, role = role.as_str(), "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "User registered successfully",
            token,
            user: UserSummary::from(&user),
        }),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let Some(user) = state.store.user_by_email(&payload.email) else {
        debug!(email = %payload.email, "login for unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        debug!(user_id = %user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let token = state.tokens.issue(&user)?;
    info!(user_id = %user.id, "login succeeded");

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful",
        token,
        user: UserSummary::from(&user),
    }))
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<RegisterDriverRequest>,
) -> Result<(StatusCode, Json<DriverAuthResponse>), AppError> {
    let vehicle_type = payload
        .vehicle_type
        .ok_or_else(|| AppError::field("vehicleType", "Invalid vehicle type"))?;

    let now = Utc::now();
    let driver = Driver {
        id: Uuid::new_v4(),
        first_name: payload.first_name.clone(),
        last_name: payload.last_name.clone(),
        email: payload.email.clone(),
        phone: payload.phone.clone(),
        license_number: payload.license_number,
        vehicle_type,
        vehicle_model: payload.vehicle_model,
        license_plate: payload.license_plate,
        is_available: true,
        is_verified: false,
        rating: DEFAULT_RATING,
        total_deliveries: 0,
        current_location: None,
        created_at: now,
        updated_at: now,
    };

    let user = User {
        id: Uuid::new_v4(),
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        phone: payload.phone,
        password_hash: hash_password(payload.password).await?,
        role: Role::Driver,
        is_verified: false,
        created_at: now,
    };

    state
        .store
        .insert_driver_account(driver.clone(), user.clone())?;
    let token = state.tokens.issue(&user)?;

    state
        .metrics
        .registrations_total
        .with_label_values(&[Role::Driver.as_str()])
        .inc();
    info!(driver_id = %driver.id, user_id = %user.id, "driver registered");

    Ok((
        StatusCode::CREATED,
        Json(DriverAuthResponse {
            success: true,
            message: "Driver registered successfully",
            token,
            driver: DriverSummary::from(&driver),
        }),
    ))
}

async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let user = state
        .store
        .user(claims.id)
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_string()))?;

    Ok(Json(MeResponse {
        success: true,
        user: UserSummary::from(&user),
    }))
}
