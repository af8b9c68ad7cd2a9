use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::extract::JsonBody;
use crate::error::AppError;
use crate::models::driver::{AvailableDriver, Driver};
use crate::seed::seed_drivers;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/drivers", get(list_verified_drivers))
        .route("/api/drivers/available", get(list_available_drivers))
        .route("/api/drivers/seed", post(seed))
        .route("/api/drivers/profile/:email", get(get_driver_by_email))
        .route("/api/drivers/:id", get(get_driver))
        .route("/api/drivers/:id/verify", put(verify_driver))
        .route("/api/drivers/:id/location", put(update_driver_location))
        .route("/api/drivers/:id/status", put(update_driver_availability))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationRequest {
    #[serde(default)]
    pub current_location: Option<String>,
}

/// Raw so that a missing or non-boolean flag is a field error.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAvailabilityRequest {
    #[serde(default)]
    pub is_available: Value,
}

#[derive(Serialize)]
pub struct DriverListResponse<T> {
    pub success: bool,
    pub count: usize,
    pub drivers: Vec<T>,
}

#[derive(Serialize)]
pub struct DriverResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub driver: Driver,
}

#[derive(Serialize)]
pub struct SeedResponse {
    pub success: bool,
    pub message: &'static str,
    pub count: usize,
}

fn driver_not_found() -> AppError {
    AppError::NotFound("Driver not found".to_string())
}

/// Malformed ids cannot name a driver, so they are reported as not found.
fn parse_driver_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| driver_not_found())
}

fn updated(message: &'static str, driver: Driver) -> Json<DriverResponse> {
    Json(DriverResponse {
        success: true,
        message: Some(message),
        driver,
    })
}

async fn list_verified_drivers(
    State(state): State<Arc<AppState>>,
) -> Json<DriverListResponse<Driver>> {
    let mut drivers: Vec<Driver> = state
        .store
        .drivers()
        .into_iter()
        .filter(|driver| driver.is_verified)
        .collect();

    drivers.sort_by(|a, b| {
        b.rating
            .total_cmp(&a.rating)
            .then(b.total_deliveries.cmp(&a.total_deliveries))
    });

    Json(DriverListResponse {
        success: true,
        count: drivers.len(),
        drivers,
    })
}

async fn list_available_drivers(
    State(state): State<Arc<AppState>>,
) -> Json<DriverListResponse<AvailableDriver>> {
    let drivers: Vec<AvailableDriver> = state
        .store
        .drivers()
        .iter()
        .filter(|driver| driver.is_assignable())
        .map(AvailableDriver::from)
        .collect();

    Json(DriverListResponse {
        success: true,
        count: drivers.len(),
        drivers,
    })
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DriverResponse>, AppError> {
    let driver = state
        .store
        .driver(parse_driver_id(&id)?)
        .ok_or_else(driver_not_found)?;

    Ok(Json(DriverResponse {
        success: true,
        message: None,
        driver,
    }))
}

async fn get_driver_by_email(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<DriverResponse>, AppError> {
    let driver = state
        .store
        .driver_by_email(&email.trim().to_lowercase())
        .ok_or_else(driver_not_found)?;

    Ok(Json(DriverResponse {
        success: true,
        message: None,
        driver,
    }))
}

async fn verify_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DriverResponse>, AppError> {
    let driver = state
        .store
        .update_driver(parse_driver_id(&id)?, |driver| driver.is_verified = true)
        .ok_or_else(driver_not_found)?;

    info!(driver_id = %driver.id, "driver verified");
    Ok(updated("Driver verified successfully", driver))
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateLocationRequest>,
) -> Result<Json<DriverResponse>, AppError> {
    let location = payload
        .current_location
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty());

    let driver = state
        .store
        .update_driver(parse_driver_id(&id)?, |driver| {
            driver.current_location = location
        })
        .ok_or_else(driver_not_found)?;

    Ok(updated("Driver location updated successfully", driver))
}

async fn update_driver_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateAvailabilityRequest>,
) -> Result<Json<DriverResponse>, AppError> {
    let id = parse_driver_id(&id)?;
    let is_available = payload
        .is_available
        .as_bool()
        .ok_or_else(|| AppError::field("isAvailable", "isAvailable must be true or false"))?;

    let driver = state
        .store
        .update_driver(id, |driver| {
            driver.is_available = is_available
        })
        .ok_or_else(driver_not_found)?;

    info!(
        driver_id = %driver.id,
        is_available = driver.is_available,
        "driver availability changed"
    );
    Ok(updated("Driver status updated successfully", driver))
}

async fn seed(State(state): State<Arc<AppState>>) -> Result<Json<SeedResponse>, AppError> {
    let count = seed_drivers(&state.store)?;
    info!(count, "sample drivers seeded");

    Ok(Json(SeedResponse {
        success: true,
        message: "Sample drivers seeded successfully",
        count,
    }))
}
