use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::api::rest::extract::{
    JsonBody, ValidatedJson, normalized_email, parsed_label, trimmed, trimmed_opt,
};
use crate::engine::lifecycle::{create_delivery, track_delivery, update_status};
use crate::error::AppError;
use crate::models::delivery::{
    AdditionalServices, CustomerInfo, Delivery, DeliveryDetails, DeliveryStatus, NewDelivery,
    PackageType, TimeSlot, TrackingView,
};
use crate::state::AppState;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/deliveries", post(book_delivery).get(list_deliveries))
        .route("/api/deliveries/track/:order_id", get(track))
        .route("/api/deliveries/driver/:driver_id", get(list_driver_deliveries))
        .route("/api/deliveries/:order_id/status", put(change_status))
}

/// Missing fields deserialize to empty values so that the validation rules
/// report them as field errors.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
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
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPayload {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 10, message = "Pickup address must be at least 10 characters"))]
    pub pickup_address: String,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 10, message = "Dropoff address must be at least 10 characters"))]
    pub dropoff_address: String,

    #[serde(default, deserialize_with = "parsed_label")]
    #[validate(required(message = "Invalid package type"))]
    pub package_type: Option<PackageType>,

    #[serde(default)]
    #[validate(range(min = 0.1, message = "Package weight must be at least 0.1 kg"))]
    pub package_weight: f64,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
    pub package_description: String,

    #[serde(default, deserialize_with = "delivery_date")]
    #[validate(required(message = "Date must be in YYYY-MM-DD format"))]
    pub delivery_date: Option<NaiveDate>,

    #[serde(default, deserialize_with = "parsed_label")]
    #[validate(required(message = "Invalid delivery time"))]
    pub delivery_time: Option<TimeSlot>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeliveryRequest {
    #[serde(default)]
    #[validate(nested)]
    pub customer: CustomerPayload,

    #[serde(default)]
    #[validate(nested)]
    pub delivery: DeliveryPayload,

    #[serde(default)]
    pub additional_services: AdditionalServices,

    #[serde(default, deserialize_with = "trimmed_opt")]
    pub selected_driver_id: Option<String>,
}

/// `status` is kept raw so that a missing or non-string value is reported
/// as a field error like any unknown label.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: Value,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

fn delivery_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|value| parse_delivery_date(value.trim())))
}

/// Exactly `YYYY-MM-DD` and a real calendar day.
fn parse_delivery_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn parse_status(raw: &str) -> Result<DeliveryStatus, AppError> {
    raw.trim()
        .parse::<DeliveryStatus>()
        .map_err(|_| AppError::field("status", "Invalid status"))
}

impl TryFrom<CreateDeliveryRequest> for NewDelivery {
    type Error = AppError;

    /// Expects a payload that already passed validation.
    fn try_from(payload: CreateDeliveryRequest) -> Result<Self, Self::Error> {
        let details = payload.delivery;
        let (Some(package_type), Some(delivery_date), Some(delivery_time)) = (
            details.package_type,
            details.delivery_date,
            details.delivery_time,
        ) else {
            return Err(AppError::Internal(
                "booking reached conversion without validation".to_string(),
            ));
        };

        Ok(NewDelivery {
            customer: CustomerInfo {
                first_name: payload.customer.first_name,
                last_name: payload.customer.last_name,
                email: payload.customer.email,
                phone: payload.customer.phone,
            },
            delivery: DeliveryDetails {
                pickup_address: details.pickup_address,
                dropoff_address: details.dropoff_address,
                package_type,
                package_weight: details.package_weight,
                package_description: details.package_description,
                delivery_date,
                delivery_time,
            },
            additional_services: payload.additional_services,
            selected_driver_id: payload.selected_driver_id,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub success: bool,
    pub message: &'static str,
    pub order_id: String,
    pub delivery: Delivery,
}

#[derive(Serialize)]
pub struct TrackingResponse {
    pub success: bool,
    pub delivery: TrackingView,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: &'static str,
    pub delivery: Delivery,
}

#[derive(Serialize)]
pub struct DeliveryListResponse {
    pub success: bool,
    pub count: usize,
    pub deliveries: Vec<Delivery>,
}

impl From<Vec<Delivery>> for DeliveryListResponse {
    fn from(deliveries: Vec<Delivery>) -> Self {
        Self {
            success: true,
            count: deliveries.len(),
            deliveries,
        }
    }
}

async fn book_delivery(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<CreateDeliveryRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let booking = NewDelivery::try_from(payload)?;
    let delivery = create_delivery(&state, booking)?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            success: true,
            message: "Delivery booked successfully!",
            order_id: delivery.order_id.clone(),
            delivery,
        }),
    ))
}

async fn track(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<TrackingResponse>, AppError> {
    let delivery = track_delivery(&state, &order_id)?;

    Ok(Json(TrackingResponse {
        success: true,
        delivery: TrackingView::from(delivery),
    }))
}

async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    JsonBody(payload): JsonBody<UpdateStatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = parse_status(payload.status.as_str().unwrap_or_default())?;
    let delivery = update_status(&state, &order_id, status)?;

    Ok(Json(StatusResponse {
        success: true,
        message: "Delivery status updated successfully",
        delivery,
    }))
}

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<DeliveryListResponse>, AppError> {
    let status = query
        .status
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_status)
        .transpose()?;

    Ok(Json(state.store.deliveries(status).into()))
}

/// Unknown or malformed driver ids simply match nothing.
async fn list_driver_deliveries(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<String>,
) -> Json<DeliveryListResponse> {
    let deliveries = match Uuid::parse_str(driver_id.trim()) {
        Ok(id) => state.store.deliveries_for_driver(id),
        Err(_) => Vec::new(),
    };

    Json(deliveries.into())
}
