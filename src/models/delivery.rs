use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::UnknownVariant;
use crate::models::driver::Driver;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryStatus {
    Booked,
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Booked => "booked",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::PickedUp => "pickedUp",
            DeliveryStatus::InTransit => "inTransit",
            DeliveryStatus::Delivered => "delivered",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booked" => Ok(DeliveryStatus::Booked),
            "assigned" => Ok(DeliveryStatus::Assigned),
            "pickedUp" => Ok(DeliveryStatus::PickedUp),
            "inTransit" => Ok(DeliveryStatus::InTransit),
            "delivered" => Ok(DeliveryStatus::Delivered),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Document,
    Small,
    Medium,
    Large,
    Fragile,
    Food,
}

impl FromStr for PackageType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(PackageType::Document),
            "small" => Ok(PackageType::Small),
            "medium" => Ok(PackageType::Medium),
            "large" => Ok(PackageType::Large),
            "fragile" => Ok(PackageType::Fragile),
            "food" => Ok(PackageType::Food),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeSlot {
    Morning,
    Afternoon,
    Evening,
    Anytime,
}

impl FromStr for TimeSlot {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(TimeSlot::Morning),
            "afternoon" => Ok(TimeSlot::Afternoon),
            "evening" => Ok(TimeSlot::Evening),
            "anytime" => Ok(TimeSlot::Anytime),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDetails {
    pub pickup_address: String,
    pub dropoff_address: String,
    pub package_type: PackageType,
    pub package_weight: f64,
    pub package_description: String,
    pub delivery_date: NaiveDate,
    pub delivery_time: TimeSlot,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalServices {
    #[serde(default)]
    pub insurance: bool,
    #[serde(default)]
    pub signature: bool,
    #[serde(default)]
    pub express: bool,
}

/// Copy of the assigned driver's contact details taken at assignment time.
/// It is a historical record and is never refreshed from the driver profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverSnapshot {
    pub name: String,
    pub phone: String,
    pub vehicle: String,
}

impl From<&Driver> for DriverSnapshot {
    fn from(driver: &Driver) -> Self {
        let plate = driver.license_plate.as_deref().unwrap_or("N/A");
        Self {
            name: driver.full_name(),
            phone: driver.phone.clone(),
            vehicle: format!("{} - {}", driver.vehicle_type.as_str(), plate),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusTimestamps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picked_up: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_transit: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    pub fn record(&mut self, status: DeliveryStatus, at: DateTime<Utc>) {
        let slot = match status {
            DeliveryStatus::Booked => &mut self.booked,
            DeliveryStatus::Assigned => &mut self.assigned,
            DeliveryStatus::PickedUp => &mut self.picked_up,
            DeliveryStatus::InTransit => &mut self.in_transit,
            DeliveryStatus::Delivered => &mut self.delivered,
        };
        *slot = Some(at);
    }

    pub fn get(&self, status: DeliveryStatus) -> Option<DateTime<Utc>> {
        match status {
            DeliveryStatus::Booked => self.booked,
            DeliveryStatus::Assigned => self.assigned,
            DeliveryStatus::PickedUp => self.picked_up,
            DeliveryStatus::InTransit => self.in_transit,
            DeliveryStatus::Delivered => self.delivered,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: String,
    pub customer: CustomerInfo,
    pub delivery: DeliveryDetails,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverSnapshot>,
    pub timestamps: StatusTimestamps,
    pub additional_services: AdditionalServices,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated booking input, before an order id or driver is attached.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub customer: CustomerInfo,
    pub delivery: DeliveryDetails,
    pub additional_services: AdditionalServices,
    pub selected_driver_id: Option<String>,
}

/// Public tracking view of a delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub order_id: String,
    pub customer: CustomerInfo,
    pub delivery: DeliveryDetails,
    pub status: DeliveryStatus,
    pub driver: Option<DriverSnapshot>,
    pub timestamps: StatusTimestamps,
    pub additional_services: AdditionalServices,
}

impl From<Delivery> for TrackingView {
    fn from(delivery: Delivery) -> Self {
        Self {
            order_id: delivery.order_id,
            customer: delivery.customer,
            delivery: delivery.delivery,
            status: delivery.status,
            driver: delivery.driver,
            timestamps: delivery.timestamps,
            additional_services: delivery.additional_services,
        }
    }
}

/// Published on every create and status change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEvent {
    pub order_id: String,
    pub status: DeliveryStatus,
    pub driver_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

impl From<&Delivery> for DeliveryEvent {
    fn from(delivery: &Delivery) -> Self {
        Self {
            order_id: delivery.order_id.clone(),
            status: delivery.status,
            driver_id: delivery.driver_id,
            at: delivery.updated_at,
        }
    }
}
