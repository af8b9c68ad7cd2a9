use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::assignment::{assign_driver, release_driver};
use crate::error::AppError;
use crate::models::delivery::{
    Delivery, DeliveryEvent, DeliveryStatus, DriverSnapshot, NewDelivery, StatusTimestamps,
};
use crate::state::AppState;
use crate::store::StoreError;

pub const ORDER_ID_PREFIX: &str = "SD";
const ORDER_SUFFIX_LEN: usize = 6;
const MAX_ORDER_ID_ATTEMPTS: usize = 8;

/// `SD` + `YYYYMMDD` + six uppercase hex characters.
pub fn generate_order_id(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{ORDER_ID_PREFIX}{}{}",
        now.format("%Y%m%d"),
        random[..ORDER_SUFFIX_LEN].to_uppercase()
    )
}

/// Order ids are stored uppercase; lookups accept any case.
pub fn normalize_order_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn create_delivery(state: &AppState, booking: NewDelivery) -> Result<Delivery, AppError> {
    let driver = assign_driver(state, booking.selected_driver_id.as_deref())?;

    let now = Utc::now();
    let mut timestamps = StatusTimestamps::default();
    timestamps.record(DeliveryStatus::Booked, now);

    let mut delivery = Delivery {
        id: Uuid::new_v4(),
        order_id: String::new(),
        customer: booking.customer,
        delivery: booking.delivery,
        status: DeliveryStatus::Booked,
        driver_id: None,
        driver: None,
        timestamps,
        additional_services: booking.additional_services,
        created_at: now,
        updated_at: now,
    };

    if let Some(driver) = &driver {
        delivery.status = DeliveryStatus::Assigned;
        delivery.driver_id = Some(driver.id);
        delivery.driver = Some(DriverSnapshot::from(driver));
        delivery.timestamps.record(DeliveryStatus::Assigned, now);
    }

    if let Err(err) = insert_with_fresh_order_id(state, &mut delivery, now) {
        if let Some(driver) = &driver {
            release_driver(state, driver.id);
        }
        return Err(err);
    }

    state
        .metrics
        .deliveries_created_total
        .with_label_values(&[delivery.status.as_str()])
        .inc();
    state.publish(DeliveryEvent::from(&delivery));

    info!(
        order_id = %delivery.order_id,
        status = delivery.status.as_str(),
        driver_id = ?delivery.driver_id,
        "delivery booked"
    );

    Ok(delivery)
}

fn insert_with_fresh_order_id(
    state: &AppState,
    delivery: &mut Delivery,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    for _ in 0..MAX_ORDER_ID_ATTEMPTS {
        delivery.order_id = generate_order_id(now);
        match state.store.insert_delivery(delivery.clone()) {
            Ok(()) => return Ok(()),
            Err(StoreError::DuplicateOrderId(id)) => {
                warn!(order_id = %id, "order id collision, regenerating");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(AppError::Internal(format!(
        "no free order id after {MAX_ORDER_ID_ATTEMPTS} attempts"
    )))
}

pub fn track_delivery(state: &AppState, order_id: &str) -> Result<Delivery, AppError> {
    state
        .store
        .delivery(&normalize_order_id(order_id))
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// Moves a delivery to `status`. Any stage may follow any other.
///
/// Entering `delivered` frees the driver recorded at assignment and counts
/// the delivery on their profile; repeating `delivered` does not count twice.
pub fn update_status(
    state: &AppState,
    order_id: &str,
    status: DeliveryStatus,
) -> Result<Delivery, AppError> {
    let now = Utc::now();
    let (delivery, previous) = state
        .store
        .update_delivery(&normalize_order_id(order_id), |delivery| {
            let previous = delivery.status;
            delivery.status = status;
            delivery.timestamps.record(status, now);
            delivery.updated_at = now;
            previous
        })
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if status == DeliveryStatus::Delivered && previous != DeliveryStatus::Delivered {
        complete_for_driver(state, &delivery);
    }

    state
        .metrics
        .status_updates_total
        .with_label_values(&[status.as_str()])
        .inc();
    state.publish(DeliveryEvent::from(&delivery));

    info!(
        order_id = %delivery.order_id,
        from = previous.as_str(),
        to = status.as_str(),
        "delivery status updated"
    );

    Ok(delivery)
}

fn complete_for_driver(state: &AppState, delivery: &Delivery) {
    let Some(driver_id) = delivery.driver_id else {
        return;
    };

    match state.store.complete_driver_delivery(driver_id) {
        Some(driver) => info!(
            driver_id = %driver.id,
            total_deliveries = driver.total_deliveries,
            "driver released after delivery"
        ),
        None => warn!(
            order_id = %delivery.order_id,
            driver_id = %driver_id,
            "assigned driver no longer exists"
        ),
    }
}
