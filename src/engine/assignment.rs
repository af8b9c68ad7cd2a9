use std::time::Instant;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::state::AppState;
use crate::store::Claim;

const SELECTED_NOT_FOUND: &str = "Selected driver not found";
const SELECTED_UNAVAILABLE: &str = "Selected driver is not available";

/// Claims a driver for a new delivery.
///
/// With `selected` the caller's choice must exist and be assignable, else the
/// booking is rejected. Without it the first assignable driver (earliest
/// registered) that can still be claimed wins; `Ok(None)` means nobody was
/// free and the delivery stays booked.
pub fn assign_driver(state: &AppState, selected: Option<&str>) -> Result<Option<Driver>, AppError> {
    let start = Instant::now();
    let result = match selected {
        Some(raw) => claim_selected(state, raw).map(Some),
        None => Ok(claim_any(state)),
    };

    let outcome = match &result {
        Ok(Some(_)) => "assigned",
        Ok(None) => "unassigned",
        Err(_) => "rejected",
    };
    state
        .metrics
        .assignment_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());

    result
}

fn claim_selected(state: &AppState, raw: &str) -> Result<Driver, AppError> {
    let id = Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::BadRequest(SELECTED_NOT_FOUND.to_string()))?;

    match state.store.try_claim_driver(id) {
        Claim::Claimed(driver) => {
            info!(driver_id = %driver.id, "selected driver claimed");
            Ok(driver)
        }
        Claim::NotFound => Err(AppError::BadRequest(SELECTED_NOT_FOUND.to_string())),
        Claim::Unavailable => Err(AppError::BadRequest(SELECTED_UNAVAILABLE.to_string())),
    }
}

fn claim_any(state: &AppState) -> Option<Driver> {
    for id in state.store.assignable_driver_ids() {
        match state.store.try_claim_driver(id) {
            Claim::Claimed(driver) => {
                info!(driver_id = %driver.id, "driver auto-assigned");
                return Some(driver);
            }
            // Lost the race to another booking; try the next candidate.
            Claim::NotFound | Claim::Unavailable => {
                debug!(driver_id = %id, "candidate driver no longer assignable");
            }
        }
    }

    None
}

/// Returns a claimed driver whose delivery could not be written.
pub fn release_driver(state: &AppState, driver_id: Uuid) {
    if state.store.release_driver(driver_id).is_some() {
        info!(driver_id = %driver_id, "driver claim released");
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::assign_driver;
    use crate::auth::TokenService;
    use crate::error::AppError;
    use crate::models::driver::{Driver, VehicleType};
    use crate::state::AppState;
    use crate::store::Store;

    fn state() -> AppState {
        AppState::new(
            Store::in_memory(),
            TokenService::new("test-secret", Duration::days(7)),
            16,
        )
    }

    fn driver(license: &str, available: bool, verified: bool, age_minutes: i64) -> Driver {
        let created_at = Utc::now() - Duration::minutes(age_minutes);
        Driver {
            id: Uuid::new_v4(),
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            email: format!("{license}@deliveryapp.com"),
            phone: "+1 (555) 123-4567".to_string(),
            license_number: license.to_string(),
            vehicle_type: VehicleType::Van,
            vehicle_model: None,
            license_plate: Some("ABC 123".to_string()),
            is_available: available,
            is_verified: verified,
            rating: 4.8,
            total_deliveries: 0,
            current_location: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn no_assignable_driver_yields_none() {
        let state = state();
        state
            .store
            .insert_drivers(vec![
                driver("DL00001", false, true, 5),
                driver("DL00002", true, false, 5),
            ])
            .unwrap();

        assert!(assign_driver(&state, None).unwrap().is_none());
    }

    #[test]
    fn auto_assignment_takes_earliest_registered_driver() {
        let state = state();
        let older = driver("DL00001", true, true, 30);
        let older_id = older.id;
        state
            .store
            .insert_drivers(vec![driver("DL00002", true, true, 1), older])
            .unwrap();

        let claimed = assign_driver(&state, None).unwrap().unwrap();
        assert_eq!(claimed.id, older_id);
        assert!(!state.store.driver(older_id).unwrap().is_available);
    }

    #[test]
    fn selected_driver_must_exist() {
        let state = state();

        let err = assign_driver(&state, Some(&Uuid::new_v4().to_string())).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Selected driver not found"));

        let err = assign_driver(&state, Some("not-a-uuid")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Selected driver not found"));
    }

    #[test]
    fn selected_driver_must_be_available() {
        let state = state();
        let busy = driver("DL00001", false, true, 5);
        let busy_id = busy.id.to_string();
        state.store.insert_drivers(vec![busy]).unwrap();

        let err = assign_driver(&state, Some(&busy_id)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Selected driver is not available"));
    }
}
