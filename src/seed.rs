//! Sample drivers for development databases.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::error::AppError;
use crate::models::driver::{Driver, VehicleType};
use crate::models::user::{Role, User};
use crate::store::{Store, StoreError};

struct SampleDriver {
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    phone: &'static str,
    license_number: &'static str,
    vehicle_type: VehicleType,
    vehicle_model: &'static str,
    license_plate: &'static str,
    rating: f64,
    total_deliveries: u32,
}

const SAMPLE_DRIVERS: [SampleDriver; 4] = [
    SampleDriver {
        first_name: "John",
        last_name: "Smith",
        email: "john.smith@deliveryapp.com",
        phone: "+1 (555) 123-4567",
        license_number: "DL123456789",
        vehicle_type: VehicleType::Van,
        vehicle_model: "Toyota Hiace",
        license_plate: "ABC 123",
        rating: 4.8,
        total_deliveries: 245,
    },
    SampleDriver {
        first_name: "Sarah",
        last_name: "Johnson",
        email: "sarah.johnson@deliveryapp.com",
        phone: "+1 (555) 234-5678",
        license_number: "DL987654321",
        vehicle_type: VehicleType::Car,
        vehicle_model: "Honda Civic",
        license_plate: "XYZ 789",
        rating: 4.9,
        total_deliveries: 312,
    },
    SampleDriver {
        first_name: "Mike",
        last_name: "Wilson",
        email: "mike.wilson@deliveryapp.com",
        phone: "+1 (555) 345-6789",
        license_number: "DL456789123",
        vehicle_type: VehicleType::Truck,
        vehicle_model: "Ford F-150",
        license_plate: "DEF 456",
        rating: 4.7,
        total_deliveries: 189,
    },
    SampleDriver {
        first_name: "Emma",
        last_name: "Brown",
        email: "emma.brown@deliveryapp.com",
        phone: "+1 (555) 456-7890",
        license_number: "DL789123456",
        vehicle_type: VehicleType::Bike,
        vehicle_model: "Yamaha MT-15",
        license_plate: "GHI 012",
        rating: 4.6,
        total_deliveries: 156,
    },
];

impl SampleDriver {
    fn to_driver(&self) -> Driver {
        let now = Utc::now();
        Driver {
            id: Uuid::new_v4(),
            first_name: self.first_name.to_string(),
            last_name: self.last_name.to_string(),
            email: self.email.to_string(),
            phone: self.phone.to_string(),
            license_number: self.license_number.to_string(),
            vehicle_type: self.vehicle_type,
            vehicle_model: Some(self.vehicle_model.to_string()),
            license_plate: Some(self.license_plate.to_string()),
            is_available: true,
            is_verified: true,
            rating: self.rating,
            total_deliveries: self.total_deliveries,
            current_location: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn to_user(&self, password_hash: String) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: self.first_name.to_string(),
            last_name: self.last_name.to_string(),
            email: self.email.to_string(),
            phone: self.phone.to_string(),
            password_hash,
            role: Role::Driver,
            is_verified: true,
            created_at: Utc::now(),
        }
    }
}

pub fn sample_drivers() -> Vec<Driver> {
    SAMPLE_DRIVERS.iter().map(SampleDriver::to_driver).collect()
}

/// Inserts every sample driver, or none of them if any already exists.
pub fn seed_drivers(store: &Store) -> Result<usize, AppError> {
    store.insert_drivers(sample_drivers()).map_err(|err| match err {
        StoreError::DuplicateDriver => AppError::Conflict("Some drivers already exist".to_string()),
        other => other.into(),
    })
}

/// Startup seeding: makes sure every sample driver has a profile and a
/// login account. A profile that already exists (seed endpoint, reopened
/// snapshot) only gets its missing account. Returns the accounts created.
pub async fn seed_driver_accounts(store: &Store, password: &str) -> Result<usize, AppError> {
    let hash = hash_password(password.to_string()).await?;
    let mut created = 0;

    for sample in &SAMPLE_DRIVERS {
        if store.user_by_email(sample.email).is_some() {
            continue;
        }

        let inserted = if store.driver_by_email(sample.email).is_some() {
            store.insert_user(sample.to_user(hash.clone()))
        } else {
            store.insert_driver_account(sample.to_driver(), sample.to_user(hash.clone()))
        };

        match inserted {
            Ok(()) => created += 1,
            Err(StoreError::DuplicateDriver | StoreError::DuplicateEmail) => {
                warn!(email = sample.email, "sample driver clashes with existing data, skipping");
            }
            Err(err) => return Err(err.into()),
        }
    }

    info!(created, "sample driver accounts seeded");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::{seed_driver_accounts, seed_drivers};
    use crate::auth::password::verify_password;
    use crate::error::AppError;
    use crate::models::user::Role;
    use crate::store::Store;

    #[test]
    fn seeding_twice_is_rejected() {
        let store = Store::in_memory();
        assert_eq!(seed_drivers(&store).unwrap(), 4);

        let err = seed_drivers(&store).unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "Some drivers already exist"));
        assert_eq!(store.driver_count(), 4);
    }

    #[tokio::test]
    async fn account_seeding_adds_logins_for_seeded_profiles() {
        let store = Store::in_memory();
        seed_drivers(&store).unwrap();
        assert_eq!(store.user_count(), 0);

        assert_eq!(seed_driver_accounts(&store, "password123").await.unwrap(), 4);
        assert_eq!(store.driver_count(), 4);
        assert_eq!(store.user_count(), 4);

        let user = store.user_by_email("john.smith@deliveryapp.com").unwrap();
        assert_eq!(user.role, Role::Driver);
        assert!(
            verify_password("password123".to_string(), user.password_hash)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn account_seeding_skips_existing_drivers() {
        let store = Store::in_memory();
        assert_eq!(seed_driver_accounts(&store, "password123").await.unwrap(), 4);
        assert_eq!(seed_driver_accounts(&store, "password123").await.unwrap(), 0);

        assert_eq!(store.user_count(), 4);
        assert!(store.user_by_email("emma.brown@deliveryapp.com").is_some());
    }
}
