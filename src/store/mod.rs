//! Document store shared by every handler.
//!
//! Records live in lock-striped [`DashMap`]s. Secondary indexes carry the
//! uniqueness constraints (user email, driver email, license number) and the
//! delivery map is keyed by order id. A driver claim is a single
//! read-modify-write under the entry's write guard, so two concurrent
//! bookings can never both take the same driver.
//!
//! The store has an explicit lifecycle: [`Store::open`] optionally loads a
//! JSON snapshot and [`Store::close`] writes it back.

mod snapshot;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::driver::Driver;
use crate::models::user::User;

pub use snapshot::Snapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a user with this email already exists")]
    DuplicateEmail,

    #[error("a driver with this email or license number already exists")]
    DuplicateDriver,

    #[error("order id {0} already exists")]
    DuplicateOrderId(String),

    #[error("registration lock poisoned")]
    Poisoned,

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Outcome of an attempt to take a driver for a delivery.
#[derive(Debug, Clone)]
pub enum Claim {
    Claimed(Driver),
    NotFound,
    Unavailable,
}

pub struct Store {
    users: DashMap<Uuid, User>,
    user_emails: DashMap<String, Uuid>,
    drivers: DashMap<Uuid, Driver>,
    driver_emails: DashMap<String, Uuid>,
    driver_licenses: DashMap<String, Uuid>,
    deliveries: DashMap<String, Delivery>,
    registration: Mutex<()>,
    snapshot_path: Option<PathBuf>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            users: DashMap::new(),
            user_emails: DashMap::new(),
            drivers: DashMap::new(),
            driver_emails: DashMap::new(),
            driver_licenses: DashMap::new(),
            deliveries: DashMap::new(),
            registration: Mutex::new(()),
            snapshot_path: None,
        }
    }

    /// Opens a store backed by `path`. A missing file yields an empty store
    /// that will be written on [`Store::close`].
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(err) => return Err(err.into()),
        };

        let mut store = Self::in_memory();
        store.snapshot_path = Some(path.clone());
        store.load(snapshot);

        info!(
            path = %path.display(),
            users = store.users.len(),
            drivers = store.drivers.len(),
            deliveries = store.deliveries.len(),
            "store opened"
        );

        Ok(store)
    }

    /// Writes the snapshot if the store is file-backed. In-memory stores
    /// close without side effects.
    pub async fn close(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let body = serde_json::to_vec_pretty(&self.snapshot())?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await?;

        info!(path = %path.display(), "store snapshot written");
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            users: self.users.iter().map(|e| e.value().clone()).collect(),
            drivers: self.drivers.iter().map(|e| e.value().clone()).collect(),
            deliveries: self.deliveries.iter().map(|e| e.value().clone()).collect(),
        }
    }

    fn load(&mut self, snapshot: Snapshot) {
        for user in snapshot.users {
            self.user_emails.insert(user.email.clone(), user.id);
            self.users.insert(user.id, user);
        }
        for driver in snapshot.drivers {
            self.driver_emails.insert(driver.email.clone(), driver.id);
            self.driver_licenses
                .insert(driver.license_number.clone(), driver.id);
            self.drivers.insert(driver.id, driver);
        }
        for delivery in snapshot.deliveries {
            self.deliveries.insert(delivery.order_id.clone(), delivery);
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.len()
    }

    // users

    pub fn insert_user(&self, user: User) -> Result<(), StoreError> {
        let _guard = self.registration.lock().map_err(|_| StoreError::Poisoned)?;

        if self.user_emails.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        self.user_emails.insert(user.email.clone(), user.id);
        self.users.insert(user.id, user);
        Ok(())
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        let id = *self.user_emails.get(email)?;
        self.user(id)
    }

    // drivers

    /// Inserts a driver profile and its login account together. Nothing is
    /// written when either uniqueness check fails.
    pub fn insert_driver_account(&self, driver: Driver, user: User) -> Result<(), StoreError> {
        let _guard = self.registration.lock().map_err(|_| StoreError::Poisoned)?;

        if self.driver_taken(&driver) {
            return Err(StoreError::DuplicateDriver);
        }
        if self.user_emails.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        self.index_driver(driver);
        self.user_emails.insert(user.email.clone(), user.id);
        self.users.insert(user.id, user);
        Ok(())
    }

    /// All-or-nothing batch insert of driver profiles.
    pub fn insert_drivers(&self, drivers: Vec<Driver>) -> Result<usize, StoreError> {
        let _guard = self.registration.lock().map_err(|_| StoreError::Poisoned)?;

        {
            let mut emails = HashSet::new();
            let mut licenses = HashSet::new();
            for driver in &drivers {
                let fresh = emails.insert(driver.email.as_str())
                    && licenses.insert(driver.license_number.as_str());
                if !fresh || self.driver_taken(driver) {
                    return Err(StoreError::DuplicateDriver);
                }
            }
        }

        let count = drivers.len();
        for driver in drivers {
            self.index_driver(driver);
        }
        Ok(count)
    }

    fn driver_taken(&self, driver: &Driver) -> bool {
        self.driver_emails.contains_key(&driver.email)
            || self.driver_licenses.contains_key(&driver.license_number)
    }

    fn index_driver(&self, driver: Driver) {
        self.driver_emails.insert(driver.email.clone(), driver.id);
        self.driver_licenses
            .insert(driver.license_number.clone(), driver.id);
        self.drivers.insert(driver.id, driver);
    }

    pub fn driver(&self, id: Uuid) -> Option<Driver> {
        self.drivers.get(&id).map(|entry| entry.value().clone())
    }

    pub fn driver_by_email(&self, email: &str) -> Option<Driver> {
        let id = *self.driver_emails.get(email)?;
        self.driver(id)
    }

    pub fn drivers(&self) -> Vec<Driver> {
        self.drivers.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Ids of available and verified drivers, earliest registered first.
    pub fn assignable_driver_ids(&self) -> Vec<Uuid> {
        let mut candidates: Vec<(chrono::DateTime<Utc>, Uuid)> = self
            .drivers
            .iter()
            .filter(|entry| entry.value().is_assignable())
            .map(|entry| (entry.value().created_at, entry.value().id))
            .collect();
        candidates.sort();
        candidates.into_iter().map(|(_, id)| id).collect()
    }

    pub fn assignable_driver_count(&self) -> usize {
        self.drivers
            .iter()
            .filter(|entry| entry.value().is_assignable())
            .count()
    }

    /// Applies `update` to a driver in place and returns the updated copy.
    pub fn update_driver<F>(&self, id: Uuid, update: F) -> Option<Driver>
    where
        F: FnOnce(&mut Driver),
    {
        let mut driver = self.drivers.get_mut(&id)?;
        update(driver.value_mut());
        driver.updated_at = Utc::now();
        Some(driver.clone())
    }

    /// Takes the driver if it is available and verified, flipping
    /// `is_available` to false under the same write guard.
    pub fn try_claim_driver(&self, id: Uuid) -> Claim {
        let Some(mut driver) = self.drivers.get_mut(&id) else {
            return Claim::NotFound;
        };

        if !driver.is_assignable() {
            return Claim::Unavailable;
        }

        driver.is_available = false;
        driver.updated_at = Utc::now();
        Claim::Claimed(driver.clone())
    }

    /// Puts a claimed driver back without counting a delivery.
    pub fn release_driver(&self, id: Uuid) -> Option<Driver> {
        self.update_driver(id, |driver| driver.is_available = true)
    }

    /// Marks a finished delivery on the driver's record.
    pub fn complete_driver_delivery(&self, id: Uuid) -> Option<Driver> {
        self.update_driver(id, |driver| {
            driver.is_available = true;
            driver.total_deliveries = driver.total_deliveries.saturating_add(1);
        })
    }

    // deliveries

    pub fn insert_delivery(&self, delivery: Delivery) -> Result<(), StoreError> {
        match self.deliveries.entry(delivery.order_id.clone()) {
            Entry::Occupied(entry) => Err(StoreError::DuplicateOrderId(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(delivery);
                Ok(())
            }
        }
    }

    pub fn delivery(&self, order_id: &str) -> Option<Delivery> {
        self.deliveries
            .get(order_id)
            .map(|entry| entry.value().clone())
    }

    /// Applies `update` to a delivery in place; returns the updated copy and
    /// whatever the closure produced.
    pub fn update_delivery<F, R>(&self, order_id: &str, update: F) -> Option<(Delivery, R)>
    where
        F: FnOnce(&mut Delivery) -> R,
    {
        let mut delivery = self.deliveries.get_mut(order_id)?;
        let output = update(delivery.value_mut());
        Some((delivery.clone(), output))
    }

    /// Newest first, optionally restricted to one status.
    pub fn deliveries(&self, status: Option<DeliveryStatus>) -> Vec<Delivery> {
        self.collect_deliveries(|delivery| status.is_none_or(|s| delivery.status == s))
    }

    pub fn deliveries_for_driver(&self, driver_id: Uuid) -> Vec<Delivery> {
        self.collect_deliveries(|delivery| delivery.driver_id == Some(driver_id))
    }

    fn collect_deliveries<P>(&self, keep: P) -> Vec<Delivery>
    where
        P: Fn(&Delivery) -> bool,
    {
        let mut list: Vec<Delivery> = self
            .deliveries
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDate, Utc};
    use uuid::Uuid;

    use super::{Claim, Store, StoreError};
    use crate::models::delivery::{
        AdditionalServices, CustomerInfo, Delivery, DeliveryDetails, DeliveryStatus, PackageType,
        StatusTimestamps, TimeSlot,
    };
    use crate::models::driver::{Driver, VehicleType};
    use crate::models::user::{Role, User};

    fn driver(email: &str, license: &str, available: bool, verified: bool) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            first_name: "Mike".to_string(),
            last_name: "Wilson".to_string(),
            email: email.to_string(),
            phone: "+1 (555) 345-6789".to_string(),
            license_number: license.to_string(),
            vehicle_type: VehicleType::Truck,
            vehicle_model: None,
            license_plate: None,
            is_available: available,
            is_verified: verified,
            rating: 4.7,
            total_deliveries: 0,
            current_location: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "Mike".to_string(),
            last_name: "Wilson".to_string(),
            email: email.to_string(),
            phone: "+1 (555) 345-6789".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Driver,
            is_verified: false,
            created_at: Utc::now(),
        }
    }

    fn delivery(order_id: &str, status: DeliveryStatus, age_minutes: i64) -> Delivery {
        let created_at = Utc::now() - Duration::minutes(age_minutes);
        Delivery {
            id: Uuid::new_v4(),
            order_id: order_id.to_string(),
            customer: CustomerInfo {
                first_name: "Ann".to_string(),
                last_name: "Lee".to_string(),
                email: "ann@example.com".to_string(),
                phone: "5551234567".to_string(),
            },
            delivery: DeliveryDetails {
                pickup_address: "1 Market Street".to_string(),
                dropoff_address: "99 Harbour Road".to_string(),
                package_type: PackageType::Small,
                package_weight: 1.5,
                package_description: "A box of books".to_string(),
                delivery_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
                delivery_time: TimeSlot::Morning,
            },
            status,
            driver_id: None,
            driver: None,
            timestamps: StatusTimestamps::default(),
            additional_services: AdditionalServices::default(),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn duplicate_user_email_is_rejected() {
        let store = Store::in_memory();
        store.insert_user(user("a@example.com")).unwrap();

        let err = store.insert_user(user("a@example.com")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn driver_account_rejects_reused_license_without_writing() {
        let store = Store::in_memory();
        store
            .insert_driver_account(driver("a@example.com", "DL00001", true, false), user("a@example.com"))
            .unwrap();

        let err = store
            .insert_driver_account(driver("b@example.com", "DL00001", true, false), user("b@example.com"))
            .unwrap_err();

        assert!(matches!(err, StoreError::DuplicateDriver));
        assert_eq!(store.driver_count(), 1);
        assert!(store.user_by_email("b@example.com").is_none());
    }

    #[test]
    fn batch_insert_is_all_or_nothing() {
        let store = Store::in_memory();
        store
            .insert_drivers(vec![driver("a@example.com", "DL00001", true, true)])
            .unwrap();

        let err = store
            .insert_drivers(vec![
                driver("b@example.com", "DL00002", true, true),
                driver("a@example.com", "DL00003", true, true),
            ])
            .unwrap_err();

        assert!(matches!(err, StoreError::DuplicateDriver));
        assert_eq!(store.driver_count(), 1);
    }

    #[test]
    fn claim_requires_available_and_verified() {
        let store = Store::in_memory();
        let unverified = driver("a@example.com", "DL00001", true, false);
        let unverified_id = unverified.id;
        store.insert_drivers(vec![unverified]).unwrap();

        assert!(matches!(store.try_claim_driver(unverified_id), Claim::Unavailable));
        assert!(matches!(store.try_claim_driver(Uuid::new_v4()), Claim::NotFound));
    }

    #[test]
    fn concurrent_claims_have_exactly_one_winner() {
        let store = Arc::new(Store::in_memory());
        let target = driver("a@example.com", "DL00001", true, true);
        let id = target.id;
        store.insert_drivers(vec![target]).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || matches!(store.try_claim_driver(id), Claim::Claimed(_)))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|claimed| *claimed)
            .count();

        assert_eq!(winners, 1);
        assert!(!store.driver(id).unwrap().is_available);
    }

    #[test]
    fn completing_a_delivery_frees_driver_and_counts_it() {
        let store = Store::in_memory();
        let target = driver("a@example.com", "DL00001", false, true);
        let id = target.id;
        store.insert_drivers(vec![target]).unwrap();

        let updated = store.complete_driver_delivery(id).unwrap();
        assert!(updated.is_available);
        assert_eq!(updated.total_deliveries, 1);
    }

    #[test]
    fn order_ids_are_unique() {
        let store = Store::in_memory();
        store
            .insert_delivery(delivery("SD202610200001", DeliveryStatus::Booked, 0))
            .unwrap();

        let err = store
            .insert_delivery(delivery("SD202610200001", DeliveryStatus::Booked, 0))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateOrderId(_)));
    }

    #[test]
    fn deliveries_filter_by_status_newest_first() {
        let store = Store::in_memory();
        store
            .insert_delivery(delivery("SDOLD", DeliveryStatus::Assigned, 10))
            .unwrap();
        store
            .insert_delivery(delivery("SDNEW", DeliveryStatus::Assigned, 1))
            .unwrap();
        store
            .insert_delivery(delivery("SDBOOKED", DeliveryStatus::Booked, 5))
            .unwrap();

        let assigned: Vec<String> = store
            .deliveries(Some(DeliveryStatus::Assigned))
            .into_iter()
            .map(|d| d.order_id)
            .collect();
        assert_eq!(assigned, vec!["SDNEW", "SDOLD"]);
        assert_eq!(store.deliveries(None).len(), 3);
    }

    #[tokio::test]
    async fn snapshot_survives_close_and_reopen() {
        let path = std::env::temp_dir().join(format!("swift-deliver-{}.json", Uuid::new_v4()));

        let store = Store::open(path.clone()).await.unwrap();
        store.insert_user(user("a@example.com")).unwrap();
        store
            .insert_drivers(vec![driver("d@example.com", "DL00009", true, true)])
            .unwrap();
        store
            .insert_delivery(delivery("SDSNAP", DeliveryStatus::Booked, 0))
            .unwrap();
        store.close().await.unwrap();

        let reopened = Store::open(path.clone()).await.unwrap();
        assert!(reopened.user_by_email("a@example.com").is_some());
        assert!(reopened.driver_by_email("d@example.com").is_some());
        assert!(reopened.delivery("SDSNAP").is_some());

        let err = reopened.insert_user(user("a@example.com")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));

        let _ = std::fs::remove_file(path);
    }
}
