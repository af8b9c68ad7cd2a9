use serde::{Deserialize, Serialize};

use crate::models::delivery::Delivery;
use crate::models::driver::Driver;
use crate::models::user::User;

/// On-disk form of the whole store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub drivers: Vec<Driver>,
    #[serde(default)]
    pub deliveries: Vec<Delivery>,
}
