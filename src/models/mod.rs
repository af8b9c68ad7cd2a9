pub mod delivery;
pub mod driver;
pub mod user;

use thiserror::Error;

/// Returned when a wire label does not name any variant of a model enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value: {0}")]
pub struct UnknownVariant(pub String);
