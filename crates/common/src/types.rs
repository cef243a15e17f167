use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a bundle (one composite booking).
///
/// Wraps a UUID so a bundle id cannot be confused with the booking,
/// flight, or ticket UUIDs that travel alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(Uuid);

impl BundleId {
    /// Creates a new random bundle ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a bundle ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true for the all-zero UUID.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for BundleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BundleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BundleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for BundleId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<BundleId> for Uuid {
    fn from(id: BundleId) -> Self {
        id.0
    }
}
