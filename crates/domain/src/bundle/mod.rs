//! Bundle record and related types.

mod commands;
mod compensation;
mod record;
mod stage;

pub use commands::NewBundle;
pub use compensation::CompensationPlan;
pub use record::BundleRecord;
pub use stage::BundleStage;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BundleError;

/// One of the two flights in a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightLeg {
    Outbound,
    Return,
}

impl FlightLeg {
    /// Returns the leg name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightLeg::Outbound => "Outbound",
            FlightLeg::Return => "Return",
        }
    }
}

impl std::fmt::Display for FlightLeg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses an identifier received as a string.
///
/// `kind` names the field in the error, e.g. `"booking id"`.
pub fn parse_id(kind: &'static str, value: &str) -> Result<Uuid, BundleError> {
    Uuid::parse_str(value).map_err(|_| BundleError::MalformedId {
        kind,
        value: value.to_string(),
    })
}
