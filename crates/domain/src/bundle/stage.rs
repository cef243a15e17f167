//! Derived workflow stage.

use serde::{Deserialize, Serialize};

/// Where a bundle is in its workflow, derived from which record fields are set.
///
/// State transitions:
/// ```text
/// AwaitingSeatBooking ──► AwaitingOutboundFlight ──► AwaitingReturnFlight ──► AwaitingTaxi ──► Succeeded
///          │                        │                         │                    │
///          └────────────────────────┴─────────────────────────┴────────────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BundleStage {
    /// Seats have been requested but not yet reserved.
    AwaitingSeatBooking,

    /// Seats are reserved, outbound flight requested.
    AwaitingOutboundFlight,

    /// Outbound flight booked, return flight requested.
    AwaitingReturnFlight,

    /// Both flights booked, taxi requested.
    AwaitingTaxi,

    /// Every booking succeeded (terminal state).
    Succeeded,

    /// A step failed and earlier bookings were compensated (terminal state).
    Failed,
}

impl BundleStage {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BundleStage::Succeeded | BundleStage::Failed)
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleStage::AwaitingSeatBooking => "AwaitingSeatBooking",
            BundleStage::AwaitingOutboundFlight => "AwaitingOutboundFlight",
            BundleStage::AwaitingReturnFlight => "AwaitingReturnFlight",
            BundleStage::AwaitingTaxi => "AwaitingTaxi",
            BundleStage::Succeeded => "Succeeded",
            BundleStage::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for BundleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
