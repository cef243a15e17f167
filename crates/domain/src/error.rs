//! Domain error types.

use common::BundleId;
use thiserror::Error;
use uuid::Uuid;

use crate::bundle::FlightLeg;

/// Errors raised by bundle validation and transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    /// Customer email is required.
    #[error("Customer email is required")]
    CustomerEmailRequired,

    /// A bundle must book at least one seat.
    #[error("Invalid seat count: {seats} (must be greater than 0)")]
    InvalidSeatCount { seats: usize },

    /// Every seat needs exactly one passenger name.
    #[error("Seat count {seats} does not match passenger count {passengers}")]
    PassengerCountMismatch { seats: usize, passengers: usize },

    /// Show ID is required.
    #[error("Show ID is required")]
    ShowIdRequired,

    /// A flight ID is required for both legs.
    #[error("{leg} flight ID is required")]
    FlightIdRequired { leg: FlightLeg },

    /// Outbound and return legs must be different flights.
    #[error("Outbound and return flight must differ")]
    SameFlightForBothLegs,

    /// An identifier in an inbound message could not be parsed.
    #[error("Malformed {kind}: {value:?}")]
    MalformedId { kind: &'static str, value: String },

    /// A flight booking arrived without any tickets.
    #[error("Flight booking for {flight_id} carries no tickets")]
    NoFlightTickets { flight_id: Uuid },

    /// Seat ticket confirmations have not all arrived yet.
    #[error(
        "Seat ticket confirmations pending for bundle {bundle_id}: {confirmed} of {expected} received"
    )]
    ConfirmationsPending {
        bundle_id: BundleId,
        confirmed: usize,
        expected: usize,
    },
}

impl BundleError {
    /// Returns true when retrying the same message later may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, BundleError::ConfirmationsPending { .. })
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, BundleError>;
