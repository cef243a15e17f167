//! Bundle record aggregate.

use chrono::{DateTime, Utc};
use common::BundleId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BundleError;
use crate::messages::{BookFlight, BookSeats, BookTaxi};

use super::{BundleStage, FlightLeg, NewBundle};

/// Durable state of one composite booking.
///
/// Booking parameters are fixed at creation. Progress fields are written
/// only through the transition methods below, each of which is a no-op
/// when replayed with the same input, so a redelivered event leaves the
/// record equal to what it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
    bundle_id: BundleId,

    /// Seat booking ID, the key seat events are correlated by.
    booking_id: Uuid,

    customer_email: String,
    number_of_seats: usize,
    passenger_names: Vec<String>,
    show_id: Uuid,
    seat_booking_confirmed_at: Option<DateTime<Utc>>,

    /// Confirmed seat tickets in arrival order, without duplicates.
    #[serde(default)]
    seat_ticket_ids: Vec<Uuid>,

    outbound_flight_id: Uuid,
    return_flight_id: Uuid,
    #[serde(default)]
    outbound_flight_ticket_ids: Vec<Uuid>,
    #[serde(default)]
    return_flight_ticket_ids: Vec<Uuid>,
    return_flight_booked_at: Option<DateTime<Utc>>,

    taxi_booked_at: Option<DateTime<Utc>>,
    taxi_booking_id: Option<Uuid>,

    is_finalized: bool,

    /// Only meaningful once `is_finalized` is set.
    failed: bool,

    /// Set once BundleFinalized has been handed to the event bus.
    #[serde(default)]
    finalized_published: bool,
}

impl BundleRecord {
    /// Creates a validated record with the given identifiers.
    pub fn new(
        bundle_id: BundleId,
        booking_id: Uuid,
        request: NewBundle,
    ) -> Result<Self, BundleError> {
        if request.customer_email.trim().is_empty() {
            return Err(BundleError::CustomerEmailRequired);
        }
        if request.number_of_seats == 0 {
            return Err(BundleError::InvalidSeatCount {
                seats: request.number_of_seats,
            });
        }
        if request.number_of_seats != request.passenger_names.len() {
            return Err(BundleError::PassengerCountMismatch {
                seats: request.number_of_seats,
                passengers: request.passenger_names.len(),
            });
        }
        if request.show_id.is_nil() {
            return Err(BundleError::ShowIdRequired);
        }
        if request.outbound_flight_id.is_nil() {
            return Err(BundleError::FlightIdRequired {
                leg: FlightLeg::Outbound,
            });
        }
        if request.return_flight_id.is_nil() {
            return Err(BundleError::FlightIdRequired {
                leg: FlightLeg::Return,
            });
        }
        if request.outbound_flight_id == request.return_flight_id {
            return Err(BundleError::SameFlightForBothLegs);
        }

        Ok(Self {
            bundle_id,
            booking_id,
            customer_email: request.customer_email,
            number_of_seats: request.number_of_seats,
            passenger_names: request.passenger_names,
            show_id: request.show_id,
            seat_booking_confirmed_at: None,
            seat_ticket_ids: Vec::new(),
            outbound_flight_id: request.outbound_flight_id,
            return_flight_id: request.return_flight_id,
            outbound_flight_ticket_ids: Vec::new(),
            return_flight_ticket_ids: Vec::new(),
            return_flight_booked_at: None,
            taxi_booked_at: None,
            taxi_booking_id: None,
            is_finalized: false,
            failed: false,
            finalized_published: false,
        })
    }

    /// Creates a validated record with freshly generated bundle and booking IDs.
    pub fn create(request: NewBundle) -> Result<Self, BundleError> {
        Self::create_with_id(BundleId::new(), request)
    }

    /// Creates a validated record for a caller-chosen bundle ID and a fresh booking ID.
    pub fn create_with_id(bundle_id: BundleId, request: NewBundle) -> Result<Self, BundleError> {
        Self::new(bundle_id, Uuid::new_v4(), request)
    }
}

// Query methods
impl BundleRecord {
    pub fn bundle_id(&self) -> BundleId {
        self.bundle_id
    }

    pub fn booking_id(&self) -> Uuid {
        self.booking_id
    }

    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    pub fn number_of_seats(&self) -> usize {
        self.number_of_seats
    }

    pub fn passenger_names(&self) -> &[String] {
        &self.passenger_names
    }

    pub fn show_id(&self) -> Uuid {
        self.show_id
    }

    pub fn seat_booking_confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.seat_booking_confirmed_at
    }

    pub fn seat_ticket_ids(&self) -> &[Uuid] {
        &self.seat_ticket_ids
    }

    pub fn outbound_flight_id(&self) -> Uuid {
        self.outbound_flight_id
    }

    pub fn return_flight_id(&self) -> Uuid {
        self.return_flight_id
    }

    pub fn outbound_flight_ticket_ids(&self) -> &[Uuid] {
        &self.outbound_flight_ticket_ids
    }

    pub fn return_flight_ticket_ids(&self) -> &[Uuid] {
        &self.return_flight_ticket_ids
    }

    pub fn return_flight_booked_at(&self) -> Option<DateTime<Utc>> {
        self.return_flight_booked_at
    }

    pub fn taxi_booked_at(&self) -> Option<DateTime<Utc>> {
        self.taxi_booked_at
    }

    pub fn taxi_booking_id(&self) -> Option<Uuid> {
        self.taxi_booking_id
    }

    pub fn is_finalized(&self) -> bool {
        self.is_finalized
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn finalized_published(&self) -> bool {
        self.finalized_published
    }

    /// Returns true when the bundle is finalized but BundleFinalized has
    /// not been published yet.
    pub fn finalization_unpublished(&self) -> bool {
        self.is_finalized && !self.finalized_published
    }

    /// Returns true if the record was created from the same booking parameters.
    pub fn matches_request(&self, request: &NewBundle) -> bool {
        self.customer_email == request.customer_email
            && self.number_of_seats == request.number_of_seats
            && self.passenger_names == request.passenger_names
            && self.show_id == request.show_id
            && self.outbound_flight_id == request.outbound_flight_id
            && self.return_flight_id == request.return_flight_id
    }

    /// Returns true once every seat has a confirmed ticket.
    pub fn seat_tickets_complete(&self) -> bool {
        self.seat_ticket_ids.len() >= self.number_of_seats
    }

    /// Returns which leg a flight ID belongs to, if any.
    pub fn leg_of(&self, flight_id: Uuid) -> Option<FlightLeg> {
        if flight_id == self.outbound_flight_id {
            Some(FlightLeg::Outbound)
        } else if flight_id == self.return_flight_id {
            Some(FlightLeg::Return)
        } else {
            None
        }
    }

    /// Returns true if tickets for the leg have been recorded.
    pub fn is_leg_booked(&self, leg: FlightLeg) -> bool {
        match leg {
            FlightLeg::Outbound => !self.outbound_flight_ticket_ids.is_empty(),
            FlightLeg::Return => !self.return_flight_ticket_ids.is_empty(),
        }
    }

    /// Returns the workflow stage implied by the populated fields.
    pub fn stage(&self) -> BundleStage {
        if self.is_finalized {
            if self.failed {
                BundleStage::Failed
            } else {
                BundleStage::Succeeded
            }
        } else if self.is_leg_booked(FlightLeg::Return) {
            BundleStage::AwaitingTaxi
        } else if self.is_leg_booked(FlightLeg::Outbound) {
            BundleStage::AwaitingReturnFlight
        } else if self.seat_booking_confirmed_at.is_some() {
            BundleStage::AwaitingOutboundFlight
        } else {
            BundleStage::AwaitingSeatBooking
        }
    }
}

// Transition methods (idempotent)
impl BundleRecord {
    /// Records when the seat booking succeeded. The first timestamp wins.
    pub fn mark_seat_booking_made(&mut self, at: DateTime<Utc>) {
        if self.is_finalized || self.seat_booking_confirmed_at.is_some() {
            return;
        }
        self.seat_booking_confirmed_at = Some(at);
    }

    /// Adds a confirmed seat ticket. Known tickets are ignored.
    pub fn confirm_seat_ticket(&mut self, ticket_id: Uuid) {
        if !self.seat_ticket_ids.contains(&ticket_id) {
            self.seat_ticket_ids.push(ticket_id);
        }
    }

    /// Stores the tickets of a booked flight and returns its leg.
    ///
    /// Each leg is written at most once. Returns `None` for a flight that
    /// is not part of this bundle. A booking without tickets is rejected,
    /// since an empty ticket list cannot mark the leg as booked.
    pub fn record_flight_booked(
        &mut self,
        flight_id: Uuid,
        ticket_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<Option<FlightLeg>, BundleError> {
        let Some(leg) = self.leg_of(flight_id) else {
            return Ok(None);
        };
        if self.is_finalized || self.is_leg_booked(leg) {
            return Ok(Some(leg));
        }
        if ticket_ids.is_empty() {
            return Err(BundleError::NoFlightTickets { flight_id });
        }

        match leg {
            FlightLeg::Outbound => {
                self.outbound_flight_ticket_ids = ticket_ids.to_vec();
            }
            FlightLeg::Return => {
                self.return_flight_ticket_ids = ticket_ids.to_vec();
                self.return_flight_booked_at = Some(at);
            }
        }
        Ok(Some(leg))
    }

    /// Stores the taxi booking and finalizes the bundle as successful.
    pub fn record_taxi_booked(&mut self, taxi_booking_id: Uuid, at: DateTime<Utc>) {
        if self.is_finalized {
            return;
        }
        self.taxi_booked_at = Some(at);
        self.taxi_booking_id = Some(taxi_booking_id);
        self.is_finalized = true;
    }

    /// Finalizes the bundle as failed.
    pub fn finalize_failed(&mut self) {
        if self.is_finalized {
            return;
        }
        self.is_finalized = true;
        self.failed = true;
    }

    /// Notes that BundleFinalized went out. Ignored until the bundle is finalized.
    pub fn mark_finalized_published(&mut self) {
        if self.is_finalized {
            self.finalized_published = true;
        }
    }
}

// Command builders
impl BundleRecord {
    /// Builds the command that reserves the show seats.
    pub fn book_seats(&self) -> BookSeats {
        BookSeats {
            booking_id: self.booking_id,
            customer_email: self.customer_email.clone(),
            seat_count: self.number_of_seats,
            show_id: self.show_id,
        }
    }

    /// Builds the command that books one leg, with a fresh idempotency key.
    pub fn book_flight(&self, leg: FlightLeg) -> BookFlight {
        let flight_id = match leg {
            FlightLeg::Outbound => self.outbound_flight_id,
            FlightLeg::Return => self.return_flight_id,
        };
        BookFlight {
            customer_email: self.customer_email.clone(),
            flight_id,
            passenger_names: self.passenger_names.clone(),
            reference_id: self.bundle_id.to_string(),
            idempotency_key: Uuid::new_v4(),
        }
    }

    /// Builds the command that books the taxi, with a fresh idempotency key.
    pub fn book_taxi(&self) -> BookTaxi {
        BookTaxi {
            customer_email: self.customer_email.clone(),
            passenger_name: self.passenger_names.first().cloned().unwrap_or_default(),
            passenger_count: self.number_of_seats,
            reference_id: self.bundle_id.to_string(),
            idempotency_key: Uuid::new_v4(),
        }
    }
}
