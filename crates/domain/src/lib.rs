//! Domain layer for the bundle booking saga.
//!
//! This crate provides:
//! - The bundle record with its invariants and idempotent transitions
//! - The derived workflow stage and compensation planning
//! - Commands sent to and events received from the booking services

pub mod bundle;
pub mod error;
pub mod message;
pub mod messages;

pub use bundle::{BundleRecord, BundleStage, CompensationPlan, FlightLeg, NewBundle, parse_id};
pub use error::BundleError;
pub use message::Message;
pub use messages::{
    BookFlight, BookSeats, BookTaxi, BookingCommand, BundleEvent, BundleFinalized,
    BundleInitialized, CancelFlightTickets, FlightBooked, FlightBookingFailed, InboundEvent,
    RefundTicket, SeatBookingFailed, SeatBookingMade, SeatTicketConfirmed, TaxiBooked,
    TaxiBookingFailed,
};
