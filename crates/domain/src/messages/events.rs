//! Events consumed and published by the process manager.

use common::{BundleId, MessageHeader};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// Events the process manager reacts to.
///
/// Seat events reference the booking ID as a string; flight and taxi
/// events reference the bundle ID through `reference_id`. Both are parsed
/// by the handler, so a malformed value surfaces as a handler error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InboundEvent {
    /// A bundle record was created and is ready to start.
    BundleInitialized(BundleInitialized),

    /// The seat service reserved the requested seats.
    SeatBookingMade(SeatBookingMade),

    /// The seat service could not reserve the seats.
    SeatBookingFailed(SeatBookingFailed),

    /// One ticket of a seat booking was confirmed.
    SeatTicketConfirmed(SeatTicketConfirmed),

    /// A flight was booked.
    FlightBooked(FlightBooked),

    /// A flight could not be booked.
    FlightBookingFailed(FlightBookingFailed),

    /// The taxi was booked.
    TaxiBooked(TaxiBooked),

    /// The taxi could not be booked.
    TaxiBookingFailed(TaxiBookingFailed),
}

impl Message for InboundEvent {
    fn message_type(&self) -> &'static str {
        match self {
            InboundEvent::BundleInitialized(_) => "BundleInitialized",
            InboundEvent::SeatBookingMade(_) => "SeatBookingMade",
            InboundEvent::SeatBookingFailed(_) => "SeatBookingFailed",
            InboundEvent::SeatTicketConfirmed(_) => "SeatTicketConfirmed",
            InboundEvent::FlightBooked(_) => "FlightBooked",
            InboundEvent::FlightBookingFailed(_) => "FlightBookingFailed",
            InboundEvent::TaxiBooked(_) => "TaxiBooked",
            InboundEvent::TaxiBookingFailed(_) => "TaxiBookingFailed",
        }
    }
}

impl InboundEvent {
    /// Returns the header of the wrapped event.
    pub fn header(&self) -> &MessageHeader {
        match self {
            InboundEvent::BundleInitialized(e) => &e.header,
            InboundEvent::SeatBookingMade(e) => &e.header,
            InboundEvent::SeatBookingFailed(e) => &e.header,
            InboundEvent::SeatTicketConfirmed(e) => &e.header,
            InboundEvent::FlightBooked(e) => &e.header,
            InboundEvent::FlightBookingFailed(e) => &e.header,
            InboundEvent::TaxiBooked(e) => &e.header,
            InboundEvent::TaxiBookingFailed(e) => &e.header,
        }
    }

    /// Returns the raw key this event is correlated by (bundle or booking ID).
    pub fn correlation_key(&self) -> String {
        match self {
            InboundEvent::BundleInitialized(e) => e.bundle_id.to_string(),
            InboundEvent::SeatBookingMade(e) => e.booking_id.clone(),
            InboundEvent::SeatBookingFailed(e) => e.booking_id.clone(),
            InboundEvent::SeatTicketConfirmed(e) => e.booking_id.clone(),
            InboundEvent::FlightBooked(e) => e.reference_id.clone(),
            InboundEvent::FlightBookingFailed(e) => e.reference_id.clone(),
            InboundEvent::TaxiBooked(e) => e.reference_id.clone(),
            InboundEvent::TaxiBookingFailed(e) => e.reference_id.clone(),
        }
    }
}

/// Data for BundleInitialized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleInitialized {
    pub header: MessageHeader,
    pub bundle_id: BundleId,
}

/// Data for SeatBookingMade event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatBookingMade {
    pub header: MessageHeader,
    pub booking_id: String,
    pub seat_count: usize,
    pub customer_email: String,
    pub show_id: Uuid,
}

/// Data for SeatBookingFailed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatBookingFailed {
    pub header: MessageHeader,
    pub booking_id: String,
    #[serde(default)]
    pub failure_reason: String,
}

/// Data for SeatTicketConfirmed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatTicketConfirmed {
    pub header: MessageHeader,
    pub booking_id: String,
    pub ticket_id: String,
}

/// Data for FlightBooked event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightBooked {
    pub header: MessageHeader,
    pub flight_id: Uuid,
    pub ticket_ids: Vec<Uuid>,
    pub reference_id: String,
}

/// Data for FlightBookingFailed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightBookingFailed {
    pub header: MessageHeader,
    pub flight_id: Uuid,
    pub reference_id: String,
    #[serde(default)]
    pub failure_reason: String,
}

/// Data for TaxiBooked event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxiBooked {
    pub header: MessageHeader,
    pub taxi_booking_id: Uuid,
    pub reference_id: String,
}

/// Data for TaxiBookingFailed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxiBookingFailed {
    pub header: MessageHeader,
    pub reference_id: String,
    #[serde(default)]
    pub failure_reason: String,
}

/// Events the process manager publishes about a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BundleEvent {
    /// A new bundle was stored and its workflow can start.
    Initialized(BundleInitialized),

    /// The bundle reached its terminal state.
    Finalized(BundleFinalized),
}

impl Message for BundleEvent {
    fn message_type(&self) -> &'static str {
        match self {
            BundleEvent::Initialized(_) => "BundleInitialized",
            BundleEvent::Finalized(_) => "BundleFinalized",
        }
    }
}

impl BundleEvent {
    /// Creates a BundleInitialized event with a fresh header.
    pub fn initialized(bundle_id: BundleId) -> Self {
        BundleEvent::Initialized(BundleInitialized {
            header: MessageHeader::new(),
            bundle_id,
        })
    }

    /// Creates a BundleFinalized event with a fresh header.
    pub fn finalized(bundle_id: BundleId, success: bool) -> Self {
        BundleEvent::Finalized(BundleFinalized {
            header: MessageHeader::new(),
            bundle_id,
            success,
        })
    }
}

/// Data for BundleFinalized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleFinalized {
    pub header: MessageHeader,
    pub bundle_id: BundleId,

    /// False when the bundle was compensated.
    pub success: bool,
}
