//! Commands the process manager sends to downstream services.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// Commands that book inventory or undo a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BookingCommand {
    /// Reserve seats for a show.
    BookSeats(BookSeats),

    /// Book one flight for all passengers.
    BookFlight(BookFlight),

    /// Book a taxi for the group.
    BookTaxi(BookTaxi),

    /// Cancel previously booked flight tickets.
    CancelFlightTickets(CancelFlightTickets),

    /// Refund one show ticket.
    RefundTicket(RefundTicket),
}

impl Message for BookingCommand {
    fn message_type(&self) -> &'static str {
        match self {
            BookingCommand::BookSeats(_) => "BookSeats",
            BookingCommand::BookFlight(_) => "BookFlight",
            BookingCommand::BookTaxi(_) => "BookTaxi",
            BookingCommand::CancelFlightTickets(_) => "CancelFlightTickets",
            BookingCommand::RefundTicket(_) => "RefundTicket",
        }
    }
}

impl BookingCommand {
    /// Returns true for refunds and cancellations.
    pub fn is_compensation(&self) -> bool {
        matches!(
            self,
            BookingCommand::CancelFlightTickets(_) | BookingCommand::RefundTicket(_)
        )
    }
}

/// Data for BookSeats command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSeats {
    /// Booking ID the seat service correlates its events with.
    pub booking_id: Uuid,

    /// Customer who receives the tickets.
    pub customer_email: String,

    /// Number of seats to reserve.
    pub seat_count: usize,

    /// The show to book.
    pub show_id: Uuid,
}

/// Data for BookFlight command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFlight {
    pub customer_email: String,
    pub flight_id: Uuid,
    pub passenger_names: Vec<String>,

    /// Bundle ID, echoed back in the flight result events.
    pub reference_id: String,

    pub idempotency_key: Uuid,
}

/// Data for BookTaxi command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookTaxi {
    pub customer_email: String,

    /// Name the booking is made under.
    pub passenger_name: String,

    pub passenger_count: usize,

    /// Bundle ID, echoed back in the taxi result events.
    pub reference_id: String,

    pub idempotency_key: Uuid,
}

/// Data for CancelFlightTickets command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelFlightTickets {
    pub ticket_ids: Vec<Uuid>,
}

/// Data for RefundTicket command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundTicket {
    pub ticket_id: Uuid,
}

impl From<BookSeats> for BookingCommand {
    fn from(data: BookSeats) -> Self {
        BookingCommand::BookSeats(data)
    }
}

impl From<BookFlight> for BookingCommand {
    fn from(data: BookFlight) -> Self {
        BookingCommand::BookFlight(data)
    }
}

impl From<BookTaxi> for BookingCommand {
    fn from(data: BookTaxi) -> Self {
        BookingCommand::BookTaxi(data)
    }
}

impl From<CancelFlightTickets> for BookingCommand {
    fn from(data: CancelFlightTickets) -> Self {
        BookingCommand::CancelFlightTickets(data)
    }
}

impl From<RefundTicket> for BookingCommand {
    fn from(data: RefundTicket) -> Self {
        BookingCommand::RefundTicket(data)
    }
}
