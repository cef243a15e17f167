//! Messages exchanged with the booking services.

mod commands;
mod events;

pub use commands::{BookFlight, BookSeats, BookTaxi, BookingCommand, CancelFlightTickets, RefundTicket};
pub use events::{
    BundleEvent, BundleFinalized, BundleInitialized, FlightBooked, FlightBookingFailed,
    InboundEvent, SeatBookingFailed, SeatBookingMade, SeatTicketConfirmed, TaxiBooked,
    TaxiBookingFailed,
};
