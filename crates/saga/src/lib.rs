//! Process manager for bundle bookings.
//!
//! A bundle books show seats, an outbound flight, a return flight and a
//! taxi, in that order. Each step is started by a command and finished by
//! a result event from the downstream service:
//! 1. Book seats (`BundleInitialized` → `SeatBookingMade`)
//! 2. Book the outbound flight (`SeatBookingMade` → `FlightBooked`)
//! 3. Book the return flight (`FlightBooked` → `FlightBooked`)
//! 4. Book the taxi (`FlightBooked` → `TaxiBooked`)
//!
//! If a flight or the taxi fails, every seat ticket is refunded and every
//! booked flight is cancelled before the bundle is finalized as failed.

pub mod delivery;
pub mod error;
pub mod gateway;
pub mod process_manager;

pub use delivery::{DeadLetter, Delivery, DeliveryOutcome, InboundHandler, RetryPolicy};
pub use error::{Result, SagaError};
pub use gateway::{CommandSender, EventPublisher, InMemoryCommandSender, InMemoryEventPublisher};
pub use process_manager::BundleProcessManager;
