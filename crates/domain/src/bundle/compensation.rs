//! Compensation planning for failed bundles.

use uuid::Uuid;

use crate::error::BundleError;
use crate::messages::{BookingCommand, CancelFlightTickets, RefundTicket};

use super::BundleRecord;

/// Commands that undo every booking a bundle has completed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationPlan {
    /// One refund per confirmed seat ticket.
    pub refunds: Vec<RefundTicket>,

    /// At most one cancellation per booked flight leg, outbound first.
    pub cancellations: Vec<CancelFlightTickets>,
}

impl CompensationPlan {
    /// Returns the number of commands in the plan.
    pub fn len(&self) -> usize {
        self.refunds.len() + self.cancellations.len()
    }

    /// Returns true if there is nothing to compensate.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns refunds followed by cancellations, in send order.
    pub fn into_commands(self) -> Vec<BookingCommand> {
        self.refunds
            .into_iter()
            .map(BookingCommand::from)
            .chain(self.cancellations.into_iter().map(BookingCommand::from))
            .collect()
    }
}

impl BundleRecord {
    /// Plans the compensating commands for this bundle.
    ///
    /// Fails with [`BundleError::ConfirmationsPending`] while fewer seat
    /// tickets are known than seats were booked; refunding then would miss
    /// the tickets still in flight.
    pub fn compensation_plan(&self) -> Result<CompensationPlan, BundleError> {
        if !self.seat_tickets_complete() {
            return Err(BundleError::ConfirmationsPending {
                bundle_id: self.bundle_id(),
                confirmed: self.seat_ticket_ids().len(),
                expected: self.number_of_seats(),
            });
        }

        let refunds = self
            .seat_ticket_ids()
            .iter()
            .map(|&ticket_id| RefundTicket { ticket_id })
            .collect();

        let cancellations = [
            self.outbound_flight_ticket_ids(),
            self.return_flight_ticket_ids(),
        ]
        .into_iter()
        .filter(|ids| !ids.is_empty())
        .map(|ids: &[Uuid]| CancelFlightTickets {
            ticket_ids: ids.to_vec(),
        })
        .collect();

        Ok(CompensationPlan {
            refunds,
            cancellations,
        })
    }
}
