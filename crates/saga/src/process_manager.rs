//! Process manager that drives a bundle through its bookings.

use async_trait::async_trait;
use bundle_store::{BundleStore, StoreError, UpdateOutcome};
use common::BundleId;
use domain::{
    BookingCommand, BundleEvent, BundleInitialized, BundleRecord, BundleStage, FlightBooked,
    FlightBookingFailed, FlightLeg, InboundEvent, Message, NewBundle, SeatBookingFailed,
    SeatBookingMade, SeatTicketConfirmed, TaxiBooked, TaxiBookingFailed, parse_id,
};

use crate::delivery::InboundHandler;
use crate::error::Result;
use crate::gateway::{CommandSender, EventPublisher};

/// Orchestrates seat, flight and taxi bookings for bundles.
///
/// Each inbound event is handled by exactly one method. Handlers keep no
/// state of their own: every decision is taken from the record returned by
/// the store's atomic update, so the same event may be delivered twice or
/// concurrently without duplicating terminal side effects.
pub struct BundleProcessManager<S, C, P>
where
    S: BundleStore,
    C: CommandSender,
    P: EventPublisher,
{
    store: S,
    commands: C,
    events: P,
}

impl<S, C, P> BundleProcessManager<S, C, P>
where
    S: BundleStore,
    C: CommandSender,
    P: EventPublisher,
{
    /// Creates a new process manager.
    pub fn new(store: S, commands: C, events: P) -> Self {
        Self {
            store,
            commands,
            events,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates and stores a new bundle under a fresh ID, then announces it.
    pub async fn initialize_bundle(&self, request: NewBundle) -> Result<BundleId> {
        self.initialize_bundle_with_id(BundleId::new(), request)
            .await
    }

    /// Validates and stores a new bundle under the caller's ID, then announces it.
    ///
    /// Calling again with the same ID and request is safe: the stored record
    /// is kept and BundleInitialized is published again while the seats are
    /// still unbooked, so a failed publish can be retried. The same ID with
    /// different booking parameters fails with `DuplicateBundle`.
    #[tracing::instrument(skip(self, request), fields(seats = request.number_of_seats))]
    pub async fn initialize_bundle_with_id(
        &self,
        bundle_id: BundleId,
        request: NewBundle,
    ) -> Result<BundleId> {
        let record = BundleRecord::create_with_id(bundle_id, request.clone())?;

        let booking_id = match self.store.add(record.clone()).await {
            Ok(()) => record.booking_id(),
            Err(StoreError::DuplicateBundle(_)) => {
                let existing = self
                    .store
                    .get(bundle_id)
                    .await?
                    .filter(|existing| existing.matches_request(&request))
                    .ok_or(StoreError::DuplicateBundle(bundle_id))?;

                if existing.stage() != BundleStage::AwaitingSeatBooking {
                    tracing::debug!(%bundle_id, stage = %existing.stage(), "bundle already started");
                    return Ok(bundle_id);
                }
                tracing::info!(%bundle_id, "bundle already stored, announcing again");
                existing.booking_id()
            }
            Err(err) => return Err(err.into()),
        };

        self.publish(BundleEvent::initialized(bundle_id)).await?;

        tracing::info!(%bundle_id, %booking_id, "bundle initialized");
        Ok(bundle_id)
    }

    /// Starts the workflow by booking the seats.
    #[tracing::instrument(skip(self, event), fields(bundle_id = %event.bundle_id))]
    pub async fn on_bundle_initialized(&self, event: &BundleInitialized) -> Result<()> {
        let Some(record) = self.store.get(event.bundle_id).await? else {
            not_my_bundle("BundleInitialized", &event.bundle_id.to_string());
            return Ok(());
        };

        if record.is_finalized() || record.seat_booking_confirmed_at().is_some() {
            tracing::debug!(stage = %record.stage(), "seat booking already past, skipping");
            return Ok(());
        }

        self.send(record.book_seats().into()).await
    }

    /// Records the seat booking and books the outbound flight.
    #[tracing::instrument(skip(self, event), fields(booking_id = %event.booking_id))]
    pub async fn on_seat_booking_made(&self, event: &SeatBookingMade) -> Result<()> {
        let booking_id = parse_id("booking_id", &event.booking_id)?;
        let at = event.header.published_at;

        let Some(UpdateOutcome { record, .. }) = self
            .store
            .update_by_booking_id(booking_id, move |mut record| {
                record.mark_seat_booking_made(at);
                Ok(record)
            })
            .await?
        else {
            not_my_bundle("SeatBookingMade", &event.booking_id);
            return Ok(());
        };

        if record.is_finalized() || record.is_leg_booked(FlightLeg::Outbound) {
            tracing::debug!(stage = %record.stage(), "outbound flight already past, skipping");
            return Ok(());
        }

        tracing::info!(bundle_id = %record.bundle_id(), "seat booking made");
        self.send(record.book_flight(FlightLeg::Outbound).into())
            .await
    }

    /// Fails the bundle. Nothing has been booked yet, so nothing is compensated.
    #[tracing::instrument(skip(self, event), fields(booking_id = %event.booking_id))]
    pub async fn on_seat_booking_failed(&self, event: &SeatBookingFailed) -> Result<()> {
        let booking_id = parse_id("booking_id", &event.booking_id)?;

        let Some(outcome) = self
            .store
            .update_by_booking_id(booking_id, |mut record| {
                record.finalize_failed();
                Ok(record)
            })
            .await?
        else {
            not_my_bundle("SeatBookingFailed", &event.booking_id);
            return Ok(());
        };

        tracing::warn!(
            bundle_id = %outcome.record.bundle_id(),
            reason = %event.failure_reason,
            "seat booking failed"
        );
        self.publish_finalized(outcome.record).await
    }

    /// Adds one confirmed seat ticket to the bundle.
    #[tracing::instrument(skip(self, event), fields(booking_id = %event.booking_id))]
    pub async fn on_seat_ticket_confirmed(&self, event: &SeatTicketConfirmed) -> Result<()> {
        let booking_id = parse_id("booking_id", &event.booking_id)?;
        let ticket_id = parse_id("ticket_id", &event.ticket_id)?;

        let Some(outcome) = self
            .store
            .update_by_booking_id(booking_id, move |mut record| {
                record.confirm_seat_ticket(ticket_id);
                Ok(record)
            })
            .await?
        else {
            not_my_bundle("SeatTicketConfirmed", &event.booking_id);
            return Ok(());
        };

        if outcome.changed {
            tracing::info!(
                bundle_id = %outcome.record.bundle_id(),
                %ticket_id,
                confirmed = outcome.record.seat_ticket_ids().len(),
                expected = outcome.record.number_of_seats(),
                "seat ticket confirmed"
            );
        }
        Ok(())
    }

    /// Stores the flight tickets and books the next leg or the taxi.
    #[tracing::instrument(
        skip(self, event),
        fields(reference_id = %event.reference_id, flight_id = %event.flight_id)
    )]
    pub async fn on_flight_booked(&self, event: &FlightBooked) -> Result<()> {
        let bundle_id = BundleId::from(parse_id("reference_id", &event.reference_id)?);
        let flight_id = event.flight_id;
        let ticket_ids = event.ticket_ids.clone();
        let at = event.header.published_at;

        let Some(UpdateOutcome { record, .. }) = self
            .store
            .update_by_id(bundle_id, move |mut record| {
                record.record_flight_booked(flight_id, &ticket_ids, at)?;
                Ok(record)
            })
            .await?
        else {
            not_my_bundle("FlightBooked", &event.reference_id);
            return Ok(());
        };

        let Some(leg) = record.leg_of(flight_id) else {
            tracing::warn!(%bundle_id, "flight is not part of this bundle, ignoring");
            return Ok(());
        };

        if record.is_finalized() {
            tracing::debug!(stage = %record.stage(), "bundle already finalized, skipping");
            return Ok(());
        }

        tracing::info!(%bundle_id, leg = %leg, "flight booked");
        match leg {
            FlightLeg::Outbound if !record.is_leg_booked(FlightLeg::Return) => {
                self.send(record.book_flight(FlightLeg::Return).into())
                    .await
            }
            FlightLeg::Return => self.send(record.book_taxi().into()).await,
            FlightLeg::Outbound => Ok(()),
        }
    }

    /// Compensates every completed booking and fails the bundle.
    ///
    /// Returns a retriable error while seat ticket confirmations are still
    /// missing, so the event is redelivered once they have arrived.
    #[tracing::instrument(
        skip(self, event),
        fields(reference_id = %event.reference_id, flight_id = %event.flight_id)
    )]
    pub async fn on_flight_booking_failed(&self, event: &FlightBookingFailed) -> Result<()> {
        let bundle_id = BundleId::from(parse_id("reference_id", &event.reference_id)?);

        let Some(record) = self.store.get(bundle_id).await? else {
            not_my_bundle("FlightBookingFailed", &event.reference_id);
            return Ok(());
        };

        let failed_step = match record.leg_of(event.flight_id) {
            Some(FlightLeg::Outbound) => "outbound_flight",
            Some(FlightLeg::Return) => "return_flight",
            None => {
                tracing::warn!(%bundle_id, "failed flight is not part of this bundle, compensating anyway");
                "flight"
            }
        };
        self.compensate(record, failed_step, &event.failure_reason)
            .await
    }

    /// Stores the taxi booking and completes the bundle.
    #[tracing::instrument(skip(self, event), fields(reference_id = %event.reference_id))]
    pub async fn on_taxi_booked(&self, event: &TaxiBooked) -> Result<()> {
        let bundle_id = BundleId::from(parse_id("reference_id", &event.reference_id)?);
        let taxi_booking_id = event.taxi_booking_id;
        let at = event.header.published_at;

        let Some(outcome) = self
            .store
            .update_by_id(bundle_id, move |mut record| {
                record.record_taxi_booked(taxi_booking_id, at);
                Ok(record)
            })
            .await?
        else {
            not_my_bundle("TaxiBooked", &event.reference_id);
            return Ok(());
        };

        tracing::info!(%bundle_id, %taxi_booking_id, "taxi booked");
        self.publish_finalized(outcome.record).await
    }

    /// Compensates every completed booking and fails the bundle.
    #[tracing::instrument(skip(self, event), fields(reference_id = %event.reference_id))]
    pub async fn on_taxi_booking_failed(&self, event: &TaxiBookingFailed) -> Result<()> {
        let bundle_id = BundleId::from(parse_id("reference_id", &event.reference_id)?);

        let Some(record) = self.store.get(bundle_id).await? else {
            not_my_bundle("TaxiBookingFailed", &event.reference_id);
            return Ok(());
        };

        self.compensate(record, "taxi", &event.failure_reason).await
    }

    /// Sends the compensation plan, then finalizes the bundle as failed.
    ///
    /// Compensations go out before the record is finalized, so a failed
    /// send leaves the bundle open and the redelivered event starts over.
    /// An already finalized bundle only gets its pending BundleFinalized.
    async fn compensate(
        &self,
        record: BundleRecord,
        failed_step: &'static str,
        reason: &str,
    ) -> Result<()> {
        let bundle_id = record.bundle_id();
        if record.is_finalized() {
            return self.publish_finalized(record).await;
        }

        let plan = record.compensation_plan().inspect_err(|err| {
            tracing::warn!(%bundle_id, failed_step, error = %err, "compensation deferred");
        })?;

        tracing::warn!(
            %bundle_id,
            failed_step,
            reason,
            refunds = plan.refunds.len(),
            cancellations = plan.cancellations.len(),
            "compensating bundle"
        );
        for command in plan.into_commands() {
            metrics::counter!("bundle_compensations_total", "type" => command.message_type())
                .increment(1);
            self.send(command).await?;
        }

        let Some(outcome) = self
            .store
            .update_by_booking_id(record.booking_id(), |mut record| {
                record.finalize_failed();
                Ok(record)
            })
            .await?
        else {
            not_my_bundle(failed_step, &bundle_id.to_string());
            return Ok(());
        };

        self.publish_finalized(outcome.record).await
    }

    /// Publishes BundleFinalized unless it already went out.
    ///
    /// The record is marked only after a successful publish, so a failed
    /// publish is retried when the terminal event is redelivered.
    async fn publish_finalized(&self, record: BundleRecord) -> Result<()> {
        let bundle_id = record.bundle_id();

        if !record.finalization_unpublished() {
            tracing::debug!(%bundle_id, stage = %record.stage(), "nothing to publish, skipping");
            return Ok(());
        }

        let success = !record.failed();
        self.publish(BundleEvent::finalized(bundle_id, success))
            .await?;

        let outcome_label = if success { "success" } else { "failed" };
        metrics::counter!("bundle_finalized_total", "outcome" => outcome_label).increment(1);
        tracing::info!(%bundle_id, success, "bundle finalized");

        self.store
            .update_by_id(bundle_id, |mut record| {
                record.mark_finalized_published();
                Ok(record)
            })
            .await?;
        Ok(())
    }

    async fn send(&self, command: BookingCommand) -> Result<()> {
        let command_type = command.message_type();
        self.commands.send(command).await?;
        metrics::counter!("bundle_commands_sent_total", "type" => command_type).increment(1);
        tracing::debug!(command_type, "command sent");
        Ok(())
    }

    async fn publish(&self, event: BundleEvent) -> Result<()> {
        let event_type = event.message_type();
        self.events.publish(event).await?;
        tracing::debug!(event_type, "event published");
        Ok(())
    }
}

fn not_my_bundle(event_type: &'static str, key: &str) {
    metrics::counter!("bundle_not_found_total", "type" => event_type).increment(1);
    tracing::debug!(event_type, key, "no bundle for event, ignoring");
}

#[async_trait]
impl<S, C, P> InboundHandler for BundleProcessManager<S, C, P>
where
    S: BundleStore,
    C: CommandSender,
    P: EventPublisher,
{
    async fn handle(&self, event: &InboundEvent) -> Result<()> {
        metrics::counter!("bundle_events_handled_total", "type" => event.message_type())
            .increment(1);

        match event {
            InboundEvent::BundleInitialized(e) => self.on_bundle_initialized(e).await,
            InboundEvent::SeatBookingMade(e) => self.on_seat_booking_made(e).await,
            InboundEvent::SeatBookingFailed(e) => self.on_seat_booking_failed(e).await,
            InboundEvent::SeatTicketConfirmed(e) => self.on_seat_ticket_confirmed(e).await,
            InboundEvent::FlightBooked(e) => self.on_flight_booked(e).await,
            InboundEvent::FlightBookingFailed(e) => self.on_flight_booking_failed(e).await,
            InboundEvent::TaxiBooked(e) => self.on_taxi_booked(e).await,
            InboundEvent::TaxiBookingFailed(e) => self.on_taxi_booking_failed(e).await,
        }
    }
}
