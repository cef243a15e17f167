//! End-to-end tests for the worker intake loop.

use std::time::Duration;

use bundle_store::{BundleStore, InMemoryBundleStore};
use common::{BundleId, MessageHeader};
use domain::{
    BookingCommand, BundleEvent, BundleInitialized, BundleRecord, FlightBooked, InboundEvent,
    NewBundle, SeatBookingMade, SeatTicketConfirmed, TaxiBooked,
};
use saga::{BundleProcessManager, InMemoryCommandSender, InMemoryEventPublisher, RetryPolicy};
use uuid::Uuid;
use worker::{InitializeBundle, Intake, RunSummary, parse_line};

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 1,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        multiplier: 2.0,
    }
}

async fn seeded_store() -> (InMemoryBundleStore, BundleRecord) {
    let store = InMemoryBundleStore::new();
    let record = BundleRecord::create(NewBundle::for_passengers(
        "ann@example.com",
        vec!["Ann".to_string(), "Bob".to_string()],
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
    ))
    .unwrap();
    store.add(record.clone()).await.unwrap();
    (store, record)
}

fn to_line(event: &InboundEvent) -> String {
    serde_json::to_string(event).unwrap()
}

#[test]
fn test_parse_line_skips_blank_lines() {
    assert!(parse_line("   ").unwrap().is_none());
    assert!(parse_line("{\"type\":\"Nope\"}").is_err());
}

#[tokio::test]
async fn test_run_delivers_events_and_skips_garbage() {
    let (store, record) = seeded_store().await;
    let commands = InMemoryCommandSender::new();
    let manager = BundleProcessManager::new(
        store.clone(),
        commands.clone(),
        InMemoryEventPublisher::new(),
    );

    let mut input = String::new();
    input.push_str(&to_line(&InboundEvent::BundleInitialized(BundleInitialized {
        header: MessageHeader::new(),
        bundle_id: record.bundle_id(),
    })));
    input.push('\n');
    input.push_str("this is not json\n\n");
    for _ in 0..2 {
        input.push_str(&to_line(&InboundEvent::SeatTicketConfirmed(
            SeatTicketConfirmed {
                header: MessageHeader::new(),
                booking_id: record.booking_id().to_string(),
                ticket_id: Uuid::new_v4().to_string(),
            },
        )));
        input.push('\n');
    }

    let summary = worker::run(
        manager,
        fast_policy(),
        4,
        input.as_bytes(),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            initialized: 0,
            failed_initializations: 0,
            delivered: 3,
            skipped: 1,
            dead_letters: 0,
        }
    );
    assert!(matches!(
        commands.sent().await.as_slice(),
        [BookingCommand::BookSeats(_)]
    ));
    let stored = store.get(record.bundle_id()).await.unwrap().unwrap();
    assert!(stored.seat_tickets_complete());
}

#[tokio::test]
async fn test_run_reports_dead_letters() {
    let (store, record) = seeded_store().await;
    let events = InMemoryEventPublisher::new();
    let manager =
        BundleProcessManager::new(store.clone(), InMemoryCommandSender::new(), events.clone());

    let malformed = InboundEvent::TaxiBooked(TaxiBooked {
        header: MessageHeader::new(),
        taxi_booking_id: Uuid::new_v4(),
        reference_id: "bundle-42".to_string(),
    });
    let valid = InboundEvent::TaxiBooked(TaxiBooked {
        header: MessageHeader::new(),
        taxi_booking_id: Uuid::new_v4(),
        reference_id: record.bundle_id().to_string(),
    });
    let input = format!("{}\n{}\n", to_line(&malformed), to_line(&valid));

    let summary = worker::run(
        manager,
        fast_policy(),
        4,
        input.as_bytes(),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.dead_letters, 1);
    assert!(matches!(
        events.published().await.as_slice(),
        [BundleEvent::Finalized(f)] if f.success
    ));
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let (store, _) = seeded_store().await;
    let manager = BundleProcessManager::new(
        store,
        InMemoryCommandSender::new(),
        InMemoryEventPublisher::new(),
    );

    // An input that never ends
    let (_writer, reader) = tokio::io::duplex(64);
    let reader = tokio::io::BufReader::new(reader);

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        worker::run(manager, fast_policy(), 4, reader, async {}),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary, RunSummary::default());
}

fn new_bundle() -> NewBundle {
    NewBundle::for_passengers(
        "ann@example.com",
        vec!["Ann".to_string()],
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
    )
}

#[tokio::test]
async fn test_run_books_bundle_from_empty_store() {
    let store = InMemoryBundleStore::new();
    let commands = InMemoryCommandSender::new();
    let events = InMemoryEventPublisher::new();
    let manager = BundleProcessManager::new(store.clone(), commands.clone(), events.clone());

    let bundle_id = BundleId::new();
    let bundle = new_bundle();
    let initialize = Intake::Initialize(InitializeBundle {
        bundle_id,
        bundle: bundle.clone(),
    });
    let mut input = initialize.to_line().unwrap();
    input.push('\n');
    input.push_str(&to_line(&InboundEvent::BundleInitialized(BundleInitialized {
        header: MessageHeader::new(),
        bundle_id,
    })));
    input.push('\n');

    let summary = worker::run(
        manager,
        fast_policy(),
        4,
        input.as_bytes(),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(summary.initialized, 1);
    assert_eq!(summary.delivered, 1);
    let record = store.get(bundle_id).await.unwrap().unwrap();
    assert!(record.matches_request(&bundle));
    assert!(matches!(
        commands.sent().await.as_slice(),
        [BookingCommand::BookSeats(cmd)] if cmd.booking_id == record.booking_id()
    ));
    assert!(matches!(
        events.published().await.as_slice(),
        [BundleEvent::Initialized(e)] if e.bundle_id == bundle_id
    ));

    // The rest of the workflow, fed back through a second run.
    let manager = BundleProcessManager::new(store.clone(), commands.clone(), events.clone());
    let ticket = Uuid::new_v4();
    let lines = [
        InboundEvent::SeatBookingMade(SeatBookingMade {
            header: MessageHeader::new(),
            booking_id: record.booking_id().to_string(),
            seat_count: 1,
            customer_email: "ann@example.com".to_string(),
            show_id: record.show_id(),
        }),
        InboundEvent::SeatTicketConfirmed(SeatTicketConfirmed {
            header: MessageHeader::new(),
            booking_id: record.booking_id().to_string(),
            ticket_id: ticket.to_string(),
        }),
    ];
    let input: String = lines.iter().map(|e| to_line(e) + "\n").collect();
    worker::run(
        manager,
        fast_policy(),
        4,
        input.as_bytes(),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    let manager = BundleProcessManager::new(store.clone(), commands.clone(), events.clone());
    let input: String = [
        InboundEvent::FlightBooked(FlightBooked {
            header: MessageHeader::new(),
            flight_id: record.outbound_flight_id(),
            ticket_ids: vec![Uuid::new_v4()],
            reference_id: bundle_id.to_string(),
        }),
        InboundEvent::FlightBooked(FlightBooked {
            header: MessageHeader::new(),
            flight_id: record.return_flight_id(),
            ticket_ids: vec![Uuid::new_v4()],
            reference_id: bundle_id.to_string(),
        }),
    ]
    .iter()
    .map(|e| to_line(e) + "\n")
    .collect();
    worker::run(
        manager,
        fast_policy(),
        4,
        input.as_bytes(),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    let manager = BundleProcessManager::new(store.clone(), commands.clone(), events.clone());
    let input = to_line(&InboundEvent::TaxiBooked(TaxiBooked {
        header: MessageHeader::new(),
        taxi_booking_id: Uuid::new_v4(),
        reference_id: bundle_id.to_string(),
    })) + "\n";
    worker::run(
        manager,
        fast_policy(),
        4,
        input.as_bytes(),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    let record = store.get(bundle_id).await.unwrap().unwrap();
    assert!(record.is_finalized());
    assert!(!record.failed());
    assert_eq!(record.seat_ticket_ids(), &[ticket]);
    assert!(matches!(
        events.published().await.last(),
        Some(BundleEvent::Finalized(f)) if f.bundle_id == bundle_id && f.success
    ));
}

#[tokio::test]
async fn test_repeated_initialize_line_keeps_one_bundle() {
    let store = InMemoryBundleStore::new();
    let events = InMemoryEventPublisher::new();
    let manager =
        BundleProcessManager::new(store.clone(), InMemoryCommandSender::new(), events.clone());

    let bundle_id = BundleId::new();
    let line = Intake::Initialize(InitializeBundle {
        bundle_id,
        bundle: new_bundle(),
    })
    .to_line()
    .unwrap();
    let conflicting = Intake::Initialize(InitializeBundle {
        bundle_id,
        bundle: new_bundle(),
    })
    .to_line()
    .unwrap();

    // The first announcement is lost; the repeated line announces again.
    events.fail_next(1).await;
    let input = format!("{line}\n{line}\n{conflicting}\n");

    let summary = worker::run(
        manager,
        fast_policy(),
        4,
        input.as_bytes(),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(summary.initialized, 1);
    assert_eq!(summary.failed_initializations, 2);
    assert_eq!(store.len().await, 1);
    assert!(matches!(
        events.published().await.as_slice(),
        [BundleEvent::Initialized(e)] if e.bundle_id == bundle_id
    ));
}
