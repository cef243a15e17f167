use criterion::{Criterion, criterion_group, criterion_main};
use domain::{BundleRecord, FlightLeg, InboundEvent, NewBundle};
use uuid::Uuid;

fn make_record(seats: usize) -> BundleRecord {
    let passengers = (0..seats).map(|i| format!("Passenger {i}")).collect();
    let mut record = BundleRecord::create(NewBundle::for_passengers(
        "bench@example.com",
        passengers,
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
    ))
    .unwrap();

    for _ in 0..seats {
        record.confirm_seat_ticket(Uuid::new_v4());
    }
    let outbound: Vec<Uuid> = (0..seats).map(|_| Uuid::new_v4()).collect();
    let flight_id = record.outbound_flight_id();
    record.record_flight_booked(flight_id, &outbound, chrono::Utc::now())
        .unwrap();
    record
}

fn bench_compensation_plan(c: &mut Criterion) {
    let record = make_record(100);

    c.bench_function("domain/compensation_plan_100_seats", |b| {
        b.iter(|| record.compensation_plan().unwrap());
    });
}

fn bench_confirm_seat_ticket(c: &mut Criterion) {
    let record = make_record(1);

    c.bench_function("domain/confirm_100_seat_tickets", |b| {
        b.iter(|| {
            let mut record = record.clone();
            for _ in 0..100 {
                record.confirm_seat_ticket(Uuid::new_v4());
            }
            record
        });
    });
}

fn bench_decode_inbound_event(c: &mut Criterion) {
    let record = make_record(3);
    let line = serde_json::json!({
        "type": "FlightBooked",
        "data": {
            "header": common::MessageHeader::new(),
            "flight_id": record.return_flight_id(),
            "ticket_ids": [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()],
            "reference_id": record.bundle_id().to_string(),
        }
    })
    .to_string();

    c.bench_function("domain/decode_flight_booked", |b| {
        b.iter(|| serde_json::from_str::<InboundEvent>(&line).unwrap());
    });

    c.bench_function("domain/book_flight_command", |b| {
        b.iter(|| record.book_flight(FlightLeg::Return));
    });
}

criterion_group!(
    benches,
    bench_compensation_plan,
    bench_confirm_seat_ticket,
    bench_decode_inbound_event
);
criterion_main!(benches);
