use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use parksim::admission::{self, ReservationRequest};
use parksim::{OccupancyLedger, SimClock, SimulationConfig, Statistics};

fn make_day(capacity: u32) -> (SimClock, OccupancyLedger) {
    let config = SimulationConfig {
        open_hour: 7,
        close_hour: 19,
        capacity,
        tick: Duration::from_secs(1),
    };
    (SimClock::new(&config), OccupancyLedger::new(&config))
}

/// Requests cycling through the day's hours with small mixed parties.
fn request_mix(count: u32) -> Vec<ReservationRequest> {
    (0..count)
        .map(|i| ReservationRequest {
            family: format!("family-{i}"),
            hour: 7 + (i % 13) as u8,
            party_size: 1 + i % 4,
        })
        .collect()
}

fn bench_decide_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission/uncontended");
    group.throughput(Throughput::Elements(256));
    group.bench_function("decide_256", |b| {
        let requests = request_mix(256);
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                // Fresh ledger per sample so bookings do not leak between
                // samples; a huge capacity keeps every request on the
                // confirm fast path.
                let (clock, mut ledger) = make_day(u32::MAX);
                let mut stats = Statistics::default();
                let start = Instant::now();
                for request in &requests {
                    admission::decide(request, &clock, &mut ledger, &mut stats);
                }
                total += start.elapsed();
            }
            total
        });
    });
    group.finish();
}

fn bench_decide_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission/contended");
    group.throughput(Throughput::Elements(256));
    group.bench_function("decide_256_tight_capacity", |b| {
        let requests = request_mix(256);
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                // Tight capacity forces the forward search and the denial
                // paths, the worst case for a full day.
                let (clock, mut ledger) = make_day(12);
                let mut stats = Statistics::default();
                let start = Instant::now();
                for request in &requests {
                    admission::decide(request, &clock, &mut ledger, &mut stats);
                }
                total += start.elapsed();
            }
            total
        });
    });
    group.finish();
}

criterion_group!(benches, bench_decide_uncontended, bench_decide_contended);
criterion_main!(benches);
