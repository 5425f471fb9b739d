use async_trait::async_trait;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use sniffertrek_backend::insertion::{Candidate, placement_index};
use sniffertrek_backend::providers::Geocoder;
use sniffertrek_shared::{Coordinate, RouteErrorKind, Stop, StopId, StopRole};

/// Placement over fully-resolved stops never geocodes.
struct NoGeocoder;

#[async_trait]
impl Geocoder for NoGeocoder {
    async fn geocode(&self, _query: &str) -> Result<Coordinate, RouteErrorKind> {
        Err(RouteErrorKind::ZeroResults)
    }
}

fn resolved_route(stop_count: usize) -> Vec<Stop> {
    (0..stop_count)
        .map(|i| Stop {
            id: StopId(i as u64),
            name: format!("Stop {i}"),
            role: if i == 0 {
                StopRole::Start
            } else if i == stop_count - 1 {
                StopRole::End
            } else {
                StopRole::Waypoint
            },
            coordinates: Some(Coordinate {
                lat: 45.0 + (i as f64) * 0.05,
                lng: 5.0 + ((i as f64) * 0.7).sin(),
            }),
            overnight: false,
            booking: None,
        })
        .collect()
}

fn bench_placement(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest_insertion");
    for stop_count in [10, 50, 200] {
        group.bench_function(format!("{stop_count}_stops"), |b| {
            let candidate = Candidate {
                name: "Candidate".into(),
                coordinates: Some(Coordinate { lat: 45.5, lng: 5.5 }),
            };
            b.iter(|| {
                let mut stops = resolved_route(stop_count);
                let index = futures::executor::block_on(placement_index(
                    &NoGeocoder,
                    black_box(&mut stops),
                    black_box(&candidate),
                ));
                black_box(index)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_placement);
criterion_main!(benches);
